//! Layer resolution for recipe options.
//!
//! Operates on pre-loaded data (`ResolveInput`) with no I/O, making the full
//! pipeline testable with synthetic inputs. Steps:
//!
//! 1. Validate each file (if strict mode)
//! 2. Parse and deep-merge option files (later overrides earlier)
//! 3. Deep-merge env vars on top
//! 4. Deep-merge programmatic overrides on top (highest priority)
//! 5. Deserialize merged table into `C::Layer`
//! 6. Let confique fill defaults and validate required fields

use std::path::PathBuf;

use confique::Config;
use serde::Deserialize;
use toml::{Table, Value};

use crate::env;
use crate::error::PropfigError;
use crate::validate;

/// All pre-loaded data needed to resolve options. No I/O happens here.
pub struct ResolveInput {
    /// File contents in precedence order: first = lowest priority, last = highest.
    pub files: Vec<(PathBuf, String)>,
    /// Raw environment variable pairs.
    pub env_vars: Vec<(String, String)>,
    /// Env var prefix (e.g. `"PROPFIG"`). `None` means env disabled.
    pub env_prefix: Option<String>,
    /// Keys whose env values are comma-separated lists.
    pub list_keys: Vec<&'static str>,
    /// Overrides as `(dotted_key, value)` pairs.
    pub overrides: Vec<(String, Value)>,
    /// Whether to reject unknown keys in option files.
    pub strict: bool,
}

pub fn resolve<C: Config>(input: ResolveInput) -> Result<C, PropfigError>
where
    C::Layer: for<'de> Deserialize<'de>,
{
    let mut merged = Table::new();
    for (path, content) in &input.files {
        if input.strict {
            validate::validate_unknown_keys::<C>(content, path)?;
        }
        let table: Table = toml::from_str(content).map_err(|e| PropfigError::OptionsParse {
            path: path.clone(),
            source: e,
        })?;
        merged = deep_merge(merged, table);
    }

    if let Some(prefix) = &input.env_prefix {
        let env_table = env::env_to_table(prefix, input.env_vars, &input.list_keys);
        merged = deep_merge(merged, env_table);
    }

    if !input.overrides.is_empty() {
        merged = deep_merge(merged, overrides_to_table(&input.overrides));
    }

    let layer: C::Layer = Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| PropfigError::InvalidValue {
            key: "<merged>".into(),
            reason: e.to_string(),
        })?;

    C::builder()
        .preloaded(layer)
        .load()
        .map_err(PropfigError::from)
}

/// Deep-merge `overlay` on top of `base`.
/// If both sides have a Table for the same key, recurse.
/// Otherwise, `overlay`'s value wins.
pub fn deep_merge(mut base: Table, overlay: Table) -> Table {
    for (key, overlay_val) in overlay {
        match (base.remove(&key), overlay_val) {
            (Some(Value::Table(base_tbl)), Value::Table(overlay_tbl)) => {
                base.insert(key, Value::Table(deep_merge(base_tbl, overlay_tbl)));
            }
            (_, overlay_val) => {
                base.insert(key, overlay_val);
            }
        }
    }
    base
}

/// Expand `("a.b", v)` pairs into nested tables. Later pairs win; a pair
/// whose parent is already a non-table value replaces it.
pub fn overrides_to_table(entries: &[(String, Value)]) -> Table {
    let mut table = Table::new();
    for (dotted_key, value) in entries {
        let segments: Vec<&str> = dotted_key.split('.').collect();
        let Some((leaf, parents)) = segments.split_last() else {
            continue;
        };
        let mut current = &mut table;
        for segment in parents {
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            if !slot.is_table() {
                *slot = Value::Table(Table::new());
            }
            let Value::Table(next) = slot else {
                unreachable!("slot was just made a table");
            };
            current = next;
        }
        current.insert(leaf.to_string(), value.clone());
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AddPropertyOptions;

    fn table(toml_str: &str) -> Table {
        toml_str.parse::<Table>().unwrap()
    }

    fn input(files: &[&str]) -> ResolveInput {
        ResolveInput {
            files: files
                .iter()
                .enumerate()
                .map(|(i, c)| (PathBuf::from(format!("opts{i}.toml")), c.to_string()))
                .collect(),
            env_vars: vec![],
            env_prefix: None,
            list_keys: vec!["file_patterns"],
            overrides: vec![],
            strict: true,
        }
    }

    #[test]
    fn later_file_overrides_earlier() {
        let options: AddPropertyOptions = resolve(input(&[
            "key = \"a\"\nvalue = \"1\"\nprofile = \"dev\"\n",
            "value = \"2\"\n",
        ]))
        .unwrap();
        assert_eq!(options.key, "a");
        assert_eq!(options.value, "2");
        assert_eq!(options.profile.as_deref(), Some("dev"));
    }

    #[test]
    fn env_overrides_file() {
        let options: AddPropertyOptions = resolve(ResolveInput {
            env_vars: vec![("APP__PROFILE".into(), "prod".into())],
            env_prefix: Some("APP".into()),
            ..input(&["key = \"a\"\nvalue = \"1\"\nprofile = \"dev\"\n"])
        })
        .unwrap();
        assert_eq!(options.profile.as_deref(), Some("prod"));
    }

    #[test]
    fn overrides_beat_env() {
        let options: AddPropertyOptions = resolve(ResolveInput {
            env_vars: vec![("APP__VALUE".into(), "env".into())],
            env_prefix: Some("APP".into()),
            overrides: vec![("value".into(), Value::String("cli".into()))],
            ..input(&["key = \"a\"\nvalue = \"file\"\n"])
        })
        .unwrap();
        assert_eq!(options.value, "cli");
    }

    #[test]
    fn unparseable_file_names_path() {
        let err = resolve::<AddPropertyOptions>(ResolveInput {
            strict: false,
            ..input(&["key = "])
        })
        .unwrap_err();
        assert!(matches!(err, PropfigError::OptionsParse { ref path, .. } if path.ends_with("opts0.toml")));
    }

    #[test]
    fn wrong_type_is_invalid_value() {
        let err = resolve::<AddPropertyOptions>(input(&["key = \"a\"\nvalue = \"1\"\nfile_patterns = 3\n"]))
            .unwrap_err();
        assert!(matches!(err, PropfigError::InvalidValue { .. } | PropfigError::OptionsParse { .. }));
    }

    #[test]
    fn nested_tables_recurse() {
        let merged = deep_merge(
            table("[a]\nx = 1\ny = 2\n"),
            table("[a]\ny = 20\n"),
        );
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(20));
    }

    #[test]
    fn overlay_scalar_replaces_table() {
        let merged = deep_merge(table("[a]\nx = 1\n"), table("a = \"flat\"\n"));
        assert_eq!(merged["a"].as_str(), Some("flat"));
    }

    #[test]
    fn overrides_expand_dotted_keys() {
        let t = overrides_to_table(&[
            ("a.b".into(), Value::Integer(1)),
            ("a.c".into(), Value::Integer(2)),
            ("d".into(), Value::Boolean(true)),
        ]);
        assert_eq!(t["a"]["b"].as_integer(), Some(1));
        assert_eq!(t["a"]["c"].as_integer(), Some(2));
        assert_eq!(t["d"].as_bool(), Some(true));
    }

    #[test]
    fn later_override_replaces_scalar_parent() {
        let t = overrides_to_table(&[
            ("a".into(), Value::Integer(1)),
            ("a.b".into(), Value::Integer(2)),
        ]);
        assert_eq!(t["a"]["b"].as_integer(), Some(2));
    }
}
