//! Strict-mode validation: detect unknown keys in options files.
//!
//! Uses `serde_ignored` to deserialize into `C::Layer` (all-optional fields)
//! and capture any keys the layer doesn't consume. Each unknown key is
//! reported with its file path and best-effort line number.

use std::path::Path;

use confique::Config;
use serde::Deserialize;

use crate::error::PropfigError;

/// Validate that TOML options content contains no keys unknown to `C`.
pub fn validate_unknown_keys<C: Config>(content: &str, path: &Path) -> Result<(), PropfigError>
where
    C::Layer: for<'de> Deserialize<'de>,
{
    let mut unknown_keys: Vec<String> = Vec::new();

    let deserializer = toml::Deserializer::new(content);
    let _layer: C::Layer = serde_ignored::deserialize(deserializer, |ignored_path| {
        unknown_keys.push(ignored_path.to_string());
    })
    .map_err(|e| PropfigError::OptionsParse {
        path: path.to_path_buf(),
        source: e,
    })?;

    if unknown_keys.is_empty() {
        return Ok(());
    }

    let errors: Vec<PropfigError> = unknown_keys
        .into_iter()
        .map(|key| {
            let line = find_key_line(content, &key);
            PropfigError::UnknownKey {
                key,
                path: path.to_path_buf(),
                line,
            }
        })
        .collect();

    Err(PropfigError::UnknownKeys(errors))
}

/// 1-indexed line of a top-level key or `[table]` header, or 0 if not found.
///
/// Options are flat, so an unknown key is either a top-level assignment or
/// the first segment of a stray table.
fn find_key_line(content: &str, key: &str) -> usize {
    let head = key.split('.').next().unwrap_or(key);
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix('[') {
            let name = header.trim_start_matches('[').trim_end_matches(']').trim();
            if name.split('.').next().map(str::trim) == Some(head) {
                return i + 1;
            }
            continue;
        }
        if let Some(after_key) = trimmed.strip_prefix(head)
            && after_key.trim_start().starts_with('=')
        {
            return i + 1;
        }
    }
    0
}
