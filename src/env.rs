use toml::{Table, Value};

/// Build a `toml::Table` from environment variables matching `{PREFIX}__*`.
///
/// Double underscore `__` separates nesting levels. Single `_` within a
/// segment is literal, and segments are lowercased to match field names.
///
/// Values are kept as strings. Keys listed in `list_keys` are split on `,`
/// into arrays, with whitespace trimmed and empty items dropped.
///
/// Takes an iterator so tests can pass synthetic data instead of `std::env::vars()`.
pub fn env_to_table(
    prefix: &str,
    vars: impl IntoIterator<Item = (String, String)>,
    list_keys: &[&str],
) -> Table {
    let needle = format!("{prefix}__");
    let mut table = Table::new();

    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(&needle) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }

        let segments: Vec<String> = rest.split("__").map(str::to_lowercase).collect();
        let dotted = segments.join(".");
        let value = if list_keys.contains(&dotted.as_str()) {
            split_list(&value)
        } else {
            Value::String(value)
        };
        tracing::trace!(var = %key, option = %dotted, "option from environment");
        insert_nested(&mut table, &segments, value);
    }

    table
}

fn insert_nested(table: &mut Table, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };

    if rest.is_empty() {
        table.insert(first.clone(), value);
    } else {
        let sub = table
            .entry(first.as_str())
            .or_insert_with(|| Value::Table(Table::new()));
        if let Value::Table(sub_table) = sub {
            insert_nested(sub_table, rest, value);
        }
    }
}

fn split_list(raw: &str) -> Value {
    Value::Array(
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| Value::String(item.to_string()))
            .collect(),
    )
}
