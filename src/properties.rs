//! Flat `key=value` documents.
//!
//! Lines are kept verbatim; parsing only classifies them so entries can be
//! looked up by `(profile, path)`. New entries are appended at the end of
//! the file, preceded by their comment if one was given:
//!
//! ```text
//! # This property was added
//! %dev.quarkus.http.port=9090
//! ```
//!
//! Reading accepts the usual properties syntax: `=`, `:` or whitespace
//! between key and value, `#` and `!` comments, and backslash line
//! continuations. Writing always uses `key=value`.

use crate::error::PropfigError;
use crate::lines::{new_line_ending, split_terminated};
use crate::merge::ConfigDocument;
use crate::path::ConfigKeyPath;
use crate::types::{PROFILE_PREFIX, PropertyEntry};

#[derive(Debug, Clone, PartialEq)]
enum Line {
    Blank(String),
    Comment(String),
    /// A logical entry, possibly spanning several physical lines.
    Entry {
        raw: Vec<String>,
        profile: Option<String>,
        path: ConfigKeyPath,
        value: String,
    },
}

impl Line {
    fn physical(&self) -> &[String] {
        match self {
            Line::Blank(l) | Line::Comment(l) => std::slice::from_ref(l),
            Line::Entry { raw, .. } => raw,
        }
    }
}

/// A parsed properties file.
#[derive(Debug, Clone)]
pub struct PropertiesDocument {
    lines: Vec<Line>,
    /// Terminators of the original physical lines, by index.
    endings: Vec<&'static str>,
    new_line: &'static str,
}

impl PropertiesDocument {
    /// Parse `content`. `origin` names the file in errors.
    pub fn parse(origin: &str, content: &str) -> Result<Self, PropfigError> {
        let (texts, endings) = split_terminated(content);
        let mut lines = Vec::new();
        let mut physical = texts.iter().enumerate();

        while let Some((index, line)) = physical.next() {
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                lines.push(Line::Blank(line.to_string()));
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with('!') {
                lines.push(Line::Comment(line.to_string()));
                continue;
            }

            let mut raw = vec![line.to_string()];
            let mut logical = String::from(trimmed);
            while ends_with_continuation(&logical) {
                logical.pop();
                match physical.next() {
                    Some((_, next)) => {
                        raw.push(next.to_string());
                        logical.push_str(next.trim_start());
                    }
                    None => break,
                }
            }

            let (raw_key, raw_value) = split_key_value(&logical);
            let key = unescape(raw_key);
            let (profile, path) = split_profile(&key).map_err(|e| match e {
                PropfigError::MalformedPath { path } => PropfigError::Parse {
                    path: origin.to_string(),
                    line: index + 1,
                    reason: format!("malformed key '{path}'"),
                },
                other => other,
            })?;

            lines.push(Line::Entry {
                raw,
                profile,
                path,
                value: unescape(raw_value),
            });
        }

        Ok(Self {
            new_line: new_line_ending(&endings),
            lines,
            endings,
        })
    }

    /// The value stored for `(profile, path)`, if any.
    pub fn value_of(&self, profile: Option<&str>, path: &ConfigKeyPath) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Entry {
                profile: p,
                path: k,
                value,
                ..
            } if p.as_deref() == profile && k == path => Some(value.as_str()),
            _ => None,
        })
    }

    /// Every entry key in document order, as `(profile, dotted path)`.
    pub fn entry_keys(&self) -> Vec<(Option<String>, String)> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Entry { profile, path, .. } => Some((profile.clone(), path.dotted())),
                _ => None,
            })
            .collect()
    }
}

impl ConfigDocument for PropertiesDocument {
    fn contains(&self, profile: Option<&str>, path: &ConfigKeyPath) -> bool {
        self.value_of(profile, path).is_some()
    }

    fn insert(&mut self, entry: &PropertyEntry) -> Result<(), PropfigError> {
        // A trailing continuation would swallow the next line; a blank line
        // ends it without changing its value.
        if let Some(Line::Entry { raw, .. }) = self.lines.last()
            && raw.last().is_some_and(|l| ends_with_continuation(l))
        {
            self.lines.push(Line::Blank(String::new()));
        }
        if let Some(comment) = &entry.comment {
            for line in comment.lines() {
                self.lines.push(Line::Comment(format!("# {line}")));
            }
        }

        let key = match &entry.profile {
            Some(profile) => format!("{PROFILE_PREFIX}{profile}.{}", entry.path),
            None => entry.path.dotted(),
        };
        self.lines.push(Line::Entry {
            raw: vec![format!("{}={}", escape_key(&key), escape_value(&entry.value))],
            profile: entry.profile.clone(),
            path: entry.path.clone(),
            value: entry.value.clone(),
        });
        Ok(())
    }

    fn render(&self) -> String {
        let physical: Vec<&str> = self
            .lines
            .iter()
            .flat_map(Line::physical)
            .map(String::as_str)
            .collect();
        let mut out = String::new();
        for (i, text) in physical.iter().enumerate() {
            out.push_str(text);
            // Appended lines have no recorded terminator; an unterminated
            // last line gains one once something follows it.
            let ending = match self.endings.get(i) {
                Some(&"") if i + 1 < physical.len() => self.new_line,
                Some(ending) => *ending,
                None => self.new_line,
            };
            out.push_str(ending);
        }
        out
    }
}

/// Split `%profile.some.key` into its profile and path.
fn split_profile(key: &str) -> Result<(Option<String>, ConfigKeyPath), PropfigError> {
    match key.strip_prefix(PROFILE_PREFIX) {
        Some(rest) => {
            let (profile, path) = rest.split_once('.').ok_or_else(|| PropfigError::MalformedPath {
                path: key.to_string(),
            })?;
            if profile.is_empty() {
                return Err(PropfigError::MalformedPath {
                    path: key.to_string(),
                });
            }
            Ok((Some(profile.to_string()), ConfigKeyPath::parse(path)?))
        }
        None => Ok((None, ConfigKeyPath::parse(key)?)),
    }
}

/// An odd run of trailing backslashes continues the entry on the next line.
fn ends_with_continuation(s: &str) -> bool {
    s.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Split a logical line (leading whitespace already removed) into raw key
/// and raw value.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let rest = line[key_end..].trim_start_matches([' ', '\t', '\x0c']);
    let rest = rest
        .strip_prefix(['=', ':'])
        .map(|r| r.trim_start_matches([' ', '\t', '\x0c']))
        .unwrap_or(rest);
    (key, rest)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '=' | ':' | ' ' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => push_escaped_control(&mut out, c),
        }
    }
    out
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            ' ' if i == 0 => out.push_str("\\ "),
            '\\' => out.push_str("\\\\"),
            _ => push_escaped_control(&mut out, c),
        }
    }
    out
}

fn push_escaped_control(out: &mut String, c: char) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\x0c' => out.push_str("\\f"),
        _ => out.push(c),
    }
}
