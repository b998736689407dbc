//! File selection by glob pattern.
//!
//! Patterns are matched against a file's logical, `/`-separated path.
//! `*` stays within one path segment and `**` spans any number of them, so
//! `**/application.properties` selects
//! `src/main/resources/application.properties` but not
//! `src/main/resources/application-test.properties`. The single pattern
//! `*` is a sentinel that selects every file.

use glob::{MatchOptions, Pattern};

use crate::error::PropfigError;

/// Pattern that selects every file regardless of depth.
pub const MATCH_ALL: &str = "*";

const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled set of file patterns. Holds no per-file state.
#[derive(Debug, Clone)]
pub struct FileSelector {
    patterns: Vec<Pattern>,
    match_all: bool,
}

impl FileSelector {
    /// Compile `patterns`. An empty set selects nothing.
    pub fn new<I, S>(patterns: I) -> Result<Self, PropfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        let mut match_all = false;
        for raw in patterns {
            let raw = raw.as_ref();
            if raw == MATCH_ALL {
                match_all = true;
                continue;
            }
            let pattern = Pattern::new(raw).map_err(|e| PropfigError::InvalidPattern {
                pattern: raw.to_string(),
                reason: e.msg.to_string(),
            })?;
            compiled.push(pattern);
        }
        Ok(Self {
            patterns: compiled,
            match_all,
        })
    }

    /// Selector that accepts every file.
    pub fn all() -> Self {
        Self {
            patterns: Vec::new(),
            match_all: true,
        }
    }

    /// Whether any pattern matches `path`.
    ///
    /// Windows separators are normalized to `/` first.
    pub fn matches(&self, path: &str) -> bool {
        if self.match_all {
            return true;
        }
        let normalized;
        let path = if path.contains('\\') {
            normalized = path.replace('\\', "/");
            normalized.as_str()
        } else {
            path
        };
        self.patterns.iter().any(|p| p.matches_with(path, OPTIONS))
    }
}
