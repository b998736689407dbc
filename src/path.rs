//! Dotted configuration key paths.
//!
//! A [`ConfigKeyPath`] is the format-independent name of a configuration
//! entry: `quarkus.http.port` is `["quarkus", "http", "port"]` whether it is
//! written flat in a properties file or nested three levels deep in YAML.
//! Both format adapters compare and split keys through this type.

use std::fmt;

use serde::Serialize;

use crate::error::PropfigError;

/// Separator between segments of a dotted key.
pub const SEPARATOR: char = '.';

/// An ordered, non-empty sequence of non-empty key segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct ConfigKeyPath {
    segments: Vec<String>,
}

impl ConfigKeyPath {
    /// Split a dotted key on `.`.
    ///
    /// Fails with [`PropfigError::MalformedPath`] when the key is empty or
    /// any segment is empty (`a..b`, `.a`, `a.`).
    pub fn parse(dotted: &str) -> Result<Self, PropfigError> {
        let segments: Vec<String> = dotted.split(SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PropfigError::MalformedPath {
                path: dotted.to_string(),
            });
        }
        Ok(Self { segments })
    }

    /// Build a path from already-split segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PropfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty()
            || segments
                .iter()
                .any(|s| s.is_empty() || s.contains(SEPARATOR))
        {
            return Err(PropfigError::MalformedPath {
                path: segments.join("."),
            });
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false: a parsed path has at least one segment.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The final segment.
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Number of leading segments `self` and `other` share.
    pub fn common_prefix_length(&self, other: &ConfigKeyPath) -> usize {
        common_prefix_length(&self.segments, &other.segments)
    }

    /// Whether every segment of `self` is a leading segment of `other`.
    pub fn is_prefix_of(&self, other: &ConfigKeyPath) -> bool {
        self.len() <= other.len() && self.common_prefix_length(other) == self.len()
    }

    /// The segments left after skipping the first `depth`.
    ///
    /// Returns `None` when nothing remains.
    pub fn suffix_from(&self, depth: usize) -> Option<ConfigKeyPath> {
        if depth >= self.segments.len() {
            return None;
        }
        Some(Self {
            segments: self.segments[depth..].to_vec(),
        })
    }

    /// The dotted form, e.g. `quarkus.http.port`.
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }
}

/// Longest shared leading-segment count of two segment slices.
pub fn common_prefix_length<A, B>(a: &[A], b: &[B]) -> usize
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    a.iter()
        .zip(b)
        .take_while(|(x, y)| x.as_ref() == y.as_ref())
        .count()
}

impl fmt::Display for ConfigKeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

impl From<ConfigKeyPath> for String {
    fn from(path: ConfigKeyPath) -> Self {
        path.dotted()
    }
}

impl std::str::FromStr for ConfigKeyPath {
    type Err = PropfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
