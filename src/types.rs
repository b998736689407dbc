//! Value types shared by the adapters, the merge engine and the recipe.

use std::path::Path;

use serde::Serialize;

use crate::error::PropfigError;
use crate::path::ConfigKeyPath;

/// Prefix that marks a profile-scoped key, as in `%dev.some.key`.
pub const PROFILE_PREFIX: char = '%';

/// One requested or existing configuration fact.
///
/// The profile scopes the entry to a deployment profile and is never part of
/// the path: `%dev.quarkus.http.port` has path `quarkus.http.port` and
/// profile `dev`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyEntry {
    pub path: ConfigKeyPath,
    pub value: String,
    pub comment: Option<String>,
    pub profile: Option<String>,
}

impl PropertyEntry {
    /// An unscoped entry without comment.
    pub fn new(key: &str, value: impl Into<String>) -> Result<Self, PropfigError> {
        let path = ConfigKeyPath::parse(key)?;
        check_unscoped(&path)?;
        Ok(Self {
            path,
            value: value.into(),
            comment: None,
            profile: None,
        })
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Scope the entry to `profile`.
    ///
    /// A profile name ends at the first `.` of a flat key, so it cannot
    /// contain one.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Result<Self, PropfigError> {
        let profile = profile.into();
        check_profile(&profile)?;
        self.profile = Some(profile);
        Ok(self)
    }

    /// Re-check what `new` and `with_profile` enforce, for entries whose
    /// fields were set directly.
    pub fn validate(&self) -> Result<(), PropfigError> {
        check_unscoped(&self.path)?;
        if let Some(profile) = &self.profile {
            check_profile(profile)?;
        }
        Ok(())
    }
}

/// The profile belongs in [`PropertyEntry::profile`]; a `%` on the first
/// segment would be read back as a profile by both adapters.
fn check_unscoped(path: &ConfigKeyPath) -> Result<(), PropfigError> {
    if path
        .segments()
        .first()
        .is_some_and(|s| s.starts_with(PROFILE_PREFIX))
    {
        return Err(PropfigError::InvalidValue {
            key: path.dotted(),
            reason: "a leading '%' names a profile; set the entry's profile instead".into(),
        });
    }
    Ok(())
}

fn check_profile(profile: &str) -> Result<(), PropfigError> {
    if profile.is_empty() || profile.contains('.') || profile.contains(char::is_whitespace) {
        return Err(PropfigError::InvalidValue {
            key: "profile".into(),
            reason: format!("'{profile}' is not a valid profile name"),
        });
    }
    Ok(())
}

/// The two persisted formats the merge engine edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// `key=value` lines.
    Properties,
    /// Indentation-nested mappings.
    Yaml,
}

impl FileFormat {
    /// Pick the format from a file's extension.
    pub fn detect(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?;
        match ext {
            "properties" => Some(FileFormat::Properties),
            "yml" | "yaml" => Some(FileFormat::Yaml),
            _ => None,
        }
    }
}

/// A file handed over by the host: its logical path (used for selection
/// and format detection) and its current content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Why a file was left alone without being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No file pattern matched the logical path.
    NotSelected,
    /// The extension names neither supported format.
    UnsupportedFormat,
}

/// Result of running a merge against one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Skipped(SkipReason),
    /// The entry already existed; the file is untouched.
    Unchanged,
    /// The full updated content.
    Changed(String),
}

impl MergeOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, MergeOutcome::Changed(_))
    }

    /// The updated content, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            MergeOutcome::Changed(c) => Some(c),
            _ => None,
        }
    }
}
