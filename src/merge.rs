//! The merge decision shared by both formats.
//!
//! A merge adds an entry only when the document has no entry for the same
//! `(profile, path)`. An existing value always wins and the merge is a
//! silent no-op for it. Lookup and insertion mechanics live in the format
//! adapters behind [`ConfigDocument`].

use crate::error::PropfigError;
use crate::path::ConfigKeyPath;
use crate::types::PropertyEntry;

/// A parsed configuration document that can be searched and extended.
pub trait ConfigDocument {
    /// Whether an entry exists for `path` under `profile` (`None` = unscoped).
    fn contains(&self, profile: Option<&str>, path: &ConfigKeyPath) -> bool;

    /// Insert `entry`, which must not already exist.
    ///
    /// Implementations validate before touching the document, so an error
    /// leaves it exactly as it was.
    fn insert(&mut self, entry: &PropertyEntry) -> Result<(), PropfigError>;

    /// Serialize back to text.
    fn render(&self) -> String;
}

/// Merge `entry` into `document`. Returns whether the document changed.
pub fn merge<D: ConfigDocument + ?Sized>(
    document: &mut D,
    entry: &PropertyEntry,
) -> Result<bool, PropfigError> {
    entry.validate()?;
    let profile = entry.profile.as_deref();
    if document.contains(profile, &entry.path) {
        tracing::debug!(key = %entry.path, profile, "entry already present, keeping existing value");
        return Ok(false);
    }
    document.insert(entry)?;
    tracing::debug!(key = %entry.path, profile, "entry inserted");
    Ok(true)
}
