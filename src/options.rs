//! Recipe options and their layered loading.
//!
//! [`AddPropertyOptions`] is the typed input of the add-property recipe. It
//! can be built directly, or loaded through [`OptionsLoader`] from sparse
//! layers:
//!
//! ```text
//! Compiled defaults     #[config(default = ...)]
//!        ↑ overridden by
//! Options files         in the order added, later files win
//!        ↑ overridden by
//! Environment vars      PROPFIG__KEY, PROPFIG__FILE_PATTERNS=a,b
//!        ↑ overridden by
//! Overrides             .set("profile", "dev")
//! ```
//!
//! ```ignore
//! let options = OptionsLoader::new()
//!     .file("add-property.toml")?
//!     .set("profile", "dev")
//!     .load()?;
//! let recipe = AddProperty::from_options(&options)?;
//! ```

use std::path::{Path, PathBuf};

use confique::Config;
use serde::Serialize;

use crate::error::PropfigError;
use crate::resolve::{self, ResolveInput};

/// Default prefix for option environment variables.
pub const DEFAULT_ENV_PREFIX: &str = "PROPFIG";

/// Inputs of the add-property recipe.
#[derive(Config, Serialize, Debug, Clone, PartialEq)]
pub struct AddPropertyOptions {
    /// Dotted key of the property to add, e.g. `quarkus.http.port`.
    pub key: String,

    /// Value written when the property is absent.
    pub value: String,

    /// Comment written on the line above the new entry.
    pub comment: Option<String>,

    /// Deployment profile the entry is scoped to, e.g. `dev`.
    pub profile: Option<String>,

    /// Glob patterns selecting the files to edit. `*` selects every file.
    #[config(default = ["*"])]
    pub file_patterns: Vec<String>,
}

impl AddPropertyOptions {
    /// A commented TOML template documenting every option.
    pub fn template() -> String {
        confique::toml::template::<Self>(confique::toml::FormatOptions::default())
    }
}

/// Builder that resolves [`AddPropertyOptions`] from files, environment
/// variables and overrides.
#[derive(Debug, Clone)]
pub struct OptionsLoader {
    files: Vec<(PathBuf, String)>,
    env_prefix: Option<String>,
    env_vars: Option<Vec<(String, String)>>,
    strict: bool,
    overrides: Vec<(String, toml::Value)>,
}

impl Default for OptionsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionsLoader {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            env_prefix: Some(DEFAULT_ENV_PREFIX.to_string()),
            env_vars: None,
            strict: true,
            overrides: Vec::new(),
        }
    }

    /// Read an options file. A missing file is skipped; other I/O errors
    /// are returned.
    pub fn file(mut self, path: impl AsRef<Path>) -> Result<Self, PropfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => self.files.push((path.to_path_buf(), content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "options file not found, skipping");
            }
            Err(e) => {
                return Err(PropfigError::IoError {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        }
        Ok(self)
    }

    /// Add options file content that is already in memory. `origin` is used
    /// in error messages.
    pub fn source(mut self, origin: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.push((origin.into(), content.into()));
        self
    }

    /// Override the environment variable prefix (default `PROPFIG`).
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    /// Disable environment variable loading entirely.
    pub fn no_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Read variables from `vars` instead of the process environment.
    pub fn env_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env_vars = Some(vars.into_iter().collect());
        self
    }

    /// Enable or disable strict mode (default: `true`). In strict mode,
    /// unknown keys in options files are errors.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set one option at the highest priority.
    pub fn set(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.overrides.push((key.to_string(), value.into()));
        self
    }

    /// Resolve all layers into options.
    pub fn load(self) -> Result<AddPropertyOptions, PropfigError> {
        let env_vars = match (&self.env_prefix, self.env_vars) {
            (None, _) => Vec::new(),
            (Some(_), Some(vars)) => vars,
            (Some(_), None) => std::env::vars().collect(),
        };
        resolve::resolve(ResolveInput {
            files: self.files,
            env_vars,
            env_prefix: self.env_prefix,
            list_keys: vec!["file_patterns"],
            overrides: self.overrides,
            strict: self.strict,
        })
    }
}
