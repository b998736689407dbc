//! Structural, format-preserving property merges for `application.properties`
//! and `application.yml` files, plus a typed call-site rewrite rule.
//!
//! Propfig adds one configuration entry to every selected file that does not
//! already define it. It edits the document's structure, not its text: a
//! dotted key becomes a flat `a.b.c=v` line in a properties file and a nested
//! mapping in YAML, merged into whatever part of that mapping already exists.
//!
//! ```ignore
//! let recipe = AddProperty::new(
//!     "quarkus.http.root-path",
//!     "/api",
//!     Some("This property was added"),
//!     None,
//!     ["**/application.properties", "**/application.yml"],
//! )?;
//! let outcome = recipe.apply(&SourceFile::new("src/main/resources/application.yml", content))?;
//! ```
//!
//! # Existing wins
//!
//! A merge never overwrites. When the key is already present (in the same
//! profile) the file is [`Unchanged`](MergeOutcome::Unchanged); that is a
//! normal outcome, not an error. Running a recipe twice is the same as
//! running it once.
//!
//! # Untouched text
//!
//! Every line the merge does not add is written back byte for byte:
//! comments, blank lines, quoting, key order, line endings. New lines go
//! where a person would put them:
//!
//! - **Properties**: appended at the end of the file, after an optional
//!   `# comment` line.
//! - **YAML**: under the deepest existing mapping on the key's path, after
//!   its last child, with missing intermediate mappings created on the way
//!   and the indentation of the surrounding document.
//!
//! # Profiles
//!
//! An entry can be scoped to a deployment profile such as `dev`:
//!
//! | Format | Scoped entry |
//! |--------|--------------|
//! | Properties | `%dev.quarkus.http.port=9090` |
//! | YAML | `"%dev":` top-level mapping holding `quarkus: http: port: 9090` |
//!
//! The same key in another profile, or unscoped, does not count as present.
//!
//! # Selecting files
//!
//! [`AddProperty`] takes glob patterns matched against each file's logical,
//! `/`-separated path. `**/application.yml` selects the file at any depth;
//! the single pattern `*` selects everything. Unselected files and files of
//! other formats come back as [`Skipped`](MergeOutcome::Skipped).
//!
//! # Batches
//!
//! Files are independent. [`AddProperty::apply_all`] processes a batch on a
//! rayon pool and returns one result per file, in input order; a file that
//! fails to parse fails alone. [`AddProperty::apply_to_path`] reads a file
//! from disk and writes it back only when it changed.
//!
//! # Options
//!
//! Recipe inputs can be loaded as [`AddPropertyOptions`] through
//! [`OptionsLoader`], which layers compiled defaults, TOML options files,
//! `PROPFIG__*` environment variables and programmatic overrides:
//!
//! | Env var | Option |
//! |---------|--------|
//! | `PROPFIG__KEY` | `key` |
//! | `PROPFIG__FILE_PATTERNS` | `file_patterns` (comma-separated) |
//!
//! Unknown keys in options files are rejected with their line number unless
//! strict mode is turned off. [`AddPropertyOptions::template`] prints a
//! commented template of every option.
//!
//! # Call-site rewrites
//!
//! The [`rewrite`] module holds [`StaticDispatchRule`], which turns
//! `entity.flush()` into `Person.flush()` when `PanacheEntityBase` methods
//! became static. It scans a host's method invocations, schedules one edit
//! per resolvable call in a [`RewritePlan`], and applies the plan only after
//! the scan.
//!
//! # Logging
//!
//! Propfig emits `tracing` events (`path`, `key`, `profile` fields) and never
//! installs a subscriber.

pub mod error;
pub mod merge;
pub mod path;
pub mod properties;
pub mod recipe;
pub mod rewrite;
pub mod select;
pub mod types;
pub mod yaml;

mod env;
mod lines;
mod options;
mod resolve;
mod validate;

#[cfg(test)]
mod fixtures;

pub use error::PropfigError;
pub use merge::{ConfigDocument, merge};
pub use options::{AddPropertyOptions, DEFAULT_ENV_PREFIX, OptionsLoader};
pub use path::ConfigKeyPath;
pub use properties::PropertiesDocument;
pub use recipe::AddProperty;
pub use rewrite::{
    CompilationUnit, MethodInvocation, MethodMatcher, RewritePlan, ScheduledEdit,
    StaticDispatchRule, StaticTargetRewriter, TypeResolver,
};
pub use select::FileSelector;
pub use types::{FileFormat, MergeOutcome, PropertyEntry, SkipReason, SourceFile};
pub use yaml::YamlDocument;
