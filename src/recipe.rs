//! The add-property recipe: select a file, parse it in its own format, merge
//! one entry, hand back the result.
//!
//! Every file is processed on its own. [`AddProperty::apply`] is a pure
//! function of the file's path and content; [`AddProperty::apply_all`] runs
//! it over many files on a worker pool; [`AddProperty::apply_to_path`] wraps
//! it with the read and the (conditional) write.

use std::path::Path;

use rayon::prelude::*;

use crate::error::PropfigError;
use crate::merge::{ConfigDocument, merge};
use crate::options::AddPropertyOptions;
use crate::properties::PropertiesDocument;
use crate::select::FileSelector;
use crate::types::{FileFormat, MergeOutcome, PropertyEntry, SkipReason, SourceFile};
use crate::yaml::YamlDocument;

/// Adds one property to every selected properties or YAML file that does
/// not already define it.
#[derive(Debug, Clone)]
pub struct AddProperty {
    entry: PropertyEntry,
    selector: FileSelector,
}

impl AddProperty {
    /// Build the recipe from its raw inputs.
    ///
    /// `file_patterns` of `["*"]` selects every file.
    pub fn new<I, S>(
        key: &str,
        value: &str,
        comment: Option<&str>,
        profile: Option<&str>,
        file_patterns: I,
    ) -> Result<Self, PropfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entry = PropertyEntry::new(key, value)?;
        if let Some(comment) = comment {
            entry = entry.with_comment(comment);
        }
        if let Some(profile) = profile {
            entry = entry.with_profile(profile)?;
        }
        Ok(Self {
            entry,
            selector: FileSelector::new(file_patterns)?,
        })
    }

    pub fn from_options(options: &AddPropertyOptions) -> Result<Self, PropfigError> {
        Self::new(
            &options.key,
            &options.value,
            options.comment.as_deref(),
            options.profile.as_deref(),
            &options.file_patterns,
        )
    }

    pub fn entry(&self) -> &PropertyEntry {
        &self.entry
    }

    /// Merge the entry into one file.
    ///
    /// Unselected files and unknown formats are skipped without being
    /// parsed. A file that fails to parse yields an error and no content.
    pub fn apply(&self, source: &SourceFile) -> Result<MergeOutcome, PropfigError> {
        if !self.selector.matches(&source.path) {
            tracing::trace!(path = %source.path, "not selected");
            return Ok(MergeOutcome::Skipped(SkipReason::NotSelected));
        }
        let Some(format) = FileFormat::detect(&source.path) else {
            tracing::debug!(path = %source.path, "unsupported format");
            return Ok(MergeOutcome::Skipped(SkipReason::UnsupportedFormat));
        };

        let mut document: Box<dyn ConfigDocument> = match format {
            FileFormat::Properties => Box::new(PropertiesDocument::parse(&source.path, &source.content)?),
            FileFormat::Yaml => Box::new(YamlDocument::parse(&source.path, &source.content)?),
        };

        if merge(document.as_mut(), &self.entry)? {
            Ok(MergeOutcome::Changed(document.render()))
        } else {
            Ok(MergeOutcome::Unchanged)
        }
    }

    /// Apply to every file in parallel, one task per file.
    ///
    /// Results come back in input order. A failing file does not affect the
    /// others.
    pub fn apply_all(&self, sources: &[SourceFile]) -> Vec<Result<MergeOutcome, PropfigError>> {
        sources
            .par_iter()
            .map(|source| {
                self.apply(source).inspect_err(|e| {
                    tracing::warn!(path = %source.path, error = %e, "skipping file");
                })
            })
            .collect()
    }

    /// Read `fs_path`, merge, and write it back if it changed.
    ///
    /// `logical_path` is what the file patterns and format detection see,
    /// typically the path relative to the project root.
    pub fn apply_to_path(
        &self,
        logical_path: &str,
        fs_path: &Path,
    ) -> Result<MergeOutcome, PropfigError> {
        let content = std::fs::read_to_string(fs_path).map_err(|e| PropfigError::IoError {
            path: fs_path.to_path_buf(),
            source: e,
        })?;

        let outcome = self.apply(&SourceFile::new(logical_path, content))?;

        if let MergeOutcome::Changed(updated) = &outcome {
            std::fs::write(fs_path, updated).map_err(|e| PropfigError::IoError {
                path: fs_path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{OPTIONS_FULL, PROPERTIES_HTTP_PORT, YAML_HTTP_PORT, YAML_ROOT_PATH};
    use crate::options::OptionsLoader;
    use std::fs;
    use tempfile::TempDir;

    fn recipe(key: &str, value: &str, comment: Option<&str>, profile: Option<&str>, patterns: &[&str]) -> AddProperty {
        AddProperty::new(key, value, comment, profile, patterns).unwrap()
    }

    fn changed(outcome: Result<MergeOutcome, PropfigError>) -> String {
        match outcome.unwrap() {
            MergeOutcome::Changed(c) => c,
            other => panic!("expected a change, got {other:?}"),
        }
    }

    #[test]
    fn adds_to_both_formats() {
        let r = recipe("quarkus.http.port", "9090", None, None, &["*"]);
        assert_eq!(
            changed(r.apply(&SourceFile::new("application.properties", "quarkus.http.root-path=/api\n"))),
            "quarkus.http.root-path=/api\nquarkus.http.port=9090\n"
        );
        assert_eq!(
            changed(r.apply(&SourceFile::new("application.yml", YAML_ROOT_PATH))),
            "quarkus:\n  http:\n    root-path: /api\n    port: 9090\n"
        );
    }

    #[test]
    fn make_change_to_matching_files() {
        let r = recipe(
            "quarkus.http.root-path",
            "/api",
            Some("This property was added"),
            None,
            &["**/application.properties", "**/application.yml"],
        );
        assert_eq!(
            changed(r.apply(&SourceFile::new(
                "src/main/resources/application.properties",
                PROPERTIES_HTTP_PORT
            ))),
            "quarkus.http.port=9090\n# This property was added\nquarkus.http.root-path=/api\n"
        );
        assert_eq!(
            changed(r.apply(&SourceFile::new("src/main/resources/application.yml", YAML_HTTP_PORT))),
            "quarkus:\n  http:\n    port: 9090\n    # This property was added\n    root-path: /api\n"
        );
    }

    #[test]
    fn do_not_change_files_that_do_not_match() {
        let r = recipe(
            "quarkus.http.root-path",
            "/api",
            None,
            None,
            &["**/application.properties", "**/application.yml"],
        );
        for path in [
            "src/main/resources/application-test.properties",
            "src/main/resources/application-dev.yml",
        ] {
            assert_eq!(
                r.apply(&SourceFile::new(path, PROPERTIES_HTTP_PORT)).unwrap(),
                MergeOutcome::Skipped(SkipReason::NotSelected)
            );
        }
    }

    #[test]
    fn builds_from_loaded_options() {
        let options = OptionsLoader::new()
            .no_env()
            .source("add-property.toml", OPTIONS_FULL)
            .load()
            .unwrap();
        let r = AddProperty::from_options(&options).unwrap();
        assert_eq!(r.entry().profile.as_deref(), Some("dev"));
        assert_eq!(
            changed(r.apply(&SourceFile::new("src/main/resources/application.properties", ""))),
            "# Added by propfig\n%dev.quarkus.http.port=9090\n"
        );
        assert_eq!(
            r.apply(&SourceFile::new("src/main/resources/application-dev.yml", YAML_HTTP_PORT))
                .unwrap(),
            MergeOutcome::Skipped(SkipReason::NotSelected)
        );
    }

    #[test]
    fn unknown_formats_are_skipped() {
        let r = recipe("a", "1", None, None, &["*"]);
        assert_eq!(
            r.apply(&SourceFile::new("pom.xml", "<project/>")).unwrap(),
            MergeOutcome::Skipped(SkipReason::UnsupportedFormat)
        );
    }

    #[test]
    fn existing_entry_is_unchanged() {
        let r = recipe("fred", "fred", None, None, &["*"]);
        let outcome = r
            .apply(&SourceFile::new("application.properties", "fred=doNotChangeThis\n"))
            .unwrap();
        assert_eq!(outcome, MergeOutcome::Unchanged);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(AddProperty::new("a..b", "1", None, None, &["*"]).is_err());
        assert!(AddProperty::new("a", "1", None, Some("de.v"), &["*"]).is_err());
        assert!(AddProperty::new("a", "1", None, None, &["***"]).is_err());
    }

    #[test]
    fn batch_isolates_failures_and_keeps_order() {
        let r = recipe("fred", "fred", None, Some("dev"), &["*"]);
        let sources = vec![
            SourceFile::new("a/application.properties", PROPERTIES_HTTP_PORT),
            SourceFile::new("b/application.yml", "key: [unclosed\n"),
            SourceFile::new("c/application.yml", YAML_ROOT_PATH),
            SourceFile::new("d/notes.txt", "hello"),
        ];
        let results = r.apply_all(&sources);
        assert_eq!(results.len(), 4);
        assert_eq!(
            results[0].as_ref().unwrap().content(),
            Some("quarkus.http.port=9090\n%dev.fred=fred\n")
        );
        assert!(matches!(results[1], Err(PropfigError::Yaml { .. })));
        assert_eq!(
            results[2].as_ref().unwrap().content(),
            Some("quarkus:\n  http:\n    root-path: /api\n\"%dev\":\n  fred: fred\n")
        );
        assert_eq!(
            results[3].as_ref().unwrap(),
            &MergeOutcome::Skipped(SkipReason::UnsupportedFormat)
        );
    }

    #[test]
    fn apply_to_path_writes_only_on_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("application.properties");
        fs::write(&path, PROPERTIES_HTTP_PORT).unwrap();

        let r = recipe("quarkus.http.root-path", "/api", None, None, &["*"]);
        let first = r.apply_to_path("application.properties", &path).unwrap();
        assert!(first.is_changed());
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "quarkus.http.port=9090\nquarkus.http.root-path=/api\n");

        let second = r.apply_to_path("application.properties", &path).unwrap();
        assert_eq!(second, MergeOutcome::Unchanged);
        assert_eq!(fs::read_to_string(&path).unwrap(), written);
    }

    #[test]
    fn apply_to_path_leaves_broken_file_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("application.yml");
        fs::write(&path, "a:\n\t- b\n").unwrap();

        let r = recipe("a.c", "1", None, None, &["*"]);
        assert!(r.apply_to_path("application.yml", &path).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a:\n\t- b\n");
    }

    #[test]
    fn apply_to_path_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let r = recipe("a", "1", None, None, &["*"]);
        let err = r
            .apply_to_path("application.properties", &dir.path().join("missing.properties"))
            .unwrap_err();
        assert!(matches!(err, PropfigError::IoError { .. }));
    }
}
