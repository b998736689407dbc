#[cfg(test)]
pub mod test {
    use crate::types::PropertyEntry;

    pub const PROPERTIES_HTTP_PORT: &str = "quarkus.http.port=9090\n";

    pub const YAML_HTTP_PORT: &str = "quarkus:\n  http:\n    port: 9090\n";

    pub const YAML_ROOT_PATH: &str = "quarkus:\n  http:\n    root-path: /api\n";

    /// An unscoped entry without comment.
    pub fn entry(key: &str, value: &str) -> PropertyEntry {
        PropertyEntry::new(key, value).unwrap()
    }

    /// An entry scoped to `profile`.
    pub fn profiled(key: &str, value: &str, profile: &str) -> PropertyEntry {
        entry(key, value).with_profile(profile).unwrap()
    }

    // -- Options files ----------------------------------------------------------

    pub const OPTIONS_FULL: &str = r#"
key = "quarkus.http.port"
value = "9090"
comment = "Added by propfig"
profile = "dev"
file_patterns = ["**/application.properties", "**/application.yml"]
"#;

    pub const OPTIONS_MINIMAL: &str = r#"
key = "quarkus.http.port"
value = "9090"
"#;

    #[test]
    fn fixtures_are_well_formed() {
        assert_eq!(profiled("fred", "fred", "dev").profile.as_deref(), Some("dev"));
        assert!(OPTIONS_FULL.parse::<toml::Table>().is_ok());
        assert!(OPTIONS_MINIMAL.parse::<toml::Table>().is_ok());
    }
}
