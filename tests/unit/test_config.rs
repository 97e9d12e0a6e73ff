//! Unit tests for the config module
//!
//! Tests cover:
//! - Defaults
//! - TOML loading with partial sections
//! - Per-collection endpoint overrides
//! - Environment overrides
//! - URL validation

use lectern::config::{Collection, Config};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(toml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(toml.as_bytes()).unwrap();
    file
}

// ============================================================================
// Loading
// ============================================================================

mod load_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.ui.color);
        assert!(config.token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config(
            r#"
base_url = "https://lms.example.com/api/"

[ui]
compact = true
"#,
        );

        let config = Config::load(file.path().to_str()).unwrap();

        assert_eq!(config.base_url, "https://lms.example.com/api/");
        assert!(config.ui.compact);
        assert!(config.ui.color);
        assert_eq!(config.http.connect_timeout_secs, 10);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load(Some("/definitely/not/here.toml")).is_err());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let file = write_config("base_url = [");
        assert!(Config::load(file.path().to_str()).is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config(
            r#"
[http]
timeout_secs = 5
"#,
        );
        std::env::set_var("LECTERN_TIMEOUT", "45");

        let config = Config::load(file.path().to_str()).unwrap();
        std::env::remove_var("LECTERN_TIMEOUT");

        assert_eq!(config.http.timeout_secs, 45);
    }
}

// ============================================================================
// Endpoints
// ============================================================================

mod endpoint_tests {
    use super::*;

    #[test]
    fn test_derived_from_base_url() {
        let config = Config {
            base_url: "https://lms.example.com/api/".into(),
            ..Config::default()
        };
        assert_eq!(
            config.endpoint(Collection::Assignments),
            "https://lms.example.com/api/assignments"
        );
    }

    #[test]
    fn test_explicit_override_wins() {
        let file = write_config(
            r#"
base_url = "https://lms.example.com/api"

[endpoints]
progress = "https://functions.example.net/abc123"
"#,
        );

        let config = Config::load(file.path().to_str()).unwrap();

        assert_eq!(
            config.endpoint(Collection::Progress),
            "https://functions.example.net/abc123"
        );
        assert_eq!(
            config.endpoint(Collection::Courses),
            "https://lms.example.com/api/courses"
        );
    }

    #[test]
    fn test_every_collection_has_a_path() {
        let config = Config::default();
        for collection in Collection::ALL {
            assert!(config.endpoint(collection).ends_with(collection.path()));
        }
    }

    #[test]
    fn test_invalid_url_rejected() {
        let mut config = Config::default();
        config.endpoints.rewards = Some("not a url".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("rewards"));
    }
}
