//! Loading client configuration from disk.

use std::io::Write;
use std::time::Duration;

use keepalive_client::config::{load_config, ConfigError, LogFormat, ValidationError};
use keepalive_client::Client;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_and_applies_config() {
    let file = write_config(
        r#"
        [timeouts]
        connect_ms = 750
        response_ms = 0

        [pool]
        max_idle_per_host = 4

        [logging]
        level = "debug"
        format = "compact"
        "#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.pool.max_idle_per_host, 4);
    assert_eq!(config.pool.idle_timeout_secs, 90);
    assert_eq!(config.logging.format, LogFormat::Compact);

    let client = Client::from_config(&config);
    let defaults = client.timeout_defaults();
    assert_eq!(defaults.connect, Duration::from_millis(750));
    assert_eq!(defaults.response, Duration::from_millis(5000));
}

#[test]
fn reports_all_validation_errors() {
    let file = write_config(
        r#"
        [pool]
        max_idle_per_host = 0
        idle_timeout_secs = 0

        [logging]
        level = "verbose"
        "#,
    );

    match load_config(file.path()) {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 3);
            assert!(errors.contains(&ValidationError::UnknownLogLevel("verbose".into())));
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let file = write_config("[pool\nmax_idle_per_host = ");
    assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
    assert!(err.to_string().starts_with("IO error: "));
}
