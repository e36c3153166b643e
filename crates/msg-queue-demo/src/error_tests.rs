//! Tests for demo error exit codes.

use super::*;
use msg_queue_runtime::ConfigurationError;
use std::path::PathBuf;

#[test]
fn test_exit_codes_are_stable() {
    let not_configured = DemoError::from(SettingsError::NotConfigured {
        environment: "Development".to_string(),
    });
    assert_eq!(not_configured.exit_code(), 2);

    let missing_file = DemoError::from(SettingsError::FileNotFound {
        path: PathBuf::from("appsettings.json"),
    });
    assert_eq!(missing_file.exit_code(), 1);

    let bad_connection = DemoError::from(QueueError::ConfigurationError(
        ConfigurationError::Missing {
            key: "Endpoint".to_string(),
        },
    ));
    assert_eq!(bad_connection.exit_code(), 1);

    let send_failed = DemoError::from(QueueError::ConnectionFailed {
        message: "refused".to_string(),
    });
    assert_eq!(send_failed.exit_code(), 3);

    let io = DemoError::from(std::io::Error::new(std::io::ErrorKind::Other, "closed"));
    assert_eq!(io.exit_code(), 4);
}

#[test]
fn test_not_configured_message_names_the_environment_file() {
    let error = DemoError::from(SettingsError::NotConfigured {
        environment: "Development".to_string(),
    });

    assert_eq!(
        error.to_string(),
        "Connection string is not configured. Please update appsettings.Development.json."
    );
}
