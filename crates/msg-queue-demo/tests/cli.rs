//! Exit-code tests for the demo binaries.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const OVERRIDE_VAR: &str = "MSG_QUEUE__AZURE_SERVICE_BUS__CONNECTION_STRING";

fn binary(name: &str) -> Command {
    let mut cmd = Command::cargo_bin(name).unwrap();
    cmd.env_remove("AZURE_SERVICEBUS_CONNECTION_STRING")
        .env_remove("MSG_QUEUE_ENVIRONMENT")
        .env_remove(OVERRIDE_VAR)
        .env_remove("RUST_LOG");
    cmd
}

fn config_dir(connection_string: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("appsettings.json"),
        format!(
            r#"{{ "azure_service_bus": {{ "connection_string": "{}" }} }}"#,
            connection_string
        ),
    )
    .unwrap();
    dir
}

#[test]
fn test_configured_receiver_refuses_placeholder() {
    let dir = config_dir("Placeholder");

    binary("msg-receiver-configured")
        .arg("--config-dir")
        .arg(dir.path())
        .arg("--environment")
        .arg("Development")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains(
            "Connection string is not configured. Please update appsettings.Development.json.",
        ));
}

#[test]
fn test_configured_receiver_refuses_blank_connection_string() {
    let dir = config_dir("   ");

    binary("msg-receiver-configured")
        .arg("-d")
        .arg(dir.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("appsettings.Production.json"));
}

#[test]
fn test_configured_receiver_checks_env_override() {
    let dir = config_dir(
        "Endpoint=sb://real.servicebus.windows.net/;SharedAccessKeyName=k;SharedAccessKey=v",
    );

    binary("msg-receiver-configured")
        .arg("-d")
        .arg(dir.path())
        .env(OVERRIDE_VAR, "Placeholder")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_configured_receiver_without_base_file() {
    let dir = TempDir::new().unwrap();

    binary("msg-receiver-configured")
        .arg("-d")
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("appsettings.json"));
}

#[test]
fn test_sender_with_placeholder_connection_string() {
    binary("msg-sender")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_receiver_with_placeholder_connection_string() {
    binary("msg-receiver")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_invalid_log_level_is_rejected() {
    binary("msg-receiver")
        .args(["--log-level", "msg_queue_runtime=notalevel"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("log level"));
}

#[test]
fn test_help_lists_flags() {
    binary("msg-sender")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--connection-string"))
        .stdout(predicate::str::contains("--json-logs"));
}
