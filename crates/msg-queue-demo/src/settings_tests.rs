//! Tests for layered settings.

use super::*;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

const REAL_CONNECTION: &str = "Endpoint=sb://demo-ns.servicebus.windows.net/;SharedAccessKeyName=listen;SharedAccessKey=abc=";

fn write_settings(dir: &TempDir, file: &str, connection_string: &str) {
    let contents = format!(
        "{{ \"azure_service_bus\": {{ \"connection_string\": \"{}\" }} }}",
        connection_string
    );
    fs::write(dir.path().join(file), contents).unwrap();
}

fn no_env() -> HashMap<String, String> {
    HashMap::new()
}

#[test]
fn test_missing_base_file_is_reported() {
    let dir = TempDir::new().unwrap();

    let result = SettingsLoader::new(dir.path(), "Production")
        .with_env_source(no_env())
        .load();

    match result {
        Err(SettingsError::FileNotFound { path }) => {
            assert!(path.ends_with(BASE_SETTINGS_FILE));
        }
        other => panic!("Expected FileNotFound, got: {:?}", other),
    }
}

#[test]
fn test_base_file_only() {
    let dir = TempDir::new().unwrap();
    write_settings(&dir, "appsettings.json", REAL_CONNECTION);

    let settings = SettingsLoader::new(dir.path(), "Production")
        .with_env_source(no_env())
        .load()
        .unwrap();

    assert_eq!(
        settings.azure_service_bus.connection_string.as_deref(),
        Some(REAL_CONNECTION)
    );
}

#[test]
fn test_environment_file_overrides_base() {
    let dir = TempDir::new().unwrap();
    write_settings(&dir, "appsettings.json", "Placeholder");
    write_settings(&dir, "appsettings.Development.json", REAL_CONNECTION);

    let development = SettingsLoader::new(dir.path(), "Development")
        .with_env_source(no_env())
        .load()
        .unwrap();
    assert_eq!(
        development.azure_service_bus.connection_string.as_deref(),
        Some(REAL_CONNECTION)
    );

    // Another environment ignores the Development overlay
    let production = SettingsLoader::new(dir.path(), "Production")
        .with_env_source(no_env())
        .load()
        .unwrap();
    assert_eq!(
        production.azure_service_bus.connection_string.as_deref(),
        Some("Placeholder")
    );
}

#[test]
fn test_environment_variables_override_files() {
    let dir = TempDir::new().unwrap();
    write_settings(&dir, "appsettings.json", "Placeholder");
    write_settings(&dir, "appsettings.Development.json", "Placeholder too");

    let mut variables = HashMap::new();
    variables.insert(
        "MSG_QUEUE__AZURE_SERVICE_BUS__CONNECTION_STRING".to_string(),
        REAL_CONNECTION.to_string(),
    );
    variables.insert("UNRELATED".to_string(), "ignored".to_string());

    let settings = SettingsLoader::new(dir.path(), "Development")
        .with_env_source(variables)
        .load()
        .unwrap();

    assert_eq!(
        settings.azure_service_bus.connection_string.as_deref(),
        Some(REAL_CONNECTION)
    );
}

#[test]
fn test_empty_base_file_yields_no_connection_string() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("appsettings.json"), "{}").unwrap();

    let settings = SettingsLoader::new(dir.path(), "Production")
        .with_env_source(no_env())
        .load()
        .unwrap();

    assert!(settings.azure_service_bus.connection_string.is_none());
}

#[test]
fn test_malformed_json_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("appsettings.json"), "{ not json").unwrap();

    let result = SettingsLoader::new(dir.path(), "Production")
        .with_env_source(no_env())
        .load();

    assert!(matches!(result, Err(SettingsError::Load(_))));
}

#[test]
fn test_resolve_rejects_blank_and_placeholder() {
    let settings = |value: Option<&str>| DemoSettings {
        azure_service_bus: ServiceBusSettings {
            connection_string: value.map(str::to_string),
        },
    };

    let rejected_values = [
        None,
        Some(""),
        Some("   "),
        Some("Placeholder"),
        Some("Endpoint=Placeholder;"),
    ];
    for rejected in rejected_values {
        let result = resolve_connection_string(&settings(rejected), "Development");
        match result {
            Err(SettingsError::NotConfigured { environment }) => {
                assert_eq!(environment, "Development")
            }
            other => panic!("Expected NotConfigured for {:?}, got: {:?}", rejected, other),
        }
    }

    assert_eq!(
        resolve_connection_string(&settings(Some(REAL_CONNECTION)), "Production").unwrap(),
        REAL_CONNECTION
    );
}

#[test]
fn test_debug_redacts_connection_string() {
    let settings = ServiceBusSettings {
        connection_string: Some(REAL_CONNECTION.to_string()),
    };
    let rendered = format!("{:?}", settings);
    assert!(rendered.contains("<REDACTED>"));
    assert!(!rendered.contains("SharedAccessKey"));
}

#[test]
#[serial]
fn test_environment_name_defaults_to_production() {
    std::env::remove_var(ENVIRONMENT_VARIABLE);
    assert_eq!(environment_name(), "Production");

    std::env::set_var(ENVIRONMENT_VARIABLE, "  ");
    assert_eq!(environment_name(), "Production");

    std::env::set_var(ENVIRONMENT_VARIABLE, "Development");
    assert_eq!(environment_name(), "Development");

    std::env::remove_var(ENVIRONMENT_VARIABLE);
}

#[test]
#[serial]
fn test_process_environment_is_used_by_default() {
    let dir = TempDir::new().unwrap();
    write_settings(&dir, "appsettings.json", "Placeholder");
    std::env::set_var("MSG_QUEUE__AZURE_SERVICE_BUS__CONNECTION_STRING", REAL_CONNECTION);

    let result = SettingsLoader::new(dir.path(), "Production").load();
    std::env::remove_var("MSG_QUEUE__AZURE_SERVICE_BUS__CONNECTION_STRING");

    assert_eq!(
        result.unwrap().azure_service_bus.connection_string.as_deref(),
        Some(REAL_CONNECTION)
    );
}
