//! Tests for the demo library constants.

use super::*;

#[test]
fn test_queue_name_is_a_valid_queue() {
    assert!(msg_queue_runtime::QueueName::new(QUEUE_NAME.to_string()).is_ok());
}

#[test]
fn test_message_body_fits_service_bus_limit() {
    assert!(
        MESSAGE_BODY.len()
            < msg_queue_runtime::ProviderType::AzureServiceBus.max_message_size()
    );
}

#[test]
fn test_placeholder_is_not_a_connection_string() {
    assert!(PLACEHOLDER_CONNECTION_STRING
        .parse::<msg_queue_runtime::ServiceBusConnectionString>()
        .is_err());
}
