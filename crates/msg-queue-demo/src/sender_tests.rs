//! Tests for the send loop.

use super::*;
use msg_queue_runtime::{
    InMemoryConfig, InMemoryProvider, PropertyValue, QueueName, QueueProvider,
};
use std::sync::Arc;

fn in_memory_client() -> (QueueClient, Arc<InMemoryProvider>) {
    let provider = Arc::new(InMemoryProvider::new(InMemoryConfig::default()));
    (QueueClient::with_provider(provider.clone()), provider)
}

fn queue() -> QueueName {
    QueueName::new(QUEUE_NAME.to_string()).unwrap()
}

#[test]
fn test_build_message_sets_exactly_two_properties() {
    let message = build_message(42);

    assert_eq!(message.body.as_ref(), MESSAGE_BODY.as_bytes());
    assert_eq!(message.application_properties.len(), 2);
    assert_eq!(
        message.application_properties.get(MESSAGE_NUMBER_PROPERTY),
        Some(&PropertyValue::Int(42))
    );
    assert_eq!(
        message.application_properties.get(SENDER_PROPERTY),
        Some(&PropertyValue::String("MsgSender".to_string()))
    );
}

#[tokio::test]
async fn test_messages_are_numbered_in_order() {
    let (client, provider) = in_memory_client();

    let report = run_sender(&client, 25).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.sent, 25);
    assert_eq!(provider.active_message_count(&queue()).unwrap(), 25);

    for expected in 0..25i64 {
        let received = provider
            .receive_message(&queue(), chrono::Duration::milliseconds(10))
            .await
            .unwrap()
            .expect("message should be available");
        assert_eq!(
            received.property(MESSAGE_NUMBER_PROPERTY).and_then(PropertyValue::as_i64),
            Some(expected)
        );
        provider
            .complete_message(&received.receipt_handle)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_zero_count_sends_nothing() {
    let (client, provider) = in_memory_client();

    let report = run_sender(&client, 0).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.sent, 0);
    assert_eq!(provider.active_message_count(&queue()).unwrap(), 0);
}

#[tokio::test]
async fn test_first_error_stops_the_loop() {
    let provider = Arc::new(InMemoryProvider::new(InMemoryConfig {
        max_queue_size: 3,
        ..InMemoryConfig::default()
    }));
    let client = QueueClient::with_provider(provider.clone());

    let report = run_sender(&client, 10).await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.sent, 3);
    assert!(matches!(
        report.error,
        Some(QueueError::ProviderError { ref code, .. }) if code == "QuotaExceeded"
    ));
    assert_eq!(provider.active_message_count(&queue()).unwrap(), 3);
}

#[tokio::test]
async fn test_send_loop_reports_closed_sender() {
    let (client, _provider) = in_memory_client();
    let sender = client.create_sender(QUEUE_NAME).unwrap();
    sender.close().await.unwrap();

    let report = send_numbered_messages(&sender, 5).await;

    assert_eq!(report.sent, 0);
    assert!(matches!(report.error, Some(QueueError::ClientClosed)));
}

#[tokio::test]
async fn test_closed_client_cannot_open_sender() {
    let (client, _provider) = in_memory_client();
    client.close().await.unwrap();

    let result = run_sender(&client, 5).await;

    assert!(matches!(result, Err(QueueError::ClientClosed)));
}
