//! Common test utilities for the msg-queue end-to-end tests
//!
//! This module provides:
//! - A recording provider that wraps the in-memory provider and counts sends
//!   and completions per message
//! - Helpers for waiting on queue state

use async_trait::async_trait;
use chrono::Duration;
use msg_queue_runtime::{
    InMemoryConfig, InMemoryProvider, Message, MessageId, PropertyValue, ProviderType,
    QueueError, QueueName, QueueProvider, ReceiptHandle, ReceivedMessage, Timestamp,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Recording Provider
// ============================================================================

/// In-memory provider that records what passes through it
#[allow(dead_code)]
pub struct RecordingProvider {
    inner: InMemoryProvider,
    sent_properties: Mutex<Vec<HashMap<String, PropertyValue>>>,
    completions: Mutex<HashMap<String, usize>>,
    send_attempts: AtomicUsize,
    fail_sends_after: Option<usize>,
}

#[allow(dead_code)]
impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            inner: InMemoryProvider::new(InMemoryConfig::default()),
            sent_properties: Mutex::new(Vec::new()),
            completions: Mutex::new(HashMap::new()),
            send_attempts: AtomicUsize::new(0),
            fail_sends_after: None,
        }
    }

    /// Accept `accepted` sends, then fail every later one
    pub fn failing_after(accepted: usize) -> Self {
        Self {
            fail_sends_after: Some(accepted),
            ..Self::new()
        }
    }

    /// Application properties of every accepted message, in send order
    pub fn sent_properties(&self) -> Vec<HashMap<String, PropertyValue>> {
        self.sent_properties.lock().unwrap().clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    /// Number of completions recorded per message ID
    pub fn completions(&self) -> HashMap<String, usize> {
        self.completions.lock().unwrap().clone()
    }

    pub fn completed_count(&self) -> usize {
        self.completions.lock().unwrap().values().sum()
    }

    pub fn active_message_count(&self, queue: &QueueName) -> usize {
        self.inner.active_message_count(queue).unwrap()
    }

    pub fn locked_message_count(&self, queue: &QueueName) -> usize {
        self.inner.locked_message_count(queue).unwrap()
    }
}

#[async_trait]
impl QueueProvider for RecordingProvider {
    async fn send_message(
        &self,
        queue: &QueueName,
        message: &Message,
    ) -> Result<MessageId, QueueError> {
        let attempt = self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if matches!(self.fail_sends_after, Some(limit) if attempt >= limit) {
            return Err(QueueError::ConnectionFailed {
                message: "connection reset by test".to_string(),
            });
        }

        let id = self.inner.send_message(queue, message).await?;
        self.sent_properties
            .lock()
            .unwrap()
            .push(message.application_properties.clone());
        Ok(id)
    }

    async fn receive_message(
        &self,
        queue: &QueueName,
        timeout: Duration,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        self.inner.receive_message(queue, timeout).await
    }

    async fn complete_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        self.inner.complete_message(receipt).await?;
        *self
            .completions
            .lock()
            .unwrap()
            .entry(receipt.message_id().to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn abandon_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        self.inner.abandon_message(receipt).await
    }

    async fn renew_message_lock(&self, receipt: &ReceiptHandle) -> Result<Timestamp, QueueError> {
        self.inner.renew_message_lock(receipt).await
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Queue name the demo programs use
#[allow(dead_code)]
pub fn msg_queue() -> QueueName {
    QueueName::new(msg_queue_demo::QUEUE_NAME.to_string()).unwrap()
}

/// Resolves once `expected` completions have been recorded
#[allow(dead_code)]
pub async fn completions_reach(
    provider: Arc<RecordingProvider>,
    expected: usize,
) -> std::io::Result<()> {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(120);
    while provider.completed_count() < expected {
        if tokio::time::Instant::now() > deadline {
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!(
                    "only {} of {} messages completed",
                    provider.completed_count(),
                    expected
                ),
            ));
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    Ok(())
}
