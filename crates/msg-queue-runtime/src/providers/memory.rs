//! In-memory queue provider implementation for testing and development.
//!
//! This module provides an in-process queue that mirrors the peek-lock model of
//! Service Bus:
//! - FIFO delivery per queue, ordered by sequence number
//! - Locks that expire after `lock_duration`, returning the message to the queue
//! - Abandon and lock renewal
//! - Message time-to-live
//!
//! Queues are created on first use. Dead-lettering is not modelled; a message
//! is redelivered until it is completed or its time-to-live passes.

use crate::client::QueueProvider;
use crate::error::QueueError;
use crate::message::{
    Message, MessageId, PropertyValue, QueueName, ReceiptHandle, ReceivedMessage, Timestamp,
};
use crate::provider::{InMemoryConfig, ProviderType};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use tokio::sync::Notify;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Longest a waiting receive sleeps before re-checking for expired locks
const POLL_INTERVAL_MS: u64 = 100;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Storage for all queues
struct QueueStorage {
    queues: HashMap<QueueName, InMemoryQueue>,
    config: InMemoryConfig,
}

impl QueueStorage {
    fn new(config: InMemoryConfig) -> Self {
        Self {
            queues: HashMap::new(),
            config,
        }
    }

    /// Get or create a queue
    fn get_or_create_queue(&mut self, queue_name: &QueueName) -> &mut InMemoryQueue {
        self.queues
            .entry(queue_name.clone())
            .or_insert_with(InMemoryQueue::new)
    }
}

/// Internal state for a single queue
struct InMemoryQueue {
    /// Available messages, ascending by sequence number
    messages: VecDeque<StoredMessage>,
    /// Locked messages keyed by lock token
    in_flight: HashMap<String, InFlightMessage>,
    next_sequence_number: i64,
}

impl InMemoryQueue {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            in_flight: HashMap::new(),
            next_sequence_number: 1,
        }
    }

    fn len(&self) -> usize {
        self.messages.len() + self.in_flight.len()
    }

    /// Return a message to the available set, keeping sequence order
    fn restore(&mut self, message: StoredMessage) {
        let position = self
            .messages
            .partition_point(|m| m.sequence_number < message.sequence_number);
        self.messages.insert(position, message);
    }

    /// Move messages whose lock has lapsed back to the available set
    fn reclaim_expired_locks(&mut self) -> usize {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, in_flight)| in_flight.is_expired())
            .map(|(token, _)| token.clone())
            .collect();

        for token in &expired {
            if let Some(in_flight) = self.in_flight.remove(token) {
                self.restore(in_flight.message);
            }
        }

        expired.len()
    }

    /// Drop messages at the head of the queue whose time-to-live has passed
    fn discard_expired_head(&mut self) {
        while self.messages.front().is_some_and(StoredMessage::is_expired) {
            if let Some(expired) = self.messages.pop_front() {
                tracing::debug!(
                    message_id = %expired.message_id,
                    "Discarding message past its time-to-live"
                );
            }
        }
    }
}

/// A message stored in the queue with metadata
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: Bytes,
    application_properties: HashMap<String, PropertyValue>,
    correlation_id: Option<String>,
    content_type: Option<String>,
    sequence_number: i64,
    enqueued_at: Timestamp,
    delivery_count: u32,
    expires_at: Option<Timestamp>,
}

impl StoredMessage {
    fn from_message(message: &Message, message_id: MessageId, sequence_number: i64) -> Self {
        let now = Timestamp::now();
        let expires_at = message
            .time_to_live
            .map(|ttl| Timestamp::from_datetime(now.as_datetime() + ttl));

        Self {
            message_id,
            body: message.body.clone(),
            application_properties: message.application_properties.clone(),
            correlation_id: message.correlation_id.clone(),
            content_type: message.content_type.clone(),
            sequence_number,
            enqueued_at: now,
            delivery_count: 0,
            expires_at,
        }
    }

    /// Check if message is expired based on TTL
    fn is_expired(&self) -> bool {
        if let Some(ref expires_at) = self.expires_at {
            Timestamp::now() >= *expires_at
        } else {
            false
        }
    }
}

/// A message currently locked to a receiver
struct InFlightMessage {
    message: StoredMessage,
    lock_expires_at: Timestamp,
}

impl InFlightMessage {
    fn is_expired(&self) -> bool {
        Timestamp::now() >= self.lock_expires_at
    }
}

// ============================================================================
// InMemoryProvider
// ============================================================================

/// In-memory queue provider implementation
pub struct InMemoryProvider {
    storage: Arc<RwLock<QueueStorage>>,
    available: Arc<Notify>,
    lock_duration: Duration,
}

impl InMemoryProvider {
    /// Create new in-memory provider with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        let lock_duration = config.lock_duration;
        Self {
            storage: Arc::new(RwLock::new(QueueStorage::new(config))),
            available: Arc::new(Notify::new()),
            lock_duration,
        }
    }

    /// Number of messages waiting to be received
    pub fn active_message_count(&self, queue: &QueueName) -> Result<usize, QueueError> {
        let mut storage = self.storage()?;
        Ok(storage.queues.get_mut(queue).map_or(0, |q| {
            q.reclaim_expired_locks();
            q.messages.len()
        }))
    }

    /// Number of messages currently locked to a receiver
    pub fn locked_message_count(&self, queue: &QueueName) -> Result<usize, QueueError> {
        let mut storage = self.storage()?;
        Ok(storage.queues.get_mut(queue).map_or(0, |q| {
            q.reclaim_expired_locks();
            q.in_flight.len()
        }))
    }

    fn storage(&self) -> Result<RwLockWriteGuard<'_, QueueStorage>, QueueError> {
        self.storage.write().map_err(|_| QueueError::ProviderError {
            provider: ProviderType::InMemory.to_string(),
            code: "StoragePoisoned".to_string(),
            message: "queue storage lock was poisoned by a panicking thread".to_string(),
        })
    }

    /// Lock the next available message, if any
    fn try_receive(&self, queue_name: &QueueName) -> Result<Option<ReceivedMessage>, QueueError> {
        let mut storage = self.storage()?;
        let queue = storage.get_or_create_queue(queue_name);

        if queue.reclaim_expired_locks() > 0 {
            tracing::debug!(queue = %queue_name, "Reclaimed messages with expired locks");
        }
        queue.discard_expired_head();

        let Some(mut stored) = queue.messages.pop_front() else {
            return Ok(None);
        };

        stored.delivery_count += 1;
        let lock_token = uuid::Uuid::new_v4().to_string();
        let lock_expires_at = Timestamp::after(self.lock_duration);

        let received = ReceivedMessage {
            message_id: stored.message_id.clone(),
            body: stored.body.clone(),
            application_properties: stored.application_properties.clone(),
            correlation_id: stored.correlation_id.clone(),
            content_type: stored.content_type.clone(),
            sequence_number: stored.sequence_number,
            delivery_count: stored.delivery_count,
            enqueued_at: stored.enqueued_at.clone(),
            receipt_handle: ReceiptHandle::new(
                queue_name.clone(),
                stored.message_id.clone(),
                lock_token.clone(),
                lock_expires_at.clone(),
                ProviderType::InMemory,
            ),
        };

        queue.in_flight.insert(
            lock_token,
            InFlightMessage {
                message: stored,
                lock_expires_at,
            },
        );

        Ok(Some(received))
    }

    /// Remove the in-flight entry a receipt refers to
    fn take_in_flight(&self, receipt: &ReceiptHandle) -> Result<StoredMessage, QueueError> {
        let mut storage = self.storage()?;
        let queue = storage
            .queues
            .get_mut(receipt.queue())
            .ok_or_else(|| lock_lost(receipt))?;

        queue.reclaim_expired_locks();
        match queue.in_flight.remove(receipt.lock_token()) {
            Some(in_flight) if &in_flight.message.message_id == receipt.message_id() => {
                Ok(in_flight.message)
            }
            Some(in_flight) => {
                queue
                    .in_flight
                    .insert(receipt.lock_token().to_string(), in_flight);
                Err(lock_lost(receipt))
            }
            None => Err(lock_lost(receipt)),
        }
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

fn lock_lost(receipt: &ReceiptHandle) -> QueueError {
    QueueError::MessageNotFound {
        receipt: receipt.to_string(),
    }
}

#[async_trait]
impl QueueProvider for InMemoryProvider {
    async fn send_message(
        &self,
        queue: &QueueName,
        message: &Message,
    ) -> Result<MessageId, QueueError> {
        let message_id = message.message_id.clone().unwrap_or_default();

        {
            let mut storage = self.storage()?;
            let max_queue_size = storage.config.max_queue_size;
            let target = storage.get_or_create_queue(queue);

            if target.len() >= max_queue_size {
                return Err(QueueError::ProviderError {
                    provider: ProviderType::InMemory.to_string(),
                    code: "QuotaExceeded".to_string(),
                    message: format!(
                        "queue '{}' already holds {} messages",
                        queue, max_queue_size
                    ),
                });
            }

            let sequence_number = target.next_sequence_number;
            target.next_sequence_number += 1;
            target.messages.push_back(StoredMessage::from_message(
                message,
                message_id.clone(),
                sequence_number,
            ));
        }

        self.available.notify_waiters();
        Ok(message_id)
    }

    async fn receive_message(
        &self,
        queue: &QueueName,
        timeout: Duration,
    ) -> Result<Option<ReceivedMessage>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout.to_std().unwrap_or_default();

        loop {
            // Register interest before checking so a concurrent send is not missed
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(received) = self.try_receive(queue)? {
                return Ok(Some(received));
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let poll = std::time::Duration::from_millis(POLL_INTERVAL_MS);
            let wake_at = deadline.min(now + poll);
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn complete_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        self.take_in_flight(receipt)?;
        Ok(())
    }

    async fn abandon_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        let message = self.take_in_flight(receipt)?;
        {
            let mut storage = self.storage()?;
            storage.get_or_create_queue(receipt.queue()).restore(message);
        }
        self.available.notify_waiters();
        Ok(())
    }

    async fn renew_message_lock(&self, receipt: &ReceiptHandle) -> Result<Timestamp, QueueError> {
        let mut storage = self.storage()?;
        let queue = storage
            .queues
            .get_mut(receipt.queue())
            .ok_or_else(|| lock_lost(receipt))?;

        queue.reclaim_expired_locks();
        let in_flight = queue
            .in_flight
            .get_mut(receipt.lock_token())
            .filter(|in_flight| &in_flight.message.message_id == receipt.message_id())
            .ok_or_else(|| lock_lost(receipt))?;

        in_flight.lock_expires_at = Timestamp::after(self.lock_duration);
        Ok(in_flight.lock_expires_at.clone())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }
}
