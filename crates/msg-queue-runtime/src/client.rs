//! Client traits and implementations for queue operations.

use crate::error::{ConfigurationError, QueueError};
use crate::message::{Message, MessageId, QueueName, ReceiptHandle, ReceivedMessage, Timestamp};
use crate::processor::{ProcessorOptions, QueueProcessor};
use crate::provider::{
    AzureServiceBusConfig, InMemoryConfig, ProviderConfig, ProviderType, QueueConfig,
};
use crate::providers::{AzureServiceBusProvider, InMemoryProvider};
use crate::sender::QueueSender;
use async_trait::async_trait;
use chrono::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Interface implemented by specific queue providers (Azure, in-memory)
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Send single message
    async fn send_message(
        &self,
        queue: &QueueName,
        message: &Message,
    ) -> Result<MessageId, QueueError>;

    /// Receive single message under a peek-lock, waiting up to `timeout`
    async fn receive_message(
        &self,
        queue: &QueueName,
        timeout: Duration,
    ) -> Result<Option<ReceivedMessage>, QueueError>;

    /// Complete message processing
    async fn complete_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError>;

    /// Abandon message for redelivery
    async fn abandon_message(&self, receipt: &ReceiptHandle) -> Result<(), QueueError>;

    /// Extend the message lock, returning the new expiry
    async fn renew_message_lock(&self, receipt: &ReceiptHandle) -> Result<Timestamp, QueueError>;

    /// Release provider resources
    async fn close(&self) -> Result<(), QueueError> {
        Ok(())
    }

    /// Get provider type
    fn provider_type(&self) -> ProviderType;

    /// Largest message body the provider accepts
    fn max_message_size(&self) -> usize {
        self.provider_type().max_message_size()
    }

    /// The only queue this provider may address, when its credentials are
    /// scoped to one
    fn entity_path(&self) -> Option<&str> {
        None
    }
}

/// Factory for creating queue clients with appropriate providers
pub struct QueueClientFactory;

impl QueueClientFactory {
    /// Create queue client from configuration
    pub async fn create_client(config: QueueConfig) -> Result<QueueClient, QueueError> {
        let provider: Arc<dyn QueueProvider> = match config.provider {
            ProviderConfig::InMemory(in_memory_config) => {
                Arc::new(InMemoryProvider::new(in_memory_config))
            }
            ProviderConfig::AzureServiceBus(azure_config) => {
                Arc::new(AzureServiceBusProvider::new(azure_config)?)
            }
        };

        Ok(QueueClient::with_provider(provider))
    }

    /// Create test client with in-memory provider
    pub fn create_test_client() -> QueueClient {
        QueueClient::with_provider(Arc::new(InMemoryProvider::new(InMemoryConfig::default())))
    }
}

/// Entry point for sending and processing messages on one namespace
///
/// Senders and processors created from a client share its provider. Closing
/// the client makes every sender and processor created from it unusable.
#[derive(Clone)]
pub struct QueueClient {
    provider: Arc<dyn QueueProvider>,
    closed: Arc<AtomicBool>,
}

impl QueueClient {
    /// Client for the Service Bus namespace named by `connection_string`
    ///
    /// The connection string is validated here; no network call is made until
    /// the first send or receive.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, QueueError> {
        let provider = AzureServiceBusProvider::new(AzureServiceBusConfig::new(connection_string))?;
        Ok(Self::with_provider(Arc::new(provider)))
    }

    /// Client backed by an existing provider
    pub fn with_provider(provider: Arc<dyn QueueProvider>) -> Self {
        Self {
            provider,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sender bound to `queue_name`
    pub fn create_sender(&self, queue_name: &str) -> Result<QueueSender, QueueError> {
        self.ensure_open()?;
        let queue = self.bound_queue(queue_name)?;
        Ok(QueueSender::new(
            self.provider.clone(),
            queue,
            self.closed.clone(),
        ))
    }

    /// Callback-driven processor bound to `queue_name`
    pub fn create_processor(
        &self,
        queue_name: &str,
        options: ProcessorOptions,
    ) -> Result<QueueProcessor, QueueError> {
        self.ensure_open()?;
        let queue = self.bound_queue(queue_name)?;
        Ok(QueueProcessor::new(
            self.provider.clone(),
            queue,
            options,
            self.closed.clone(),
        ))
    }

    /// Close the client and its provider; later calls are no-ops
    pub async fn close(&self) -> Result<(), QueueError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        tracing::debug!(provider = %self.provider.provider_type(), "Closing queue client");
        self.provider.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn provider_type(&self) -> ProviderType {
        self.provider.provider_type()
    }

    /// Validate `queue_name` against the provider's entity scope
    fn bound_queue(&self, queue_name: &str) -> Result<QueueName, QueueError> {
        let queue = QueueName::new(queue_name.to_string())?;

        if let Some(entity) = self.provider.entity_path() {
            if !entity.eq_ignore_ascii_case(queue.as_str()) {
                return Err(ConfigurationError::Invalid {
                    message: format!(
                        "connection string is scoped to '{}', not '{}'",
                        entity, queue
                    ),
                }
                .into());
            }
        }

        Ok(queue)
    }

    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::ClientClosed);
        }
        Ok(())
    }
}
