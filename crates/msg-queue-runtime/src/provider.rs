//! Provider types and configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Enumeration of supported queue providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    AzureServiceBus,
    InMemory,
}

impl ProviderType {
    /// Get maximum message size for provider
    pub fn max_message_size(&self) -> usize {
        match self {
            Self::AzureServiceBus => 256 * 1024, // Standard tier
            Self::InMemory => 10 * 1024 * 1024,  // 10MB
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AzureServiceBus => write!(f, "AzureServiceBus"),
            Self::InMemory => write!(f, "InMemory"),
        }
    }
}

/// Configuration for queue client initialization
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub provider: ProviderConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::InMemory(InMemoryConfig::default()),
        }
    }
}

/// Provider-specific configuration
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    AzureServiceBus(AzureServiceBusConfig),
    InMemory(InMemoryConfig),
}

/// Azure Service Bus configuration
#[derive(Clone)]
pub struct AzureServiceBusConfig {
    /// Namespace connection string with shared access credentials
    pub connection_string: String,

    /// Timeout applied to every HTTP request on top of any receive wait
    pub request_timeout: Duration,

    /// Lifetime of generated shared access signature tokens
    pub token_ttl: Duration,
}

impl AzureServiceBusConfig {
    /// Configuration with default timeouts for the given connection string
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            request_timeout: Duration::seconds(60),
            token_ttl: Duration::hours(1),
        }
    }
}

impl fmt::Debug for AzureServiceBusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureServiceBusConfig")
            .field("connection_string", &"<REDACTED>")
            .field("request_timeout", &self.request_timeout)
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

/// In-memory provider configuration
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    /// Maximum number of messages (available and locked) held per queue
    pub max_queue_size: usize,

    /// How long a received message stays locked before it becomes visible again
    pub lock_duration: Duration,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 100_000,
            lock_duration: Duration::seconds(30),
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
