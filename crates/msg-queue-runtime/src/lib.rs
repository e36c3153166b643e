//! # Msg Queue Runtime
//!
//! Queue client runtime used by the msg-queue demo programs. It talks to Azure
//! Service Bus over the REST data plane and ships an in-memory provider for
//! tests and local development.
//!
//! This library provides:
//! - Provider-agnostic send, peek-lock receive and settlement operations
//! - A sender bound to a single queue
//! - An event-driven processor that dispatches messages to registered handlers
//! - Shared access signature authentication from connection strings
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Message structures, properties and receipt handles
//! - [`provider`] - Provider types and configuration
//! - [`connection_string`] - Service Bus connection string parsing
//! - [`auth`] - Shared access signature tokens
//! - [`client`] - Provider trait, client and factory
//! - [`sender`] - Queue sender
//! - [`processor`] - Event-driven message processor
//! - [`providers`] - Azure Service Bus and in-memory providers

pub mod auth;
pub mod client;
pub mod connection_string;
pub mod error;
pub mod message;
pub mod processor;
pub mod provider;
pub mod providers;
pub mod sender;

// Re-export commonly used types at crate root for convenience
pub use client::{QueueClient, QueueClientFactory, QueueProvider};
pub use connection_string::ServiceBusConnectionString;
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use message::{
    Message, MessageId, PropertyValue, QueueName, ReceiptHandle, ReceivedMessage, Timestamp,
};
pub use processor::{
    ErrorHandler, ErrorSource, HandlerError, MessageHandler, ProcessErrorContext,
    ProcessMessageContext, ProcessorOptions, QueueProcessor,
};
pub use provider::{
    AzureServiceBusConfig, InMemoryConfig, ProviderConfig, ProviderType, QueueConfig,
};
pub use providers::{AzureError, AzureServiceBusProvider, InMemoryProvider};
pub use sender::QueueSender;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
