//! # Msg Queue Demo
//!
//! Three small programs around the `msg-queue` Service Bus queue:
//!
//! - `msg-sender` sends 50,000 numbered messages
//! - `msg-receiver` processes messages with a connection string given on the
//!   command line (or the placeholder default)
//! - `msg-receiver-configured` processes messages with a connection string
//!   taken from layered JSON and environment configuration
//!
//! The binaries are thin; the behaviour lives in this library so it can be
//! driven against the in-memory provider in tests.

pub mod cli;
pub mod console;
pub mod error;
pub mod logging;
pub mod receiver;
pub mod sender;
pub mod settings;

pub use error::DemoError;

/// Queue every program talks to
pub const QUEUE_NAME: &str = "msg-queue";

/// Number of messages the sender publishes
pub const MESSAGE_COUNT: u32 = 50_000;

/// Body shared by every message
pub const MESSAGE_BODY: &str = "Hello, Azure Service Bus!";

/// Value of the `Sender` property
pub const SENDER_ID: &str = "MsgSender";

/// Application property carrying the 0-based message number
pub const MESSAGE_NUMBER_PROPERTY: &str = "MessageNumber";

/// Application property identifying the sending program
pub const SENDER_PROPERTY: &str = "Sender";

/// Connection string used when none is supplied
pub const PLACEHOLDER_CONNECTION_STRING: &str = "AZURE_SERVICEBUS_CONNECTION_STRING";

/// Marker left in sample configuration files
pub const PLACEHOLDER_MARKER: &str = "Placeholder";

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
