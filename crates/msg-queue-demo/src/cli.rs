//! Command-line arguments for the demo binaries.

use crate::logging::LOG_LEVEL_ENV;
use crate::settings::environment_name;
use crate::{MESSAGE_COUNT, PLACEHOLDER_CONNECTION_STRING};
use clap::{Args, Parser};
use std::path::PathBuf;

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;

/// Variable the hardcoded variants read their connection string from
pub const CONNECTION_STRING_ENV: &str = "AZURE_SERVICEBUS_CONNECTION_STRING";

// ============================================================================
// Shared Arguments
// ============================================================================

/// Logging flags common to every binary
#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    /// Logging level or filter directives
    #[arg(short, long, env = LOG_LEVEL_ENV, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,
}

impl Default for LoggingArgs {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

// ============================================================================
// Binaries
// ============================================================================

/// Send numbered messages to the msg-queue queue
#[derive(Parser, Debug)]
#[command(name = "msg-sender")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Send numbered messages to the msg-queue Service Bus queue")]
pub struct SenderCli {
    /// Service Bus connection string
    #[arg(
        short,
        long,
        env = CONNECTION_STRING_ENV,
        hide_env_values = true,
        default_value = PLACEHOLDER_CONNECTION_STRING
    )]
    pub connection_string: String,

    /// Number of messages to send
    #[arg(short = 'n', long, default_value_t = MESSAGE_COUNT)]
    pub count: u32,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

/// Receive messages from the msg-queue queue
#[derive(Parser, Debug)]
#[command(name = "msg-receiver")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Receive and complete messages from the msg-queue Service Bus queue")]
pub struct ReceiverCli {
    /// Service Bus connection string
    #[arg(
        short,
        long,
        env = CONNECTION_STRING_ENV,
        hide_env_values = true,
        default_value = PLACEHOLDER_CONNECTION_STRING
    )]
    pub connection_string: String,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

/// Receive messages using a connection string from layered settings
#[derive(Parser, Debug)]
#[command(name = "msg-receiver-configured")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Receive messages using a connection string from appsettings files")]
#[command(
    long_about = "Reads azure_service_bus.connection_string from appsettings.json, \
                  appsettings.<environment>.json and MSG_QUEUE__ environment variables"
)]
pub struct ConfiguredReceiverCli {
    /// Directory holding the appsettings files
    #[arg(short = 'd', long, default_value = "config")]
    pub config_dir: PathBuf,

    /// Environment whose overlay file is applied [default: $MSG_QUEUE_ENVIRONMENT or Production]
    #[arg(short, long)]
    pub environment: Option<String>,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl ConfiguredReceiverCli {
    /// `--environment`, falling back to `MSG_QUEUE_ENVIRONMENT`
    pub fn environment_name(&self) -> String {
        self.environment
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(environment_name)
    }
}
