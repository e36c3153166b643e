//! The receiving programs: print every message and complete it.

use crate::cli::{ConfiguredReceiverCli, ReceiverCli};
use crate::console::wait_for_exit;
use crate::error::DemoError;
use crate::settings::{resolve_connection_string, SettingsLoader};
use crate::{MESSAGE_NUMBER_PROPERTY, QUEUE_NAME};
use async_trait::async_trait;
use msg_queue_runtime::{
    ErrorHandler, HandlerError, MessageHandler, ProcessErrorContext, ProcessMessageContext,
    ProcessorOptions, QueueClient, QueueError, ReceivedMessage, ServiceBusConnectionString,
};
use std::future::Future;
use std::io;
use tracing::{debug, error, info};

#[cfg(test)]
#[path = "receiver_tests.rs"]
mod tests;

// ============================================================================
// Handlers
// ============================================================================

/// `MessageNumber` of `message`, or `Unknown` when it carries none
pub fn describe_message(message: &ReceivedMessage) -> String {
    message
        .property(MESSAGE_NUMBER_PROPERTY)
        .map(|value| value.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Logs each message number, then completes the message
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintingMessageHandler;

#[async_trait]
impl MessageHandler for PrintingMessageHandler {
    async fn handle(&self, context: &ProcessMessageContext) -> Result<(), HandlerError> {
        info!("Received: {}", describe_message(context.message()));
        context.complete_message().await?;
        Ok(())
    }
}

/// Logs every processing failure; never retries
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorHandler;

#[async_trait]
impl ErrorHandler for LoggingErrorHandler {
    async fn handle_error(&self, context: &ProcessErrorContext) {
        error!(
            source = %context.source,
            queue = %context.queue_name,
            "An error occurred: {}",
            context.error
        );
    }
}

// ============================================================================
// Receive Loop
// ============================================================================

/// Process the demo queue with default options until `shutdown` resolves
pub async fn run_receiver<F, T>(client: &QueueClient, shutdown: F) -> Result<(), DemoError>
where
    F: Future<Output = io::Result<T>>,
    T: std::fmt::Debug,
{
    run_receiver_with_options(client, ProcessorOptions::default(), shutdown).await
}

/// Process the demo queue until `shutdown` resolves
///
/// The processor is stopped before returning, also when `shutdown` fails.
pub async fn run_receiver_with_options<F, T>(
    client: &QueueClient,
    options: ProcessorOptions,
    shutdown: F,
) -> Result<(), DemoError>
where
    F: Future<Output = io::Result<T>>,
    T: std::fmt::Debug,
{
    let mut processor = client.create_processor(QUEUE_NAME, options)?;
    processor.set_message_handler(PrintingMessageHandler)?;
    processor.set_error_handler(LoggingErrorHandler)?;

    processor.start_processing().await?;
    info!("Waiting for messages...");
    println!("Press Enter or Ctrl+C to stop...");

    let waited = shutdown.await;
    processor.stop_processing().await?;

    let trigger = waited?;
    debug!(?trigger, "Receiver stopped");
    Ok(())
}

// ============================================================================
// Entry Points
// ============================================================================

async fn receive_with_connection_string(connection_string: &str) -> Result<(), DemoError> {
    let connection =
        ServiceBusConnectionString::parse(connection_string).map_err(QueueError::from)?;
    info!(
        namespace = connection.fully_qualified_namespace(),
        queue = QUEUE_NAME,
        "Starting receiver"
    );

    let client = QueueClient::from_connection_string(connection_string)?;
    let result = run_receiver(&client, wait_for_exit()).await;
    client.close().await?;
    result
}

/// Entry point of `msg-receiver`
pub async fn run(cli: &ReceiverCli) -> Result<(), DemoError> {
    receive_with_connection_string(&cli.connection_string).await
}

/// Entry point of `msg-receiver-configured`
///
/// Refuses to connect when the resolved connection string is blank or still
/// the placeholder.
pub async fn run_configured(cli: &ConfiguredReceiverCli) -> Result<(), DemoError> {
    let environment = cli.environment_name();
    let loader = SettingsLoader::new(cli.config_dir.clone(), environment);
    info!(
        config_dir = %loader.config_dir().display(),
        environment = loader.environment(),
        "Loading settings"
    );

    let settings = loader.load()?;
    let connection_string = resolve_connection_string(&settings, loader.environment())?;

    receive_with_connection_string(&connection_string).await
}
