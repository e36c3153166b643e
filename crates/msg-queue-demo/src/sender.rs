//! The sending program: 50,000 numbered messages, strictly in order.

use crate::cli::SenderCli;
use crate::console::wait_for_exit;
use crate::error::DemoError;
use crate::{
    MESSAGE_BODY, MESSAGE_NUMBER_PROPERTY, QUEUE_NAME, SENDER_ID, SENDER_PROPERTY,
};
use msg_queue_runtime::{
    Message, QueueClient, QueueError, QueueSender, ServiceBusConnectionString,
};
use tracing::{error, info, warn};

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;

/// Outcome of a send run
#[derive(Debug)]
pub struct SendReport {
    /// Messages accepted by the queue
    pub sent: u32,

    /// Error that stopped the loop early, if any
    pub error: Option<QueueError>,
}

impl SendReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Message number `number` with the `MessageNumber` and `Sender` properties
pub fn build_message(number: u32) -> Message {
    Message::from(MESSAGE_BODY)
        .with_property(MESSAGE_NUMBER_PROPERTY, number)
        .with_property(SENDER_PROPERTY, SENDER_ID)
}

/// Send messages `0..count` one at a time, stopping at the first failure
pub async fn send_numbered_messages(sender: &QueueSender, count: u32) -> SendReport {
    for number in 0..count {
        if let Err(e) = sender.send_message(build_message(number)).await {
            error!(message_number = number, "An exception occurred: {}", e);
            return SendReport {
                sent: number,
                error: Some(e),
            };
        }
        info!("Sent message: {}:{}", number, MESSAGE_BODY);
    }

    info!("Sent message: {}", MESSAGE_BODY);
    SendReport {
        sent: count,
        error: None,
    }
}

/// Open a sender on the demo queue, send `count` messages and close it
///
/// The sender is closed whether or not the send loop succeeded.
pub async fn run_sender(client: &QueueClient, count: u32) -> Result<SendReport, QueueError> {
    let sender = client.create_sender(QUEUE_NAME)?;

    let report = send_numbered_messages(&sender, count).await;

    if let Err(e) = sender.close().await {
        warn!(error = %e, "Failed to close sender");
    }

    Ok(report)
}

/// Entry point of `msg-sender`
pub async fn run(cli: &SenderCli) -> Result<(), DemoError> {
    let connection = ServiceBusConnectionString::parse(&cli.connection_string)
        .map_err(QueueError::from)?;
    info!(
        namespace = connection.fully_qualified_namespace(),
        queue = QUEUE_NAME,
        count = cli.count,
        "Starting sender"
    );

    let client = QueueClient::from_connection_string(&cli.connection_string)?;
    let report = run_sender(&client, cli.count).await;

    println!("Press Enter or Ctrl+C to exit...");
    let waited = wait_for_exit().await;

    client.close().await?;

    let report = report?;
    waited?;
    info!(sent = report.sent, "Sender finished");

    match report.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
