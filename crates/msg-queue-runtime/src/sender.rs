//! Queue sender bound to a single queue.

use crate::client::QueueProvider;
use crate::error::QueueError;
use crate::message::{Message, MessageId, QueueName};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument};

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;

/// Sends messages to one queue
///
/// Created by [`QueueClient::create_sender`](crate::QueueClient::create_sender).
pub struct QueueSender {
    provider: Arc<dyn QueueProvider>,
    queue: QueueName,
    client_closed: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl QueueSender {
    pub(crate) fn new(
        provider: Arc<dyn QueueProvider>,
        queue: QueueName,
        client_closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            provider,
            queue,
            client_closed,
            closed: AtomicBool::new(false),
        }
    }

    /// Send one message, returning the ID the provider assigned
    #[instrument(skip(self, message), fields(queue = %self.queue))]
    pub async fn send_message(&self, message: Message) -> Result<MessageId, QueueError> {
        if self.is_closed() {
            return Err(QueueError::ClientClosed);
        }

        let max_size = self.provider.max_message_size();
        if message.body.len() > max_size {
            return Err(QueueError::MessageTooLarge {
                size: message.body.len(),
                max_size,
            });
        }

        self.provider.send_message(&self.queue, &message).await
    }

    /// Close the sender; later calls are no-ops
    pub async fn close(&self) -> Result<(), QueueError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(queue = %self.queue, "Sender closed");
        }
        Ok(())
    }

    /// True once the sender or its client has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.client_closed.load(Ordering::SeqCst)
    }

    pub fn queue_name(&self) -> &QueueName {
        &self.queue
    }
}
