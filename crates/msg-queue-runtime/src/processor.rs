//! Callback-driven message processing.
//!
//! A [`QueueProcessor`] runs a pool of receive loops against one queue. Each
//! received message is handed to the registered [`MessageHandler`]; failures
//! anywhere in the pipeline are reported to the registered [`ErrorHandler`].
//!
//! ## Dispatch
//!
//! - Handler returns `Ok` and the message is unsettled: the message is
//!   completed when `auto_complete_messages` is set.
//! - Handler returns `Err`: the error handler sees it with
//!   [`ErrorSource::UserCallback`] and the unsettled message is abandoned.
//! - Receive and settlement failures are reported, then the worker backs off
//!   for the error's `retry_after()` or `error_backoff`.
//! - While the handler runs the lock is renewed at half its remaining
//!   lifetime, for at most `max_auto_lock_renewal_duration`.

use crate::client::QueueProvider;
use crate::error::{QueueError, ValidationError};
use crate::message::{QueueName, ReceiptHandle, ReceivedMessage};
use async_trait::async_trait;
use chrono::Duration;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;

/// Shortest pause between lock renewals
const MIN_RENEWAL_INTERVAL_MS: i64 = 100;

// ============================================================================
// Options
// ============================================================================

/// Tuning for a [`QueueProcessor`]
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Number of messages handled concurrently
    pub max_concurrent_calls: usize,

    /// Complete messages the handler leaves unsettled after returning `Ok`
    pub auto_complete_messages: bool,

    /// Upper bound on automatic lock renewal per message; zero disables renewal
    pub max_auto_lock_renewal_duration: Duration,

    /// How long a single receive call waits for a message
    pub receive_wait_time: Duration,

    /// Pause after a failure that carries no retry hint
    pub error_backoff: Duration,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 1,
            auto_complete_messages: true,
            max_auto_lock_renewal_duration: Duration::minutes(5),
            receive_wait_time: Duration::seconds(30),
            error_backoff: Duration::seconds(1),
        }
    }
}

// ============================================================================
// Handler Traits
// ============================================================================

/// Error type returned by message handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Callback invoked for every received message
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, context: &ProcessMessageContext) -> Result<(), HandlerError>;
}

/// Callback invoked for every failure the processor observes
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn handle_error(&self, context: &ProcessErrorContext);
}

/// Stage of processing that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    Receive,
    Complete,
    Abandon,
    RenewLock,
    UserCallback,
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Receive => write!(f, "Receive"),
            Self::Complete => write!(f, "Complete"),
            Self::Abandon => write!(f, "Abandon"),
            Self::RenewLock => write!(f, "RenewLock"),
            Self::UserCallback => write!(f, "UserCallback"),
        }
    }
}

/// Failure reported to the [`ErrorHandler`]
#[derive(Debug)]
pub struct ProcessErrorContext {
    pub error: QueueError,
    pub source: ErrorSource,
    pub queue_name: QueueName,
}

// ============================================================================
// Message Context
// ============================================================================

/// A received message plus the operations to settle it
pub struct ProcessMessageContext {
    message: ReceivedMessage,
    provider: Arc<dyn QueueProvider>,
    settled: AtomicBool,
}

impl ProcessMessageContext {
    pub(crate) fn new(message: ReceivedMessage, provider: Arc<dyn QueueProvider>) -> Self {
        Self {
            message,
            provider,
            settled: AtomicBool::new(false),
        }
    }

    /// The message being processed
    pub fn message(&self) -> &ReceivedMessage {
        &self.message
    }

    /// Remove the message from the queue
    pub async fn complete_message(&self) -> Result<(), QueueError> {
        self.begin_settlement()?;
        let result = self
            .provider
            .complete_message(&self.message.receipt_handle)
            .await;
        self.finish_settlement(result)
    }

    /// Release the lock so the message can be delivered again
    pub async fn abandon_message(&self) -> Result<(), QueueError> {
        self.begin_settlement()?;
        let result = self
            .provider
            .abandon_message(&self.message.receipt_handle)
            .await;
        self.finish_settlement(result)
    }

    /// True once the message has been completed or abandoned
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    fn begin_settlement(&self) -> Result<(), QueueError> {
        if self.settled.swap(true, Ordering::SeqCst) {
            return Err(QueueError::MessageAlreadySettled {
                message_id: self.message.message_id.to_string(),
            });
        }
        Ok(())
    }

    fn finish_settlement(&self, result: Result<(), QueueError>) -> Result<(), QueueError> {
        // A failed settlement leaves the message unsettled
        if result.is_err() {
            self.settled.store(false, Ordering::SeqCst);
        }
        result
    }

    fn receipt(&self) -> &ReceiptHandle {
        &self.message.receipt_handle
    }
}

impl fmt::Debug for ProcessMessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessMessageContext")
            .field("message_id", &self.message.message_id)
            .field("settled", &self.is_settled())
            .finish()
    }
}

// ============================================================================
// Processor
// ============================================================================

struct RunningWorkers {
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

/// Receives messages from one queue and dispatches them to callbacks
///
/// Created by [`QueueClient::create_processor`](crate::QueueClient::create_processor).
pub struct QueueProcessor {
    provider: Arc<dyn QueueProvider>,
    queue: QueueName,
    options: ProcessorOptions,
    client_closed: Arc<AtomicBool>,
    message_handler: Option<Arc<dyn MessageHandler>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    running: Option<RunningWorkers>,
}

impl QueueProcessor {
    pub(crate) fn new(
        provider: Arc<dyn QueueProvider>,
        queue: QueueName,
        options: ProcessorOptions,
        client_closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            provider,
            queue,
            options,
            client_closed,
            message_handler: None,
            error_handler: None,
            running: None,
        }
    }

    /// Register the message callback; not allowed while processing
    pub fn set_message_handler<H>(&mut self, handler: H) -> Result<(), QueueError>
    where
        H: MessageHandler + 'static,
    {
        self.ensure_stopped()?;
        self.message_handler = Some(Arc::new(handler));
        Ok(())
    }

    /// Register the error callback; not allowed while processing
    pub fn set_error_handler<H>(&mut self, handler: H) -> Result<(), QueueError>
    where
        H: ErrorHandler + 'static,
    {
        self.ensure_stopped()?;
        self.error_handler = Some(Arc::new(handler));
        Ok(())
    }

    /// Start the receive loops
    ///
    /// Fails when either handler is missing, when already processing, or when
    /// the owning client has been closed.
    pub async fn start_processing(&mut self) -> Result<(), QueueError> {
        if self.client_closed.load(Ordering::SeqCst) {
            return Err(QueueError::ClientClosed);
        }
        self.ensure_stopped()?;

        let message_handler =
            self.message_handler
                .clone()
                .ok_or_else(|| QueueError::HandlerNotRegistered {
                    handler: "message".to_string(),
                })?;
        let error_handler =
            self.error_handler
                .clone()
                .ok_or_else(|| QueueError::HandlerNotRegistered {
                    handler: "error".to_string(),
                })?;

        if self.options.max_concurrent_calls == 0 {
            return Err(ValidationError::OutOfRange {
                field: "max_concurrent_calls".to_string(),
                message: "must be at least 1".to_string(),
            }
            .into());
        }

        let worker = Arc::new(Worker {
            provider: self.provider.clone(),
            queue: self.queue.clone(),
            options: self.options.clone(),
            client_closed: self.client_closed.clone(),
            message_handler,
            error_handler,
        });

        let (shutdown, shutdown_rx) = watch::channel(false);
        let workers = (0..self.options.max_concurrent_calls)
            .map(|_| tokio::spawn(worker.clone().run(shutdown_rx.clone())))
            .collect();

        self.running = Some(RunningWorkers { shutdown, workers });

        info!(
            queue = %self.queue,
            concurrency = self.options.max_concurrent_calls,
            "Message processor started"
        );
        Ok(())
    }

    /// Stop the receive loops, waiting for in-flight handlers to finish
    pub async fn stop_processing(&mut self) -> Result<(), QueueError> {
        let running = self
            .running
            .take()
            .ok_or_else(|| QueueError::ProcessorNotRunning {
                queue_name: self.queue.to_string(),
            })?;

        // Receivers may already be gone if every worker exited
        let _ = running.shutdown.send(true);

        for worker in running.workers {
            if let Err(e) = worker.await {
                warn!(queue = %self.queue, error = %e, "Processor worker ended abnormally");
            }
        }

        info!(queue = %self.queue, "Message processor stopped");
        Ok(())
    }

    pub fn is_processing(&self) -> bool {
        self.running.is_some()
    }

    pub fn queue_name(&self) -> &QueueName {
        &self.queue
    }

    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    fn ensure_stopped(&self) -> Result<(), QueueError> {
        if self.running.is_some() {
            return Err(QueueError::ProcessorAlreadyRunning {
                queue_name: self.queue.to_string(),
            });
        }
        Ok(())
    }
}

impl Drop for QueueProcessor {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(true);
        }
    }
}

// ============================================================================
// Worker
// ============================================================================

struct Worker {
    provider: Arc<dyn QueueProvider>,
    queue: QueueName,
    options: ProcessorOptions,
    client_closed: Arc<AtomicBool>,
    message_handler: Arc<dyn MessageHandler>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl Worker {
    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.client_closed.load(Ordering::SeqCst) {
                self.report(QueueError::ClientClosed, ErrorSource::Receive)
                    .await;
                break;
            }

            let receive = self
                .provider
                .receive_message(&self.queue, self.options.receive_wait_time);
            let received = tokio::select! {
                _ = shutdown.changed() => break,
                result = receive => result,
            };

            let backoff = match received {
                Ok(Some(message)) => self.dispatch(message).await,
                Ok(None) => None,
                Err(error) => {
                    let delay = error.retry_after().unwrap_or(self.options.error_backoff);
                    self.report(error, ErrorSource::Receive).await;
                    Some(delay)
                }
            };

            if let Some(delay) = backoff {
                let delay = delay.to_std().unwrap_or_default();
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        debug!(queue = %self.queue, "Processor worker exiting");
    }

    /// Run the handler for one message; returns a backoff when settlement failed
    async fn dispatch(self: &Arc<Self>, message: ReceivedMessage) -> Option<Duration> {
        let context = ProcessMessageContext::new(message, self.provider.clone());
        let renewal = self.spawn_lock_renewal(context.receipt().clone());

        let outcome = self.message_handler.handle(&context).await;

        if let Some(renewal) = renewal {
            renewal.abort();
        }

        match outcome {
            Ok(()) => {
                if self.options.auto_complete_messages && !context.is_settled() {
                    if let Err(error) = context.complete_message().await {
                        return Some(self.report_settlement(error, ErrorSource::Complete).await);
                    }
                }
            }
            Err(handler_error) => {
                self.report(
                    QueueError::MessageHandlerFailed {
                        message: handler_error.to_string(),
                    },
                    ErrorSource::UserCallback,
                )
                .await;

                if !context.is_settled() {
                    if let Err(error) = context.abandon_message().await {
                        return Some(self.report_settlement(error, ErrorSource::Abandon).await);
                    }
                }
            }
        }

        None
    }

    fn spawn_lock_renewal(self: &Arc<Self>, receipt: ReceiptHandle) -> Option<JoinHandle<()>> {
        let budget = self.options.max_auto_lock_renewal_duration;
        if budget <= Duration::zero() {
            return None;
        }

        let worker = Arc::clone(self);
        Some(tokio::spawn(async move {
            let deadline = tokio::time::Instant::now() + budget.to_std().unwrap_or_default();
            let mut receipt = receipt;

            loop {
                let half_remaining = receipt.time_until_expiry() / 2;
                let wait = half_remaining
                    .max(Duration::milliseconds(MIN_RENEWAL_INTERVAL_MS))
                    .to_std()
                    .unwrap_or_default();

                let wake_at = tokio::time::Instant::now() + wait;
                if wake_at >= deadline {
                    break;
                }
                tokio::time::sleep_until(wake_at).await;

                match worker.provider.renew_message_lock(&receipt).await {
                    Ok(expires_at) => {
                        debug!(
                            queue = %worker.queue,
                            message_id = %receipt.message_id(),
                            locked_until = %expires_at,
                            "Renewed message lock"
                        );
                        receipt = receipt.with_expiry(expires_at);
                    }
                    Err(error) => {
                        worker.report(error, ErrorSource::RenewLock).await;
                        break;
                    }
                }
            }
        }))
    }

    async fn report_settlement(&self, error: QueueError, source: ErrorSource) -> Duration {
        let delay = error.retry_after().unwrap_or(self.options.error_backoff);
        self.report(error, source).await;
        delay
    }

    async fn report(&self, error: QueueError, source: ErrorSource) {
        debug!(queue = %self.queue, %source, error = %error, "Reporting processing error");
        let context = ProcessErrorContext {
            error,
            source,
            queue_name: self.queue.clone(),
        };
        self.error_handler.handle_error(&context).await;
    }
}
