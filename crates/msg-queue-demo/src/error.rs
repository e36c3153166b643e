//! Error type shared by the demo programs.

use crate::settings::SettingsError;
use msg_queue_runtime::QueueError;
use thiserror::Error;

/// Failure of a demo program, mapped to a process exit code
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("{0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to initialise logging: {message}")]
    Logging { message: String },

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DemoError {
    /// Process exit code for this error
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | 1    | configuration could not be loaded or is invalid |
    /// | 2    | connection string missing or still a placeholder |
    /// | 3    | queue operation failed |
    /// | 4    | console I/O failed |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Settings(SettingsError::NotConfigured { .. }) => 2,
            Self::Settings(_) => 1,
            Self::Logging { .. } => 1,
            Self::Queue(QueueError::ConfigurationError(_)) => 1,
            Self::Queue(_) => 3,
            Self::Io(_) => 4,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
