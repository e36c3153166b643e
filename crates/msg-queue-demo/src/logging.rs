//! Tracing subscriber setup shared by the demo binaries.

use crate::cli::LoggingArgs;
use crate::error::DemoError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;

/// Variable holding the default log level
pub const LOG_LEVEL_ENV: &str = "MSG_QUEUE_LOG";

/// Build the level filter; `RUST_LOG` wins over `--log-level`
pub fn build_filter(log_level: &str) -> Result<EnvFilter, DemoError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(log_level).map_err(|e| DemoError::Logging {
        message: format!("invalid log level '{}': {}", log_level, e),
    })
}

/// Install the global subscriber
pub fn init_logging(args: &LoggingArgs) -> Result<(), DemoError> {
    let filter = build_filter(&args.log_level)?;

    let (json_layer, text_layer) = if args.json_logs {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer().with_target(false)))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| DemoError::Logging {
            message: e.to_string(),
        })
}
