//! Waiting for the operator.
//!
//! The programs stop on Enter or Ctrl+C. When stdin is closed (EOF), for
//! example under a service manager, only Ctrl+C stops them.

use std::future::Future;
use std::io::{self, BufRead, BufReader};
use tokio::sync::oneshot;
use tracing::debug;

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;

/// What ended the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    Enter,
    Interrupt,
}

/// Wait for Enter on stdin or Ctrl+C
pub async fn wait_for_exit() -> io::Result<ExitTrigger> {
    wait_for_enter_or(BufReader::new(io::stdin()), tokio::signal::ctrl_c()).await
}

/// Wait for a line on `reader` or for `interrupt` to resolve
///
/// The read happens on a detached thread so a blocked stdin never holds up
/// runtime shutdown.
pub async fn wait_for_enter_or<R, F>(reader: R, interrupt: F) -> io::Result<ExitTrigger>
where
    R: BufRead + Send + 'static,
    F: Future<Output = io::Result<()>>,
{
    let (line_tx, line_rx) = oneshot::channel::<io::Result<()>>();

    std::thread::spawn(move || {
        let mut reader = reader;
        let mut line = String::new();
        match reader.read_line(&mut line) {
            // EOF: dropping the sender leaves only the interrupt
            Ok(0) => drop(line_tx),
            Ok(_) => {
                let _ = line_tx.send(Ok(()));
            }
            Err(e) => {
                let _ = line_tx.send(Err(e));
            }
        }
    });

    let enter = async move {
        match line_rx.await {
            Ok(result) => result,
            Err(_) => {
                debug!("Input closed; waiting for interrupt");
                std::future::pending().await
            }
        }
    };

    tokio::select! {
        result = enter => result.map(|()| ExitTrigger::Enter),
        result = interrupt => result.map(|()| ExitTrigger::Interrupt),
    }
}
