//! Tests for operator wait handling.

use super::*;
use std::io::{Cursor, Read};
use std::time::Duration;

async fn never() -> io::Result<()> {
    std::future::pending().await
}

async fn after(delay: Duration) -> io::Result<()> {
    tokio::time::sleep(delay).await;
    Ok(())
}

#[tokio::test]
async fn test_enter_ends_the_wait() {
    let trigger = wait_for_enter_or(Cursor::new(b"\n".to_vec()), never())
        .await
        .unwrap();

    assert_eq!(trigger, ExitTrigger::Enter);
}

#[tokio::test]
async fn test_any_line_counts_as_enter() {
    let trigger = wait_for_enter_or(Cursor::new(b"q\n".to_vec()), never())
        .await
        .unwrap();

    assert_eq!(trigger, ExitTrigger::Enter);
}

#[tokio::test]
async fn test_eof_waits_for_interrupt() {
    let trigger = wait_for_enter_or(
        Cursor::new(Vec::new()),
        after(Duration::from_millis(50)),
    )
    .await
    .unwrap();

    assert_eq!(trigger, ExitTrigger::Interrupt);
}

#[tokio::test]
async fn test_eof_without_interrupt_keeps_waiting() {
    let wait = wait_for_enter_or(Cursor::new(Vec::new()), never());

    let result = tokio::time::timeout(Duration::from_millis(100), wait).await;

    assert!(result.is_err(), "wait should still be pending");
}

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin gone"))
    }
}

#[tokio::test]
async fn test_read_error_is_returned() {
    let result = wait_for_enter_or(BufReader::new(FailingReader), never()).await;

    let error = result.unwrap_err();
    assert_eq!(error.kind(), io::ErrorKind::BrokenPipe);
}

#[tokio::test]
async fn test_interrupt_error_is_returned() {
    let interrupt = async {
        Err::<(), _>(io::Error::new(io::ErrorKind::Other, "no signal handler"))
    };

    let result = wait_for_enter_or(Cursor::new(Vec::new()), interrupt).await;

    assert!(result.is_err());
}
