//! Stdin command source.
//!
//! Reads newline-delimited JSON control messages from standard input, e.g.:
//!     echo '{"type":"start"}' | lupin --dry-run
//!
//! Malformed lines are logged with `warn!` and skipped. EOF or a closed
//! channel ends the task.

use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::mpsc::Sender,
    task::JoinHandle,
};
use tracing::{error, info, trace, warn};

use super::{CommandSource, ControlMessage, parse_line};

/// Source that reads control messages from stdin.
#[derive(Debug, Clone, Default)]
pub struct StdinSource;

impl StdinSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl CommandSource for StdinSource {
    fn name(&self) -> &'static str {
        "stdin"
    }

    fn start(&self, sender: Sender<ControlMessage>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(target: "lupin::sources", "StdinSource task started (reading lines)");
            forward_lines(BufReader::new(io::stdin()), sender).await;
            trace!(target: "lupin::sources", "StdinSource task ended");
        })
    }
}

/// Forward every parseable line of `reader` until EOF or until the receiver is gone.
async fn forward_lines<R: AsyncBufRead + Unpin>(mut reader: R, sender: Sender<ControlMessage>) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!(target: "lupin::sources", "EOF on stdin; StdinSource exiting");
                break;
            }
            Ok(_) => match parse_line(&line) {
                Ok(Some(msg)) => {
                    trace!(target: "lupin::sources", ?msg, "Parsed control message");
                    if let Err(e) = sender.send(msg).await {
                        error!(
                            target: "lupin::sources",
                            error = %e,
                            "Channel closed while sending control message; terminating task"
                        );
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        target: "lupin::sources",
                        error = %e,
                        line = line.trim(),
                        "Failed to parse control message"
                    );
                }
            },
            Err(e) => {
                warn!(
                    target: "lupin::sources",
                    error = %e,
                    "Error reading from stdin; terminating task"
                );
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_name_and_new() {
        assert_eq!(StdinSource::new().name(), "stdin");
    }

    #[tokio::test]
    async fn forwards_valid_lines_and_skips_garbage() {
        let input: &[u8] = b"{\"type\":\"start\"}\nnot json\n\n{\"type\":\"stop\"}\n";
        let (tx, mut rx) = mpsc::channel(8);
        forward_lines(input, tx).await;

        assert_eq!(rx.recv().await, Some(ControlMessage::Start { config: None }));
        assert_eq!(rx.recv().await, Some(ControlMessage::Stop));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn stops_when_receiver_is_gone() {
        let input: &[u8] = b"{\"type\":\"status\"}\n{\"type\":\"status\"}\n";
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        // Returns instead of spinning on a closed channel.
        forward_lines(input, tx).await;
    }
}
