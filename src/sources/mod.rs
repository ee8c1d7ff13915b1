/*!
Command sources (front-end layer).

This module defines the wire format of control messages and the
`CommandSource` trait. Concrete implementations live in their own files:

- `stdin_source.rs` -> `StdinSource` (newline-delimited JSON from standard input)

Each source implementation is responsible for:
- Parsing raw input into `ControlMessage`
- Pushing messages via `Sender<ControlMessage>` while respecting backpressure (`send().await`)
- Logging malformed input and continuing (never panicking inside tasks)
- Ending cleanly when its input ends or the channel closes

Wire format (one JSON object per message):

```text
{"type": "start", "config": { "min_interval_ms": 30000, "enable_clicks": true }}
{"type": "start"}                       // resume the persisted config
{"type": "stop"}
{"type": "status"}
```
*/

use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::info;

use crate::config::ConfigDraft;

pub mod stdin_source;

pub use stdin_source::StdinSource;

/// A control message as received from a front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Start a session. Without `config`, the last persisted config is used.
    Start {
        #[serde(default)]
        config: Option<ConfigDraft>,
    },
    Stop,
    Status,
}

/// Parse one line of input. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ControlMessage>, serde_json::Error> {
    let raw = line.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(raw).map(Some)
}

/// Trait implemented by all command sources.
///
/// A source spawns an asynchronous task that produces control messages and
/// sends them into the provided channel.
pub trait CommandSource: Send + Sync {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    /// Start the source in the background.
    fn start(&self, sender: Sender<ControlMessage>) -> JoinHandle<()>;
}

/// Spawn every source, returning their `JoinHandle`s.
pub fn spawn_all_sources(
    sources: &[Box<dyn CommandSource>],
    sender: Sender<ControlMessage>,
) -> Vec<JoinHandle<()>> {
    sources
        .iter()
        .map(|src| {
            info!(
                target: "lupin::sources",
                source = %src.name(),
                "Starting source task"
            );
            src.start(sender.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_message_kind() {
        assert_eq!(
            parse_line(r#"{"type":"stop"}"#).unwrap(),
            Some(ControlMessage::Stop)
        );
        assert_eq!(
            parse_line(r#"  {"type":"status"}  "#).unwrap(),
            Some(ControlMessage::Status)
        );
        assert_eq!(
            parse_line(r#"{"type":"start"}"#).unwrap(),
            Some(ControlMessage::Start { config: None })
        );

        let line = concat!(
            r#"{"type":"start","config":{"min_interval_ms":1000,"max_interval_ms":2000,"#,
            r#""enable_keyboard":true,"keyboard_text":"hi"}}"#,
        );
        let Some(ControlMessage::Start { config: Some(cfg) }) = parse_line(line).unwrap() else {
            panic!("expected start with config");
        };
        assert_eq!(cfg.min_interval_ms, 1_000);
        assert_eq!(cfg.keyboard_text.as_deref(), Some("hi"));
    }

    #[test]
    fn blank_and_malformed_lines() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert!(parse_line("{").is_err());
        assert!(parse_line(r#"{"type":"launch"}"#).is_err());
    }
}
