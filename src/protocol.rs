//! # Supervisor ⇄ worker message protocol.
//!
//! Every worker owns two unidirectional channels:
//! - **command-in** carries [`Command`]s from the supervisor;
//! - **event-out** carries [`WorkerEvent`]s back to it.
//!
//! ## Wire shape
//! ```text
//! Command      {"cmd":"start","name":"PollerA"}
//!              {"cmd":"stop"}
//!
//! WorkerEvent  {"event":"STARTED","name":"PollerA"}
//!              {"event":"FAKE_API_RESULT","name":"PollerA","data":{...}}
//!              {"event":"ERROR","name":"PollerA","error":"...","attempt":1,"delay_ms":1386}
//!              {"event":"PROTOCOL_VIOLATION","name":"PollerA","error":"..."}
//!              {"event":"CLEANED_UP","name":"PollerA"}
//!              {"event":"STOPPED","name":"PollerA"}
//! ```
//!
//! ## Rules
//! - Within one worker, events are emitted in causal order.
//! - `STOPPED` is the last event of a worker and always follows `CLEANED_UP`.

use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Control message sent by the supervisor to one worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum Command {
    /// Record `name` and begin polling.
    Start {
        /// Worker name; becomes the tag on every subsequent event.
        name: String,
    },
    /// Stop polling, clean up and report `STOPPED`.
    Stop,
}

/// Lifecycle or result event emitted by one worker.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerEvent {
    /// The poll loop was started.
    Started { name: Arc<str> },

    /// A poll succeeded.
    Result {
        name: Arc<str>,
        /// Strategy-specific event tag, e.g. `FAKE_API_RESULT`.
        tag: Arc<str>,
        data: Value,
    },

    /// A poll failed; the loop backs off before the next attempt.
    Error {
        name: Arc<str>,
        error: String,
        /// Consecutive failure count, starting at 1.
        attempt: u32,
        /// Delay scheduled before the next poll.
        delay_ms: u64,
    },

    /// A command arrived that the worker cannot honor in its current state.
    ProtocolViolation { name: Arc<str>, detail: String },

    /// Cleanup ran: stop flag set, timer cancelled, command channel detached.
    CleanedUp { name: Arc<str> },

    /// The worker has finished and will emit nothing else.
    Stopped { name: Arc<str> },
}

impl WorkerEvent {
    /// Name of the worker that emitted this event.
    pub fn name(&self) -> &Arc<str> {
        match self {
            WorkerEvent::Started { name }
            | WorkerEvent::Result { name, .. }
            | WorkerEvent::Error { name, .. }
            | WorkerEvent::ProtocolViolation { name, .. }
            | WorkerEvent::CleanedUp { name }
            | WorkerEvent::Stopped { name } => name,
        }
    }

    /// The `event` field on the wire.
    pub fn wire_tag(&self) -> &str {
        match self {
            WorkerEvent::Started { .. } => "STARTED",
            WorkerEvent::Result { tag, .. } => &**tag,
            WorkerEvent::Error { .. } => "ERROR",
            WorkerEvent::ProtocolViolation { .. } => "PROTOCOL_VIOLATION",
            WorkerEvent::CleanedUp { .. } => "CLEANED_UP",
            WorkerEvent::Stopped { .. } => "STOPPED",
        }
    }
}

impl Serialize for WorkerEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("event", self.wire_tag())?;
        map.serialize_entry("name", &**self.name())?;
        match self {
            WorkerEvent::Result { data, .. } => {
                map.serialize_entry("data", data)?;
            }
            WorkerEvent::Error {
                error,
                attempt,
                delay_ms,
                ..
            } => {
                map.serialize_entry("error", error)?;
                map.serialize_entry("attempt", attempt)?;
                map.serialize_entry("delay_ms", delay_ms)?;
            }
            WorkerEvent::ProtocolViolation { detail, .. } => {
                map.serialize_entry("error", detail)?;
            }
            WorkerEvent::Started { .. }
            | WorkerEvent::CleanedUp { .. }
            | WorkerEvent::Stopped { .. } => {}
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_shape() {
        let start = Command::Start {
            name: "PollerA".into(),
        };
        assert_eq!(
            serde_json::to_value(&start).unwrap(),
            json!({"cmd": "start", "name": "PollerA"})
        );
        assert_eq!(serde_json::to_value(Command::Stop).unwrap(), json!({"cmd": "stop"}));

        let parsed: Command = serde_json::from_str(r#"{"cmd":"stop"}"#).unwrap();
        assert_eq!(parsed, Command::Stop);
    }

    #[test]
    fn test_start_requires_name() {
        assert!(serde_json::from_str::<Command>(r#"{"cmd":"start"}"#).is_err());
    }

    #[test]
    fn test_result_uses_strategy_tag() {
        let ev = WorkerEvent::Result {
            name: "PollerA".into(),
            tag: "FAKE_API_RESULT".into(),
            data: json!({"delay": 1200}),
        };
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({"event": "FAKE_API_RESULT", "name": "PollerA", "data": {"delay": 1200}})
        );
    }

    #[test]
    fn test_error_carries_backoff() {
        let ev = WorkerEvent::Error {
            name: "PollerB".into(),
            error: "PollerB failed!".into(),
            attempt: 2,
            delay_ms: 2197,
        };
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({
                "event": "ERROR",
                "name": "PollerB",
                "error": "PollerB failed!",
                "attempt": 2,
                "delay_ms": 2197
            })
        );
    }

    #[test]
    fn test_lifecycle_tags() {
        let name: Arc<str> = "PollerC".into();
        let stopped = WorkerEvent::Stopped { name: name.clone() };
        assert_eq!(stopped.wire_tag(), "STOPPED");
        assert_eq!(
            serde_json::to_value(WorkerEvent::CleanedUp { name }).unwrap(),
            json!({"event": "CLEANED_UP", "name": "PollerC"})
        );
    }
}
