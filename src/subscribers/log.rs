//! # Tracing subscriber for runtime events.
//!
//! [`LogWriter`] renders every [`Event`] through `tracing` with structured
//! fields. Results and lifecycle transitions log at `info`, poll failures at
//! `error`, anomalies (violations, replacements, forced termination) at `warn`.
//!
//! ## Output (fmt layer, no ANSI)
//! ```text
//! INFO  pollvisor::subscribers::log: started worker=PollerA
//! INFO  pollvisor::subscribers::log: result worker=PollerA tag=FAKE_API_RESULT data={"delay":1532,...}
//! ERROR pollvisor::subscribers::log: poll failed worker=PollerB error=poll failed: PollerB failed! attempt=1 delay_ms=1386
//! INFO  pollvisor::subscribers::log: shutdown requested reason=SIGINT
//! INFO  pollvisor::subscribers::log: stopped worker=PollerA
//! INFO  pollvisor::subscribers::log: all workers stopped within grace
//! ```

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Logs runtime events via `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.as_deref().unwrap_or("-");
        let tag = e.tag.as_deref().unwrap_or_default();
        let err = e.error.as_deref().unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or_default();

        match e.kind {
            EventKind::Started => info!(worker, "started"),
            EventKind::PollResult => {
                let data = e.data.as_ref().unwrap_or(&Value::Null);
                info!(worker, tag, %data, "result");
            }
            EventKind::PollFailed => error!(
                worker,
                error = err,
                attempt = e.attempt.unwrap_or_default(),
                delay_ms = e.delay_ms.unwrap_or_default(),
                "poll failed"
            ),
            EventKind::ProtocolViolation => warn!(worker, error = err, "protocol violation"),
            EventKind::CleanedUp => debug!(worker, "cleaned up"),
            EventKind::Stopped => info!(worker, "stopped"),

            EventKind::WorkerSpawned => debug!(worker, kind = tag, "spawned"),
            EventKind::WorkerReplaced => warn!(worker, "duplicate name; previous worker detached"),
            EventKind::ResolveFailed => {
                error!(worker, kind = tag, error = err, "worker not started")
            }
            EventKind::WorkerDead => error!(worker, error = err, "worker exited abnormally"),

            EventKind::ShutdownRequested => info!(reason, "shutdown requested"),
            EventKind::AllStoppedWithin => info!("all workers stopped within grace"),
            EventKind::GraceExceeded => warn!(stuck = reason, "shutdown grace exceeded"),
            EventKind::WorkerTerminated => warn!(worker, "force-terminated"),
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
