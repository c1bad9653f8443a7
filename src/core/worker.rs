//! # PollWorker: lifecycle handler for one poller.
//!
//! A [`PollWorker`] is the body of one isolated execution unit. It owns the
//! receiving end of the worker's command channel and the sending end of its
//! event channel, and drives one [`PollLoop`] once `start` arrives.
//!
//! ## Command dispatch
//! ```text
//! select! {
//!   commands.recv()
//!     ├─ Start{name} → on_start(name)        (second start → PROTOCOL_VIOLATION)
//!     ├─ Stop        → on_stop(); cleanup()  → finish()
//!     └─ closed      → same as Stop
//!   poll loop        (driven in place; exits only after stop)
//! }
//!
//! cleanup():  stop flag ─► cancel timer ─► close commands ─► CLEANED_UP ─► settle(cleanup_grace)
//! finish():   await loop exit ─► STOPPED
//! ```
//!
//! ## Rules
//! - `STOPPED` is emitted only after the loop has exited, so a worker whose
//!   task hangs never reports it and is left for forced termination.
//! - `cleanup()` is idempotent.
//! - Everything outside the strategy call runs unguarded: a panic here kills
//!   the unit and surfaces as an abnormal exit.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::poll_loop::{PollLoop, PollState, SharedPollState, lock};
use crate::policies::BackoffPolicy;
use crate::protocol::{Command, WorkerEvent};
use crate::strategies::StrategyRef;

/// Lifecycle handler driving one poll loop.
pub(crate) struct PollWorker {
    name: Arc<str>,
    strategy: StrategyRef,
    policy: BackoffPolicy,
    cleanup_grace: Duration,

    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<WorkerEvent>,

    stop: CancellationToken,
    state: Option<SharedPollState>,
    poll: Option<BoxFuture<'static, ()>>,
    cleaned_up: bool,
}

impl PollWorker {
    /// `name` tags events until `start` records the final one.
    pub fn new(
        name: Arc<str>,
        strategy: StrategyRef,
        policy: BackoffPolicy,
        cleanup_grace: Duration,
        commands: mpsc::Receiver<Command>,
        events: mpsc::Sender<WorkerEvent>,
    ) -> Self {
        Self {
            name,
            strategy,
            policy,
            cleanup_grace,
            commands,
            events,
            stop: CancellationToken::new(),
            state: None,
            poll: None,
            cleaned_up: false,
        }
    }

    /// Receive loop over the command channel; returns after `STOPPED`.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Start { name }) => self.on_start(name).await,
                    Some(Command::Stop) => break,
                    None => {
                        debug!(worker = %self.name, "command channel closed; stopping");
                        break;
                    }
                },
                _ = settle(&mut self.poll) => {
                    self.poll = None;
                }
            }
        }

        self.on_stop();
        self.cleanup().await;
        self.finish().await;
    }

    async fn on_start(&mut self, name: String) {
        if self.poll.is_some() {
            debug!(worker = %self.name, requested = %name, "start rejected: already running");
            self.emit(WorkerEvent::ProtocolViolation {
                name: self.name.clone(),
                detail: format!("start({name}) received while already running"),
            })
            .await;
            return;
        }

        self.name = Arc::from(name);
        let state = PollState::shared(self.policy.base);
        let poll_loop = PollLoop::new(
            self.name.clone(),
            Arc::clone(&self.strategy),
            self.policy,
            Arc::clone(&state),
            self.events.clone(),
        );
        self.state = Some(state);

        self.emit(WorkerEvent::Started {
            name: self.name.clone(),
        })
        .await;
        self.poll = Some(poll_loop.run(self.stop.clone()).boxed());
    }

    /// Sets the stop flag. Never blocks.
    fn on_stop(&self) {
        self.stop.cancel();
    }

    async fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;

        self.on_stop();
        if let Some(state) = &self.state {
            let mut state = lock(state);
            if let Some(delay) = state.pending_delay() {
                state.cancel_timer();
                debug!(
                    worker = %self.name,
                    delay_ms = delay.as_millis() as u64,
                    "pending timer cancelled"
                );
            }
        }
        self.commands.close();

        self.emit(WorkerEvent::CleanedUp {
            name: self.name.clone(),
        })
        .await;

        let grace = tokio::time::sleep(self.cleanup_grace);
        tokio::pin!(grace);
        loop {
            tokio::select! {
                _ = &mut grace => break,
                _ = settle(&mut self.poll) => {
                    self.poll = None;
                }
            }
        }
    }

    async fn finish(mut self) {
        if let Some(poll) = self.poll.take() {
            debug!(worker = %self.name, "waiting for in-flight poll");
            poll.await;
        }
        if let Some(state) = self.state.take() {
            debug_assert!(!lock(&state).running, "poll loop still running after exit");
        }

        self.emit(WorkerEvent::Stopped {
            name: self.name.clone(),
        })
        .await;
    }

    async fn emit(&mut self, ev: WorkerEvent) {
        if self.events.send(ev).await.is_err() {
            warn!(worker = %self.name, "event channel closed; event dropped");
        }
    }
}

/// Drives the loop if one is running; pending forever otherwise.
async fn settle(poll: &mut Option<BoxFuture<'static, ()>>) {
    match poll {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::strategies::StrategyFn;
    use serde_json::json;
    use tokio::time::Instant;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn ok_strategy() -> StrategyRef {
        StrategyFn::arc("OK_RESULT", |_name: Arc<str>| async {
            Ok::<_, TaskError>(json!("ok"))
        })
    }

    fn hung_strategy() -> StrategyRef {
        StrategyFn::arc("HUNG_RESULT", |_name: Arc<str>| async {
            std::future::pending::<()>().await;
            Ok::<_, TaskError>(json!(null))
        })
    }

    fn worker(
        strategy: StrategyRef,
    ) -> (PollWorker, mpsc::Sender<Command>, mpsc::Receiver<WorkerEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (ev_tx, ev_rx) = mpsc::channel(64);
        let w = PollWorker::new(
            "PollerA".into(),
            strategy,
            BackoffPolicy::new(ms(2000), ms(10_000)),
            ms(200),
            cmd_rx,
            ev_tx,
        );
        (w, cmd_tx, ev_rx)
    }

    fn start_cmd() -> Command {
        Command::Start {
            name: "PollerA".into(),
        }
    }

    async fn collect(mut rx: mpsc::Receiver<WorkerEvent>) -> Vec<&'static str> {
        let mut tags = Vec::new();
        while let Some(ev) = rx.recv().await {
            tags.push(match ev {
                WorkerEvent::Started { .. } => "STARTED",
                WorkerEvent::Result { .. } => "RESULT",
                WorkerEvent::Error { .. } => "ERROR",
                WorkerEvent::ProtocolViolation { .. } => "PROTOCOL_VIOLATION",
                WorkerEvent::CleanedUp { .. } => "CLEANED_UP",
                WorkerEvent::Stopped { .. } => "STOPPED",
            });
        }
        tags
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test(start_paused = true)]
    async fn test_run_future_is_send() {
        let (w, tx, rx) = worker(ok_strategy());
        let fut = w.run();
        assert_send(&fut);

        let unit = tokio::spawn(fut);
        tx.send(Command::Stop).await.unwrap();
        unit.await.unwrap();
        assert_eq!(collect(rx).await, ["CLEANED_UP", "STOPPED"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_then_stop() {
        let (w, tx, rx) = worker(ok_strategy());
        let unit = tokio::spawn(w.run());

        tx.send(start_cmd()).await.unwrap();
        tokio::time::sleep(ms(100)).await;
        tx.send(Command::Stop).await.unwrap();
        unit.await.unwrap();

        assert_eq!(collect(rx).await, ["STARTED", "RESULT", "CLEANED_UP", "STOPPED"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_protocol_violation() {
        let (w, tx, mut rx) = worker(ok_strategy());
        let unit = tokio::spawn(w.run());

        tx.send(start_cmd()).await.unwrap();
        assert!(matches!(rx.recv().await, Some(WorkerEvent::Started { .. })));
        assert!(matches!(rx.recv().await, Some(WorkerEvent::Result { .. })));

        tx.send(start_cmd()).await.unwrap();
        match rx.recv().await.unwrap() {
            WorkerEvent::ProtocolViolation { name, detail } => {
                assert_eq!(&*name, "PollerA");
                assert!(detail.contains("already running"));
            }
            other => panic!("unexpected event {other:?}"),
        }

        // Still polling on the original schedule, not restarted.
        assert!(matches!(rx.recv().await, Some(WorkerEvent::Result { .. })));

        tx.send(Command::Stop).await.unwrap();
        unit.await.unwrap();
        let rest = collect(rx).await;
        assert!(!rest.contains(&"STARTED"));
        assert_eq!(rest.last(), Some(&"STOPPED"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_is_idempotent() {
        let (mut w, tx, mut rx) = worker(ok_strategy());
        w.on_start("PollerA".into()).await;
        assert!(matches!(rx.recv().await, Some(WorkerEvent::Started { .. })));

        w.cleanup().await;
        w.cleanup().await;
        assert!(w.stop.is_cancelled());
        assert!(tx.send(Command::Stop).await.is_err(), "commands must be detached");

        w.finish().await;
        drop(tx);
        let tags = collect(rx).await;
        assert_eq!(tags.iter().filter(|t| **t == "CLEANED_UP").count(), 1);
        assert_eq!(tags.last(), Some(&"STOPPED"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_idle_timer() {
        let (w, tx, mut rx) = worker(ok_strategy());
        let unit = tokio::spawn(w.run());

        tx.send(start_cmd()).await.unwrap();
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();

        let stopped_at = Instant::now();
        tx.send(Command::Stop).await.unwrap();
        unit.await.unwrap();

        // Only the cleanup settle period elapses, not the 2000ms interval.
        let elapsed = stopped_at.elapsed();
        assert!(elapsed >= ms(200) && elapsed < ms(2000), "took {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleaned_up_precedes_stopped() {
        let (w, tx, rx) = worker(ok_strategy());
        let unit = tokio::spawn(w.run());

        tx.send(start_cmd()).await.unwrap();
        tx.send(Command::Stop).await.unwrap();
        unit.await.unwrap();

        let tags = collect(rx).await;
        let cleaned = tags.iter().position(|t| *t == "CLEANED_UP").unwrap();
        let stopped = tags.iter().position(|t| *t == "STOPPED").unwrap();
        assert!(cleaned < stopped);
        assert_eq!(stopped, tags.len() - 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_start() {
        let (w, tx, rx) = worker(ok_strategy());
        let unit = tokio::spawn(w.run());

        tx.send(Command::Stop).await.unwrap();
        unit.await.unwrap();

        assert_eq!(collect(rx).await, ["CLEANED_UP", "STOPPED"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_inbox_stops_worker() {
        let (w, tx, rx) = worker(ok_strategy());
        let unit = tokio::spawn(w.run());

        tx.send(start_cmd()).await.unwrap();
        drop(tx);
        unit.await.unwrap();

        let tags = collect(rx).await;
        assert_eq!(tags.first(), Some(&"STARTED"));
        assert_eq!(&tags[tags.len() - 2..], ["CLEANED_UP", "STOPPED"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_task_never_reports_stopped() {
        let (w, tx, mut rx) = worker(hung_strategy());
        let unit = tokio::spawn(w.run());

        tx.send(start_cmd()).await.unwrap();
        assert!(matches!(rx.recv().await, Some(WorkerEvent::Started { .. })));
        tx.send(Command::Stop).await.unwrap();
        assert!(matches!(rx.recv().await, Some(WorkerEvent::CleanedUp { .. })));

        let waited = tokio::time::timeout(Duration::from_secs(60), rx.recv()).await;
        assert!(waited.is_err(), "hung worker emitted {waited:?}");
        assert!(!unit.is_finished());

        unit.abort();
        assert!(unit.await.unwrap_err().is_cancelled());
    }
}
