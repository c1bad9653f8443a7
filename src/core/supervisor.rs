//! # Supervisor: owns the worker pool, fans out events and drives shutdown.
//!
//! The [`Supervisor`] owns the event bus, a [`SubscriberSet`], the strategy
//! registry and the registry of worker handles. It spawns one isolated unit
//! per poller, forwards every unit's events into the bus, and performs the
//! two-phase shutdown.
//!
//! ## Key responsibilities
//! - resolve each [`PollerConfig`] to a strategy (unknown kinds are skipped)
//! - spawn worker units and send them `start`
//! - subscribe to the [`Bus`] and **fan-out** events via [`SubscriberSet`]
//! - detect abnormal unit exits (panics outside the strategy)
//! - on shutdown: `stop` everyone, wait [`PoolConfig::grace`], abort stragglers
//!
//! ## High-level architecture
//! ```text
//! spawn(configs):
//!   PollerConfig ─► validate ─► Strategies::resolve(kind)
//!        │                         └─ Err → ResolveFailed (skipped, not registered)
//!        └─► unit = tokio::spawn(PollWorker::run)      command-in ◄── Supervisor
//!            monitor = tokio::spawn(forward events)    event-out  ──► Bus
//!            Registry.insert(name, Handle{unit, commands, abort})
//!            commands.send(Start{name})
//!
//! monitor (one per unit):
//!   while event-out.recv() → Bus.publish(Event::from(ev))
//!   join unit:
//!     ├─ Ok         → release handle (after STOPPED)
//!     ├─ panic      → WorkerDead, release handle
//!     └─ cancelled  → (forced termination; handle already drained)
//!
//! shutdown(reason):
//!   ShutdownRequested ─► send Stop to every handle
//!   ─► wait until Registry is empty, at most cfg.grace
//!        ├─ emptied   → AllStoppedWithin, Ok(())
//!        └─ timed out → drain, abort each (WorkerTerminated), GraceExceeded, Err
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use pollvisor::{LogWriter, PoolConfig, Subscribe, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = PoolConfig::demo();
//!     let pollers = cfg.pollers.clone();
//!
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
//!     let sup = Supervisor::builder(cfg).with_subscribers(subs).build();
//!
//!     // Runs until SIGINT / SIGTERM / SIGUSR2.
//!     sup.run(pollers).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::builder::SupervisorBuilder;
use crate::core::config::{PollerConfig, PoolConfig};
use crate::core::poll_loop::panic_message;
use crate::core::registry::{Handle, Registry};
use crate::core::shutdown;
use crate::core::worker::PollWorker;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::protocol::{Command, WorkerEvent};
use crate::strategies::{Strategies, StrategyRef};
use crate::subscribers::SubscriberSet;

/// Coordinates worker units, event delivery (via [`SubscriberSet`]) and graceful shutdown.
pub struct Supervisor {
    cfg: PoolConfig,
    bus: Bus,
    strategies: Strategies,
    registry: Arc<Registry>,
    flush_tx: mpsc::Sender<oneshot::Sender<()>>,
    shutting_down: AtomicBool,
}

impl Supervisor {
    /// Starts building a supervisor for `cfg`.
    pub fn builder(cfg: PoolConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: PoolConfig,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        strategies: Strategies,
    ) -> Self {
        let (flush_tx, flush_rx) = mpsc::channel(1);
        subscriber_listener(bus.subscribe(), subs, flush_rx);
        Self {
            cfg,
            bus,
            strategies,
            registry: Arc::new(Registry::new()),
            flush_tx,
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.cfg
    }

    /// Raw receiver of every subsequent runtime event.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Sorted names of the currently registered workers.
    pub async fn worker_names(&self) -> Vec<String> {
        self.registry.names().await
    }

    /// Spawns pollers, waits for a termination signal, then shuts down with
    /// the signal name as the reason.
    pub async fn run(&self, pollers: Vec<PollerConfig>) -> Result<(), RuntimeError> {
        self.spawn(pollers).await?;

        let reason = match shutdown::wait_for_shutdown_signal().await {
            Ok(signal) => signal,
            Err(e) => {
                warn!(error = %e, "failed to listen for signals; shutting down");
                "signal-error"
            }
        };

        let res = self.shutdown(reason).await;
        self.flush().await;
        res
    }

    /// Spawns one worker unit per resolvable config and sends it `start`.
    ///
    /// Configs whose kind is unknown (or whose intervals are invalid) publish
    /// [`EventKind::ResolveFailed`] and are skipped. A name that is already
    /// registered is replaced. Returns the names that were started.
    pub async fn spawn(&self, configs: Vec<PollerConfig>) -> Result<Vec<String>, RuntimeError> {
        let mut started = Vec::with_capacity(configs.len());
        for cfg in configs {
            if self.shutting_down.load(Ordering::Acquire) {
                return Err(RuntimeError::ShuttingDown);
            }
            let Some(strategy) = self.resolve(&cfg) else {
                continue;
            };
            self.spawn_unit(&cfg, strategy).await;
            started.push(cfg.name);
        }
        Ok(started)
    }

    fn resolve(&self, cfg: &PollerConfig) -> Option<StrategyRef> {
        let rejected = match cfg.validate() {
            Err(e) => (e.as_label(), e.to_string()),
            Ok(()) => match self.strategies.resolve(cfg) {
                Ok(strategy) => return Some(strategy),
                Err(e) => (e.as_label(), e.to_string()),
            },
        };

        let (label, error) = rejected;
        debug!(worker = %cfg.name, kind = %cfg.kind, label, "poller rejected");
        self.bus.publish(
            Event::new(EventKind::ResolveFailed)
                .with_worker(cfg.name.as_str())
                .with_tag(cfg.kind.as_str())
                .with_error(error),
        );
        None
    }

    async fn spawn_unit(&self, cfg: &PollerConfig, strategy: StrategyRef) {
        let cap = self.cfg.mailbox_capacity_clamped();
        let (cmd_tx, cmd_rx) = mpsc::channel(cap);
        let (ev_tx, ev_rx) = mpsc::channel(cap);
        let name: Arc<str> = Arc::from(cfg.name.as_str());

        let worker = PollWorker::new(
            name.clone(),
            strategy,
            cfg.backoff(),
            self.cfg.cleanup_grace,
            cmd_rx,
            ev_tx,
        );
        let join = tokio::spawn(worker.run());

        let unit = self.registry.next_unit();
        let handle = Handle {
            unit,
            commands: cmd_tx.clone(),
            abort: join.abort_handle(),
        };
        if let Some(previous) = self.registry.insert(cfg.name.clone(), handle).await {
            debug!(worker = %name, previous = previous.unit, unit, "handle replaced");
            self.bus
                .publish(Event::new(EventKind::WorkerReplaced).with_worker(name.clone()));
        }

        tokio::spawn(monitor(
            name.clone(),
            unit,
            ev_rx,
            join,
            self.bus.clone(),
            Arc::clone(&self.registry),
        ));

        self.bus.publish(
            Event::new(EventKind::WorkerSpawned)
                .with_worker(name.clone())
                .with_tag(cfg.kind.as_str()),
        );
        if cmd_tx
            .send(Command::Start {
                name: cfg.name.clone(),
            })
            .await
            .is_err()
        {
            warn!(worker = %name, "worker exited before start");
        }
    }

    /// Two-phase shutdown: `stop` to every worker, then forced termination
    /// of whatever is still registered after [`PoolConfig::grace`].
    ///
    /// Returns early once every unit has exited. A second call while a
    /// shutdown is in progress (or done) returns `Ok(())` immediately.
    pub async fn shutdown(&self, reason: &str) -> Result<(), RuntimeError> {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            debug!(reason, "shutdown already in progress");
            return Ok(());
        }
        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_reason(reason));

        let senders = self.registry.senders().await;
        let stop_all = async {
            // A full mailbox only delays `stop`; the worker keeps draining commands.
            for (name, commands) in senders {
                if commands.send(Command::Stop).await.is_err() {
                    debug!(worker = %name, "stop not delivered: worker already exiting");
                }
            }
            self.registry.wait_empty().await;
        };

        let grace = self.cfg.grace;
        if tokio::time::timeout(grace, stop_all).await.is_ok() {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            return Ok(());
        }

        let mut stuck = Vec::new();
        for (name, handle) in self.registry.drain().await {
            handle.abort.abort();
            self.bus
                .publish(Event::new(EventKind::WorkerTerminated).with_worker(name.as_str()));
            stuck.push(name);
        }
        self.bus
            .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
        Err(RuntimeError::GraceExceeded { grace, stuck })
    }

    /// Waits until subscribers have handled every event published so far.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.flush_tx.send(done).await.is_ok() {
            let _ = wait.await;
        }
    }
}

/// Forwards bus events to the subscriber set (fire-and-forget) and serves flush requests.
fn subscriber_listener(
    mut rx: broadcast::Receiver<Event>,
    set: Arc<SubscriberSet>,
    mut flush_rx: mpsc::Receiver<oneshot::Sender<()>>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                req = flush_rx.recv() => {
                    let Some(done) = req else { break };
                    while let Ok(ev) = rx.try_recv() {
                        set.emit(&ev);
                    }
                    set.flush().await;
                    let _ = done.send(());
                }
            }
        }
    });
}

/// Forwards one unit's events to the bus, then reports how it ended.
async fn monitor(
    name: Arc<str>,
    unit: u64,
    mut events: mpsc::Receiver<WorkerEvent>,
    join: JoinHandle<()>,
    bus: Bus,
    registry: Arc<Registry>,
) {
    while let Some(ev) = events.recv().await {
        bus.publish(Event::from(ev));
    }

    match join.await {
        Ok(()) => {}
        Err(e) if e.is_panic() => {
            let msg = panic_message(e.into_panic().as_ref());
            bus.publish(
                Event::new(EventKind::WorkerDead)
                    .with_worker(name.clone())
                    .with_error(msg),
            );
        }
        Err(_) => debug!(worker = %name, unit, "unit aborted"),
    }
    registry.release(&name, unit).await;
}
