//! # Backoff poll loop.
//!
//! [`PollLoop`] repeatedly invokes one [`TaskStrategy`](crate::TaskStrategy)
//! and sleeps between invocations. The sleep is the base interval after a
//! success and a logarithmically growing delay after consecutive failures.
//!
//! ## Iteration
//! ```text
//! loop {
//!   ├─► stop set?            → exit (task not invoked)
//!   ├─► strategy.poll(name)  (never cancelled by stop)
//!   │     ├─ Ok(data)  → interval = base, attempt = 1      → emit RESULT
//!   │     └─ Err(e)    → interval = backoff(attempt), attempt += 1 → emit ERROR
//!   ├─► stop set?            → exit
//!   └─► arm timer (child of stop) and wait interval
//!         └─ stop / cancel_timer() during the wait → exit immediately
//! }
//! ```
//!
//! ## Rules
//! - Task failures (including panics inside the strategy) become `ERROR`
//!   events; they never end the loop.
//! - The pending timer lives in [`PollState`] so the lifecycle handler can
//!   cancel it during cleanup.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::TaskError;
use crate::policies::BackoffPolicy;
use crate::protocol::WorkerEvent;
use crate::strategies::StrategyRef;

/// Cancelable handle to the loop's idle delay.
#[derive(Debug)]
pub(crate) struct TimerHandle {
    token: CancellationToken,
    delay: Duration,
}

/// Per-worker loop state, created on `start` and discarded after cleanup.
#[derive(Debug)]
pub(crate) struct PollState {
    pub running: bool,
    pub current_interval: Duration,
    /// Next failure's 1-based attempt number.
    pub retry_attempt: u32,
    pending_timer: Option<TimerHandle>,
}

/// State shared between the loop and its lifecycle handler (same unit).
pub(crate) type SharedPollState = Arc<Mutex<PollState>>;

impl PollState {
    pub fn new(base: Duration) -> Self {
        Self {
            running: false,
            current_interval: base,
            retry_attempt: 1,
            pending_timer: None,
        }
    }

    pub fn shared(base: Duration) -> SharedPollState {
        Arc::new(Mutex::new(Self::new(base)))
    }

    pub fn record_success(&mut self, policy: &BackoffPolicy) {
        self.current_interval = policy.base;
        self.retry_attempt = 1;
    }

    /// Applies one failure; returns the attempt number it counted as.
    pub fn record_failure(&mut self, policy: &BackoffPolicy) -> u32 {
        let attempt = self.retry_attempt;
        self.current_interval = policy.next(attempt);
        self.retry_attempt = attempt.saturating_add(1);
        attempt
    }

    /// Arms the idle timer as a child of `stop` and returns its token.
    pub fn arm_timer(&mut self, stop: &CancellationToken) -> CancellationToken {
        let token = stop.child_token();
        self.pending_timer = Some(TimerHandle {
            token: token.clone(),
            delay: self.current_interval,
        });
        token
    }

    /// Cancels the pending timer. Returns false when none was armed.
    pub fn cancel_timer(&mut self) -> bool {
        match self.pending_timer.take() {
            Some(timer) => {
                timer.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Delay of the currently armed timer.
    pub fn pending_delay(&self) -> Option<Duration> {
        self.pending_timer.as_ref().map(|t| t.delay)
    }

    fn clear_timer(&mut self) {
        self.pending_timer = None;
    }
}

/// Locks the shared state, recovering it if a previous holder panicked.
pub(crate) fn lock(state: &SharedPollState) -> MutexGuard<'_, PollState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One worker's poll loop.
pub(crate) struct PollLoop {
    name: Arc<str>,
    tag: Arc<str>,
    strategy: StrategyRef,
    policy: BackoffPolicy,
    state: SharedPollState,
    events: mpsc::Sender<WorkerEvent>,
}

impl PollLoop {
    pub fn new(
        name: Arc<str>,
        strategy: StrategyRef,
        policy: BackoffPolicy,
        state: SharedPollState,
        events: mpsc::Sender<WorkerEvent>,
    ) -> Self {
        let tag = Arc::from(strategy.result_tag());
        Self {
            name,
            tag,
            strategy,
            policy,
            state,
            events,
        }
    }

    /// Runs until `stop` is cancelled.
    pub async fn run(self, stop: CancellationToken) {
        lock(&self.state).running = true;

        loop {
            if stop.is_cancelled() {
                break;
            }

            match self.poll_once().await {
                Ok(data) => {
                    lock(&self.state).record_success(&self.policy);
                    trace!(worker = %self.name, "poll succeeded");
                    self.emit(WorkerEvent::Result {
                        name: self.name.clone(),
                        tag: self.tag.clone(),
                        data,
                    })
                    .await;
                }
                Err(err) => {
                    let (attempt, delay) = {
                        let mut state = lock(&self.state);
                        let attempt = state.record_failure(&self.policy);
                        (attempt, state.current_interval)
                    };
                    debug!(
                        worker = %self.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "logarithmic backoff"
                    );
                    self.emit(WorkerEvent::Error {
                        name: self.name.clone(),
                        error: err.to_string(),
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                    })
                    .await;
                }
            }

            if stop.is_cancelled() {
                break;
            }

            let (timer, delay) = {
                let mut state = lock(&self.state);
                (state.arm_timer(&stop), state.current_interval)
            };
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = timer.cancelled() => {}
            }
            lock(&self.state).clear_timer();
        }

        lock(&self.state).running = false;
        debug!(worker = %self.name, "poll loop exited");
    }

    async fn poll_once(&self) -> Result<Value, TaskError> {
        let fut = self.strategy.poll(&self.name);
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => Err(TaskError::Panicked {
                info: panic_message(panic.as_ref()),
            }),
        }
    }

    async fn emit(&self, ev: WorkerEvent) {
        let _ = self.events.send(ev).await;
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::StrategyFn;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(ms(2000), ms(10_000))
    }

    /// Strategy that fails on the call numbers listed in `fail_on` (1-based).
    fn scripted(fail_on: &'static [u32]) -> (StrategyRef, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let s = StrategyFn::arc("TEST_RESULT", move |_name: Arc<str>| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if fail_on.contains(&n) {
                    Err(TaskError::fail(format!("call {n}")))
                } else {
                    Ok(json!(n))
                }
            }
        });
        (s, calls)
    }

    struct Harness {
        state: SharedPollState,
        stop: CancellationToken,
        rx: mpsc::Receiver<WorkerEvent>,
        join: tokio::task::JoinHandle<()>,
    }

    fn start(strategy: StrategyRef, policy: BackoffPolicy) -> Harness {
        let state = PollState::shared(policy.base);
        let (tx, rx) = mpsc::channel(64);
        let stop = CancellationToken::new();
        let pl = PollLoop::new("PollerA".into(), strategy, policy, state.clone(), tx);
        let join = tokio::spawn(pl.run(stop.clone()));
        Harness {
            state,
            stop,
            rx,
            join,
        }
    }

    #[test]
    fn test_state_success_resets() {
        let p = policy();
        let mut state = PollState::new(p.base);
        for _ in 0..5 {
            state.record_failure(&p);
        }
        assert_eq!(state.retry_attempt, 6);
        assert!(state.current_interval > p.base);

        state.record_success(&p);
        assert_eq!(state.current_interval, p.base);
        assert_eq!(state.retry_attempt, 1);
    }

    #[test]
    fn test_state_timer_cancel() {
        let stop = CancellationToken::new();
        let mut state = PollState::new(ms(500));
        assert!(!state.cancel_timer());

        let timer = state.arm_timer(&stop);
        assert_eq!(state.pending_delay(), Some(ms(500)));
        assert!(state.cancel_timer());
        assert!(timer.is_cancelled());
        assert!(!stop.is_cancelled());
        assert!(!state.cancel_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn test_four_failures_follow_log_curve() {
        let (s, _) = scripted(&[1, 2, 3, 4, 5]);
        let mut h = start(s, policy());

        let mut delays = Vec::new();
        for expected_attempt in 1..=4u32 {
            match h.rx.recv().await.unwrap() {
                WorkerEvent::Error {
                    attempt, delay_ms, ..
                } => {
                    assert_eq!(attempt, expected_attempt);
                    delays.push(delay_ms);
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(delays, [1386, 2197, 2773, 3219]);

        h.stop.cancel();
        h.join.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_backoff() {
        let (s, _) = scripted(&[1, 2, 3, 5]);
        let mut h = start(s, policy());

        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(h.rx.recv().await.unwrap());
        }
        assert!(matches!(seen[2], WorkerEvent::Error { attempt: 3, .. }));
        assert!(matches!(seen[3], WorkerEvent::Result { .. }));
        assert!(
            matches!(seen[4], WorkerEvent::Error { attempt: 1, delay_ms: 1386, .. }),
            "got {:?}",
            seen[4]
        );

        h.stop.cancel();
        h.join.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_carries_strategy_tag() {
        let (s, _) = scripted(&[]);
        let mut h = start(s, policy());

        match h.rx.recv().await.unwrap() {
            WorkerEvent::Result { name, tag, data } => {
                assert_eq!(&*name, "PollerA");
                assert_eq!(&*tag, "TEST_RESULT");
                assert_eq!(data, json!(1));
            }
            other => panic!("unexpected event {other:?}"),
        }
        {
            let state = lock(&h.state);
            assert_eq!(state.current_interval, ms(2000));
            assert_eq!(state.retry_attempt, 1);
        }

        h.stop.cancel();
        h.join.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_idle_timer_exits_immediately() {
        let (s, calls) = scripted(&[]);
        let mut h = start(s, BackoffPolicy::new(ms(10_000), ms(60_000)));

        h.rx.recv().await.unwrap();
        tokio::time::sleep(ms(1000)).await;
        assert_eq!(lock(&h.state).pending_delay(), Some(ms(10_000)));

        let stopped_at = Instant::now();
        h.stop.cancel();
        h.join.await.unwrap();

        assert!(stopped_at.elapsed() < ms(10_000));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let state = lock(&h.state);
        assert!(!state.running);
        assert_eq!(state.pending_delay(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_timer_wakes_loop_without_stop() {
        let (s, calls) = scripted(&[]);
        let mut h = start(s, BackoffPolicy::new(ms(10_000), ms(60_000)));

        h.rx.recv().await.unwrap();
        tokio::time::sleep(ms(100)).await;
        assert!(lock(&h.state).cancel_timer());

        h.rx.recv().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        h.stop.cancel();
        h.join.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_iteration_skips_task() {
        let (s, calls) = scripted(&[]);
        let state = PollState::shared(ms(1000));
        let (tx, mut rx) = mpsc::channel(4);
        let stop = CancellationToken::new();
        stop.cancel();

        PollLoop::new("PollerA".into(), s, policy(), state, tx)
            .run(stop)
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_does_not_cancel_in_flight_task() {
        let s = StrategyFn::arc("SLOW_RESULT", |_name: Arc<str>| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, TaskError>(json!("done"))
        });
        let mut h = start(s, policy());

        let begun = Instant::now();
        tokio::time::sleep(ms(1000)).await;
        h.stop.cancel();
        h.join.await.unwrap();

        assert!(begun.elapsed() >= Duration::from_secs(5));
        assert!(matches!(h.rx.recv().await, Some(WorkerEvent::Result { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_strategy_panic_is_a_failed_poll() {
        let s = StrategyFn::arc("BOOM_RESULT", |_name: Arc<str>| async {
            if true {
                panic!("kaboom");
            }
            Ok::<_, TaskError>(json!(null))
        });
        let mut h = start(s, policy());

        match h.rx.recv().await.unwrap() {
            WorkerEvent::Error { error, attempt, .. } => {
                assert_eq!(attempt, 1);
                assert!(error.contains("kaboom"), "error was {error:?}");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(h.rx.recv().await, Some(WorkerEvent::Error { attempt: 2, .. })));

        h.stop.cancel();
        h.join.await.unwrap();
    }
}
