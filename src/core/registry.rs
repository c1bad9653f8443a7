//! # Worker handle registry.
//!
//! Maps each worker name to the handle of its execution unit: the command
//! sender and an abort handle for forced termination. Owned by one
//! [`Supervisor`](crate::Supervisor); nothing here is global.
//!
//! ## Rules
//! - At most one handle per name; inserting a name again replaces (and
//!   returns) the previous handle.
//! - Every handle carries a per-spawn `unit` id. [`Registry::release`] only
//!   removes the entry if the id still matches, so the exit of a replaced
//!   unit never removes its successor.
//! - [`Registry::wait_empty`] wakes when the last handle is released or
//!   drained.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Notify, RwLock, mpsc};
use tokio::task::AbortHandle;

use crate::protocol::Command;

/// Handle to one running worker unit.
pub(crate) struct Handle {
    /// Per-spawn identity.
    pub unit: u64,
    /// Command-in channel.
    pub commands: mpsc::Sender<Command>,
    /// Forced termination.
    pub abort: AbortHandle,
}

/// Registry of live worker units keyed by name.
pub(crate) struct Registry {
    units: RwLock<HashMap<String, Handle>>,
    emptied: Notify,
    next_unit: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            units: RwLock::new(HashMap::new()),
            emptied: Notify::new(),
            next_unit: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh unit id.
    pub fn next_unit(&self) -> u64 {
        self.next_unit.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers `handle` under `name`, returning the handle it replaced.
    pub async fn insert(&self, name: String, handle: Handle) -> Option<Handle> {
        self.units.write().await.insert(name, handle)
    }

    /// Removes `name` if it still belongs to `unit`.
    pub async fn release(&self, name: &str, unit: u64) -> bool {
        let mut units = self.units.write().await;
        let owned = units.get(name).is_some_and(|h| h.unit == unit);
        if owned {
            units.remove(name);
            if units.is_empty() {
                self.emptied.notify_waiters();
            }
        }
        owned
    }

    /// Returns the sorted list of registered names.
    pub async fn names(&self) -> Vec<String> {
        let units = self.units.read().await;
        let mut names: Vec<String> = units.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Snapshot of every command sender.
    pub async fn senders(&self) -> Vec<(String, mpsc::Sender<Command>)> {
        let units = self.units.read().await;
        units
            .iter()
            .map(|(name, h)| (name.clone(), h.commands.clone()))
            .collect()
    }

    /// Removes and returns every handle, sorted by name.
    pub async fn drain(&self) -> Vec<(String, Handle)> {
        let mut drained: Vec<(String, Handle)> = {
            let mut units = self.units.write().await;
            units.drain().collect()
        };
        self.emptied.notify_waiters();
        drained.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        drained
    }

    pub async fn is_empty(&self) -> bool {
        self.units.read().await.is_empty()
    }

    /// Completes once no handle is registered.
    pub async fn wait_empty(&self) {
        loop {
            let notified = self.emptied.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_empty().await {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn handle(reg: &Registry) -> (Handle, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(std::future::pending::<()>());
        let h = Handle {
            unit: reg.next_unit(),
            commands: tx,
            abort: task.abort_handle(),
        };
        (h, rx)
    }

    #[tokio::test]
    async fn test_release_requires_matching_unit() {
        let reg = Registry::new();
        let (first, _rx1) = handle(&reg);
        let first_unit = first.unit;
        assert!(reg.insert("PollerA".into(), first).await.is_none());

        let (second, _rx2) = handle(&reg);
        let second_unit = second.unit;
        let replaced = reg.insert("PollerA".into(), second).await.unwrap();
        assert_eq!(replaced.unit, first_unit);
        replaced.abort.abort();

        assert!(!reg.release("PollerA", first_unit).await);
        assert_eq!(reg.names().await, ["PollerA"]);
        assert!(reg.release("PollerA", second_unit).await);
        assert!(reg.is_empty().await);
    }

    #[tokio::test]
    async fn test_wait_empty_wakes_on_last_release() {
        let reg = Arc::new(Registry::new());
        let (a, _ra) = handle(&reg);
        let (b, _rb) = handle(&reg);
        let (ua, ub) = (a.unit, b.unit);
        reg.insert("PollerA".into(), a).await;
        reg.insert("PollerB".into(), b).await;

        let waiter = {
            let reg = Arc::clone(&reg);
            tokio::spawn(async move { reg.wait_empty().await })
        };

        reg.release("PollerA", ua).await;
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        reg.release("PollerB", ub).await;
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait_empty did not wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_drain_is_sorted() {
        let reg = Registry::new();
        for name in ["PollerC", "PollerA", "PollerB"] {
            let (h, _rx) = handle(&reg);
            reg.insert(name.into(), h).await;
        }
        assert_eq!(reg.senders().await.len(), 3);

        let drained: Vec<String> = reg.drain().await.into_iter().map(|(n, _)| n).collect();
        assert_eq!(drained, ["PollerA", "PollerB", "PollerC"]);
        assert!(reg.is_empty().await);
        reg.wait_empty().await;
    }
}
