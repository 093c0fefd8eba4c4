//! Operation lock and upgrade tracking.
//!
//! Two independent pieces of state guard the device:
//!
//! - [`OperationLock`] serializes the whole body of every mutating
//!   operation, status writes included.
//! - [`UpgradeTracker`] remembers the upgrade currently in flight. It has
//!   its own short-lived lock so it can be read while another flow holds the
//!   operation lock.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use netdev_core::UpgradePhase;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::{debug, info};

/// Serializes mutating operations against the device.
#[derive(Debug, Default)]
pub struct OperationLock {
    inner: AsyncMutex<()>,
}

/// Held for the duration of one operation; releases on drop.
#[derive(Debug)]
pub struct OperationGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    operation: &'static str,
    acquired: Instant,
}

impl OperationLock {
    /// Create an unlocked operation lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock.
    pub async fn acquire(&self, operation: &'static str) -> OperationGuard<'_> {
        debug!(operation, "Acquiring operation lock");
        let guard = self.inner.lock().await;
        debug!(operation, "Acquired operation lock");
        OperationGuard {
            _guard: guard,
            operation,
            acquired: Instant::now(),
        }
    }

    /// Whether some operation currently holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        debug!(
            operation = self.operation,
            held_ms = self.acquired.elapsed().as_millis(),
            "Released operation lock"
        );
    }
}

/// The upgrade currently in flight.
#[derive(Debug, Clone)]
struct UpgradeState {
    target_version: String,
    started_at: DateTime<Utc>,
    started: Instant,
    phase: UpgradePhase,
}

/// Point-in-time view of the tracked upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeSnapshot {
    /// Version being installed.
    pub target_version: String,
    /// Phase reached so far.
    pub phase: UpgradePhase,
    /// Wall-clock start of the attempt.
    pub started_at: DateTime<Utc>,
    /// How long the attempt has been running.
    pub elapsed: Duration,
}

/// Tracks at most one in-flight upgrade.
///
/// Nothing is persisted; a restarted agent starts with no tracked upgrade.
#[derive(Debug, Default)]
pub struct UpgradeTracker {
    state: Mutex<Option<UpgradeState>>,
}

impl UpgradeTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an upgrade to exactly `target_version` is tracked.
    ///
    /// A tracked upgrade to a different version is superseded: it is
    /// discarded and this returns `false`.
    pub fn is_in_progress(&self, target_version: &str) -> bool {
        let mut state = self.state.lock();
        match state.as_ref() {
            None => false,
            Some(current) if current.target_version == target_version => {
                info!(
                    target_version,
                    phase = ?current.phase,
                    elapsed_secs = current.started.elapsed().as_secs(),
                    "Upgrade already in progress"
                );
                true
            }
            Some(current) => {
                info!(
                    old_target = %current.target_version,
                    new_target = target_version,
                    "New target version requested, discarding previous upgrade"
                );
                *state = None;
                false
            }
        }
    }

    /// Start tracking an upgrade to `target_version`.
    pub fn start(&self, target_version: &str) -> DateTime<Utc> {
        let started_at = Utc::now();
        *self.state.lock() = Some(UpgradeState {
            target_version: target_version.to_string(),
            started_at,
            started: Instant::now(),
            phase: UpgradePhase::Installing,
        });
        info!(target_version, "Starting upgrade");
        started_at
    }

    /// Record the phase the tracked upgrade reached.
    pub fn set_phase(&self, phase: UpgradePhase) {
        if let Some(state) = self.state.lock().as_mut() {
            state.phase = phase;
        }
    }

    /// Forget the tracked upgrade, returning what was tracked.
    pub fn clear(&self) -> Option<UpgradeSnapshot> {
        let cleared = self.state.lock().take().map(|s| snapshot_of(&s));
        if let Some(snapshot) = &cleared {
            info!(
                target_version = %snapshot.target_version,
                elapsed_secs = snapshot.elapsed.as_secs(),
                "Cleared upgrade state"
            );
        }
        cleared
    }

    /// The tracked upgrade and how long it has been waiting.
    #[must_use]
    pub fn snapshot(&self) -> Option<UpgradeSnapshot> {
        self.state.lock().as_ref().map(snapshot_of)
    }
}

fn snapshot_of(state: &UpgradeState) -> UpgradeSnapshot {
    UpgradeSnapshot {
        target_version: state.target_version.clone(),
        phase: state.phase,
        started_at: state.started_at,
        elapsed: state.started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn same_target_is_in_progress() {
        let tracker = UpgradeTracker::new();
        assert!(!tracker.is_in_progress("B"));

        tracker.start("B");
        assert!(tracker.is_in_progress("B"));
        assert!(tracker.is_in_progress("B"));
    }

    #[test]
    fn different_target_supersedes() {
        let tracker = UpgradeTracker::new();
        tracker.start("B");

        assert!(!tracker.is_in_progress("C"));
        assert!(tracker.snapshot().is_none());
        assert!(!tracker.is_in_progress("B"));
    }

    #[test]
    fn phase_and_clear() {
        let tracker = UpgradeTracker::new();
        tracker.start("B");
        tracker.set_phase(UpgradePhase::AwaitingVersion);

        let snapshot = tracker.snapshot().unwrap();
        assert_eq!(snapshot.target_version, "B");
        assert_eq!(snapshot.phase, UpgradePhase::AwaitingVersion);

        let cleared = tracker.clear().unwrap();
        assert_eq!(cleared.target_version, "B");
        assert!(tracker.snapshot().is_none());
        assert!(tracker.clear().is_none());
    }

    #[tokio::test]
    async fn operation_lock_serializes() {
        let lock = Arc::new(OperationLock::new());
        assert!(!lock.is_locked());

        let guard = lock.acquire("first").await;
        assert!(lock.is_locked());

        let waiter = {
            let lock = Arc::clone(&lock);
            tokio::spawn(async move {
                let _guard = lock.acquire("second").await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert!(!lock.is_locked());
    }
}
