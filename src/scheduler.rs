//! Command coalescing and consistency checks.
//!
//! Rapid intent changes are collapsed into one write: every change restarts a
//! short debounce timer and only the last timer to be scheduled commits.
//! Commits run under a per-device write lock, so they never interleave.
//! After a commit that put something on the wire, one consistency read is
//! scheduled; a newer intent cancels it before it fires.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::config::SchedulerTiming;
use crate::errors::Error;
use crate::runtime;

type Result<T> = std::result::Result<T, Error>;

/// Where a device is in the set → commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    /// A debounce timer is pending.
    Accumulating,
    /// A commit is running.
    Committing,
}

/// The device side of the scheduler.
pub trait CommitTarget: Send + Sync + 'static {
    fn scheduler(&self) -> &CommandScheduler;

    /// Write the desired state. Resolves to whether anything was sent.
    fn commit(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Read the device back after a commit.
    fn verify(&self) -> impl Future<Output = ()> + Send;

    /// Read the device once it is no longer busy.
    fn poll(&self) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Default)]
struct Timers {
    intent_generation: u64,
    check_generation: u64,
    debounce_pending: bool,
    poll_pending: bool,
    in_flight: usize,
}

/// Per-device scheduler.
#[derive(Debug)]
pub struct CommandScheduler {
    timing: SchedulerTiming,
    timers: Mutex<Timers>,
    write_lock: runtime::Mutex<()>,
}

impl CommandScheduler {
    pub fn new(timing: SchedulerTiming) -> Self {
        CommandScheduler {
            timing,
            timers: Mutex::new(Timers::default()),
            write_lock: runtime::Mutex::new(()),
        }
    }

    pub fn timing(&self) -> &SchedulerTiming {
        &self.timing
    }

    fn timers(&self) -> MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> Phase {
        let timers = self.timers();
        if timers.in_flight > 0 {
            Phase::Committing
        } else if timers.debounce_pending {
            Phase::Accumulating
        } else {
            Phase::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.phase() != Phase::Idle
    }

    /// Restart the debounce timer and drop any pending consistency check.
    pub fn intent_changed<T: CommitTarget>(&self, target: &Arc<T>) {
        let generation = {
            let mut timers = self.timers();
            timers.intent_generation += 1;
            timers.check_generation += 1;
            timers.debounce_pending = true;
            timers.intent_generation
        };

        let target = Arc::clone(target);
        runtime::spawn(async move {
            let scheduler = target.scheduler();
            runtime::sleep(scheduler.timing.debounce()).await;
            if !scheduler.begin_commit(generation) {
                return;
            }

            let outcome = {
                let _write = scheduler.write_lock.lock().await;
                target.commit().await
            };
            let check = scheduler.end_commit(matches!(outcome, Ok(true)));

            match outcome {
                Ok(true) => {
                    if let Some(generation) = check {
                        scheduler.spawn_check(&target, generation);
                    }
                }
                Ok(false) => debug!("commit sent nothing"),
                Err(e) => error!("commit failed: {}", e),
            }
        })
        .detach();
    }

    /// Schedule one consistency read after the configured delay.
    pub fn schedule_check<T: CommitTarget>(&self, target: &Arc<T>) {
        let generation = {
            let mut timers = self.timers();
            timers.check_generation += 1;
            timers.check_generation
        };
        self.spawn_check(target, generation);
    }

    fn spawn_check<T: CommitTarget>(&self, target: &Arc<T>, generation: u64) {
        let target = Arc::clone(target);
        runtime::spawn(async move {
            let scheduler = target.scheduler();
            runtime::sleep(scheduler.timing.consistency_delay()).await;
            if !scheduler.check_is_current(generation) {
                debug!("consistency check superseded");
                return;
            }
            let _write = scheduler.write_lock.lock().await;
            if scheduler.check_is_current(generation) {
                target.verify().await;
            }
        })
        .detach();
    }

    /// Run a consistency read now, in place of any scheduled one.
    pub async fn check_now<T: CommitTarget>(&self, target: &T) {
        self.timers().check_generation += 1;
        let _write = self.write_lock.lock().await;
        target.verify().await;
    }

    /// Poll the device once the current debounce/commit cycle is over.
    ///
    /// At most one poll is pending per device.
    pub fn schedule_poll<T: CommitTarget>(&self, target: &Arc<T>) {
        {
            let mut timers = self.timers();
            if timers.poll_pending {
                return;
            }
            timers.poll_pending = true;
        }

        let target = Arc::clone(target);
        runtime::spawn(async move {
            let scheduler = target.scheduler();
            loop {
                runtime::sleep(scheduler.timing.poll_interval()).await;
                if !scheduler.is_busy() {
                    break;
                }
            }
            scheduler.timers().poll_pending = false;
            target.poll().await;
        })
        .detach();
    }

    fn begin_commit(&self, generation: u64) -> bool {
        let mut timers = self.timers();
        if timers.intent_generation != generation {
            return false;
        }
        timers.debounce_pending = false;
        timers.in_flight += 1;
        true
    }

    /// Leave the commit phase. When something was sent, returns the check
    /// generation claimed in the same step, so that an intent arriving
    /// right after still cancels the check.
    fn end_commit(&self, sent: bool) -> Option<u64> {
        let mut timers = self.timers();
        timers.in_flight = timers.in_flight.saturating_sub(1);
        if !sent {
            return None;
        }
        timers.check_generation += 1;
        Some(timers.check_generation)
    }

    fn check_is_current(&self, generation: u64) -> bool {
        self.timers().check_generation == generation
    }
}

#[cfg(all(test, feature = "runtime-tokio"))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counter {
        scheduler: CommandScheduler,
        sends: AtomicBool,
        commits: AtomicUsize,
        verifies: AtomicUsize,
        polls: AtomicUsize,
    }

    impl Counter {
        fn new(sends: bool) -> Arc<Self> {
            Arc::new(Counter {
                scheduler: CommandScheduler::new(SchedulerTiming {
                    debounce_ms: 20,
                    consistency_delay_ms: 200,
                    poll_interval_ms: 10,
                }),
                sends: AtomicBool::new(sends),
                commits: AtomicUsize::new(0),
                verifies: AtomicUsize::new(0),
                polls: AtomicUsize::new(0),
            })
        }
    }

    impl CommitTarget for Counter {
        fn scheduler(&self) -> &CommandScheduler {
            &self.scheduler
        }

        async fn commit(&self) -> Result<bool> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(self.sends.load(Ordering::SeqCst))
        }

        async fn verify(&self) {
            self.verifies.fetch_add(1, Ordering::SeqCst);
        }

        async fn poll(&self) {
            self.polls.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_changes_commit_once() {
        let target = Counter::new(true);
        for _ in 0..3 {
            target.scheduler.intent_changed(&target);
            assert_eq!(target.scheduler.phase(), Phase::Accumulating);
            wait(5).await;
        }
        wait(100).await;
        assert_eq!(target.commits.load(Ordering::SeqCst), 1);
        assert_eq!(target.verifies.load(Ordering::SeqCst), 0);

        wait(300).await;
        assert_eq!(target.verifies.load(Ordering::SeqCst), 1);
        assert_eq!(target.scheduler.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_sent_skips_check() {
        let target = Counter::new(false);
        target.scheduler.intent_changed(&target);
        wait(500).await;
        assert_eq!(target.commits.load(Ordering::SeqCst), 1);
        assert_eq!(target.verifies.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_intent_cancels_pending_check() {
        let target = Counter::new(true);
        target.scheduler.intent_changed(&target);
        wait(100).await;
        assert_eq!(target.commits.load(Ordering::SeqCst), 1);

        target.scheduler.intent_changed(&target);
        wait(1000).await;
        assert_eq!(target.commits.load(Ordering::SeqCst), 2);
        assert_eq!(target.verifies.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_waits_for_idle() {
        let target = Counter::new(false);
        target.scheduler.intent_changed(&target);
        target.scheduler.schedule_poll(&target);
        target.scheduler.schedule_poll(&target);
        assert!(target.scheduler.is_busy());

        wait(100).await;
        assert_eq!(target.polls.load(Ordering::SeqCst), 1);
        assert!(!target.scheduler.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_intent_right_after_commit_cancels_check() {
        let target = Counter::new(true);
        assert!(target.scheduler.begin_commit(0));
        let generation = target.scheduler.end_commit(true).unwrap();

        target.scheduler.intent_changed(&target);
        target.scheduler.spawn_check(&target, generation);
        wait(150).await;
        assert_eq!(target.commits.load(Ordering::SeqCst), 1);

        wait(55).await;
        assert_eq!(target.verifies.load(Ordering::SeqCst), 0);

        // Only the check of the second commit runs.
        wait(500).await;
        assert_eq!(target.verifies.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_now_supersedes_scheduled_check() {
        let target = Counter::new(true);
        target.scheduler.schedule_check(&target);
        target.scheduler.check_now(target.as_ref()).await;
        wait(500).await;
        assert_eq!(target.verifies.load(Ordering::SeqCst), 1);
    }
}
