//! Change-event coalescer.
//!
//! Filesystem events arrive in bursts (editors write temp files, exports
//! touch dozens of assets at once). The coalescer folds a burst into a
//! single dirty flag and runs one sync round after a quiet period. Events
//! that land while a round is running are not lost: the flags stay dirty
//! and exactly one follow-up round is scheduled when the run finishes.
//!
//! Timers are never aborted. Every (re)schedule bumps a generation
//! counter and a timer that wakes with a stale generation simply returns,
//! so a rescheduled timer can never cancel a sync that is already in
//! flight.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, error};

use crate::engine::SyncOptions;

/// Anything the coalescer can drive. Implemented by the sync engine and
/// by test doubles.
#[async_trait::async_trait]
pub trait SyncRunner: Send {
    async fn run_sync(&mut self, options: SyncOptions) -> anyhow::Result<()>;
}

struct DirtyState {
    /// Something changed since the last snapshot.
    dirty: bool,
    /// The captions file was among the changes.
    captions_dirty: bool,
    /// Bumped on every schedule; stale timers check it and bail.
    generation: u64,
}

struct CoalescerInner<R> {
    runner: tokio::sync::Mutex<R>,
    flags: Mutex<DirtyState>,
    /// Quiet period after the last event before a round starts.
    debounce: Duration,
    /// Delay before re-checking when the runner is busy or a round failed.
    retry: Duration,
    dry_run: bool,
    /// Captured at construction so `notify_change` works from watcher
    /// threads that are not tokio workers.
    handle: Handle,
}

pub struct Coalescer<R: SyncRunner + 'static> {
    inner: Arc<CoalescerInner<R>>,
}

impl<R: SyncRunner + 'static> Clone for Coalescer<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: SyncRunner + 'static> Coalescer<R> {
    /// Must be called from within a tokio runtime.
    pub fn new(runner: R, debounce: Duration, retry: Duration, dry_run: bool) -> Self {
        Self {
            inner: Arc::new(CoalescerInner {
                runner: tokio::sync::Mutex::new(runner),
                flags: Mutex::new(DirtyState {
                    dirty: false,
                    captions_dirty: false,
                    generation: 0,
                }),
                debounce,
                retry,
                dry_run,
                handle: Handle::current(),
            }),
        }
    }

    /// Record a change and (re)start the debounce window. Safe to call
    /// from any thread.
    pub fn notify_change(&self, captions: bool) {
        {
            let mut flags = self.inner.lock_flags();
            flags.dirty = true;
            flags.captions_dirty |= captions;
        }
        self.inner.arm(self.inner.debounce);
    }
}

impl<R: SyncRunner + 'static> CoalescerInner<R> {
    fn lock_flags(&self) -> MutexGuard<'_, DirtyState> {
        self.flags.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Schedule a fire after `delay`. Supersedes any pending timer via the
    /// generation counter.
    fn arm(self: &Arc<Self>, delay: Duration) {
        let generation = {
            let mut flags = self.lock_flags();
            flags.generation += 1;
            flags.generation
        };
        let inner = Arc::clone(self);
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire(generation).await;
        });
    }

    async fn fire(self: Arc<Self>, generation: u64) {
        {
            let flags = self.lock_flags();
            if flags.generation != generation {
                // A newer timer owns this round.
                return;
            }
            if !flags.dirty {
                return;
            }
        }

        // A round may already be in flight (startup sync, or a previous
        // burst). Leave the flags dirty and check back later.
        let mut runner = match self.runner.try_lock() {
            Ok(runner) => runner,
            Err(_) => {
                debug!("sync already running, will retry");
                self.arm(self.retry);
                return;
            }
        };

        // Snapshot and clear only now that the lock is held, so events
        // during the run re-dirty the flags for the follow-up.
        let captions = {
            let mut flags = self.lock_flags();
            if !flags.dirty {
                return;
            }
            let captions = flags.captions_dirty;
            flags.dirty = false;
            flags.captions_dirty = false;
            captions
        };

        let options = SyncOptions {
            is_startup: false,
            reason: "Watcher Sync".to_string(),
            dry_run: self.dry_run,
            captions_changed: captions,
        };
        let failed = match runner.run_sync(options).await {
            Ok(()) => false,
            Err(e) => {
                error!(error = %e, "sync round failed, will retry");
                let mut flags = self.lock_flags();
                flags.dirty = true;
                flags.captions_dirty |= captions;
                true
            }
        };
        drop(runner);

        // Events that arrived mid-run, or the failure above, get exactly
        // one follow-up round.
        let pending = self.lock_flags().dirty;
        if pending {
            self.arm(if failed { self.retry } else { self.debounce });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Semaphore;

    struct MockRunner {
        /// `captions_changed` of every round, in order.
        runs: Arc<StdMutex<Vec<bool>>>,
        /// When set, each round consumes one permit before recording.
        gate: Option<Arc<Semaphore>>,
        failures_remaining: u32,
    }

    #[async_trait::async_trait]
    impl SyncRunner for MockRunner {
        async fn run_sync(&mut self, options: SyncOptions) -> anyhow::Result<()> {
            if let Some(gate) = &self.gate {
                gate.acquire().await?.forget();
            }
            self.runs.lock().unwrap().push(options.captions_changed);
            if self.failures_remaining > 0 {
                self.failures_remaining -= 1;
                anyhow::bail!("simulated failure");
            }
            Ok(())
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn runner(runs: &Arc<StdMutex<Vec<bool>>>) -> MockRunner {
        MockRunner {
            runs: runs.clone(),
            gate: None,
            failures_remaining: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_events_coalesces_into_one_round() {
        let runs = Arc::new(StdMutex::new(Vec::new()));
        let coalescer = Coalescer::new(runner(&runs), ms(200), ms(500), false);

        for _ in 0..5 {
            coalescer.notify_change(false);
        }
        tokio::time::sleep(ms(5_000)).await;

        assert_eq!(runs.lock().unwrap().as_slice(), &[false]);
    }

    #[tokio::test(start_paused = true)]
    async fn captions_flag_survives_coalescing() {
        let runs = Arc::new(StdMutex::new(Vec::new()));
        let coalescer = Coalescer::new(runner(&runs), ms(200), ms(500), false);

        coalescer.notify_change(false);
        coalescer.notify_change(true);
        coalescer.notify_change(false);
        tokio::time::sleep(ms(5_000)).await;

        assert_eq!(runs.lock().unwrap().as_slice(), &[true]);
    }

    #[tokio::test(start_paused = true)]
    async fn events_during_a_run_get_one_follow_up() {
        let runs = Arc::new(StdMutex::new(Vec::new()));
        let gate = Arc::new(Semaphore::new(0));
        let coalescer = Coalescer::new(
            MockRunner {
                runs: runs.clone(),
                gate: Some(gate.clone()),
                failures_remaining: 0,
            },
            ms(200),
            ms(500),
            false,
        );

        coalescer.notify_change(false);
        // Debounce elapses and the round blocks on the gate.
        tokio::time::sleep(ms(300)).await;

        // More events while the round is in flight; their timers find the
        // runner busy and reschedule.
        coalescer.notify_change(false);
        coalescer.notify_change(true);

        gate.add_permits(2);
        tokio::time::sleep(ms(10_000)).await;

        // One round for the burst, one follow-up covering both mid-run
        // events with the captions flag intact.
        assert_eq!(runs.lock().unwrap().as_slice(), &[false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_round_is_retried_with_flags_preserved() {
        let runs = Arc::new(StdMutex::new(Vec::new()));
        let coalescer = Coalescer::new(
            MockRunner {
                runs: runs.clone(),
                gate: None,
                failures_remaining: 1,
            },
            ms(200),
            ms(500),
            false,
        );

        coalescer.notify_change(true);
        tokio::time::sleep(ms(10_000)).await;

        // First attempt failed; the retry still sees captions_changed.
        assert_eq!(runs.lock().unwrap().as_slice(), &[true, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn quiescent_coalescer_runs_nothing_further() {
        let runs = Arc::new(StdMutex::new(Vec::new()));
        let coalescer = Coalescer::new(runner(&runs), ms(200), ms(500), false);

        coalescer.notify_change(false);
        tokio::time::sleep(ms(5_000)).await;
        assert_eq!(runs.lock().unwrap().len(), 1);

        tokio::time::sleep(ms(60_000)).await;
        assert_eq!(runs.lock().unwrap().len(), 1);
    }
}
