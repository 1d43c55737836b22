//! Background deletion tracker.
//!
//! Shared-tier deletions run as tokio tasks owned by this tracker. A
//! semaphore bounds how many are in flight; `wait_all` is the barrier every
//! step depending on post-deletion shared-tier state must pass first.

use crate::error::SweepError;
use crate::executor::DeletionOutcome;
use crate::sweeper::SweepReport;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

/// Name prefix of background deletion tasks, followed by the run id.
pub const DELETION_TASK_PREFIX: &str = "delete-shared-";

struct TaskReport {
    name: String,
    result: Result<DeletionOutcome, SweepError>,
}

/// Removes a run from the claimed set when its task ends, panics included.
struct ClaimGuard {
    claimed: Arc<Mutex<BTreeSet<u32>>>,
    number: u32,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.claimed.lock().remove(&self.number);
    }
}

pub struct DeletionTracker {
    slots: Arc<Semaphore>,
    bound: usize,
    tasks: Mutex<JoinSet<TaskReport>>,
    claimed: Arc<Mutex<BTreeSet<u32>>>,
    tally: Mutex<SweepReport>,
    poll: Duration,
}

impl DeletionTracker {
    pub fn new(bound: usize, poll: Duration) -> Self {
        let bound = bound.max(1);
        Self {
            slots: Arc::new(Semaphore::new(bound)),
            bound,
            tasks: Mutex::new(JoinSet::new()),
            claimed: Arc::new(Mutex::new(BTreeSet::new())),
            tally: Mutex::new(SweepReport::default()),
            poll: poll.max(Duration::from_millis(10)),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.bound - self.slots.available_permits()
    }

    /// Runs with a deletion dispatched and not yet finished.
    pub fn claimed(&self) -> BTreeSet<u32> {
        self.claimed.lock().clone()
    }

    /// Starts `deletion` in the background, waiting for a free slot first.
    pub async fn dispatch<F>(&self, number: u32, name: String, deletion: F)
    where
        F: Future<Output = Result<DeletionOutcome, SweepError>> + Send + 'static,
    {
        if self.slots.available_permits() == 0 {
            debug!(task = %name, in_flight = self.in_flight(), "deferring dispatch until a slot frees");
        }
        let Ok(permit) = Arc::clone(&self.slots).acquire_owned().await else {
            error!(task = %name, "deletion slots closed, not dispatching");
            return;
        };

        self.claimed.lock().insert(number);
        let guard = ClaimGuard {
            claimed: Arc::clone(&self.claimed),
            number,
        };

        debug!(task = %name, "dispatching background deletion");
        self.tasks.lock().spawn(async move {
            let _permit = permit;
            let _guard = guard;
            let result = deletion.await;
            TaskReport { name, result }
        });

        self.reap_finished();
    }

    /// Collects already finished tasks without waiting.
    pub fn reap_finished(&self) {
        let finished: Vec<_> = {
            let mut tasks = self.tasks.lock();
            std::iter::from_fn(|| tasks.try_join_next()).collect()
        };
        for joined in finished {
            self.record(joined);
        }
    }

    /// Blocks until every dispatched deletion has finished.
    pub async fn wait_all(&self) {
        let mut ticker = tokio::time::interval(self.poll);
        loop {
            let mut pending = std::mem::take(&mut *self.tasks.lock());
            if pending.is_empty() {
                return;
            }
            info!(outstanding = pending.len(), "waiting for background deletions");
            while !pending.is_empty() {
                tokio::select! {
                    Some(joined) = pending.join_next() => self.record(joined),
                    _ = ticker.tick() => {
                        debug!(outstanding = pending.len(), "background deletions still running");
                    }
                }
            }
        }
    }

    /// Outcomes of finished background tasks since the last call.
    pub fn take_tally(&self) -> SweepReport {
        std::mem::take(&mut *self.tally.lock())
    }

    fn record(&self, joined: Result<TaskReport, JoinError>) {
        let mut tally = self.tally.lock();
        match joined {
            Ok(TaskReport { name, result: Ok(outcome) }) => {
                debug!(task = %name, %outcome, "background deletion finished");
                tally.record(outcome);
            }
            Ok(TaskReport { name, result: Err(e) }) => {
                error!(task = %name, error = %e, "background deletion failed");
                tally.record_failure(&e);
            }
            Err(e) => {
                error!(error = %e, "background deletion task aborted");
                tally.failed += 1;
            }
        }
    }
}
