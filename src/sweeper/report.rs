use crate::error::SweepError;
use crate::executor::DeletionOutcome;
use std::fmt;

/// Tally of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: usize,
    pub simulated: usize,
    pub already_gone: usize,
    pub declined: usize,
    /// Candidates left alone because deleting them would break preservation.
    pub unsafe_skipped: usize,
    pub purged_entries: usize,
    pub unregistered_found: usize,
    pub anomalies: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn record(&mut self, outcome: DeletionOutcome) {
        match outcome {
            DeletionOutcome::Deleted => self.deleted += 1,
            DeletionOutcome::Simulated => self.simulated += 1,
            DeletionOutcome::AlreadyGone => self.already_gone += 1,
            DeletionOutcome::Declined => self.declined += 1,
        }
    }

    pub fn record_failure(&mut self, error: &SweepError) {
        if matches!(error, SweepError::NothingToDelete { .. }) {
            self.anomalies += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn absorb(&mut self, other: SweepReport) {
        self.deleted += other.deleted;
        self.simulated += other.simulated;
        self.already_gone += other.already_gone;
        self.declined += other.declined;
        self.unsafe_skipped += other.unsafe_skipped;
        self.purged_entries += other.purged_entries;
        self.unregistered_found += other.unregistered_found;
        self.anomalies += other.anomalies;
        self.failed += other.failed;
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.anomalies > 0
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deleted={} simulated={} already_gone={} declined={} unsafe_skipped={} \
             unregistered={} purged={} anomalies={} failed={}",
            self.deleted,
            self.simulated,
            self.already_gone,
            self.declined,
            self.unsafe_skipped,
            self.unregistered_found,
            self.purged_entries,
            self.anomalies,
            self.failed,
        )
    }
}
