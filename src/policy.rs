//! Retention policy engine.
//!
//! Everything here is a pure decision over run snapshots. The `eligible_*`
//! helpers re-query the store on each call instead of caching, so a caller
//! looping over them always sees post-deletion state.

use crate::config::{Config, SharedTierConfig, ThresholdsConfig};
use crate::error::{StoreError, SweepError};
use crate::store::{
    CopyFilter, CopyRecord, DataCategory, MetadataStore, ProcessingStatus, RunQuery, RunRecord,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

const COMPLETED: [ProcessingStatus; 2] = [ProcessingStatus::Done, ProcessingStatus::Transferred];

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    shared_tier_after: Duration,
    processing_wait: Duration,
    high_level_after: Duration,
    shared_designation: String,
    shared_root: String,
}

impl RetentionPolicy {
    pub fn new(thresholds: &ThresholdsConfig, shared_tier: &SharedTierConfig) -> Self {
        Self {
            shared_tier_after: thresholds.shared_tier_after(),
            processing_wait: thresholds.processing_wait(),
            high_level_after: thresholds.high_level_after(),
            shared_designation: shared_tier.designation.clone(),
            shared_root: shared_tier.root.to_string_lossy().into_owned(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.thresholds, &config.shared_tier)
    }

    pub fn is_shared_tier(&self, copy: &CopyRecord) -> bool {
        copy.host == self.shared_designation
    }

    pub fn shared_tier_copy<'a>(&self, run: &'a RunRecord) -> Option<&'a CopyRecord> {
        run.active_copies.iter().find(|c| self.is_shared_tier(c))
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn shared_tier_query(&self, now: DateTime<Utc>) -> RunQuery {
        RunQuery::default()
            .with_statuses(&COMPLETED)
            .started_before(now - self.shared_tier_after)
            .processed_before(now - self.processing_wait)
            .with_active_copy(CopyFilter::on_host(&self.shared_designation))
    }

    pub fn high_level_query(&self, now: DateTime<Utc>, host: &str) -> RunQuery {
        RunQuery::default()
            .with_statuses(&COMPLETED)
            .started_before(now - self.high_level_after)
            .with_active_copy(CopyFilter::on_host(host))
    }

    pub fn non_latest_query(&self, host: &str) -> RunQuery {
        RunQuery::default()
            .processed_elsewhere(host)
            .with_active_copy(CopyFilter::on_host(host))
    }

    pub fn abandoned_query(&self, host: &str, shared_tier: bool) -> RunQuery {
        let filter = if shared_tier {
            CopyFilter::on_host(&self.shared_designation).under(&self.shared_root)
        } else {
            CopyFilter::on_host(host)
        };
        RunQuery::default()
            .with_statuses(&[ProcessingStatus::Abandoned])
            .with_active_copy(filter)
    }

    // ── Selection (re-queries every call) ───────────────────────────────

    /// Next run whose shared-tier copy may be considered, skipping `claimed` runs.
    pub async fn eligible_for_shared_tier_cleanup(
        &self,
        store: &dyn MetadataStore,
        now: DateTime<Utc>,
        claimed: &BTreeSet<u32>,
    ) -> Result<Option<RunRecord>, StoreError> {
        let query = self.shared_tier_query(now).excluding(claimed.iter().copied());
        store.find_run(&query).await
    }

    pub async fn eligible_for_high_level_cleanup(
        &self,
        store: &dyn MetadataStore,
        now: DateTime<Utc>,
        host: &str,
        exclude: &BTreeSet<u32>,
    ) -> Result<Vec<RunRecord>, StoreError> {
        let query = self.high_level_query(now, host).excluding(exclude.iter().copied());
        store.find_runs(&query).await
    }

    pub async fn eligible_non_latest_cleanup(
        &self,
        store: &dyn MetadataStore,
        host: &str,
        exclude: &BTreeSet<u32>,
    ) -> Result<Vec<RunRecord>, StoreError> {
        let query = self.non_latest_query(host).excluding(exclude.iter().copied());
        store.find_runs(&query).await
    }

    pub async fn eligible_abandoned(
        &self,
        store: &dyn MetadataStore,
        host: &str,
        shared_tier: bool,
        exclude: &BTreeSet<u32>,
    ) -> Result<Vec<RunRecord>, StoreError> {
        let query = self
            .abandoned_query(host, shared_tier)
            .excluding(exclude.iter().copied());
        store.find_runs(&query).await
    }

    /// Copies of an abandoned run targeted by abandoned-run cleanup.
    pub fn abandoned_copies<'a>(
        &self,
        run: &'a RunRecord,
        host: &str,
        shared_tier: bool,
    ) -> Vec<&'a CopyRecord> {
        let filter = if shared_tier {
            CopyFilter::on_host(&self.shared_designation).under(&self.shared_root)
        } else {
            CopyFilter::on_host(host)
        };
        run.active_copies.iter().filter(|c| filter.matches(c)).collect()
    }

    // ── Safety predicates ───────────────────────────────────────────────

    /// Whether a raw low-level copy with a real location is active off the shared tier.
    pub fn have_raw_records(&self, run: &RunRecord) -> bool {
        run.active_copies.iter().any(|c| {
            c.category == DataCategory::RawLowLevel && !self.is_shared_tier(c) && c.has_real_location()
        })
    }

    /// Preservation check for deleting `copy` of `run`.
    ///
    /// `force` must only be set for abandoned-run cleanup or a single-run
    /// manual invocation.
    pub fn copy_is_safe_to_delete(&self, run: &RunRecord, copy: &CopyRecord, force: bool) -> bool {
        if run.is_abandoned() || force {
            return true;
        }

        if self.is_shared_tier(copy) {
            return self.have_raw_records(run);
        }

        match copy.category {
            DataCategory::RawLowLevel => run.active_copies.iter().any(|other| {
                other != copy
                    && other.category == DataCategory::RawLowLevel
                    && !self.is_shared_tier(other)
                    && other.has_real_location()
            }),
            DataCategory::LowLevel | DataCategory::HighLevel => {
                self.shared_tier_copy(run).is_none() && self.have_raw_records(run)
            }
        }
    }

    /// Rejects copies whose tag and category disagree.
    pub fn check_classification(
        &self,
        run: &RunRecord,
        copy: &CopyRecord,
        path: &'static str,
    ) -> Result<(), SweepError> {
        if copy.is_misclassified() {
            return Err(contradiction(run, copy, path));
        }
        Ok(())
    }

    /// High-level copies of `run` on `host`.
    ///
    /// A raw-tagged copy among them means the classification is broken and
    /// nothing about this host can be trusted, so the whole sweep aborts.
    pub fn high_level_copies<'a>(
        &self,
        run: &'a RunRecord,
        host: &str,
    ) -> Result<Vec<&'a CopyRecord>, SweepError> {
        let mut copies = Vec::new();
        for copy in run.active_copies.iter().filter(|c| c.host == host) {
            if copy.category != DataCategory::HighLevel {
                continue;
            }
            self.check_classification(run, copy, "high-level")?;
            copies.push(copy);
        }
        Ok(copies)
    }
}

fn contradiction(run: &RunRecord, copy: &CopyRecord, path: &'static str) -> SweepError {
    SweepError::ClassificationContradiction {
        number: run.number,
        kind: copy.kind.clone(),
        category: copy.category.to_string(),
        path,
    }
}
