//! Orchestration loop.
//!
//! Each cleanup mode is a bounded select/execute loop: pick candidates from
//! a fresh store query, run them through the preservation check, delete,
//! repeat until nothing new is eligible. Shared-tier deletions go to the
//! background tracker; everything else runs in the foreground.

mod emergency;
mod mode;
mod report;
mod signal;

pub use emergency::{EmergencyTrigger, NoEmergency, SentinelFile};
pub use mode::CleanMode;
pub use report::SweepReport;
pub use signal::{StopSignal, spawn_ctrl_c};

use crate::config::Config;
use crate::error::SweepError;
use crate::executor::DeletionExecutor;
use crate::policy::RetentionPolicy;
use crate::scanner;
use crate::storage::StorageFs;
use crate::store::{CopyRecord, CopyTarget, DataCategory, MetadataStore, RunRecord};
use crate::tracker::{DELETION_TASK_PREFIX, DeletionTracker};
use crate::ui::confirm::{self, Confirm, PromptConfirm};
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOptions {
    /// Actually delete. Without it every mode is a dry-run.
    pub execute: bool,
    /// Gate every mutating action behind an interactive yes/no.
    pub ask_confirm: bool,
}

pub struct Sweeper {
    host: String,
    local_root: PathBuf,
    shared_root: PathBuf,
    shared_designation: String,
    shared_writer: bool,
    policy: RetentionPolicy,
    store: Arc<dyn MetadataStore>,
    fs: Arc<dyn StorageFs>,
    executor: DeletionExecutor,
    tracker: DeletionTracker,
    confirm: Option<Arc<dyn Confirm>>,
    emergency: Box<dyn EmergencyTrigger>,
    stop: Arc<StopSignal>,
    max_iterations: usize,
    nap: Duration,
    dry_run: bool,
}

impl Sweeper {
    pub fn new(
        config: &Config,
        host: impl Into<String>,
        store: Arc<dyn MetadataStore>,
        fs: Arc<dyn StorageFs>,
        options: SweepOptions,
    ) -> Result<Self, SweepError> {
        let host = host.into();
        let local_root = config.local_root(&host)?.to_path_buf();
        let dry_run = !options.execute;

        let emergency: Box<dyn EmergencyTrigger> = match &config.sweep.emergency_sentinel {
            Some(path) => Box::new(SentinelFile::new(path)),
            None => Box::new(NoEmergency),
        };

        let sweeper = Self {
            local_root,
            shared_root: config.shared_tier.root.clone(),
            shared_designation: config.shared_tier.designation.clone(),
            shared_writer: config.is_shared_tier_writer(&host),
            policy: RetentionPolicy::from_config(config),
            executor: DeletionExecutor::new(
                Arc::clone(&store),
                Arc::clone(&fs),
                host.clone(),
                dry_run,
            ),
            tracker: DeletionTracker::new(
                config.concurrency.bound(options.ask_confirm),
                Duration::from_millis(config.concurrency.barrier_poll_ms),
            ),
            host,
            store,
            fs,
            confirm: None,
            emergency,
            stop: StopSignal::new(),
            max_iterations: config.sweep.max_iterations_per_mode.max(1),
            nap: Duration::from_secs(config.sweep.nap_secs),
            dry_run,
        };

        Ok(if options.ask_confirm {
            sweeper.with_confirm(Arc::new(PromptConfirm))
        } else {
            sweeper
        })
    }

    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.executor = self.executor.with_confirm(Arc::clone(&confirm));
        self.confirm = Some(confirm);
        self
    }

    pub fn with_emergency(mut self, emergency: Box<dyn EmergencyTrigger>) -> Self {
        self.emergency = emergency;
        self
    }

    pub fn with_nap(mut self, nap: Duration) -> Self {
        self.nap = nap;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_shared_tier_writer(&self) -> bool {
        self.shared_writer
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn stop_signal(&self) -> Arc<StopSignal> {
        Arc::clone(&self.stop)
    }

    /// Operator go/no-go before the first live deletion.
    pub async fn confirm_start(&self) -> Result<(), SweepError> {
        let Some(confirm) = &self.confirm else {
            return Ok(());
        };
        if self.dry_run {
            return Ok(());
        }
        let prompt = format!("Start deleting data as host '{}'?", self.host);
        if confirm::ask(confirm, prompt).await {
            Ok(())
        } else {
            Err(SweepError::ConfirmationDeclined(
                "operator declined to start a live sweep".into(),
            ))
        }
    }

    pub fn check_emergency(&self) -> Result<(), SweepError> {
        if self.emergency.should_abort() {
            let reason = self.emergency.describe();
            error!(host = %self.host, %reason, "emergency trigger fired, aborting");
            return Err(SweepError::EmergencyAbort(reason));
        }
        Ok(())
    }

    // ── Entry points ────────────────────────────────────────────────────

    /// One pass of `mode`, barrier included.
    pub async fn run_mode(&self, mode: CleanMode, force: bool) -> Result<SweepReport, SweepError> {
        self.check_emergency()?;
        if force && !matches!(mode, CleanMode::Abandoned | CleanMode::All) {
            warn!(%mode, "--force only applies to abandoned-run cleanup, ignoring it");
        }
        info!(%mode, host = %self.host, dry_run = self.dry_run, "starting pass");

        let mut report = SweepReport::default();
        let result = match mode {
            CleanMode::SharedTier => self.clean_shared_tier(&mut report).await,
            CleanMode::HighLevel => self.clean_high_level(&mut report).await,
            CleanMode::NonLatest => self.clean_non_latest(&mut report).await,
            CleanMode::Unregistered => self.clean_unregistered(&mut report).await,
            CleanMode::Abandoned => self.clean_abandoned(force, &mut report).await,
            CleanMode::RawVeto => self.clean_raw_veto(),
            CleanMode::All => self.clean_all(force, &mut report).await,
        };

        self.tracker.wait_all().await;
        report.absorb(self.tracker.take_tally());
        result?;

        info!(%mode, %report, "pass complete");
        Ok(report)
    }

    /// Runs `mode` repeatedly with a nap in between until stopped.
    pub async fn run_continuous(&self, mode: CleanMode, force: bool) -> Result<(), SweepError> {
        loop {
            let report = self.run_mode(mode, force).await?;
            if report.has_failures() {
                warn!(%mode, failed = report.failed, anomalies = report.anomalies, "pass finished with problems");
            }
            if self.stop.is_set() {
                info!("stop requested, leaving continuous mode");
                return Ok(());
            }
            debug!(nap_secs = self.nap.as_secs(), "napping");
            tokio::select! {
                () = tokio::time::sleep(self.nap) => {}
                () = self.stop.wait() => {
                    info!("stop requested during nap");
                    return Ok(());
                }
            }
        }
    }

    /// Cleans the copies of one run on this host.
    ///
    /// With `delete_live` the designated host also removes the shared-tier
    /// copy first. `force` skips the preservation check.
    pub async fn clean_run(
        &self,
        number: u32,
        delete_live: bool,
        force: bool,
    ) -> Result<SweepReport, SweepError> {
        self.check_emergency()?;
        let Some(run) = self.store.get_run(number).await? else {
            return Err(anyhow::anyhow!("run {number} is not in the metadata store").into());
        };
        if force {
            warn!(run = number, "preservation check disabled for this run");
        }

        let mut report = SweepReport::default();

        if delete_live && !self.stop.is_set() {
            if !self.shared_writer {
                warn!(
                    run = number,
                    host = %self.host,
                    "not the shared-tier writer, leaving the shared-tier copy alone"
                );
            } else if let Some(copy) = self.policy.shared_tier_copy(&run) {
                self.delete_checked(number, copy.target(), force, "single-run", &mut report)
                    .await?;
            } else {
                info!(run = number, "no active shared-tier copy");
            }
        }

        // Processed products first so the raw copies they depend on go last.
        'copies: for category in [
            DataCategory::HighLevel,
            DataCategory::LowLevel,
            DataCategory::RawLowLevel,
        ] {
            let targets: Vec<CopyTarget> = run
                .active_on(&self.host)
                .filter(|c| c.category == category)
                .map(CopyRecord::target)
                .collect();
            for target in targets {
                if self.stop.is_set() {
                    info!(run = number, "stop requested, leaving the remaining copies");
                    break 'copies;
                }
                self.delete_checked(number, target, force, "single-run", &mut report)
                    .await?;
            }
        }

        self.tracker.wait_all().await;
        report.absorb(self.tracker.take_tally());
        info!(run = number, %report, "single-run cleanup complete");
        Ok(report)
    }

    // ── Modes ───────────────────────────────────────────────────────────

    async fn clean_all(&self, force: bool, report: &mut SweepReport) -> Result<(), SweepError> {
        self.clean_shared_tier(report).await?;
        self.clean_abandoned(force, report).await?;
        self.clean_high_level(report).await?;
        self.clean_non_latest(report).await?;
        self.clean_unregistered(report).await
    }

    async fn clean_shared_tier(&self, report: &mut SweepReport) -> Result<(), SweepError> {
        if !self.shared_writer {
            debug!(host = %self.host, "not the shared-tier writer, skipping shared-tier cleanup");
            return Ok(());
        }

        let now = Utc::now();
        let mut passed = BTreeSet::new();
        for _ in 0..self.max_iterations {
            if self.stop.is_set() {
                return Ok(());
            }
            self.tracker.reap_finished();
            let mut exclude = self.tracker.claimed();
            exclude.extend(passed.iter().copied());

            let Some(run) = self
                .policy
                .eligible_for_shared_tier_cleanup(self.store.as_ref(), now, &exclude)
                .await?
            else {
                debug!("no more shared-tier candidates");
                return Ok(());
            };
            passed.insert(run.number);

            let Some(copy) = self.policy.shared_tier_copy(&run).cloned() else {
                continue;
            };
            self.policy.check_classification(&run, &copy, "shared-tier")?;
            if !self.policy.copy_is_safe_to_delete(&run, &copy, false) {
                info!(
                    run = run.number,
                    "no raw copy registered elsewhere, keeping shared-tier copy"
                );
                report.unsafe_skipped += 1;
                continue;
            }
            self.dispatch_shared(run, copy).await;
        }
        self.iteration_limit(CleanMode::SharedTier);
        Ok(())
    }

    async fn clean_high_level(&self, report: &mut SweepReport) -> Result<(), SweepError> {
        // Safety of processed copies depends on the shared tier being settled.
        self.tracker.wait_all().await;

        let now = Utc::now();
        let mut passed = BTreeSet::new();
        for _ in 0..self.max_iterations {
            let runs = self
                .policy
                .eligible_for_high_level_cleanup(self.store.as_ref(), now, &self.host, &passed)
                .await?;
            if runs.is_empty() {
                return Ok(());
            }
            for run in runs {
                if self.stop.is_set() {
                    return Ok(());
                }
                passed.insert(run.number);
                let targets: Vec<CopyTarget> = self
                    .policy
                    .high_level_copies(&run, &self.host)?
                    .into_iter()
                    .map(CopyRecord::target)
                    .collect();
                for target in targets {
                    self.delete_checked(run.number, target, false, "high-level", report)
                        .await?;
                }
            }
        }
        self.iteration_limit(CleanMode::HighLevel);
        Ok(())
    }

    async fn clean_non_latest(&self, report: &mut SweepReport) -> Result<(), SweepError> {
        self.tracker.wait_all().await;

        let mut passed = BTreeSet::new();
        for _ in 0..self.max_iterations {
            let runs = self
                .policy
                .eligible_non_latest_cleanup(self.store.as_ref(), &self.host, &passed)
                .await?;
            if runs.is_empty() {
                return Ok(());
            }
            for run in runs {
                if self.stop.is_set() {
                    return Ok(());
                }
                passed.insert(run.number);
                let targets: Vec<CopyTarget> = run
                    .active_on(&self.host)
                    .filter(|c| c.category != DataCategory::RawLowLevel)
                    .map(CopyRecord::target)
                    .collect();
                for target in targets {
                    self.delete_checked(run.number, target, false, "non-latest", report)
                        .await?;
                }
            }
        }
        self.iteration_limit(CleanMode::NonLatest);
        Ok(())
    }

    async fn clean_abandoned(&self, force: bool, report: &mut SweepReport) -> Result<(), SweepError> {
        let mut passed = BTreeSet::new();
        for _ in 0..self.max_iterations {
            let runs = self
                .policy
                .eligible_abandoned(self.store.as_ref(), &self.host, false, &passed)
                .await?;
            if runs.is_empty() {
                break;
            }
            for run in runs {
                if self.stop.is_set() {
                    return Ok(());
                }
                passed.insert(run.number);
                let targets: Vec<CopyTarget> = self
                    .policy
                    .abandoned_copies(&run, &self.host, false)
                    .into_iter()
                    .map(CopyRecord::target)
                    .collect();
                for target in targets {
                    self.delete_checked(run.number, target, force, "abandoned", report)
                        .await?;
                }
            }
        }

        if !self.shared_writer {
            return Ok(());
        }

        let mut passed = BTreeSet::new();
        for _ in 0..self.max_iterations {
            self.tracker.reap_finished();
            let mut exclude = self.tracker.claimed();
            exclude.extend(passed.iter().copied());
            let runs = self
                .policy
                .eligible_abandoned(self.store.as_ref(), &self.host, true, &exclude)
                .await?;
            if runs.is_empty() {
                return Ok(());
            }
            for run in runs {
                if self.stop.is_set() {
                    return Ok(());
                }
                passed.insert(run.number);
                let copies: Vec<CopyRecord> = self
                    .policy
                    .abandoned_copies(&run, &self.host, true)
                    .into_iter()
                    .cloned()
                    .collect();
                for copy in copies {
                    self.policy.check_classification(&run, &copy, "abandoned")?;
                    self.dispatch_shared(run.clone(), copy).await;
                }
            }
        }
        self.iteration_limit(CleanMode::Abandoned);
        Ok(())
    }

    async fn clean_unregistered(&self, report: &mut SweepReport) -> Result<(), SweepError> {
        self.tracker.wait_all().await;

        let mut roots = vec![(self.local_root.clone(), self.host.clone())];
        if self.shared_writer {
            roots.push((self.shared_root.clone(), self.shared_designation.clone()));
        }

        for (root, designation) in roots {
            let found =
                scanner::scan_unregistered(self.fs.as_ref(), self.store.as_ref(), &root, &designation)
                    .await?;
            report.unregistered_found += found.len();
            for run_id in found {
                if self.stop.is_set() {
                    return Ok(());
                }
                self.purge(&root, &run_id, report).await;
            }
        }
        Ok(())
    }

    fn clean_raw_veto(&self) -> Result<(), SweepError> {
        error!(host = %self.host, "raw-veto cleanup has no retention policy yet");
        Err(SweepError::NotImplemented(CleanMode::RawVeto.to_string()))
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    /// Re-reads the run, checks the copy, deletes it in the foreground.
    ///
    /// Only fatal errors propagate; anything else is counted and the loop
    /// moves on.
    async fn delete_checked(
        &self,
        number: u32,
        target: CopyTarget,
        force: bool,
        path: &'static str,
        report: &mut SweepReport,
    ) -> Result<(), SweepError> {
        let Some(run) = self.store.get_run(number).await? else {
            report.already_gone += 1;
            return Ok(());
        };
        let Some(copy) = run.find_active(&target).cloned() else {
            report.already_gone += 1;
            return Ok(());
        };

        self.policy.check_classification(&run, &copy, path)?;
        if !self.policy.copy_is_safe_to_delete(&run, &copy, force) {
            info!(
                run = number,
                kind = %copy.kind,
                host = %copy.host,
                "preservation check failed, keeping copy"
            );
            report.unsafe_skipped += 1;
            return Ok(());
        }

        match self.executor.delete(&run, &copy).await {
            Ok(outcome) => report.record(outcome),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(run = number, kind = %copy.kind, error = %e, "deletion failed");
                report.record_failure(&e);
            }
        }
        Ok(())
    }

    async fn dispatch_shared(&self, run: RunRecord, copy: CopyRecord) {
        let name = format!("{DELETION_TASK_PREFIX}{}", run.run_id());
        let executor = self.executor.clone();
        let number = run.number;
        self.tracker
            .dispatch(number, name, async move { executor.delete(&run, &copy).await })
            .await;
    }

    async fn purge(&self, root: &Path, run_id: &str, report: &mut SweepReport) {
        if self.dry_run {
            info!(run = %run_id, root = %root.display(), "dry-run: would purge unregistered data");
            return;
        }
        if let Some(confirm) = &self.confirm {
            let prompt = format!("Purge unregistered run {run_id} under {}?", root.display());
            if !confirm::ask(confirm, prompt).await {
                report.declined += 1;
                return;
            }
        }
        match scanner::purge_unregistered(self.fs.as_ref(), root, run_id).await {
            Ok(removed) => report.purged_entries += removed,
            Err(e) => {
                error!(run = %run_id, root = %root.display(), error = %e, "purge failed");
                report.record_failure(&e);
            }
        }
    }

    fn iteration_limit(&self, mode: CleanMode) {
        warn!(
            %mode,
            limit = self.max_iterations,
            "iteration limit reached, remaining candidates wait for the next pass"
        );
    }
}
