//! Deletion executor: physical removal, verification, record transition.

use crate::error::SweepError;
use crate::storage::StorageFs;
use crate::store::{CopyRecord, MetadataStore, RunRecord};
use crate::ui::confirm::{self, Confirm};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeletionOutcome {
    /// Removed from disk and moved to the deleted copies.
    Deleted,
    /// Dry-run: the location exists and would have been removed.
    Simulated,
    /// The copy was no longer active; nothing to do.
    AlreadyGone,
    /// The operator said no.
    Declined,
}

#[derive(Clone)]
pub struct DeletionExecutor {
    store: Arc<dyn MetadataStore>,
    fs: Arc<dyn StorageFs>,
    identity: String,
    dry_run: bool,
    confirm: Option<Arc<dyn Confirm>>,
}

impl DeletionExecutor {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        fs: Arc<dyn StorageFs>,
        identity: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            store,
            fs,
            identity: identity.into(),
            dry_run,
            confirm: None,
        }
    }

    /// Gate every physical removal behind `confirm`.
    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = Some(confirm);
        self
    }

    /// Deletes `copy` of `run` and records the transition.
    ///
    /// The run is re-read first so a copy retired since `run` was fetched is
    /// reported as [`DeletionOutcome::AlreadyGone`] instead of an error.
    pub async fn delete(
        &self,
        run: &RunRecord,
        copy: &CopyRecord,
    ) -> Result<DeletionOutcome, SweepError> {
        let target = copy.target();
        let still_active = self
            .store
            .get_run(run.number)
            .await?
            .is_some_and(|current| current.find_active(&target).is_some());
        if !still_active {
            debug!(run = run.number, kind = %copy.kind, host = %copy.host, "copy already retired");
            return Ok(DeletionOutcome::AlreadyGone);
        }

        if self.remove_staging(run, copy).await? == DeletionOutcome::Declined {
            return Ok(DeletionOutcome::Declined);
        }

        let path = copy.path();
        let present = self.fs.exists(&path).await?;

        if self.dry_run {
            if !present {
                return Err(SweepError::StaleRecord {
                    number: run.number,
                    kind: copy.kind.clone(),
                    location: path,
                });
            }
            info!(run = run.number, kind = %copy.kind, location = %path.display(), "dry-run: would delete");
            return Ok(DeletionOutcome::Simulated);
        }

        if present {
            let prompt = format!(
                "Delete {} of run {} at {}?",
                copy.kind,
                run.run_id(),
                path.display()
            );
            if !self.confirmed(prompt).await {
                info!(run = run.number, kind = %copy.kind, "deletion declined by operator");
                return Ok(DeletionOutcome::Declined);
            }
            self.fs.remove_all(&path).await?;
        } else {
            warn!(run = run.number, location = %path.display(), "location already absent on disk");
        }

        self.verify_absent(run.number, &path).await?;

        let retired = self
            .store
            .retire_copy(run.number, &target, &self.identity, Utc::now())
            .await?;
        if retired {
            info!(run = run.number, kind = %copy.kind, host = %copy.host, "deleted");
            Ok(DeletionOutcome::Deleted)
        } else {
            debug!(run = run.number, kind = %copy.kind, "copy retired concurrently");
            Ok(DeletionOutcome::AlreadyGone)
        }
    }

    /// Removes the `_temp` staging variant of `copy` when it exists.
    async fn remove_staging(
        &self,
        run: &RunRecord,
        copy: &CopyRecord,
    ) -> Result<DeletionOutcome, SweepError> {
        let staging = copy.staging_path();
        if !self.fs.exists(&staging).await? {
            return Ok(DeletionOutcome::AlreadyGone);
        }
        if self.dry_run {
            info!(run = run.number, location = %staging.display(), "dry-run: would delete staging copy");
            return Ok(DeletionOutcome::Simulated);
        }
        let prompt = format!("Delete staging copy {}?", staging.display());
        if !self.confirmed(prompt).await {
            return Ok(DeletionOutcome::Declined);
        }
        self.fs.remove_all(&staging).await?;
        self.verify_absent(run.number, &staging).await?;
        info!(run = run.number, location = %staging.display(), "deleted staging copy");
        Ok(DeletionOutcome::Deleted)
    }

    async fn verify_absent(&self, number: u32, path: &Path) -> Result<(), SweepError> {
        if self.fs.exists(path).await? {
            return Err(SweepError::DeletionVerificationFailed {
                number,
                location: path.to_path_buf(),
            });
        }
        Ok(())
    }

    async fn confirmed(&self, prompt: String) -> bool {
        match &self.confirm {
            Some(confirm) => confirm::ask(confirm, prompt).await,
            None => true,
        }
    }
}
