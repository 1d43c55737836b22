//! Metadata store client.
//!
//! Every component receives an `Arc<dyn MetadataStore>` explicitly; mutations
//! are scoped to one run/copy tuple and report whether they applied.

mod memory;
mod sqlite;
mod types;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{
    CopyFilter, CopyRecord, CopyTarget, DELETED_LOCATION, DataCategory, ProcessingStatus,
    RAW_KINDS, RunQuery, RunRecord, STAGING_SUFFIX, is_raw_kind, run_id,
};

#[async_trait]
pub trait MetadataStore: Send + Sync {
    fn name(&self) -> &str;

    /// First run (lowest number) matching `query`.
    async fn find_run(&self, query: &RunQuery) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.find_runs(query).await?.into_iter().next())
    }

    /// All runs matching `query`, ordered by run number.
    async fn find_runs(&self, query: &RunQuery) -> Result<Vec<RunRecord>, StoreError>;

    async fn get_run(&self, number: u32) -> Result<Option<RunRecord>, StoreError> {
        self.find_run(&RunQuery::for_run(number)).await
    }

    /// Atomically removes the active copy matching `target` from run `number`
    /// and appends its redacted form to the deleted copies.
    ///
    /// Returns `Ok(false)` when the run or the copy is already gone.
    async fn retire_copy(
        &self,
        number: u32,
        target: &CopyTarget,
        removed_by: &str,
        removed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Inserts or replaces a run record. Used at the ingestion boundary.
    async fn upsert_run(&self, run: &RunRecord) -> Result<(), StoreError>;
}
