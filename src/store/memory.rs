use super::{CopyTarget, MetadataStore, RunQuery, RunRecord};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-process store. Backs dry simulations and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    runs: RwLock<BTreeMap<u32, RunRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runs(runs: impl IntoIterator<Item = RunRecord>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.runs.write();
            for run in runs {
                guard.insert(run.number, run);
            }
        }
        store
    }

    pub fn snapshot(&self, number: u32) -> Option<RunRecord> {
        self.runs.read().get(&number).cloned()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn find_runs(&self, query: &RunQuery) -> Result<Vec<RunRecord>, StoreError> {
        Ok(self
            .runs
            .read()
            .values()
            .filter(|run| query.matches(run))
            .cloned()
            .collect())
    }

    async fn retire_copy(
        &self,
        number: u32,
        target: &CopyTarget,
        removed_by: &str,
        removed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut runs = self.runs.write();
        Ok(runs
            .get_mut(&number)
            .is_some_and(|run| run.retire(target, removed_by, removed_at)))
    }

    async fn upsert_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        self.runs.write().insert(run.number, run.clone());
        Ok(())
    }
}
