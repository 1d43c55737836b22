use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Suffix of the staging variant written next to a copy while it is produced.
pub const STAGING_SUFFIX: &str = "_temp";

/// Location written into a retired copy in `deleted_copies`.
pub const DELETED_LOCATION: &str = "deleted";

/// Artifact tags that always denote raw low-level input, whatever category
/// the upstream pipeline assigned.
pub const RAW_KINDS: [&str; 6] = [
    "live_data",
    "raw_records",
    "raw_records_he",
    "raw_records_mv",
    "raw_records_nv",
    "raw_records_aqmon",
];

pub fn is_raw_kind(kind: &str) -> bool {
    RAW_KINDS.iter().any(|raw| raw.eq_ignore_ascii_case(kind))
}

/// Formats a run number the way run directories are named on disk.
pub fn run_id(number: u32) -> String {
    format!("{number:06}")
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingStatus {
    Bootstrapping,
    Processing,
    Done,
    Transferred,
    Abandoned,
    #[default]
    Unknown,
}

/// Category tag assigned to a copy by the pipeline that created it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataCategory {
    RawLowLevel,
    LowLevel,
    HighLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRecord {
    pub kind: String,
    pub category: DataCategory,
    pub host: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_by: Option<String>,
}

impl CopyRecord {
    pub fn new(
        kind: impl Into<String>,
        category: DataCategory,
        host: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            category,
            host: host.into(),
            location: location.into(),
            removed_at: None,
            removed_by: None,
        }
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.location)
    }

    pub fn staging_path(&self) -> PathBuf {
        PathBuf::from(format!("{}{STAGING_SUFFIX}", self.location))
    }

    /// A copy whose tag says raw input while its category says otherwise.
    pub fn is_misclassified(&self) -> bool {
        is_raw_kind(&self.kind) && self.category != DataCategory::RawLowLevel
    }

    pub fn has_real_location(&self) -> bool {
        !self.location.is_empty() && self.location != DELETED_LOCATION
    }

    pub fn target(&self) -> CopyTarget {
        CopyTarget {
            kind: self.kind.clone(),
            host: self.host.clone(),
            location: self.location.clone(),
        }
    }

    /// The entry appended to `deleted_copies` once this copy is gone.
    pub fn redacted(&self, removed_by: &str, removed_at: DateTime<Utc>) -> Self {
        Self {
            kind: self.kind.clone(),
            category: self.category,
            host: self.host.clone(),
            location: DELETED_LOCATION.to_string(),
            removed_at: Some(removed_at),
            removed_by: Some(removed_by.to_string()),
        }
    }
}

/// Scope of a single copy transition: run number is carried separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTarget {
    pub kind: String,
    pub host: String,
    pub location: String,
}

impl CopyTarget {
    pub fn matches(&self, copy: &CopyRecord) -> bool {
        copy.kind == self.kind && copy.host == self.host && copy.location == self.location
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub number: u32,
    #[serde(default)]
    pub processing_status: ProcessingStatus,
    #[serde(default)]
    pub processing_host: Option<String>,
    #[serde(default)]
    pub processing_time: Option<DateTime<Utc>>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub active_copies: Vec<CopyRecord>,
    #[serde(default)]
    pub deleted_copies: Vec<CopyRecord>,
}

impl RunRecord {
    pub fn new(number: u32, status: ProcessingStatus, start_time: DateTime<Utc>) -> Self {
        Self {
            number,
            processing_status: status,
            processing_host: None,
            processing_time: None,
            start_time,
            active_copies: Vec::new(),
            deleted_copies: Vec::new(),
        }
    }

    pub fn with_processing(mut self, host: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.processing_host = Some(host.into());
        self.processing_time = Some(at);
        self
    }

    pub fn with_copy(mut self, copy: CopyRecord) -> Self {
        self.active_copies.push(copy);
        self
    }

    pub fn run_id(&self) -> String {
        run_id(self.number)
    }

    pub fn is_abandoned(&self) -> bool {
        self.processing_status == ProcessingStatus::Abandoned
    }

    pub fn active_on<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a CopyRecord> + 'a {
        self.active_copies.iter().filter(move |copy| copy.host == host)
    }

    pub fn has_active(&self, filter: &CopyFilter) -> bool {
        self.active_copies.iter().any(|copy| filter.matches(copy))
    }

    pub fn find_active(&self, target: &CopyTarget) -> Option<&CopyRecord> {
        self.active_copies.iter().find(|copy| target.matches(copy))
    }

    /// Moves the copy matching `target` from active to deleted.
    ///
    /// Returns `false` when no such active copy exists, leaving the record untouched.
    pub fn retire(&mut self, target: &CopyTarget, removed_by: &str, at: DateTime<Utc>) -> bool {
        let Some(index) = self.active_copies.iter().position(|c| target.matches(c)) else {
            return false;
        };
        let copy = self.active_copies.remove(index);
        self.deleted_copies.push(copy.redacted(removed_by, at));
        true
    }
}

/// Predicate over the nested active copies of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyFilter {
    pub host: Option<String>,
    pub category: Option<DataCategory>,
    pub location_prefix: Option<String>,
}

impl CopyFilter {
    pub fn on_host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: DataCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn under(mut self, prefix: impl Into<String>) -> Self {
        self.location_prefix = Some(prefix.into());
        self
    }

    pub fn matches(&self, copy: &CopyRecord) -> bool {
        self.host.as_ref().is_none_or(|h| &copy.host == h)
            && self.category.is_none_or(|c| copy.category == c)
            && self
                .location_prefix
                .as_ref()
                .is_none_or(|p| copy.location.starts_with(p.as_str()))
    }
}

/// Structured find predicate over run records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunQuery {
    pub number: Option<u32>,
    /// Empty means any status.
    pub statuses: Vec<ProcessingStatus>,
    pub started_before: Option<DateTime<Utc>>,
    pub processed_before: Option<DateTime<Utc>>,
    /// Processing host must be known and differ from this one.
    pub processing_host_not: Option<String>,
    pub active_copy: Option<CopyFilter>,
    pub exclude: BTreeSet<u32>,
}

impl RunQuery {
    pub fn for_run(number: u32) -> Self {
        Self {
            number: Some(number),
            ..Self::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[ProcessingStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn started_before(mut self, at: DateTime<Utc>) -> Self {
        self.started_before = Some(at);
        self
    }

    pub fn processed_before(mut self, at: DateTime<Utc>) -> Self {
        self.processed_before = Some(at);
        self
    }

    pub fn processed_elsewhere(mut self, host: impl Into<String>) -> Self {
        self.processing_host_not = Some(host.into());
        self
    }

    pub fn with_active_copy(mut self, filter: CopyFilter) -> Self {
        self.active_copy = Some(filter);
        self
    }

    pub fn excluding(mut self, numbers: impl IntoIterator<Item = u32>) -> Self {
        self.exclude.extend(numbers);
        self
    }

    pub fn matches(&self, run: &RunRecord) -> bool {
        if self.number.is_some_and(|n| n != run.number) || self.exclude.contains(&run.number) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&run.processing_status) {
            return false;
        }
        if self.started_before.is_some_and(|t| run.start_time >= t) {
            return false;
        }
        if let Some(cutoff) = self.processed_before
            && run.processing_time.is_none_or(|t| t >= cutoff)
        {
            return false;
        }
        if let Some(host) = &self.processing_host_not
            && run.processing_host.as_deref().is_none_or(|h| h == host)
        {
            return false;
        }
        self.active_copy.as_ref().is_none_or(|f| run.has_active(f))
    }
}
