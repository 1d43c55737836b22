use std::path::PathBuf;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `runsweep`.
///
/// Callers match on these to decide whether a condition aborts the agent or
/// only the current copy; I/O edges keep using `anyhow::Result` for context
/// chains and surface here through [`SweepError::Other`].
#[derive(Debug, Error)]
pub enum SweepError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Policy ──────────────────────────────────────────────────────────
    #[error(
        "classification contradiction for run {number}: copy '{kind}' is tagged {category} \
         but reached the {path} deletion path"
    )]
    ClassificationContradiction {
        number: u32,
        kind: String,
        category: String,
        path: &'static str,
    },

    // ── Executor ────────────────────────────────────────────────────────
    #[error("deletion of {} (run {number}) did not take effect: path still exists", location.display())]
    DeletionVerificationFailed { number: u32, location: PathBuf },

    #[error("run {number}: '{kind}' is registered at {} but nothing exists there", location.display())]
    StaleRecord {
        number: u32,
        kind: String,
        location: PathBuf,
    },

    // ── Reconciliation ──────────────────────────────────────────────────
    #[error("nothing under {} matches run id {run_id}", root.display())]
    NothingToDelete { root: PathBuf, run_id: String },

    // ── Orchestration ───────────────────────────────────────────────────
    #[error("cleanup mode '{0}' is not implemented")]
    NotImplemented(String),

    #[error("emergency trigger fired: {0}")]
    EmergencyAbort(String),

    #[error("operator declined: {0}")]
    ConfirmationDeclined(String),

    // ── Metadata store ──────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SweepError {
    /// Errors that must stop the whole agent rather than just skip one copy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ClassificationContradiction { .. }
                | Self::NotImplemented(_)
                | Self::EmergencyAbort(_)
                | Self::ConfirmationDeclined(_)
        )
    }
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("host '{0}' has no storage root configured")]
    UnknownHost(String),

    #[error("no write access to storage root {}", .0.display())]
    NotWritable(PathBuf),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Store errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend: {0}")]
    Backend(String),

    #[error("corrupt record for run {number}: {reason}")]
    Corrupt { number: u32, reason: String },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, SweepError>;
