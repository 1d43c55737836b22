use serde::{Deserialize, Serialize};

/// Named cleanup modes of the dispatcher.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CleanMode {
    /// Shared-tier copies of completed runs (designated host only)
    SharedTier,
    /// High-level copies on this host
    HighLevel,
    /// Copies on this host of runs processed elsewhere
    NonLatest,
    /// On-disk data with no metadata record
    Unregistered,
    /// Every copy of abandoned runs
    Abandoned,
    /// Raw neutron-veto data (not implemented)
    RawVeto,
    /// All implemented modes in sequence
    All,
}
