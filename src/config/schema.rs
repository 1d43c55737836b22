use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Identity of this agent. Falls back to the machine hostname.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub store: StoreConfig,

    /// Host identity → local storage root.
    #[serde(default)]
    pub hosts: BTreeMap<String, PathBuf>,

    #[serde(default)]
    pub shared_tier: SharedTierConfig,

    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    #[serde(default)]
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("metadata.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedTierConfig {
    /// The only host allowed to delete shared-tier copies.
    #[serde(default = "default_writer_host")]
    pub writer_host: String,
    /// Host value carried by shared-tier copies in the metadata store.
    #[serde(default = "default_designation")]
    pub designation: String,
    #[serde(default = "default_shared_root")]
    pub root: PathBuf,
}

fn default_writer_host() -> String {
    "eb0".into()
}

fn default_designation() -> String {
    "daq".into()
}

fn default_shared_root() -> PathBuf {
    PathBuf::from("/live_data/xenonnt")
}

impl Default for SharedTierConfig {
    fn default() -> Self {
        Self {
            writer_host: default_writer_host(),
            designation: default_designation(),
            root: default_shared_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    /// Minimum age since run start before the shared-tier copy may go.
    #[serde(default = "default_shared_tier_after_hours")]
    pub shared_tier_after_hours: i64,
    /// Minimum time since processing finished.
    #[serde(default = "default_processing_wait_hours")]
    pub processing_wait_hours: i64,
    /// Minimum age since run start before high-level copies may go.
    #[serde(default = "default_high_level_after_hours")]
    pub high_level_after_hours: i64,
}

fn default_shared_tier_after_hours() -> i64 {
    24
}

fn default_processing_wait_hours() -> i64 {
    2
}

fn default_high_level_after_hours() -> i64 {
    24 * 7
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            shared_tier_after_hours: default_shared_tier_after_hours(),
            processing_wait_hours: default_processing_wait_hours(),
            high_level_after_hours: default_high_level_after_hours(),
        }
    }
}

impl ThresholdsConfig {
    pub fn shared_tier_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.shared_tier_after_hours)
    }

    pub fn processing_wait(&self) -> chrono::Duration {
        chrono::Duration::hours(self.processing_wait_hours)
    }

    pub fn high_level_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.high_level_after_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Background shared-tier deletions allowed at once when unattended.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Same bound under `--ask-confirm`.
    #[serde(default = "default_max_in_flight_confirm")]
    pub max_in_flight_confirm: usize,
    #[serde(default = "default_barrier_poll_ms")]
    pub barrier_poll_ms: u64,
}

fn default_max_in_flight() -> usize {
    5
}

fn default_max_in_flight_confirm() -> usize {
    1
}

fn default_barrier_poll_ms() -> u64 {
    500
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            max_in_flight_confirm: default_max_in_flight_confirm(),
            barrier_poll_ms: default_barrier_poll_ms(),
        }
    }
}

impl ConcurrencyConfig {
    pub fn bound(&self, ask_confirm: bool) -> usize {
        if ask_confirm {
            self.max_in_flight_confirm.max(1)
        } else {
            self.max_in_flight.max(1)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_nap_secs")]
    pub nap_secs: u64,
    /// Upper bound on select/execute cycles of a single mode per pass.
    #[serde(default = "default_max_iterations_per_mode")]
    pub max_iterations_per_mode: usize,
    /// Presence of this file aborts the agent at the next pass.
    #[serde(default)]
    pub emergency_sentinel: Option<PathBuf>,
}

fn default_nap_secs() -> u64 {
    600
}

fn default_max_iterations_per_mode() -> usize {
    10_000
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            nap_secs: default_nap_secs(),
            max_iterations_per_mode: default_max_iterations_per_mode(),
            emergency_sentinel: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let runsweep_dir = home.join(".runsweep");

        Self {
            config_path: runsweep_dir.join("config.toml"),
            host: None,
            store: StoreConfig {
                path: runsweep_dir.join("metadata.db"),
            },
            hosts: BTreeMap::new(),
            shared_tier: SharedTierConfig::default(),
            thresholds: ThresholdsConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let runsweep_dir = home.join(".runsweep");
        let config_path = runsweep_dir.join("config.toml");

        if !runsweep_dir.exists() {
            fs::create_dir_all(&runsweep_dir).context("Failed to create .runsweep directory")?;
        }

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.save()?;
            tracing::info!(path = %config.config_path.display(), "wrote default config");
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        config.config_path = path.to_path_buf();
        if config.store.path.is_relative()
            && let Some(parent) = path.parent()
        {
            config.store.path = parent.join(&config.store.path);
        }
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("RUNSWEEP_HOST") {
            if !host.is_empty() {
                self.host = Some(host);
            }
        }

        if let Ok(db) = std::env::var("RUNSWEEP_DB") {
            if !db.is_empty() {
                self.store.path = PathBuf::from(db);
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    /// Identity this agent acts as.
    pub fn identity(&self) -> String {
        self.host.clone().unwrap_or_else(|| {
            hostname::get().map_or_else(|_| "unknown".into(), |h| h.to_string_lossy().into_owned())
        })
    }

    pub fn local_root(&self, host: &str) -> Result<&Path, ConfigError> {
        self.hosts
            .get(host)
            .map(PathBuf::as_path)
            .ok_or_else(|| ConfigError::UnknownHost(host.to_string()))
    }

    pub fn is_shared_tier_writer(&self, host: &str) -> bool {
        self.shared_tier.writer_host == host
    }

    /// Startup checks for an agent acting as `host`.
    pub fn validate_for_host(&self, host: &str) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        if t.shared_tier_after_hours < 0 || t.processing_wait_hours < 0 || t.high_level_after_hours < 0
        {
            return Err(ConfigError::Validation(
                "thresholds must not be negative".into(),
            ));
        }
        if self.shared_tier.designation.is_empty() {
            return Err(ConfigError::Validation(
                "shared_tier.designation must not be empty".into(),
            ));
        }
        if self.hosts.contains_key(&self.shared_tier.designation) {
            return Err(ConfigError::Validation(format!(
                "shared-tier designation '{}' collides with a host name",
                self.shared_tier.designation
            )));
        }

        let root = self.local_root(host)?;
        crate::storage::probe_writable(root).map_err(|_| ConfigError::NotWritable(root.to_path_buf()))?;

        if self.is_shared_tier_writer(host) {
            crate::storage::probe_writable(&self.shared_tier.root)
                .map_err(|_| ConfigError::NotWritable(self.shared_tier.root.clone()))?;
        }
        Ok(())
    }
}
