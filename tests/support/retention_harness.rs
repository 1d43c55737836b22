#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use runsweep::config::{ConcurrencyConfig, Config, SharedTierConfig};
use runsweep::storage::{LocalFs, StorageFs};
use runsweep::store::{
    CopyRecord, DataCategory, MemoryStore, MetadataStore, ProcessingStatus, RunRecord, run_id,
};
use runsweep::{SweepOptions, Sweeper};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tempfile::TempDir;
use tokio::sync::Notify;

pub const WRITER: &str = "eb0";
pub const HOSTS: [&str; 3] = ["eb0", "eb2", "eb3"];

pub struct Fixture {
    pub tmp: TempDir,
    pub config: Config,
    pub store: Arc<MemoryStore>,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let mut hosts = BTreeMap::new();
        for host in HOSTS {
            let root = tmp.path().join(host);
            std::fs::create_dir_all(&root).expect("create host root");
            hosts.insert(host.to_string(), root);
        }
        let live = tmp.path().join("live");
        std::fs::create_dir_all(&live).expect("create live root");

        let config = Config {
            config_path: tmp.path().join("config.toml"),
            hosts,
            shared_tier: SharedTierConfig {
                writer_host: WRITER.into(),
                designation: "daq".into(),
                root: live,
            },
            concurrency: ConcurrencyConfig {
                barrier_poll_ms: 10,
                ..ConcurrencyConfig::default()
            },
            ..Config::default()
        };
        Self {
            tmp,
            config,
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn root(&self, host: &str) -> PathBuf {
        self.tmp.path().join(host)
    }

    pub fn live_root(&self) -> PathBuf {
        self.config.shared_tier.root.clone()
    }

    pub async fn insert(&self, run: RunRecord) {
        self.store.upsert_run(&run).await.expect("upsert run");
    }

    pub fn run(&self, number: u32) -> RunRecord {
        self.store.snapshot(number).expect("run present")
    }

    pub fn raw(&self, host: &str, number: u32) -> CopyRecord {
        let path = populated(&self.root(host).join(format!("{}-raw_records", run_id(number))));
        CopyRecord::new("raw_records", DataCategory::RawLowLevel, host, path)
    }

    pub fn live(&self, number: u32) -> CopyRecord {
        let path = populated(&self.live_root().join(run_id(number)));
        CopyRecord::new("live_data", DataCategory::RawLowLevel, "daq", path)
    }

    pub fn high(&self, host: &str, number: u32) -> CopyRecord {
        let path = populated(&self.root(host).join(format!("{}-event_info", run_id(number))));
        CopyRecord::new("event_info", DataCategory::HighLevel, host, path)
    }

    pub fn sweeper(&self, host: &str, execute: bool) -> Sweeper {
        self.sweeper_with_fs(host, execute, Arc::new(LocalFs))
    }

    pub fn sweeper_with_fs(&self, host: &str, execute: bool, fs: Arc<dyn StorageFs>) -> Sweeper {
        let store: Arc<dyn MetadataStore> = Arc::clone(&self.store) as Arc<dyn MetadataStore>;
        Sweeper::new(
            &self.config,
            host,
            store,
            fs,
            SweepOptions {
                execute,
                ask_confirm: false,
            },
        )
        .expect("build sweeper")
    }
}

/// Creates a directory holding one chunk file and returns its path.
pub fn populated(dir: &Path) -> String {
    std::fs::create_dir_all(dir).expect("create copy dir");
    std::fs::write(dir.join("chunk-000000"), b"payload").expect("write chunk");
    dir.to_string_lossy().into_owned()
}

/// A run started `started_h` hours ago and processed on eb2 `processed_h` hours ago.
pub fn run_aged(number: u32, status: ProcessingStatus, started_h: i64, processed_h: i64) -> RunRecord {
    let now = Utc::now();
    RunRecord::new(number, status, now - Duration::hours(started_h))
        .with_processing("eb2", now - Duration::hours(processed_h))
}

/// Local filesystem that records every removal request.
#[derive(Default)]
pub struct RecordingFs {
    inner: LocalFs,
    removed: Mutex<Vec<PathBuf>>,
}

impl RecordingFs {
    pub fn removed(&self) -> Vec<PathBuf> {
        self.removed.lock().clone()
    }
}

#[async_trait]
impl StorageFs for RecordingFs {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        self.inner.exists(path).await
    }

    async fn remove_all(&self, path: &Path) -> io::Result<()> {
        self.removed.lock().push(path.to_path_buf());
        self.inner.remove_all(path).await
    }

    async fn list_dir(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        self.inner.list_dir(root).await
    }
}

/// Local filesystem whose removals take `delay`, announcing each start.
pub struct SlowFs {
    inner: LocalFs,
    delay: StdDuration,
    removal_started: Notify,
}

impl SlowFs {
    pub fn new(delay: StdDuration) -> Self {
        Self {
            inner: LocalFs,
            delay,
            removal_started: Notify::new(),
        }
    }

    /// Resolves once a removal has begun. A removal that began earlier counts.
    pub async fn removal_started(&self) {
        self.removal_started.notified().await;
    }
}

#[async_trait]
impl StorageFs for SlowFs {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        self.inner.exists(path).await
    }

    async fn remove_all(&self, path: &Path) -> io::Result<()> {
        self.removal_started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.remove_all(path).await
    }

    async fn list_dir(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        self.inner.list_dir(root).await
    }
}
