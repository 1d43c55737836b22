use std::path::PathBuf;

/// External condition that must stop every agent before it deletes anything.
pub trait EmergencyTrigger: Send + Sync {
    fn should_abort(&self) -> bool;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmergency;

impl EmergencyTrigger for NoEmergency {
    fn should_abort(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        "none".into()
    }
}

/// Fires while a sentinel file exists.
#[derive(Debug, Clone)]
pub struct SentinelFile {
    path: PathBuf,
}

impl SentinelFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EmergencyTrigger for SentinelFile {
    fn should_abort(&self) -> bool {
        self.path.exists()
    }

    fn describe(&self) -> String {
        format!("sentinel {} present", self.path.display())
    }
}
