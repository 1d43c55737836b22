use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::warn;

/// Cooperative stop request checked by the foreground loop between copies.
///
/// The loop finishes the copy it is working on and still runs the
/// completion barrier, so background deletions are never cut short.
#[derive(Debug, Default)]
pub struct StopSignal {
    requested: AtomicBool,
    wake: Notify,
}

impl StopSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_set(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn wait(&self) {
        while !self.is_set() {
            self.wake.notified().await;
        }
    }
}

/// Turns Ctrl-C into a stop request.
pub fn spawn_ctrl_c(stop: Arc<StopSignal>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight deletions before exit");
            stop.trigger();
        }
    })
}
