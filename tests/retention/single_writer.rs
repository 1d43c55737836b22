use super::retention_harness::{Fixture, RecordingFs, run_aged};
use runsweep::CleanMode;
use runsweep::store::ProcessingStatus;
use std::path::Path;
use std::sync::Arc;

#[tokio::test]
async fn hosts_other_than_the_writer_never_touch_the_shared_tier() {
    let fx = Fixture::new();
    let ready = fx.live(3001);
    let abandoned = fx.live(3002);
    fx.insert(
        run_aged(3001, ProcessingStatus::Transferred, 30, 10)
            .with_copy(fx.raw("eb2", 3001))
            .with_copy(ready.clone()),
    )
    .await;
    fx.insert(run_aged(3002, ProcessingStatus::Abandoned, 30, 10).with_copy(abandoned.clone()))
        .await;

    for host in ["eb2", "eb3"] {
        let fs = Arc::new(RecordingFs::default());
        let sweeper = fx.sweeper_with_fs(host, true, fs.clone());
        assert!(!sweeper.is_shared_tier_writer());

        for mode in [CleanMode::SharedTier, CleanMode::Abandoned, CleanMode::All] {
            sweeper.run_mode(mode, true).await.expect("pass");
        }

        let live_root = fx.live_root();
        assert!(
            fs.removed().iter().all(|p| !p.starts_with(&live_root)),
            "{host} removed shared-tier data: {:?}",
            fs.removed()
        );
    }

    assert!(Path::new(&ready.location).exists());
    assert!(Path::new(&abandoned.location).exists());
    assert_eq!(fx.run(3001).active_copies.len(), 2);
    assert_eq!(fx.run(3002).active_copies.len(), 1);
}

#[tokio::test]
async fn single_run_delete_live_is_ignored_off_the_writer() {
    let fx = Fixture::new();
    let live = fx.live(3003);
    fx.insert(
        run_aged(3003, ProcessingStatus::Transferred, 30, 10)
            .with_copy(fx.raw("eb2", 3003))
            .with_copy(live.clone()),
    )
    .await;

    let fs = Arc::new(RecordingFs::default());
    fx.sweeper_with_fs("eb3", true, fs.clone())
        .clean_run(3003, true, true)
        .await
        .expect("single-run cleanup");

    assert!(fs.removed().is_empty());
    assert!(Path::new(&live.location).exists());
}
