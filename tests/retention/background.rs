use super::retention_harness::{Fixture, SlowFs, WRITER, run_aged};
use runsweep::CleanMode;
use runsweep::store::ProcessingStatus;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn every_ready_shared_tier_copy_is_deleted_before_the_pass_returns() {
    let mut fx = Fixture::new();
    fx.config.concurrency.max_in_flight = 2;

    let mut live_paths = Vec::new();
    for number in 2000..2012 {
        let live = fx.live(number);
        live_paths.push(live.location.clone());
        fx.insert(
            run_aged(number, ProcessingStatus::Done, 30, 10)
                .with_copy(fx.raw("eb2", number))
                .with_copy(live),
        )
        .await;
    }

    let report = fx
        .sweeper(WRITER, true)
        .run_mode(CleanMode::SharedTier, false)
        .await
        .expect("shared-tier pass");

    assert_eq!(report.deleted, 12);
    assert!(!report.has_failures());
    for path in live_paths {
        assert!(!Path::new(&path).exists(), "{path} should be gone");
    }
    for number in 2000..2012 {
        assert_eq!(fx.run(number).active_copies.len(), 1);
    }
}

#[tokio::test]
async fn processed_copies_wait_for_shared_tier_deletions() {
    let fx = Fixture::new();
    let live = fx.live(2100);
    let high = fx.high(WRITER, 2100);
    fx.insert(
        run_aged(2100, ProcessingStatus::Transferred, 200, 190)
            .with_copy(fx.raw("eb2", 2100))
            .with_copy(live.clone())
            .with_copy(high.clone()),
    )
    .await;

    // `all` dispatches the shared-tier deletion, then high-level cleanup
    // only runs after the barrier sees it finished.
    let report = fx
        .sweeper(WRITER, true)
        .run_mode(CleanMode::All, false)
        .await
        .expect("full pass");

    assert_eq!(report.deleted, 2);
    assert!(!Path::new(&live.location).exists());
    assert!(!Path::new(&high.location).exists());
    let run = fx.run(2100);
    assert_eq!(run.active_copies.len(), 1);
    assert_eq!(run.deleted_copies.len(), 2);
}

#[tokio::test]
async fn stop_during_in_flight_deletions_retires_every_removed_copy() {
    let mut fx = Fixture::new();
    fx.config.concurrency.max_in_flight = 2;

    let numbers: Vec<u32> = (2200..2208).collect();
    for &number in &numbers {
        fx.insert(
            run_aged(number, ProcessingStatus::Done, 30, 10)
                .with_copy(fx.raw("eb2", number))
                .with_copy(fx.live(number)),
        )
        .await;
    }

    let fs = Arc::new(SlowFs::new(Duration::from_millis(200)));
    let sweeper = fx.sweeper_with_fs(WRITER, true, fs.clone());
    let stop = sweeper.stop_signal();
    let interrupt = tokio::spawn({
        let fs = Arc::clone(&fs);
        async move {
            fs.removal_started().await;
            stop.trigger();
        }
    });

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        sweeper.run_mode(CleanMode::SharedTier, false),
    )
    .await
    .expect("pass returns after the stop")
    .expect("shared-tier pass");
    interrupt.await.expect("interrupt task");

    assert!(!report.has_failures(), "{report}");
    let mut retired = 0;
    for &number in &numbers {
        let run = fx.run(number);
        let live_on_disk = fx.live_root().join(format!("{number:06}")).exists();
        if live_on_disk {
            assert_eq!(run.active_copies.len(), 2, "run {number} lost a copy record");
            assert!(run.deleted_copies.is_empty());
        } else {
            assert_eq!(run.active_copies.len(), 1, "run {number} removed but not retired");
            assert_eq!(run.deleted_copies.len(), 1);
            retired += 1;
        }
    }
    assert!(retired >= 1, "the first dispatched deletion must finish");
    assert!(retired < numbers.len(), "the stop must keep later runs from being dispatched");
    assert_eq!(report.deleted, retired);
}
