use super::retention_harness::{Fixture, WRITER, run_aged};
use runsweep::store::ProcessingStatus;
use runsweep::ui::Confirm;
use std::path::Path;
use std::sync::Arc;

#[tokio::test]
async fn delete_live_then_local_products_on_the_writer() {
    let fx = Fixture::new();
    let raw = fx.raw("eb2", 4001);
    let live = fx.live(4001);
    let high = fx.high(WRITER, 4001);
    fx.insert(
        run_aged(4001, ProcessingStatus::Done, 3, 1)
            .with_copy(raw.clone())
            .with_copy(live.clone())
            .with_copy(high.clone()),
    )
    .await;

    let report = fx
        .sweeper(WRITER, true)
        .clean_run(4001, true, false)
        .await
        .expect("single-run cleanup");

    assert_eq!(report.deleted, 2);
    assert!(!Path::new(&live.location).exists());
    assert!(!Path::new(&high.location).exists());
    assert!(Path::new(&raw.location).exists());
    assert_eq!(fx.run(4001).active_copies, vec![raw]);
}

#[tokio::test]
async fn last_raw_copy_needs_force() {
    let fx = Fixture::new();
    let raw = fx.raw("eb2", 4002);
    fx.insert(run_aged(4002, ProcessingStatus::Done, 3, 1).with_copy(raw.clone()))
        .await;
    let sweeper = fx.sweeper("eb2", true);

    let report = sweeper
        .clean_run(4002, false, false)
        .await
        .expect("unforced cleanup");
    assert_eq!(report.unsafe_skipped, 1);
    assert!(Path::new(&raw.location).exists());

    let report = sweeper
        .clean_run(4002, false, true)
        .await
        .expect("forced cleanup");
    assert_eq!(report.deleted, 1);
    assert!(!Path::new(&raw.location).exists());
    assert!(fx.run(4002).active_copies.is_empty());
}

#[tokio::test]
async fn staging_variant_is_removed_with_the_copy() {
    let fx = Fixture::new();
    let high = fx.high("eb2", 4003);
    let staging = format!("{}_temp", high.location);
    super::retention_harness::populated(Path::new(&staging));
    fx.insert(
        run_aged(4003, ProcessingStatus::Done, 3, 1)
            .with_copy(fx.raw("eb3", 4003))
            .with_copy(high.clone()),
    )
    .await;

    fx.sweeper("eb2", true)
        .clean_run(4003, false, false)
        .await
        .expect("single-run cleanup");

    assert!(!Path::new(&high.location).exists());
    assert!(!Path::new(&staging).exists());
}

#[tokio::test]
async fn unknown_run_is_an_error() {
    let fx = Fixture::new();
    assert!(fx.sweeper("eb2", true).clean_run(9999, false, false).await.is_err());
}

#[tokio::test]
async fn stop_before_single_run_cleanup_leaves_every_copy() {
    let fx = Fixture::new();
    let live = fx.live(4004);
    let high = fx.high(WRITER, 4004);
    fx.insert(
        run_aged(4004, ProcessingStatus::Done, 3, 1)
            .with_copy(fx.raw("eb2", 4004))
            .with_copy(live.clone())
            .with_copy(high.clone()),
    )
    .await;

    let sweeper = fx.sweeper(WRITER, true);
    sweeper.stop_signal().trigger();
    let report = sweeper
        .clean_run(4004, true, false)
        .await
        .expect("single-run cleanup");

    assert_eq!(report.deleted, 0);
    assert!(Path::new(&live.location).exists());
    assert!(Path::new(&high.location).exists());
    assert_eq!(fx.run(4004).active_copies.len(), 3);
}

#[tokio::test]
async fn declined_copy_is_counted_and_kept() {
    let fx = Fixture::new();
    let high = fx.high("eb2", 4005);
    fx.insert(
        run_aged(4005, ProcessingStatus::Done, 3, 1)
            .with_copy(fx.raw("eb3", 4005))
            .with_copy(high.clone()),
    )
    .await;

    let refuse: Arc<dyn Confirm> = Arc::new(|_: &str| false);
    let report = fx
        .sweeper("eb2", true)
        .with_confirm(refuse)
        .clean_run(4005, false, false)
        .await
        .expect("single-run cleanup");

    assert_eq!(report.declined, 1);
    assert_eq!(report.deleted, 0);
    assert!(Path::new(&high.location).exists());
    assert_eq!(fx.run(4005).active_copies.len(), 2);
}
