use super::retention_harness::{Fixture, WRITER, populated, run_aged};
use runsweep::scanner::purge_unregistered;
use runsweep::storage::LocalFs;
use runsweep::store::{DELETED_LOCATION, ProcessingStatus};
use runsweep::{CleanMode, SweepError};
use std::path::Path;

#[tokio::test]
async fn transferred_run_loses_only_its_shared_tier_copy() {
    let fx = Fixture::new();
    let raw = fx.raw("eb2", 1001);
    let live = fx.live(1001);
    fx.insert(
        run_aged(1001, ProcessingStatus::Transferred, 30, 10)
            .with_copy(raw.clone())
            .with_copy(live.clone()),
    )
    .await;

    let report = fx
        .sweeper(WRITER, true)
        .run_mode(CleanMode::SharedTier, false)
        .await
        .expect("shared-tier pass");

    assert_eq!(report.deleted, 1);
    assert!(!Path::new(&live.location).exists());
    assert!(Path::new(&raw.location).exists());

    let run = fx.run(1001);
    assert_eq!(run.active_copies, vec![raw]);
    assert_eq!(run.deleted_copies.len(), 1);
    let gone = &run.deleted_copies[0];
    assert_eq!(gone.kind, "live_data");
    assert_eq!(gone.location, DELETED_LOCATION);
    assert_eq!(gone.removed_by.as_deref(), Some(WRITER));
    assert!(gone.removed_at.is_some());
}

#[tokio::test]
async fn abandoned_run_loses_shared_tier_copy_without_raw_data() {
    let fx = Fixture::new();
    let live = fx.live(1002);
    fx.insert(run_aged(1002, ProcessingStatus::Abandoned, 30, 10).with_copy(live.clone()))
        .await;

    let sweeper = fx.sweeper(WRITER, true);

    // Abandoned runs are not completed, so the regular shared-tier mode skips them.
    let report = sweeper
        .run_mode(CleanMode::SharedTier, false)
        .await
        .expect("shared-tier pass");
    assert_eq!(report.deleted, 0);
    assert!(Path::new(&live.location).exists());

    let report = sweeper
        .run_mode(CleanMode::Abandoned, false)
        .await
        .expect("abandoned pass");
    assert_eq!(report.deleted, 1);
    assert!(!Path::new(&live.location).exists());
    assert!(fx.run(1002).active_copies.is_empty());
}

#[tokio::test]
async fn high_level_cleanup_skips_runs_whose_raw_data_is_gone() {
    let fx = Fixture::new();

    let mut raw_gone = fx.raw("eb2", 1003);
    std::fs::remove_dir_all(&raw_gone.location).expect("remove raw dir");
    raw_gone.location = DELETED_LOCATION.into();
    let orphan_high = fx.high("eb2", 1003);
    fx.insert(
        run_aged(1003, ProcessingStatus::Transferred, 200, 190)
            .with_copy(raw_gone)
            .with_copy(orphan_high.clone()),
    )
    .await;

    let backed_high = fx.high("eb2", 1004);
    fx.insert(
        run_aged(1004, ProcessingStatus::Transferred, 200, 190)
            .with_copy(fx.raw("eb2", 1004))
            .with_copy(backed_high.clone()),
    )
    .await;

    let report = fx
        .sweeper("eb2", true)
        .run_mode(CleanMode::HighLevel, false)
        .await
        .expect("high-level pass");

    assert_eq!(report.unsafe_skipped, 1);
    assert_eq!(report.deleted, 1);
    assert!(Path::new(&orphan_high.location).exists());
    assert_eq!(fx.run(1003).active_copies.len(), 2);
    assert!(!Path::new(&backed_high.location).exists());
    assert_eq!(fx.run(1004).active_copies.len(), 1);
}

#[tokio::test]
async fn unregistered_data_is_purged_then_reported_missing() {
    let fx = Fixture::new();
    let root = fx.root("eb2");
    let stray = populated(&root.join("000777-raw_records-rfzvpzj4mf"));

    let report = fx
        .sweeper("eb2", true)
        .run_mode(CleanMode::Unregistered, false)
        .await
        .expect("unregistered pass");
    assert_eq!(report.unregistered_found, 1);
    assert_eq!(report.purged_entries, 1);
    assert!(!report.has_failures());
    assert!(!Path::new(&stray).exists());

    let err = purge_unregistered(&LocalFs, &root, "000777")
        .await
        .expect_err("nothing left to purge");
    assert!(matches!(err, SweepError::NothingToDelete { ref run_id, .. } if run_id == "000777"));
}

#[tokio::test]
async fn unregistered_dry_run_only_reports() {
    let fx = Fixture::new();
    let stray = populated(&fx.root("eb2").join("000778-peaklets-abc"));

    let report = fx
        .sweeper("eb2", false)
        .run_mode(CleanMode::Unregistered, false)
        .await
        .expect("unregistered pass");
    assert_eq!(report.unregistered_found, 1);
    assert_eq!(report.purged_entries, 0);
    assert!(Path::new(&stray).exists());
}

#[tokio::test]
async fn registered_data_survives_reconciliation() {
    let fx = Fixture::new();
    let raw = fx.raw("eb2", 1010);
    fx.insert(run_aged(1010, ProcessingStatus::Done, 1, 1).with_copy(raw.clone()))
        .await;

    let report = fx
        .sweeper("eb2", true)
        .run_mode(CleanMode::Unregistered, false)
        .await
        .expect("unregistered pass");
    assert_eq!(report.unregistered_found, 0);
    assert!(Path::new(&raw.location).exists());
}
