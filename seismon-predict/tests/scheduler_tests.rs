//! Full polling cycles over a notice directory

mod helpers;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use helpers::{notice_json, write_catalogue, write_notice, TestEnv};
use seismon_predict::db::{earthquakes, predictions};
use seismon_predict::ingest::MARKER_FILE;
use seismon_predict::scheduler::{CycleOptions, RunMode, Scheduler};

fn recent_notice(event: &str, magnitude: f64) -> String {
    notice_json(event, Utc::now() - Duration::hours(1), -32.6, -178.0, 8.0, magnitude)
}

#[tokio::test]
async fn test_cycle_ingests_and_predicts_every_station() {
    let env = TestEnv::new().await;
    write_catalogue(env.catalogue_dir(), "LLO", &[(-32.6, -178.0, 5.9, 2.0)]);
    let folder = write_notice(env.pdl_dir(), "us7000abcd", "1442090000000", &recent_notice("us7000abcd", 5.9));

    let scheduler = Scheduler::new(env.context());
    let report = scheduler
        .run_cycle(&CycleOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.ingest.ingested, 1);
    assert_eq!(report.stations, 5);
    assert_eq!(report.computed, 5);
    assert_eq!(report.failed, 0);
    assert_eq!(report.exported, 1);
    assert_eq!(std::fs::read_to_string(folder.join(MARKER_FILE)).unwrap(), "Done");
    assert!(env.export_dir().join("us7000abcd.csv").is_file());

    let llo = predictions::query_prediction(&env.pool, "us7000abcd", "LLO")
        .await
        .unwrap()
        .unwrap();
    assert!(llo.lockloss);
    assert_eq!(predictions::count_predictions(&env.pool).await.unwrap(), 5);
}

#[tokio::test]
async fn test_second_cycle_does_no_work() {
    let env = TestEnv::new().await;
    write_notice(env.pdl_dir(), "us7000abcd", "1442090000000", &recent_notice("us7000abcd", 6.2));
    let scheduler = Scheduler::new(env.context());
    let cancel = CancellationToken::new();

    scheduler.run_cycle(&CycleOptions::default(), &cancel).await.unwrap();
    let export = env.export_dir().join("us7000abcd.csv");
    std::fs::write(&export, "consumed").unwrap();

    let report = scheduler.run_cycle(&CycleOptions::default(), &cancel).await.unwrap();
    assert_eq!(report.ingest.already_seen, 1);
    assert_eq!(report.ingest.ingested, 0);
    assert_eq!(report.existing, 5);
    assert_eq!(report.computed, 0);
    assert_eq!(report.exported, 0);
    assert_eq!(std::fs::read_to_string(&export).unwrap(), "consumed");
}

#[tokio::test]
async fn test_forced_reingest_keeps_one_row() {
    let env = TestEnv::new().await;
    write_notice(env.pdl_dir(), "us7000abcd", "1442090000000", &recent_notice("us7000abcd", 5.5));
    // A later version of the same event
    write_notice(env.pdl_dir(), "us7000abcd", "1442090100000", &recent_notice("us7000abcd", 5.6));
    let scheduler = Scheduler::new(env.context());
    let cancel = CancellationToken::new();

    let first = scheduler.run_cycle(&CycleOptions::default(), &cancel).await.unwrap();
    assert_eq!(first.ingest.ingested, 1);
    assert_eq!(first.ingest.updated, 1);

    let repeat = CycleOptions {
        repeat: true,
        ..CycleOptions::default()
    };
    let second = scheduler.run_cycle(&repeat, &cancel).await.unwrap();
    assert_eq!(second.ingest.already_seen, 0);
    assert_eq!(second.ingest.updated, 2);

    let all = earthquakes::query_earthquakes(&env.pool).await.unwrap();
    assert_eq!(all.len(), 1);
    // Latest version wins
    assert_eq!(all[0].magnitude, 5.6);
    assert_eq!(predictions::count_predictions(&env.pool).await.unwrap(), 5);
}

#[tokio::test]
async fn test_malformed_notice_marked_and_skipped() {
    let env = TestEnv::new().await;
    let folder = write_notice(env.pdl_dir(), "us0000bad", "1", r#"{"eventName": "us0000bad", "Magnitude": 6.0}"#);
    let scheduler = Scheduler::new(env.context());
    let cancel = CancellationToken::new();

    let report = scheduler.run_cycle(&CycleOptions::default(), &cancel).await.unwrap();
    assert_eq!(report.ingest.malformed, 1);
    assert!(folder.join(MARKER_FILE).is_file());
    assert!(earthquakes::query_earthquakes(&env.pool).await.unwrap().is_empty());

    let report = scheduler.run_cycle(&CycleOptions::default(), &cancel).await.unwrap();
    assert_eq!(report.ingest.malformed, 0);
    assert_eq!(report.ingest.already_seen, 1);
}

#[tokio::test]
async fn test_failed_earthquake_write_retried_next_poll() {
    let env = TestEnv::new().await;
    let folder = write_notice(env.pdl_dir(), "us7000abcd", "1442090000000", &recent_notice("us7000abcd", 6.0));
    sqlx::query(
        "CREATE TRIGGER reject_earthquakes BEFORE INSERT ON earthquakes \
         BEGIN SELECT RAISE(ABORT, 'write refused'); END",
    )
    .execute(&env.pool)
    .await
    .unwrap();
    let scheduler = Scheduler::new(env.context());
    let cancel = CancellationToken::new();

    assert!(scheduler.run_cycle(&CycleOptions::default(), &cancel).await.is_err());
    assert!(!folder.join(MARKER_FILE).exists());

    sqlx::query("DROP TRIGGER reject_earthquakes")
        .execute(&env.pool)
        .await
        .unwrap();
    let report = scheduler.run_cycle(&CycleOptions::default(), &cancel).await.unwrap();
    assert_eq!(report.ingest.already_seen, 0);
    assert_eq!(report.ingest.ingested, 1);
    assert_eq!(report.computed, 5);
    assert!(folder.join(MARKER_FILE).is_file());
    assert_eq!(earthquakes::query_earthquakes(&env.pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_out_of_range_notice_never_reaches_predictions() {
    let env = TestEnv::new().await;
    let bad = notice_json("us0000lat", Utc::now() - Duration::hours(1), 95.0, 10.0, 10.0, 6.5);
    let folder = write_notice(env.pdl_dir(), "us0000lat", "1", &bad);
    let scheduler = Scheduler::new(env.context());
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let report = scheduler.run_cycle(&CycleOptions::default(), &cancel).await.unwrap();
        assert_eq!(report.ingest.ingested, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(report.pairs, 0);
    }
    assert!(folder.join(MARKER_FILE).is_file());
    assert!(earthquakes::query_earthquakes(&env.pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_folder_without_notice_is_not_marked() {
    let env = TestEnv::new().await;
    let folder = env.pdl_dir().join("us7000late").join("us").join("1");
    std::fs::create_dir_all(&folder).unwrap();
    let scheduler = Scheduler::new(env.context());
    let cancel = CancellationToken::new();

    let report = scheduler.run_cycle(&CycleOptions::default(), &cancel).await.unwrap();
    assert_eq!(report.ingest.no_notice, 1);
    assert!(!folder.join(MARKER_FILE).exists());

    // Notice lands after the first poll
    write_notice(env.pdl_dir(), "us7000late", "1", &recent_notice("us7000late", 6.0));
    let report = scheduler.run_cycle(&CycleOptions::default(), &cancel).await.unwrap();
    assert_eq!(report.ingest.ingested, 1);
}

#[tokio::test]
async fn test_lookback_and_magnitude_filters() {
    let env = TestEnv::new().await;
    let old = notice_json("us0000old", Utc::now() - Duration::days(30), 0.0, 0.0, 10.0, 7.0);
    write_notice(env.pdl_dir(), "us0000old", "1", &old);
    write_notice(env.pdl_dir(), "us0000sml", "1", &recent_notice("us0000sml", 4.9));
    let scheduler = Scheduler::new(env.context());
    let cancel = CancellationToken::new();

    let report = scheduler.run_cycle(&CycleOptions::default(), &cancel).await.unwrap();
    assert_eq!(report.ingest.too_old, 1);
    assert_eq!(report.ingest.ingested, 1);
    assert_eq!(report.pairs, 0);
    assert_eq!(predictions::count_predictions(&env.pool).await.unwrap(), 0);

    // A wider lookback picks up the old event once forced
    let wide = CycleOptions {
        repeat: true,
        lookback_days: Some(60.0),
        ..CycleOptions::default()
    };
    let report = scheduler.run_cycle(&wide, &cancel).await.unwrap();
    assert_eq!(report.ingest.ingested, 1);
    assert_eq!(report.computed, 5);
}

#[tokio::test]
async fn test_cancelled_cycle_stops_before_pairs() {
    let env = TestEnv::new().await;
    write_notice(env.pdl_dir(), "us7000abcd", "1", &recent_notice("us7000abcd", 6.0));
    let scheduler = Scheduler::new(env.context());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = scheduler.run_cycle(&CycleOptions::default(), &cancel).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.computed, 0);

    // Continuous mode returns once cancelled
    scheduler
        .run(RunMode::Continuous, &CycleOptions::default(), &cancel)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_single_pass_mode() {
    let env = TestEnv::with_settings("[scheduler]\npoll_interval_seconds = 3600\n").await;
    write_notice(env.pdl_dir(), "us7000abcd", "1", &recent_notice("us7000abcd", 6.0));
    let scheduler = Scheduler::new(env.context());

    scheduler
        .run(RunMode::Once, &CycleOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(predictions::count_predictions(&env.pool).await.unwrap(), 5);
}

#[tokio::test]
async fn test_purge_runs_before_ingest() {
    let env = TestEnv::with_settings("").await;
    write_notice(env.pdl_dir(), "us7000abcd", "1", &recent_notice("us7000abcd", 6.0));
    let scheduler = Scheduler::new(env.context());

    let options = CycleOptions {
        purge: true,
        ..CycleOptions::default()
    };
    let report = scheduler.run_cycle(&options, &CancellationToken::new()).await.unwrap();
    // Fresh folders survive the purge
    assert_eq!(report.purge.map(|p| p.removed), Some(0));
    assert_eq!(report.ingest.ingested, 1);
}
