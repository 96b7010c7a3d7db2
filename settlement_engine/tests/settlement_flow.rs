//! End-to-end settlement runs against a live database: totals, additive re-runs and cancellation
//! under load.
use std::{sync::Arc, time::Duration};

use chrono::{Days, NaiveTime, TimeZone, Utc};
use osp_common::Cents;
use settlement_engine::{
    db_types::{JobStatus, NewTransaction, SettlementParams, TransactionStatus},
    traits::{PlatformError, SettlementLedger},
    JobEngine,
    JobEngineConfig,
};
use uuid::Uuid;

mod support;

fn engine_config(batch_size: i64) -> JobEngineConfig {
    JobEngineConfig {
        workers: 2,
        batch_size,
        queue_size: 10,
        output_dir: std::env::temp_dir().join(format!("osp-settlements-{}", Uuid::new_v4())),
    }
}

fn txn(merchant: &str, paid_at: chrono::DateTime<Utc>, amount: i64, fee: i64) -> NewTransaction {
    NewTransaction {
        merchant_id: merchant.to_string(),
        amount_cents: Cents::new(amount),
        fee_cents: Cents::new(fee),
        status: TransactionStatus::Completed,
        paid_at,
    }
}

async fn wait_for_terminal(engine: &JobEngine<settlement_engine::PgDatabase>, id: Uuid) -> JobStatus {
    for _ in 0..300 {
        let job = engine.job(id).await.expect("job row");
        if job.status.is_terminal() {
            return job.status;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("job [{id}] did not reach a terminal state within 30s");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "needs a live Postgres (set OSP_TEST_DATABASE_URL)"]
async fn settlement_happy_path_produces_exact_totals() {
    let _ = env_logger::try_init();
    let db = Arc::new(support::prepare_env::prepare_test_db().await.expect("test database"));

    let yesterday = Utc::now() - chrono::Duration::days(1);
    db.bulk_insert_transactions(&[
        txn("merchant_1", yesterday, 10_000, 300),
        txn("merchant_1", yesterday, 20_000, 600),
        txn("merchant_2", yesterday, 15_000, 450),
        // A pending transaction in the window must not contribute.
        NewTransaction {
            merchant_id: "merchant_1".to_string(),
            amount_cents: Cents::new(99_999),
            fee_cents: Cents::new(999),
            status: TransactionStatus::Pending,
            paid_at: yesterday,
        },
    ])
    .await
    .expect("seed transactions");

    let engine = JobEngine::new(Arc::clone(&db), engine_config(10_000));
    engine.start();

    let from = (Utc::now() - chrono::Duration::days(2)).date_naive().to_string();
    let to = Utc::now().date_naive().to_string();
    let job = engine.submit_settlement(SettlementParams { from, to }).await.expect("submission");

    let status = wait_for_terminal(&engine, job.id).await;
    assert_eq!(status, JobStatus::Completed);

    let job = engine.job(job.id).await.expect("job row");
    assert_eq!(job.progress, 100.0);
    assert_eq!(job.processed, job.total);
    assert_eq!(job.total, 3);
    assert_eq!(job.download_url.as_deref(), Some(format!("/downloads/{}.csv", job.id).as_str()));

    let day = yesterday.date_naive();
    let m1 = db.fetch_settlement("merchant_1", day).await.expect("query").expect("merchant_1 rollup");
    assert_eq!(m1.gross_cents, Cents::new(30_000));
    assert_eq!(m1.fee_cents, Cents::new(900));
    assert_eq!(m1.net_cents, Cents::new(29_100));
    assert_eq!(m1.txn_count, 2);

    let m2 = db.fetch_settlement("merchant_2", day).await.expect("query").expect("merchant_2 rollup");
    assert_eq!(m2.gross_cents, Cents::new(15_000));
    assert_eq!(m2.net_cents, Cents::new(14_550));
    assert_eq!(m2.txn_count, 1);

    // The report exists at the recorded path: header + two rows, merchants in order.
    let report = std::fs::read_to_string(job.result_path.expect("result path")).expect("report file");
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("merchant_1,"));
    assert!(lines[2].starts_with("merchant_2,"));

    engine.shutdown().await;
    std::fs::remove_dir_all(engine.output_dir()).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "needs a live Postgres (set OSP_TEST_DATABASE_URL)"]
async fn rerunning_a_window_doubles_the_totals() {
    let db = Arc::new(support::prepare_env::prepare_test_db().await.expect("test database"));

    let yesterday = Utc::now() - chrono::Duration::days(1);
    db.bulk_insert_transactions(&[txn("merchant_1", yesterday, 10_000, 300)]).await.expect("seed");

    let engine = JobEngine::new(Arc::clone(&db), engine_config(10_000));
    engine.start();

    let from = (Utc::now() - chrono::Duration::days(2)).date_naive().to_string();
    let to = Utc::now().date_naive().to_string();
    for _ in 0..2 {
        let job = engine
            .submit_settlement(SettlementParams { from: from.clone(), to: to.clone() })
            .await
            .expect("submission");
        assert_eq!(wait_for_terminal(&engine, job.id).await, JobStatus::Completed);
    }

    // The upsert merges by addition, so the second run doubles the stored figures.
    let rollup =
        db.fetch_settlement("merchant_1", yesterday.date_naive()).await.expect("query").expect("rollup");
    assert_eq!(rollup.gross_cents, Cents::new(20_000));
    assert_eq!(rollup.fee_cents, Cents::new(600));
    assert_eq!(rollup.txn_count, 2);

    engine.shutdown().await;
    std::fs::remove_dir_all(engine.output_dir()).ok();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "needs a live Postgres (set OSP_TEST_DATABASE_URL)"]
async fn cancellation_mid_run_settles_quickly() {
    let db = Arc::new(support::prepare_env::prepare_test_db().await.expect("test database"));

    // A year of transactions with a tiny batch size forces many pages and cancellation points.
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let batch: Vec<NewTransaction> = (0..1000)
        .map(|i| txn(&format!("merchant_{}", i % 5), start + chrono::Duration::hours(i * 8), 1000 + i, 30))
        .collect();
    db.bulk_insert_transactions(&batch).await.expect("seed");

    let engine = JobEngine::new(Arc::clone(&db), engine_config(50));
    engine.start();

    let job = engine
        .submit_settlement(SettlementParams { from: "2020-01-01".into(), to: "2025-12-31".into() })
        .await
        .expect("submission");

    tokio::time::sleep(Duration::from_millis(50)).await;
    match engine.cancel(job.id).await {
        // AlreadyCancelled just means the run won the race and finished first.
        Ok(()) | Err(PlatformError::JobAlreadyCancelled) => {},
        Err(e) => panic!("unexpected cancel error: {e}"),
    }

    // Whatever the race outcome, the job must not be stuck RUNNING shortly after.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let job = engine.job(job.id).await.expect("job row");
    assert_ne!(job.status, JobStatus::Running, "job must settle after a cancellation request");

    engine.shutdown().await;
    std::fs::remove_dir_all(engine.output_dir()).ok();
}

#[tokio::test]
#[ignore = "needs a live Postgres (set OSP_TEST_DATABASE_URL)"]
async fn window_edges_are_inclusive_per_calendar_day() {
    let db = Arc::new(support::prepare_env::prepare_test_db().await.expect("test database"));

    let day = Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
    let end_of_day = day.date_naive().and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap()).and_utc();
    let next_day = day.date_naive().checked_add_days(Days::new(1)).unwrap().and_time(NaiveTime::MIN).and_utc();
    db.bulk_insert_transactions(&[
        txn("merchant_edge", day, 1_000, 10),        // first instant of the day: in
        txn("merchant_edge", end_of_day, 2_000, 20), // last second of the day: in
        txn("merchant_edge", next_day, 4_000, 40),   // first instant of the next day: out
    ])
    .await
    .expect("seed");

    let engine = JobEngine::new(Arc::clone(&db), engine_config(10_000));
    engine.start();
    let job = engine
        .submit_settlement(SettlementParams { from: "2025-03-10".into(), to: "2025-03-10".into() })
        .await
        .expect("submission");
    assert_eq!(wait_for_terminal(&engine, job.id).await, JobStatus::Completed);

    let rollup =
        db.fetch_settlement("merchant_edge", day.date_naive()).await.expect("query").expect("rollup");
    assert_eq!(rollup.gross_cents, Cents::new(3_000));
    assert_eq!(rollup.txn_count, 2);

    engine.shutdown().await;
    std::fs::remove_dir_all(engine.output_dir()).ok();
}
