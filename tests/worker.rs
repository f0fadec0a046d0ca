mod common;

use common::{insert_job, setup_store, test_config};
use queuectl::worker::{execute_command, CommandOutcome, Worker};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn executor_captures_stdout_on_success() {
    let outcome = execute_command("echo hello", Duration::from_secs(5)).await;
    match outcome {
        CommandOutcome::Completed { stdout, stderr } => {
            assert_eq!(stdout, "hello");
            assert_eq!(stderr, "");
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn executor_reports_non_zero_exit() {
    let outcome = execute_command("echo oops >&2; exit 3", Duration::from_secs(5)).await;
    match outcome {
        CommandOutcome::Failed { exit_code, message } => {
            assert_eq!(exit_code, Some(3));
            assert!(message.contains("status 3"));
            assert!(message.contains("oops"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn executor_kills_commands_that_exceed_the_timeout() {
    let outcome = execute_command("sleep 30", Duration::from_millis(200)).await;
    match outcome {
        CommandOutcome::Failed { exit_code, message } => {
            assert_eq!(exit_code, None);
            assert!(message.contains("timed out"));
        }
        other => panic!("expected timeout failure, got {other:?}"),
    }
}

#[tokio::test]
async fn worker_loop_completes_an_enqueued_job() {
    let (store, _pool, _dir) = setup_store().await;
    insert_job(&store, "job-echo", "echo from-worker", 3).await;

    let shutdown = CancellationToken::new();
    let worker = Arc::new(Worker::new(
        "worker-1".to_string(),
        store.clone(),
        &test_config(),
        shutdown.clone(),
    ));

    let runner = worker.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    // Wait for the worker to pick the job up and finish it.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let job = store.get("job-echo").await.unwrap();
        if job.state == "completed" {
            assert_eq!(job.exit_code, Some(0));
            assert_eq!(job.output.as_deref(), Some("from-worker"));
            assert!(job.completed_at.is_some());
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job not completed in time (state: {})",
            job.state
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    worker.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn worker_loop_escalates_a_failing_job() {
    let (store, _pool, _dir) = setup_store().await;
    insert_job(&store, "job-bad", "exit 7", 0).await;

    let shutdown = CancellationToken::new();
    let worker = Arc::new(Worker::new(
        "worker-1".to_string(),
        store.clone(),
        &test_config(),
        shutdown.clone(),
    ));

    let runner = worker.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let job = store.get("job-bad").await.unwrap();
        if job.state == "dead" {
            assert_eq!(job.attempts, 1);
            assert_eq!(job.exit_code, Some(7));
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job not escalated in time (state: {})",
            job.state
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    worker.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn worker_recovers_stuck_jobs_on_start() {
    let (store, _pool, _dir) = setup_store().await;

    insert_job(&store, "job-stuck", "echo recovered", 3).await;
    store.claim("worker-crashed").await.unwrap().unwrap();
    sqlx::query("UPDATE jobs SET claimed_at = ?1 WHERE id = ?2")
        .bind(chrono::Utc::now() - chrono::Duration::minutes(30))
        .bind("job-stuck")
        .execute(store.pool())
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let worker = Arc::new(Worker::new(
        "worker-1".to_string(),
        store.clone(),
        &test_config(),
        shutdown.clone(),
    ));

    let runner = worker.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let job = store.get("job-stuck").await.unwrap();
        if job.state == "completed" {
            assert_eq!(job.output.as_deref(), Some("recovered"));
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "stuck job not recovered and completed in time (state: {})",
            job.state
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    worker.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn stop_is_observed_between_jobs() {
    let (store, _pool, _dir) = setup_store().await;

    let shutdown = CancellationToken::new();
    let worker = Arc::new(Worker::new(
        "worker-1".to_string(),
        store.clone(),
        &test_config(),
        shutdown.clone(),
    ));

    let runner = worker.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    // Idle worker, nothing claimed; a stop request ends the loop promptly.
    tokio::time::sleep(Duration::from_millis(100)).await;
    worker.stop();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker did not stop in time")
        .unwrap();
}
