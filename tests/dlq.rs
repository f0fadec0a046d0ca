mod common;

use common::{insert_job, setup_store};
use queuectl::error::QueueError;
use queuectl::jobs::JobStore;
use queuectl::queue::QueueManager;

async fn make_dead(store: &JobStore, id: &str, error: &str) {
    insert_job(store, id, "false", 0).await;
    store.mark_dead(id, 1, Some(1), error).await.unwrap();
}

#[tokio::test]
async fn retry_dead_resets_job_for_reprocessing() {
    let (store, _pool, _dir) = setup_store().await;
    make_dead(&store, "job-a", "boom").await;

    let job = store.retry_dead("job-a").await.unwrap();
    assert_eq!(job.state, "pending");
    assert_eq!(job.attempts, 0);
    assert!(job.retry_at.is_none());
    assert!(job.claimed_by.is_none());
    assert!(job.last_error.is_none());

    // The job is no longer dead, so a second retry is a wrong-state error.
    let err = store.retry_dead("job-a").await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidState { .. }));
}

#[tokio::test]
async fn retry_dead_on_unknown_id_is_not_found() {
    let (store, _pool, _dir) = setup_store().await;
    let err = store.retry_dead("job-missing").await.unwrap_err();
    assert!(matches!(err, QueueError::NotFound(_)));
}

#[tokio::test]
async fn queue_manager_validates_before_dlq_retry() {
    let (store, _pool, _dir) = setup_store().await;
    let queue = QueueManager::new(store.clone());

    insert_job(&store, "job-pending", "echo hi", 3).await;
    let err = queue.retry_from_dlq("job-pending").await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidState { .. }));

    make_dead(&store, "job-dead", "boom").await;
    let job = queue.retry_from_dlq("job-dead").await.unwrap();
    assert_eq!(job.state, "pending");
}

#[tokio::test]
async fn retry_all_dead_on_empty_dlq_is_a_noop() {
    let (store, _pool, _dir) = setup_store().await;

    insert_job(&store, "job-pending", "echo hi", 3).await;

    assert_eq!(store.retry_all_dead().await.unwrap(), 0);

    let job = store.get("job-pending").await.unwrap();
    assert_eq!(job.state, "pending");
    assert_eq!(job.attempts, 0);
}

#[tokio::test]
async fn retry_all_dead_requeues_every_dead_job() {
    let (store, _pool, _dir) = setup_store().await;
    make_dead(&store, "job-a", "boom").await;
    make_dead(&store, "job-b", "boom").await;

    assert_eq!(store.retry_all_dead().await.unwrap(), 2);
    assert!(store.list_dead().await.unwrap().is_empty());

    let stats = store.get_stats().await.unwrap();
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.dead, 0);
}

#[tokio::test]
async fn delete_and_clear_remove_dead_jobs_only() {
    let (store, _pool, _dir) = setup_store().await;
    make_dead(&store, "job-a", "boom").await;
    make_dead(&store, "job-b", "boom").await;
    insert_job(&store, "job-pending", "echo hi", 3).await;

    store.delete_dead("job-a").await.unwrap();
    assert!(store.find("job-a").await.unwrap().is_none());

    let err = store.delete_dead("job-pending").await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidState { .. }));
    let err = store.delete_dead("job-missing").await.unwrap_err();
    assert!(matches!(err, QueueError::NotFound(_)));

    assert_eq!(store.clear_dead().await.unwrap(), 1);
    assert!(store.list_dead().await.unwrap().is_empty());
    // The pending job survives a clear.
    assert!(store.find("job-pending").await.unwrap().is_some());
}

#[tokio::test]
async fn get_dead_only_accepts_dead_jobs() {
    let (store, _pool, _dir) = setup_store().await;
    make_dead(&store, "job-a", "boom").await;
    insert_job(&store, "job-pending", "echo hi", 3).await;

    assert_eq!(store.get_dead("job-a").await.unwrap().id, "job-a");

    let err = store.get_dead("job-pending").await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidState { .. }));
    let err = store.get_dead("job-missing").await.unwrap_err();
    assert!(matches!(err, QueueError::NotFound(_)));
}

#[tokio::test]
async fn dead_stats_group_errors_most_frequent_first() {
    let (store, _pool, _dir) = setup_store().await;

    for i in 0..3 {
        make_dead(&store, &format!("job-timeout-{i}"), "command timed out after 30s").await;
    }
    for i in 0..2 {
        make_dead(
            &store,
            &format!("job-exit-{i}"),
            "command exited with status 1",
        )
        .await;
    }
    make_dead(&store, "job-spawn", "failed to spawn command").await;

    let stats = store.get_dead_stats().await.unwrap();
    assert_eq!(stats.total, 6);
    assert!(stats.oldest_dead_at.is_some());

    assert_eq!(stats.top_errors.len(), 3);
    assert_eq!(stats.top_errors[0].last_error, "command timed out after 30s");
    assert_eq!(stats.top_errors[0].count, 3);
    assert_eq!(
        stats.top_errors[1].last_error,
        "command exited with status 1"
    );
    assert_eq!(stats.top_errors[1].count, 2);
}

#[tokio::test]
async fn dead_stats_on_empty_dlq() {
    let (store, _pool, _dir) = setup_store().await;

    let stats = store.get_dead_stats().await.unwrap();
    assert_eq!(stats.total, 0);
    assert!(stats.top_errors.is_empty());
    assert!(stats.oldest_dead_at.is_none());
}

#[tokio::test]
async fn dead_stats_cap_error_groups_at_five() {
    let (store, _pool, _dir) = setup_store().await;

    for i in 0..7 {
        make_dead(&store, &format!("job-{i}"), &format!("distinct error {i}")).await;
    }

    let stats = store.get_dead_stats().await.unwrap();
    assert_eq!(stats.total, 7);
    assert_eq!(stats.top_errors.len(), 5);
}
