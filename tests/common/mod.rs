use queuectl::config::Config;
use queuectl::jobs::model::{Job, NewJob};
use queuectl::jobs::JobStore;
use sqlx::SqlitePool;
use std::time::Duration;
use tempfile::TempDir;

/// Fresh store on a temp-file SQLite database. Keep the `TempDir` alive for
/// the duration of the test; dropping it deletes the database.
pub async fn setup_store() -> (JobStore, SqlitePool, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let db_path = dir.path().join("queue.db");

    let pool = queuectl::db::make_pool(db_path.to_str().expect("non-utf8 temp path"))
        .await
        .expect("failed to open store");
    queuectl::db::run_migrations(&pool)
        .await
        .expect("migrations failed");

    (JobStore::new(pool.clone()), pool, dir)
}

#[allow(dead_code)]
pub async fn insert_job(store: &JobStore, id: &str, command: &str, max_retries: i32) -> Job {
    store
        .insert(NewJob {
            id: id.to_string(),
            command: command.to_string(),
            max_retries,
        })
        .await
        .expect("insert failed")
}

#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        db_path: String::new(),
        worker_id: "worker-test".to_string(),
        worker_count: 1,
        poll_interval: Duration::from_millis(50),
        execution_timeout: Duration::from_secs(5),
        stuck_timeout: Duration::from_secs(300),
        shutdown_grace: Duration::from_secs(1),
    }
}
