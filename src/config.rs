use std::time::Duration;

/// Runtime configuration, loaded from environment variables (with `.env`
/// support). Every knob has a default so `queuectl` works out of the box
/// against `data/queue.db`.
#[derive(Clone, Debug)]
pub struct Config {
    pub db_path: String,
    pub worker_id: String,
    pub worker_count: u32,
    /// Sleep between claim attempts when the queue is empty.
    pub poll_interval: Duration,
    /// Hard upper bound on a single command execution.
    pub execution_timeout: Duration,
    /// A `processing` job claimed longer ago than this is presumed abandoned.
    pub stuck_timeout: Duration,
    /// How long the supervisor waits between SIGTERM and SIGKILL.
    pub shutdown_grace: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let db_path = env_or_fallback("QUEUECTL_DB_PATH", "DB_PATH")
            .unwrap_or_else(|| "data/queue.db".to_string());

        let worker_id = env_or_fallback("QUEUECTL_WORKER_ID", "WORKER_ID")
            .unwrap_or_else(|| format!("worker-{}", std::process::id()));

        let worker_count = env_or_fallback("QUEUECTL_WORKER_COUNT", "WORKER_COUNT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1)
            .clamp(1, 64);

        let poll_interval_ms = env_or_fallback("QUEUECTL_POLL_INTERVAL_MS", "POLL_INTERVAL_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1_000);

        let execution_timeout_secs =
            env_or_fallback("QUEUECTL_EXECUTION_TIMEOUT_SECS", "EXECUTION_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(30);

        let stuck_timeout_secs =
            env_or_fallback("QUEUECTL_STUCK_TIMEOUT_SECS", "STUCK_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(300);

        let shutdown_grace_secs =
            env_or_fallback("QUEUECTL_SHUTDOWN_GRACE_SECS", "SHUTDOWN_GRACE_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(5);

        Ok(Self {
            db_path,
            worker_id,
            worker_count,
            poll_interval: Duration::from_millis(poll_interval_ms),
            execution_timeout: Duration::from_secs(execution_timeout_secs),
            stuck_timeout: Duration::from_secs(stuck_timeout_secs),
            shutdown_grace: Duration::from_secs(shutdown_grace_secs),
        })
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}
