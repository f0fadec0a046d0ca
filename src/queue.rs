use crate::error::QueueError;
use crate::jobs::model::{Job, JobState, JobStats, ListFilter, NewJob};
use crate::jobs::store::JobStore;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Enqueue input. This is also the JSON shape the CLI accepts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub command: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub max_retries: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub stats: JobStats,
    pub active_workers: usize,
}

/// Thin business-logic façade over the store: validates input, fills in
/// defaults, and generates ids. It never mutates job rows itself.
#[derive(Clone)]
pub struct QueueManager {
    store: JobStore,
}

impl QueueManager {
    pub fn new(store: JobStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub async fn enqueue(&self, request: EnqueueRequest) -> Result<Job, QueueError> {
        if request.command.trim().is_empty() {
            return Err(QueueError::validation("job command is required"));
        }

        let max_retries = request.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        if max_retries < 0 {
            return Err(QueueError::validation("max_retries must not be negative"));
        }

        let job = NewJob {
            id: request.id.unwrap_or_else(generate_job_id),
            command: request.command,
            max_retries,
        };

        self.store.insert(job).await
    }

    pub async fn get(&self, id: &str) -> Result<Job, QueueError> {
        self.store.get(id).await
    }

    pub async fn list(&self, state: Option<JobState>) -> Result<Vec<Job>, QueueError> {
        self.store
            .list(ListFilter {
                state,
                limit: None,
            })
            .await
    }

    /// Queue stats plus the worker-liveness count. The supervisor owns the
    /// process table, so the caller supplies `active_workers`.
    pub async fn get_status(&self, active_workers: usize) -> Result<QueueStatus, QueueError> {
        let stats = self.store.get_stats().await?;
        Ok(QueueStatus {
            stats,
            active_workers,
        })
    }

    /// Requeue a job from the DLQ after checking it exists and is `dead`.
    pub async fn retry_from_dlq(&self, id: &str) -> Result<Job, QueueError> {
        let job = self.store.get(id).await?;
        if job.state != JobState::Dead.as_str() {
            return Err(QueueError::InvalidState {
                id: id.to_string(),
                state: job.state,
            });
        }
        self.store.retry_dead(id).await
    }
}

/// Opaque, collision-resistant id: enqueue time in millis plus a random
/// suffix, e.g. `job_1754650000000_k3x9qa`.
fn generate_job_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("job_{millis}_{suffix}")
}
