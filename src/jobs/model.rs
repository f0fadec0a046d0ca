use chrono::{DateTime, Utc};
use serde::Serialize;

/// A job row. Field names are the wire contract: anything layered on top of
/// the store (CLI, dashboard, future network API) sees exactly these names.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub state: String,
    pub attempts: i32,
    pub max_retries: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub retry_at: Option<DateTime<Utc>>,

    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub exit_code: Option<i32>,
    pub output: Option<String>,
    pub stderr: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: String,
    pub command: String,
    pub max_retries: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    /// Reserved. No canonical transition writes it; jobs rest in `pending`
    /// (retryable) or `dead` (terminal) between polls.
    Failed,
    Dead,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Dead => "dead",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobState::Pending),
            "processing" => Some(JobState::Processing),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "dead" => Some(JobState::Dead),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter {
    pub state: Option<JobState>,
    pub limit: Option<i64>,
}

/// Per-state job counts. Every state is present even at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub dead: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorGroup {
    pub last_error: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadLetterStats {
    pub total: i64,
    /// Up to five error messages, grouped, most frequent first.
    pub top_errors: Vec<ErrorGroup>,
    pub oldest_dead_at: Option<DateTime<Utc>>,
}
