use crate::error::QueueError;
use crate::jobs::model::{Job, JobState, JobStats, ListFilter, NewJob};
use crate::jobs::retry::RetryPolicy;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

/// Sole owner of job persistence. Every mutation is a single SQL statement
/// (or transaction) so concurrent workers only ever coordinate through the
/// database, never through in-process state.
#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(pool: SqlitePool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ----------------------------
    // Writes
    // ----------------------------

    pub async fn insert(&self, job: NewJob) -> Result<Job, QueueError> {
        let now = Utc::now();

        let inserted = sqlx::query(
            r#"
            INSERT INTO jobs (id, command, state, attempts, max_retries, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0, ?4, ?5, ?5)
            "#,
        )
        .bind(&job.id)
        .bind(&job.command)
        .bind(JobState::Pending.as_str())
        .bind(job.max_retries)
        .bind(now)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => self.get(&job.id).await,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                QueueError::validation(format!("job with id '{}' already exists", job.id)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    // ----------------------------
    // Reads
    // ----------------------------

    pub async fn find(&self, id: &str) -> Result<Option<Job>, QueueError> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    pub async fn get(&self, id: &str) -> Result<Job, QueueError> {
        self.find(id)
            .await?
            .ok_or_else(|| QueueError::NotFound(id.to_string()))
    }

    /// List jobs, newest-created-first. Empty result is not an error.
    pub async fn list(&self, filter: ListFilter) -> Result<Vec<Job>, QueueError> {
        let limit = filter.limit.map(|n| n.clamp(1, 500));

        let jobs = match (filter.state, limit) {
            (Some(state), Some(limit)) => {
                sqlx::query_as::<_, Job>(
                    r#"
                    SELECT * FROM jobs
                    WHERE state = ?1
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?2
                    "#,
                )
                .bind(state.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            (Some(state), None) => {
                sqlx::query_as::<_, Job>(
                    r#"
                    SELECT * FROM jobs
                    WHERE state = ?1
                    ORDER BY created_at DESC, id DESC
                    "#,
                )
                .bind(state.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            (None, Some(limit)) => {
                sqlx::query_as::<_, Job>(
                    r#"
                    SELECT * FROM jobs
                    ORDER BY created_at DESC, id DESC
                    LIMIT ?1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            (None, None) => {
                sqlx::query_as::<_, Job>(
                    r#"
                    SELECT * FROM jobs
                    ORDER BY created_at DESC, id DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(jobs)
    }

    // ----------------------------
    // Claiming
    // ----------------------------

    /// Claim exactly one eligible pending job for this worker.
    ///
    /// The candidate selection and the transition to `processing` are one
    /// UPDATE statement, so two concurrent claimers can never win the same
    /// job. Candidates are ordered oldest-created-first; a job with a future
    /// `retry_at` is skipped until its time arrives.
    ///
    /// `None` means "queue empty for now", not a fault.
    pub async fn claim(&self, worker_id: &str) -> Result<Option<Job>, QueueError> {
        let now = Utc::now();

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET state = 'processing',
                claimed_by = ?1,
                claimed_at = ?2,
                updated_at = ?2
            WHERE id = (
                SELECT id FROM jobs
                WHERE state = 'pending'
                  AND (retry_at IS NULL OR retry_at <= ?2)
                ORDER BY created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    // ----------------------------
    // State transitions
    // ----------------------------

    /// Terminal success: record exit code 0, captured output, and the
    /// completion timestamp; release the claim.
    pub async fn mark_completed(
        &self,
        id: &str,
        stdout: &str,
        stderr: &str,
    ) -> Result<(), QueueError> {
        let now = Utc::now();

        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'completed',
                exit_code = 0,
                output = ?1,
                stderr = ?2,
                completed_at = ?3,
                claimed_by = NULL,
                claimed_at = NULL,
                updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(stdout)
        .bind(stderr)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(QueueError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Recoverable failure: put the job back in `pending` with a backoff
    /// delay computed by the retry policy. Returns the delay in seconds.
    pub async fn schedule_retry(
        &self,
        id: &str,
        attempts: i32,
        error: &str,
    ) -> Result<i64, QueueError> {
        let delay = self.retry.delay_seconds(attempts);
        let now = Utc::now();
        let retry_at = now + Duration::seconds(delay);

        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'pending',
                attempts = ?1,
                retry_at = ?2,
                last_error = ?3,
                claimed_by = NULL,
                claimed_at = NULL,
                updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(attempts)
        .bind(retry_at)
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(QueueError::NotFound(id.to_string()));
        }
        Ok(delay)
    }

    /// Terminal failure: retries exhausted, escalate to the dead letter queue.
    pub async fn mark_dead(
        &self,
        id: &str,
        attempts: i32,
        exit_code: Option<i32>,
        error: &str,
    ) -> Result<(), QueueError> {
        let now = Utc::now();

        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'dead',
                attempts = ?1,
                exit_code = ?2,
                last_error = ?3,
                retry_at = NULL,
                claimed_by = NULL,
                claimed_at = NULL,
                updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(attempts)
        .bind(exit_code)
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(QueueError::NotFound(id.to_string()));
        }
        Ok(())
    }

    // ----------------------------
    // Crash recovery
    // ----------------------------

    /// Reset `processing` jobs whose claim is older than `older_than` back to
    /// `pending`. A worker that died mid-execution never reports an outcome,
    /// so its jobs sit claimed forever until this sweep frees them. Attempts
    /// are left untouched. Returns the number of jobs recovered.
    pub async fn recover_stuck_jobs(&self, older_than: Duration) -> Result<u64, QueueError> {
        let now = Utc::now();
        let cutoff = now - older_than;

        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'pending',
                claimed_by = NULL,
                claimed_at = NULL,
                updated_at = ?1
            WHERE state = 'processing'
              AND claimed_at IS NOT NULL
              AND claimed_at < ?2
            "#,
        )
        .bind(now)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    // ----------------------------
    // Stats
    // ----------------------------

    /// Counts per state, zero-filled so all five states are always present.
    pub async fn get_stats(&self) -> Result<JobStats, QueueError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM jobs GROUP BY state")
                .fetch_all(&self.pool)
                .await?;

        let mut stats = JobStats::default();
        for (state, count) in rows {
            match state.as_str() {
                "pending" => stats.pending = count,
                "processing" => stats.processing = count,
                "completed" => stats.completed = count,
                "failed" => stats.failed = count,
                "dead" => stats.dead = count,
                _ => {}
            }
        }
        Ok(stats)
    }

    // ----------------------------
    // Config
    // ----------------------------

    pub async fn get_config(&self, key: &str) -> Result<Option<String>, QueueError> {
        let value = sqlx::query_scalar("SELECT value FROM config WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn set_config(&self, key: &str, value: &str) -> Result<(), QueueError> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO config (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
