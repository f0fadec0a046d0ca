//! Dead letter queue administration.
//!
//! Jobs land here after exhausting their retries and stay until an operator
//! retries or deletes them. Single-job operations fail with a not-found class
//! error when the target is missing or not `dead`; nothing is partially
//! applied.

use crate::error::QueueError;
use crate::jobs::model::{DeadLetterStats, ErrorGroup, Job, JobState, ListFilter};
use crate::jobs::store::JobStore;
use chrono::{DateTime, Utc};

impl JobStore {
    pub async fn list_dead(&self) -> Result<Vec<Job>, QueueError> {
        self.list(ListFilter {
            state: Some(JobState::Dead),
            limit: None,
        })
        .await
    }

    pub async fn get_dead(&self, id: &str) -> Result<Job, QueueError> {
        let job = self.get(id).await?;
        if job.state != JobState::Dead.as_str() {
            return Err(QueueError::InvalidState {
                id: id.to_string(),
                state: job.state,
            });
        }
        Ok(job)
    }

    /// Give a dead job a fresh start: back to `pending` with attempts reset
    /// to zero and every retry/claim/error field cleared.
    pub async fn retry_dead(&self, id: &str) -> Result<Job, QueueError> {
        let now = Utc::now();

        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'pending',
                attempts = 0,
                retry_at = NULL,
                claimed_by = NULL,
                claimed_at = NULL,
                last_error = NULL,
                updated_at = ?1
            WHERE id = ?2
              AND state = 'dead'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await?;

        if res.rows_affected() == 0 {
            // Missing vs wrong state: report which one it was.
            let job = self.get(id).await?;
            return Err(QueueError::InvalidState {
                id: id.to_string(),
                state: job.state,
            });
        }

        self.get(id).await
    }

    /// Requeue every dead job at once. Returns the number requeued; an empty
    /// DLQ is a no-op, not an error.
    pub async fn retry_all_dead(&self) -> Result<u64, QueueError> {
        let now = Utc::now();

        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'pending',
                attempts = 0,
                retry_at = NULL,
                claimed_by = NULL,
                claimed_at = NULL,
                last_error = NULL,
                updated_at = ?1
            WHERE state = 'dead'
            "#,
        )
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(res.rows_affected())
    }

    /// Permanently delete a single dead job. This is the only way a job row
    /// leaves the store besides `clear_dead`.
    pub async fn delete_dead(&self, id: &str) -> Result<(), QueueError> {
        let res = sqlx::query("DELETE FROM jobs WHERE id = ?1 AND state = 'dead'")
            .bind(id)
            .execute(self.pool())
            .await?;

        if res.rows_affected() == 0 {
            let job = self.get(id).await?;
            return Err(QueueError::InvalidState {
                id: id.to_string(),
                state: job.state,
            });
        }
        Ok(())
    }

    pub async fn clear_dead(&self) -> Result<u64, QueueError> {
        let res = sqlx::query("DELETE FROM jobs WHERE state = 'dead'")
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected())
    }

    pub async fn get_dead_stats(&self) -> Result<DeadLetterStats, QueueError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE state = 'dead'")
            .fetch_one(self.pool())
            .await?;

        let top_errors: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT COALESCE(last_error, 'unknown') AS last_error, COUNT(*) AS count
            FROM jobs
            WHERE state = 'dead'
            GROUP BY COALESCE(last_error, 'unknown')
            ORDER BY count DESC, last_error ASC
            LIMIT 5
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        let oldest_dead_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MIN(updated_at) FROM jobs WHERE state = 'dead'")
                .fetch_one(self.pool())
                .await?;

        Ok(DeadLetterStats {
            total,
            top_errors: top_errors
                .into_iter()
                .map(|(last_error, count)| ErrorGroup { last_error, count })
                .collect(),
            oldest_dead_at,
        })
    }
}
