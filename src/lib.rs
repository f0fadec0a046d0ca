//! queuectl — persistent background job queue for shell commands.
//!
//! Jobs live in a shared SQLite store; worker processes claim them one at a
//! time through an atomic update, execute them as subprocesses, and record
//! outcomes. Failures retry with exponential backoff until `max_retries` is
//! exhausted, then escalate to a dead letter queue for operator attention.
//! Jobs abandoned by crashed workers are swept back to `pending`.

pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod queue;
pub mod worker;

use tracing_subscriber::EnvFilter;

/// Initialize process-wide logging. Safe to call once per binary; honors
/// `RUST_LOG`, defaults to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
