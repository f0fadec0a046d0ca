use queuectl::config::Config;
use queuectl::db;
use queuectl::jobs::JobStore;
use queuectl::worker::Worker;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    queuectl::init_tracing();

    let cfg = Config::from_env()?;

    // The supervisor passes a worker index as the first argument; a worker
    // started by hand falls back to the configured id.
    let worker_id = std::env::args()
        .nth(1)
        .map(|n| format!("worker-{n}"))
        .unwrap_or_else(|| cfg.worker_id.clone());

    let pool = db::make_pool(&cfg.db_path).await?;
    db::run_migrations(&pool).await?;
    let store = JobStore::new(pool.clone());

    let shutdown = CancellationToken::new();
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
        info!("shutdown signal received");
        signal_shutdown.cancel();
    });

    let worker = Worker::new(worker_id, store, &cfg, shutdown);
    worker.run().await;

    pool.close().await;
    Ok(())
}
