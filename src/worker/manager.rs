use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

pub struct WorkerHandle {
    pub id: u32,
    pub pid: u32,
    child: Child,
}

/// Supervisor for a pool of worker processes. Owns the only list of handles;
/// workers never talk to it, they only share the store.
///
/// Exited children are logged and dropped from the list. No auto-restart.
pub struct WorkerManager {
    workers: Vec<WorkerHandle>,
    shutdown_grace: Duration,
}

impl WorkerManager {
    pub fn new(shutdown_grace: Duration) -> Self {
        Self {
            workers: Vec::new(),
            shutdown_grace,
        }
    }

    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Spawn `count` worker processes, each an isolated execution context
    /// running the worker loop against the shared store.
    pub fn start_workers(&mut self, count: u32) -> anyhow::Result<()> {
        let binary = worker_binary_path()?;

        for id in 1..=count {
            let child = Command::new(&binary)
                .arg(id.to_string())
                .spawn()
                .with_context(|| format!("failed to spawn {}", binary.display()))?;

            let pid = child.id().unwrap_or_default();
            info!(worker = id, pid, "started worker process");

            self.workers.push(WorkerHandle { id, pid, child });
        }

        Ok(())
    }

    /// Watch the pool until an operator signal arrives or every worker has
    /// exited. Interrupt and terminate both route to `stop_workers`.
    pub async fn supervise(&mut self) -> anyhow::Result<()> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut tick = tokio::time::interval(Duration::from_millis(500));

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("interrupt received, stopping workers");
                    self.stop_workers().await;
                    break;
                }
                _ = sigterm.recv() => {
                    info!("terminate received, stopping workers");
                    self.stop_workers().await;
                    break;
                }
                _ = tick.tick() => {
                    self.reap_exited();
                    if self.workers.is_empty() {
                        info!("all workers exited");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    fn reap_exited(&mut self) {
        self.workers.retain_mut(|worker| match worker.child.try_wait() {
            Ok(Some(status)) => {
                warn!(worker = worker.id, pid = worker.pid, %status, "worker exited");
                false
            }
            Ok(None) => true,
            Err(e) => {
                error!(worker = worker.id, pid = worker.pid, error = %e, "failed to poll worker");
                true
            }
        });
    }

    /// Graceful-then-forceful shutdown: SIGTERM to every tracked worker, a
    /// fixed grace period for in-flight jobs to record their outcome, then
    /// SIGKILL to anything still running.
    pub async fn stop_workers(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        for worker in &self.workers {
            info!(worker = worker.id, pid = worker.pid, "sending terminate signal");
            terminate_process(worker.pid);
        }

        tokio::time::sleep(self.shutdown_grace).await;

        for worker in &mut self.workers {
            match worker.child.try_wait() {
                Ok(Some(status)) => {
                    info!(worker = worker.id, pid = worker.pid, %status, "worker stopped");
                }
                _ => {
                    warn!(worker = worker.id, pid = worker.pid, "worker still running, killing");
                    let _ = worker.child.start_kill();
                    let _ = worker.child.wait().await;
                }
            }
        }

        self.workers.clear();
    }
}

/// The worker binary ships next to the CLI binary.
fn worker_binary_path() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot resolve current executable")?;
    let dir = exe
        .parent()
        .context("executable has no parent directory")?;
    Ok(dir.join("queuectl-worker"))
}

#[cfg(unix)]
fn terminate_process(pid: u32) {
    let _ = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status();
}

#[cfg(not(unix))]
fn terminate_process(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status();
}
