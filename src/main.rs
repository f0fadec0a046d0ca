use queuectl::config::Config;
use queuectl::db;
use queuectl::error::QueueError;
use queuectl::jobs::model::{Job, JobState, ListFilter};
use queuectl::jobs::JobStore;
use queuectl::queue::{EnqueueRequest, QueueManager};
use queuectl::worker::WorkerManager;
use std::env;

fn usage() -> ! {
    eprintln!(
        "queuectl <command>\n\
         Commands:\n\
         - enqueue <command | json>     json shape: {{\"command\": \"...\", \"id\": \"...\", \"max_retries\": 3}}\n\
         - list [--state <state>] [--limit <n>]\n\
         - status\n\
         - dlq list\n\
         - dlq inspect <job-id>\n\
         - dlq retry <job-id>\n\
         - dlq retry-all\n\
         - dlq delete <job-id>\n\
         - dlq clear\n\
         - dlq stats\n\
         - worker start [--count <n>]\n\
         \n\
         Store path comes from QUEUECTL_DB_PATH (default: data/queue.db).\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    queuectl::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage();
    }

    let cfg = Config::from_env()?;

    match args[1].as_str() {
        "enqueue" => {
            let input = args.get(2).unwrap_or_else(|| usage());
            let queue = open_queue(&cfg).await?;
            enqueue(&queue, input).await?;
        }
        "list" => {
            let queue = open_queue(&cfg).await?;
            list(&queue, &args[2..]).await?;
        }
        "status" => {
            let queue = open_queue(&cfg).await?;
            let status = queue.get_status(0).await?;
            let stats = status.stats;
            println!(
                "jobs: pending={} processing={} completed={} failed={} dead={}",
                stats.pending, stats.processing, stats.completed, stats.failed, stats.dead
            );
            println!("active workers: {}", status.active_workers);
        }
        "dlq" => {
            let sub = args.get(2).map(String::as_str).unwrap_or_else(|| usage());
            let queue = open_queue(&cfg).await?;
            dlq(&queue, sub, args.get(3).map(String::as_str)).await?;
        }
        "worker" => match args.get(2).map(String::as_str) {
            Some("start") => {
                let count = flag_value(&args, "--count")
                    .map(|s| s.parse())
                    .transpose()?
                    .unwrap_or(cfg.worker_count);

                let mut manager = WorkerManager::new(cfg.shutdown_grace);
                manager.start_workers(count)?;
                println!("{count} worker(s) started, press Ctrl+C to stop");
                manager.supervise().await?;
            }
            _ => usage(),
        },
        _ => usage(),
    }

    Ok(())
}

async fn open_queue(cfg: &Config) -> anyhow::Result<QueueManager> {
    let pool = db::make_pool(&cfg.db_path).await?;
    db::run_migrations(&pool).await?;
    Ok(QueueManager::new(JobStore::new(pool)))
}

async fn enqueue(queue: &QueueManager, input: &str) -> anyhow::Result<()> {
    // Either a full JSON request or a bare command string.
    let request = if input.trim_start().starts_with('{') {
        serde_json::from_str::<EnqueueRequest>(input)?
    } else {
        EnqueueRequest {
            command: input.to_string(),
            ..Default::default()
        }
    };

    let job = queue.enqueue(request).await?;
    println!(
        "enqueued job {} (state: {}, max_retries: {})",
        job.id, job.state, job.max_retries
    );
    Ok(())
}

async fn list(queue: &QueueManager, rest: &[String]) -> anyhow::Result<()> {
    let state = match flag_value(rest, "--state") {
        Some(s) => Some(
            JobState::parse(s)
                .ok_or_else(|| QueueError::validation(format!("unknown state '{s}'")))?,
        ),
        None => None,
    };
    let limit = flag_value(rest, "--limit")
        .map(|s| s.parse::<i64>())
        .transpose()?;

    let jobs = queue
        .store()
        .list(ListFilter { state, limit })
        .await?;

    if jobs.is_empty() {
        println!("no jobs");
        return Ok(());
    }
    for job in jobs {
        print_job_line(&job);
    }
    Ok(())
}

async fn dlq(queue: &QueueManager, sub: &str, id: Option<&str>) -> anyhow::Result<()> {
    let store = queue.store();

    match sub {
        "list" => {
            let jobs = store.list_dead().await?;
            if jobs.is_empty() {
                println!("dead letter queue is empty");
                return Ok(());
            }
            for job in jobs {
                println!(
                    "{}  attempts={}/{}  failed_at={}  error={}",
                    job.id,
                    job.attempts,
                    job.max_retries,
                    job.updated_at.to_rfc3339(),
                    job.last_error.as_deref().unwrap_or("unknown")
                );
            }
        }
        "inspect" => {
            let id = id.unwrap_or_else(|| usage());
            let job = store.get_dead(id).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        "retry" => {
            let id = id.unwrap_or_else(|| usage());
            let job = queue.retry_from_dlq(id).await?;
            println!(
                "job {} moved from dead to pending (attempts reset to 0/{})",
                job.id, job.max_retries
            );
        }
        "retry-all" => {
            let count = store.retry_all_dead().await?;
            println!("requeued {count} dead job(s)");
        }
        "delete" => {
            let id = id.unwrap_or_else(|| usage());
            store.delete_dead(id).await?;
            println!("job {id} permanently deleted from dead letter queue");
        }
        "clear" => {
            let count = store.clear_dead().await?;
            println!("cleared dead letter queue ({count} job(s) deleted)");
        }
        "stats" => {
            let stats = store.get_dead_stats().await?;
            println!("total dead jobs: {}", stats.total);
            if let Some(oldest) = stats.oldest_dead_at {
                println!("oldest dead job: {}", oldest.to_rfc3339());
            }
            for group in stats.top_errors {
                println!("{:>5}  {}", group.count, group.last_error);
            }
        }
        _ => usage(),
    }

    Ok(())
}

fn print_job_line(job: &Job) {
    println!(
        "{}  {}  attempts={}/{}  created_at={}  command={}",
        job.id,
        job.state,
        job.attempts,
        job.max_retries,
        job.created_at.to_rfc3339(),
        job.command
    );
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
