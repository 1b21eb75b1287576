//! eventq CLI: run the event queue and worker pool over a JSON-lines feed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use eventq::config::Config;
use eventq::engine::WorkerPool;
use eventq::error::Error;
use eventq::model::EventRequest;
use eventq::pipeline::{FileSink, ProcessingPipeline};
use eventq::queue::EventQueue;
use eventq::report::MetricsReporter;
use eventq::telemetry::{TelemetryConfig, init_telemetry, metrics};
use opentelemetry::KeyValue;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "eventq", about = "Bounded event queue with a concurrency-limited worker pool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the queue and worker pool, feeding it event requests
    Serve {
        /// TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSON-lines file of event requests ("-" for stdin)
        #[arg(long, default_value = "-")]
        input: String,
        /// Override the queue capacity
        #[arg(long)]
        queue_capacity: Option<usize>,
        /// Override the number of concurrent workers
        #[arg(long)]
        max_workers: Option<usize>,
        /// Override the file processed events are appended to
        #[arg(long)]
        processed_events_file: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config {
        /// TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Tally of what happened to each input line.
#[derive(Debug, Default)]
struct FeedStats {
    accepted: u64,
    rejected: u64,
    invalid: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            input,
            queue_capacity,
            max_workers,
            processed_events_file,
        } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(capacity) = queue_capacity {
                config.queue_capacity = capacity;
            }
            if let Some(workers) = max_workers {
                config.max_workers = workers;
            }
            if let Some(path) = processed_events_file {
                config.processed_events_file = path;
            }
            config.validate()?;
            cmd_serve(config, input).await
        }
        Command::Config { config } => cmd_config(config.as_deref()),
    }
}

async fn cmd_serve(config: Config, input: String) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "eventq".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let queue = Arc::new(EventQueue::new(config.queue_capacity)?);
    let sink = Arc::new(FileSink::new(&config.processed_events_file));
    let pipeline = Arc::new(ProcessingPipeline::new(sink));
    let pool = WorkerPool::new(
        Arc::clone(&queue),
        pipeline,
        Arc::new(MetricsReporter::new()),
        config.pool_config(),
    )?;

    info!(
        max_workers = config.max_workers,
        queue_capacity = config.queue_capacity,
        processed_events_file = %config.processed_events_file.display(),
        "starting event processing"
    );
    let runner = pool.spawn();

    let interrupted = tokio::select! {
        stats = feed(&queue, &input) => {
            let stats = stats?;
            info!(
                accepted = stats.accepted,
                rejected = stats.rejected,
                invalid = stats.invalid,
                "input exhausted, draining queue"
            );
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };

    if !interrupted {
        drain(&pool).await;
    } else {
        warn!("caught interrupt signal");
    }

    let stats = queue.stats();
    info!(
        queue_size = stats.queue_size,
        capacity = stats.capacity,
        pending_events = pool.pending_events(),
        "shutting down event processing"
    );
    pool.shutdown(config.shutdown_timeout()).await?;
    runner.await??;
    info!("stopped event processing");
    Ok(())
}

/// Wait until every admitted event has reached an outcome, or Ctrl-C.
async fn drain(pool: &WorkerPool) {
    let mut idle_checks = 0;
    let mut ticks: u32 = 0;
    while idle_checks < 2 {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            _ = tokio::signal::ctrl_c() => {
                warn!("caught interrupt signal while draining");
                return;
            }
        }
        idle_checks = if pool.is_idle() { idle_checks + 1 } else { 0 };

        ticks = ticks.wrapping_add(1);
        if ticks % 20 == 0 {
            let stats = pool.queue().stats();
            debug!(
                queue_size = stats.queue_size,
                capacity = stats.capacity,
                pending_events = pool.pending_events(),
                active_tasks = pool.active_tasks(),
                "draining queue"
            );
        }
    }
}

async fn feed(queue: &EventQueue, input: &str) -> anyhow::Result<FeedStats> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = if input == "-" {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        Box::new(BufReader::new(tokio::fs::File::open(input).await?))
    };

    let rejected = metrics::queue_rejected();
    let mut stats = FeedStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = match EventRequest::from_json(line).and_then(EventRequest::into_event) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "rejected invalid event request");
                stats.invalid += 1;
                continue;
            }
        };

        let event_id = event.id();
        let event_type = event.event_type();
        match queue.enqueue(event) {
            Ok(()) => {
                info!(event_id = %event_id, event_type = %event_type, "creating new event");
                stats.accepted += 1;
            }
            Err(Error::QueueFull { capacity }) => {
                warn!(event_id = %event_id, capacity, "event queue is full, event rejected");
                rejected.add(1, &[KeyValue::new("event_type", event_type.as_str())]);
                stats.rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(stats)
}

fn cmd_config(path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(path)?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
