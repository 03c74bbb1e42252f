//! por-runner: periodic proof-of-reserves runner.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the proof client and runs the job on a timer or under the
//! scheduler with graceful shutdown.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use por_runner::client::remote::RemoteProofClient;
use por_runner::config::{AppConfig, RunMode};
use por_runner::dashboard;
use por_runner::datasource::ExchangeManager;
use por_runner::engine::{run_on_timer, scheduler_task, ConfigSource, Job, RunStatus};
use por_runner::params::ParamMap;
use por_runner::preview;
use por_runner::scheduler::{is_timeout_error, Scheduler, StopReason};
use por_runner::withdraw::WithdrawGate;

#[derive(Debug, Parser)]
#[command(name = "por-runner", version, about = "Periodic proof-of-reserves runner")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, short, default_value = "config.toml")]
    config: PathBuf,

    /// Seconds between runs; overrides `INTERVAL` and the config file.
    #[arg(long)]
    interval: Option<u64>,

    /// Log filter, e.g. `debug` or `por_runner=trace`.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run proofs repeatedly (default).
    Run {
        /// Run a single proof and exit.
        #[arg(long)]
        once: bool,
    },
    /// Fetch balances directly and print the summary a proof would commit to.
    Preview,
    /// Attempt a withdrawal now, ignoring the cooldown.
    Withdraw,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let cfg = AppConfig::load(&cli.config)?;
    let command = cli.command.unwrap_or(Command::Run { once: false });

    match command {
        Command::Run { once } => run(&cli.config, cfg, cli.interval, once).await,
        Command::Preview => run_preview(&cfg).await,
        Command::Withdraw => {
            let job = build_job(&cli.config, &cfg, cli.interval).await?;
            let ok = job.withdraw_now().await?;
            info!(success = ok, "Withdrawal attempted");
            Ok(())
        }
    }
}

async fn build_job(config_path: &Path, cfg: &AppConfig, cli_interval: Option<u64>) -> Result<Job> {
    let interval_secs = cfg.interval_secs(cli_interval);
    let client = RemoteProofClient::new(&cfg.app)?;
    let status = Arc::new(RunStatus::new(mode_name(cfg.app.runtime.mode), interval_secs));

    let mut job = Job::new(
        ConfigSource::File(config_path.to_path_buf()),
        Arc::new(client),
        Duration::from_secs(interval_secs),
    )
    .with_status(status);

    if cfg.withdraw.enabled {
        let gate = WithdrawGate::from_secs(Utc::now(), cfg.withdraw.interval_secs);
        info!(
            cooldown_secs = cfg.withdraw.interval_secs,
            next_eligible = %gate.next_eligible().to_rfc3339(),
            "Withdrawal gate armed"
        );
        job = job.with_withdraw_gate(gate);
        job.publish_withdraw_gate().await;
    }
    Ok(job)
}

async fn run(config_path: &Path, cfg: AppConfig, cli_interval: Option<u64>, once: bool) -> Result<()> {
    let job = Arc::new(build_job(config_path, &cfg, cli_interval).await?);
    let interval_secs = job.interval().as_secs();
    info!(
        interval_secs,
        mode = mode_name(cfg.app.runtime.mode),
        "The interval is {interval_secs} s"
    );

    if once {
        let fixture = job.run_once().await?;
        println!("{}", serde_json::to_string_pretty(&fixture)?);
        return Ok(());
    }

    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(job.status(), cfg.dashboard.port).await?;
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    match cfg.app.runtime.mode {
        RunMode::Timer => {
            let runs = run_on_timer(job, shutdown).await;
            info!(runs, "por-runner shut down cleanly.");
        }
        RunMode::Scheduler => {
            let mut scheduler = Scheduler::new(scheduler_task(job), Duration::from_secs(interval_secs))
                .stop_when(is_timeout_error);
            if let Some(path) = cfg.app.runtime.state_file() {
                info!(state_file = path, "Persisting scheduler state");
                scheduler = scheduler.with_state_file(path);
            }

            let outcome = scheduler.run(shutdown).await.context("Scheduler failed")?;
            match outcome.reason {
                StopReason::Shutdown => info!(runs = outcome.runs, "Shutdown signal received."),
                StopReason::MaxRuns => info!(runs = outcome.runs, "Run limit reached."),
                StopReason::Halted(e) => {
                    warn!(runs = outcome.runs, error = %e.message(), detail = %e.to_json(), "Scheduler halted");
                }
            }
        }
    }

    Ok(())
}

async fn run_preview(cfg: &AppConfig) -> Result<()> {
    let ds = Arc::new(ExchangeManager::from_config(&cfg.exchanges)?);
    let requests = ParamMap::for_exchanges(ds).resolve();
    let http = preview::http_client()?;
    let project_id = cfg.app.project_id.as_deref().unwrap_or_default();

    let pv = preview::preview(&http, &requests, project_id).await?;
    if pv.status != 0 {
        warn!(status = pv.status, "Balance summary rejected");
    }
    println!("{}", serde_json::to_string_pretty(&pv)?);
    Ok(())
}

fn mode_name(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Timer => "timer",
        RunMode::Scheduler => "scheduler",
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging(level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("por_runner=info")),
    };

    let json_logging = std::env::var("POR_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
