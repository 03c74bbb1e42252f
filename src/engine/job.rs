//! The proof job: config → data sources → params → `client.run` → log.
//!
//! Two error policies wrap the same run. The timer policy logs and
//! swallows every error; the scheduler policy logs and hands the error back
//! so the scheduler's stop predicate can inspect it. Both consult the
//! withdrawal gate on failure.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::status::RunStatus;
use crate::client::ProofClient;
use crate::config::{AppConfig, MAX_INTERVAL_SECS};
use crate::datasource::ExchangeManager;
use crate::params::ParamMap;
use crate::scheduler::TaskFuture;
use crate::types::PorError;
use crate::withdraw::WithdrawGate;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Where each run reads its configuration from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Re-read on every run.
    File(PathBuf),
    Fixed(AppConfig),
}

impl ConfigSource {
    pub fn load(&self) -> Result<AppConfig> {
        match self {
            ConfigSource::File(path) => AppConfig::load(path),
            ConfigSource::Fixed(cfg) => Ok(cfg.clone()),
        }
    }
}

pub struct Job {
    config: ConfigSource,
    client: Arc<dyn ProofClient>,
    interval: Duration,
    withdraw: Option<Mutex<WithdrawGate>>,
    status: Arc<RunStatus>,
    clock: Clock,
}

impl Job {
    pub fn new(config: ConfigSource, client: Arc<dyn ProofClient>, interval: Duration) -> Self {
        let interval = interval.min(Duration::from_secs(MAX_INTERVAL_SECS));
        Self {
            config,
            client,
            interval,
            withdraw: None,
            status: Arc::new(RunStatus::new("timer", interval.as_secs())),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_withdraw_gate(mut self, gate: WithdrawGate) -> Self {
        self.withdraw = Some(Mutex::new(gate));
        self
    }

    pub fn with_status(mut self, status: Arc<RunStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn status(&self) -> Arc<RunStatus> {
        self.status.clone()
    }

    /// Publish the gate's next eligible time to the status before the
    /// first run.
    pub async fn publish_withdraw_gate(&self) {
        if let Some(gate) = &self.withdraw {
            let next = gate.lock().await.next_eligible();
            self.status.set_withdraw_eligible(next).await;
        }
    }

    /// A single proof run. Returns the decoded fixture.
    pub async fn run_once(&self) -> Result<serde_json::Value, PorError> {
        let run_id = Uuid::new_v4();
        let now = (self.clock)();
        info!(%run_id, now = %now.to_rfc3339(), "Starting proof run");

        let cfg = self.config.load()?;
        let ds = Arc::new(ExchangeManager::from_config(&cfg.exchanges)?);
        let params = ParamMap::for_exchanges(ds);

        let result = self.client.run(&params).await?;
        let fixture = result.decode_fixture()?;
        info!(%run_id, fixture = %fixture, "proof fixture(json)");

        self.status.record_success(now, fixture.clone()).await;
        Ok(fixture)
    }

    /// Timer policy: never fails.
    pub async fn run_guarded(&self) {
        if let Err(e) = self.run_once().await {
            self.handle_failure(&e).await;
        }
        self.log_next_run().await;
    }

    /// Scheduler policy: logs, then returns the error to the scheduler.
    pub async fn run_for_scheduler(&self) -> Result<(), PorError> {
        let result = self.run_once().await.map(|_| ());
        if let Err(e) = &result {
            self.handle_failure(e).await;
        }
        self.log_next_run().await;
        result
    }

    /// Attempt a withdrawal regardless of the gate, recording success.
    pub async fn withdraw_now(&self) -> Result<bool, PorError> {
        let ok = self.client.try_withdraw_balance().await?;
        if ok {
            let at = (self.clock)();
            if let Some(gate) = &self.withdraw {
                let mut gate = gate.lock().await;
                gate.record_success(at);
                self.status.record_withdraw(at, gate.next_eligible()).await;
            }
        }
        Ok(ok)
    }

    async fn handle_failure(&self, err: &PorError) {
        let now = (self.clock)();
        error!(error = %err.message(), detail = %err.to_json(), "Proof run failed");
        self.status.record_failure(now, err).await;

        let Some(gate) = &self.withdraw else {
            return;
        };

        // Held across the attempt so concurrent failures cannot double-withdraw.
        let mut gate = gate.lock().await;
        if !gate.should_attempt(now) {
            debug!(next_eligible = %gate.next_eligible().to_rfc3339(), "Withdrawal cooldown active");
            return;
        }

        info!(last_withdraw = %gate.last_withdraw().to_rfc3339(), "Withdrawal cooldown elapsed; attempting withdrawal");
        match self.client.try_withdraw_balance().await {
            Ok(true) => {
                let at = (self.clock)();
                gate.record_success(at);
                self.status.record_withdraw(at, gate.next_eligible()).await;
                info!(next_eligible = %gate.next_eligible().to_rfc3339(), "Withdrawal succeeded");
            }
            Ok(false) => warn!("Withdrawal attempt reported no success"),
            Err(e) => warn!(error = %e, detail = %e.to_json(), "Withdrawal attempt failed"),
        }
    }

    async fn log_next_run(&self) {
        let secs = self.interval.as_secs();
        let next = chrono::Duration::from_std(self.interval)
            .ok()
            .and_then(|d| (self.clock)().checked_add_signed(d));
        if let Some(next) = next {
            self.status.set_next_run(next).await;
        }
        info!(next_in_secs = secs, "Next run in {secs} s");
    }
}

/// Adapt a job into a scheduler task.
pub fn scheduler_task(job: Arc<Job>) -> impl FnMut() -> TaskFuture + Send {
    move || {
        let job = job.clone();
        let fut: TaskFuture = Box::pin(async move { job.run_for_scheduler().await });
        fut
    }
}
