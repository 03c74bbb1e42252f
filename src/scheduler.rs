//! Repeating task runner with persisted state and a stop predicate.
//!
//! Runs a task every `interval`, one run at a time. After each run the
//! state (counters, last/next run, last error) is written to the optional
//! state file; on restart a `next_run_at` still in the future delays the
//! first run so the cadence survives crashes. A failed run whose error
//! matches the stop predicate halts the schedule.

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use crate::config::MAX_INTERVAL_SECS;
use crate::storage;
use crate::types::{PorError, TIMEOUT_CODE};

pub type TaskFuture = BoxFuture<'static, Result<(), PorError>>;

type StopPredicate = Box<dyn Fn(&PorError) -> bool + Send + Sync>;

/// Stop when the error carries `data.code == "timeout"`.
pub fn is_timeout_error(err: &PorError) -> bool {
    err.data().is_some_and(|d| d.code == TIMEOUT_CODE)
}

/// What the scheduler persists between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerState {
    pub run_count: u64,
    pub failure_count: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    #[serde(default)]
    pub halted: bool,
}

#[derive(Debug)]
pub enum StopReason {
    /// Shutdown signal received.
    Shutdown,
    /// A run failed with an error matching the stop predicate.
    Halted(PorError),
    /// The configured run limit was reached.
    MaxRuns,
}

#[derive(Debug)]
pub struct SchedulerOutcome {
    pub runs: u64,
    pub reason: StopReason,
}

pub struct Scheduler<F> {
    task: F,
    interval: Duration,
    state_file: Option<PathBuf>,
    stop_when: StopPredicate,
    max_runs: Option<u64>,
}

impl<F> Scheduler<F>
where
    F: FnMut() -> TaskFuture + Send,
{
    /// `interval` is capped at `MAX_INTERVAL_SECS`.
    pub fn new(task: F, interval: Duration) -> Self {
        Self {
            task,
            interval: interval.min(Duration::from_secs(MAX_INTERVAL_SECS)),
            state_file: None,
            stop_when: Box::new(|_| false),
            max_runs: None,
        }
    }

    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    pub fn stop_when(mut self, predicate: impl Fn(&PorError) -> bool + Send + Sync + 'static) -> Self {
        self.stop_when = Box::new(predicate);
        self
    }

    pub fn with_max_runs(mut self, max_runs: u64) -> Self {
        self.max_runs = Some(max_runs);
        self
    }

    fn load_state(&self) -> Result<SchedulerState> {
        let Some(path) = &self.state_file else {
            return Ok(SchedulerState::default());
        };
        let mut state: SchedulerState = storage::load_json(path)?.unwrap_or_default();
        if state.halted {
            warn!(
                last_error = ?state.last_error,
                "Previous schedule was halted; resuming on restart"
            );
            state.halted = false;
        }
        Ok(state)
    }

    fn save_state(&self, state: &SchedulerState) {
        if let Some(path) = &self.state_file {
            if let Err(e) = storage::save_json(state, path) {
                warn!(error = %format!("{e:#}"), "Failed to save scheduler state");
            }
        }
    }

    /// Delay before the first run, from a persisted `next_run_at`.
    fn initial_delay(&self, state: &SchedulerState, now: DateTime<Utc>) -> Duration {
        state
            .next_run_at
            .and_then(|next| (next - now).to_std().ok())
            .map(|d| d.min(self.interval))
            .unwrap_or(Duration::ZERO)
    }

    /// Run until shutdown, a halting error, or the run limit.
    pub async fn run<S>(mut self, shutdown: S) -> Result<SchedulerOutcome>
    where
        S: Future<Output = ()>,
    {
        let mut state = self.load_state()?;
        let delay = self.initial_delay(&state, Utc::now());
        if !delay.is_zero() {
            info!(delay_secs = delay.as_secs(), "Resuming schedule from saved state");
        }

        tokio::pin!(shutdown);
        let mut next = Instant::now().checked_add(delay).unwrap_or_else(Instant::now);
        let mut runs = 0u64;

        loop {
            tokio::select! {
                _ = sleep_until(next) => {}
                _ = &mut shutdown => {
                    self.save_state(&state);
                    return Ok(SchedulerOutcome { runs, reason: StopReason::Shutdown });
                }
            }

            let started = Instant::now();
            let result = tokio::select! {
                r = (self.task)() => r,
                _ = &mut shutdown => {
                    self.save_state(&state);
                    return Ok(SchedulerOutcome { runs, reason: StopReason::Shutdown });
                }
            };

            runs += 1;
            state.run_count += 1;
            state.last_run_at = Some(Utc::now());

            match result {
                Ok(()) => state.last_error = None,
                Err(e) => {
                    state.failure_count += 1;
                    state.last_error = Some(e.to_string());
                    if (self.stop_when)(&e) {
                        warn!(error = %e, runs, "Stop condition met; halting schedule");
                        state.halted = true;
                        state.next_run_at = None;
                        self.save_state(&state);
                        return Ok(SchedulerOutcome {
                            runs,
                            reason: StopReason::Halted(e),
                        });
                    }
                }
            }

            // Skip ticks missed by a long run instead of bursting.
            let now = Instant::now();
            next = started.checked_add(self.interval).unwrap_or(now).max(now);
            let until_next = next.saturating_duration_since(now);
            state.next_run_at = chrono::Duration::from_std(until_next)
                .ok()
                .and_then(|d| Utc::now().checked_add_signed(d));
            self.save_state(&state);

            if self.max_runs.is_some_and(|max| runs >= max) {
                return Ok(SchedulerOutcome {
                    runs,
                    reason: StopReason::MaxRuns,
                });
            }
        }
    }
}
