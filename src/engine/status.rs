//! Live run status shared between the job and the dashboard.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::types::PorError;

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub started_at: DateTime<Utc>,
    pub mode: String,
    pub interval_secs: u64,
    pub runs: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_code: Option<String>,
    pub withdrawals: u64,
    pub last_withdraw_at: Option<DateTime<Utc>>,
    pub next_withdraw_eligible_at: Option<DateTime<Utc>>,
}

pub struct RunStatus {
    snapshot: RwLock<StatusSnapshot>,
    last_fixture: RwLock<Option<serde_json::Value>>,
}

impl RunStatus {
    pub fn new(mode: &str, interval_secs: u64) -> Self {
        Self {
            snapshot: RwLock::new(StatusSnapshot {
                started_at: Utc::now(),
                mode: mode.to_string(),
                interval_secs,
                runs: 0,
                successes: 0,
                failures: 0,
                last_run_at: None,
                last_success_at: None,
                next_run_at: None,
                last_error: None,
                last_error_code: None,
                withdrawals: 0,
                last_withdraw_at: None,
                next_withdraw_eligible_at: None,
            }),
            last_fixture: RwLock::new(None),
        }
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn last_fixture(&self) -> Option<serde_json::Value> {
        self.last_fixture.read().await.clone()
    }

    pub async fn record_success(&self, at: DateTime<Utc>, fixture: serde_json::Value) {
        {
            let mut s = self.snapshot.write().await;
            s.runs += 1;
            s.successes += 1;
            s.last_run_at = Some(at);
            s.last_success_at = Some(at);
            s.last_error = None;
            s.last_error_code = None;
        }
        *self.last_fixture.write().await = Some(fixture);
    }

    pub async fn record_failure(&self, at: DateTime<Utc>, err: &PorError) {
        let mut s = self.snapshot.write().await;
        s.runs += 1;
        s.failures += 1;
        s.last_run_at = Some(at);
        s.last_error = Some(err.to_string());
        s.last_error_code = err.data().map(|d| d.code.clone());
    }

    pub async fn record_withdraw(&self, at: DateTime<Utc>, next_eligible: DateTime<Utc>) {
        let mut s = self.snapshot.write().await;
        s.withdrawals += 1;
        s.last_withdraw_at = Some(at);
        s.next_withdraw_eligible_at = Some(next_eligible);
    }

    pub async fn set_withdraw_eligible(&self, next_eligible: DateTime<Utc>) {
        self.snapshot.write().await.next_withdraw_eligible_at = Some(next_eligible);
    }

    pub async fn set_next_run(&self, at: DateTime<Utc>) {
        self.snapshot.write().await.next_run_at = Some(at);
    }
}
