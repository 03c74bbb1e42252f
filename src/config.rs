//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Exchange secrets are referenced by env-var name in the config and
//! resolved at runtime when the data sources are built.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Polling interval used when nothing else is configured.
pub const DEFAULT_INTERVAL_SECS: u64 = 1800;

/// State file handed to the scheduler when none is configured.
pub const DEFAULT_STATE_FILE: &str = ".state.json";

/// Three days.
pub const DEFAULT_WITHDRAW_INTERVAL_SECS: u64 = 3 * 24 * 60 * 60;

/// Upper bound for any interval or cooldown (100 years). Larger values
/// overflow deadline arithmetic.
pub const MAX_INTERVAL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default, alias = "datasource")]
    pub exchanges: ExchangesConfig,
    pub app: AppSettings,
    #[serde(default)]
    pub withdraw: WithdrawConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Per-exchange credentials. An absent section means no client is built.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExchangesConfig {
    #[serde(default)]
    pub binance: Option<ExchangeAccounts>,
    #[serde(default)]
    pub aster: Option<ExchangeAccounts>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeAccounts {
    pub accounts: Vec<AccountCredentials>,
    /// `recvWindow` for signed requests (milliseconds, 0 = omit).
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccountCredentials {
    /// Free-form label used in logs only.
    #[serde(default)]
    pub label: Option<String>,
    pub api_key_env: String,
    pub api_secret_env: String,
}

/// Settings handed to the proof client.
#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    /// Base URL of the attestation service.
    pub endpoint: String,
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Upper bound for one proof run round-trip.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RuntimeConfig {
    /// Seconds between runs.
    #[serde(default, rename = "jobInterval", alias = "job_interval")]
    pub job_interval: Option<u64>,
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub state_file: Option<String>,
}

impl RuntimeConfig {
    /// State file path; only the scheduler persists state.
    pub fn state_file(&self) -> Option<&str> {
        match self.mode {
            RunMode::Timer => None,
            RunMode::Scheduler => Some(self.state_file.as_deref().unwrap_or(DEFAULT_STATE_FILE)),
        }
    }
}

/// How repetition is driven.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Fixed timer; errors are logged and the process keeps going.
    #[default]
    Timer,
    /// Scheduler with persisted state and a timeout stop predicate.
    Scheduler,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WithdrawConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_withdraw_interval")]
    pub interval_secs: u64,
}

impl Default for WithdrawConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: DEFAULT_WITHDRAW_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_dashboard_port(),
        }
    }
}

fn default_recv_window() -> u64 {
    60_000
}

fn default_request_timeout() -> u64 {
    900
}

fn default_withdraw_interval() -> u64 {
    DEFAULT_WITHDRAW_INTERVAL_SECS
}

fn default_dashboard_port() -> u16 {
    8787
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(secs) = self.app.runtime.job_interval {
            if secs > MAX_INTERVAL_SECS {
                bail!("app.runtime.jobInterval {secs} exceeds the maximum of {MAX_INTERVAL_SECS} s");
            }
        }
        if self.withdraw.interval_secs > MAX_INTERVAL_SECS {
            bail!(
                "withdraw.interval_secs {} exceeds the maximum of {MAX_INTERVAL_SECS} s",
                self.withdraw.interval_secs
            );
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name).with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Effective interval for this process, honouring `INTERVAL`.
    pub fn interval_secs(&self, cli: Option<u64>) -> u64 {
        let env = std::env::var("INTERVAL").ok();
        resolve_interval(cli, env.as_deref(), self.app.runtime.job_interval)
    }
}

/// Interval precedence: CLI flag, `INTERVAL` env, `app.runtime.jobInterval`,
/// default. Zero, unparsable and out-of-range values are skipped.
pub fn resolve_interval(cli: Option<u64>, env: Option<&str>, config: Option<u64>) -> u64 {
    let env = env.and_then(|v| v.trim().parse::<u64>().ok());
    [cli, env, config]
        .into_iter()
        .flatten()
        .find(|secs| {
            if *secs > MAX_INTERVAL_SECS {
                warn!(secs = *secs, max = MAX_INTERVAL_SECS, "Ignoring out-of-range interval");
                return false;
            }
            *secs > 0
        })
        .unwrap_or(DEFAULT_INTERVAL_SECS)
}
