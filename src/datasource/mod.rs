//! Exchange data sources.
//!
//! Each source holds the signed accounts of one exchange and builds the
//! balance-query request descriptors the attestor replays. Building is
//! synchronous and cheap; every call stamps fresh timestamps.

pub mod aster;
pub mod binance;
pub mod signing;

use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{AppConfig, ExchangeAccounts, ExchangesConfig};
use crate::types::PorError;

pub use aster::AsterSource;
pub use binance::BinanceSource;
pub use signing::SignedAccount;

/// Millisecond wall clock used to stamp requests.
pub type TimestampFn = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> TimestampFn {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

/// Holds one client per configured exchange.
#[derive(Default)]
pub struct ExchangeManager {
    pub binance: Option<BinanceSource>,
    pub aster: Option<AsterSource>,
}

impl ExchangeManager {
    /// Build clients for every exchange present in config, resolving
    /// credentials from the environment.
    pub fn from_config(cfg: &ExchangesConfig) -> Result<Self, PorError> {
        Self::from_config_with_clock(cfg, system_clock())
    }

    pub fn from_config_with_clock(cfg: &ExchangesConfig, clock: TimestampFn) -> Result<Self, PorError> {
        let binance = cfg
            .binance
            .as_ref()
            .map(|b| -> Result<BinanceSource, PorError> {
                Ok(BinanceSource::new(resolve_accounts("binance", b)?, b.recv_window, clock.clone()))
            })
            .transpose()?;

        let aster = cfg
            .aster
            .as_ref()
            .map(|a| -> Result<AsterSource, PorError> {
                Ok(AsterSource::new(resolve_accounts("aster", a)?, a.recv_window, clock.clone()))
            })
            .transpose()?;

        info!(
            binance_accounts = binance.as_ref().map_or(0, |b| b.account_count()),
            aster_accounts = aster.as_ref().map_or(0, |a| a.account_count()),
            "Exchange data sources ready"
        );

        Ok(Self { binance, aster })
    }
}

fn resolve_accounts(exchange: &str, cfg: &ExchangeAccounts) -> Result<Vec<SignedAccount>, PorError> {
    if cfg.accounts.is_empty() {
        return Err(PorError::DataSource {
            exchange: exchange.to_string(),
            message: "no accounts configured".to_string(),
        });
    }

    cfg.accounts
        .iter()
        .enumerate()
        .map(|(idx, acct)| {
            let resolve = |env: &str| {
                AppConfig::resolve_env(env).map_err(|e| PorError::DataSource {
                    exchange: exchange.to_string(),
                    message: format!("{e:#}"),
                })
            };
            let api_key = resolve(&acct.api_key_env)?;
            let api_secret = resolve(&acct.api_secret_env)?;
            let label = acct.label.clone().unwrap_or_else(|| format!("{exchange}-{idx}"));
            debug!(exchange, label = %label, "Resolved account credentials");
            Ok(SignedAccount::new(label, SecretString::new(api_key), SecretString::new(api_secret)))
        })
        .collect()
}
