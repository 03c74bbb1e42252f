//! Balance summary over exchange responses.
//!
//! Mirrors what an attested proof commits to: per-exchange asset totals
//! with stablecoins rolled up under `STABLECOIN`, plus request metadata.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use tracing::warn;

use super::error::SummaryError;
use super::AttestedResponse;
use crate::datasource::{aster, binance};
use crate::types::RequestKind;

pub const SUMMARY_KIND: &str = "asset-balance";
pub const SUMMARY_VERSION: &str = "0.1.0";
pub const STABLECOIN_KEY: &str = "STABLECOIN";

pub const STABLE_COINS: &[&str] = &[
    "USDT", "USDC", "FDUSD", "TUSD", "USDE", "XUSD", "USD1", "BFUSD", "USDP", "DAI", "USDF",
];

/// 1e-11; totals at or below this are dust.
const DUST: Decimal = dec!(0.00000000001);

const EXCHANGES: [&str; 2] = ["binance", "aster"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttestationMeta {
    pub kind: String,
    pub base_urls: Vec<String>,
    /// Earliest request timestamp (ms).
    pub timestamp: Option<u64>,
    pub requests: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PublicValues {
    pub kind: String,
    pub version: String,
    pub project_id: String,
    pub attestation_meta: Vec<AttestationMeta>,
    /// exchange => { asset => balance }
    pub asset_balance: BTreeMap<String, BTreeMap<String, Decimal>>,
    pub status: i16,
}

type Responses = BTreeMap<RequestKind, Vec<AttestedResponse>>;
type Balances = BTreeMap<String, Decimal>;

/// Summarise all responses. Failures are recorded in `status`, not raised.
pub fn summarize(responses: &Responses, project_id: &str) -> PublicValues {
    let mut pv = PublicValues {
        kind: SUMMARY_KIND.to_string(),
        version: SUMMARY_VERSION.to_string(),
        project_id: project_id.to_string(),
        ..Default::default()
    };

    for exchange in EXCHANGES {
        if let Err(e) = summarize_exchange(&mut pv, responses, exchange) {
            warn!(error = %e, code = e.code(), "Balance summary rejected");
            pv.status = e.code();
            break;
        }
    }
    pv
}

fn summarize_exchange(pv: &mut PublicValues, responses: &Responses, exchange: &str) -> Result<(), SummaryError> {
    let mut totals = Balances::new();

    for (kind, resps) in responses.iter().filter(|(k, _)| k.exchange() == exchange) {
        let meta = match kind {
            RequestKind::BinanceSpot => spot(*kind, binance::SPOT_ACCOUNT_URL, "$.uid", resps, &mut totals)?,
            RequestKind::AsterSpot => spot(*kind, aster::SPOT_ACCOUNT_URL, "$.updateTime", resps, &mut totals)?,
            RequestKind::BinanceUsdSFuture => future(*kind, binance::USDS_FUTURE_BALANCE_URL, resps, &mut totals)?,
            RequestKind::AsterUsdSFuture => future(*kind, aster::USDS_FUTURE_BALANCE_URL, resps, &mut totals)?,
            RequestKind::BinanceUnified => unified(*kind, resps, &mut totals)?,
        };
        pv.attestation_meta.push(meta);
    }

    pv.asset_balance.insert(exchange.to_string(), rollup(totals)?);
    Ok(())
}

/// Stablecoins summed under `STABLECOIN`; dust dropped.
fn rollup(totals: Balances) -> Result<Balances, SummaryError> {
    let mut out = Balances::new();
    let mut stable = Decimal::ZERO;
    for (asset, amount) in totals {
        if STABLE_COINS.contains(&asset.as_str()) {
            stable = stable.checked_add(amount).ok_or_else(|| SummaryError::AmountOverflow {
                asset: STABLECOIN_KEY.to_string(),
            })?;
        } else if amount > DUST {
            out.insert(asset, amount);
        }
    }
    if stable > DUST {
        out.insert(STABLECOIN_KEY.to_string(), stable);
    }
    Ok(out)
}

/// Add `a + b` to the running total for `asset`.
fn accumulate(totals: &mut Balances, asset: String, a: Decimal, b: Decimal) -> Result<(), SummaryError> {
    let current = totals.get(&asset).copied().unwrap_or_default();
    let Some(sum) = a.checked_add(b).and_then(|ab| current.checked_add(ab)) else {
        return Err(SummaryError::AmountOverflow { asset });
    };
    totals.insert(asset, sum);
    Ok(())
}

// ---------------------------------------------------------------------------
// Per-kind rules
// ---------------------------------------------------------------------------

fn new_meta(kind: RequestKind, base_urls: &[&str], count: usize) -> AttestationMeta {
    AttestationMeta {
        kind: kind.to_string(),
        base_urls: base_urls.iter().map(|s| s.to_string()).collect(),
        timestamp: None,
        requests: count,
    }
}

/// Spot accounts: `{ <id_path>, balances: [{ asset, free, locked }] }`.
fn spot(
    kind: RequestKind,
    base_url: &str,
    id_path: &str,
    resps: &[AttestedResponse],
    totals: &mut Balances,
) -> Result<AttestationMeta, SummaryError> {
    let mut meta = new_meta(kind, &[base_url], resps.len());
    let mut accounts = Vec::with_capacity(resps.len());
    let id_field = id_path.trim_start_matches("$.");

    for resp in resps {
        track_timestamp(kind, &resp.url, &mut meta)?;
        check_url(kind, &resp.url, base_url)?;

        let id = match resp.body.get(id_field) {
            Some(v) if !v.is_null() => text(v),
            _ => {
                return Err(SummaryError::UnexpectedValueCount {
                    kind,
                    path: id_path.to_string(),
                    expected: 1,
                    found: 0,
                })
            }
        };

        let mut fingerprint = Vec::new();
        for entry in array_at(&resp.body, "balances") {
            let asset = text(field(kind, entry, "$.balances[*].asset", "asset")?).to_ascii_uppercase();
            let free = amount(field(kind, entry, "$.balances[*].free", "free")?);
            let locked = amount(field(kind, entry, "$.balances[*].locked", "locked")?);
            accumulate(totals, asset.clone(), free, locked)?;
            fingerprint.push(format!("{asset}:{}:{}", free.normalize(), locked.normalize()));
        }

        // Aster exposes no account id; the update time plus the balance
        // set stands in for one.
        if kind == RequestKind::AsterSpot {
            fingerprint.sort();
            if !fingerprint.is_empty() {
                accounts.push(format!("{id}:{}", fingerprint.join(",")));
            }
        } else {
            accounts.push(id);
        }
    }

    ensure_unique(kind, accounts)?;
    Ok(meta)
}

/// Futures wallets: `[{ accountAlias, asset, balance, crossUnPnl }]`.
fn future(
    kind: RequestKind,
    base_url: &str,
    resps: &[AttestedResponse],
    totals: &mut Balances,
) -> Result<AttestationMeta, SummaryError> {
    let mut meta = new_meta(kind, &[base_url], resps.len());
    let mut accounts = Vec::with_capacity(resps.len());

    for resp in resps {
        track_timestamp(kind, &resp.url, &mut meta)?;
        check_url(kind, &resp.url, base_url)?;

        let entries = resp.body.as_array().map(Vec::as_slice).unwrap_or_default();
        let Some(alias) = entries.iter().find_map(|e| e.get("accountAlias")) else {
            // Empty wallet: nothing to count.
            continue;
        };
        accounts.push(text(alias));

        for entry in entries {
            let asset = text(field(kind, entry, "$.[*].asset", "asset")?).to_ascii_uppercase();
            let balance = amount(field(kind, entry, "$.[*].balance", "balance")?);
            let pnl = amount(field(kind, entry, "$.[*].crossUnPnl", "crossUnPnl")?);
            accumulate(totals, asset, balance, pnl)?;
        }
    }

    ensure_unique(kind, accounts)?;
    Ok(meta)
}

/// Portfolio margin, strictly `[risk_1, balance_1, risk_2, balance_2, ...]`.
fn unified(kind: RequestKind, resps: &[AttestedResponse], totals: &mut Balances) -> Result<AttestationMeta, SummaryError> {
    if resps.len() % 2 != 0 {
        return Err(SummaryError::OddRequestCount {
            kind,
            count: resps.len(),
        });
    }

    let mut meta = new_meta(
        kind,
        &[binance::UNIFIED_POSITION_RISK_URL, binance::UNIFIED_BALANCE_URL],
        resps.len(),
    );
    let mut accounts = Vec::new();

    for (index, resp) in resps.iter().enumerate() {
        track_timestamp(kind, &resp.url, &mut meta)?;

        if resp.url.starts_with(binance::UNIFIED_POSITION_RISK_URL) {
            if index % 2 != 0 {
                return Err(SummaryError::OutOfOrder { kind, index });
            }
            // Open positions and their entry prices identify the account.
            let mut prices = Vec::new();
            for entry in array_at(&resp.body, "") {
                let symbol = text(field(kind, entry, "$.[*].symbol", "symbol")?).to_ascii_uppercase();
                let price = text(field(kind, entry, "$.[*].entryPrice", "entryPrice")?);
                prices.push(format!("{symbol}:{price}"));
            }
            prices.sort();
            if !prices.is_empty() {
                accounts.push(prices.join(","));
            }
        } else if resp.url.starts_with(binance::UNIFIED_BALANCE_URL) {
            for entry in array_at(&resp.body, "") {
                let asset = text(field(kind, entry, "$.[*].asset", "asset")?).to_ascii_uppercase();
                let wallet = amount(field(kind, entry, "$.[*].totalWalletBalance", "totalWalletBalance")?);
                let pnl = amount(field(kind, entry, "$.[*].umUnrealizedPNL", "umUnrealizedPNL")?);
                accumulate(totals, asset, wallet, pnl)?;
            }
        } else {
            return Err(SummaryError::UnexpectedUrl {
                kind,
                url: strip_query(&resp.url),
            });
        }
    }

    ensure_unique(kind, accounts)?;
    Ok(meta)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn track_timestamp(kind: RequestKind, url: &str, meta: &mut AttestationMeta) -> Result<(), SummaryError> {
    let raw = url
        .split("timestamp=")
        .nth(1)
        .and_then(|s| s.split('&').next())
        .filter(|s| !s.is_empty())
        .ok_or(SummaryError::MissingTimestamp { kind })?;
    let ts: u64 = raw.parse().map_err(|_| SummaryError::InvalidTimestamp { kind })?;
    meta.timestamp = Some(meta.timestamp.map_or(ts, |cur| cur.min(ts)));
    Ok(())
}

fn check_url(kind: RequestKind, url: &str, base_url: &str) -> Result<(), SummaryError> {
    if url.starts_with(base_url) {
        Ok(())
    } else {
        Err(SummaryError::UnexpectedUrl {
            kind,
            url: strip_query(url),
        })
    }
}

fn strip_query(url: &str) -> String {
    url.split('?').next().unwrap_or_default().to_string()
}

fn ensure_unique(kind: RequestKind, accounts: Vec<String>) -> Result<(), SummaryError> {
    let mut seen = HashSet::new();
    match accounts.into_iter().find(|a| !seen.insert(a.clone())) {
        Some(account) => Err(SummaryError::DuplicateAccount { kind, account }),
        None => Ok(()),
    }
}

/// Array at `key` (or the body itself for ""); anything else is empty.
fn array_at<'a>(body: &'a Value, key: &str) -> &'a [Value] {
    let v = if key.is_empty() { Some(body) } else { body.get(key) };
    v.and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}

fn field<'a>(kind: RequestKind, entry: &'a Value, path: &str, key: &str) -> Result<&'a Value, SummaryError> {
    entry.get(key).ok_or_else(|| SummaryError::MissingField {
        kind,
        path: path.to_string(),
    })
}

fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Exchange amounts arrive as strings or numbers; unparsable counts as zero.
fn amount(v: &Value) -> Decimal {
    let s = text(v);
    Decimal::from_str(&s)
        .or_else(|_| Decimal::from_scientific(&s))
        .unwrap_or(Decimal::ZERO)
}
