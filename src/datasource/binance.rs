//! Binance balance requests.
//!
//! Spot: `GET /api/v3/account`
//! USDⓈ-M futures: `GET /fapi/v3/balance`
//! Portfolio margin (unified): `GET /papi/v1/um/positionRisk` followed by
//! `GET /papi/v1/balance`, per account, in that order.

use super::{SignedAccount, TimestampFn};
use crate::types::RequestDescriptor;

pub const SPOT_ACCOUNT_URL: &str = "https://api.binance.com/api/v3/account";
pub const USDS_FUTURE_BALANCE_URL: &str = "https://fapi.binance.com/fapi/v3/balance";
pub const UNIFIED_POSITION_RISK_URL: &str = "https://papi.binance.com/papi/v1/um/positionRisk";
pub const UNIFIED_BALANCE_URL: &str = "https://papi.binance.com/papi/v1/balance";

pub struct BinanceSource {
    accounts: Vec<SignedAccount>,
    recv_window: u64,
    clock: TimestampFn,
}

impl BinanceSource {
    pub fn new(accounts: Vec<SignedAccount>, recv_window: u64, clock: TimestampFn) -> Self {
        Self {
            accounts,
            recv_window,
            clock,
        }
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn per_account(&self, url: &str) -> Vec<RequestDescriptor> {
        let ts = (self.clock)();
        self.accounts
            .iter()
            .map(|a| a.signed_get(url, self.recv_window, ts))
            .collect()
    }

    pub fn spot_account_info_requests(&self) -> Vec<RequestDescriptor> {
        self.per_account(SPOT_ACCOUNT_URL)
    }

    pub fn usds_future_account_balance_v3_requests(&self) -> Vec<RequestDescriptor> {
        self.per_account(USDS_FUTURE_BALANCE_URL)
    }

    /// Interleaved `[risk_1, balance_1, risk_2, balance_2, ...]`.
    pub fn unified_account_balance_requests(&self) -> Vec<RequestDescriptor> {
        let ts = (self.clock)();
        self.accounts
            .iter()
            .flat_map(|a| {
                [
                    a.signed_get(UNIFIED_POSITION_RISK_URL, self.recv_window, ts),
                    a.signed_get(UNIFIED_BALANCE_URL, self.recv_window, ts),
                ]
            })
            .collect()
    }
}
