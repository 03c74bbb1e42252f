//! Aster balance requests. Aster mirrors the Binance signing scheme.

use super::{SignedAccount, TimestampFn};
use crate::types::RequestDescriptor;

pub const SPOT_ACCOUNT_URL: &str = "https://sapi.asterdex.com/api/v1/account";
pub const USDS_FUTURE_BALANCE_URL: &str = "https://fapi.asterdex.com/fapi/v2/balance";

pub struct AsterSource {
    accounts: Vec<SignedAccount>,
    recv_window: u64,
    clock: TimestampFn,
}

impl AsterSource {
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

    pub fn spot_account_requests(&self) -> Vec<RequestDescriptor> {
        self.per_account(SPOT_ACCOUNT_URL)
    }

    pub fn usds_future_balance_requests(&self) -> Vec<RequestDescriptor> {
        self.per_account(USDS_FUTURE_BALANCE_URL)
    }
}
