//! The parameter map handed to the proof client.
//!
//! Maps every request kind to a zero-argument closure over the exchange
//! manager. Closures build their descriptors when called, so each proof run
//! gets freshly signed requests, and yield `None` when the exchange the kind
//! belongs to has no client.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::datasource::ExchangeManager;
use crate::types::{RequestDescriptor, RequestKind};

/// Lazily produces the descriptors of one request kind.
pub type RequestFn = Box<dyn Fn() -> Option<Vec<RequestDescriptor>> + Send + Sync>;

/// Descriptors produced by calling every closure, keyed by kind.
pub type ResolvedParams = BTreeMap<RequestKind, Vec<RequestDescriptor>>;

#[derive(Default)]
pub struct ParamMap {
    entries: BTreeMap<RequestKind, RequestFn>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard map: all five kinds, wired to `ds`.
    pub fn for_exchanges(ds: Arc<ExchangeManager>) -> Self {
        let mut params = Self::new();

        let d = ds.clone();
        params.insert(
            RequestKind::BinanceSpot,
            Box::new(move || d.binance.as_ref().map(|b| b.spot_account_info_requests())),
        );
        let d = ds.clone();
        params.insert(
            RequestKind::BinanceUsdSFuture,
            Box::new(move || d.binance.as_ref().map(|b| b.usds_future_account_balance_v3_requests())),
        );
        let d = ds.clone();
        params.insert(
            RequestKind::BinanceUnified,
            Box::new(move || d.binance.as_ref().map(|b| b.unified_account_balance_requests())),
        );
        let d = ds.clone();
        params.insert(
            RequestKind::AsterSpot,
            Box::new(move || d.aster.as_ref().map(|a| a.spot_account_requests())),
        );
        params.insert(
            RequestKind::AsterUsdSFuture,
            Box::new(move || ds.aster.as_ref().map(|a| a.usds_future_balance_requests())),
        );

        params
    }

    pub fn insert(&mut self, kind: RequestKind, f: RequestFn) {
        self.entries.insert(kind, f);
    }

    pub fn keys(&self) -> impl Iterator<Item = RequestKind> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Call the closure registered for `kind`.
    pub fn produce(&self, kind: RequestKind) -> Option<Vec<RequestDescriptor>> {
        self.entries.get(&kind).and_then(|f| f())
    }

    /// Call every closure, dropping kinds that produced nothing.
    pub fn resolve(&self) -> ResolvedParams {
        self.entries
            .iter()
            .filter_map(|(kind, f)| f().map(|reqs| (*kind, reqs)))
            .collect()
    }
}

impl std::fmt::Debug for ParamMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
