use crate::types::RequestKind;

/// Why a balance summary was rejected. `code()` is reported in
/// `PublicValues.status`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummaryError {
    #[error("{kind}: expected an even number of requests, got {count}")]
    OddRequestCount { kind: RequestKind, count: usize },

    #[error("{kind}: field `{path}` missing or malformed")]
    MissingField { kind: RequestKind, path: String },

    #[error("{kind}: expected {expected} value(s) at `{path}`, found {found}")]
    UnexpectedValueCount {
        kind: RequestKind,
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("{kind}: request url has no timestamp")]
    MissingTimestamp { kind: RequestKind },

    #[error("{kind}: request timestamp is not numeric")]
    InvalidTimestamp { kind: RequestKind },

    #[error("{kind}: position risk response out of order at index {index}")]
    OutOfOrder { kind: RequestKind, index: usize },

    #[error("{kind}: unexpected request url {url}")]
    UnexpectedUrl { kind: RequestKind, url: String },

    #[error("{kind}: duplicate account {account}")]
    DuplicateAccount { kind: RequestKind, account: String },

    #[error("balance of {asset} overflows")]
    AmountOverflow { asset: String },
}

impl SummaryError {
    pub fn code(&self) -> i16 {
        match self {
            SummaryError::OddRequestCount { .. } => 1003,
            SummaryError::MissingField { .. } => 1005,
            SummaryError::UnexpectedValueCount { .. } => 1006,
            SummaryError::MissingTimestamp { .. } => 1007,
            SummaryError::InvalidTimestamp { .. } => 1008,
            SummaryError::OutOfOrder { .. } => 1009,
            SummaryError::UnexpectedUrl { .. } => 1010,
            SummaryError::DuplicateAccount { .. } => 1011,
            SummaryError::AmountOverflow { .. } => 1012,
        }
    }
}
