//! Shared types for the proof-of-reserves runner.
//!
//! Request descriptors and request kinds are produced by the data sources
//! and consumed by the proof client; `PorError` is the error every run
//! reports, classified well enough for the scheduler's stop predicate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Request kinds
// ---------------------------------------------------------------------------

/// The fixed set of balance-query kinds submitted to the attestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    #[serde(rename = "binanceSpot")]
    BinanceSpot,
    #[serde(rename = "binanceUsdSFuture")]
    BinanceUsdSFuture,
    #[serde(rename = "binanceUnified")]
    BinanceUnified,
    #[serde(rename = "asterSpot")]
    AsterSpot,
    #[serde(rename = "asterUsdSFuture")]
    AsterUsdSFuture,
}

impl RequestKind {
    pub const ALL: [RequestKind; 5] = [
        RequestKind::BinanceSpot,
        RequestKind::BinanceUsdSFuture,
        RequestKind::BinanceUnified,
        RequestKind::AsterSpot,
        RequestKind::AsterUsdSFuture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::BinanceSpot => "binanceSpot",
            RequestKind::BinanceUsdSFuture => "binanceUsdSFuture",
            RequestKind::BinanceUnified => "binanceUnified",
            RequestKind::AsterSpot => "asterSpot",
            RequestKind::AsterUsdSFuture => "asterUsdSFuture",
        }
    }

    /// Exchange this kind queries: "binance" | "aster".
    pub fn exchange(&self) -> &'static str {
        match self {
            RequestKind::BinanceSpot | RequestKind::BinanceUsdSFuture | RequestKind::BinanceUnified => {
                "binance"
            }
            RequestKind::AsterSpot | RequestKind::AsterUsdSFuture => "aster",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request descriptor
// ---------------------------------------------------------------------------

/// A single signed HTTPS request the attestor replays against an exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl RequestDescriptor {
    pub fn get(url: String) -> Self {
        Self {
            url,
            method: "GET".to_string(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// The `timestamp=` query parameter, if present and numeric.
    pub fn timestamp_ms(&self) -> Option<u128> {
        self.url
            .split("timestamp=")
            .nth(1)
            .and_then(|s| s.split('&').next())
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse().ok())
    }
}

// Header values carry API keys.
impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted: Vec<&str> = self.headers.keys().map(String::as_str).collect();
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("url", &self.url.split('?').next().unwrap_or_default())
            .field("headers", &redacted)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Code the proof client attaches to errors it classified as timeouts.
pub const TIMEOUT_CODE: &str = "timeout";

/// Structured payload a remote error may carry (`error.data`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: String,
}

impl ErrorData {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }

    pub fn timeout() -> Self {
        Self::new(TIMEOUT_CODE)
    }
}

/// Errors surfaced by a single proof run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data source error ({exchange}): {message}")]
    DataSource { exchange: String, message: String },

    #[error("Proof client error: {message}")]
    Remote {
        message: String,
        data: Option<ErrorData>,
    },

    #[error("Failed to decode proof fixture: {0}")]
    Decode(String),
}

impl PorError {
    pub fn remote(message: impl Into<String>, data: Option<ErrorData>) -> Self {
        PorError::Remote {
            message: message.into(),
            data,
        }
    }

    /// Structured data attached by the proof client, if any.
    pub fn data(&self) -> Option<&ErrorData> {
        match self {
            PorError::Remote { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PorError::Config(_) => "config",
            PorError::DataSource { .. } => "data_source",
            PorError::Remote { .. } => "remote",
            PorError::Decode(_) => "decode",
        }
    }

    /// Short message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            PorError::Config(m) | PorError::Decode(m) => m,
            PorError::DataSource { message, .. } | PorError::Remote { message, .. } => message,
        }
    }

    /// Serialized form for logs.
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "kind": self.kind(),
            "message": self.message(),
            "data": self.data(),
        })
        .to_string()
    }
}

impl From<anyhow::Error> for PorError {
    fn from(e: anyhow::Error) -> Self {
        PorError::Config(format!("{e:#}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
