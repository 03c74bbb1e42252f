//! Proof-of-reserves client.
//!
//! Defines the `ProofClient` trait the runner drives and the result shape
//! the attestation service returns. `remote` implements it over HTTP.

pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::params::ParamMap;
use crate::types::PorError;

pub use remote::RemoteProofClient;

/// Abstraction over the attestation service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProofClient: Send + Sync {
    /// Produce a proof from the requests in `params`.
    async fn run(&self, params: &ParamMap) -> Result<ProofResult, PorError>;

    /// Attempt a withdrawal; `Ok(true)` when the service reports success.
    async fn try_withdraw_balance(&self) -> Result<bool, PorError>;
}

/// Result of a proof run. Older services nest the fixture under `details`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProofResult {
    #[serde(default)]
    pub proof_fixture: Option<String>,
    #[serde(default)]
    pub details: Option<ProofDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProofDetails {
    #[serde(default)]
    pub proof_fixture: Option<String>,
}

impl ProofResult {
    pub fn with_fixture(fixture: impl Into<String>) -> Self {
        Self {
            proof_fixture: Some(fixture.into()),
            details: None,
        }
    }

    /// The encoded fixture, or `"{}"` when the service sent none.
    pub fn fixture_str(&self) -> &str {
        self.proof_fixture
            .as_deref()
            .or_else(|| self.details.as_ref().and_then(|d| d.proof_fixture.as_deref()))
            .unwrap_or("{}")
    }

    pub fn decode_fixture(&self) -> Result<serde_json::Value, PorError> {
        serde_json::from_str(self.fixture_str()).map_err(|e| PorError::Decode(e.to_string()))
    }
}
