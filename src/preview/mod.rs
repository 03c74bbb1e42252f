//! Local balance preview.
//!
//! Executes the signed requests directly against the exchanges (no
//! attestor involved) and summarises the balances a proof would commit to.
//! Useful to sanity-check credentials and account coverage before a run.

pub mod error;
pub mod summary;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::params::ResolvedParams;
use crate::types::{RequestDescriptor, RequestKind};

pub use error::SummaryError;
pub use summary::{summarize, AttestationMeta, PublicValues};

/// An exchange response paired with the URL that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestedResponse {
    pub url: String,
    pub body: serde_json::Value,
}

pub fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("por-runner/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client for balance preview")
}

async fn fetch_one(http: &Client, req: &RequestDescriptor) -> Result<AttestedResponse> {
    debug!(request = ?req, "Fetching balance");

    let mut builder = http.get(&req.url);
    for (name, value) in &req.headers {
        builder = builder.header(name, value);
    }
    let resp = builder.send().await.context("Exchange request failed")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Exchange API error {status}: {body}");
    }

    let body = resp.json().await.context("Failed to parse exchange response")?;
    Ok(AttestedResponse {
        url: req.url.clone(),
        body,
    })
}

/// Fetch every descriptor, in order, keyed by kind.
pub async fn fetch_responses(
    http: &Client,
    requests: &ResolvedParams,
) -> Result<BTreeMap<RequestKind, Vec<AttestedResponse>>> {
    let mut out = BTreeMap::new();
    for (kind, reqs) in requests {
        let mut responses = Vec::with_capacity(reqs.len());
        for req in reqs {
            let resp = fetch_one(http, req).await.with_context(|| format!("{kind} request failed"))?;
            responses.push(resp);
        }
        info!(kind = %kind, count = responses.len(), "Fetched balances");
        out.insert(*kind, responses);
    }
    Ok(out)
}

/// Fetch and summarise.
pub async fn preview(http: &Client, requests: &ResolvedParams, project_id: &str) -> Result<PublicValues> {
    let responses = fetch_responses(http, requests).await?;
    let pv = summarize(&responses, project_id);
    info!(
        status = pv.status,
        exchanges = pv.asset_balance.len(),
        attestations = pv.attestation_meta.len(),
        "Balance preview complete"
    );
    Ok(pv)
}
