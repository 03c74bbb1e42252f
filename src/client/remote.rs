//! HTTP client for the attestation service.
//!
//! `POST {endpoint}/v1/por/run` submits the resolved request map and waits
//! for the proof; `POST {endpoint}/v1/por/withdraw` asks for a withdrawal.
//! Auth: optional `Authorization: Bearer {token}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{ProofClient, ProofResult};
use crate::config::{AppConfig, AppSettings};
use crate::params::{ParamMap, ResolvedParams};
use crate::types::{ErrorData, PorError};

const RUN_PATH: &str = "/v1/por/run";
const WITHDRAW_PATH: &str = "/v1/por/withdraw";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
    requests: &'a ResolvedParams,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WithdrawResponse {
    #[serde(default)]
    success: bool,
}

/// Error body: `{ "message": "...", "data": { "code": "..." } }`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<ErrorData>,
}

pub struct RemoteProofClient {
    http: Client,
    endpoint: String,
    token: Option<SecretString>,
    project_id: Option<String>,
}

impl RemoteProofClient {
    pub fn new(settings: &AppSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(concat!("por-runner/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for the attestation service")?;

        let token = settings
            .token_env
            .as_deref()
            .map(AppConfig::resolve_env)
            .transpose()?
            .map(SecretString::new);

        Ok(Self {
            http,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            token,
            project_id: settings.project_id.clone(),
        })
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, PorError> {
        let url = format!("{}{path}", self.endpoint);
        debug!(url = %url, "Calling attestation service");

        let mut req = self.http.post(&url).json(body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token.expose_secret());
        }

        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        resp.json::<T>()
            .await
            .map_err(|e| PorError::remote(format!("invalid response from {path}: {e}"), None))
    }
}

/// Transport failures; timeouts carry the `timeout` code.
fn transport_error(e: reqwest::Error) -> PorError {
    let data = e.is_timeout().then(ErrorData::timeout);
    PorError::remote(e.to_string(), data)
}

/// Non-2xx responses. A structured body wins; 408/504 without one are timeouts.
fn status_error(status: StatusCode, body: &str) -> PorError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let (message, data) = match parsed {
        Some(ErrorBody { message, data }) => (message, data),
        None => (None, None),
    };

    let data = data.or_else(|| {
        matches!(status, StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT).then(ErrorData::timeout)
    });
    let message = message.unwrap_or_else(|| format!("attestation service returned {status}: {body}"));
    PorError::remote(message, data)
}

#[async_trait]
impl ProofClient for RemoteProofClient {
    async fn run(&self, params: &ParamMap) -> Result<ProofResult, PorError> {
        let requests = params.resolve();
        info!(
            kinds = requests.len(),
            requests = requests.values().map(Vec::len).sum::<usize>(),
            "Submitting proof run"
        );

        let body = RunRequest {
            project_id: self.project_id.as_deref(),
            requests: &requests,
        };
        self.post(RUN_PATH, &body).await
    }

    async fn try_withdraw_balance(&self) -> Result<bool, PorError> {
        let body = WithdrawRequest {
            project_id: self.project_id.as_deref(),
        };
        let resp: WithdrawResponse = self.post(WITHDRAW_PATH, &body).await?;
        Ok(resp.success)
    }
}
