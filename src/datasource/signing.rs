//! Request signing for Binance-compatible REST APIs.
//!
//! Binance and Aster both sign the URL-encoded query string with
//! HMAC-SHA256 over the account secret and append the hex digest as
//! `signature=`. The API key travels in the `X-MBX-APIKEY` header.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::types::RequestDescriptor;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Compute an HMAC-SHA256 signature and return it as a lowercase hex string.
pub fn hmac_sha256_sign(secret: &str, message: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Join `(key, value)` pairs into a URL-encoded query and append its signature.
pub fn build_signed_query(params: &[(&str, &str)], secret: &str) -> String {
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let signature = hmac_sha256_sign(secret, &query);
    format!("{query}&signature={signature}")
}

/// One exchange account able to sign requests.
pub struct SignedAccount {
    label: String,
    api_key: SecretString,
    api_secret: SecretString,
}

impl SignedAccount {
    pub fn new(label: impl Into<String>, api_key: SecretString, api_secret: SecretString) -> Self {
        Self {
            label: label.into(),
            api_key,
            api_secret,
        }
    }

    /// Build a signed `GET {url}?[recvWindow=..&]timestamp=..&signature=..`.
    pub fn signed_get(&self, url: &str, recv_window: u64, timestamp_ms: i64) -> RequestDescriptor {
        let recv_window = recv_window.to_string();
        let timestamp = timestamp_ms.to_string();
        let mut params: Vec<(&str, &str)> = Vec::with_capacity(2);
        if recv_window != "0" {
            params.push(("recvWindow", &recv_window));
        }
        params.push(("timestamp", &timestamp));

        let query = build_signed_query(&params, self.api_secret.expose_secret());
        RequestDescriptor::get(format!("{url}?{query}")).with_header(API_KEY_HEADER, self.api_key.expose_secret())
    }
}

impl std::fmt::Debug for SignedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedAccount").field("label", &self.label).finish_non_exhaustive()
    }
}
