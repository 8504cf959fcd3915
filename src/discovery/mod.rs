//! Cloud API discovery.
//!
//! Discovery talks to the management REST APIs with a bearer token and maps
//! the responses defensively into snapshot records: absent or oddly-typed
//! fields become empty defaults, never errors. A failed project is reported
//! as a failure entry so the rest of the batch keeps going.

pub mod gke;
pub mod sql;

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("no access token configured: set auth.access_token or GCP_ACCESS_TOKEN")]
    MissingToken,
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

pub fn http_client(timeout_secs: u64) -> Result<Client> {
    let client = Client::builder()
        .user_agent(concat!("drift-sentinel/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()?;
    Ok(client)
}

pub fn access_token(config: &Config) -> Result<String, DiscoveryError> {
    if !config.auth.access_token.trim().is_empty() {
        return Ok(config.auth.access_token.trim().to_string());
    }
    match std::env::var("GCP_ACCESS_TOKEN") {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(DiscoveryError::MissingToken),
    }
}

pub async fn fetch_json(client: &Client, url: &str, token: &str) -> Result<Value, DiscoveryError> {
    let response = client
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|source| DiscoveryError::Request {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DiscoveryError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.json().await.map_err(|source| DiscoveryError::Request {
        url: url.to_string(),
        source,
    })
}

pub(crate) fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn bool_field(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn i64_field(value: &Value, key: &str) -> i64 {
    let field = match value.get(key) {
        Some(field) => field,
        None => return 0,
    };
    // The management APIs serialize some 64-bit integers as strings.
    field
        .as_i64()
        .or_else(|| field.as_str().and_then(|raw| raw.parse().ok()))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_helpers_tolerate_missing_and_mistyped_values() {
        let value = json!({
            "name": "primary-db",
            "diskSizeGb": "100",
            "enabled": true,
        });
        assert_eq!(str_field(&value, "name"), "primary-db");
        assert_eq!(str_field(&value, "missing"), "");
        assert_eq!(i64_field(&value, "diskSizeGb"), 100);
        assert_eq!(i64_field(&value, "name"), 0);
        assert!(bool_field(&value, "enabled"));
        assert!(!bool_field(&value, "missing"));
    }
}
