//! Integration with the external build system.
//!
//! The gating service does not talk to the build system itself beyond
//! holding a shared client for it; callers issue hub calls through
//! [`Client::call`]. Build metadata enrichment is a stub at this layer:
//! [`BuildInfo`] answers every key with an empty mapping.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Map, Value};
use url::Url;

use crate::config::Settings;

/// Request timeout applied to hub calls.
const HUB_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while constructing or using the build-system client.
#[derive(Debug, thiserror::Error)]
pub enum BuildsysError {
    /// `koji_url` could not be parsed.
    #[error("invalid build-system hub URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(String),

    /// A hub call failed.
    #[error("build-system call failed: {0}")]
    Call(String),
}

/// Shared client for the build-system hub.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    hub: Url,
}

impl Client {
    /// Client for the hub at `hub_url`.
    pub fn new(hub_url: &str) -> Result<Self, BuildsysError> {
        let hub = Url::parse(hub_url)?;
        let http = reqwest::Client::builder()
            .timeout(HUB_TIMEOUT)
            .build()
            .map_err(|err| BuildsysError::Client(err.to_string()))?;
        Ok(Self { http, hub })
    }

    /// The configured hub URL.
    pub fn hub(&self) -> &Url {
        &self.hub
    }

    /// Issue a hub call and return the decoded JSON response.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, BuildsysError> {
        let endpoint = self
            .hub
            .join(method)
            .map_err(BuildsysError::InvalidUrl)?;
        let response = self
            .http
            .post(endpoint)
            .json(&params)
            .send()
            .await
            .map_err(|err| BuildsysError::Call(err.to_string()))?;
        response
            .error_for_status()
            .map_err(|err| BuildsysError::Call(err.to_string()))?
            .json()
            .await
            .map_err(|err| BuildsysError::Call(err.to_string()))
    }
}

/// The shared build-system client for this deployment, or `None` when the
/// integration is not configured.
pub fn get_session(settings: &Settings) -> Result<Option<Client>, BuildsysError> {
    settings
        .koji_url
        .as_deref()
        .map(Client::new)
        .transpose()
}

/// Per-build metadata map with default-empty semantics: looking up any
/// missing key yields an empty mapping rather than an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildInfo {
    entries: HashMap<String, Value>,
    empty: Value,
}

impl BuildInfo {
    /// Empty build-info map.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            empty: Value::Object(Map::new()),
        }
    }

    /// Metadata recorded for `key`, or an empty mapping.
    pub fn get(&self, key: &str) -> &Value {
        self.entries.get(key).unwrap_or(&self.empty)
    }

    /// Record metadata for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Whether any metadata has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build metadata for an update: unimplemented at this layer, so always the
/// empty map.
pub fn build_info() -> BuildInfo {
    BuildInfo::new()
}
