//! Process-wide settings loaded via OrthoConfig.
//!
//! Settings are layered (defaults, then config file, then environment, then
//! CLI) at bootstrap and treated as read-only afterwards. Dotted keys of the
//! deployment configuration map onto underscore-separated fields here, so the
//! `cache.*` namespace of the original configuration becomes the `cache_*`
//! fields, recoverable as a prefix-filtered map through
//! [`Settings::prefixed`].

use std::collections::BTreeMap;
use std::net::SocketAddr;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

/// Fallback bind address when none is configured.
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:6543";

/// Fallback group granted the `admin` permission.
const DEFAULT_ADMIN_GROUP: &str = "releng";

/// Errors raised while interpreting loaded settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// A required setting has no value.
    #[error("missing required setting: {name}")]
    Missing { name: &'static str },

    /// A setting is present but cannot be parsed.
    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Deployment settings for the gatehouse server.
#[derive(Debug, Clone, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "GATEHOUSE")]
pub struct Settings {
    /// PostgreSQL connection URL for the request session factory.
    pub database_url: Option<String>,

    /// Socket address the HTTP server binds to.
    pub bind_addr: Option<String>,

    /// Secret the auth-ticket digest is keyed with. Required to serve.
    pub authtkt_secret: Option<String>,

    /// Ticket lifetime in seconds; 86400 when unset.
    pub authtkt_timeout: Option<u64>,

    /// Whether ticket cookies are marked Secure.
    #[ortho_config(default = false)]
    pub authtkt_secure: bool,

    /// Base URL of the external build-system hub, if integration is enabled.
    pub koji_url: Option<String>,

    /// Cache backend selector: `memory` or `redis`.
    pub cache_backend: Option<String>,

    /// Cache entry lifetime in seconds.
    pub cache_expiration_time: Option<u64>,

    /// Redis URL for the `redis` cache backend.
    pub cache_url: Option<String>,

    /// Apply ±10% TTL jitter when storing cache entries.
    #[ortho_config(default = false)]
    pub cache_jitter: bool,

    /// Development shim: allow the interactive login endpoint to mint tickets
    /// for any existing user without an external identity provider.
    #[ortho_config(default = false)]
    pub dev_login: bool,

    /// Group granted the `admin` permission; `releng` when unset.
    pub admin_group: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: None,
            authtkt_secret: None,
            authtkt_timeout: None,
            authtkt_secure: false,
            koji_url: None,
            cache_backend: None,
            cache_expiration_time: None,
            cache_url: None,
            cache_jitter: false,
            dev_login: false,
            admin_group: None,
        }
    }
}

impl Settings {
    /// Database URL, required at runtime.
    pub fn database_url(&self) -> Result<&str, SettingsError> {
        self.database_url
            .as_deref()
            .ok_or(SettingsError::Missing {
                name: "database_url",
            })
    }

    /// Parsed bind address, defaulting to `0.0.0.0:6543`.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse().map_err(|err| SettingsError::Invalid {
            name: "bind_addr",
            message: format!("{raw}: {err}"),
        })
    }

    /// Group granted the `admin` permission.
    pub fn admin_group(&self) -> &str {
        self.admin_group.as_deref().unwrap_or(DEFAULT_ADMIN_GROUP)
    }

    /// Project the settings onto the subset of keys starting with `prefix`,
    /// with the prefix stripped and values rendered as strings.
    ///
    /// This is how namespaced consumers (the cache region) receive their
    /// slice of the process-wide configuration.
    pub fn prefixed(&self, prefix: &str) -> BTreeMap<String, String> {
        let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(self) else {
            return BTreeMap::new();
        };
        fields
            .into_iter()
            .filter_map(|(key, value)| {
                let stripped = key.strip_prefix(prefix)?.to_owned();
                let rendered = match value {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Bool(b) => b.to_string(),
                    serde_json::Value::Number(n) => n.to_string(),
                    _ => return None,
                };
                Some((stripped, rendered))
            })
            .collect()
    }
}
