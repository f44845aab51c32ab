//! Cache region configured from the `cache.*` settings namespace.
//!
//! Built once at bootstrap from the prefix-filtered slice of the
//! process-wide configuration (see [`crate::config::Settings::prefixed`]).
//! Two backends: an in-process map with per-entry TTL, and Redis through a
//! bb8 pool. Values are JSON.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bb8_redis::redis::AsyncCommands;
use bb8_redis::{bb8, RedisConnectionManager};
use rand::Rng;
use serde_json::Value;

/// Entry lifetime applied when `cache.expiration_time` is not configured.
const DEFAULT_EXPIRATION_SECS: u64 = 3600;

/// Errors raised while configuring or using the cache region.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The configured backend name is not recognised.
    #[error("unknown cache backend: {name}")]
    UnknownBackend { name: String },

    /// A setting in the cache namespace cannot be parsed.
    #[error("invalid cache setting {name}: {message}")]
    InvalidSetting { name: &'static str, message: String },

    /// The redis backend requires `cache.url`.
    #[error("cache.url is required for the redis backend")]
    MissingUrl,

    /// The redis backend failed.
    #[error("redis cache operation failed: {0}")]
    Redis(String),

    /// A cached value could not be encoded or decoded.
    #[error("cache codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Parsed view of the `cache.*` namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    backend: BackendKind,
    expiration: Duration,
    jitter: bool,
    url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    Memory,
    Redis,
}

impl CacheConfig {
    /// Interpret a prefix-filtered settings map.
    ///
    /// Recognised keys: `backend` (`memory`, the default, or `redis`),
    /// `expiration_time` (seconds), `url`, `jitter`.
    pub fn from_map(section: &BTreeMap<String, String>) -> Result<Self, CacheError> {
        let backend = match section.get("backend").map(String::as_str) {
            None | Some("memory") => BackendKind::Memory,
            Some("redis") => BackendKind::Redis,
            Some(other) => {
                return Err(CacheError::UnknownBackend {
                    name: other.to_owned(),
                })
            }
        };

        let expiration = match section.get("expiration_time") {
            None => Duration::from_secs(DEFAULT_EXPIRATION_SECS),
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|err| CacheError::InvalidSetting {
                    name: "expiration_time",
                    message: format!("{raw}: {err}"),
                })?;
                Duration::from_secs(secs)
            }
        };

        let jitter = match section.get("jitter") {
            None => false,
            Some(raw) => match raw.as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(CacheError::InvalidSetting {
                        name: "jitter",
                        message: format!("{other}: expected a boolean"),
                    })
                }
            },
        };

        Ok(Self {
            backend,
            expiration,
            jitter,
            url: section.get("url").cloned(),
        })
    }
}

/// Process-wide cache region.
#[derive(Debug)]
pub struct CacheRegion {
    expiration: Duration,
    jitter: bool,
    backend: Backend,
}

#[derive(Debug)]
enum Backend {
    Memory(MemoryStore),
    Redis(bb8::Pool<RedisConnectionManager>),
}

#[derive(Default, Debug)]
struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

#[derive(Debug)]
struct MemoryEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheRegion {
    /// Build the region from its configuration. Redis pools are established
    /// here so misconfiguration fails at bootstrap, not on first use.
    pub async fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let backend = match config.backend {
            BackendKind::Memory => Backend::Memory(MemoryStore::default()),
            BackendKind::Redis => {
                let url = config.url.as_deref().ok_or(CacheError::MissingUrl)?;
                let manager = RedisConnectionManager::new(url)
                    .map_err(|err| CacheError::Redis(err.to_string()))?;
                let pool = bb8::Pool::builder()
                    .build(manager)
                    .await
                    .map_err(|err| CacheError::Redis(err.to_string()))?;
                Backend::Redis(pool)
            }
        };
        Ok(Self {
            expiration: config.expiration,
            jitter: config.jitter,
            backend,
        })
    }

    /// Build the region straight from a prefix-filtered settings map.
    pub async fn from_map(section: &BTreeMap<String, String>) -> Result<Self, CacheError> {
        Self::new(CacheConfig::from_map(section)?).await
    }

    /// Configured entry lifetime before jitter.
    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// Fetch a cached value, `None` on miss or expiry.
    pub async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        match &self.backend {
            Backend::Memory(store) => Ok(store.get(key)),
            Backend::Redis(pool) => {
                let mut conn = pool
                    .get()
                    .await
                    .map_err(|err| CacheError::Redis(err.to_string()))?;
                let raw: Option<String> = conn
                    .get(key)
                    .await
                    .map_err(|err| CacheError::Redis(err.to_string()))?;
                match raw {
                    None => Ok(None),
                    Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
                }
            }
        }
    }

    /// Store a value under the region's TTL.
    pub async fn put(&self, key: &str, value: Value) -> Result<(), CacheError> {
        let ttl = self.ttl();
        match &self.backend {
            Backend::Memory(store) => {
                store.put(key, value, ttl);
                Ok(())
            }
            Backend::Redis(pool) => {
                let mut conn = pool
                    .get()
                    .await
                    .map_err(|err| CacheError::Redis(err.to_string()))?;
                let payload = serde_json::to_string(&value)?;
                conn.set_ex::<_, _, ()>(key, payload, ttl.as_secs())
                    .await
                    .map_err(|err| CacheError::Redis(err.to_string()))?;
                Ok(())
            }
        }
    }

    /// Effective TTL for a store: the configured lifetime, with ±10% jitter
    /// when enabled so entries written together do not expire together.
    fn ttl(&self) -> Duration {
        if !self.jitter {
            return self.expiration;
        }
        let base = self.expiration.as_secs_f64();
        let factor = rand::thread_rng().gen_range(0.9..=1.1);
        Duration::from_secs_f64(base * factor)
    }
}

impl MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(
            key.to_owned(),
            MemoryEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn section(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[rstest]
    fn config_defaults_to_memory_with_an_hour_ttl() {
        let config = CacheConfig::from_map(&section(&[])).expect("empty section is valid");

        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.expiration, Duration::from_secs(3600));
        assert!(!config.jitter);
    }

    #[rstest]
    fn config_reads_the_namespace_keys() {
        let config = CacheConfig::from_map(&section(&[
            ("backend", "redis"),
            ("expiration_time", "300"),
            ("url", "redis://localhost:6379"),
            ("jitter", "true"),
        ]))
        .expect("valid section");

        assert_eq!(config.backend, BackendKind::Redis);
        assert_eq!(config.expiration, Duration::from_secs(300));
        assert!(config.jitter);
        assert_eq!(config.url.as_deref(), Some("redis://localhost:6379"));
    }

    #[rstest]
    fn unknown_backend_is_rejected() {
        let err = CacheConfig::from_map(&section(&[("backend", "memcached")]))
            .expect_err("unknown backend");
        assert!(err.to_string().contains("memcached"));
    }

    #[rstest]
    fn malformed_expiration_is_rejected() {
        let err = CacheConfig::from_map(&section(&[("expiration_time", "soon")]))
            .expect_err("non-numeric ttl");
        assert!(err.to_string().contains("expiration_time"));
    }

    #[rstest]
    #[tokio::test]
    async fn memory_region_round_trips_values() {
        let region = CacheRegion::from_map(&section(&[("expiration_time", "60")]))
            .await
            .expect("memory region");

        region
            .put("greeting", json!({"hello": "world"}))
            .await
            .expect("put succeeds");

        let hit = region.get("greeting").await.expect("get succeeds");
        assert_eq!(hit, Some(json!({"hello": "world"})));
        let miss = region.get("absent").await.expect("get succeeds");
        assert_eq!(miss, None);
    }

    #[rstest]
    #[tokio::test]
    async fn memory_entries_expire_after_the_ttl() {
        let region = CacheRegion::from_map(&section(&[("expiration_time", "0")]))
            .await
            .expect("memory region");

        region.put("fleeting", json!(1)).await.expect("put succeeds");

        let hit = region.get("fleeting").await.expect("get succeeds");
        assert_eq!(hit, None, "zero-ttl entries expire immediately");
    }

    #[rstest]
    #[tokio::test]
    async fn redis_region_requires_a_url() {
        let err = CacheRegion::from_map(&section(&[("backend", "redis")]))
            .await
            .expect_err("redis without url");
        assert!(matches!(err, CacheError::MissingUrl));
    }

    #[rstest]
    fn jittered_ttl_stays_within_ten_percent() {
        let region = CacheRegion {
            expiration: Duration::from_secs(1000),
            jitter: true,
            backend: Backend::Memory(MemoryStore::default()),
        };

        for _ in 0..32 {
            let ttl = region.ttl().as_secs_f64();
            assert!((900.0..=1100.0).contains(&ttl), "ttl out of band: {ttl}");
        }
    }
}
