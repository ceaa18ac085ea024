//! Cache settings.
//!
//! Settings are plain data: build them in code or load them from JSON. Once
//! handed to a [`CacheTransport`](crate::CacheTransport) they never change.
//!
//! ```
//! use std::time::Duration;
//! use diskcache::{CacheSettings, PersistErrorPolicy};
//!
//! let settings = CacheSettings::from_json_str(r#"{
//!     "domains": ["api.example.com"],
//!     "path": "/var/cache/http",
//!     "ttl_secs": 3600
//! }"#).unwrap();
//!
//! assert_eq!(settings.ttl_duration(), Duration::from_secs(3600));
//! assert_eq!(settings.persist_errors, PersistErrorPolicy::Propagate);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default cache root, relative to the working directory.
pub const DEFAULT_CACHE_PATH: &str = ".cache/http";

/// Errors produced while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cache settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// What to do when a fetched response cannot be written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistErrorPolicy {
    /// Fail the request with the write error.
    #[default]
    Propagate,
    /// Log the error and return the live response anyway.
    Ignore,
}

/// Cache behaviour for one [`CacheTransport`](crate::CacheTransport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Hostname suffixes eligible for caching. Empty caches every host.
    pub domains: Vec<String>,
    /// Directory holding one file per cache entry. Created on first write.
    pub path: PathBuf,
    /// Entry lifetime in seconds. Zero never expires.
    pub ttl_secs: u64,
    pub persist_errors: PersistErrorPolicy,
}

impl CacheSettings {
    /// Settings caching every host under `path`, with no expiry.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = domains.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    #[must_use]
    pub fn persist_errors(mut self, policy: PersistErrorPolicy) -> Self {
        self.persist_errors = policy;
        self
    }

    /// Parses settings from a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON settings file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Entry lifetime; [`Duration::ZERO`] never expires.
    pub fn ttl_duration(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            path: PathBuf::from(DEFAULT_CACHE_PATH),
            ttl_secs: 0,
            persist_errors: PersistErrorPolicy::Propagate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = CacheSettings::default();
        assert!(s.domains.is_empty());
        assert_eq!(s.path, PathBuf::from(".cache/http"));
        assert_eq!(s.ttl_duration(), Duration::ZERO);
    }

    #[test]
    fn json_fills_missing_fields() {
        let s = CacheSettings::from_json_str(r#"{"ttl_secs": 60, "persist_errors": "ignore"}"#)
            .unwrap();
        assert_eq!(s.ttl_duration(), Duration::from_secs(60));
        assert_eq!(s.persist_errors, PersistErrorPolicy::Ignore);
        assert_eq!(s.path, PathBuf::from(DEFAULT_CACHE_PATH));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = CacheSettings::from_json_str(r#"{"ttl": 60}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn builder() {
        let s = CacheSettings::new("/tmp/c")
            .domains(["example.com"])
            .ttl(Duration::from_secs(90));
        assert_eq!(s.domains, vec!["example.com".to_string()]);
        assert_eq!(s.ttl_secs, 90);
    }

    #[test]
    fn from_missing_file() {
        let err = CacheSettings::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
