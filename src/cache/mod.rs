//! Transparent on-disk response caching for a [`Transport`].
//!
//! [`CacheTransport`] sits in front of another transport. For each request:
//!
//! 1. [`DomainFilter`] — hosts outside the configured suffixes go straight
//!    through.
//! 2. [`derive_key`] — the request is fingerprinted without consuming its body.
//! 3. [`Store`] + [`ExpirationPolicy`] — a stored, unexpired entry is returned
//!    without touching the network.
//! 4. Otherwise the request is forwarded, and a `200 OK` response is persisted
//!    before being returned.
//!
//! Unreadable or corrupt entries count as misses. Nothing is ever evicted; a
//! stale entry is overwritten by the next successful fetch.

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{CacheSettings, PersistErrorPolicy};
use crate::fs::{Filesystem, LocalFs};
use crate::http::{ParseError, Request, Response, StatusCode};
use crate::transport::{Transport, TransportError};

mod expiry;
mod filter;
mod key;
mod lock;
mod store;

pub use expiry::{CACHE_TIME_HEADER, ExpirationPolicy, format_timestamp, stored_at};
pub use filter::DomainFilter;
pub use key::{CacheKey, derive_key};
pub use store::Store;

use lock::KeyLocks;

/// Errors produced by the cache layer.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored entry is not a valid HTTP response: {0}")]
    Parse(#[from] ParseError),

    #[error("failed to read request body for cache key: {0}")]
    KeyDerivation(#[source] std::io::Error),

    #[error("invalid cache key {0:?}")]
    InvalidKey(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<CacheError> for TransportError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Transport(inner) => inner,
            other => TransportError::Other(Box::new(other)),
        }
    }
}

/// A [`Transport`] that serves repeated requests from disk.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use diskcache::{CacheSettings, CacheTransport, Request, TcpTransport};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let settings = CacheSettings::new("/tmp/http-cache")
///         .domains(["example.com"])
///         .ttl(Duration::from_secs(600));
///     let cache = CacheTransport::new(TcpTransport::new(), settings);
///
///     // The second call is answered from /tmp/http-cache.
///     for _ in 0..2 {
///         let response = cache.round_trip(Request::get("http://example.com/".parse()?)).await?;
///         println!("{}", response.status());
///     }
///     Ok(())
/// }
/// ```
pub struct CacheTransport<T, F = LocalFs> {
    inner: T,
    filter: DomainFilter,
    store: Store<F>,
    policy: ExpirationPolicy,
    persist_errors: PersistErrorPolicy,
    locks: KeyLocks,
}

impl<T: Transport> CacheTransport<T, LocalFs> {
    /// Wraps `inner`, storing entries on the local disk.
    pub fn new(inner: T, settings: CacheSettings) -> Self {
        Self::with_filesystem(inner, settings, LocalFs)
    }
}

impl<T: Transport, F: Filesystem> CacheTransport<T, F> {
    /// Wraps `inner`, storing entries through `fs`.
    pub fn with_filesystem(inner: T, settings: CacheSettings, fs: F) -> Self {
        let ttl = settings.ttl_duration();
        Self {
            inner,
            filter: DomainFilter::new(&settings.domains),
            store: Store::new(fs, settings.path),
            policy: ExpirationPolicy::new(ttl),
            persist_errors: settings.persist_errors,
            locks: KeyLocks::new(),
        }
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// The on-disk entry store.
    pub fn store(&self) -> &Store<F> {
        &self.store
    }

    /// Sends `request`, answering from the cache when possible.
    ///
    /// # Errors
    ///
    /// - [`CacheError::KeyDerivation`] — the request body could not be read.
    /// - [`CacheError::Transport`] — the wrapped transport failed.
    /// - [`CacheError::Io`] — the live response could not be persisted and the
    ///   persist policy is [`PersistErrorPolicy::Propagate`].
    pub async fn round_trip(&self, mut request: Request) -> Result<Response, CacheError> {
        let host = request.host().unwrap_or("");
        if !self.filter.allows(host) {
            debug!(host, "host not cacheable — forwarding");
            return Ok(self.inner.send(request).await?);
        }

        let key = derive_key(&mut request)
            .await
            .map_err(CacheError::KeyDerivation)?;
        let _guard = self.locks.lock(key.as_str()).await;

        if let Some(cached) = self.lookup(&key).await {
            debug!(key = %key, url = %request.url(), "cache hit");
            return Ok(cached);
        }

        debug!(key = %key, url = %request.url(), "cache miss — fetching");
        let mut response = self.inner.send(request).await?;

        if response.status() != StatusCode::OK {
            debug!(key = %key, status = response.status().as_u16(), "not caching non-200 response");
            return Ok(response);
        }

        if let Err(e) = self.store.save(key.as_str(), &mut response).await {
            match self.persist_errors {
                PersistErrorPolicy::Propagate => return Err(e),
                PersistErrorPolicy::Ignore => {
                    warn!(key = %key, error = %e, "failed to persist response — returning it uncached");
                }
            }
        }

        Ok(response)
    }

    /// Returns the stored response for `key` if it exists, parses, and has not
    /// expired.
    async fn lookup(&self, key: &CacheKey) -> Option<Response> {
        if !self.store.exists(key.as_str()).await {
            return None;
        }
        match self.store.load(key.as_str()).await {
            Ok(response) if self.policy.is_expired(&response, Utc::now()) => {
                debug!(key = %key, "cache entry expired");
                None
            }
            Ok(response) => Some(response),
            Err(e) => {
                warn!(key = %key, error = %e, "unusable cache entry — treating as miss");
                None
            }
        }
    }
}

#[async_trait]
impl<T: Transport, F: Filesystem> Transport for CacheTransport<T, F> {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        Ok(self.round_trip(request).await?)
    }
}
