//! Expiration of stored entries.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

use crate::http::Response;

/// Header recording when an entry was written to disk.
pub const CACHE_TIME_HEADER: &str = "X-Cache-Time";

/// Renders a stored-at timestamp: RFC 3339, UTC, whole seconds.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Reads the stored-at timestamp from a loaded entry.
pub fn stored_at(response: &Response) -> Option<DateTime<Utc>> {
    let raw = response.headers().get(CACHE_TIME_HEADER)?;
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Decides whether a stored entry may still be served.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use chrono::{TimeDelta, Utc};
/// use diskcache::cache::{CACHE_TIME_HEADER, ExpirationPolicy, format_timestamp};
/// use diskcache::http::{Response, StatusCode};
///
/// let now = Utc::now();
/// let entry = Response::new(StatusCode::OK)
///     .header(CACHE_TIME_HEADER, format_timestamp(now - TimeDelta::minutes(5)));
///
/// assert!(ExpirationPolicy::new(Duration::from_secs(60)).is_expired(&entry, now));
/// assert!(!ExpirationPolicy::new(Duration::from_secs(3600)).is_expired(&entry, now));
/// assert!(!ExpirationPolicy::never().is_expired(&entry, now));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    ttl: Duration,
}

impl ExpirationPolicy {
    /// A policy expiring entries older than `ttl`; zero never expires.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn never() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns `true` if `entry` must be refetched at time `now`.
    ///
    /// A missing or unparsable timestamp counts as expired.
    pub fn is_expired(&self, entry: &Response, now: DateTime<Utc>) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        let Some(stored) = stored_at(entry) else {
            return true;
        };
        // A TTL beyond chrono's range cannot be exceeded.
        match TimeDelta::from_std(self.ttl) {
            Ok(ttl) => now.signed_duration_since(stored) > ttl,
            Err(_) => false,
        }
    }
}
