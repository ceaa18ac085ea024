//! # diskcache
//!
//! A transparent on-disk response cache for async HTTP client transports.
//!
//! Wrap any [`Transport`] in a [`CacheTransport`]: requests to configured
//! domains are fingerprinted, and a fresh stored response is served without a
//! network call. Misses are forwarded and successful responses written to
//! disk in HTTP/1.1 wire format, one file per request fingerprint.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use diskcache::{CacheSettings, CacheTransport, Request, TcpTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = CacheSettings::new(".cache/http").ttl(Duration::from_secs(3600));
//!     let client = CacheTransport::new(TcpTransport::new(), settings);
//!
//!     let response = client.round_trip(Request::get("http://example.com/".parse()?)).await?;
//!     println!("{}", response.status());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod fs;
pub mod http;
pub mod transport;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheError, CacheKey, CacheTransport};
pub use config::{CacheSettings, ConfigError, PersistErrorPolicy};
pub use http::{Body, Headers, Method, Request, Response, StatusCode};
pub use transport::{TcpTransport, Transport, TransportError};
