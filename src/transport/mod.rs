//! The "send a request, receive a response" seam.
//!
//! A [`Transport`] is anything that can carry a [`Request`] to an origin and
//! bring back a [`Response`]. The cache wraps one and is one, so layers stack:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use diskcache::{CacheSettings, CacheTransport, Request, Transport, TcpTransport};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = CacheTransport::new(TcpTransport::new(), CacheSettings::default());
//! let shared: Arc<dyn Transport> = Arc::new(cache);
//!
//! let response = shared.send(Request::get("http://example.com/".parse()?)).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::http::{ParseError, Request, Response};

pub mod tcp;

pub use tcp::TcpTransport;

/// Errors produced while exchanging a request with an origin.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid response from upstream: {0}")]
    Parse(#[from] ParseError),

    #[error("unsupported URL scheme {scheme:?}")]
    UnsupportedScheme { scheme: String },

    #[error("request URL has no host")]
    MissingHost,

    #[error("response exceeds maximum allowed size of {max_bytes} bytes")]
    ResponseTooLarge { max_bytes: usize },

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Sends one request and returns the origin's response.
///
/// Implementations are shared across tasks, so they must be `Send + Sync`.
/// Cancellation and deadlines are whatever the implementation supports; a
/// wrapper must not add its own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for &T {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        (**self).send(request).await
    }
}
