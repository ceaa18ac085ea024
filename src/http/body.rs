//! Message bodies: buffered bytes or a single-pass async stream.
//!
//! A streamed body can be read once. [`Body::buffer`] drains it into memory and
//! swaps the stream for the buffered copy, after which any number of consumers
//! can take cheap [`Bytes`] clones of the same payload.

use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A boxed single-pass body reader.
pub type BodyStream = Pin<Box<dyn AsyncRead + Send + Sync>>;

/// An HTTP message body.
///
/// # Examples
///
/// ```
/// use diskcache::http::Body;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut body = Body::from_reader(&b"streamed"[..]);
/// assert!(!body.is_buffered());
///
/// let first = body.buffer().await.unwrap();
/// let second = body.buffer().await.unwrap();
/// assert_eq!(first, second);
/// assert!(body.is_buffered());
/// # }
/// ```
pub enum Body {
    Full(Bytes),
    Stream(BodyStream),
}

impl Body {
    /// An empty buffered body.
    pub fn empty() -> Self {
        Body::Full(Bytes::new())
    }

    /// Wraps a reader that will be drained on first use.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        Body::Stream(Box::pin(reader))
    }

    /// Returns `true` once the payload is held in memory.
    pub fn is_buffered(&self) -> bool {
        matches!(self, Body::Full(_))
    }

    /// Returns the buffered payload, or `None` if the body is still a stream.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::Full(bytes) => Some(bytes),
            Body::Stream(_) => None,
        }
    }

    /// Reads the whole body into memory and leaves a re-readable copy in place.
    ///
    /// On a read error the stream is left where it stopped; the partial data
    /// is discarded.
    pub async fn buffer(&mut self) -> io::Result<Bytes> {
        match self {
            Body::Full(bytes) => Ok(bytes.clone()),
            Body::Stream(reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                let bytes = Bytes::from(buf);
                *self = Body::Full(bytes.clone());
                Ok(bytes)
            }
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Full(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Full(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Full(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Full(Bytes::from_static(text.as_bytes()))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Body::Full(Bytes::from_static(bytes))
    }
}
