//! Plain-text HTTP/1.1 client transport over Tokio TCP.
//!
//! Opens one connection per request, sends `Connection: close`, and reads the
//! response until its framing says it is complete (Content-Length, chunked,
//! or end of stream).

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::{Transport, TransportError};
use crate::http::{Method, Request, Response, StatusCode, codec};

/// Maximum size of a complete HTTP response we will buffer before rejecting it (64 MiB).
pub const MAX_RESPONSE_SIZE: usize = 64 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// An HTTP/1.1 client for `http://` URLs.
///
/// # Examples
///
/// ```rust,no_run
/// use diskcache::{Request, Transport, TcpTransport};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let transport = TcpTransport::new();
///     let response = transport.send(Request::get("http://example.com/".parse()?)).await?;
///     println!("{}", response.status());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TcpTransport {
    max_response_size: usize,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self {
            max_response_size: MAX_RESPONSE_SIZE,
        }
    }

    /// Caps the number of bytes buffered for a single response.
    #[must_use]
    pub fn max_response_size(mut self, max_bytes: usize) -> Self {
        self.max_response_size = max_bytes;
        self
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, mut request: Request) -> Result<Response, TransportError> {
        let url = request.url();
        if url.scheme() != "http" {
            return Err(TransportError::UnsupportedScheme {
                scheme: url.scheme().to_owned(),
            });
        }
        let host = url.host_str().ok_or(TransportError::MissingHost)?.to_owned();
        let port = url.port_or_known_default().unwrap_or(80);

        let body = request.body_mut().buffer().await?;
        let wire = codec::encode_request(&request, &body);

        debug!(
            method = %request.method(),
            host = %host,
            port,
            target = %request.target(),
            "sending request"
        );

        let mut stream = TcpStream::connect((host.as_str(), port)).await?;
        stream.write_all(&wire).await?;
        stream.flush().await?;

        let head_only = *request.method() == Method::Head;
        let response = read_response(&mut stream, head_only, self.max_response_size).await?;
        debug!(host = %host, status = response.status().as_u16(), "response received");
        Ok(response)
    }
}

/// How the end of a response body is found.
enum Framing {
    Empty,
    Length(usize),
    Chunked,
    UntilClose,
}

/// Reads one full response from `stream`.
///
/// First we read until the head parses, then keep reading until the body is
/// complete according to its framing. Replies to `HEAD` and 1xx, 204 and 304
/// responses never carry a body, whatever their headers declare.
async fn read_response(
    stream: &mut TcpStream,
    head_only: bool,
    max_bytes: usize,
) -> Result<Response, TransportError> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    let (head, offset) = loop {
        if let Some(parsed) = codec::parse_response_head(&buf)? {
            break parsed;
        }
        if fill(stream, &mut buf, max_bytes).await? == 0 {
            return Err(unexpected_eof());
        }
    };

    let status = head.status;
    let bodiless = head_only
        || (100..200).contains(&status.as_u16())
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED;

    let framing = if bodiless {
        Framing::Empty
    } else if let Some(len) = head.content_length()? {
        Framing::Length(len)
    } else if head.is_chunked() {
        Framing::Chunked
    } else {
        Framing::UntilClose
    };

    let limit = max_bytes.saturating_sub(offset);
    let mut body = buf.split_off(offset);
    let bytes = match framing {
        Framing::Empty => Bytes::new(),
        Framing::Length(len) => {
            while body.len() < len {
                if fill(stream, &mut body, limit).await? == 0 {
                    return Err(unexpected_eof());
                }
            }
            body.truncate(len);
            body.freeze()
        }
        Framing::Chunked => loop {
            if let Some((bytes, _)) = codec::decode_chunked(&body)? {
                break bytes;
            }
            if fill(stream, &mut body, limit).await? == 0 {
                return Err(unexpected_eof());
            }
        },
        Framing::UntilClose => {
            while fill(stream, &mut body, limit).await? > 0 {}
            body.freeze()
        }
    };

    Ok(head.into_response(bytes))
}

/// Reads more bytes into `buf`, refusing to grow it past `max_bytes`.
async fn fill(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    max_bytes: usize,
) -> Result<usize, TransportError> {
    if buf.len() > max_bytes {
        warn!(max_bytes, "upstream response too large — aborting");
        return Err(TransportError::ResponseTooLarge { max_bytes });
    }
    Ok(stream.read_buf(buf).await?)
}

fn unexpected_eof() -> TransportError {
    TransportError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "connection closed before response was complete",
    ))
}
