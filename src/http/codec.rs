//! HTTP/1.1 wire format, using the [`httparse`] crate for the parsing side.
//!
//! Responses are stored on disk exactly as they would travel over a socket:
//! status line, headers, blank line, body. Bodies are always written with an
//! explicit `Content-Length`, so a stored file never needs chunked decoding.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::{Body, Headers, Request, Response, StatusCode, Version};

/// Maximum number of headers we accept in a single response head.
const MAX_HEADERS: usize = 128;

/// Errors produced while decoding HTTP/1.1 bytes.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response is incomplete — more data needed")]
    Incomplete,

    #[error("malformed response head: {0}")]
    Malformed(#[from] httparse::Error),

    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error("header {name} is not valid UTF-8")]
    NonUtf8Header { name: String },

    #[error("invalid Content-Length {0:?}")]
    InvalidContentLength(String),

    #[error("body truncated: expected {expected} bytes, found {found}")]
    TruncatedBody { expected: usize, found: usize },

    #[error("invalid chunk framing")]
    InvalidChunk,
}

/// The status line and headers of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub reason: String,
    pub version: Version,
    pub headers: Headers,
}

impl ResponseHead {
    /// Returns the declared `Content-Length`, if any.
    pub fn content_length(&self) -> Result<Option<usize>, ParseError> {
        match self.headers.get("content-length") {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ParseError::InvalidContentLength(raw.to_owned())),
            None => Ok(None),
        }
    }

    /// Returns `true` if the body is sent with chunked transfer coding.
    pub fn is_chunked(&self) -> bool {
        self.headers
            .get_all("transfer-encoding")
            .flat_map(|v| v.split(','))
            .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
    }

    /// Attaches a body, yielding a full response.
    pub fn into_response(self, body: impl Into<Body>) -> Response {
        Response::new(self.status)
            .version(self.version)
            .reason_phrase(self.reason)
            .headers_from(self.headers)
            .body(body)
    }
}

/// Parses a response head from the start of `buf`.
///
/// Returns `Ok(None)` if the head is not complete yet, otherwise the head and
/// the offset at which the body begins. Both CRLF and bare LF line endings
/// are accepted.
pub fn parse_response_head(buf: &[u8]) -> Result<Option<(ResponseHead, usize)>, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    parse_head_into(buf, &mut headers)
}

fn parse_head_into<'b>(
    buf: &'b [u8],
    headers: &mut [httparse::Header<'b>],
) -> Result<Option<(ResponseHead, usize)>, ParseError> {
    let mut raw = httparse::Response::new(headers);

    let body_offset = match raw.parse(buf)? {
        httparse::Status::Complete(offset) => offset,
        httparse::Status::Partial => return Ok(None),
    };

    // httparse only reports Complete once code and version are present.
    let code = raw.code.unwrap_or_default();
    let status = StatusCode::from_u16(code).ok_or(ParseError::InvalidStatus(code))?;
    let version = Version::from_minor(raw.version.unwrap_or(1));
    let reason = raw.reason.unwrap_or_default().to_owned();

    let mut header_map = Headers::with_capacity(raw.headers.len());
    for header in raw.headers.iter() {
        let value =
            std::str::from_utf8(header.value).map_err(|_| ParseError::NonUtf8Header {
                name: header.name.to_owned(),
            })?;
        header_map.insert(header.name, value);
    }

    Ok(Some((
        ResponseHead {
            status,
            reason,
            version,
            headers: header_map,
        },
        body_offset,
    )))
}

/// Decodes a complete, stored response.
///
/// With a `Content-Length` header, exactly that many body bytes must follow
/// the head; without one, everything after the head is the body. The
/// header count is not capped, since the whole entry is already in memory.
///
/// ```
/// use diskcache::http::codec::decode_response;
///
/// let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi";
/// let response = decode_response(raw).unwrap();
/// assert_eq!(response.status().as_u16(), 200);
/// assert_eq!(response.body_ref().as_bytes().map(|b| &b[..]), Some(&b"hi"[..]));
/// ```
pub fn decode_response(buf: &[u8]) -> Result<Response, ParseError> {
    let parsed = match parse_response_head(buf) {
        Err(ParseError::Malformed(httparse::Error::TooManyHeaders)) => {
            // Every header occupies its own line.
            let lines = buf.iter().filter(|&&b| b == b'\n').count();
            let mut headers = vec![httparse::EMPTY_HEADER; lines];
            parse_head_into(buf, &mut headers)?
        }
        other => other?,
    };
    let (head, offset) = parsed.ok_or(ParseError::Incomplete)?;
    let rest = &buf[offset..];

    let body = match head.content_length()? {
        Some(expected) if rest.len() < expected => {
            return Err(ParseError::TruncatedBody {
                expected,
                found: rest.len(),
            });
        }
        Some(expected) => Bytes::copy_from_slice(&rest[..expected]),
        None if head.is_chunked() => {
            let (body, _) = decode_chunked(rest)?.ok_or(ParseError::Incomplete)?;
            body
        }
        None => Bytes::copy_from_slice(rest),
    };

    Ok(head.into_response(body))
}

/// Serializes a response with the given buffered body.
///
/// Any `Content-Length` or `Transfer-Encoding` headers are replaced by a
/// single `Content-Length` matching `body`, written last.
pub fn encode_response(response: &Response, body: &[u8]) -> BytesMut {
    let headers = response.headers();
    let estimated_size = 128 + headers.len() * 64 + body.len();
    let mut buf = BytesMut::with_capacity(estimated_size);

    // Status line
    buf.put(
        format!(
            "{} {} {}\r\n",
            response.http_version(),
            response.status().as_u16(),
            response.reason()
        )
        .as_bytes(),
    );

    // Headers
    for (name, value) in headers.iter() {
        if is_framing_header(name) {
            continue;
        }
        buf.put(format!("{name}: {value}\r\n").as_bytes());
    }
    buf.put(format!("Content-Length: {}\r\n", body.len()).as_bytes());

    // Header/body separator
    buf.put(&b"\r\n"[..]);
    buf.put(body);

    buf
}

/// Serializes a request in origin form for sending over a fresh connection.
///
/// Adds `Host` when absent, a `Content-Length` when there is a body, and
/// `Connection: close`.
pub fn encode_request(request: &Request, body: &[u8]) -> BytesMut {
    let headers = request.headers();
    let mut buf = BytesMut::with_capacity(128 + headers.len() * 64 + body.len());

    buf.put(
        format!(
            "{} {} {}\r\n",
            request.method(),
            request.target(),
            request.version()
        )
        .as_bytes(),
    );

    if !headers.contains("host") {
        if let Some(host) = request.host() {
            let authority = match request.url().port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_owned(),
            };
            buf.put(format!("Host: {authority}\r\n").as_bytes());
        }
    }

    for (name, value) in headers.iter() {
        if is_framing_header(name) || name.eq_ignore_ascii_case("connection") {
            continue;
        }
        buf.put(format!("{name}: {value}\r\n").as_bytes());
    }

    if !body.is_empty() {
        buf.put(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    buf.put(&b"Connection: close\r\n\r\n"[..]);
    buf.put(body);

    buf
}

/// Decodes a chunked body from the start of `buf`.
///
/// Returns `Ok(None)` if more data is needed, otherwise the reassembled body
/// and the number of bytes consumed (trailers included).
pub fn decode_chunked(buf: &[u8]) -> Result<Option<(Bytes, usize)>, ParseError> {
    let mut body = BytesMut::new();
    let mut pos = 0;

    loop {
        let (size_len, size) = match httparse::parse_chunk_size(&buf[pos..]) {
            Ok(httparse::Status::Complete(pair)) => pair,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(_) => return Err(ParseError::InvalidChunk),
        };
        pos += size_len;

        let size = usize::try_from(size).map_err(|_| ParseError::InvalidChunk)?;
        if size == 0 {
            break;
        }
        let end = pos.checked_add(size).ok_or(ParseError::InvalidChunk)?;
        if buf.len() < end {
            return Ok(None);
        }
        body.put(&buf[pos..end]);
        pos = end;

        match line_end(&buf[pos..]) {
            Some((0, consumed)) => pos += consumed,
            Some(_) => return Err(ParseError::InvalidChunk),
            None => return Ok(None),
        }
    }

    // Trailer section: header lines up to an empty line.
    loop {
        match line_end(&buf[pos..]) {
            Some((0, consumed)) => {
                pos += consumed;
                return Ok(Some((body.freeze(), pos)));
            }
            Some((_, consumed)) => pos += consumed,
            None => return Ok(None),
        }
    }
}

/// Finds the first line terminator, returning the line length and the length
/// including its terminator.
fn line_end(buf: &[u8]) -> Option<(usize, usize)> {
    let nl = buf.iter().position(|&b| b == b'\n')?;
    let len = if nl > 0 && buf[nl - 1] == b'\r' {
        nl - 1
    } else {
        nl
    };
    Some((len, nl + 1))
}

fn is_framing_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("transfer-encoding")
}
