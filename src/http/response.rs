//! HTTP responses as received from a transport or loaded from the cache.

use std::io;

use bytes::Bytes;

use super::{Body, Headers, StatusCode, Version};

/// An HTTP/1.x response.
///
/// # Examples
///
/// ```
/// use diskcache::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// assert_eq!(response.status(), StatusCode::OK);
/// assert_eq!(response.reason(), "OK");
/// assert_eq!(response.headers().get("content-type"), Some("application/json"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    reason: Option<String>,
    version: Version,
    headers: Headers,
    body: Body,
}

impl Response {
    /// Creates a new HTTP/1.1 response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            version: Version::Http11,
            headers: Headers::new(),
            body: Body::empty(),
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the response body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Overrides the reason phrase written on the status line.
    #[must_use]
    pub fn reason_phrase(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Replaces the whole header map.
    #[must_use]
    pub fn headers_from(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the reason phrase: the one received, else the canonical one,
    /// else an empty string.
    pub fn reason(&self) -> &str {
        self.reason
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }

    pub fn http_version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body_ref(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Consumes the response and returns its full body.
    pub async fn into_body_bytes(mut self) -> io::Result<Bytes> {
        self.body.buffer().await
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}
