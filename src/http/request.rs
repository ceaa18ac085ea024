//! Outgoing HTTP requests.

use url::Url;

use super::{Body, Headers, Method, Version};

/// An HTTP request addressed to an absolute URL.
///
/// Built with a fluent API and handed to a
/// [`Transport`](crate::transport::Transport).
///
/// # Examples
///
/// ```
/// use diskcache::http::{Method, Request};
///
/// let request = Request::get("http://api.example.com/items?page=2".parse().unwrap())
///     .header("Accept", "application/json");
///
/// assert_eq!(request.method(), &Method::Get);
/// assert_eq!(request.host(), Some("api.example.com"));
/// assert_eq!(request.target(), "/items?page=2");
/// assert_eq!(request.headers().get("accept"), Some("application/json"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    version: Version,
    headers: Headers,
    body: Body,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            version: Version::Http11,
            headers: Headers::new(),
            body: Body::empty(),
        }
    }

    /// Shorthand for `Request::new(Method::Get, url)`.
    pub fn get(url: Url) -> Self {
        Self::new(Method::Get, url)
    }

    /// Shorthand for `Request::new(Method::Post, url)`.
    pub fn post(url: Url) -> Self {
        Self::new(Method::Post, url)
    }

    /// Appends a request header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the full request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the hostname of the target URL, without port.
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Returns the origin-form request target: path plus query string.
    pub fn target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_owned(),
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the request body.
    pub fn body_ref(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }
}
