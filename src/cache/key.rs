//! Cache key derivation.
//!
//! A request is rendered into a canonical byte buffer and hashed into a
//! version-5 UUID. The rendering is:
//!
//! ```text
//! METHOD "\n"
//! len ":" name len ":" sorted,values     for each lower-cased header name, sorted
//! "\n" URL "\n"
//! BODY
//! ```
//!
//! Names and joined values are length-prefixed in decimal, so header bytes
//! cannot spill into a neighbouring field. A serialized URL never contains a
//! newline, which fixes where the body starts.
//!
//! Header insertion order, name casing, and the order of repeated values do not
//! affect the key; the method, URL, any header value, or any body byte do.

use std::fmt;
use std::io;

use bytes::{BufMut, BytesMut};
use uuid::Uuid;

use crate::http::Request;

/// A stable, file-name-safe identifier for a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives the cache key for `request`.
///
/// A streamed body is read into memory and put back as a buffered copy, so the
/// request can still be forwarded byte for byte afterwards.
///
/// # Errors
///
/// Returns the I/O error if the body stream cannot be read to the end.
///
/// # Examples
///
/// ```
/// use diskcache::cache::derive_key;
/// use diskcache::http::Request;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let url: url::Url = "http://example.com/a".parse().unwrap();
/// let mut one = Request::get(url.clone()).header("A", "1").header("B", "2");
/// let mut two = Request::get(url).header("B", "2").header("A", "1");
///
/// assert_eq!(derive_key(&mut one).await.unwrap(), derive_key(&mut two).await.unwrap());
/// # }
/// ```
pub async fn derive_key(request: &mut Request) -> io::Result<CacheKey> {
    let body = request.body_mut().buffer().await?;
    let canonical = canonical_bytes(request, &body);
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, &canonical);
    Ok(CacheKey(id.hyphenated().to_string()))
}

/// Renders the buffer that [`derive_key`] hashes.
fn canonical_bytes(request: &Request, body: &[u8]) -> BytesMut {
    let url = request.url().as_str();
    let mut buf = BytesMut::with_capacity(64 + request.headers().len() * 48 + url.len() + body.len());

    buf.put(request.method().as_str().as_bytes());
    buf.put_u8(b'\n');
    for (name, values) in request.headers().sorted_groups() {
        put_field(&mut buf, name.as_bytes());
        put_field(&mut buf, values.join(",").as_bytes());
    }
    buf.put_u8(b'\n');
    buf.put(url.as_bytes());
    buf.put_u8(b'\n');
    buf.put(body);

    buf
}

fn put_field(buf: &mut BytesMut, field: &[u8]) {
    buf.put(field.len().to_string().as_bytes());
    buf.put_u8(b':');
    buf.put(field);
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::{AsyncRead, ReadBuf};

    use super::*;
    use crate::http::{Body, Method};

    fn get(url: &str) -> Request {
        Request::get(url.parse().unwrap())
    }

    async fn key(mut request: Request) -> CacheKey {
        derive_key(&mut request).await.unwrap()
    }

    #[test]
    fn canonical_layout() {
        let req = get("http://example.com/p?q=1")
            .header("X-B", "2")
            .header("x-a", "z")
            .header("X-A", "y");
        let bytes = canonical_bytes(&req, b"BODY");
        assert_eq!(
            &bytes[..],
            b"GET\n4:x-a3:y,z4:x-b1:2\nhttp://example.com/p?q=1\nBODY"
        );
    }

    #[tokio::test]
    async fn key_is_a_uuid() {
        let k = key(get("http://example.com/")).await;
        let parsed = Uuid::parse_str(k.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 5);
        assert_eq!(k.as_str().len(), 36);
    }

    #[tokio::test]
    async fn deterministic_across_header_order() {
        let a = get("http://example.com/")
            .header("Accept", "text/html")
            .header("Accept", "application/json")
            .header("User-Agent", "x");
        let b = get("http://example.com/")
            .header("user-agent", "x")
            .header("accept", "application/json")
            .header("ACCEPT", "text/html");
        assert_eq!(key(a).await, key(b).await);
    }

    #[tokio::test]
    async fn sensitive_to_every_input() {
        let base = key(get("http://example.com/a?x=1").header("H", "v").body("b")).await;

        let method = Request::new(Method::Post, "http://example.com/a?x=1".parse().unwrap())
            .header("H", "v")
            .body("b");
        let variants = vec![
            method,
            get("http://example.com/a?x=2").header("H", "v").body("b"),
            get("http://example.com/b?x=1").header("H", "v").body("b"),
            get("http://example.org/a?x=1").header("H", "v").body("b"),
            get("http://example.com/a?x=1").header("H", "w").body("b"),
            get("http://example.com/a?x=1").header("H", "v").header("H", "v").body("b"),
            get("http://example.com/a?x=1").header("G", "v").body("b"),
            get("http://example.com/a?x=1").body("b"),
            get("http://example.com/a?x=1").header("H", "v").body("c"),
            get("http://example.com/a?x=1").header("H", "v"),
            get("http://example.com/a?x=1b").header("H", "v"),
            get("http://example.com/a?x=1").header("H", "v;b:1").body("b"),
            get("http://example.com/a?x=1")
                .header("H", "v")
                .header("b", "1")
                .body("b"),
        ];

        let mut seen = vec![base];
        for variant in variants {
            let k = key(variant).await;
            assert!(!seen.contains(&k), "collision on {k}");
            seen.push(k);
        }
    }

    #[tokio::test]
    async fn url_and_body_do_not_run_together() {
        let a = key(get("http://example.com/ab")).await;
        let b = key(get("http://example.com/a").body("b")).await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn header_values_cannot_fake_extra_headers() {
        let one = key(get("http://example.com/").header("a", "1;b:2")).await;
        let two = key(get("http://example.com/").header("a", "1").header("b", "2")).await;
        assert_ne!(one, two);

        let nested = key(get("http://example.com/").header("a", "1").header("a1", "2")).await;
        let spliced = key(get("http://example.com/").header("a", "13:a1:2")).await;
        assert_ne!(nested, spliced);
    }

    #[tokio::test]
    async fn stream_body_is_restored() {
        let mut streamed = get("http://example.com/").body(Body::from_reader(&b"payload"[..]));
        let from_stream = derive_key(&mut streamed).await.unwrap();

        assert_eq!(
            streamed.body_mut().buffer().await.unwrap().as_ref(),
            b"payload"
        );
        assert_eq!(from_stream, key(get("http://example.com/").body("payload")).await);
    }

    struct FailAfter(usize);

    impl AsyncRead for FailAfter {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.0 == 0 {
                return Poll::Ready(Err(io::Error::other("disk on fire")));
            }
            self.0 -= 1;
            buf.put_slice(b"x");
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn unreadable_body_fails() {
        let mut req = get("http://example.com/").body(Body::from_reader(FailAfter(3)));
        let err = derive_key(&mut req).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
