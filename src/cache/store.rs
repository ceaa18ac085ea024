//! On-disk response store: one file per key, in HTTP/1.1 wire format.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};
use uuid::Uuid;

use super::CacheError;
use super::expiry::{CACHE_TIME_HEADER, format_timestamp};
use crate::fs::Filesystem;
use crate::http::{Response, codec};

/// Longest key accepted as a file name.
const MAX_KEY_LEN: usize = 128;

/// Persists and retrieves responses under a root directory.
///
/// Each entry lives at `<root>/<key>`. Writes go to a hidden temporary file in
/// the same directory which is then renamed over the entry, so a reader sees
/// either the old entry or the new one, never a partial file.
///
/// Concurrent saves of the same key are last-writer-wins.
#[derive(Debug, Clone)]
pub struct Store<F> {
    fs: F,
    root: PathBuf,
}

impl<F: Filesystem> Store<F> {
    pub fn new(fs: F, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file backing `key`.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidKey`] unless `key` is 1–128 characters of ASCII
    /// letters, digits, `-` or `_`.
    pub fn entry_path(&self, key: &str) -> Result<PathBuf, CacheError> {
        let valid = !key.is_empty()
            && key.len() <= MAX_KEY_LEN
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(CacheError::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(key))
    }

    /// Returns `true` if an entry file exists for `key`.
    ///
    /// Invalid keys and stat failures read as "not stored".
    pub async fn exists(&self, key: &str) -> bool {
        match self.entry_path(key) {
            Ok(path) => self.fs.exists(&path).await,
            Err(_) => false,
        }
    }

    /// Reads and parses the entry for `key`.
    pub async fn load(&self, key: &str) -> Result<Response, CacheError> {
        let path = self.entry_path(key)?;
        let bytes = self.fs.read(&path).await?;
        trace!(key, bytes = bytes.len(), "entry read");
        Ok(codec::decode_response(&bytes)?)
    }

    /// Persists `response` under `key`, stamped with the current time.
    ///
    /// See [`save_at`](Self::save_at).
    pub async fn save(&self, key: &str, response: &mut Response) -> Result<(), CacheError> {
        self.save_at(key, response, Utc::now()).await
    }

    /// Persists `response` under `key`, stamped with `at`.
    ///
    /// The body is buffered in place, so `response` stays fully readable for
    /// the caller. Its `X-Cache-Time` header is set to `at`, and its framing
    /// headers are replaced by the `Content-Length` of the buffered body, so the
    /// caller sees the same headers a later hit would.
    pub async fn save_at(
        &self,
        key: &str,
        response: &mut Response,
        at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let path = self.entry_path(key)?;
        let body = response.body_mut().buffer().await?;
        let headers = response.headers_mut();
        headers.set(CACHE_TIME_HEADER, format_timestamp(at));
        headers.remove("transfer-encoding");
        headers.remove("content-length");
        // Last, where the encoder writes it.
        headers.insert("Content-Length", body.len().to_string());

        let wire = codec::encode_response(response, &body);

        self.fs.create_dir_all(&self.root).await?;
        let temp = self.root.join(format!(".{key}.{}.tmp", Uuid::new_v4().simple()));
        let written = match self.fs.write(&temp, &wire).await {
            Ok(()) => self.fs.rename(&temp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            self.fs.remove(&temp).await.ok();
            return Err(e.into());
        }

        debug!(key, bytes = wire.len(), "entry written");
        Ok(())
    }
}
