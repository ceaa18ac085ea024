//! Fetches a URL twice through the disk cache.
//!
//! ```text
//! RUST_LOG=diskcache=debug cargo run --example fetch -- http://example.com/ [settings.json]
//! ```
//!
//! The second fetch is answered from the cache directory without a network
//! round trip.

use std::time::Instant;

use diskcache::{CacheSettings, CacheTransport, Request, TcpTransport};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "http://example.com/".to_owned());
    let settings = match args.next() {
        Some(path) => CacheSettings::from_file(path)?,
        None => CacheSettings::default(),
    };

    info!(path = %settings.path.display(), ttl_secs = settings.ttl_secs, "cache configured");
    let client = CacheTransport::new(TcpTransport::new(), settings);

    for attempt in 1..=2 {
        let started = Instant::now();
        let response = client.round_trip(Request::get(url.parse()?)).await?;
        let status = response.status();
        let body = response.into_body_bytes().await?;
        info!(
            attempt,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched"
        );
    }

    Ok(())
}
