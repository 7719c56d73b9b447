//! Streaming HTTP downloads with progress and mirror fallback.
//!
//! [`ProgressiveFetcher::fetch`] streams one response body and reports the
//! cumulative byte count after every chunk.
//! [`ProgressiveFetcher::fetch_with_fallback`] walks an ordered list of
//! equivalent sources, bounding each attempt with a timeout, and stops at
//! the first success.

mod error;

pub use error::{FetchError, ACQUISITION_MESSAGE};

use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::progress::ByteProgress;

/// Upper bound on the buffer reserved from a `Content-Length` header.
const MAX_PREALLOCATION: usize = 64 * 1024 * 1024;

/// Downloads binary assets while reporting byte progress.
#[derive(Debug, Clone)]
pub struct ProgressiveFetcher {
    client: Client,
}

impl ProgressiveFetcher {
    /// Creates a fetcher with a default HTTP client.
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(format!("audio-extractor/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Creates a fetcher around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Downloads `url`, invoking `on_bytes` after each received chunk.
    pub async fn fetch<F>(&self, url: &str, mut on_bytes: F) -> Result<Vec<u8>, FetchError>
    where
        F: FnMut(ByteProgress),
    {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::transport(
                url,
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let total = response.content_length();
        let mut body = Vec::with_capacity(initial_capacity(total));
        let mut received: u64 = 0;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::transport(url, e))?;
            received += chunk.len() as u64;
            body.extend_from_slice(&chunk);
            on_bytes(ByteProgress { received, total });
        }

        debug!("Fetched {} bytes from {}", received, url);
        Ok(body)
    }

    /// Tries each source in order until one succeeds.
    ///
    /// Each attempt is raced against `timeout`; whichever settles first
    /// wins and a late response is discarded. Returns
    /// [`FetchError::Acquisition`] only after every source has failed.
    pub async fn fetch_with_fallback<F>(
        &self,
        urls: &[String],
        mut on_bytes: F,
        timeout: Duration,
    ) -> Result<Vec<u8>, FetchError>
    where
        F: FnMut(ByteProgress),
    {
        let mut failures = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().enumerate() {
            info!("Downloading {} (source {}/{})", url, index + 1, urls.len());

            let err = match tokio::time::timeout(timeout, self.fetch(url, &mut on_bytes)).await {
                Ok(Ok(body)) => return Ok(body),
                Ok(Err(e)) => e,
                Err(_) => FetchError::Timeout {
                    url: url.clone(),
                    timeout_secs: timeout.as_secs(),
                },
            };

            warn!("Source {} failed: {}", url, err);
            failures.push(err.to_string());
        }

        Err(FetchError::Acquisition { failures })
    }
}

/// Buffer to reserve for a body. The header is untrusted, so anything
/// beyond [`MAX_PREALLOCATION`] grows on demand.
fn initial_capacity(content_length: Option<u64>) -> usize {
    content_length
        .map(|len| usize::try_from(len).unwrap_or(usize::MAX))
        .unwrap_or(0)
        .min(MAX_PREALLOCATION)
}
