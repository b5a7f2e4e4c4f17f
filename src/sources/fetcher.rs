use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::errors::{PithyError, PithyResult};

/// Maximum accepted feed body (5 MiB).
pub const MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const MAX_REDIRECTS: usize = 5;
const USER_AGENT: &str = concat!("pithy/", env!("CARGO_PKG_VERSION"), " (feed aggregator)");

/// Result of one conditional GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    NotModified,
    Fetched {
        body: Vec<u8>,
        etag: Option<String>,
    },
}

/// Conditional HTTP fetcher. Never retries; a failed request is reported
/// once and the next scheduling cycle tries again.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> PithyResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str, etag: Option<&str>) -> PithyResult<FetchResponse> {
        let mut request = self.client.get(url);
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let mut response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            debug!(url, "feed not modified");
            return Ok(FetchResponse::NotModified);
        }
        if !status.is_success() {
            return Err(PithyError::HttpStatus(status.as_u16()));
        }

        if let Some(length) = response.content_length() {
            if length > MAX_FEED_SIZE {
                return Err(PithyError::FeedTooLarge(length));
            }
        }

        let new_etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let total = (body.len() + chunk.len()) as u64;
            if total > MAX_FEED_SIZE {
                return Err(PithyError::FeedTooLarge(total));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url, bytes = body.len(), "feed fetched");
        Ok(FetchResponse::Fetched {
            body,
            etag: new_etag,
        })
    }
}
