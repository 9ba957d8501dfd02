//! Outbound HTTP plumbing shared by the resolver and the catalog downloads.
//!
//! [`Fetcher`] wraps one reqwest [`Client`] built with the project's shared
//! networking policy (timeouts, user-agent, gzip) plus the per-domain
//! [`RequestPacer`]. The strict `get`/`get_text` calls surface a
//! [`FetchError`]; the resolver layer uses [`Fetcher::try_get`], which
//! degrades every failure to `None` since an unreachable candidate page is a
//! legitimate "no result" there, never an abort.

mod pacer;

pub use pacer::RequestPacer;

use std::sync::Arc;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::FetchSettings;
use crate::text;

/// Errors from a single fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (DNS, connection refused, TLS, ...).
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request exceeded the configured timeout.
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Non-2xx response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// The URL could not be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// HTTP client construction failed.
    #[error("HTTP client construction failed: {detail}")]
    ClientBuild { detail: String },
}

impl FetchError {
    fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// One fetched response body, with the post-redirect URL kept for resolving
/// relative links against the page's own location.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub final_url: Url,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FetchedBody {
    /// True when the server declared an HTML body.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }

    /// True when the body is a PDF document (magic bytes win over the
    /// declared content type, which registry mirrors frequently get wrong).
    #[must_use]
    pub fn is_pdf(&self) -> bool {
        self.bytes.starts_with(b"%PDF")
            || self
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/pdf"))
    }
}

/// Paced HTTP fetcher.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    pacer: Arc<RequestPacer>,
}

impl Fetcher {
    /// Builds a fetcher from the shared settings.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when client construction fails.
    pub fn new(settings: &FetchSettings, pacer: Arc<RequestPacer>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.read_timeout)
            .user_agent(settings.user_agent.clone())
            .gzip(true)
            .build()
            .map_err(|e| FetchError::ClientBuild {
                detail: e.to_string(),
            })?;
        Ok(Self { client, pacer })
    }

    /// Fetches `url`, enforcing the pacing delay first.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on invalid URL, transport failure, timeout, or
    /// a non-2xx status.
    pub async fn get(&self, url: &str) -> Result<FetchedBody, FetchError> {
        if Url::parse(url).is_err() {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        }

        self.pacer.acquire(url).await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        Ok(FetchedBody {
            final_url,
            content_type,
            bytes: bytes.to_vec(),
        })
    }

    /// Fetches `url` and returns its body as normalized text.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Fetcher::get`].
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let body = self.get(url).await?;
        Ok(text::normalize_bytes(&body.bytes))
    }

    /// Best-effort fetch: any failure is logged at debug level and swallowed
    /// to `None`.
    pub async fn try_get(&self, url: &str) -> Option<FetchedBody> {
        match self.get(url).await {
            Ok(body) => Some(body),
            Err(error) => {
                debug!(url = %url, error = %error, "candidate fetch failed; continuing");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn body(content_type: Option<&str>, bytes: &[u8]) -> FetchedBody {
        FetchedBody {
            final_url: Url::parse("https://example.com/x").unwrap(),
            content_type: content_type.map(str::to_string),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_is_html_from_content_type() {
        assert!(body(Some("text/html; charset=utf-8"), b"<html>").is_html());
        assert!(!body(Some("application/pdf"), b"%PDF-1.4").is_html());
        assert!(!body(None, b"<html>").is_html());
    }

    #[test]
    fn test_is_pdf_magic_bytes_beat_content_type() {
        assert!(body(Some("text/html"), b"%PDF-1.7 rest").is_pdf());
        assert!(body(Some("application/pdf"), b"whatever").is_pdf());
        assert!(!body(Some("text/html"), b"<html>").is_pdf());
    }

    #[tokio::test]
    async fn test_get_rejects_invalid_url_without_network() {
        let fetcher = Fetcher::new(
            &crate::config::FetchSettings::default(),
            Arc::new(RequestPacer::disabled()),
        )
        .unwrap();
        let error = fetcher.get("not a url").await.unwrap_err();
        assert!(matches!(error, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_try_get_swallows_failures() {
        let fetcher = Fetcher::new(
            &crate::config::FetchSettings::default(),
            Arc::new(RequestPacer::disabled()),
        )
        .unwrap();
        assert!(fetcher.try_get("not a url").await.is_none());
    }
}
