//! Conditional HTTP fetching.
//!
//! [`UrlConnector`] is the seam between caching handles and the network.
//! [`HttpConnector`] is the default implementation on top of a blocking
//! `reqwest` client with:
//! - `If-None-Match` revalidation from a stored ETag
//! - retry with exponential backoff on server errors and rate limiting
//! - configurable timeouts, proxy and User-Agent

use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_USER_AGENT: &str = "bnd-resolve/0.0.1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Max retries exceeded for {url}")]
    MaxRetries { url: String },

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Result of a (possibly conditional) fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    /// The server confirmed the stored ETag is current
    NotModified,
    /// A full body, with the server's ETag if it sent one
    Content { body: Vec<u8>, etag: Option<String> },
}

/// Fetches remote URLs, optionally revalidating against an ETag.
pub trait UrlConnector: Send + Sync {
    fn fetch(&self, url: &Url, etag: Option<&str>) -> Result<FetchResponse, HttpError>;
}

pub struct HttpConnector {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpConnector {
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(HttpConnectorConfig::default())
    }

    pub fn with_config(config: HttpConnectorConfig) -> Result<Self, HttpError> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .user_agent(&config.user_agent);

        if let Some(proxy_url) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: builder.build()?,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        })
    }

    fn execute(&self, url: &Url, etag: Option<&str>) -> Result<FetchResponse, HttpError> {
        let mut request = self.client.get(url.clone());
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send()?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchResponse::NotModified);
        }
        if !status.is_success() {
            return Err(HttpError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes()?.to_vec();
        Ok(FetchResponse::Content { body, etag })
    }

    /// Delay before retry `attempt + 1`: the base delay doubled per attempt, capped.
    fn backoff(&self, attempt: u32) -> Duration {
        2_u32
            .checked_pow(attempt)
            .and_then(|factor| self.retry_delay.checked_mul(factor))
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    }

    fn is_retryable(error: &HttpError) -> bool {
        match error {
            HttpError::HttpStatus { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            HttpError::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl UrlConnector for HttpConnector {
    fn fetch(&self, url: &Url, etag: Option<&str>) -> Result<FetchResponse, HttpError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HttpError::UnsupportedScheme(url.scheme().to_string()));
        }

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match self.execute(url, etag) {
                Ok(response) => return Ok(response),
                Err(e) if Self::is_retryable(&e) => {
                    log::debug!("Attempt {} for {} failed: {}", attempt + 1, url, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }

            if attempt < self.max_retries {
                std::thread::sleep(self.backoff(attempt));
            }
        }

        Err(last_error.unwrap_or_else(|| HttpError::MaxRetries {
            url: url.to_string(),
        }))
    }
}

/// Connector for repositories that never leave the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineConnector;

impl UrlConnector for OfflineConnector {
    fn fetch(&self, url: &Url, _etag: Option<&str>) -> Result<FetchResponse, HttpError> {
        Err(HttpError::UnsupportedScheme(url.scheme().to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct HttpConnectorConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub proxy: Option<String>,
    pub user_agent: String,
}

impl Default for HttpConnectorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let connector = HttpConnector::with_config(HttpConnectorConfig {
            retry_delay: Duration::from_millis(100),
            max_retries: 64,
            ..HttpConnectorConfig::default()
        })
        .unwrap();

        assert_eq!(connector.backoff(0), Duration::from_millis(100));
        assert_eq!(connector.backoff(3), Duration::from_millis(800));
        assert_eq!(connector.backoff(12), MAX_RETRY_DELAY);
        assert_eq!(connector.backoff(40), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_backoff_with_huge_delay() {
        let connector = HttpConnector::with_config(HttpConnectorConfig {
            retry_delay: Duration::from_secs(u64::MAX / 2),
            ..HttpConnectorConfig::default()
        })
        .unwrap();
        assert_eq!(connector.backoff(5), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_retryable_statuses() {
        let status = |status| HttpError::HttpStatus {
            status,
            url: "http://example.com".into(),
        };
        assert!(HttpConnector::is_retryable(&status(503)));
        assert!(HttpConnector::is_retryable(&status(429)));
        assert!(!HttpConnector::is_retryable(&status(404)));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let connector = HttpConnector::new().unwrap();
        let url = Url::parse("ftp://example.com/index.json").unwrap();
        assert!(matches!(
            connector.fetch(&url, None),
            Err(HttpError::UnsupportedScheme(_))
        ));
    }
}
