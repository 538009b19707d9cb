//! HTTP fetcher for source pages.
//!
//! [`Fetcher`] owns one `reqwest` client (one connection pool and cookie
//! store per process), the retry policy and the request pacer. Every request
//! carries the same browser-like identity headers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT,
};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument};
use url::Url;

use super::error::FetchError;
use super::rate_limiter::{RateLimiter, parse_retry_after};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};

/// Browser User-Agent sent with every request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";

/// Default connect timeout in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default total request timeout in seconds.
pub const READ_TIMEOUT_SECS: u64 = 30;

/// A fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    /// Response body.
    pub body: String,
}

/// Source of raw pages.
///
/// [`Fetcher`] is the network implementation; tests substitute fixture sources.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches a page with GET.
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// Submits an urlencoded form with POST and returns the response page.
    async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> Result<FetchedPage, FetchError>;
}

/// Construction options for [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FetcherOptions {
    /// Retry policy applied to every request.
    pub retry_policy: RetryPolicy,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub read_timeout: Duration,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
        }
    }
}

/// Retrying, paced HTTP fetcher.
///
/// Cheap to clone; clones share the connection pool and the pacer.
///
/// ```no_run
/// use std::sync::Arc;
/// use pricewatch_core::fetch::{Fetcher, FetcherOptions, PageSource, RateLimiter};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = Fetcher::new(FetcherOptions::default(), Arc::new(RateLimiter::default()))?;
/// let page = fetcher.get("https://www.pricecharting.com/game/pokemon-base-set/charizard-4").await?;
/// println!("{} bytes from {}", page.body.len(), page.url);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
}

enum RequestBody<'a> {
    None,
    Form(&'a str),
}

impl Fetcher {
    /// Builds the fetcher and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the client cannot be built.
    pub fn new(options: FetcherOptions, rate_limiter: Arc<RateLimiter>) -> Result<Self, FetchError> {
        let client = build_client(options.connect_timeout, options.read_timeout)?;
        debug!(
            max_attempts = options.retry_policy.max_attempts(),
            pacing_disabled = rate_limiter.is_disabled(),
            "creating fetcher"
        );
        Ok(Self {
            client,
            retry_policy: options.retry_policy,
            rate_limiter,
        })
    }

    /// Returns the retry policy in use.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    async fn send_once(&self, url: &str, body: &RequestBody<'_>) -> Result<FetchedPage, FetchError> {
        let request = match body {
            RequestBody::None => self.client.get(url),
            RequestBody::Form(form) => self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body((*form).to_string()),
        };

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(FetchError::not_found(url));
        }
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            return Err(FetchError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;

        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }

    #[instrument(skip(self, body), fields(url = %url))]
    async fn send_with_retry(
        &self,
        url: &str,
        body: RequestBody<'_>,
    ) -> Result<FetchedPage, FetchError> {
        if Url::parse(url).is_err() {
            return Err(FetchError::invalid_url(url));
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.rate_limiter.acquire(url).await;

            let error = match self.send_once(url, &body).await {
                Ok(page) => return Ok(page),
                Err(e) => e,
            };

            let failure_type = classify_error(&error);
            let retry_after = if failure_type == FailureType::RateLimited {
                match &error {
                    FetchError::HttpStatus {
                        retry_after: Some(value),
                        ..
                    } => parse_retry_after(value),
                    _ => None,
                }
            } else {
                None
            };
            if let Some(delay) = retry_after {
                self.rate_limiter.record_rate_limit(url, delay).await;
            }

            match self.retry_policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    let delay = retry_after.unwrap_or(delay);
                    info!(
                        attempt = next_attempt,
                        max_attempts = self.retry_policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying fetch"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(attempt, %reason, "not retrying fetch");
                    return Err(error);
                }
            }
        }
    }
}

#[async_trait]
impl PageSource for Fetcher {
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.send_with_retry(url, RequestBody::None).await
    }

    async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> Result<FetchedPage, FetchError> {
        let form = encode_form(fields);
        self.send_with_retry(url, RequestBody::Form(&form)).await
    }
}

/// Encodes `fields` as an `application/x-www-form-urlencoded` body.
#[must_use]
pub fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn build_client(connect_timeout: Duration, read_timeout: Duration) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));

    Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .gzip(true)
        .connect_timeout(connect_timeout)
        .timeout(read_timeout)
        .build()
        .map_err(FetchError::Client)
}
