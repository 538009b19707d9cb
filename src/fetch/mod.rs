//! Fetching source pages.
//!
//! - [`Fetcher`] - retrying, paced HTTP GET/POST with fixed identity headers
//! - [`PageSource`] - the fetch seam used by the matcher, scrape cycle and catalog sync
//! - [`RetryPolicy`] / [`classify_error`] - bounded exponential backoff
//! - [`RateLimiter`] - randomized per-domain request spacing
//!
//! A 404 (or 410) surfaces immediately as [`FetchError::NotFound`]; every
//! other failure is retried up to the policy limit when it is transient.

mod client;
mod error;
pub mod rate_limiter;
mod retry;

pub use client::{
    BROWSER_USER_AGENT, CONNECT_TIMEOUT_SECS, FetchedPage, Fetcher, FetcherOptions, PageSource,
    READ_TIMEOUT_SECS, encode_form,
};
pub use error::FetchError;
pub use rate_limiter::RateLimiter;
pub use retry::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES,
    FailureType, RetryDecision, RetryPolicy, classify_error,
};
