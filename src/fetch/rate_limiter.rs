//! Per-domain request pacing with a randomized delay.
//!
//! Every request to a host waits until a uniformly random interval (by
//! default 0.5–1.5s) has passed since the previous request to that host.
//! Together with the worker-pool bound this keeps the crawl rate toward the
//! source site low and irregular. Hosts are tracked independently, so
//! fixtures served from a second host are never slowed by the first.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pricewatch_core::fetch::RateLimiter;
//!
//! # async fn example() {
//! let limiter = Arc::new(RateLimiter::new(
//!     Duration::from_millis(500),
//!     Duration::from_millis(1500),
//! ));
//! limiter.acquire("https://www.pricecharting.com/game/a").await; // immediate
//! limiter.acquire("https://www.pricecharting.com/game/b").await; // waits 0.5-1.5s
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Maximum Retry-After value (1 hour) to prevent excessive delays.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Default lower bound of the per-request delay.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(500);

/// Default upper bound of the per-request delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(1500);

/// Per-domain request pacer shared across workers through `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    max_delay: Duration,
    disabled: bool,
    /// Arc'd so the `DashMap` shard lock is released before awaiting the inner Mutex.
    domains: DashMap<String, Arc<DomainState>>,
}

#[derive(Debug)]
struct DomainState {
    /// `None` until the first request, which is never delayed.
    last_request: Mutex<Option<Instant>>,
    /// Set by a 429 response; the next request waits at least until then.
    blocked_until: Mutex<Option<Instant>>,
}

impl DomainState {
    fn new() -> Self {
        Self {
            last_request: Mutex::new(None),
            blocked_until: Mutex::new(None),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl RateLimiter {
    /// Creates a pacer drawing each delay uniformly from `[min_delay, max_delay]`.
    ///
    /// Bounds given in the wrong order are swapped.
    #[must_use]
    #[instrument(skip_all, fields(min_ms = min_delay.as_millis(), max_ms = max_delay.as_millis()))]
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };
        debug!("creating rate limiter");
        Self {
            min_delay,
            max_delay,
            disabled: false,
            domains: DashMap::new(),
        }
    }

    /// Creates a pacer that never waits. Used by tests and `--no-delay`.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            disabled: true,
            domains: DashMap::new(),
        }
    }

    /// Returns whether pacing is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the configured delay bounds.
    #[must_use]
    pub fn delay_bounds(&self) -> (Duration, Duration) {
        (self.min_delay, self.max_delay)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn draw_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let min_ms = self.min_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }

    /// Waits until a request to the URL's host may be sent.
    #[instrument(skip(self), fields(domain))]
    pub async fn acquire(&self, url: &str) {
        if self.disabled {
            return;
        }

        let domain = extract_domain(url);
        tracing::Span::current().record("domain", &domain);

        let state = self
            .domains
            .entry(domain.clone())
            .or_insert_with(|| Arc::new(DomainState::new()))
            .clone();

        let mut last_request_guard = state.last_request.lock().await;

        if let Some(until) = state.blocked_until.lock().await.take() {
            let now = Instant::now();
            if until > now {
                let wait = until - now;
                debug!(domain = %domain, wait_ms = wait.as_millis(), "honouring server rate limit");
                tokio::time::sleep(wait).await;
            }
        }

        if let Some(last_request) = *last_request_guard {
            let target = self.draw_delay();
            let elapsed = last_request.elapsed();
            if elapsed < target {
                let delay = target.saturating_sub(elapsed);
                debug!(domain = %domain, delay_ms = delay.as_millis(), "pacing request");
                tokio::time::sleep(delay).await;
            }
        } else {
            debug!(domain = %domain, "first request to domain - no delay");
        }

        *last_request_guard = Some(Instant::now());
    }

    /// Records a server-mandated delay (from a Retry-After header) for the URL's host.
    #[instrument(skip(self), fields(domain))]
    pub async fn record_rate_limit(&self, url: &str, delay: Duration) {
        let domain = extract_domain(url);
        tracing::Span::current().record("domain", &domain);

        let state = self
            .domains
            .entry(domain.clone())
            .or_insert_with(|| Arc::new(DomainState::new()))
            .clone();
        *state.blocked_until.lock().await = Some(Instant::now() + delay);

        warn!(
            domain = %domain,
            delay_secs = delay.as_secs(),
            "source is rate limiting requests"
        );
    }
}

/// Extracts the lowercased host from a URL, or `"unknown"` when it has none.
///
/// ```
/// use pricewatch_core::fetch::rate_limiter::extract_domain;
///
/// assert_eq!(extract_domain("https://Www.PriceCharting.com/game/x"), "www.pricecharting.com");
/// assert_eq!(extract_domain("http://127.0.0.1:8080/x"), "127.0.0.1");
/// assert_eq!(extract_domain("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a Retry-After header value (integer seconds or HTTP-date).
///
/// Returns `None` if the value cannot be parsed. Caps excessive values at 1 hour.
///
/// ```
/// use std::time::Duration;
/// use pricewatch_core::fetch::rate_limiter::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        return Some(duration.min(MAX_RETRY_AFTER));
    }

    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        let delay = datetime
            .duration_since(std::time::SystemTime::now())
            .unwrap_or(Duration::ZERO);
        Some(delay.min(MAX_RETRY_AFTER))
    } else {
        debug!(header_value, "unparseable Retry-After value");
        None
    }
}
