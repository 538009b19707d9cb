//! TOML configuration merged over built-in defaults.
//!
//! Every key is optional. Resolution order for each value is command line,
//! then config file, then the default below.
//!
//! ```toml
//! [source]
//! base_url = "https://www.pricecharting.com"
//!
//! [fetch]
//! max_retries = 3
//! min_request_delay_ms = 500
//! max_request_delay_ms = 1500
//!
//! [pricing]
//! half_life_days = 21.0
//! eligibility_threshold = 15.0
//!
//! [sync]
//! workers = 3
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::extract::default_grade_tiers;
use crate::fetch::{
    CONNECT_TIMEOUT_SECS, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY,
    DEFAULT_MAX_RETRIES, FetcherOptions, READ_TIMEOUT_SECS, RateLimiter, RetryPolicy,
    rate_limiter,
};
use crate::matcher::DEFAULT_DETAIL_MARKER;
use crate::pricing::DEFAULT_HALF_LIFE_DAYS;
use crate::sync::{
    CatalogOptions, DEFAULT_BATCH_SIZE, DEFAULT_ELIGIBILITY_THRESHOLD, DEFAULT_PAGE_SIZE,
    DEFAULT_WORKERS, MAX_WORKERS, MIN_WORKERS, ResyncOptions, ScrapeSettings,
};

/// Root of the pricing site.
pub const DEFAULT_BASE_URL: &str = "https://www.pricecharting.com";

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "pricewatch.toml";

/// Database file used when neither `--db` nor `[database] path` is set.
pub const DEFAULT_DB_PATH: &str = "pricewatch.db";

/// Listen address of `pricewatch serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Parsed config file. Absent sections and keys fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// `[source]`
    pub source: SourceSection,
    /// `[fetch]`
    pub fetch: FetchSection,
    /// `[pricing]`
    pub pricing: PricingSection,
    /// `[sync]`
    pub sync: SyncSection,
    /// `[catalog]`
    pub catalog: CatalogSection,
    /// `[database]`
    pub database: DatabaseSection,
    /// `[api]`
    pub api: ApiSection,
}

/// Source site location.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSection {
    /// Site root.
    pub base_url: Option<String>,
    /// Path segment identifying product detail URLs.
    pub detail_marker: Option<String>,
}

/// HTTP retry, pacing and timeouts.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSection {
    /// Attempts per request (1..=10).
    pub max_retries: Option<u32>,
    /// First backoff delay in milliseconds.
    pub base_delay_ms: Option<u64>,
    /// Backoff cap in milliseconds.
    pub max_delay_ms: Option<u64>,
    /// Lower bound of the randomized delay between requests.
    pub min_request_delay_ms: Option<u64>,
    /// Upper bound of the randomized delay between requests.
    pub max_request_delay_ms: Option<u64>,
    /// Connect timeout in seconds (1..=3600).
    pub connect_timeout_secs: Option<u64>,
    /// Whole-request timeout in seconds (1..=3600).
    pub read_timeout_secs: Option<u64>,
}

/// Estimator and eligibility knobs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricingSection {
    /// Half-life of sale weights in days.
    pub half_life_days: Option<f64>,
    /// Minimum reference price for an item to be queued.
    pub eligibility_threshold: Option<f64>,
}

/// Queue and worker pool sizing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSection {
    /// Concurrent item cycles.
    pub workers: Option<usize>,
    /// Eligibility scan page size.
    pub page_size: Option<u32>,
    /// Rows per queue insert statement.
    pub batch_size: Option<usize>,
}

/// Catalog page locations.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogSection {
    /// Category page path.
    pub category_path: Option<String>,
    /// Path prefix of set links.
    pub set_path_prefix: Option<String>,
    /// Aggregate link label to skip.
    pub skip_label: Option<String>,
    /// Page cap per set.
    pub max_pages: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSection {
    pub bind: Option<String>,
}

impl FileConfig {
    /// Parses TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Fails on syntax errors, unknown keys or out-of-range values.
    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates config values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Names the first offending key and its accepted range.
    pub fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.source.base_url
            && url::Url::parse(base_url).is_err()
        {
            bail!("Invalid config value for `source.base_url`: '{base_url}' is not an absolute URL");
        }

        if let Some(retries) = self.fetch.max_retries
            && !(1..=10).contains(&retries)
        {
            bail!("Invalid config value for `fetch.max_retries`: {retries}. Expected range: 1..=10");
        }
        validate_delay_ms("fetch.base_delay_ms", self.fetch.base_delay_ms)?;
        validate_delay_ms("fetch.max_delay_ms", self.fetch.max_delay_ms)?;
        validate_delay_ms("fetch.min_request_delay_ms", self.fetch.min_request_delay_ms)?;
        validate_delay_ms("fetch.max_request_delay_ms", self.fetch.max_request_delay_ms)?;
        if let (Some(min), Some(max)) = (
            self.fetch.min_request_delay_ms,
            self.fetch.max_request_delay_ms,
        ) && min > max
        {
            bail!(
                "Invalid config: `fetch.min_request_delay_ms` ({min}) exceeds `fetch.max_request_delay_ms` ({max})"
            );
        }
        validate_timeout_secs("fetch.connect_timeout_secs", self.fetch.connect_timeout_secs)?;
        validate_timeout_secs("fetch.read_timeout_secs", self.fetch.read_timeout_secs)?;

        if let Some(half_life) = self.pricing.half_life_days
            && !(half_life.is_finite() && half_life > 0.0)
        {
            bail!("Invalid config value for `pricing.half_life_days`: {half_life}. Expected a positive number");
        }
        if let Some(threshold) = self.pricing.eligibility_threshold
            && !(threshold.is_finite() && threshold >= 0.0)
        {
            bail!(
                "Invalid config value for `pricing.eligibility_threshold`: {threshold}. Expected a non-negative number"
            );
        }

        if let Some(workers) = self.sync.workers {
            validate_workers(workers)?;
        }
        if let Some(page_size) = self.sync.page_size
            && !(1..=10_000).contains(&page_size)
        {
            bail!("Invalid config value for `sync.page_size`: {page_size}. Expected range: 1..=10000");
        }
        if let Some(batch_size) = self.sync.batch_size
            && !(1..=1000).contains(&batch_size)
        {
            bail!("Invalid config value for `sync.batch_size`: {batch_size}. Expected range: 1..=1000");
        }

        if let Some(max_pages) = self.catalog.max_pages
            && max_pages == 0
        {
            bail!("Invalid config value for `catalog.max_pages`: 0. Expected at least 1");
        }

        if let Some(bind) = &self.api.bind
            && bind.parse::<std::net::SocketAddr>().is_err()
        {
            bail!("Invalid config value for `api.bind`: '{bind}'. Expected host:port");
        }

        Ok(())
    }
}

/// Checks a worker count against the pool bounds.
///
/// # Errors
///
/// Fails outside `MIN_WORKERS..=MAX_WORKERS`.
pub fn validate_workers(workers: usize) -> Result<()> {
    if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
        bail!(
            "Invalid config value for `sync.workers`: {workers}. Expected range: {MIN_WORKERS}..={MAX_WORKERS}"
        );
    }
    Ok(())
}

fn validate_delay_ms(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if value > 600_000 {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 0..=600000");
    }
    Ok(())
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Path that was read, or would have been read.
    pub path: Option<PathBuf>,
    /// Parsed file config when a file was found.
    pub config: Option<FileConfig>,
    /// Whether a file was read from disk.
    pub loaded_from_file: bool,
}

/// Loads the config file.
///
/// An explicit path must exist. Without one, `./pricewatch.toml` is read if
/// present and silently skipped otherwise.
///
/// # Errors
///
/// Fails when an explicit file is missing, unreadable or invalid.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
            loaded_from_file: true,
        });
    }

    let path = PathBuf::from(DEFAULT_CONFIG_FILE);
    if !path.exists() {
        return Ok(LoadedConfig {
            path: Some(path),
            config: None,
            loaded_from_file: false,
        });
    }

    let config = load_file_config(&path)?;
    Ok(LoadedConfig {
        path: Some(path),
        config: Some(config),
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    FileConfig::parse(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// HTTP settings after defaults are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    /// Attempts per request.
    pub max_retries: u32,
    /// First backoff delay.
    pub base_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    /// Lower pacing bound.
    pub min_request_delay: Duration,
    /// Upper pacing bound.
    pub max_request_delay: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub read_timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            min_request_delay: rate_limiter::DEFAULT_MIN_DELAY,
            max_request_delay: rate_limiter::DEFAULT_MAX_DELAY,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
        }
    }
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Site root.
    pub base_url: String,
    /// Detail URL marker for the matcher.
    pub detail_marker: String,
    /// HTTP behavior.
    pub fetch: FetchSettings,
    /// Estimator half-life.
    pub half_life_days: f64,
    /// Minimum reference price for queueing.
    pub eligibility_threshold: f64,
    /// Worker pool size.
    pub workers: usize,
    /// Eligibility scan page size.
    pub page_size: u32,
    /// Queue insert batch size.
    pub batch_size: usize,
    /// Catalog page locations.
    pub catalog: CatalogOptions,
    /// Database file.
    pub db_path: PathBuf,
    /// API listen address.
    pub bind: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_file(None)
    }
}

impl Settings {
    /// Applies the file's values over the defaults.
    #[must_use]
    pub fn from_file(file: Option<&FileConfig>) -> Self {
        let empty = FileConfig::default();
        let file = file.unwrap_or(&empty);
        let fetch_defaults = FetchSettings::default();
        let catalog_defaults = CatalogOptions::default();
        let base_url = file
            .source
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            detail_marker: file
                .source
                .detail_marker
                .clone()
                .unwrap_or_else(|| DEFAULT_DETAIL_MARKER.to_string()),
            fetch: FetchSettings {
                max_retries: file.fetch.max_retries.unwrap_or(fetch_defaults.max_retries),
                base_delay: millis_or(file.fetch.base_delay_ms, fetch_defaults.base_delay),
                max_delay: millis_or(file.fetch.max_delay_ms, fetch_defaults.max_delay),
                min_request_delay: millis_or(
                    file.fetch.min_request_delay_ms,
                    fetch_defaults.min_request_delay,
                ),
                max_request_delay: millis_or(
                    file.fetch.max_request_delay_ms,
                    fetch_defaults.max_request_delay,
                ),
                connect_timeout: file
                    .fetch
                    .connect_timeout_secs
                    .map_or(fetch_defaults.connect_timeout, Duration::from_secs),
                read_timeout: file
                    .fetch
                    .read_timeout_secs
                    .map_or(fetch_defaults.read_timeout, Duration::from_secs),
            },
            half_life_days: file
                .pricing
                .half_life_days
                .unwrap_or(DEFAULT_HALF_LIFE_DAYS),
            eligibility_threshold: file
                .pricing
                .eligibility_threshold
                .unwrap_or(DEFAULT_ELIGIBILITY_THRESHOLD),
            workers: file.sync.workers.unwrap_or(DEFAULT_WORKERS),
            page_size: file.sync.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            batch_size: file.sync.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            catalog: CatalogOptions {
                base_url: base_url.clone(),
                category_path: file
                    .catalog
                    .category_path
                    .clone()
                    .unwrap_or(catalog_defaults.category_path),
                set_path_prefix: file
                    .catalog
                    .set_path_prefix
                    .clone()
                    .unwrap_or(catalog_defaults.set_path_prefix),
                skip_label: file
                    .catalog
                    .skip_label
                    .clone()
                    .unwrap_or(catalog_defaults.skip_label),
                max_pages: file.catalog.max_pages.unwrap_or(catalog_defaults.max_pages),
            },
            db_path: file
                .database
                .path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            bind: file
                .api
                .bind
                .clone()
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            base_url,
        }
    }

    /// Options for building the shared [`crate::fetch::Fetcher`].
    #[must_use]
    pub fn fetcher_options(&self) -> FetcherOptions {
        FetcherOptions {
            retry_policy: RetryPolicy::new(
                self.fetch.max_retries,
                self.fetch.base_delay,
                self.fetch.max_delay,
                DEFAULT_BACKOFF_MULTIPLIER,
            ),
            connect_timeout: self.fetch.connect_timeout,
            read_timeout: self.fetch.read_timeout,
        }
    }

    /// The request pacer; `no_delay` turns pacing off.
    #[must_use]
    pub fn rate_limiter(&self, no_delay: bool) -> RateLimiter {
        if no_delay {
            RateLimiter::disabled()
        } else {
            RateLimiter::new(self.fetch.min_request_delay, self.fetch.max_request_delay)
        }
    }

    #[must_use]
    pub fn scrape_settings(&self) -> ScrapeSettings {
        ScrapeSettings {
            tiers: default_grade_tiers(),
            half_life_days: self.half_life_days,
        }
    }

    #[must_use]
    pub fn resync_options(&self, report_path: Option<PathBuf>) -> ResyncOptions {
        ResyncOptions {
            threshold: self.eligibility_threshold,
            page_size: self.page_size,
            batch_size: self.batch_size,
            report_path,
        }
    }

    /// Effective values as `key = value` pairs, for `pricewatch config show`.
    #[must_use]
    pub fn display_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("source.base_url", self.base_url.clone()),
            ("source.detail_marker", self.detail_marker.clone()),
            ("fetch.max_retries", self.fetch.max_retries.to_string()),
            ("fetch.base_delay_ms", duration_ms(self.fetch.base_delay)),
            ("fetch.max_delay_ms", duration_ms(self.fetch.max_delay)),
            (
                "fetch.min_request_delay_ms",
                duration_ms(self.fetch.min_request_delay),
            ),
            (
                "fetch.max_request_delay_ms",
                duration_ms(self.fetch.max_request_delay),
            ),
            (
                "fetch.connect_timeout_secs",
                self.fetch.connect_timeout.as_secs().to_string(),
            ),
            (
                "fetch.read_timeout_secs",
                self.fetch.read_timeout.as_secs().to_string(),
            ),
            ("pricing.half_life_days", self.half_life_days.to_string()),
            (
                "pricing.eligibility_threshold",
                self.eligibility_threshold.to_string(),
            ),
            ("sync.workers", self.workers.to_string()),
            ("sync.page_size", self.page_size.to_string()),
            ("sync.batch_size", self.batch_size.to_string()),
            ("catalog.category_path", self.catalog.category_path.clone()),
            ("catalog.set_path_prefix", self.catalog.set_path_prefix.clone()),
            ("catalog.skip_label", self.catalog.skip_label.clone()),
            ("catalog.max_pages", self.catalog.max_pages.to_string()),
            ("database.path", self.db_path.display().to_string()),
            ("api.bind", self.bind.clone()),
        ]
    }
}

fn millis_or(value: Option<u64>, default: Duration) -> Duration {
    value.map_or(default, Duration::from_millis)
}

fn duration_ms(duration: Duration) -> String {
    duration.as_millis().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_empty_config_is_default() {
        let config = FileConfig::parse("").unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_parse_sections() {
        let raw = r#"
            [source]
            base_url = "https://example.test"

            [fetch]
            max_retries = 5
            min_request_delay_ms = 0
            max_request_delay_ms = 200

            [pricing]
            half_life_days = 14.0
            eligibility_threshold = 25.0

            [sync]
            workers = 2

            [database]
            path = "/tmp/cards.db"
        "#;
        let config = FileConfig::parse(raw).unwrap();
        assert_eq!(config.source.base_url.as_deref(), Some("https://example.test"));
        assert_eq!(config.fetch.max_retries, Some(5));
        assert_eq!(config.pricing.eligibility_threshold, Some(25.0));
        assert_eq!(config.sync.workers, Some(2));
        assert_eq!(config.database.path, Some(PathBuf::from("/tmp/cards.db")));
    }

    #[test]
    fn test_parse_rejects_unknown_key() {
        let err = FileConfig::parse("[sync]\nthreads = 2\n").unwrap_err();
        assert!(err.to_string().contains("threads"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_workers() {
        let err = FileConfig::parse("[sync]\nworkers = 9\n").unwrap_err();
        assert!(err.to_string().contains("sync.workers"));
    }

    #[test]
    fn test_validate_rejects_inverted_request_delay() {
        let raw = "[fetch]\nmin_request_delay_ms = 2000\nmax_request_delay_ms = 100\n";
        let err = FileConfig::parse(raw).unwrap_err();
        assert!(err.to_string().contains("min_request_delay_ms"));
    }

    #[test]
    fn test_validate_rejects_non_positive_half_life() {
        assert!(FileConfig::parse("[pricing]\nhalf_life_days = 0.0\n").is_err());
        assert!(FileConfig::parse("[pricing]\nhalf_life_days = -3.0\n").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_bind_and_base_url() {
        assert!(FileConfig::parse("[api]\nbind = \"localhost\"\n").is_err());
        assert!(FileConfig::parse("[source]\nbase_url = \"not a url\"\n").is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.workers, DEFAULT_WORKERS);
        assert!((settings.half_life_days - DEFAULT_HALF_LIFE_DAYS).abs() < f64::EPSILON);
        assert!((settings.eligibility_threshold - 15.0).abs() < f64::EPSILON);
        assert_eq!(settings.page_size, 1000);
        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(settings.fetch.min_request_delay, Duration::from_millis(500));
        assert_eq!(settings.fetch.max_request_delay, Duration::from_millis(1500));
    }

    #[test]
    fn test_settings_file_overrides_defaults() {
        let config = FileConfig::parse(
            "[source]\nbase_url = \"https://mirror.test\"\n[sync]\nbatch_size = 10\n",
        )
        .unwrap();
        let settings = Settings::from_file(Some(&config));
        assert_eq!(settings.base_url, "https://mirror.test");
        assert_eq!(settings.catalog.base_url, "https://mirror.test");
        assert_eq!(settings.batch_size, 10);
        assert_eq!(settings.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn test_resync_options_carry_threshold() {
        let config = FileConfig::parse("[pricing]\neligibility_threshold = 40.0\n").unwrap();
        let options = Settings::from_file(Some(&config)).resync_options(None);
        assert!((options.threshold - 40.0).abs() < f64::EPSILON);
        assert!(options.report_path.is_none());
    }

    #[test]
    fn test_rate_limiter_no_delay() {
        assert!(Settings::default().rate_limiter(true).is_disabled());
        assert!(!Settings::default().rate_limiter(false).is_disabled());
    }

    #[test]
    fn test_load_config_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\nworkers = 1").unwrap();

        let loaded = load_config(Some(file.path())).unwrap();
        assert!(loaded.loaded_from_file);
        assert_eq!(loaded.config.unwrap().sync.workers, Some(1));
    }

    #[test]
    fn test_load_config_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_display_pairs_cover_sections() {
        let pairs = Settings::default().display_pairs();
        let keys: Vec<&str> = pairs.iter().map(|(key, _)| *key).collect();
        assert!(keys.contains(&"source.base_url"));
        assert!(keys.contains(&"pricing.half_life_days"));
        assert!(keys.contains(&"api.bind"));
    }
}
