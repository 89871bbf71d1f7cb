//! Service configuration.
//!
//! This module provides [`ServiceConfig`] and [`ServiceConfigBuilder`] for
//! the listen address, render concurrency and timeouts, readiness and
//! resource policies, and browser keep-alive parameters.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use gerar_pdf_api::ServiceConfigBuilder;
//!
//! let config = ServiceConfigBuilder::new()
//!     .max_concurrency(4)
//!     .content_timeout(Duration::from_secs(10))
//!     .build()
//!     .expect("Invalid configuration");
//!
//! assert_eq!(config.max_concurrency, 4);
//! assert_eq!(config.filename, "documento.pdf");
//! ```
//!
//! # Environment Configuration
//!
//! When the `env-config` feature is enabled, configuration can be loaded
//! from environment variables and an optional `app.env` file:
//!
//! ```rust,ignore
//! use gerar_pdf_api::config::env::from_env;
//!
//! let config = from_env()?;
//! ```
//!
//! See [`mod@env`] module for available environment variables.

use std::time::Duration;

use crate::service::{PaperFormat, ReadinessPolicy, ResourcePolicy};

/// Complete service configuration.
///
/// Use [`ServiceConfigBuilder`] for validation and convenience.
///
/// # Fields Overview
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `port` / `host` | 3000 / 0.0.0.0 | Listen address |
/// | `max_concurrency` | 2 | Simultaneous renders |
/// | `navigation_timeout` | 30s | Content load bound |
/// | `content_timeout` | 15s | Each readiness wait |
/// | `protocol_timeout` | 60s | DevTools idle timeout |
/// | `render_timeout` | 90s | Whole render |
/// | `body_limit` | 15 MiB | Request body limit |
/// | `readiness` | `dom` | What "loaded" means |
/// | `filename` | `documento.pdf` | Attachment name |
/// | `ping_interval` | 15s | Keep-alive frequency |
/// | `max_ping_failures` | 3 | Failures before relaunch |
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// TCP port to listen on.
    pub port: u16,

    /// Bind address.
    pub host: String,

    /// Maximum number of renders running at once. Further requests queue.
    ///
    /// Each render holds one page in the shared browser, so this is also the
    /// bound on open pages.
    pub max_concurrency: usize,

    /// Bound on loading the document into the page.
    pub navigation_timeout: Duration,

    /// Bound on each readiness wait (DOM, fonts, images, network idle).
    pub content_timeout: Duration,

    /// DevTools protocol idle timeout, applied to the browser connection.
    pub protocol_timeout: Duration,

    /// Bound on a whole render, queue time excluded.
    pub render_timeout: Duration,

    /// Maximum request body size in bytes. Also the limit on the `html` field.
    pub body_limit: usize,

    /// Readiness policy used by the render worker.
    pub readiness: ReadinessPolicy,

    /// Sub-resources denied during renders.
    pub resource_policy: ResourcePolicy,

    /// Paper format used when a request does not name one.
    pub paper_format: PaperFormat,

    /// Attachment filename sent in `Content-Disposition`.
    pub filename: String,

    /// Allowed CORS origins. `*` alone allows any origin; entries may contain
    /// `*` wildcards.
    pub cors_origins: Vec<String>,

    /// Interval between keep-alive pings.
    pub ping_interval: Duration,

    /// Consecutive ping failures before the browser is discarded.
    pub max_ping_failures: u32,

    /// Run the keep-alive thread.
    pub keep_alive: bool,

    /// Launch the browser at startup instead of on the first request.
    pub eager_launch: bool,

    /// Explicit browser executable. `None` means auto-detection.
    pub chrome_path: Option<String>,
}

impl ServiceConfig {
    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServiceConfig {
    /// Production defaults.
    ///
    /// ```rust
    /// use gerar_pdf_api::ServiceConfig;
    /// use std::time::Duration;
    ///
    /// let config = ServiceConfig::default();
    ///
    /// assert_eq!(config.port, 3000);
    /// assert_eq!(config.max_concurrency, 2);
    /// assert_eq!(config.navigation_timeout, Duration::from_secs(30));
    /// assert_eq!(config.body_limit, 15 * 1024 * 1024);
    /// assert_eq!(config.cors_origins, vec!["*".to_string()]);
    /// ```
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            max_concurrency: 2,
            navigation_timeout: Duration::from_millis(30_000),
            content_timeout: Duration::from_millis(15_000),
            protocol_timeout: Duration::from_millis(60_000),
            render_timeout: Duration::from_millis(90_000),
            body_limit: 15 * 1024 * 1024,
            readiness: ReadinessPolicy::Dom,
            resource_policy: ResourcePolicy::default(),
            paper_format: PaperFormat::A4,
            filename: "documento.pdf".to_string(),
            cors_origins: vec!["*".to_string()],
            ping_interval: Duration::from_secs(15),
            max_ping_failures: 3,
            keep_alive: true,
            eager_launch: false,
            chrome_path: None,
        }
    }
}

/// Builder for [`ServiceConfig`] with validation.
///
/// # Example
///
/// ```rust
/// use gerar_pdf_api::ServiceConfigBuilder;
///
/// let config = ServiceConfigBuilder::new()
///     .port(8080)
///     .filename("relatorio.pdf")
///     .cors_origins(vec!["https://*.netlify.app".to_string()])
///     .build()
///     .unwrap();
///
/// assert_eq!(config.bind_address(), "0.0.0.0:8080");
/// ```
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Start from [`ServiceConfig::default()`].
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
        }
    }

    /// Set the listen port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the bind address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the maximum number of simultaneous renders.
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.config.max_concurrency = max;
        self
    }

    /// Set the navigation (content load) timeout.
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.config.navigation_timeout = timeout;
        self
    }

    /// Set the bound on each readiness wait.
    pub fn content_timeout(mut self, timeout: Duration) -> Self {
        self.config.content_timeout = timeout;
        self
    }

    /// Set the DevTools protocol idle timeout.
    pub fn protocol_timeout(mut self, timeout: Duration) -> Self {
        self.config.protocol_timeout = timeout;
        self
    }

    /// Set the overall render timeout.
    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.config.render_timeout = timeout;
        self
    }

    /// Set the request body limit in bytes.
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.config.body_limit = bytes;
        self
    }

    /// Set the readiness policy.
    pub fn readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.config.readiness = readiness;
        self
    }

    /// Set the sub-resource policy.
    pub fn resource_policy(mut self, policy: ResourcePolicy) -> Self {
        self.config.resource_policy = policy;
        self
    }

    /// Set the default paper format.
    pub fn paper_format(mut self, format: PaperFormat) -> Self {
        self.config.paper_format = format;
        self
    }

    /// Set the attachment filename.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.config.filename = filename.into();
        self
    }

    /// Set the allowed CORS origins.
    pub fn cors_origins(mut self, origins: Vec<String>) -> Self {
        self.config.cors_origins = origins;
        self
    }

    /// Set the keep-alive ping interval.
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = interval;
        self
    }

    /// Set consecutive ping failures tolerated before relaunch.
    pub fn max_ping_failures(mut self, failures: u32) -> Self {
        self.config.max_ping_failures = failures;
        self
    }

    /// Enable or disable the keep-alive thread.
    pub fn keep_alive(mut self, enable: bool) -> Self {
        self.config.keep_alive = enable;
        self
    }

    /// Launch the browser at startup.
    pub fn eager_launch(mut self, eager: bool) -> Self {
        self.config.eager_launch = eager;
        self
    }

    /// Use an explicit browser executable.
    pub fn chrome_path(mut self, path: Option<String>) -> Self {
        self.config.chrome_path = path;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn build(self) -> std::result::Result<ServiceConfig, String> {
        let config = self.config;

        if config.max_concurrency == 0 {
            return Err("max_concurrency must be greater than 0".to_string());
        }
        for (name, value) in [
            ("navigation_timeout", config.navigation_timeout),
            ("content_timeout", config.content_timeout),
            ("protocol_timeout", config.protocol_timeout),
            ("render_timeout", config.render_timeout),
            ("ping_interval", config.ping_interval),
        ] {
            if value.is_zero() {
                return Err(format!("{} must be greater than 0", name));
            }
        }
        if config.body_limit == 0 {
            return Err("body_limit must be greater than 0".to_string());
        }
        if config.max_ping_failures == 0 {
            return Err("max_ping_failures must be greater than 0".to_string());
        }
        let filename = config.filename.trim();
        if filename.is_empty() || !filename.to_ascii_lowercase().ends_with(".pdf") {
            return Err(format!("filename must end in .pdf, got '{}'", config.filename));
        }
        if filename.contains('"') || filename.contains('/') || filename.contains('\\') {
            return Err(format!("filename contains forbidden characters: '{}'", config.filename));
        }

        Ok(config)
    }
}

impl Default for ServiceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Environment-based configuration loading.
///
/// | Variable | Default |
/// |----------|---------|
/// | `PORT` | 3000 |
/// | `HOST` | 0.0.0.0 |
/// | `PDF_CONCURRENCY` | 2 |
/// | `PDF_NAV_TIMEOUT` | 30000 (ms) |
/// | `PDF_CONTENT_TIMEOUT` | 15000 (ms) |
/// | `PDF_PROTOCOL_TIMEOUT` | 60000 (ms) |
/// | `PDF_RENDER_TIMEOUT` | 90000 (ms) |
/// | `PDF_BODY_LIMIT` | 15728640 (bytes) |
/// | `PDF_WAIT_UNTIL` | `dom` |
/// | `PDF_BLOCK_RESOURCE_TYPES` | none |
/// | `PDF_BLOCK_URL_PATTERNS` | none |
/// | `PDF_FILENAME` | `documento.pdf` |
/// | `PDF_EAGER_LAUNCH` | false |
/// | `BROWSER_PING_INTERVAL_SECONDS` | 15 |
/// | `BROWSER_MAX_PING_FAILURES` | 3 |
/// | `CHROME_PATH` | auto-detect |
/// | `CORS_ORIGINS` | `*` |
#[cfg(feature = "env-config")]
pub mod env {
    use std::str::FromStr;

    use super::*;
    use crate::error::BrowserError;
    use crate::service::ResourceKind;

    /// Default environment file name.
    pub const ENV_FILE_NAME: &str = "app.env";

    /// Load environment variables from `app.env` file.
    ///
    /// Called by [`from_env`]; call it yourself to load the file earlier.
    pub fn load_env_file() -> Result<std::path::PathBuf, dotenvy::Error> {
        dotenvy::from_filename(ENV_FILE_NAME)
    }

    /// Load configuration from environment variables (see the module docs).
    ///
    /// Unset or blank variables take their defaults. A value that is set but
    /// unparseable is an error rather than silently ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Configuration`] naming the offending variable
    /// or the failed validation.
    pub fn from_env() -> Result<ServiceConfig, BrowserError> {
        match load_env_file() {
            Ok(path) => log::info!("📄 Loaded configuration from: {:?}", path),
            Err(e) => log::debug!(
                "No {} file found or failed to load: {} (using environment variables and defaults)",
                ENV_FILE_NAME,
                e
            ),
        }

        let defaults = ServiceConfig::default();

        let port = parse_number("PORT", read("PORT"), defaults.port)?;
        let host = read("HOST").unwrap_or(defaults.host);
        let max_concurrency =
            parse_number("PDF_CONCURRENCY", read("PDF_CONCURRENCY"), defaults.max_concurrency)?;
        let navigation_timeout =
            parse_millis("PDF_NAV_TIMEOUT", read("PDF_NAV_TIMEOUT"), defaults.navigation_timeout)?;
        let content_timeout = parse_millis(
            "PDF_CONTENT_TIMEOUT",
            read("PDF_CONTENT_TIMEOUT"),
            defaults.content_timeout,
        )?;
        let protocol_timeout = parse_millis(
            "PDF_PROTOCOL_TIMEOUT",
            read("PDF_PROTOCOL_TIMEOUT"),
            defaults.protocol_timeout,
        )?;
        let render_timeout = parse_millis(
            "PDF_RENDER_TIMEOUT",
            read("PDF_RENDER_TIMEOUT"),
            defaults.render_timeout,
        )?;
        let body_limit =
            parse_number("PDF_BODY_LIMIT", read("PDF_BODY_LIMIT"), defaults.body_limit)?;
        let readiness = parse_number("PDF_WAIT_UNTIL", read("PDF_WAIT_UNTIL"), defaults.readiness)?;
        let resource_policy = parse_resource_policy(
            read("PDF_BLOCK_RESOURCE_TYPES"),
            read("PDF_BLOCK_URL_PATTERNS"),
        )?;
        let filename = read("PDF_FILENAME").unwrap_or(defaults.filename);
        let eager_launch = parse_bool("PDF_EAGER_LAUNCH", read("PDF_EAGER_LAUNCH"), false)?;
        let ping_interval_seconds = parse_number(
            "BROWSER_PING_INTERVAL_SECONDS",
            read("BROWSER_PING_INTERVAL_SECONDS"),
            defaults.ping_interval.as_secs(),
        )?;
        let max_ping_failures = parse_number(
            "BROWSER_MAX_PING_FAILURES",
            read("BROWSER_MAX_PING_FAILURES"),
            defaults.max_ping_failures,
        )?;
        let cors_origins = read("CORS_ORIGINS")
            .map(|raw| parse_list(&raw))
            .filter(|origins| !origins.is_empty())
            .unwrap_or(defaults.cors_origins);
        let chrome_path = chrome_path_from_env();

        log::info!("⚙️ Loading service configuration from environment:");
        log::info!("   - Listen: {}:{}", host, port);
        log::info!("   - Concurrency: {}", max_concurrency);
        log::info!(
            "   - Timeouts: nav {:?}, content {:?}, protocol {:?}, render {:?}",
            navigation_timeout,
            content_timeout,
            protocol_timeout,
            render_timeout
        );
        log::info!("   - Body limit: {} bytes", body_limit);
        log::info!("   - Readiness: {}", readiness);
        if resource_policy.is_active() {
            log::info!(
                "   - Blocking kinds {:?} and URLs {:?}",
                resource_policy.denied_kinds(),
                resource_policy.denied_urls()
            );
        }
        log::info!("   - CORS origins: {:?}", cors_origins);
        log::info!(
            "   - Keep-alive: every {}s, {} failures",
            ping_interval_seconds,
            max_ping_failures
        );
        log::info!(
            "   - Chrome: {}",
            chrome_path.as_deref().unwrap_or("auto-detect")
        );

        ServiceConfigBuilder::new()
            .port(port)
            .host(host)
            .max_concurrency(max_concurrency)
            .navigation_timeout(navigation_timeout)
            .content_timeout(content_timeout)
            .protocol_timeout(protocol_timeout)
            .render_timeout(render_timeout)
            .body_limit(body_limit)
            .readiness(readiness)
            .resource_policy(resource_policy)
            .filename(filename)
            .cors_origins(cors_origins)
            .ping_interval(Duration::from_secs(ping_interval_seconds))
            .max_ping_failures(max_ping_failures)
            .eager_launch(eager_launch)
            .chrome_path(chrome_path)
            .build()
            .map_err(BrowserError::Configuration)
    }

    /// Read `CHROME_PATH`. `None` means auto-detection.
    pub fn chrome_path_from_env() -> Option<String> {
        read("CHROME_PATH")
    }

    fn read(name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    pub(super) fn parse_number<T>(name: &str, raw: Option<String>, default: T) -> Result<T, String>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match raw {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e| format!("{}: invalid value '{}': {}", name, raw, e)),
        }
    }

    pub(super) fn parse_millis(
        name: &str,
        raw: Option<String>,
        default: Duration,
    ) -> Result<Duration, String> {
        match raw {
            None => Ok(default),
            Some(_) => parse_number::<u64>(name, raw, 0).map(Duration::from_millis),
        }
    }

    pub(super) fn parse_bool(
        name: &str,
        raw: Option<String>,
        default: bool,
    ) -> Result<bool, String> {
        match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None => Ok(default),
            Some("1" | "true" | "yes" | "on") => Ok(true),
            Some("0" | "false" | "no" | "off") => Ok(false),
            Some(other) => Err(format!("{}: expected a boolean, got '{}'", name, other)),
        }
    }

    pub(super) fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub(super) fn parse_resource_policy(
        kinds: Option<String>,
        urls: Option<String>,
    ) -> Result<ResourcePolicy, String> {
        let mut policy = ResourcePolicy::default();
        for kind in kinds.as_deref().map(parse_list).unwrap_or_default() {
            let kind = kind
                .parse::<ResourceKind>()
                .map_err(|e| format!("PDF_BLOCK_RESOURCE_TYPES: {}", e))?;
            policy = policy.deny_kind(kind);
        }
        for pattern in urls.as_deref().map(parse_list).unwrap_or_default() {
            policy = policy.deny_url(pattern);
        }
        Ok(policy)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ServiceConfigBuilder::new()
            .port(8080)
            .max_concurrency(4)
            .render_timeout(Duration::from_secs(30))
            .readiness(ReadinessPolicy::NetworkIdle)
            .build()
            .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.render_timeout.as_secs(), 30);
        assert_eq!(config.readiness, ReadinessPolicy::NetworkIdle);
    }

    /// Verifies that zero concurrency is rejected at build time.
    #[test]
    fn test_config_validation() {
        let err = ServiceConfigBuilder::new().max_concurrency(0).build().unwrap_err();
        assert!(
            err.contains("max_concurrency must be greater than 0"),
            "Expected validation error message, got: {}",
            err
        );
    }

    #[test]
    fn test_config_rejects_zero_timeouts() {
        let err = ServiceConfigBuilder::new()
            .content_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.contains("content_timeout"));

        assert!(ServiceConfigBuilder::new().body_limit(0).build().is_err());
        assert!(ServiceConfigBuilder::new().max_ping_failures(0).build().is_err());
    }

    /// Verifies filename validation for the Content-Disposition header.
    #[test]
    fn test_config_filename_validation() {
        assert!(ServiceConfigBuilder::new().filename("").build().is_err());
        assert!(ServiceConfigBuilder::new().filename("report.txt").build().is_err());
        assert!(ServiceConfigBuilder::new().filename("a\"b.pdf").build().is_err());
        assert!(ServiceConfigBuilder::new().filename("Relatorio.PDF").build().is_ok());
    }

    #[test]
    fn test_config_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.content_timeout, Duration::from_secs(15));
        assert_eq!(config.protocol_timeout, Duration::from_secs(60));
        assert_eq!(config.readiness, ReadinessPolicy::Dom);
        assert!(!config.resource_policy.is_active());
        assert!(!config.eager_launch);
        assert!(config.keep_alive);
        assert!(config.chrome_path.is_none());
    }

    #[cfg(feature = "env-config")]
    mod env_parsing {
        use super::super::env::*;
        use super::*;
        use crate::service::ResourceKind;

        #[test]
        fn test_parse_number() {
            assert_eq!(parse_number("PORT", None, 3000u16), Ok(3000));
            assert_eq!(parse_number("PORT", Some("8080".into()), 3000u16), Ok(8080));
            let err = parse_number("PORT", Some("eighty".into()), 3000u16).unwrap_err();
            assert!(err.starts_with("PORT"));
        }

        #[test]
        fn test_parse_millis() {
            let default = Duration::from_secs(1);
            assert_eq!(parse_millis("T", None, default), Ok(default));
            assert_eq!(
                parse_millis("T", Some("2500".into()), default),
                Ok(Duration::from_millis(2500))
            );
            assert!(parse_millis("T", Some("-1".into()), default).is_err());
        }

        #[test]
        fn test_parse_bool() {
            assert_eq!(parse_bool("B", Some("TRUE".into()), false), Ok(true));
            assert_eq!(parse_bool("B", Some("0".into()), true), Ok(false));
            assert_eq!(parse_bool("B", None, true), Ok(true));
            assert!(parse_bool("B", Some("maybe".into()), false).is_err());
        }

        #[test]
        fn test_parse_list() {
            assert_eq!(
                parse_list(" https://a.com, ,https://*.b.app ,"),
                vec!["https://a.com".to_string(), "https://*.b.app".to_string()]
            );
            assert!(parse_list("").is_empty());
        }

        #[test]
        fn test_parse_resource_policy() {
            let policy = parse_resource_policy(
                Some("script, font".into()),
                Some("*analytics*".into()),
            )
            .unwrap();
            assert_eq!(policy.denied_kinds(), &[ResourceKind::Script, ResourceKind::Font]);
            assert_eq!(policy.denied_urls(), &["*analytics*".to_string()]);

            assert!(parse_resource_policy(Some("document".into()), None).is_err());
            assert!(!parse_resource_policy(None, None).unwrap().is_active());
        }
    }
}
