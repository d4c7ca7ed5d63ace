//! Configuration types for markdown-to-docx migration.
//!
//! All migration behaviour is controlled through [`MigrationConfig`], built
//! via its [`MigrationConfigBuilder`]. Defaults match the pacing the platform
//! tolerates in practice; tests shrink the timings through the same builder.

use crate::error::MigrationError;
use crate::pipeline::auth::Credentials;
use crate::platform::MAX_BLOCK_PAGE_SIZE;
use crate::progress::ProgressCallback;
use crate::retry::{Backoff, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Public Feishu open platform endpoint.
pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn";

/// Configuration for a migration.
///
/// Built via [`MigrationConfig::builder()`] or using
/// [`MigrationConfig::default()`].
///
/// # Example
/// ```rust
/// use md2feishu::MigrationConfig;
/// use std::time::Duration;
///
/// let config = MigrationConfig::builder()
///     .credentials("cli_a1b2c3", "s3cr3t")
///     .import_deadline(Duration::from_secs(300))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct MigrationConfig {
    /// API root, without the `/open-apis` suffix. Default: [`DEFAULT_BASE_URL`].
    ///
    /// Point it at `https://open.larksuite.com` for Lark tenants or at a local
    /// mock server in integration tests.
    pub base_url: String,

    /// Application id used for the tenant token exchange.
    pub app_id: Option<String>,

    /// Application secret. Never printed by `Debug`.
    pub app_secret: Option<String>,

    /// Per-request HTTP timeout in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Wait between import status polls. Default: 2 s.
    pub poll_interval: Duration,

    /// Wait after the import reports success, before reading the token. Default: 5 s.
    ///
    /// The platform marks jobs successful slightly before the result is
    /// readable; reading immediately tends to return an empty token.
    pub settle_delay: Duration,

    /// Attempts at extracting the document token after success. Default: 5.
    pub resolve_attempts: u32,

    /// Wait between token resolution attempts. Default: 2 s.
    pub resolve_interval: Duration,

    /// Upper bound on time spent polling a non-terminal import. Default: none.
    pub import_deadline: Option<Duration>,

    /// Retry policy for each image upload and each block patch.
    /// Default: 3 attempts, linear backoff of 2 s × attempt.
    pub image_retry: RetryPolicy,

    /// Pause between two image bindings. Default: 1 s.
    pub image_pacing: Duration,

    /// Page size for block listing, 1–500. Default: 500.
    pub block_page_size: u32,

    /// What to do when image references and placeholders disagree in count.
    pub placeholder_policy: PlaceholderPolicy,

    /// Optional observer for stage transitions and per-image progress.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            app_id: None,
            app_secret: None,
            request_timeout_secs: 60,
            poll_interval: Duration::from_secs(2),
            settle_delay: Duration::from_secs(5),
            resolve_attempts: 5,
            resolve_interval: Duration::from_secs(2),
            import_deadline: None,
            image_retry: RetryPolicy::image_default(),
            image_pacing: Duration::from_secs(1),
            block_page_size: MAX_BLOCK_PAGE_SIZE,
            placeholder_policy: PlaceholderPolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for MigrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationConfig")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("poll_interval", &self.poll_interval)
            .field("settle_delay", &self.settle_delay)
            .field("resolve_attempts", &self.resolve_attempts)
            .field("resolve_interval", &self.resolve_interval)
            .field("import_deadline", &self.import_deadline)
            .field("image_retry", &self.image_retry)
            .field("image_pacing", &self.image_pacing)
            .field("block_page_size", &self.block_page_size)
            .field("placeholder_policy", &self.placeholder_policy)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn MigrationProgressCallback>"),
            )
            .finish()
    }
}

impl MigrationConfig {
    /// Create a new builder for `MigrationConfig`.
    pub fn builder() -> MigrationConfigBuilder {
        MigrationConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured application credentials.
    ///
    /// # Errors
    /// [`MigrationError::InvalidConfig`] when either half is missing or blank.
    pub fn credentials(&self) -> Result<Credentials, MigrationError> {
        let app_id = self.app_id.as_deref().map(str::trim).unwrap_or_default();
        let app_secret = self.app_secret.as_deref().map(str::trim).unwrap_or_default();
        if app_id.is_empty() || app_secret.is_empty() {
            return Err(MigrationError::InvalidConfig(
                "app_id and app_secret are required (set FEISHU_APP_ID / FEISHU_APP_SECRET)".into(),
            ));
        }
        Ok(Credentials::new(app_id, app_secret))
    }
}

/// Builder for [`MigrationConfig`].
#[derive(Debug)]
pub struct MigrationConfigBuilder {
    config: MigrationConfig,
}

impl MigrationConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn credentials(mut self, app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        self.config.app_id = Some(app_id.into());
        self.config.app_secret = Some(app_secret.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    pub fn resolve_attempts(mut self, n: u32) -> Self {
        self.config.resolve_attempts = n.max(1);
        self
    }

    pub fn resolve_interval(mut self, interval: Duration) -> Self {
        self.config.resolve_interval = interval;
        self
    }

    pub fn import_deadline(mut self, deadline: Duration) -> Self {
        self.config.import_deadline = Some(deadline);
        self
    }

    pub fn image_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.image_retry = policy;
        self
    }

    /// Shorthand for a linear image retry policy.
    pub fn image_retries(mut self, max_attempts: u32, step: Duration) -> Self {
        self.config.image_retry = RetryPolicy::new(max_attempts, Backoff::Linear(step));
        self
    }

    pub fn image_pacing(mut self, pacing: Duration) -> Self {
        self.config.image_pacing = pacing;
        self
    }

    /// Blocks per listing page, clamped to `1..=500`.
    pub fn block_page_size(mut self, size: u32) -> Self {
        self.config.block_page_size = size.clamp(1, MAX_BLOCK_PAGE_SIZE);
        self
    }

    pub fn placeholder_policy(mut self, policy: PlaceholderPolicy) -> Self {
        self.config.placeholder_policy = policy;
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<MigrationConfig, MigrationError> {
        let c = &self.config;
        let base = c.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(MigrationError::InvalidConfig(format!(
                "base_url must be an http(s) URL, got '{}'",
                c.base_url
            )));
        }
        if c.image_retry.max_attempts == 0 {
            return Err(MigrationError::InvalidConfig(
                "image retry needs at least one attempt".into(),
            ));
        }
        if matches!(c.import_deadline, Some(d) if d.is_zero()) {
            return Err(MigrationError::InvalidConfig(
                "import_deadline must be positive".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Behaviour when the markdown's local image count differs from the number
/// of image blocks in the converted document.
///
/// | Policy | Mismatch outcome |
/// |--------|------------------|
/// | Truncate | bind `min(N, M)` pairs, warn, report the rest (default) |
/// | Strict | fail before uploading any media; the run is compensated |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderPolicy {
    #[default]
    Truncate,
    Strict,
}

/// Where the converted document is mounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    /// An existing drive folder.
    Folder(String),
    /// A folder created for this run, optionally under `parent`.
    ///
    /// The folder is recorded as an artifact and removed again if the run fails.
    NewFolder {
        name: String,
        parent: Option<String>,
    },
}

impl Destination {
    pub fn folder(token: impl Into<String>) -> Self {
        Destination::Folder(token.into())
    }

    pub fn new_folder(name: impl Into<String>, parent: Option<String>) -> Self {
        Destination::NewFolder {
            name: name.into(),
            parent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_pacing() {
        let c = MigrationConfig::default();
        assert_eq!(c.base_url, "https://open.feishu.cn");
        assert_eq!(c.poll_interval, Duration::from_secs(2));
        assert_eq!(c.settle_delay, Duration::from_secs(5));
        assert_eq!(c.resolve_attempts, 5);
        assert_eq!(c.image_retry.max_attempts, 3);
        assert_eq!(c.image_pacing, Duration::from_secs(1));
        assert_eq!(c.block_page_size, 500);
        assert_eq!(c.placeholder_policy, PlaceholderPolicy::Truncate);
        assert!(c.import_deadline.is_none());
    }

    #[test]
    fn page_size_is_clamped() {
        let c = MigrationConfig::builder().block_page_size(10_000).build().unwrap();
        assert_eq!(c.block_page_size, 500);
        let c = MigrationConfig::builder().block_page_size(0).build().unwrap();
        assert_eq!(c.block_page_size, 1);
        let c = MigrationConfig::builder().block_page_size(u32::MAX).build().unwrap();
        assert_eq!(c.block_page_size, 500);
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = MigrationConfig::builder().base_url("ftp://x").build().unwrap_err();
        assert!(matches!(err, MigrationError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_deadline() {
        let err = MigrationConfig::builder()
            .import_deadline(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("import_deadline"));
    }

    #[test]
    fn missing_credentials_is_config_error() {
        let c = MigrationConfig::default();
        assert!(matches!(c.credentials(), Err(MigrationError::InvalidConfig(_))));

        let c = MigrationConfig::builder().credentials("id", "  ").build().unwrap();
        assert!(c.credentials().is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let c = MigrationConfig::builder()
            .credentials("cli_app", "very-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("cli_app"));
        assert!(!dbg.contains("very-secret"));
    }
}
