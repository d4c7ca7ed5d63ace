//! Credential exchange: app id + secret → tenant access token.
//!
//! The token is fetched once and cached for the lifetime of the
//! [`TokenProvider`]. Components never look it up themselves; the pipeline
//! hands `&AccessToken` to each call. No expiry or refresh is modelled: a
//! tenant token lives two hours, far longer than one migration.

use crate::error::MigrationError;
use crate::platform::DocumentPlatform;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// App credentials for the token exchange.
#[derive(Clone)]
pub struct Credentials {
    pub app_id: String,
    pub app_secret: String,
}

impl Credentials {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

/// Opaque bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header only.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Exchanges credentials for a token once and serves the cached value.
pub struct TokenProvider {
    platform: Arc<dyn DocumentPlatform>,
    credentials: Credentials,
    cached: OnceCell<AccessToken>,
}

impl TokenProvider {
    pub fn new(platform: Arc<dyn DocumentPlatform>, credentials: Credentials) -> Self {
        Self {
            platform,
            credentials,
            cached: OnceCell::new(),
        }
    }

    /// Return the cached token, exchanging credentials on first use.
    ///
    /// # Errors
    /// [`MigrationError::Auth`] when the exchange fails. Nothing is cached on
    /// failure, so a later call tries again.
    pub async fn acquire(&self) -> Result<&AccessToken, MigrationError> {
        self.cached
            .get_or_try_init(|| async {
                debug!("Exchanging credentials for app {}", self.credentials.app_id);
                let token = self
                    .platform
                    .exchange_token(&self.credentials)
                    .await
                    .map_err(|source| MigrationError::Auth { source })?;
                info!("Obtained tenant access token");
                Ok::<_, MigrationError>(token)
            })
            .await
    }

    /// The token if one has been acquired.
    pub fn cached(&self) -> Option<&AccessToken> {
        self.cached.get()
    }
}
