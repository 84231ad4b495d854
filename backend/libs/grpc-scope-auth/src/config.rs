//! Construction configuration
//!
//! A [`Configuration`] is consumed once by [`Authorizer::new`] and is not
//! mutable afterwards. [`Settings`] is the env-driven way to produce one.
//!
//! # Example
//!
//! ```no_run
//! use grpc_scope_auth::{Authorizer, ScopePolicy, Settings};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let policy = ScopePolicy::builder()
//!     .require("PutFoo", ["sync.write"])
//!     .build();
//!
//! let config = Settings::from_env()?.into_configuration(policy)?;
//! let authorizer = Authorizer::new(config).await?;
//! # Ok(())
//! # }
//! ```

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Url;

use crate::resolver::{FromFileKeyResolver, JwksResolver, KeyResolver};
use crate::scopes::ScopePolicy;

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolved construction parameters for an [`Authorizer`](crate::Authorizer).
pub struct Configuration {
    /// Where verification keys come from
    pub key_resolver: Arc<dyn KeyResolver>,
    /// How often the background task re-resolves the key
    pub refresh_interval: Duration,
    /// Bound on each individual resolution attempt
    pub resolve_timeout: Duration,
    /// Method → required scopes table
    pub policy: ScopePolicy,
}

impl Configuration {
    pub fn new(key_resolver: Arc<dyn KeyResolver>, policy: ScopePolicy) -> Self {
        Self {
            key_resolver,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            policy,
        }
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }
}

/// Key-source selection, one variant per resolver strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySourceSettings {
    /// PEM RSA public key on local disk
    File { path: String },
    /// Remote JWKS endpoint plus the id of the key to extract
    Jwks { endpoint: String, key_id: String },
}

/// Environment-driven settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub key_source: KeySourceSettings,
    pub refresh_interval_secs: u64,
    pub resolve_timeout_secs: u64,
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// `AUTH_PUBLIC_KEY_FILE` selects the file strategy and takes
    /// precedence; otherwise `AUTH_JWKS_ENDPOINT` and `AUTH_JWKS_KEY_ID`
    /// select the remote strategy. One of the two must be configured.
    pub fn from_env() -> Result<Self> {
        let key_source = if let Ok(path) = env::var("AUTH_PUBLIC_KEY_FILE") {
            KeySourceSettings::File { path }
        } else if let Ok(endpoint) = env::var("AUTH_JWKS_ENDPOINT") {
            let key_id = env::var("AUTH_JWKS_KEY_ID")
                .context("AUTH_JWKS_KEY_ID must be set when AUTH_JWKS_ENDPOINT is used")?;
            KeySourceSettings::Jwks { endpoint, key_id }
        } else {
            bail!("either AUTH_PUBLIC_KEY_FILE or AUTH_JWKS_ENDPOINT must be set");
        };

        Ok(Self {
            key_source,
            refresh_interval_secs: env::var("AUTH_KEY_REFRESH_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid AUTH_KEY_REFRESH_INTERVAL_SECS")?,
            resolve_timeout_secs: env::var("AUTH_KEY_RESOLVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid AUTH_KEY_RESOLVE_TIMEOUT_SECS")?,
        })
    }

    /// Build the resolver for the selected strategy and assemble a
    /// [`Configuration`] around the given policy.
    pub fn into_configuration(self, policy: ScopePolicy) -> Result<Configuration> {
        let resolve_timeout = Duration::from_secs(self.resolve_timeout_secs);

        let key_resolver: Arc<dyn KeyResolver> = match self.key_source {
            KeySourceSettings::File { path } => Arc::new(FromFileKeyResolver::new(path)),
            KeySourceSettings::Jwks { endpoint, key_id } => {
                let endpoint = Url::parse(&endpoint)
                    .with_context(|| format!("invalid AUTH_JWKS_ENDPOINT: {}", endpoint))?;
                Arc::new(
                    JwksResolver::new(endpoint, key_id, resolve_timeout)
                        .context("building JWKS resolver")?,
                )
            }
        };

        Ok(Configuration {
            key_resolver,
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            resolve_timeout,
            policy,
        })
    }
}
