//! Configuration structures for LXD clients.
//!
//! Covers the daemon endpoint and the TLS material handed to the HTTP client. Connection
//! pooling is left to the HTTP client's defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use validator::{Validate, ValidationError};

use crate::Error;

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("lxd-rs/", env!("CARGO_PKG_VERSION"));

/// Configuration for an LXD client instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_client_identity"))]
pub struct LxdConfig {
    /// Daemon base URL, e.g. `https://127.0.0.1:8443`
    #[validate(url)]
    pub endpoint: String,

    /// Whether to verify the daemon's TLS certificate
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// PEM client certificate used to authenticate against the daemon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_cert: Option<PathBuf>,

    /// PEM private key matching `client_cert`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<PathBuf>,

    /// Extra PEM CA certificate trusted for the daemon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Whole-request timeout in seconds; no timeout when absent
    #[validate(range(min = 1, max = 3600))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// User agent header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_tls_verify() -> bool {
    true
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn validate_client_identity(config: &LxdConfig) -> Result<(), ValidationError> {
    if config.client_cert.is_some() != config.client_key.is_some() {
        let mut err = ValidationError::new("client_identity");
        err.message = Some("client_cert and client_key must be set together".into());
        return Err(err);
    }
    Ok(())
}

impl LxdConfig {
    /// Create a new configuration for the given daemon endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the endpoint is not a valid URL.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            endpoint: endpoint.into(),
            ..Self::default()
        };

        config.validate().map_err(|e| {
            Error::Config(format!("Invalid configuration: {e}"))
        })?;

        Ok(config)
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set the client certificate and key used for TLS authentication.
    #[must_use]
    pub fn with_client_identity(mut self, cert: PathBuf, key: PathBuf) -> Self {
        self.client_cert = Some(cert);
        self.client_key = Some(key);
        self
    }

    /// Set a custom CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: PathBuf) -> Self {
        self.ca_cert = Some(path);
        self
    }

    /// Set the request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = Some(seconds);
        self
    }

    /// Set the user agent header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Parse the endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_endpoint(&self) -> Result<Url, Error> {
        Url::parse(&self.endpoint)
            .map_err(|e| Error::Config(format!("Invalid LXD endpoint: {e}")))
    }

    /// Validate the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first failing rule.
    pub fn check(&self) -> Result<(), Error> {
        self.validate()
            .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))
    }
}

impl Default for LxdConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://127.0.0.1:8443".to_string(),
            tls_verify: default_tls_verify(),
            client_cert: None,
            client_key: None,
            ca_cert: None,
            request_timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}
