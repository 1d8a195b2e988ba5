//! LXD client facade.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use lxd_core::{HttpBackend, LazyEntity, LxdConfig, Transport};
use tracing::debug;

use crate::instances::InstanceGroup;
use crate::models::Operation;
use crate::Result;

/// Builder for [`LxdClient`].
#[derive(Clone)]
pub struct LxdClientBuilder {
    config: LxdConfig,
    http: Option<reqwest::Client>,
    backend: Option<Arc<dyn HttpBackend>>,
}

impl LxdClientBuilder {
    /// Create a builder for the daemon at `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self::from_config(LxdConfig::new(endpoint)?))
    }

    /// Start from a complete configuration.
    #[must_use]
    pub const fn from_config(config: LxdConfig) -> Self {
        Self {
            config,
            http: None,
            backend: None,
        }
    }

    /// Enable or disable server certificate verification.
    #[must_use]
    pub fn with_tls_verify(mut self, verify: bool) -> Self {
        self.config = self.config.with_tls_verify(verify);
        self
    }

    /// Authenticate with a client certificate and key (PEM files).
    #[must_use]
    pub fn with_client_identity(mut self, cert: PathBuf, key: PathBuf) -> Self {
        self.config = self.config.with_client_identity(cert, key);
        self
    }

    /// Use a caller-owned reqwest client. TLS settings from the configuration are ignored and
    /// closing the client leaves it usable.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Use a caller-owned backend. Takes precedence over [`Self::with_http_client`].
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn HttpBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<LxdClient> {
        let transport = match (self.backend, self.http) {
            (Some(backend), _) => Transport::with_backend(&self.config.endpoint, backend)?,
            (None, Some(http)) => Transport::with_client(&self.config.endpoint, http)?,
            (None, None) => Transport::new(&self.config)?,
        };

        debug!(root = %transport.root(), owned = transport.owns_backend(), "Built LXD client");
        Ok(LxdClient { transport })
    }
}

impl fmt::Debug for LxdClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LxdClientBuilder")
            .field("config", &self.config)
            .field("http", &self.http.is_some())
            .field("backend", &self.backend.is_some())
            .finish()
    }
}

/// Asynchronous LXD client.
#[derive(Debug, Clone)]
pub struct LxdClient {
    transport: Transport,
}

impl LxdClient {
    /// Construct a client for `endpoint` with default settings.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        LxdClientBuilder::new(endpoint)?.build()
    }

    /// Underlying transport, for endpoints without a dedicated group.
    #[must_use]
    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Instance endpoints.
    #[must_use]
    pub fn instances(&self) -> InstanceGroup {
        InstanceGroup::new(self.transport.clone())
    }

    /// Unresolved handle for an operation reference such as `/1.0/operations/<id>`.
    #[must_use]
    pub fn operation(&self, reference: &str) -> LazyEntity<Operation> {
        LazyEntity::from_reference(self.transport.clone(), reference)
    }

    /// Release the HTTP client if this client created it.
    pub async fn close(&self) {
        self.transport.close().await;
    }
}
