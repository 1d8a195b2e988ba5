//! Request execution and envelope dispatch.
//!
//! The [`Transport`] renders an [`ApiPath`], merges query parameters, sends the call through
//! its [`HttpBackend`] and classifies whatever comes back. It performs exactly one attempt
//! per call.

use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{HttpBackend, RawResponse, ReqwestBackend};
use crate::config::LxdConfig;
use crate::error::{Error, Result};
use crate::path::ApiPath;
use crate::query::QueryParams;
use crate::response::Response;

/// Client handle for the daemon's REST API.
///
/// Clones share the same backend.
#[derive(Clone)]
pub struct Transport {
    backend: Arc<dyn HttpBackend>,
    root: ApiPath,
    owns_backend: bool,
}

impl Transport {
    /// Create a transport with its own reqwest client built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or TLS material cannot be loaded.
    pub fn new(config: &LxdConfig) -> Result<Self> {
        config.check()?;
        let root = ApiPath::root(&config.endpoint)?;
        let backend = ReqwestBackend::from_config(config)?;
        Ok(Self {
            backend: Arc::new(backend),
            root,
            owns_backend: true,
        })
    }

    /// Create a transport around a caller-supplied reqwest client.
    ///
    /// [`Transport::close`] leaves the client untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if `base_url` is not an http(s) URL.
    pub fn with_client(base_url: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        Self::with_backend(base_url, Arc::new(ReqwestBackend::from_client(http)))
    }

    /// Create a transport around an injected backend.
    ///
    /// [`Transport::close`] leaves the backend untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if `base_url` is not an http(s) URL.
    pub fn with_backend(base_url: impl AsRef<str>, backend: Arc<dyn HttpBackend>) -> Result<Self> {
        Ok(Self {
            backend,
            root: ApiPath::root(base_url)?,
            owns_backend: false,
        })
    }

    /// Root path (`<origin>/1.0`).
    #[must_use]
    pub const fn root(&self) -> &ApiPath {
        &self.root
    }

    /// Shorthand for `root().child(segment)`.
    #[must_use]
    pub fn path(&self, segment: impl AsRef<str>) -> ApiPath {
        self.root.child(segment)
    }

    /// Resolve a daemon reference such as `/1.0/operations/<id>`.
    #[must_use]
    pub fn resolve(&self, reference: impl AsRef<str>) -> ApiPath {
        self.root.resolve(reference)
    }

    /// True if this transport created its backend and will release it on close.
    #[must_use]
    pub const fn owns_backend(&self) -> bool {
        self.owns_backend
    }

    /// Execute one request and classify the reply.
    ///
    /// `body` is sent only for POST, PUT and PATCH.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] for HTTP 5xx, [`Error::ContentType`] for non-JSON replies,
    /// [`Error::Decode`] for undecodable bodies, any classifier error, or the backend's own
    /// error if the request could not be sent.
    pub async fn request(
        &self,
        method: Method,
        path: &ApiPath,
        body: Option<&Value>,
        query: &QueryParams,
    ) -> Result<Response> {
        let mut url = path.to_url()?;
        query.apply_to(&mut url);

        let payload = if carries_body(&method) {
            body.cloned()
        } else {
            None
        };

        debug!(%method, url = %url, has_body = payload.is_some(), "Sending LXD request");
        let raw = self.backend.send(method, url, payload).await?;
        interpret(raw)
    }

    /// GET `path`.
    ///
    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn get(&self, path: &ApiPath, query: &QueryParams) -> Result<Response> {
        self.request(Method::GET, path, None, query).await
    }

    /// POST `body` to `path`.
    ///
    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn post(
        &self,
        path: &ApiPath,
        body: Option<&Value>,
        query: &QueryParams,
    ) -> Result<Response> {
        self.request(Method::POST, path, body, query).await
    }

    /// PUT `body` to `path`.
    ///
    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn put(
        &self,
        path: &ApiPath,
        body: Option<&Value>,
        query: &QueryParams,
    ) -> Result<Response> {
        self.request(Method::PUT, path, body, query).await
    }

    /// PATCH `path` with `body`.
    ///
    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn patch(
        &self,
        path: &ApiPath,
        body: Option<&Value>,
        query: &QueryParams,
    ) -> Result<Response> {
        self.request(Method::PATCH, path, body, query).await
    }

    /// DELETE `path`.
    ///
    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn delete(&self, path: &ApiPath, query: &QueryParams) -> Result<Response> {
        self.request(Method::DELETE, path, None, query).await
    }

    /// HEAD `path`.
    ///
    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn head(&self, path: &ApiPath, query: &QueryParams) -> Result<Response> {
        self.request(Method::HEAD, path, None, query).await
    }

    /// OPTIONS `path`.
    ///
    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn options(&self, path: &ApiPath, query: &QueryParams) -> Result<Response> {
        self.request(Method::OPTIONS, path, None, query).await
    }

    /// Release the backend if this transport created it.
    pub async fn close(&self) {
        if self.owns_backend {
            info!(root = %self.root, "Closing LXD transport");
            self.backend.close().await;
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("root", &self.root)
            .field("owns_backend", &self.owns_backend)
            .finish_non_exhaustive()
    }
}

fn carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

fn interpret(raw: RawResponse) -> Result<Response> {
    if raw.status >= 500 {
        warn!(status = raw.status, reason = %raw.reason, "LXD server error");
        return Err(Error::Server {
            status: raw.status,
            reason: raw.reason,
        });
    }

    if !raw.is_json() {
        return Err(Error::ContentType {
            status: raw.status,
            content_type: raw.content_type.unwrap_or_default(),
        });
    }

    let envelope: Value = serde_json::from_slice(&raw.body).map_err(|err| Error::Decode {
        status: raw.status,
        cause: err.to_string(),
    })?;

    Response::classify(envelope)
}
