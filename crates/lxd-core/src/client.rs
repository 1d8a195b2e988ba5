//! HTTP client capability used by the transport.
//!
//! [`HttpBackend`] is the seam between the dispatch layer and the network. The production
//! implementation wraps a pooled [`reqwest::Client`]; tests substitute a mock.

use async_trait::async_trait;
use reqwest::{Certificate, Client, ClientBuilder, Identity, Method};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::config::LxdConfig;
use crate::error::{Error, Result};

/// Raw HTTP reply handed back to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Canonical reason phrase for the status
    pub reason: String,
    /// `Content-Type` header, if any
    pub content_type: Option<String>,
    /// Response body
    pub body: Vec<u8>,
}

impl RawResponse {
    /// True when the content type names JSON (`application/json`, optionally with parameters).
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type.as_deref().is_some_and(|value| {
            value
                .split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        })
    }
}

/// Capability for sending one HTTP request.
///
/// Implementations must be safe for concurrent use; the transport adds no locking around them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Send a request and read the full body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the body cannot be read.
    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<RawResponse>;

    /// Release pooled connections. Later sends may fail with [`Error::Closed`].
    async fn close(&self);
}

/// [`HttpBackend`] backed by reqwest.
#[derive(Debug)]
pub struct ReqwestBackend {
    http: RwLock<Option<Client>>,
}

impl ReqwestBackend {
    /// Build a client from configuration, loading any TLS material it names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if certificates cannot be read or the client cannot be built.
    pub fn from_config(config: &LxdConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .user_agent(config.user_agent.as_str())
            .use_rustls_tls();

        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        if !config.tls_verify {
            warn!("TLS verification disabled for LXD client");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ca_cert) = &config.ca_cert {
            debug!("loading LXD CA certificate from {}", ca_cert.display());
            let bytes = std::fs::read(ca_cert).map_err(|err| {
                Error::Config(format!(
                    "Failed to read LXD CA certificate {}: {err}",
                    ca_cert.display()
                ))
            })?;
            let cert = Certificate::from_pem(&bytes)
                .map_err(|err| Error::Config(format!("Invalid LXD CA certificate: {err}")))?;
            builder = builder.add_root_certificate(cert);
        }

        if let (Some(cert_path), Some(key_path)) = (&config.client_cert, &config.client_key) {
            debug!(
                "loading LXD client certificate from {} and key from {}",
                cert_path.display(),
                key_path.display()
            );
            let mut pem = read_pem(cert_path)?;
            pem.push(b'\n');
            pem.extend(read_pem(key_path)?);
            let identity = Identity::from_pem(&pem)
                .map_err(|err| Error::Config(format!("Invalid LXD client identity: {err}")))?;
            builder = builder.identity(identity);
        }

        let http = builder.build().map_err(|err| {
            Error::Config(format!("Failed to build LXD HTTP client: {err}"))
        })?;

        Ok(Self::from_client(http))
    }

    /// Wrap an existing reqwest client.
    #[must_use]
    pub fn from_client(http: Client) -> Self {
        Self {
            http: RwLock::new(Some(http)),
        }
    }

    /// Returns true once [`HttpBackend::close`] has run.
    pub async fn is_closed(&self) -> bool {
        self.http.read().await.is_none()
    }
}

fn read_pem(path: &std::path::Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|err| {
        Error::Config(format!("Failed to read {}: {err}", path.display()))
    })
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<RawResponse> {
        let http = self.http.read().await.clone().ok_or(Error::Closed)?;

        let mut request = http
            .request(method, url)
            .header("Accept", "application/json");
        if let Some(payload) = &body {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            content_type,
            body,
        })
    }

    async fn close(&self) {
        self.http.write().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn raw(content_type: Option<&str>) -> RawResponse {
        RawResponse {
            status: 200,
            reason: "OK".to_string(),
            content_type: content_type.map(str::to_string),
            body: Vec::new(),
        }
    }

    #[test]
    fn json_content_type_detection() {
        assert!(raw(Some("application/json")).is_json());
        assert!(raw(Some("application/json; charset=utf-8")).is_json());
        assert!(raw(Some("Application/JSON")).is_json());
        assert!(!raw(Some("text/html")).is_json());
        assert!(!raw(None).is_json());
    }

    #[tokio::test]
    async fn send_posts_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.0/instances"))
            .and(header("Accept", "application/json"))
            .and(body_json(json!({"name": "web"})))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"type": "async"})))
            .mount(&server)
            .await;

        let backend = ReqwestBackend::from_config(&LxdConfig::new(server.uri()).unwrap()).unwrap();
        let url = Url::parse(&format!("{}/1.0/instances", server.uri())).unwrap();
        let resp = backend
            .send(Method::POST, url, Some(json!({"name": "web"})))
            .await
            .unwrap();

        assert_eq!(resp.status, 202);
        assert_eq!(resp.reason, "Accepted");
        assert!(resp.is_json());
        assert_eq!(
            serde_json::from_slice::<Value>(&resp.body).unwrap(),
            json!({"type": "async"})
        );
    }

    #[tokio::test]
    async fn closed_backend_refuses_requests() {
        let backend = ReqwestBackend::from_client(Client::new());
        assert!(!backend.is_closed().await);
        backend.close().await;
        assert!(backend.is_closed().await);

        let url = Url::parse("http://127.0.0.1:9/1.0").unwrap();
        let err = backend.send(Method::GET, url, None).await.unwrap_err();
        assert_eq!(err, Error::Closed);
    }

    #[test]
    fn missing_ca_cert_is_config_error() {
        let config = LxdConfig::default().with_ca_cert("/nonexistent/ca.pem".into());
        let err = ReqwestBackend::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
