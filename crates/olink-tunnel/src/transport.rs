//! HTTP Transport
//!
//! The tunnel only needs one primitive: POST an opaque body to a URL and
//! read the raw response. [`HttpTransport`] does this with hyper over
//! rustls; tests substitute their own [`Transport`].

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Bytes;
use hyper::header::{HOST, HeaderMap};
use hyper::{Method, Request, StatusCode, Uri};
use rustls::ClientConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Body read error: {0}")]
    Body(String),
}

/// An opaque POST
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Absolute URL
    pub url: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Raw body
    pub body: Vec<u8>,
}

/// Raw response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Check if response was successful (2xx)
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Something that can carry a tunnel request
pub trait Transport: Send + Sync {
    fn post(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// HTTP transport configuration
#[derive(Clone)]
pub struct HttpTransportConfig {
    /// Whole-request timeout
    pub timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Maximum response body size
    pub max_body_size: usize,
    /// TLS settings; webpki roots when unset. Certificate pinning is
    /// configured here by the caller.
    pub tls: Option<Arc<ClientConfig>>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            max_body_size: 4 * 1024 * 1024, // 4 MB
            tls: None,
        }
    }
}

impl std::fmt::Debug for HttpTransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransportConfig")
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_body_size", &self.max_body_size)
            .field("custom_tls", &self.tls.is_some())
            .finish()
    }
}

/// hyper/rustls implementation of [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: HttpTransportConfig,
    tls: Arc<ClientConfig>,
}

impl HttpTransport {
    /// Create a new transport
    pub fn new(config: HttpTransportConfig) -> Self {
        let tls = config.tls.clone().unwrap_or_else(default_tls_config);
        Self { config, tls }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(HttpTransportConfig::default())
    }

    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let start = Instant::now();

        let uri: Uri = request
            .url
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| TransportError::InvalidUrl(e.to_string()))?;
        let host = uri
            .host()
            .ok_or_else(|| TransportError::InvalidUrl("No host in URL".to_string()))?
            .to_string();
        let is_https = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            other => {
                return Err(TransportError::InvalidUrl(format!(
                    "Unsupported scheme: {}",
                    other.unwrap_or("none")
                )));
            }
        };
        let port = uri.port_u16().unwrap_or(if is_https { 443 } else { 80 });
        let authority = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .unwrap_or_else(|| host.clone());

        // HTTP/1 request line carries the origin form only
        let target = uri.path_and_query().map_or("/", |pq| pq.as_str());

        let mut builder = Request::builder().method(Method::POST).uri(target).header(HOST, authority);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        let body_len = request.body.len();
        let http_request = builder
            .body(Full::new(Bytes::from(request.body)))
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let addr = format!("{}:{}", host, port);
        let stream = tokio::time::timeout(self.config.connect_timeout, tokio::net::TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let response = if is_https {
            let connector = TlsConnector::from(self.tls.clone());
            let server_name = rustls::pki_types::ServerName::try_from(
                host.trim_start_matches('[').trim_end_matches(']').to_string(),
            )
            .map_err(|_| TransportError::Tls("Invalid server name".to_string()))?;

            let tls_stream = connector
                .connect(server_name, stream)
                .await
                .map_err(|e| TransportError::Tls(e.to_string()))?;
            send_over(tls_stream, http_request).await?
        } else {
            send_over(stream, http_request).await?
        };

        let status = response.status();
        let headers = response.headers().clone();

        let collected = Limited::new(response.into_body(), self.config.max_body_size)
            .collect()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;
        let body = collected.to_bytes().to_vec();

        debug!(
            "POST {} -> {} ({} bytes out, {} bytes in, {:?})",
            uri.path(),
            status,
            body_len,
            body.len(),
            start.elapsed()
        );

        Ok(TransportResponse { status, headers, body })
    }
}

impl Transport for HttpTransport {
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        tokio::time::timeout(self.config.timeout, self.send(request))
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}

async fn send_over<S>(
    stream: S,
    request: Request<Full<Bytes>>,
) -> Result<hyper::Response<hyper::body::Incoming>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| TransportError::Http(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            warn!("Connection error: {}", e);
        }
    });

    sender
        .send_request(request)
        .await
        .map_err(|e| TransportError::Http(e.to_string()))
}

fn default_tls_config() -> Arc<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    )
}
