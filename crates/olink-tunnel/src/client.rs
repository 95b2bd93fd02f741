//! Secure Tunnel Client
//!
//! Wraps a logical API request (method, path, parameters) into a single
//! sealed POST on a time-derived, obfuscated path:
//!
//! 1. Serialize `{method, url, param}` to JSON
//! 2. Pick the window for `now + offset`
//! 3. Derive and obfuscate the path for that window
//! 4. Seal the JSON under the window key
//! 5. POST the envelope as `text/plain`
//! 6. Open the response under the window or a neighbour
//! 7. On failure with no known offset, probe for clock skew and retry once
//!
//! # Usage
//!
//! ```rust,ignore
//! let tunnel = SecureTunnel::new(TunnelConfig::default())?;
//! let reply = tunnel.send(&Method::POST, "/api/mobile/node/list", Some(params)).await?;
//! ```

use crate::cipher::{CipherError, MinuteCipher, SealedEnvelope};
use crate::config::{ConfigError, TunnelConfig};
use crate::offset::{ClockOffset, OffsetProber};
use crate::params::{Params, TunnelPayload};
use crate::path::{derive_path, obfuscate};
use crate::time_window::TimeWindowKey;
use crate::transport::{HttpTransport, Transport, TransportError, TransportRequest};
use hyper::Method;
use hyper::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, USER_AGENT};
use std::fmt;
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Header carrying the session token
pub const USER_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-user-token");

/// Where decryption of a response gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptStage {
    /// No sealed envelope found in the body
    Envelope,
    /// None of the three windows opened it and an offset was already known
    Window,
    /// The retry after offset discovery failed as well
    Retry,
}

impl fmt::Display for DecryptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            DecryptStage::Envelope => "envelope extraction",
            DecryptStage::Window => "window tolerance",
            DecryptStage::Retry => "retry after offset discovery",
        };
        f.write_str(stage)
    }
}

/// Tunnel errors
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to seal payload: {0}")]
    Encrypt(#[source] CipherError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Server returned HTTP {status}")]
    Status { status: u16 },

    #[error("Response body is not UTF-8 (HTTP {status})")]
    InvalidBody { status: u16 },

    #[error("Failed to decrypt response (HTTP {status}, stage: {stage})")]
    DecryptionExhausted { status: u16, stage: DecryptStage },

    #[error("No clock offset within ±12h opens the response (HTTP {status})")]
    ProbeExhausted { status: u16 },
}

impl TunnelError {
    /// HTTP status of the response that caused the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            TunnelError::Status { status }
            | TunnelError::InvalidBody { status }
            | TunnelError::DecryptionExhausted { status, .. }
            | TunnelError::ProbeExhausted { status } => Some(*status),
            _ => None,
        }
    }
}

/// Outcome of one sealed exchange
enum Exchange {
    Opened(String),
    Sealed {
        status: u16,
        envelope: Option<SealedEnvelope>,
    },
}

/// Encrypted request tunnel
pub struct SecureTunnel<T: Transport = HttpTransport> {
    config: TunnelConfig,
    cipher: MinuteCipher,
    prober: OffsetProber,
    offset: ClockOffset,
    transport: T,
    base_headers: HeaderMap,
    auth_token: RwLock<Option<HeaderValue>>,
}

impl SecureTunnel<HttpTransport> {
    /// Create a tunnel over HTTPS
    pub fn new(config: TunnelConfig) -> Result<Self, ConfigError> {
        let transport = HttpTransport::new(config.transport_config());
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> SecureTunnel<T> {
    /// Create a tunnel over a custom transport
    pub fn with_transport(config: TunnelConfig, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut base_headers = HeaderMap::new();
        base_headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        base_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|_| ConfigError::Parse("user_agent is not a valid header value".into()))?,
        );

        let cipher = MinuteCipher::new(config.secret.clone());
        Ok(Self {
            prober: OffsetProber::new(cipher.clone()),
            cipher,
            config,
            offset: ClockOffset::new(),
            transport,
            base_headers,
            auth_token: RwLock::new(None),
        })
    }

    /// Share a clock offset cell with other tunnels
    pub fn with_offset(mut self, offset: ClockOffset) -> Self {
        self.offset = offset;
        self
    }

    /// The clock offset applied to requests
    pub fn offset(&self) -> &ClockOffset {
        &self.offset
    }

    pub fn config(&self) -> &TunnelConfig {
        &self.config
    }

    /// Attach a session token to every later request
    pub fn set_auth_token(&self, token: &str) -> Result<(), InvalidHeaderValue> {
        let value = HeaderValue::from_str(token)?;
        *self.auth_token.write().unwrap_or_else(|e| e.into_inner()) = Some(value);
        Ok(())
    }

    /// Stop sending the session token
    pub fn clear_auth_token(&self) {
        *self.auth_token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Send a request through the tunnel and return the decrypted reply
    pub async fn send(&self, method: &Method, url: &str, params: Option<Params>) -> Result<String, TunnelError> {
        let payload = TunnelPayload::new(method.as_str(), url, params);
        let json = payload.to_json()?;

        debug!("Tunnel request: {} {}", payload.method, payload.url);

        let (status, envelope) = match self.exchange(&json).await? {
            Exchange::Opened(plain) => return Ok(plain),
            Exchange::Sealed { status, envelope } => (status, envelope),
        };

        let Some(envelope) = envelope else {
            return Err(TunnelError::DecryptionExhausted { status, stage: DecryptStage::Envelope });
        };
        if !self.offset.is_zero() {
            warn!("Response to {} did not open with offset {}s", url, self.offset.get());
            return Err(TunnelError::DecryptionExhausted { status, stage: DecryptStage::Window });
        }
        let prober = self.prober.clone();
        let found = tokio::task::spawn_blocking(move || prober.probe(&envelope))
            .await
            .unwrap_or_else(|e| {
                warn!("Clock offset probe task failed: {}", e);
                None
            });
        let Some(found) = found else {
            warn!("Clock offset probe exhausted for {}", url);
            return Err(TunnelError::ProbeExhausted { status });
        };

        self.offset.set(found);
        info!("Applying clock offset {}s and retrying {}", found, url);

        match self.exchange(&json).await? {
            Exchange::Opened(plain) => Ok(plain),
            Exchange::Sealed { status, .. } => {
                Err(TunnelError::DecryptionExhausted { status, stage: DecryptStage::Retry })
            }
        }
    }

    /// One sealed POST and the attempt to open its reply
    async fn exchange(&self, json: &str) -> Result<Exchange, TunnelError> {
        let window = self.current_window();
        let path = obfuscate(&derive_path(self.cipher.secret(), &window).to_path());
        let body = self.cipher.encrypt(json, &window).map_err(TunnelError::Encrypt)?;

        debug!("Tunnel POST {} (window {}, {} byte body)", path, window, body.as_str().len());

        let response = self
            .transport
            .post(TransportRequest {
                url: format!("{}{}", self.config.base(), path),
                headers: self.headers(),
                body: body.into_string().into_bytes(),
            })
            .await?;

        let status = response.status.as_u16();
        if !response.is_success() {
            warn!("Tunnel responded with HTTP {}", status);
            return Err(TunnelError::Status { status });
        }

        let text = String::from_utf8(response.body).map_err(|_| TunnelError::InvalidBody { status })?;
        let Some(envelope) = SealedEnvelope::extract(&text) else {
            warn!("No sealed envelope in response ({} bytes)", text.len());
            return Ok(Exchange::Sealed { status, envelope: None });
        };

        Ok(match self.cipher.try_decrypt(&envelope, &window) {
            Some((plain, used)) => {
                if used != window {
                    debug!("Response opened under neighbouring window {}", used);
                }
                Exchange::Opened(plain)
            }
            None => {
                warn!("Response did not open under {} or its neighbours", window);
                Exchange::Sealed { status, envelope: Some(envelope) }
            }
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = self.base_headers.clone();
        let token = self.auth_token.read().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = token.as_ref() {
            headers.insert(USER_TOKEN_HEADER, token.clone());
        }
        headers
    }

    /// Window the next request will use
    pub fn current_window(&self) -> TimeWindowKey {
        self.offset.current_window()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::reveal;
    use crate::transport::TransportResponse;
    use hyper::StatusCode;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "http://tunnel.test";
    const SECRET: &str = "sdgyuwgrikabdg@2@";

    /// Plays the tunnel server: checks the path, opens the body and
    /// answers with a sealed echo under its own clock.
    struct MockServer {
        secret: String,
        /// Server clock skew per call, the last entry repeats
        skews: Vec<i64>,
        status: StatusCode,
        raw_body: Option<String>,
        /// Fail every call at the connection level
        unreachable: bool,
        calls: AtomicUsize,
        seen: Mutex<Vec<TransportRequest>>,
    }

    impl MockServer {
        fn with_skew(secs: i64) -> Self {
            Self {
                secret: SECRET.to_string(),
                skews: vec![secs],
                status: StatusCode::OK,
                raw_body: None,
                unreachable: false,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn reply_for(&self, request: &TransportRequest, skew: i64) -> String {
            let cipher = MinuteCipher::new(self.secret.clone());
            let server_window = TimeWindowKey::now_with_offset(skew);

            let path = reveal(request.url.strip_prefix(BASE).unwrap_or_default());
            let body = String::from_utf8(request.body.clone()).unwrap();
            let reply = match cipher.try_decrypt(&SealedEnvelope::new(body), &server_window) {
                Some((plain, used)) if path == derive_path(&self.secret, &used).to_path() => {
                    let payload: TunnelPayload = serde_json::from_str(&plain).unwrap();
                    serde_json::json!({"code": 0, "data": {"method": payload.method, "url": payload.url}})
                        .to_string()
                }
                _ => r#"{"code":401,"msg":"bad tunnel request"}"#.to_string(),
            };

            cipher.encrypt(&reply, &server_window).unwrap().into_string()
        }
    }

    impl Transport for MockServer {
        async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let skew = self.skews[call.min(self.skews.len() - 1)];
            if self.unreachable {
                return Err(TransportError::ConnectionFailed("connection refused".into()));
            }

            let body = match &self.raw_body {
                Some(raw) => raw.clone(),
                None => self.reply_for(&request, skew),
            };
            self.seen.lock().unwrap().push(request);

            Ok(TransportResponse {
                status: self.status,
                headers: HeaderMap::new(),
                body: body.into_bytes(),
            })
        }
    }

    fn config() -> TunnelConfig {
        TunnelConfig {
            base_url: BASE.to_string(),
            ..TunnelConfig::default()
        }
    }

    fn tunnel(server: MockServer) -> SecureTunnel<MockServer> {
        SecureTunnel::with_transport(config(), server).unwrap()
    }

    #[tokio::test]
    async fn test_send_in_sync() {
        let tunnel = tunnel(MockServer::with_skew(0));
        let mut params = Params::new();
        params.insert("page".into(), 1.into());

        let reply = tunnel.send(&Method::POST, "/api/mobile/node/list", Some(params)).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&reply).unwrap();

        assert_eq!(json["code"], 0);
        assert_eq!(json["data"]["url"], "/api/mobile/node/list");
        assert_eq!(json["data"]["method"], "POST");
        assert!(tunnel.offset().is_zero());
        assert_eq!(tunnel.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_request_shape() {
        let tunnel = tunnel(MockServer::with_skew(0));
        tunnel.set_auth_token("token-123").unwrap();
        tunnel.send(&Method::GET, "/api/mobile/version", None).await.unwrap();

        let seen = tunnel.transport.seen.lock().unwrap();
        let request = &seen[0];
        assert!(request.url.starts_with("http://tunnel.test/"));
        assert_eq!(request.headers[CONTENT_TYPE], "text/plain");
        assert_eq!(request.headers[USER_TOKEN_HEADER], "token-123");
        assert!(request.headers.contains_key(USER_AGENT));

        // Body is the base64 envelope, never the JSON itself
        let body = String::from_utf8(request.body.clone()).unwrap();
        assert!(!body.contains("/api/mobile/version"));
        assert!(SealedEnvelope::extract(&body).is_some());
    }

    #[tokio::test]
    async fn test_token_can_be_cleared() {
        let tunnel = tunnel(MockServer::with_skew(0));
        tunnel.set_auth_token("t").unwrap();
        tunnel.clear_auth_token();
        tunnel.send(&Method::GET, "/api/mobile/version", None).await.unwrap();

        let seen = tunnel.transport.seen.lock().unwrap();
        assert!(!seen[0].headers.contains_key(USER_TOKEN_HEADER));
    }

    #[tokio::test]
    async fn test_small_skew_needs_no_probe() {
        let tunnel = tunnel(MockServer::with_skew(30));

        tunnel.send(&Method::POST, "/api/mobile/vpn/count", None).await.unwrap();

        assert!(tunnel.offset().is_zero());
        assert_eq!(tunnel.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_discovers_eight_hour_skew_and_retries() {
        let tunnel = tunnel(MockServer::with_skew(480 * 60));

        let reply = tunnel.send(&Method::POST, "/api/mobile/guest/login", None).await.unwrap();

        assert!(reply.contains("\"code\":0"));
        assert_eq!(tunnel.transport.calls(), 2);
        // A minute boundary between seal and probe can shift the result by one minute
        assert!((tunnel.offset().get() - 28_800).abs() <= 60);
    }

    #[tokio::test]
    async fn test_known_offset_is_reused() {
        let shared = ClockOffset::new();
        let first = tunnel(MockServer::with_skew(-480 * 60)).with_offset(shared.clone());
        let second = tunnel(MockServer::with_skew(-480 * 60)).with_offset(shared.clone());

        first.send(&Method::POST, "/api/mobile/node/list", None).await.unwrap();
        second.send(&Method::POST, "/api/mobile/node/list", None).await.unwrap();

        assert!(!shared.is_zero());
        assert_eq!(first.transport.calls(), 2);
        assert_eq!(second.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_foreign_server_exhausts_probe() {
        let mut server = MockServer::with_skew(0);
        server.secret = "not our secret".to_string();
        let tunnel = tunnel(server);

        let err = tunnel.send(&Method::POST, "/api/mobile/node/list", None).await.unwrap_err();

        assert!(matches!(err, TunnelError::ProbeExhausted { status: 200 }));
        assert!(tunnel.offset().is_zero());
        assert_eq!(tunnel.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_happens_once() {
        let mut server = MockServer::with_skew(480 * 60);
        server.skews = vec![480 * 60, -300 * 60];
        let tunnel = tunnel(server);

        let err = tunnel.send(&Method::POST, "/api/mobile/node/list", None).await.unwrap_err();

        assert!(matches!(
            err,
            TunnelError::DecryptionExhausted { stage: DecryptStage::Retry, .. }
        ));
        assert_eq!(tunnel.transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_probe_when_offset_known() {
        let tunnel = tunnel(MockServer::with_skew(200 * 60));
        tunnel.offset().set(480 * 60);

        let err = tunnel.send(&Method::POST, "/api/mobile/node/list", None).await.unwrap_err();

        assert!(matches!(
            err,
            TunnelError::DecryptionExhausted { stage: DecryptStage::Window, .. }
        ));
        assert_eq!(tunnel.offset().get(), 480 * 60);
        assert_eq!(tunnel.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = MockServer::with_skew(0);
        server.status = StatusCode::BAD_GATEWAY;
        let tunnel = tunnel(server);

        let err = tunnel.send(&Method::POST, "/api/mobile/node/list", None).await.unwrap_err();

        assert!(matches!(err, TunnelError::Status { status: 502 }));
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_retried() {
        let mut server = MockServer::with_skew(0);
        server.unreachable = true;
        let tunnel = tunnel(server);

        let err = tunnel.send(&Method::POST, "/api/mobile/node/list", None).await.unwrap_err();

        assert!(matches!(err, TunnelError::Transport(TransportError::ConnectionFailed(_))));
        assert_eq!(err.status(), None);
        assert!(tunnel.offset().is_zero());
        assert_eq!(tunnel.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_plain_body_is_undecryptable() {
        let mut server = MockServer::with_skew(0);
        server.raw_body = Some("<html>maintenance</html>".to_string());
        let tunnel = tunnel(server);

        let err = tunnel.send(&Method::POST, "/api/mobile/node/list", None).await.unwrap_err();

        assert!(matches!(
            err,
            TunnelError::DecryptionExhausted { stage: DecryptStage::Envelope, status: 200 }
        ));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let bad = TunnelConfig {
            secret: String::new(),
            ..config()
        };

        assert!(SecureTunnel::with_transport(bad, MockServer::with_skew(0)).is_err());
    }
}
