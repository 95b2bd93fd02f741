//! OpenLink Secure Tunnel
//!
//! Sends API requests to the OpenLink server through an obfuscated,
//! time-boxed tunnel.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   JSON    ┌──────────────┐  sealed body   ┌──────────┐
//! │  API caller  │──────────▶│ SecureTunnel │───────────────▶│ Server   │
//! │ (method,url, │           │              │  POST /x9f.../ │          │
//! │  params)     │◀──────────│  window key  │◀───────────────│          │
//! └──────────────┘ plaintext └──────┬───────┘  sealed reply  └──────────┘
//!                                   │ on failure
//!                            ┌──────▼───────┐
//!                            │ OffsetProber │  ±12h skew search
//!                            └──────────────┘
//! ```
//!
//! # Security
//!
//! - Bodies sealed with AES-256-GCM under `SHA-256(secret ++ minute)`
//! - Paths change every minute and carry random padding
//! - The scheme is only as strong as the secrecy of the pre-shared string

mod api;
mod cipher;
mod client;
mod config;
mod offset;
mod params;
mod path;
mod time_window;
mod transport;

pub use api::{ApiError, ApiReply, CODE_SESSION_EXPIRED};
pub use cipher::{CipherError, MinuteCipher, SealedEnvelope};
pub use client::{DecryptStage, SecureTunnel, TunnelError, USER_TOKEN_HEADER};
pub use config::{ConfigError, DEFAULT_BASE_URL, DEFAULT_SHARED_SECRET, TunnelConfig};
pub use offset::{ClockOffset, OffsetProber};
pub use params::{ParamValue, Params, TunnelPayload};
pub use path::{DerivedPath, derive_path, obfuscate, reveal};
pub use time_window::TimeWindowKey;
pub use transport::{
    HttpTransport, HttpTransportConfig, Transport, TransportError, TransportRequest,
    TransportResponse,
};

/// Re-exported so callers can name request methods without depending on hyper
pub use hyper::Method;
