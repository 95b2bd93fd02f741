//! API Reply Handling
//!
//! Decrypted replies share one JSON shape: `{"code": <int>, "msg": ..., "data": ...}`.
//! `0` and `200` mean success, `104` means the session token expired.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Reply code signalling an expired session
pub const CODE_SESSION_EXPIRED: i64 = 104;

/// API-level errors carried inside a successfully decrypted reply
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Session expired")]
    Unauthorized,

    #[error("Server error ({code}): {message}")]
    Server { code: i64, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Response has no data member")]
    MissingData,
}

/// A successful API reply
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    json: Value,
}

impl ApiReply {
    /// Parse a decrypted reply and check its code
    pub fn parse(plaintext: &str) -> Result<Self, ApiError> {
        let json: Value = serde_json::from_str(plaintext)?;
        let code = json.get("code").and_then(Value::as_i64).unwrap_or(0);

        if code == CODE_SESSION_EXPIRED {
            return Err(ApiError::Unauthorized);
        }
        if code != 0 && code != 200 {
            let message = ["msg", "message"]
                .iter()
                .find_map(|key| json.get(*key).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string();
            return Err(ApiError::Server { code, message });
        }

        Ok(Self { json })
    }

    /// The whole reply
    pub fn json(&self) -> &Value {
        &self.json
    }

    /// The `data` member, if present
    pub fn data(&self) -> Option<&Value> {
        self.json.get("data").filter(|v| !v.is_null())
    }

    /// Deserialize the `data` member
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let data = self.data().ok_or(ApiError::MissingData)?;
        Ok(T::deserialize(data)?)
    }
}
