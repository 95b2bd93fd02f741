//! Minute-Keyed AES-256-GCM
//!
//! Request and response bodies are sealed with a key derived from the
//! shared secret and the current [`TimeWindowKey`]:
//!
//! ```text
//! key      = SHA-256(secret ++ "YYYY-MM-DDTHH:MM:00Z")
//! envelope = base64(nonce[12] || ciphertext || tag[16])
//! ```
//!
//! A fresh random nonce is drawn for every seal.

use crate::time_window::TimeWindowKey;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha2::{Digest, Sha256};
use std::fmt;

/// AES-GCM nonce length
const NONCE_LEN: usize = 12;

/// AES-GCM tag length
const TAG_LEN: usize = 16;

/// Shortest body worth treating as a base64 envelope
const MIN_ENVELOPE_LEN: usize = 16;

/// JSON keys that may carry the envelope when the server wraps it
const ENVELOPE_KEYS: &[&str] = &["cipher", "ciphertext", "data", "result", "payload"];

/// Cipher errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    #[error("AEAD seal failed")]
    Encrypt,

    #[error("Envelope is not valid base64")]
    InvalidBase64,

    #[error("Envelope too short ({0} bytes)")]
    Truncated(usize),

    #[error("AEAD open failed (wrong key or tampered envelope)")]
    Decrypt,

    #[error("Decrypted body is not UTF-8")]
    InvalidUtf8,
}

/// Base64 sealed body as sent on the wire
#[derive(Clone, PartialEq, Eq)]
pub struct SealedEnvelope(String);

impl SealedEnvelope {
    /// Wrap an envelope string without validation
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Find the envelope in a raw response body.
    ///
    /// The body is either the bare base64 envelope or a JSON object holding
    /// it under one of a few well-known keys, possibly nested in `data`.
    pub fn extract(body: &str) -> Option<Self> {
        let trimmed = body.trim();
        if looks_like_base64(trimmed) {
            return Some(Self(trimmed.to_string()));
        }

        let candidate = pick_from_json(body)?;
        let candidate = candidate.trim();
        looks_like_base64(candidate).then(|| Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn decode(&self) -> Result<Vec<u8>, CipherError> {
        BASE64
            .decode(self.0.as_bytes())
            .map_err(|_| CipherError::InvalidBase64)
    }
}

impl fmt::Debug for SealedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedEnvelope({} chars)", self.0.len())
    }
}

impl fmt::Display for SealedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Seals and opens bodies under per-minute keys
#[derive(Clone)]
pub struct MinuteCipher {
    secret: String,
}

impl MinuteCipher {
    /// Create a cipher for a shared secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Shared secret used for key derivation
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Derive the 256-bit key for a window
    pub fn key_for(&self, window: &TimeWindowKey) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(window.as_str().as_bytes());
        hasher.finalize().into()
    }

    /// Seal `plaintext` under the key for `window`
    pub fn encrypt(&self, plaintext: &str, window: &TimeWindowKey) -> Result<SealedEnvelope, CipherError> {
        let cipher = self.aead(window)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);

        Ok(SealedEnvelope(BASE64.encode(combined)))
    }

    /// Open `envelope` with the key for `window`
    pub fn decrypt(&self, envelope: &SealedEnvelope, window: &TimeWindowKey) -> Result<String, CipherError> {
        let combined = envelope.decode()?;
        if combined.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Truncated(combined.len()));
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        let cipher = self.aead(window).map_err(|_| CipherError::Decrypt)?;
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Decrypt)?;

        String::from_utf8(plain).map_err(|_| CipherError::InvalidUtf8)
    }

    /// Open `envelope` with the current window or either neighbour.
    ///
    /// Tries `current`, the minute before, then the minute after, and
    /// returns the plaintext along with the window that opened it.
    pub fn try_decrypt(
        &self,
        envelope: &SealedEnvelope,
        current: &TimeWindowKey,
    ) -> Option<(String, TimeWindowKey)> {
        [current.clone(), current.previous(), current.next()]
            .into_iter()
            .find_map(|window| {
                self.decrypt(envelope, &window)
                    .ok()
                    .map(|plain| (plain, window))
            })
    }

    fn aead(&self, window: &TimeWindowKey) -> Result<Aes256Gcm, CipherError> {
        Aes256Gcm::new_from_slice(&self.key_for(window)).map_err(|_| CipherError::Encrypt)
    }
}

impl fmt::Debug for MinuteCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MinuteCipher([redacted])")
    }
}

fn looks_like_base64(s: &str) -> bool {
    s.len() >= MIN_ENVELOPE_LEN
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=' | b'_' | b'-' | b'\n' | b'\r')
        })
}

fn pick_from_json(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    let object = json.as_object()?;

    let find = |map: &serde_json::Map<String, serde_json::Value>| {
        ENVELOPE_KEYS.iter().find_map(|key| {
            map.get(*key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    };

    find(object).or_else(|| object.get("data")?.as_object().and_then(find))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "sdgyuwgrikabdg@2@";

    fn window(s: &str) -> TimeWindowKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_key_schedule() {
        let cipher = MinuteCipher::new(SECRET);
        let key = cipher.key_for(&window("2026-02-07T12:34:00Z"));

        assert_eq!(
            key[..4],
            [0x05, 0x1b, 0x22, 0x9a],
            "key is SHA-256(secret ++ window)"
        );
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = MinuteCipher::new(SECRET);
        let w = window("2026-02-07T12:34:00Z");

        for text in ["", "hello", "{\"method\":\"POST\"}", "节点列表 ✅"] {
            let sealed = cipher.encrypt(text, &w).unwrap();
            assert_eq!(cipher.decrypt(&sealed, &w).unwrap(), text);
        }
    }

    #[test]
    fn test_envelope_layout() {
        let cipher = MinuteCipher::new(SECRET);
        let sealed = cipher.encrypt("abc", &TimeWindowKey::now()).unwrap();
        let raw = BASE64.decode(sealed.as_str()).unwrap();

        assert_eq!(raw.len(), NONCE_LEN + 3 + TAG_LEN);
    }

    #[test]
    fn test_nonce_is_fresh() {
        let cipher = MinuteCipher::new(SECRET);
        let w = TimeWindowKey::now();

        assert_ne!(cipher.encrypt("same", &w).unwrap(), cipher.encrypt("same", &w).unwrap());
    }

    #[test]
    fn test_wrong_window_fails() {
        let cipher = MinuteCipher::new(SECRET);
        let w = window("2026-02-07T12:34:00Z");
        let sealed = cipher.encrypt("payload", &w).unwrap();

        assert_eq!(cipher.decrypt(&sealed, &w.next()), Err(CipherError::Decrypt));
        assert_eq!(
            MinuteCipher::new("other").decrypt(&sealed, &w),
            Err(CipherError::Decrypt)
        );
    }

    #[test]
    fn test_malformed_envelopes() {
        let cipher = MinuteCipher::new(SECRET);
        let w = TimeWindowKey::now();

        assert_eq!(
            cipher.decrypt(&SealedEnvelope::new("not base64!!"), &w),
            Err(CipherError::InvalidBase64)
        );
        assert_eq!(
            cipher.decrypt(&SealedEnvelope::new(BASE64.encode([0u8; 10])), &w),
            Err(CipherError::Truncated(10))
        );
    }

    #[test]
    fn test_window_tolerance() {
        let cipher = MinuteCipher::new(SECRET);
        let current = window("2026-05-01T10:00:00Z");

        for (shift, expected) in [(-60, true), (0, true), (60, true), (-120, false), (120, false)] {
            let sealed_at = current.shifted(shift);
            let sealed = cipher.encrypt("ok", &sealed_at).unwrap();
            let opened = cipher.try_decrypt(&sealed, &current);

            assert_eq!(opened.is_some(), expected, "shift {}s", shift);
            if let Some((plain, used)) = opened {
                assert_eq!(plain, "ok");
                assert_eq!(used, sealed_at);
            }
        }
    }

    #[test]
    fn test_extract_bare_and_wrapped() {
        let cipher = MinuteCipher::new(SECRET);
        let sealed = cipher.encrypt("{\"code\":0}", &TimeWindowKey::now()).unwrap();

        let bare = format!("  {}\n", sealed);
        assert_eq!(SealedEnvelope::extract(&bare), Some(sealed.clone()));

        let wrapped = format!("{{\"code\":0,\"cipher\":\"{}\"}}", sealed);
        assert_eq!(SealedEnvelope::extract(&wrapped), Some(sealed.clone()));

        let nested = format!("{{\"data\":{{\"payload\":\"{}\"}}}}", sealed);
        assert_eq!(SealedEnvelope::extract(&nested), Some(sealed));
    }

    #[test]
    fn test_extract_rejects_plain_bodies() {
        assert_eq!(SealedEnvelope::extract("short"), None);
        assert_eq!(SealedEnvelope::extract("{\"code\":500,\"msg\":\"internal error\"}"), None);
        assert_eq!(SealedEnvelope::extract("<html>Bad Gateway</html>"), None);
    }
}
