//! Tunnel Path Derivation
//!
//! The server only answers on a path it can recompute from the shared
//! secret and the current minute. Each request derives that path, then
//! hides it behind random padding the server knows how to strip.
//!
//! ```text
//! SHA-256(secret ++ "2026-10-19T00:00:00Z")
//!   -> /97e0/6e/d5                 derived
//!   -> /x97e0ka/9z6eq/kd5u         obfuscated (random each call)
//! ```

use crate::time_window::TimeWindowKey;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;

/// Noise alphabet for segment padding
const NOISE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Hex offset between consecutive segments
const SEGMENT_STRIDE: usize = 10;

/// A secret path derived from the shared secret and a time window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedPath {
    segments: Vec<String>,
}

impl DerivedPath {
    /// Path segments without separators
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Render as `/seg/seg/...`
    pub fn to_path(&self) -> String {
        join_segments(self.segments.iter().map(String::as_str))
    }
}

impl fmt::Display for DerivedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

/// Derive the tunnel path for a time window.
///
/// The first digest byte picks 1..=4 segments; byte `i` picks the length
/// (1..=5 hex chars) of the segment read at hex offset `i * 10`.
pub fn derive_path(secret: &str, window: &TimeWindowKey) -> DerivedPath {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(window.as_str().as_bytes());
    let digest = hasher.finalize();
    let hex = to_hex(&digest);

    let count = match digest[0] % 4 {
        0 => 4,
        n => n as usize,
    };

    let mut segments = Vec::with_capacity(count);
    for i in 1..=count {
        let len = match digest[i] % 5 {
            0 => 5,
            n => n as usize,
        };
        let start = i * SEGMENT_STRIDE;
        let end = start + len;
        // Slices past the end of the digest are skipped
        if end <= hex.len() {
            segments.push(hex[start..end].to_string());
        }
    }

    DerivedPath { segments }
}

/// Pad every segment with random noise on both sides.
///
/// A segment of length `L` gets `ceil(L/2)` characters in front and
/// `floor(L/2)` behind, doubling its length.
pub fn obfuscate(path: &str) -> String {
    let mut rng = rand::thread_rng();
    let padded: Vec<String> = split_segments(path)
        .map(|segment| {
            let len = segment.chars().count();
            let left = len.div_ceil(2);
            let right = len - left;

            let mut out = String::with_capacity(len * 2);
            push_noise(&mut rng, &mut out, left);
            out.push_str(segment);
            push_noise(&mut rng, &mut out, right);
            out
        })
        .collect();

    join_segments(padded.iter().map(String::as_str))
}

/// Strip the padding added by [`obfuscate`].
///
/// Odd-length segments cannot come from `obfuscate` and are dropped.
pub fn reveal(path: &str) -> String {
    let kept: Vec<String> = split_segments(path)
        .filter_map(|segment| {
            let chars: Vec<char> = segment.chars().collect();
            if chars.len() % 2 != 0 {
                return None;
            }
            let original = chars.len() / 2;
            let left = original.div_ceil(2);
            let right = original - left;
            Some(chars[left..chars.len() - right].iter().collect())
        })
        .collect();

    join_segments(kept.iter().map(String::as_str))
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn join_segments<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::from("/");
    for (i, segment) in segments.enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

fn push_noise<R: Rng>(rng: &mut R, out: &mut String, len: usize) {
    for _ in 0..len {
        let idx = rng.gen_range(0..NOISE_ALPHABET.len());
        out.push(NOISE_ALPHABET[idx] as char);
    }
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}
