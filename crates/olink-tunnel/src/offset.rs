//! Clock Skew Discovery
//!
//! When a response opens under none of the three windows around the local
//! minute, the server clock is probably off. The prober searches for the
//! offset whose window opens the response and the tunnel applies it to
//! every later request.

use crate::cipher::{MinuteCipher, SealedEnvelope};
use crate::time_window::TimeWindowKey;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, info};

/// Offsets tried first: none, and the usual ±8h timezone mix-up
const LIKELY_OFFSETS_MIN: [i64; 3] = [0, 480, -480];

/// Search radius in minutes (±12h)
const SEARCH_RADIUS_MIN: i64 = 720;

/// Believed server-minus-client skew, in seconds.
///
/// Clones share the same cell. A discovered value stays until replaced;
/// concurrent discoveries race and the last write wins.
#[derive(Debug, Clone, Default)]
pub struct ClockOffset {
    secs: Arc<AtomicI64>,
}

impl ClockOffset {
    /// A new, unshared offset of zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset in seconds
    pub fn get(&self) -> i64 {
        self.secs.load(Ordering::SeqCst)
    }

    /// Replace the offset
    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    /// True until an offset has been discovered
    pub fn is_zero(&self) -> bool {
        self.get() == 0
    }

    /// Window for the corrected clock
    pub fn current_window(&self) -> TimeWindowKey {
        TimeWindowKey::now_with_offset(self.get())
    }
}

/// Searches the ±12h offset space for the window that opens a response
#[derive(Debug, Clone)]
pub struct OffsetProber {
    cipher: MinuteCipher,
}

impl OffsetProber {
    pub fn new(cipher: MinuteCipher) -> Self {
        Self { cipher }
    }

    /// Probe against the uncorrected local clock
    pub fn probe(&self, envelope: &SealedEnvelope) -> Option<i64> {
        self.probe_at(envelope, Utc::now())
    }

    /// Probe relative to `now`, returning the offset in seconds
    pub fn probe_at(&self, envelope: &SealedEnvelope, now: DateTime<Utc>) -> Option<i64> {
        let found = candidate_minutes().find(|&minutes| {
            let window = TimeWindowKey::at(now + TimeDelta::minutes(minutes));
            self.cipher.decrypt(envelope, &window).is_ok()
        });

        match found {
            Some(minutes) => {
                info!("Detected server clock offset: {} min ({}s)", minutes, minutes * 60);
                Some(minutes * 60)
            }
            None => {
                debug!("No clock offset within ±{} min opens the response", SEARCH_RADIUS_MIN);
                None
            }
        }
    }
}

/// Search order: likely offsets, then a linear sweep of the rest
fn candidate_minutes() -> impl Iterator<Item = i64> {
    LIKELY_OFFSETS_MIN.into_iter().chain(
        (-SEARCH_RADIUS_MIN..=SEARCH_RADIUS_MIN).filter(|m| !LIKELY_OFFSETS_MIN.contains(m)),
    )
}
