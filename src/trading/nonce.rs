//! Monotonic nonce issuance for signed requests.

use chrono::Utc;
use parking_lot::Mutex;

/// Strictly increasing nonce counter derived from wall-clock
/// milliseconds.
///
/// Venues reject a reused nonce as a replay, so issuance never goes
/// backwards: each value is `max(previous + 1, now_millis)`. A floor
/// loaded from configuration lets a restarted process continue above
/// every nonce it issued before.
#[derive(Debug)]
pub struct NonceCounter {
    last: Mutex<i64>,
}

impl NonceCounter {
    /// Create a counter that will only issue values above `floor`.
    #[must_use]
    pub fn new(floor: i64) -> Self {
        Self {
            last: Mutex::new(floor),
        }
    }

    /// Issue the next nonce.
    pub fn next(&self) -> i64 {
        let mut last = self.last.lock();
        let now = Utc::now().timestamp_millis();
        let nonce = if now > *last { now } else { *last + 1 };
        *last = nonce;
        nonce
    }

    /// The most recently issued nonce (or the floor before any issuance).
    #[must_use]
    pub fn last(&self) -> i64 {
        *self.last.lock()
    }
}
