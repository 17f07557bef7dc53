//! Cached ticker snapshot for one market pair.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Best ask/bid for a pair together with its timing metadata.
///
/// Two clocks appear here on purpose and are never reconciled: `when` is
/// what the venue reported for the data, `stored` is our local clock at
/// write time. `last_change` is the effective ordering time,
/// `when.unwrap_or(stored)`.
///
/// A snapshot is replaced only when `(ask, bid, when)` actually differs;
/// a repeat of the same values merely refreshes `stored`, which is how
/// "still the same price" is told apart from "new price".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSnapshot {
    pub ask: Decimal,
    pub bid: Decimal,
    /// Venue-reported data timestamp, when the venue supplies one.
    pub when: Option<DateTime<Utc>>,
    /// Local receipt time of the most recent write, changed or not.
    pub stored: DateTime<Utc>,
    /// Effective change time used for ordering and period estimation.
    pub last_change: DateTime<Utc>,
}

impl RateSnapshot {
    /// True when an incoming `(ask, bid, when)` triple carries the same
    /// values as this snapshot.
    #[must_use]
    pub fn same_values(&self, ask: Decimal, bid: Decimal, when: Option<DateTime<Utc>>) -> bool {
        self.ask == ask && self.bid == bid && self.when == when
    }

    /// Spread between ask and bid as a percentage of the bid.
    #[must_use]
    pub fn spread_pct(&self) -> Decimal {
        (self.ask / self.bid - Decimal::ONE) * Decimal::ONE_HUNDRED
    }
}
