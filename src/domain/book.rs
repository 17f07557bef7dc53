//! Order book for a single market pair.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Which side of the book a level or order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Ask,
    Bid,
}

impl Side {
    /// Short lowercase name, used in log and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Side::Ask => "ask",
            Side::Bid => "bid",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single price level: price and the volume offered at that price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    price: Decimal,
    volume: Decimal,
}

impl PriceLevel {
    /// Create a new price level.
    #[must_use]
    pub const fn new(price: Decimal, volume: Decimal) -> Self {
        Self { price, volume }
    }

    /// Get the price.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    /// Get the volume.
    #[must_use]
    pub const fn volume(&self) -> Decimal {
        self.volume
    }
}

/// One incremental change to a book side, as decoded from a streaming
/// delta. A `volume` of zero signals removal of the level at `price`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    pub side: Side,
    pub price: Decimal,
    pub volume: Decimal,
    pub when: Option<DateTime<Utc>>,
}

/// Ask/bid price levels for one market pair.
///
/// Both sides are ordered maps keyed by price, so prices are unique per
/// side, best-price lookup is O(log n), and iteration comes out already
/// sorted. The best ask is the minimum-priced ask level, the best bid the
/// maximum-priced bid level.
///
/// `last_update` only moves forward: updates carrying an older or absent
/// timestamp never regress it.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    asks: BTreeMap<Decimal, Decimal>,
    bids: BTreeMap<Decimal, Decimal>,
    last_update: Option<DateTime<Utc>>,
}

impl OrderBook {
    /// Create a new empty order book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn side(&self, side: Side) -> &BTreeMap<Decimal, Decimal> {
        match side {
            Side::Ask => &self.asks,
            Side::Bid => &self.bids,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<Decimal, Decimal> {
        match side {
            Side::Ask => &mut self.asks,
            Side::Bid => &mut self.bids,
        }
    }

    /// Upsert a price level. Inserting at an existing price replaces the
    /// volume. Advances `last_update` if `timestamp` is present and newer.
    pub fn update(
        &mut self,
        side: Side,
        price: Decimal,
        volume: Decimal,
        timestamp: Option<DateTime<Utc>>,
    ) {
        self.side_mut(side).insert(price, volume);
        if let Some(ts) = timestamp {
            if self.last_update.map_or(true, |prev| ts > prev) {
                self.last_update = Some(ts);
            }
        }
    }

    /// Delete a level, as signalled by a streaming delta.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no level exists at `price`; callers
    /// must only remove levels they know are present.
    pub fn remove(&mut self, side: Side, price: Decimal) -> Result<()> {
        match self.side_mut(side).remove(&price) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("no {side} level at {price}"))),
        }
    }

    /// Empty both sides. Used when a source re-synchronizes a snapshot.
    pub fn clear(&mut self) {
        self.asks.clear();
        self.bids.clear();
    }

    /// Stamp the book with an update time, for sources that report no
    /// per-level timestamps. `None` stamps with the current clock.
    pub fn touch(&mut self, timestamp: Option<DateTime<Utc>>) {
        let ts = timestamp.unwrap_or_else(Utc::now);
        if self.last_update.map_or(true, |prev| ts > prev) {
            self.last_update = Some(ts);
        }
    }

    /// Time of the newest update applied to the book, if any was stamped.
    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Lowest-priced ask level, or `None` if the ask side is empty.
    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks
            .iter()
            .next()
            .map(|(p, v)| PriceLevel::new(*p, *v))
    }

    /// Highest-priced bid level, or `None` if the bid side is empty.
    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids
            .iter()
            .next_back()
            .map(|(p, v)| PriceLevel::new(*p, *v))
    }

    /// Number of levels on a side.
    #[must_use]
    pub fn depth(&self, side: Side) -> usize {
        self.side(side).len()
    }

    /// True when a side holds no levels.
    #[must_use]
    pub fn is_empty(&self, side: Side) -> bool {
        self.side(side).is_empty()
    }

    /// Levels of a side ordered best-first.
    pub fn levels(&self, side: Side) -> Box<dyn Iterator<Item = PriceLevel> + '_> {
        let map = |(p, v): (&Decimal, &Decimal)| PriceLevel::new(*p, *v);
        match side {
            Side::Ask => Box::new(self.asks.iter().map(map)),
            Side::Bid => Box::new(self.bids.iter().rev().map(map)),
        }
    }

    /// Volume-weighted average price once cumulative volume exceeds each
    /// threshold in `bars`, walking the side best-first.
    ///
    /// The result is parallel to `bars`; entries the book is too shallow
    /// to cross are `None`. `bars` must be ascending for a meaningful
    /// profile.
    #[must_use]
    pub fn vwap_depth(&self, side: Side, bars: &[Decimal]) -> Vec<Option<Decimal>> {
        let mut res = vec![None; bars.len()];
        let mut bar = 0;
        let mut amount = Decimal::ZERO;
        let mut weighted = Decimal::ZERO;
        for level in self.levels(side) {
            weighted += level.price() * level.volume();
            amount += level.volume();
            while bar < bars.len() && amount > bars[bar] {
                res[bar] = Some(weighted / amount);
                bar += 1;
            }
            if bar >= bars.len() {
                break;
            }
        }
        res
    }
}
