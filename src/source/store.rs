//! Per-source rate and order-book store.
//!
//! The store holds the cached ticker, the order-book table, and the
//! bounded update history for every pair a source follows. Mutation and
//! notification dispatch are synchronous and in-memory; the owning
//! source's fetch task is the only writer, while consumers read through
//! the synchronized accessors.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::{CurrencyPair, LevelChange, OrderBook, RateSnapshot};
use crate::error::Error;
use crate::source::bus::NotificationBus;

/// Distinct change times kept per pair for period estimation.
const HISTORY_CAPACITY: usize = 10;

#[derive(Default)]
struct StoreState {
    rates: HashMap<CurrencyPair, RateSnapshot>,
    books: HashMap<CurrencyPair, OrderBook>,
    history: HashMap<CurrencyPair, VecDeque<DateTime<Utc>>>,
}

/// Rate, order-book, and update-history tables for one source.
///
/// Updates are applied in increasing `last_change` order per pair: an
/// update carrying a timestamp older than the stored one is rejected and
/// reported through the error channel instead of overwriting newer data.
/// This is the store's only cross-update consistency guarantee, and it is
/// per-pair, not global.
pub struct RateStore {
    name: &'static str,
    bus: Arc<NotificationBus>,
    inner: RwLock<StoreState>,
}

impl RateStore {
    /// Create an empty store for the named source, reporting through `bus`.
    #[must_use]
    pub fn new(name: &'static str, bus: Arc<NotificationBus>) -> Self {
        Self {
            name,
            bus,
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// Name of the owning source, as used in subscriber events.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Report a non-fatal source error through the error channel.
    pub fn log_error(&self, message: &str) {
        self.bus.notify_error(self.name, message);
    }

    /// Apply a ticker update for `pair`.
    ///
    /// Stale updates (venue-reported `when` older than the stored one) are
    /// rejected and reported through the error channel. Otherwise the
    /// snapshot is replaced when `(ask, bid, when)` differs from the stored
    /// triple, or refreshed in place (only `stored` advances) when it does
    /// not. Every accepted call notifies all rate subscribers with
    /// `(source, pair, changed)`, and the change time is appended to the
    /// update history when it differs from the most recent entry.
    pub fn update_rates(
        &self,
        pair: &CurrencyPair,
        ask: Decimal,
        bid: Decimal,
        when: Option<DateTime<Utc>>,
    ) {
        let now = Utc::now();
        let changed;
        {
            let mut st = self.inner.write();
            if let Some(prev) = st.rates.get(pair) {
                if let (Some(incoming), Some(stored)) = (when, prev.when) {
                    if stored > incoming {
                        let lag_secs =
                            (stored - incoming).num_milliseconds() as f64 / 1000.0;
                        let err = Error::StaleUpdate {
                            venue: self.name,
                            lag_secs,
                        };
                        drop(st);
                        self.bus.notify_error(self.name, &err.to_string());
                        return;
                    }
                }
            }

            let last_change = match st.rates.get(pair) {
                Some(prev) if prev.same_values(ask, bid, when) => {
                    changed = false;
                    let last_change = prev.last_change;
                    if let Some(snap) = st.rates.get_mut(pair) {
                        snap.stored = now;
                    }
                    last_change
                }
                _ => {
                    changed = true;
                    let last_change = when.unwrap_or(now);
                    st.rates.insert(
                        pair.clone(),
                        RateSnapshot {
                            ask,
                            bid,
                            when,
                            stored: now,
                            last_change,
                        },
                    );
                    last_change
                }
            };

            let history = st.history.entry(pair.clone()).or_default();
            if history.back() != Some(&last_change) {
                if history.len() == HISTORY_CAPACITY {
                    history.pop_front();
                }
                history.push_back(last_change);
            }
        }

        debug!(source = self.name, %pair, changed, "rates updated");
        self.bus.notify_rate(self.name, pair, changed);
    }

    /// Replace the stored order book for `pair` and derive the ticker
    /// from its best levels.
    ///
    /// The book is swapped in whole. When both sides hold levels, the best
    /// ask/bid prices are forwarded into [`update_rates`](Self::update_rates)
    /// with the book's `last_update` as the venue timestamp. When either
    /// side is empty an error event fires and the previous rate snapshot
    /// stays intact: an empty book must never zero out a valid ticker.
    pub fn update_orderbook(&self, pair: &CurrencyPair, book: OrderBook) {
        let derived = Self::derive_ticker(&book);
        self.inner.write().books.insert(pair.clone(), book);
        self.forward_derived(pair, derived);
    }

    /// Patch the stored order book for `pair` with streaming deltas, then
    /// re-derive the ticker exactly like
    /// [`update_orderbook`](Self::update_orderbook).
    ///
    /// A change with zero volume removes its level; removing a level that
    /// is not present is reported through the error channel and the rest
    /// of the batch still applies.
    pub fn apply_book_delta(&self, pair: &CurrencyPair, changes: &[LevelChange]) {
        let mut misses = Vec::new();
        let derived = {
            let mut st = self.inner.write();
            let book = st.books.entry(pair.clone()).or_default();
            for change in changes {
                if change.volume.is_zero() {
                    if let Err(err) = book.remove(change.side, change.price) {
                        misses.push(err.to_string());
                    }
                } else {
                    book.update(change.side, change.price, change.volume, change.when);
                }
            }
            Self::derive_ticker(book)
        };

        for miss in misses {
            self.bus
                .notify_error(self.name, &format!("{pair} delta: {miss}"));
        }
        self.forward_derived(pair, derived);
    }

    fn derive_ticker(book: &OrderBook) -> Option<(Decimal, Decimal, Option<DateTime<Utc>>)> {
        match (book.best_ask(), book.best_bid()) {
            (Some(ask), Some(bid)) => Some((ask.price(), bid.price(), book.last_update())),
            _ => None,
        }
    }

    fn forward_derived(
        &self,
        pair: &CurrencyPair,
        derived: Option<(Decimal, Decimal, Option<DateTime<Utc>>)>,
    ) {
        match derived {
            Some((ask, bid, when)) => self.update_rates(pair, ask, bid, when),
            None => {
                let err = Error::EmptyOrderBook {
                    venue: self.name,
                    pair: pair.clone(),
                };
                self.bus.notify_error(self.name, &err.to_string());
            }
        }
    }

    /// Estimate the seconds between updates for `pair` as the median of
    /// consecutive deltas in the update history. Returns NaN while fewer
    /// than two distinct change times have been observed.
    #[must_use]
    pub fn guess_period(&self, pair: &CurrencyPair) -> f64 {
        let st = self.inner.read();
        let Some(history) = st.history.get(pair) else {
            return f64::NAN;
        };

        let mut steps: Vec<f64> = history
            .iter()
            .zip(history.iter().skip(1))
            .map(|(a, b)| (*b - *a).num_milliseconds() as f64 / 1000.0)
            .collect();
        if steps.is_empty() {
            return f64::NAN;
        }

        steps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = steps.len() / 2;
        if steps.len() % 2 == 1 {
            steps[mid]
        } else {
            (steps[mid - 1] + steps[mid]) / 2.0
        }
    }

    /// Snapshot of the current ticker for `pair`, if one has been stored.
    #[must_use]
    pub fn snapshot(&self, pair: &CurrencyPair) -> Option<RateSnapshot> {
        self.inner.read().rates.get(pair).cloned()
    }

    /// Copy of the stored order book for `pair`, if any.
    #[must_use]
    pub fn orderbook(&self, pair: &CurrencyPair) -> Option<OrderBook> {
        self.inner.read().books.get(pair).cloned()
    }

    /// True once any rate has been stored.
    #[must_use]
    pub fn has_rates(&self) -> bool {
        !self.inner.read().rates.is_empty()
    }
}

impl std::fmt::Debug for RateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.read();
        f.debug_struct("RateStore")
            .field("name", &self.name)
            .field("pairs", &st.rates.len())
            .field("books", &st.books.len())
            .finish()
    }
}
