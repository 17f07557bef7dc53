//! Generic push-protocol bridges feeding the store.
//!
//! Two variants exist over the same persistent bidirectional connection:
//! [`RawBridge`] for venues that push opaque text frames, and
//! [`RoomBridge`] for venues that multiplex tagged events over named
//! rooms behind a subscribe handshake. Venue adapters supply the URL,
//! the handshake, and the frame decoding; the bridges own the connection
//! loop and dispatch decoded events into the [`RateStore`].
//!
//! Neither bridge reconnects on close or error: reconnection policy
//! belongs to the surrounding orchestration.

mod raw;
mod rooms;

pub use raw::{RawAdapter, RawBridge};
pub use rooms::{RoomAdapter, RoomBridge, RoomEvent};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::domain::{CurrencyPair, LevelChange, OrderBook};
use crate::source::store::RateStore;

/// A decoded venue push message.
///
/// The set of recognized kinds is closed; anything else decodes to
/// `Unknown` and is silently ignored, so new venue event types do not
/// break existing bridges.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Best ask/bid update for a pair.
    Ticker {
        pair: CurrencyPair,
        ask: Decimal,
        bid: Decimal,
        when: Option<DateTime<Utc>>,
    },
    /// A complete re-synchronized order book.
    BookSnapshot { pair: CurrencyPair, book: OrderBook },
    /// Incremental order-book changes; zero volume removes a level.
    BookDelta {
        pair: CurrencyPair,
        changes: Vec<LevelChange>,
    },
    /// An executed trade. Informational only.
    Trade { pair: CurrencyPair },
    /// A venue announcement. Informational only.
    Announcement { text: String },
    /// Unrecognized event kind, ignored for forward compatibility.
    Unknown,
}

/// Dispatch one decoded event into the store.
///
/// Ticker and book events mutate the store; trades and announcements are
/// informational no-ops; unknown events are dropped.
pub fn apply_event(store: &RateStore, event: StreamEvent) {
    match event {
        StreamEvent::Ticker {
            pair,
            ask,
            bid,
            when,
        } => store.update_rates(&pair, ask, bid, when),
        StreamEvent::BookSnapshot { pair, book } => store.update_orderbook(&pair, book),
        StreamEvent::BookDelta { pair, changes } => store.apply_book_delta(&pair, &changes),
        StreamEvent::Trade { pair } => {
            debug!(source = store.name(), %pair, "trade event ignored");
        }
        StreamEvent::Announcement { text } => {
            debug!(source = store.name(), %text, "announcement ignored");
        }
        StreamEvent::Unknown => {
            trace!(source = store.name(), "unrecognized event ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use crate::source::bus::NotificationBus;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn store() -> RateStore {
        RateStore::new("test", Arc::new(NotificationBus::new()))
    }

    fn pair() -> CurrencyPair {
        CurrencyPair::new("BTC", "EUR")
    }

    #[test]
    fn ticker_event_updates_rates() {
        let store = store();
        apply_event(
            &store,
            StreamEvent::Ticker {
                pair: pair(),
                ask: dec!(101),
                bid: dec!(100),
                when: None,
            },
        );

        let snap = store.snapshot(&pair()).unwrap();
        assert_eq!(snap.ask, dec!(101));
        assert_eq!(snap.bid, dec!(100));
    }

    #[test]
    fn book_snapshot_event_replaces_book_and_rates() {
        let store = store();
        let mut book = OrderBook::new();
        book.update(Side::Ask, dec!(105), dec!(1), None);
        book.update(Side::Bid, dec!(95), dec!(1), None);

        apply_event(
            &store,
            StreamEvent::BookSnapshot {
                pair: pair(),
                book,
            },
        );

        assert_eq!(store.snapshot(&pair()).unwrap().ask, dec!(105));
        assert_eq!(
            store.orderbook(&pair()).unwrap().best_bid().unwrap().price(),
            dec!(95)
        );
    }

    #[test]
    fn informational_and_unknown_events_leave_the_store_alone() {
        let store = store();
        apply_event(&store, StreamEvent::Trade { pair: pair() });
        apply_event(
            &store,
            StreamEvent::Announcement {
                text: "maintenance window".into(),
            },
        );
        apply_event(&store, StreamEvent::Unknown);

        assert!(!store.has_rates());
        assert!(store.orderbook(&pair()).is_none());
    }
}
