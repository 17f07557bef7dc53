//! Subscriber registry for rate-change and error events.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::domain::CurrencyPair;

/// Callback invoked on every rate refresh: `(source, pair, changed)`.
///
/// Subscribers observe refreshes as well as changes, so they can track
/// staleness themselves.
pub type RateCallback = Arc<dyn Fn(&str, &CurrencyPair, bool) + Send + Sync>;

/// Callback invoked on non-fatal source errors: `(source, message)`.
pub type ErrorCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Append-only subscriber lists, dispatched synchronously in registration
/// order on whatever thread triggered the update.
///
/// Callbacks run inline with the update path and can delay subsequent
/// updates for the same source, so they must not block indefinitely. They
/// may be invoked from many sources concurrently and must be reentrant or
/// internally synchronized. A panicking subscriber is isolated: the
/// remaining subscribers still run and the store is left intact.
#[derive(Default)]
pub struct NotificationBus {
    rate_subs: RwLock<Vec<RateCallback>>,
    err_subs: RwLock<Vec<ErrorCallback>>,
}

impl NotificationBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rate-change subscriber for the lifetime of the source.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&str, &CurrencyPair, bool) + Send + Sync + 'static,
    {
        self.rate_subs.write().push(Arc::new(callback));
    }

    /// Register an error subscriber for the lifetime of the source.
    pub fn err_subscribe<F>(&self, callback: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.err_subs.write().push(Arc::new(callback));
    }

    /// Number of registered rate subscribers.
    #[must_use]
    pub fn rate_subscriber_count(&self) -> usize {
        self.rate_subs.read().len()
    }

    /// Dispatch a rate refresh to all rate subscribers.
    pub fn notify_rate(&self, source: &str, pair: &CurrencyPair, changed: bool) {
        // Clone the list so a callback can register new subscribers
        // without deadlocking against the dispatch.
        let subs: Vec<RateCallback> = self.rate_subs.read().clone();
        for sub in subs {
            if catch_unwind(AssertUnwindSafe(|| sub(source, pair, changed))).is_err() {
                warn!(source, %pair, "rate subscriber panicked");
            }
        }
    }

    /// Dispatch a non-fatal error to all error subscribers.
    pub fn notify_error(&self, source: &str, message: &str) {
        warn!(source, message, "source error");
        let subs: Vec<ErrorCallback> = self.err_subs.read().clone();
        for sub in subs {
            if catch_unwind(AssertUnwindSafe(|| sub(source, message))).is_err() {
                warn!(source, "error subscriber panicked");
            }
        }
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("rate_subs", &self.rate_subs.read().len())
            .field("err_subs", &self.err_subs.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn subscribers_run_in_registration_order() {
        let bus = NotificationBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.subscribe(move |_, _, _| order.lock().unwrap().push(tag));
        }

        bus.notify_rate("test", &CurrencyPair::new("BTC", "EUR"), true);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn panicking_subscriber_does_not_stop_the_rest() {
        let bus = NotificationBus::new();
        let reached = Arc::new(AtomicUsize::new(0));

        bus.subscribe(|_, _, _| panic!("boom"));
        {
            let reached = Arc::clone(&reached);
            bus.subscribe(move |_, _, _| {
                reached.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.notify_rate("test", &CurrencyPair::new("BTC", "EUR"), false);
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn error_subscribers_observe_source_and_message() {
        let bus = NotificationBus::new();
        let seen = Arc::new(Mutex::new(None));
        {
            let seen = Arc::clone(&seen);
            bus.err_subscribe(move |source, msg| {
                *seen.lock().unwrap() = Some((source.to_string(), msg.to_string()));
            });
        }

        bus.notify_error("kraken", "order book empty");
        let got = seen.lock().unwrap().clone().unwrap();
        assert_eq!(got.0, "kraken");
        assert_eq!(got.1, "order book empty");
    }

    #[test]
    fn subscriber_may_register_another_subscriber() {
        let bus = Arc::new(NotificationBus::new());
        {
            let bus2 = Arc::clone(&bus);
            bus.subscribe(move |_, _, _| {
                bus2.subscribe(|_, _, _| {});
            });
        }

        bus.notify_rate("test", &CurrencyPair::new("BTC", "EUR"), true);
        assert_eq!(bus.rate_subscriber_count(), 2);
    }
}
