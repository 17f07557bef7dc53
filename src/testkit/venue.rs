//! Scripted [`Venue`] implementation for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{CurrencyPair, OrderBook};
use crate::error::{Error, Result};
use crate::source::{RateStore, Venue};

/// One scripted fetch outcome.
pub enum FetchStep {
    /// Push these ticker updates into the store.
    Rates(Vec<(CurrencyPair, Decimal, Decimal, Option<DateTime<Utc>>)>),
    /// Push this order book into the store.
    Book(CurrencyPair, OrderBook),
    /// Fail the fetch with a protocol error.
    Fail(String),
}

/// A [`Venue`] whose fetches pop outcomes from a pre-loaded script.
///
/// When the script is exhausted every further fetch pushes a fixed
/// `ask=101 / bid=100` ticker for each requested pair, so schedulers can
/// tick indefinitely. An optional delay simulates a slow venue for
/// single-flight tests.
pub struct ScriptedVenue {
    pairs: Vec<CurrencyPair>,
    steps: Mutex<VecDeque<FetchStep>>,
    delay: Option<Duration>,
    fetch_count: AtomicU32,
}

impl ScriptedVenue {
    /// A venue quoting `pairs`, with an empty script.
    #[must_use]
    pub fn new(pairs: Vec<CurrencyPair>) -> Self {
        Self {
            pairs,
            steps: Mutex::new(VecDeque::new()),
            delay: None,
            fetch_count: AtomicU32::new(0),
        }
    }

    /// A venue quoting BTC/EUR and BTC/USD.
    #[must_use]
    pub fn btc() -> Self {
        Self::new(vec![
            CurrencyPair::new("BTC", "EUR"),
            CurrencyPair::new("BTC", "USD"),
        ])
    }

    /// Append a scripted fetch outcome.
    #[must_use]
    pub fn with_step(self, step: FetchStep) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    /// Make every fetch take `delay` before completing.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `fetch_rates` ran.
    #[must_use]
    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Venue for ScriptedVenue {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supported_pairs(&self) -> Vec<CurrencyPair> {
        self.pairs.clone()
    }

    async fn fetch_rates(&self, store: &RateStore, pairs: &[CurrencyPair]) -> Result<()> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(FetchStep::Rates(updates)) => {
                for (pair, ask, bid, when) in updates {
                    store.update_rates(&pair, ask, bid, when);
                }
                Ok(())
            }
            Some(FetchStep::Book(pair, book)) => {
                store.update_orderbook(&pair, book);
                Ok(())
            }
            Some(FetchStep::Fail(message)) => Err(Error::Protocol(message)),
            None => {
                for pair in pairs {
                    store.update_rates(pair, dec!(101), dec!(100), None);
                }
                Ok(())
            }
        }
    }
}
