//! The venue-neutral aggregation engine.
//!
//! A [`Venue`] is the thin, per-exchange adapter contract: it knows the
//! wire formats and URL shapes of one exchange and translates them into
//! the crate's data model. A [`Source`] ties a venue to its own
//! [`RateStore`], [`NotificationBus`], and [`UpdateScheduler`], and is the
//! handle consumers hold.
//!
//! Each source is independent: its fetch task is the only writer of its
//! store, sources poll fully in parallel, and nothing is shared between
//! sources except whatever state subscribers capture themselves.

pub mod bus;
pub mod scheduler;
pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Currency, CurrencyPair, OrderBook, RateSnapshot};
use crate::error::{Error, Result};
use crate::stream::{RawAdapter, RawBridge, RoomAdapter, RoomBridge};
use crate::trading::TradingSession;

pub use bus::NotificationBus;
pub use scheduler::{Fetcher, UpdateScheduler};
pub use store::RateStore;

/// A venue's push-protocol capability, when it has one.
pub enum StreamClient {
    /// The venue pushes opaque text frames the adapter decodes whole.
    Raw(Arc<dyn RawAdapter>),
    /// The venue multiplexes events over named rooms behind a subscribe
    /// handshake.
    Rooms(Arc<dyn RoomAdapter>),
}

/// Per-venue adapter contract.
///
/// Implementations are thin translators: fetch JSON, map venue currency
/// codes, and push normalized values into the store they are handed.
/// Everything stateful lives in the core.
#[async_trait]
pub trait Venue: Send + Sync + 'static {
    /// Venue name, used as the settings section and in subscriber events.
    fn name(&self) -> &'static str;

    /// The pairs this venue can quote. Static per venue.
    fn supported_pairs(&self) -> Vec<CurrencyPair>;

    /// Fetch current data for `pairs` and push it into `store` via
    /// [`RateStore::update_rates`] / [`RateStore::update_orderbook`]
    /// before returning.
    ///
    /// # Errors
    ///
    /// Transport or protocol failures; partial results already pushed
    /// remain valid.
    async fn fetch_rates(&self, store: &RateStore, pairs: &[CurrencyPair]) -> Result<()>;

    /// Streaming capability, or `None` when the venue has no push API and
    /// polling is the only update path.
    fn stream(&self) -> Option<StreamClient> {
        None
    }

    /// Trading capability, or `None` when no credentials are configured.
    /// Market data keeps working either way.
    fn trading(&self) -> Option<Arc<TradingSession>> {
        None
    }
}

struct VenueFetch {
    venue: Arc<dyn Venue>,
    store: Arc<RateStore>,
    wanted: Vec<CurrencyPair>,
}

#[async_trait]
impl Fetcher for VenueFetch {
    async fn fetch_once(&self) -> Result<()> {
        self.venue.fetch_rates(&self.store, &self.wanted).await
    }
}

/// Consumer-facing handle for one venue: cached rates, order books,
/// subscriptions, refresh scheduling, and the optional trading session.
///
/// Cloning is cheap and clones share the same underlying source.
#[derive(Clone)]
pub struct Source {
    venue: Arc<dyn Venue>,
    store: Arc<RateStore>,
    bus: Arc<NotificationBus>,
    scheduler: Arc<UpdateScheduler>,
    wanted: Vec<CurrencyPair>,
}

impl Source {
    /// Build a source following every pair the venue supports.
    #[must_use]
    pub fn new(venue: Arc<dyn Venue>) -> Self {
        let wanted = venue.supported_pairs();
        Self::build(venue, wanted)
    }

    /// Build a source following only the venue pairs whose base and quote
    /// are both in `currencies`.
    #[must_use]
    pub fn with_currencies(venue: Arc<dyn Venue>, currencies: &[Currency]) -> Self {
        let wanted = venue
            .supported_pairs()
            .into_iter()
            .filter(|p| p.within(currencies))
            .collect();
        Self::build(venue, wanted)
    }

    fn build(venue: Arc<dyn Venue>, wanted: Vec<CurrencyPair>) -> Self {
        let bus = Arc::new(NotificationBus::new());
        let store = Arc::new(RateStore::new(venue.name(), Arc::clone(&bus)));
        let fetcher = Arc::new(VenueFetch {
            venue: Arc::clone(&venue),
            store: Arc::clone(&store),
            wanted: wanted.clone(),
        });
        let scheduler = Arc::new(UpdateScheduler::new(venue.name(), fetcher, Arc::clone(&bus)));
        Self {
            venue,
            store,
            bus,
            scheduler,
            wanted,
        }
    }

    /// Venue name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.venue.name()
    }

    /// The pairs this source follows.
    #[must_use]
    pub fn wanted_pairs(&self) -> &[CurrencyPair] {
        &self.wanted
    }

    /// This source's store, as handed to venue fetches and bridges.
    #[must_use]
    pub fn store(&self) -> &Arc<RateStore> {
        &self.store
    }

    /// Current rate snapshots for `pairs`, defaulting to the followed
    /// pairs. Performs a synchronous fetch first if no rates were ever
    /// fetched. Pairs that are configured but not yet quoted are absent
    /// from the result.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when a requested pair is not configured for
    /// this source; fetch errors from the lazy bootstrap.
    pub async fn current_rates(
        &self,
        pairs: Option<&[CurrencyPair]>,
    ) -> Result<HashMap<CurrencyPair, RateSnapshot>> {
        if !self.store.has_rates() {
            self.scheduler.fetch_now().await?;
        }

        let requested = pairs.unwrap_or(&self.wanted);
        let mut rates = HashMap::new();
        for pair in requested {
            if !self.wanted.contains(pair) {
                return Err(Error::NotFound(format!(
                    "pair {pair} not configured for {}",
                    self.name()
                )));
            }
            if let Some(snapshot) = self.store.snapshot(pair) {
                rates.insert(pair.clone(), snapshot);
            }
        }
        Ok(rates)
    }

    /// Register a rate-change subscriber.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&str, &CurrencyPair, bool) + Send + Sync + 'static,
    {
        self.bus.subscribe(callback);
    }

    /// Register an error subscriber.
    pub fn err_subscribe<F>(&self, callback: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.bus.err_subscribe(callback);
    }

    /// Request one best-effort asynchronous refresh.
    /// See [`UpdateScheduler::request_update`].
    pub fn request_update(&self) {
        self.scheduler.request_update();
    }

    /// Start, restart, or (with zero) cancel periodic refreshes.
    /// See [`UpdateScheduler::periodic_update`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for a negative or non-finite delay.
    pub fn periodic_update(&self, min_delay_secs: f64) -> Result<()> {
        self.scheduler.periodic_update(min_delay_secs)
    }

    /// Fetch now, reporting and re-raising any failure.
    ///
    /// # Errors
    ///
    /// The venue's transport or protocol error.
    pub async fn fetch_rates(&self) -> Result<()> {
        self.scheduler.fetch_now().await
    }

    /// Copy of the stored order book for `pair`, if any.
    #[must_use]
    pub fn orderbook(&self, pair: &CurrencyPair) -> Option<OrderBook> {
        self.store.orderbook(pair)
    }

    /// Estimated seconds between venue updates for `pair` (NaN while
    /// unknown). See [`RateStore::guess_period`].
    #[must_use]
    pub fn guess_period(&self, pair: &CurrencyPair) -> f64 {
        self.store.guess_period(pair)
    }

    /// The venue's trading session, when credentials are configured.
    #[must_use]
    pub fn trading(&self) -> Option<Arc<TradingSession>> {
        self.venue.trading()
    }

    /// True when the venue has a push API.
    #[must_use]
    pub fn has_stream(&self) -> bool {
        self.venue.stream().is_some()
    }

    /// Run the venue's streaming bridge until the connection closes or
    /// fails. Reconnection policy belongs to the caller.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the venue has no push API; otherwise the
    /// bridge's connection error.
    pub async fn run_stream(&self) -> Result<()> {
        match self.venue.stream() {
            Some(StreamClient::Raw(adapter)) => {
                RawBridge::new(adapter, Arc::clone(&self.store)).run().await
            }
            Some(StreamClient::Rooms(adapter)) => {
                RoomBridge::new(adapter, Arc::clone(&self.store))
                    .run()
                    .await
            }
            None => Err(Error::NotFound(format!(
                "{} has no streaming API",
                self.name()
            ))),
        }
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("venue", &self.name())
            .field("wanted", &self.wanted)
            .finish()
    }
}
