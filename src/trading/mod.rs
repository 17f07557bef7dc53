//! Signed trading protocol: nonces, request signing, balance caching,
//! and the order lifecycle.
//!
//! A [`TradingSession`] exists only once credentials are configured for a
//! venue; without them [`Venue::trading`](crate::source::Venue::trading)
//! returns `None` and market data keeps working. The session owns the
//! account-state cache and the nonce stream; the venue's [`TradingApi`]
//! adapter owns the wire formats and maps the venue's error taxonomy into
//! the crate's.

pub mod nonce;
pub mod signer;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info};

use crate::domain::{Currency, CurrencyPair, OpenOrders, OrderRef, OrderRequest, Side};
use crate::error::Result;

pub use nonce::NonceCounter;
pub use signer::{Credentials, RequestSigner, SignedRequest};

/// Reuse a cached balance this long before fetching again, to respect
/// venue rate limits.
const BALANCE_TTL: Duration = Duration::from_secs(10);

/// Account funds as reported by a venue, with asset codes already
/// remapped to canonical currency codes by the adapter.
///
/// `balance` is the amount stored at the venue; `available` the
/// non-reserved part usable for new orders.
#[derive(Debug, Clone, Default)]
pub struct AccountFunds {
    pub balance: HashMap<Currency, Decimal>,
    pub available: HashMap<Currency, Decimal>,
}

/// Cached account funds plus the local time they were fetched.
///
/// `fetched_at` is a monotonic local clock used only for cache freshness;
/// it is deliberately unrelated to venue-reported data timestamps.
#[derive(Debug, Clone)]
pub struct Balances {
    pub funds: AccountFunds,
    pub fetched_at: Instant,
}

/// Venue adapter contract for the signed trading protocol.
///
/// Implementations build signed requests (usually through a
/// [`RequestSigner`]), talk to the venue, and map its error taxonomy into
/// the crate's closed error set; unmapped venue errors surface as
/// [`Error::TradingFailed`](crate::error::Error::TradingFailed) with the
/// raw message preserved.
#[async_trait]
pub trait TradingApi: Send + Sync {
    /// Fetch current account funds, remapped to canonical currency codes.
    async fn fetch_funds(&self) -> Result<AccountFunds>;

    /// Submit an order, returning the venue's identifier(s) for it.
    async fn submit_order(&self, order: &OrderRequest) -> Result<Vec<OrderRef>>;

    /// Cancel one order. Canceling an already-filled or unknown order
    /// reports [`Error::NotFound`](crate::error::Error::NotFound).
    async fn cancel_order(&self, pair: &CurrencyPair, order: &OrderRef) -> Result<()>;

    /// Cancel every open order, optionally only for one pair.
    async fn cancel_all_orders(&self, pair: Option<&CurrencyPair>) -> Result<()>;

    /// Currently open orders for a pair, sorted on price.
    async fn open_orders(&self, pair: &CurrencyPair) -> Result<OpenOrders>;

    /// Fee charged for a fill, from the venue's published schedule.
    fn estimate_fee(&self, _side: Side, _price: Decimal, _volume: Decimal) -> Decimal {
        Decimal::ZERO
    }

    /// Round a proposed price to the venue's accepted price grid. Venues
    /// that reject over-precise prices override this.
    fn round_to_valid_price(&self, _pair: &CurrencyPair, _side: Side, price: Decimal) -> Decimal {
        price
    }

    /// Smallest accepted `(volume, value)` for an order on `pair`.
    fn minimum_order(&self, pair: &CurrencyPair) -> (Decimal, Decimal) {
        let min_value = if *pair == CurrencyPair::new("BTC", "EUR") {
            dec!(5)
        } else {
            Decimal::ZERO
        };
        (dec!(0.0002), min_value)
    }
}

#[derive(Default)]
struct BalanceCache {
    cached: Option<Balances>,
    generation: u64,
}

/// Per-venue trading session: balance cache with TTL and the order
/// lifecycle.
///
/// Any action that mutates account state invalidates the balance cache
/// before the remote call goes out, so a subsequent [`balance`] call is
/// guaranteed to re-fetch. An in-flight balance fetch that raced such an
/// invalidation is discarded rather than committed over fresher state.
///
/// [`balance`]: TradingSession::balance
pub struct TradingSession {
    api: Arc<dyn TradingApi>,
    signer: Arc<RequestSigner>,
    cache: Mutex<BalanceCache>,
    ttl: Duration,
}

impl TradingSession {
    #[must_use]
    pub fn new(api: Arc<dyn TradingApi>, signer: Arc<RequestSigner>) -> Self {
        Self::with_ttl(api, signer, BALANCE_TTL)
    }

    /// Session with a custom cache TTL.
    #[must_use]
    pub fn with_ttl(api: Arc<dyn TradingApi>, signer: Arc<RequestSigner>, ttl: Duration) -> Self {
        Self {
            api,
            signer,
            cache: Mutex::new(BalanceCache::default()),
            ttl,
        }
    }

    /// The signer shared with this session's venue adapter.
    #[must_use]
    pub fn signer(&self) -> &Arc<RequestSigner> {
        &self.signer
    }

    /// Issue the next request nonce. See [`RequestSigner::next_nonce`].
    pub fn next_nonce(&self) -> i64 {
        self.signer.next_nonce()
    }

    /// Account funds, served from cache while younger than the TTL.
    ///
    /// # Errors
    ///
    /// Transport, signing, or trading errors from the fetch.
    pub async fn balance(&self) -> Result<Balances> {
        let generation = {
            let cache = self.cache.lock();
            if let Some(balances) = &cache.cached {
                if balances.fetched_at.elapsed() < self.ttl {
                    debug!("serving cached balance");
                    return Ok(balances.clone());
                }
            }
            cache.generation
        };

        let funds = self.api.fetch_funds().await?;
        let fresh = Balances {
            funds,
            fetched_at: Instant::now(),
        };

        let mut cache = self.cache.lock();
        if cache.generation == generation {
            cache.cached = Some(fresh.clone());
        } else {
            // an order was placed or canceled while this fetch was in
            // flight; its result may already be stale
            debug!("discarding balance fetched across an invalidation");
        }
        Ok(fresh)
    }

    /// Drop the cached balance so the next [`balance`](Self::balance)
    /// call re-fetches.
    pub fn invalidate_balance(&self) {
        let mut cache = self.cache.lock();
        cache.cached = None;
        cache.generation += 1;
    }

    /// Place an order. `price == None` denotes a market order.
    ///
    /// Invalidates the balance cache before the remote call. Never
    /// retried internally: a retry with a fresh nonce could double-submit.
    ///
    /// # Errors
    ///
    /// `InsufficientFunds`, `InvalidPrice`, `RateLimited`, or
    /// `TradingFailed` with the venue's raw message.
    pub async fn place_order(
        &self,
        pair: &CurrencyPair,
        side: Side,
        price: Option<Decimal>,
        volume: Decimal,
        immediate: bool,
    ) -> Result<Vec<OrderRef>> {
        self.invalidate_balance();
        let order = OrderRequest {
            pair: pair.clone(),
            side,
            price,
            volume,
            immediate,
        };
        info!(%pair, %side, ?price, %volume, "placing order");
        self.api.submit_order(&order).await
    }

    /// Cancel one order.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`](crate::error::Error::NotFound) when the order
    /// is already filled or canceled.
    pub async fn cancel_order(&self, pair: &CurrencyPair, order: &OrderRef) -> Result<()> {
        self.invalidate_balance();
        info!(%pair, %order, "canceling order");
        self.api.cancel_order(pair, order).await
    }

    /// Cancel every open order, optionally only for one pair.
    ///
    /// # Errors
    ///
    /// Transport or trading errors from the venue.
    pub async fn cancel_all_orders(&self, pair: Option<&CurrencyPair>) -> Result<()> {
        self.invalidate_balance();
        self.api.cancel_all_orders(pair).await
    }

    /// Currently open orders for a pair.
    ///
    /// # Errors
    ///
    /// Transport or trading errors from the venue.
    pub async fn open_orders(&self, pair: &CurrencyPair) -> Result<OpenOrders> {
        self.api.open_orders(pair).await
    }

    /// Fee for a fill at `price` and `volume`.
    #[must_use]
    pub fn estimate_fee(&self, side: Side, price: Decimal, volume: Decimal) -> Decimal {
        self.api.estimate_fee(side, price, volume)
    }

    /// Round `price` to the venue's accepted grid.
    #[must_use]
    pub fn round_to_valid_price(&self, pair: &CurrencyPair, side: Side, price: Decimal) -> Decimal {
        self.api.round_to_valid_price(pair, side, price)
    }

    /// Smallest accepted `(volume, value)` for an order on `pair`.
    #[must_use]
    pub fn minimum_order(&self, pair: &CurrencyPair) -> (Decimal, Decimal) {
        self.api.minimum_order(pair)
    }
}

impl std::fmt::Debug for TradingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingSession")
            .field("signer", &self.signer)
            .field("ttl", &self.ttl)
            .finish()
    }
}
