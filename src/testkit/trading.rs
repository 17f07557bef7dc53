//! Scripted [`TradingApi`] implementation and signing helpers for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rust_decimal::Decimal;

use crate::config::Settings;
use crate::domain::{Currency, CurrencyPair, OpenOrders, OrderRef, OrderRequest, Side};
use crate::error::{Error, Result};
use crate::trading::{AccountFunds, Credentials, RequestSigner, TradingApi};

/// A signer over a fresh in-memory settings store, with a validly
/// base64-encoded throwaway secret.
#[must_use]
pub fn test_signer(venue: &'static str) -> Arc<RequestSigner> {
    let settings = Arc::new(Settings::new());
    test_signer_with(venue, settings)
}

/// A signer over the given settings store, for nonce-persistence tests.
#[must_use]
pub fn test_signer_with(venue: &'static str, settings: Arc<Settings>) -> Arc<RequestSigner> {
    let secret = BASE64.encode(b"testkit signing secret");
    Arc::new(RequestSigner::new(
        venue,
        Credentials::new("testkit-key", secret),
        settings,
    ))
}

/// A [`TradingApi`] that serves canned funds and scripted order outcomes.
///
/// Each `submit_order`/`cancel_order` call pops the next scripted result;
/// an exhausted script succeeds, with submit returning a fresh
/// `order-N` reference. `fetch_funds` counts its calls and can be slowed
/// down to race against cache invalidation.
#[derive(Default)]
pub struct ScriptedTradingApi {
    funds: Mutex<AccountFunds>,
    fetch_count: AtomicU32,
    fetch_delay: Option<Duration>,
    submit_results: Mutex<VecDeque<Result<Vec<OrderRef>>>>,
    cancel_results: Mutex<VecDeque<Result<()>>>,
    fee_rate: Option<Decimal>,
    order_seq: AtomicU32,
}

impl ScriptedTradingApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this available amount for `currency` on every fetch.
    #[must_use]
    pub fn with_available(self, currency: &str, amount: Decimal) -> Self {
        {
            let mut funds = self.funds.lock().unwrap();
            funds.balance.insert(Currency::from(currency), amount);
            funds.available.insert(Currency::from(currency), amount);
        }
        self
    }

    /// Make every funds fetch take `delay` before completing.
    #[must_use]
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Append a scripted result for the next `submit_order` call.
    #[must_use]
    pub fn with_submit_result(self, result: Result<Vec<OrderRef>>) -> Self {
        self.submit_results.lock().unwrap().push_back(result);
        self
    }

    /// Append a scripted result for the next `cancel_order` call.
    #[must_use]
    pub fn with_cancel_result(self, result: Result<()>) -> Self {
        self.cancel_results.lock().unwrap().push_back(result);
        self
    }

    /// Charge `rate * price * volume` as the fee estimate.
    #[must_use]
    pub fn with_fee_rate(mut self, rate: Decimal) -> Self {
        self.fee_rate = Some(rate);
        self
    }

    /// How many times `fetch_funds` ran.
    #[must_use]
    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TradingApi for ScriptedTradingApi {
    async fn fetch_funds(&self) -> Result<AccountFunds> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.funds.lock().unwrap().clone())
    }

    async fn submit_order(&self, _order: &OrderRequest) -> Result<Vec<OrderRef>> {
        match self.submit_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => {
                let n = self.order_seq.fetch_add(1, Ordering::SeqCst);
                Ok(vec![OrderRef::new(format!("order-{n}"))])
            }
        }
    }

    async fn cancel_order(&self, _pair: &CurrencyPair, order: &OrderRef) -> Result<()> {
        match self.cancel_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => {
                if order.as_str().starts_with("order-") {
                    Ok(())
                } else {
                    Err(Error::NotFound(format!("unknown order {order}")))
                }
            }
        }
    }

    async fn cancel_all_orders(&self, _pair: Option<&CurrencyPair>) -> Result<()> {
        Ok(())
    }

    async fn open_orders(&self, _pair: &CurrencyPair) -> Result<OpenOrders> {
        Ok(OpenOrders::default())
    }

    fn estimate_fee(&self, _side: Side, price: Decimal, volume: Decimal) -> Decimal {
        match self.fee_rate {
            Some(rate) => rate * price * volume,
            None => Decimal::ZERO,
        }
    }
}
