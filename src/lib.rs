//! Ratehub - multi-venue exchange rate aggregation.
//!
//! This crate collects live price and order-book data from currency
//! exchange venues (cryptocurrency and forex), normalizes it into one
//! data model, and exposes read access and a signed trading protocol
//! behind a venue-agnostic abstraction.
//!
//! # Architecture
//!
//! Venue adapters are thin translators implementing the
//! [`source::Venue`] contract; everything stateful lives in the core:
//!
//! - **`source`** - The aggregation engine: per-source rate/order-book
//!   store with staleness rejection and change detection, synchronous
//!   subscriber notification, and a debounced single-flight refresh
//!   scheduler.
//! - **`stream`** - Push-protocol bridges: raw text frames or
//!   room/event-multiplexed streams, both feeding the same store.
//! - **`trading`** - Signed trading sessions: monotonic nonces, HMAC
//!   request signing, a TTL'd balance cache, and the order lifecycle.
//!
//! # Modules
//!
//! - [`config`] - Per-venue key/value settings (credentials, nonce floor)
//! - [`domain`] - Venue-agnostic types: pairs, order books, snapshots
//! - [`error`] - Error taxonomy for the crate
//! - [`source`] - Venue contract, store, notification, scheduling
//! - [`stream`] - Streaming bridges and the decoded event model
//! - [`trading`] - Signed trading protocol
//! - [`transport`] - Shared HTTP plumbing for adapters
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use ratehub::domain::CurrencyPair;
//! use ratehub::error::Result;
//! use ratehub::source::{RateStore, Source, Venue};
//! use rust_decimal_macros::dec;
//!
//! struct Demo;
//!
//! #[async_trait]
//! impl Venue for Demo {
//!     fn name(&self) -> &'static str {
//!         "demo"
//!     }
//!
//!     fn supported_pairs(&self) -> Vec<CurrencyPair> {
//!         vec![CurrencyPair::new("BTC", "EUR")]
//!     }
//!
//!     async fn fetch_rates(&self, store: &RateStore, pairs: &[CurrencyPair]) -> Result<()> {
//!         for pair in pairs {
//!             store.update_rates(pair, dec!(6501), dec!(6500), None);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let source = Source::new(Arc::new(Demo));
//!     source.subscribe(|name, pair, changed| {
//!         println!("{name} {pair} changed={changed}");
//!     });
//!
//!     let rates = source.current_rates(None).await?;
//!     println!("{rates:?}");
//!
//!     source.periodic_update(30.0)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod source;
pub mod stream;
pub mod trading;
pub mod transport;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
