//! Integration tests for the signed trading session: balance caching,
//! nonce issuance, and the order lifecycle.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;

use ratehub::config::Settings;
use ratehub::domain::{Currency, CurrencyPair, OrderRef, Side};
use ratehub::error::Error;
use ratehub::testkit::trading::{test_signer, test_signer_with, ScriptedTradingApi};
use ratehub::trading::TradingSession;

fn btc_eur() -> CurrencyPair {
    CurrencyPair::new("BTC", "EUR")
}

fn session(api: Arc<ScriptedTradingApi>) -> TradingSession {
    TradingSession::new(api, test_signer("scripted"))
}

#[tokio::test]
async fn balance_is_cached_within_the_ttl() {
    let api = Arc::new(ScriptedTradingApi::new().with_available("BTC", dec!(0.5)));
    let session = session(api.clone());

    let first = session.balance().await.unwrap();
    let second = session.balance().await.unwrap();

    assert_eq!(api.fetch_count(), 1);
    assert_eq!(first.fetched_at, second.fetched_at);
    assert_eq!(second.funds.available[&Currency::from("BTC")], dec!(0.5));
}

#[tokio::test]
async fn balance_refetches_after_the_ttl() {
    let api = Arc::new(ScriptedTradingApi::new().with_available("BTC", dec!(0.5)));
    let session = TradingSession::with_ttl(
        api.clone(),
        test_signer("scripted"),
        Duration::from_millis(30),
    );

    let first = session.balance().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = session.balance().await.unwrap();

    assert_eq!(api.fetch_count(), 2);
    assert!(second.fetched_at > first.fetched_at);
}

#[tokio::test]
async fn placing_an_order_invalidates_the_balance_cache() {
    let api = Arc::new(ScriptedTradingApi::new().with_available("EUR", dec!(1000)));
    let session = session(api.clone());

    let before = session.balance().await.unwrap();
    assert_eq!(api.fetch_count(), 1);

    let refs = session
        .place_order(&btc_eur(), Side::Bid, Some(dec!(6500)), dec!(0.01), false)
        .await
        .unwrap();
    assert_eq!(refs.len(), 1);

    // well within the TTL, yet the cache was invalidated
    let after = session.balance().await.unwrap();
    assert_eq!(api.fetch_count(), 2);
    assert!(after.fetched_at > before.fetched_at);
}

#[tokio::test]
async fn cancel_invalidates_the_balance_cache_too() {
    let api = Arc::new(ScriptedTradingApi::new());
    let session = session(api.clone());

    session.balance().await.unwrap();
    session
        .cancel_order(&btc_eur(), &OrderRef::from("order-0"))
        .await
        .unwrap();
    session.balance().await.unwrap();

    assert_eq!(api.fetch_count(), 2);
}

#[tokio::test]
async fn balance_fetched_across_an_invalidation_is_not_committed() {
    let api = Arc::new(
        ScriptedTradingApi::new()
            .with_available("BTC", dec!(1))
            .with_fetch_delay(Duration::from_millis(100)),
    );
    let session = Arc::new(session(api.clone()));

    // start a fetch, then invalidate while it is in flight
    let racing = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.balance().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.invalidate_balance();

    racing.await.unwrap().unwrap();

    // the raced fetch was discarded, so this one hits the venue again
    session.balance().await.unwrap();
    assert_eq!(api.fetch_count(), 2);
}

#[tokio::test]
async fn nonces_strictly_increase_across_the_session() {
    let session = session(Arc::new(ScriptedTradingApi::new()));

    let mut prev = session.next_nonce();
    for _ in 0..1000 {
        let next = session.next_nonce();
        assert!(next > prev);
        prev = next;
    }
}

#[tokio::test]
async fn nonce_floor_survives_a_settings_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");

    let settings = Arc::new(Settings::new());
    let first = TradingSession::new(
        Arc::new(ScriptedTradingApi::new()),
        test_signer_with("scripted", Arc::clone(&settings)),
    );
    let issued = first.next_nonce();
    settings.save(&path).unwrap();

    // a later process loads the floor and never reuses a nonce
    let reloaded = Arc::new(Settings::load(&path).unwrap());
    let second = TradingSession::new(
        Arc::new(ScriptedTradingApi::new()),
        test_signer_with("scripted", reloaded),
    );
    assert!(second.next_nonce() > issued);
}

#[tokio::test]
async fn venue_error_taxonomy_propagates_unchanged() {
    let api = Arc::new(
        ScriptedTradingApi::new()
            .with_submit_result(Err(Error::InsufficientFunds("0.1 BTC short".into())))
            .with_submit_result(Err(Error::RateLimited("slow down".into())))
            .with_submit_result(Err(Error::TradingFailed("EOrder:Unknown flag".into()))),
    );
    let session = session(api);

    for expect_insufficient in [true, false, false] {
        let result = session
            .place_order(&btc_eur(), Side::Bid, None, dec!(1), true)
            .await;
        match result {
            Err(Error::InsufficientFunds(_)) => assert!(expect_insufficient),
            Err(Error::RateLimited(_) | Error::TradingFailed(_)) => {
                assert!(!expect_insufficient);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

#[tokio::test]
async fn canceling_a_finished_order_reports_not_found() {
    let session = session(Arc::new(ScriptedTradingApi::new()));

    let result = session
        .cancel_order(&btc_eur(), &OrderRef::from("already-filled"))
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn open_orders_pass_through_the_venue() {
    let session = session(Arc::new(ScriptedTradingApi::new()));
    let orders = session.open_orders(&btc_eur()).await.unwrap();
    assert!(orders.bids.is_empty());
    assert!(orders.asks.is_empty());
}

#[tokio::test]
async fn fee_estimation_uses_the_venue_schedule() {
    let flat = session(Arc::new(ScriptedTradingApi::new()));
    assert_eq!(
        flat.estimate_fee(Side::Ask, dec!(6500), dec!(2)),
        dec!(0)
    );

    let tiered = session(Arc::new(ScriptedTradingApi::new().with_fee_rate(dec!(0.0025))));
    assert_eq!(
        tiered.estimate_fee(Side::Ask, dec!(6500), dec!(2)),
        dec!(32.5000)
    );
}

#[tokio::test]
async fn minimum_order_defaults_depend_on_the_pair() {
    let session = session(Arc::new(ScriptedTradingApi::new()));

    assert_eq!(
        session.minimum_order(&btc_eur()),
        (dec!(0.0002), dec!(5))
    );
    assert_eq!(
        session.minimum_order(&CurrencyPair::new("BTC", "USD")),
        (dec!(0.0002), dec!(0))
    );
}

#[tokio::test]
async fn price_rounding_defaults_to_identity() {
    let session = session(Arc::new(ScriptedTradingApi::new()));
    assert_eq!(
        session.round_to_valid_price(&btc_eur(), Side::Bid, dec!(6500.123456)),
        dec!(6500.123456)
    );
}
