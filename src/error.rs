use thiserror::Error;

use crate::domain::CurrencyPair;

/// Errors produced by the aggregation core and the trading protocol.
///
/// `StaleUpdate` and `EmptyOrderBook` are non-fatal conditions: they are
/// reported through the error-subscriber channel and never abort a fetch.
/// Trading errors always propagate to the caller; a mutating call is never
/// silently retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("ignoring old {venue} update ({lag_secs:.1}s behind)")]
    StaleUpdate { venue: &'static str, lag_secs: f64 },

    #[error("{pair} {venue} order book empty, not updating rates")]
    EmptyOrderBook {
        venue: &'static str,
        pair: CurrencyPair,
    },

    #[error("failed to sign request: {0}")]
    SigningFailed(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("trading failed: {0}")]
    TradingFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Protocol(err.to_string())
    }
}
