//! Order descriptions for the trading surface.

use rust_decimal::Decimal;

use super::book::Side;
use super::pair::CurrencyPair;

/// Venue-issued order identifier - newtype for type safety.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderRef(String);

impl OrderRef {
    /// Create a new `OrderRef` from a venue identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OrderRef {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// An order to be placed on a venue.
///
/// `price == None` denotes a market order. `immediate` asks the venue to
/// fill what it can right away instead of resting the remainder.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub pair: CurrencyPair,
    pub side: Side,
    pub price: Option<Decimal>,
    pub volume: Decimal,
    pub immediate: bool,
}

impl OrderRequest {
    /// True when no limit price was given.
    #[must_use]
    pub fn is_market(&self) -> bool {
        self.price.is_none()
    }
}

/// One currently open order as reported by a venue.
#[derive(Debug, Clone)]
pub struct OpenOrder {
    pub id: OrderRef,
    pub price: Decimal,
    pub volume: Decimal,
}

/// Open orders for one pair, sorted on price: bids lowest-first,
/// asks highest-first.
#[derive(Debug, Clone, Default)]
pub struct OpenOrders {
    pub bids: Vec<OpenOrder>,
    pub asks: Vec<OpenOrder>,
}
