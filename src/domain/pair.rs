//! Currency code and market pair identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Currency code - newtype for type safety.
///
/// Codes are compared exactly; canonicalizing venue-specific aliases
/// (e.g. `XBT` for `BTC`) is the venue adapter's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a new `Currency` from a code string.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the currency code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Currency {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// An ordered (base, quote) pair of currency codes, e.g. (BTC, EUR).
///
/// The pair is the universal key into every per-pair table in the store.
/// The relationship is `value_in_base = rate * value_in_quote`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyPair {
    base: Currency,
    quote: Currency,
}

impl CurrencyPair {
    /// Create a pair from base and quote codes.
    pub fn new(base: impl Into<Currency>, quote: impl Into<Currency>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// The base currency.
    #[must_use]
    pub fn base(&self) -> &Currency {
        &self.base
    }

    /// The quote currency.
    #[must_use]
    pub fn quote(&self) -> &Currency {
        &self.quote
    }

    /// True if both codes are contained in `currencies`.
    ///
    /// Used to narrow a venue's supported pairs to the subset a consumer
    /// asked to follow.
    #[must_use]
    pub fn within(&self, currencies: &[Currency]) -> bool {
        currencies.contains(&self.base) && currencies.contains(&self.quote)
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl From<(&str, &str)> for CurrencyPair {
    fn from((base, quote): (&str, &str)) -> Self {
        Self::new(base, quote)
    }
}
