//! Trade side of a record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the market a record sits on.
///
/// `Unknown` is the zero value; the engine rejects it with a typed error
/// instead of guessing. Adapters are responsible for mapping their
/// platform's action strings onto `Buy`/`Sell` exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Side {
    /// Unrecognized or missing side.
    #[default]
    Unknown,
    /// An acquisition.
    Buy,
    /// A disposal.
    Sell,
}

impl Side {
    /// Returns true for [`Side::Buy`].
    #[must_use]
    pub const fn is_buy(self) -> bool {
        matches!(self, Self::Buy)
    }

    /// Returns true for [`Side::Sell`].
    #[must_use]
    pub const fn is_sell(self) -> bool {
        matches!(self, Self::Sell)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Side::Buy.to_string(), "buy");
        assert_eq!(Side::Sell.to_string(), "sell");
        assert_eq!(Side::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_predicates() {
        assert!(Side::Buy.is_buy());
        assert!(!Side::Buy.is_sell());
        assert!(Side::Sell.is_sell());
        assert!(!Side::Sell.is_buy());
        assert!(!Side::Unknown.is_buy());
        assert!(!Side::Unknown.is_sell());
    }

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(Side::default(), Side::Unknown);
    }
}
