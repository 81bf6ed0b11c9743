//! Identifier and amount types shared across the engine.
//!
//! CRITICAL: All money values are i128 (smallest currency unit). Signed so
//! that malformed admin input (negative bounds) can be detected and rejected
//! rather than silently wrapping.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount of a currency in its smallest unit.
pub type Amount = i128;

/// Sequential order identifier. The first order is `1`; ids are never reused.
pub type OrderId = u64;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identity of a caller (user, administrator or automation agent)
    AccountId
);

string_id!(
    /// Currency identifier (e.g. "ETH", "DAI")
    CurrencyId
);

string_id!(
    /// Reference to a yield wrapper market (e.g. "cDAI")
    WrapperRef
);

string_id!(
    /// Reference to an AMM market returned by the exchange factory
    MarketRef
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display_and_compare() {
        let a = AccountId::new("alice");
        assert_eq!(a.to_string(), "alice");
        assert_eq!(a, AccountId::from("alice"));
        assert!(!a.is_empty());
        assert!(AccountId::new("").is_empty());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let c = CurrencyId::new("ETH");
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"ETH\"");
    }
}
