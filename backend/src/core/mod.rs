//! Core primitives: identifiers, amounts and time.

pub mod ids;
pub mod time;

pub use ids::{AccountId, Amount, CurrencyId, MarketRef, OrderId, WrapperRef};
pub use time::{Clock, ManualClock, SystemClock};
