//! Domain models for the order book

pub mod currency;
pub mod event;
pub mod order;

// Re-exports
pub use currency::CurrencyConfig;
pub use event::{Event, EventLog};
pub use order::{Order, OrderRequest, OrderStatus};
