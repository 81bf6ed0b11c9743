//! Engine
//!
//! Ties the registry, access control, ledger, scheduler and yield
//! coordination together behind one owner of all state.

pub mod checkpoint;
pub mod config;
pub mod order_book;

pub use checkpoint::{compute_config_hash, validate_snapshot, EngineSnapshot, RefundSnapshot};
pub use config::EngineConfig;
pub use order_book::{DcaEngine, Receipt};
