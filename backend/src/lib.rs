//! DCA Engine Core - Rust Engine
//!
//! Recurring conversion engine: users escrow a source currency and the
//! engine swaps a fixed contribution into a target currency on a schedule,
//! parking idle escrow in an interest-bearing yield wrapper in between.
//!
//! # Architecture
//!
//! - **core**: Identifiers, money type and clocks
//! - **models**: Domain types (Order, CurrencyConfig, Event)
//! - **registry**: Accepted currencies and their escrow accounting
//! - **access**: Administrator and automation agent roles
//! - **ledger**: Order storage, owner enumeration, parked refunds
//! - **scheduler**: Due-conversion passes
//! - **yield_coord**: Escrow movement into and out of yield wrappers
//! - **collaborators**: AMM, yield wrapper and funds-transfer traits
//! - **engine**: Public operations, configuration and checkpoints
//!
//! # Critical Invariants
//!
//! 1. All money values are i128 in the currency's smallest unit
//! 2. For every currency, aggregate escrow equals the sum of remaining
//!    balances of its orders, and `liquid + deposited` equals aggregate
//!    escrow
//! 3. State is booked before any collaborator is called and reverted if the
//!    call fails
//! 4. Terminal orders hold no escrow

// Module declarations
pub mod access;
pub mod collaborators;
pub mod core;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod registry;
pub mod scheduler;
pub mod yield_coord;

// Re-exports for convenience
pub use crate::core::{
    AccountId, Amount, Clock, CurrencyId, ManualClock, MarketRef, OrderId, SystemClock, WrapperRef,
};
pub use engine::{DcaEngine, EngineConfig, EngineSnapshot, Receipt};
pub use error::{EngineError, EngineResult};
pub use models::{CurrencyConfig, Event, EventLog, Order, OrderRequest, OrderStatus};
pub use scheduler::{ConversionFailure, CycleOutcome, PassOptions, PassReport};
