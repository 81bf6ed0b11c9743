//! Engine error taxonomy
//!
//! Validation errors abort the operation before any state changes.
//! Collaborator failures (`YieldWithdrawalFailed`, `SwapFailed`, ...) abort a
//! direct operation, but during a conversion pass they are caught per order
//! and reported in the pass result instead.

use crate::core::{AccountId, Amount, CurrencyId, OrderId};
use thiserror::Error;

/// Errors surfaced by engine operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unauthorized: {caller} may not {action}")]
    Unauthorized { caller: AccountId, action: &'static str },

    #[error("Unknown order: {0}")]
    UnknownOrder(OrderId),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(CurrencyId),

    #[error("Invalid contribution range: min {min}, max {max}")]
    InvalidRange { min: Amount, max: Amount },

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Currency {currency} does not accept a contribution of {amount}")]
    CurrencyNotAccepted { currency: CurrencyId, amount: Amount },

    #[error("Insufficient funding: deposited {deposited}, contribution {contribution}")]
    InsufficientFunding { deposited: Amount, contribution: Amount },

    #[error("Order {0} is no longer active")]
    AlreadyTerminal(OrderId),

    #[error("Index {index} out of range for {owner} ({count} orders)")]
    IndexOutOfRange {
        owner: AccountId,
        index: usize,
        count: usize,
    },

    #[error("Yield withdrawal failed for {currency}: {reason}")]
    YieldWithdrawalFailed { currency: CurrencyId, reason: String },

    #[error("Yield deposit failed for {currency}: {reason}")]
    YieldDepositFailed { currency: CurrencyId, reason: String },

    #[error("Swap failed for order {order_id}: {reason}")]
    SwapFailed { order_id: OrderId, reason: String },

    #[error("Market for {token} unavailable: {reason}")]
    MarketUnavailable { token: CurrencyId, reason: String },

    #[error("Transfer of {amount} {currency} failed: {reason}")]
    TransferFailed {
        currency: CurrencyId,
        amount: Amount,
        reason: String,
    },

    #[error("Yield wrapper for {currency} still holds {deposited}")]
    YieldWrapperBusy { currency: CurrencyId, deposited: Amount },

    #[error("No pending refund for {owner} in {currency}")]
    NoPendingRefund { owner: AccountId, currency: CurrencyId },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Snapshot does not match config: expected hash {expected}, found {found}")]
    SnapshotMismatch { expected: String, found: String },
}

impl EngineError {
    /// True for failures raised by an external collaborator rather than by
    /// input validation.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            EngineError::YieldWithdrawalFailed { .. }
                | EngineError::YieldDepositFailed { .. }
                | EngineError::SwapFailed { .. }
                | EngineError::MarketUnavailable { .. }
                | EngineError::TransferFailed { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
