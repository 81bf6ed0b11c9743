//! External collaborators
//!
//! The engine does not implement pricing, lending or custody. It consumes
//! them through three capability traits:
//! - [`AmmExchange`]: market lookup/creation and exact-input swaps
//! - [`YieldWrapper`]: interest-bearing deposit and withdrawal of idle escrow
//! - [`FundsTransfer`]: moving currency between callers and the engine
//!
//! Every call is blocking and either succeeds or fails as a whole.
//! In-memory implementations live in [`memory`]; they are available in all
//! builds so integration tests and simulations can drive the engine.

pub mod memory;

use crate::core::{AccountId, Amount, CurrencyId, MarketRef, WrapperRef};
use thiserror::Error;

pub use memory::{InMemoryAmm, InMemoryFunds, InMemoryYieldWrapper, NoYieldWrapper};

/// Errors reported by an AMM
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwapError {
    #[error("No market for {0}")]
    MarketNotFound(CurrencyId),

    #[error("Output {actual} below minimum {min}")]
    SlippageExceeded { min: Amount, actual: Amount },

    #[error("Swap rejected: {0}")]
    Rejected(String),
}

/// Errors reported by a yield wrapper
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum YieldError {
    #[error("Redemption limit: requested {requested}, available {available}")]
    RedemptionLimit { requested: Amount, available: Amount },

    #[error("Yield wrapper rejected the call: {0}")]
    Rejected(String),
}

/// Errors reported by the funds-transfer substrate
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },

    #[error("Transfer rejected: {0}")]
    Rejected(String),
}

/// One exact-input swap
///
/// The output is delivered by the AMM straight to `recipient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest<'a> {
    pub market: &'a MarketRef,
    pub currency_in: &'a CurrencyId,
    pub amount_in: Amount,
    pub min_amount_out: Amount,
    /// Unix seconds after which the AMM must reject the swap
    pub deadline: u64,
    pub recipient: &'a AccountId,
}

/// Automated market maker exchange and its factory
pub trait AmmExchange {
    fn create_market(&mut self, token: &CurrencyId) -> Result<MarketRef, SwapError>;

    fn get_market(&self, token: &CurrencyId) -> Option<MarketRef>;

    /// Swap exactly `amount_in` and return the output amount delivered
    fn swap_exact_input(&mut self, request: SwapRequest<'_>) -> Result<Amount, SwapError>;
}

/// Lending market that pays interest on deposited currency
pub trait YieldWrapper {
    fn deposit(
        &mut self,
        wrapper: &WrapperRef,
        currency: &CurrencyId,
        amount: Amount,
    ) -> Result<(), YieldError>;

    /// Redeem `amount` of principal; returns the amount actually received
    fn withdraw(
        &mut self,
        wrapper: &WrapperRef,
        currency: &CurrencyId,
        amount: Amount,
    ) -> Result<Amount, YieldError>;
}

/// Identity and funds-transfer substrate
pub trait FundsTransfer {
    /// Pull `declared` from `from` into engine custody
    ///
    /// The substrate guarantees the transferred amount equals `declared`.
    fn receive(
        &mut self,
        from: &AccountId,
        currency: &CurrencyId,
        declared: Amount,
    ) -> Result<(), TransferError>;

    /// Pay `amount` from engine custody to `to`
    fn send(
        &mut self,
        to: &AccountId,
        currency: &CurrencyId,
        amount: Amount,
    ) -> Result<(), TransferError>;
}
