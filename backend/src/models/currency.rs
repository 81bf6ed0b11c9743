//! Currency configuration and escrow accounting
//!
//! Each accepted source currency carries its contribution bounds, an optional
//! yield wrapper and the aggregate escrow held for it, split into a liquid
//! portion and a portion deposited in the wrapper.
//!
//! # Critical Invariants
//!
//! - `liquid + deposited == aggregate_escrow` after every operation
//! - `refund_principal` is wrapper principal owed to parked refunds; it is
//!   outside the escrow aggregate and never drawn on for conversions

use crate::core::{Amount, CurrencyId, WrapperRef};
use serde::{Deserialize, Serialize};

/// Acceptance policy and escrow accounting for one source currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyConfig {
    id: CurrencyId,
    min_contribution: Amount,
    max_contribution: Amount,
    yield_wrapper: Option<WrapperRef>,

    /// Liquid balance kept out of the wrapper beyond the next cycle of every
    /// active order
    liquidity_reserve: Amount,

    /// Sum of remaining balances of all orders funded in this currency
    aggregate_escrow: Amount,

    /// Escrow held directly by the engine
    liquid: Amount,

    /// Escrow principal currently deposited in the yield wrapper
    deposited: Amount,

    /// Interest returned by the wrapper beyond deposited principal
    realized_yield: Amount,

    /// Principal still in the wrapper that belongs to parked refunds
    #[serde(default)]
    refund_principal: Amount,
}

impl CurrencyConfig {
    pub fn new(id: CurrencyId, min_contribution: Amount, max_contribution: Amount) -> Self {
        Self {
            id,
            min_contribution,
            max_contribution,
            yield_wrapper: None,
            liquidity_reserve: 0,
            aggregate_escrow: 0,
            liquid: 0,
            deposited: 0,
            realized_yield: 0,
            refund_principal: 0,
        }
    }

    pub fn id(&self) -> &CurrencyId {
        &self.id
    }

    pub fn min_contribution(&self) -> Amount {
        self.min_contribution
    }

    pub fn max_contribution(&self) -> Amount {
        self.max_contribution
    }

    pub fn yield_wrapper(&self) -> Option<&WrapperRef> {
        self.yield_wrapper.as_ref()
    }

    pub fn liquidity_reserve(&self) -> Amount {
        self.liquidity_reserve
    }

    pub fn aggregate_escrow(&self) -> Amount {
        self.aggregate_escrow
    }

    pub fn liquid(&self) -> Amount {
        self.liquid
    }

    pub fn deposited(&self) -> Amount {
        self.deposited
    }

    pub fn realized_yield(&self) -> Amount {
        self.realized_yield
    }

    pub fn refund_principal(&self) -> Amount {
        self.refund_principal
    }

    /// True iff `min <= amount <= max`
    pub fn accepts(&self, amount: Amount) -> bool {
        self.min_contribution <= amount && amount <= self.max_contribution
    }

    /// Check the split invariant
    pub fn is_balanced(&self) -> bool {
        self.liquid + self.deposited == self.aggregate_escrow
            && self.liquid >= 0
            && self.deposited >= 0
            && self.refund_principal >= 0
    }

    pub(crate) fn set_bounds(&mut self, min: Amount, max: Amount) {
        self.min_contribution = min;
        self.max_contribution = max;
    }

    pub(crate) fn set_yield_wrapper(&mut self, wrapper: WrapperRef) {
        self.yield_wrapper = Some(wrapper);
    }

    pub(crate) fn set_liquidity_reserve(&mut self, reserve: Amount) {
        self.liquidity_reserve = reserve;
    }

    /// Funds entering escrow arrive liquid
    ///
    /// Only for amounts that previously left escrow; new deposits go through
    /// [`try_escrow_in`](Self::try_escrow_in).
    pub(crate) fn escrow_in(&mut self, amount: Amount) {
        self.aggregate_escrow += amount;
        self.liquid += amount;
    }

    /// Book a new deposit; `None` (and no change) if the totals would overflow
    pub(crate) fn try_escrow_in(&mut self, amount: Amount) -> Option<()> {
        let aggregate = self.aggregate_escrow.checked_add(amount)?;
        let liquid = self.liquid.checked_add(amount)?;
        self.aggregate_escrow = aggregate;
        self.liquid = liquid;
        Some(())
    }

    /// Funds leaving escrow must leave from the liquid portion
    pub(crate) fn escrow_out(&mut self, amount: Amount) {
        debug_assert!(self.liquid >= amount);
        self.aggregate_escrow -= amount;
        self.liquid -= amount;
    }

    /// Move principal from liquid into the wrapper
    pub(crate) fn move_to_wrapper(&mut self, amount: Amount) {
        self.liquid -= amount;
        self.deposited += amount;
    }

    /// Move principal from the wrapper back to liquid
    pub(crate) fn move_from_wrapper(&mut self, amount: Amount) {
        self.deposited -= amount;
        self.liquid += amount;
    }

    pub(crate) fn credit_yield(&mut self, amount: Amount) {
        self.realized_yield += amount;
    }

    /// Release deposited escrow to a parked refund without redeeming it
    pub(crate) fn earmark_for_refund(&mut self, amount: Amount) {
        debug_assert!(self.deposited >= amount);
        self.deposited -= amount;
        self.aggregate_escrow -= amount;
        self.refund_principal += amount;
    }

    /// Undo [`earmark_for_refund`](Self::earmark_for_refund)
    pub(crate) fn unearmark(&mut self, amount: Amount) {
        self.refund_principal -= amount;
        self.deposited += amount;
        self.aggregate_escrow += amount;
    }

    /// Earmarked principal has been redeemed from the wrapper
    pub(crate) fn release_refund_principal(&mut self, amount: Amount) {
        self.refund_principal -= amount;
    }

    pub(crate) fn restore_refund_principal(&mut self, amount: Amount) {
        self.refund_principal += amount;
    }
}
