//! Order model
//!
//! A recurring conversion instruction. Each order has:
//! - Owner, source currency and target currency
//! - Per-cycle contribution (immutable after creation)
//! - Recurrence interval and total cycle count
//! - Remaining escrowed source-currency balance
//! - Status (Active, Cancelled, Completed)
//!
//! # Critical Invariants
//!
//! 1. `cycles_executed <= total_cycles`
//! 2. `remaining_balance >= 0`
//! 3. Terminal orders (Cancelled, Completed) hold a remaining balance of 0
//! 4. Contribution, interval and target currency never change

use crate::core::{AccountId, Amount, CurrencyId, OrderId};
use serde::{Deserialize, Serialize};

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Order is eligible for conversions
    Active,

    /// Owner cancelled the order and was refunded
    Cancelled,

    /// All cycles ran, or the escrow could not fund another cycle
    Completed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Active)
    }
}

/// Parameters supplied by a user creating an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub source_currency: CurrencyId,
    pub target_currency: CurrencyId,

    /// Source-currency amount swapped each cycle
    pub contribution: Amount,

    pub interval_seconds: u64,
    pub total_cycles: u32,

    /// Amount of source currency the caller funds the order with
    pub deposit: Amount,

    /// Minimum target-currency output accepted per swap (0 = unbounded slippage)
    #[serde(default)]
    pub min_output_per_cycle: Amount,
}

impl OrderRequest {
    pub fn new(
        source_currency: impl Into<CurrencyId>,
        target_currency: impl Into<CurrencyId>,
        contribution: Amount,
        interval_seconds: u64,
        total_cycles: u32,
        deposit: Amount,
    ) -> Self {
        Self {
            source_currency: source_currency.into(),
            target_currency: target_currency.into(),
            contribution,
            interval_seconds,
            total_cycles,
            deposit,
            min_output_per_cycle: 0,
        }
    }

    /// Require at least `min_output` of the target currency from every swap
    pub fn with_min_output(mut self, min_output: Amount) -> Self {
        self.min_output_per_cycle = min_output;
        self
    }
}

/// A user's recurring conversion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    owner: AccountId,
    source_currency: CurrencyId,
    target_currency: CurrencyId,
    contribution: Amount,
    interval_seconds: u64,
    total_cycles: u32,
    cycles_executed: u32,

    /// Escrowed source currency not yet converted or refunded
    remaining_balance: Amount,

    /// Unix seconds of the last executed cycle (0 = never executed)
    last_execution_timestamp: u64,

    min_output_per_cycle: Amount,
    status: OrderStatus,
}

impl Order {
    /// Create a new active order from a validated request
    pub fn new(id: OrderId, owner: AccountId, request: &OrderRequest) -> Self {
        Self {
            id,
            owner,
            source_currency: request.source_currency.clone(),
            target_currency: request.target_currency.clone(),
            contribution: request.contribution,
            interval_seconds: request.interval_seconds,
            total_cycles: request.total_cycles,
            cycles_executed: 0,
            remaining_balance: request.deposit,
            last_execution_timestamp: 0,
            min_output_per_cycle: request.min_output_per_cycle,
            status: OrderStatus::Active,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn source_currency(&self) -> &CurrencyId {
        &self.source_currency
    }

    pub fn target_currency(&self) -> &CurrencyId {
        &self.target_currency
    }

    pub fn contribution(&self) -> Amount {
        self.contribution
    }

    pub fn interval_seconds(&self) -> u64 {
        self.interval_seconds
    }

    pub fn total_cycles(&self) -> u32 {
        self.total_cycles
    }

    pub fn cycles_executed(&self) -> u32 {
        self.cycles_executed
    }

    pub fn remaining_balance(&self) -> Amount {
        self.remaining_balance
    }

    pub fn last_execution_timestamp(&self) -> u64 {
        self.last_execution_timestamp
    }

    pub fn min_output_per_cycle(&self) -> Amount {
        self.min_output_per_cycle
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }

    /// Whether a conversion for this order may run at `now`
    ///
    /// A never-executed order is due immediately. Otherwise at least one
    /// interval must have elapsed since the last cycle, and the escrow must
    /// cover a full contribution.
    pub fn is_due(&self, now: u64) -> bool {
        if !self.is_active() || self.remaining_balance < self.contribution {
            return false;
        }
        if self.last_execution_timestamp == 0 {
            return true;
        }
        now.saturating_sub(self.last_execution_timestamp) >= self.interval_seconds
    }

    /// Whether the cycle about to run is the last one this order can fund
    pub fn next_cycle_completes(&self) -> bool {
        self.cycles_executed + 1 >= self.total_cycles
            || self.remaining_balance - self.contribution < self.contribution
    }

    /// Book one executed cycle and return its 1-based index
    pub(crate) fn record_cycle(&mut self, now: u64) -> u32 {
        debug_assert!(self.remaining_balance >= self.contribution);
        debug_assert!(self.cycles_executed < self.total_cycles);
        self.remaining_balance -= self.contribution;
        self.cycles_executed += 1;
        self.last_execution_timestamp = now;
        self.cycles_executed
    }

    /// Mark completed and release whatever escrow is left
    pub(crate) fn complete(&mut self) -> Amount {
        self.status = OrderStatus::Completed;
        std::mem::take(&mut self.remaining_balance)
    }

    /// Mark cancelled and release the full remaining escrow
    pub(crate) fn cancel(&mut self) -> Amount {
        self.status = OrderStatus::Cancelled;
        std::mem::take(&mut self.remaining_balance)
    }
}
