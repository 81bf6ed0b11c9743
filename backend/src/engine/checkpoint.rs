//! Checkpoint - Save/Restore Engine State
//!
//! Serializes the complete engine state so that a process can stop and
//! resume without losing orders, escrow accounting or parked refunds.
//! Collaborator state (AMM, yield wrapper, custody) lives outside the engine
//! and is not part of a snapshot.
//!
//! # Critical Invariants
//!
//! - **Escrow Conservation**: each currency's aggregate escrow equals the sum
//!   of remaining balances of the orders funded in it, and equals
//!   `liquid + deposited`
//! - **Id Integrity**: order ids are unique, non-zero and below the next id
//! - **Terminal Orders Hold Nothing**: cancelled and completed orders carry a
//!   zero remaining balance
//! - **Order Progress**: no balance is negative and no order has run more
//!   cycles than it was created with
//! - **Earmarked Principal**: wrapper principal set aside for parked refunds
//!   never exceeds what is parked in that currency
//! - **Config Matching**: state can only be restored with a matching config

use super::config::EngineConfig;
use crate::core::{AccountId, Amount, CurrencyId, OrderId};
use crate::error::{EngineError, EngineResult};
use crate::models::{CurrencyConfig, Order};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete engine state snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Clock reading when the snapshot was taken
    pub taken_at: u64,

    /// SHA256 hash of the engine config (for validation)
    pub config_hash: String,

    /// Current automation agent (may differ from the configured initial one)
    pub automation_agent: Option<AccountId>,

    pub next_order_id: OrderId,

    /// All orders in ascending id order, terminal ones included
    pub orders: Vec<Order>,

    pub currencies: Vec<CurrencyConfig>,

    pub pending_refunds: Vec<RefundSnapshot>,
}

/// One parked refund
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundSnapshot {
    pub owner: AccountId,
    pub currency: CurrencyId,
    pub amount: Amount,
}

impl EngineSnapshot {
    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::InvalidSnapshot(format!("serialization failed: {}", e)))
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidSnapshot(format!("malformed snapshot: {}", e)))
    }
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of a configuration
///
/// Object keys are sorted recursively before hashing so the hash does not
/// depend on field order.
pub fn compute_config_hash(config: &EngineConfig) -> EngineResult<String> {
    use serde_json::Value;

    let value = serde_json::to_value(config)
        .map_err(|e| EngineError::InvalidConfig(format!("config serialization failed: {}", e)))?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value))
        .map_err(|e| EngineError::InvalidConfig(format!("config serialization failed: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation
// ============================================================================

/// Check a snapshot's internal consistency before restoring from it
pub fn validate_snapshot(snapshot: &EngineSnapshot) -> EngineResult<()> {
    if snapshot.next_order_id == 0 {
        return Err(EngineError::InvalidSnapshot(
            "next_order_id must be >= 1".to_string(),
        ));
    }

    // 1. Id integrity
    let mut seen = HashSet::new();
    for order in &snapshot.orders {
        if order.id() == 0 || order.id() >= snapshot.next_order_id {
            return Err(EngineError::InvalidSnapshot(format!(
                "order id {} outside 1..{}",
                order.id(),
                snapshot.next_order_id
            )));
        }
        if !seen.insert(order.id()) {
            return Err(EngineError::InvalidSnapshot(format!(
                "duplicate order id {}",
                order.id()
            )));
        }
        if order.remaining_balance() < 0 {
            return Err(EngineError::InvalidSnapshot(format!(
                "order {} has negative balance {}",
                order.id(),
                order.remaining_balance()
            )));
        }
        if order.cycles_executed() > order.total_cycles() {
            return Err(EngineError::InvalidSnapshot(format!(
                "order {} executed {} of {} cycles",
                order.id(),
                order.cycles_executed(),
                order.total_cycles()
            )));
        }
        if order.status().is_terminal() && order.remaining_balance() != 0 {
            return Err(EngineError::InvalidSnapshot(format!(
                "terminal order {} still holds {}",
                order.id(),
                order.remaining_balance()
            )));
        }
    }

    // 2. Escrow conservation
    let mut escrow: BTreeMap<&CurrencyId, Amount> = BTreeMap::new();
    for order in &snapshot.orders {
        *escrow.entry(order.source_currency()).or_insert(0) += order.remaining_balance();
    }

    let mut defined = HashSet::new();
    for config in &snapshot.currencies {
        if !defined.insert(config.id()) {
            return Err(EngineError::InvalidSnapshot(format!(
                "duplicate currency {}",
                config.id()
            )));
        }
        let expected = escrow.get(config.id()).copied().unwrap_or(0);
        if config.aggregate_escrow() != expected {
            return Err(EngineError::InvalidSnapshot(format!(
                "escrow conservation violated for {}: orders hold {}, currency records {}",
                config.id(),
                expected,
                config.aggregate_escrow()
            )));
        }
        if !config.is_balanced() {
            return Err(EngineError::InvalidSnapshot(format!(
                "liquid {} + deposited {} != escrow {} for {}",
                config.liquid(),
                config.deposited(),
                config.aggregate_escrow(),
                config.id()
            )));
        }
    }

    // 3. Every funded currency is defined
    for (currency, amount) in &escrow {
        if !defined.contains(currency) {
            return Err(EngineError::InvalidSnapshot(format!(
                "orders hold {} of undefined currency {}",
                amount, currency
            )));
        }
    }

    if let Some(refund) = snapshot.pending_refunds.iter().find(|r| r.amount <= 0) {
        return Err(EngineError::InvalidSnapshot(format!(
            "non-positive pending refund {} for {}",
            refund.amount, refund.owner
        )));
    }

    // 4. Earmarked principal is covered by parked refunds
    for config in &snapshot.currencies {
        let parked: Amount = snapshot
            .pending_refunds
            .iter()
            .filter(|r| &r.currency == config.id())
            .map(|r| r.amount)
            .sum();
        if config.refund_principal() > parked {
            return Err(EngineError::InvalidSnapshot(format!(
                "{} earmarks {} for refunds but only {} is parked",
                config.id(),
                config.refund_principal(),
                parked
            )));
        }
    }

    Ok(())
}
