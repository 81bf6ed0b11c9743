//! Events emitted by the engine for external observers.
//!
//! Events are the only way a caller learns what an operation did beyond its
//! return value. Every mutating operation hands back the events it emitted,
//! and the engine keeps all of them in an append-only [`EventLog`] for
//! indexing and auditing.
//!
//! # Example
//!
//! ```rust
//! use dca_engine_core_rs::models::{Event, EventLog};
//!
//! let mut log = EventLog::new();
//! log.log(Event::OrderCompleted { id: 3 });
//!
//! assert_eq!(log.events_for_order(3).len(), 1);
//! assert_eq!(log.events()[0].event_type(), "OrderCompleted");
//! ```

use crate::core::{AccountId, Amount, CurrencyId, MarketRef, OrderId, WrapperRef};
use serde::{Deserialize, Serialize};

/// State change observable from outside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// New order escrowed and scheduled
    OrderCreated {
        id: OrderId,
        owner: AccountId,
        source_currency: CurrencyId,
        target_currency: CurrencyId,
        contribution: Amount,
        interval_seconds: u64,
        total_cycles: u32,
    },

    /// Owner cancelled an order and was refunded its remaining escrow
    OrderCancelled { id: OrderId, refunded_amount: Amount },

    /// One cycle swapped `amount_in` source for `amount_out` target currency
    CycleExecuted {
        id: OrderId,
        cycle_index: u32,
        amount_in: Amount,
        amount_out: Amount,
    },

    /// Order reached its final cycle or ran out of escrow
    OrderCompleted { id: OrderId },

    /// Escrow left on a completed order was returned to the owner
    ResidualRefunded { id: OrderId, amount: Amount },

    /// A refund transfer failed; the amount is parked for the owner to claim
    RefundDeferred {
        owner: AccountId,
        currency: CurrencyId,
        amount: Amount,
    },

    /// Owner claimed a previously deferred refund
    RefundClaimed {
        owner: AccountId,
        currency: CurrencyId,
        amount: Amount,
    },

    /// Admin created or updated a currency's acceptance bounds
    CurrencyDefined {
        currency: CurrencyId,
        min_contribution: Amount,
        max_contribution: Amount,
    },

    YieldWrapperAttached {
        currency: CurrencyId,
        wrapper: WrapperRef,
    },

    LiquidityReserveSet { currency: CurrencyId, reserve: Amount },

    /// `None` disables automated execution
    AutomationAgentChanged { agent: Option<AccountId> },

    MarketOpened { token: CurrencyId, market: MarketRef },

    /// Idle escrow moved into the yield wrapper
    YieldDeposited { currency: CurrencyId, amount: Amount },

    /// Escrow pulled back out of the yield wrapper
    YieldWithdrawn {
        currency: CurrencyId,
        requested: Amount,
        received: Amount,
    },
}

impl Event {
    /// Short name of the event variant
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "OrderCreated",
            Event::OrderCancelled { .. } => "OrderCancelled",
            Event::CycleExecuted { .. } => "CycleExecuted",
            Event::OrderCompleted { .. } => "OrderCompleted",
            Event::ResidualRefunded { .. } => "ResidualRefunded",
            Event::RefundDeferred { .. } => "RefundDeferred",
            Event::RefundClaimed { .. } => "RefundClaimed",
            Event::CurrencyDefined { .. } => "CurrencyDefined",
            Event::YieldWrapperAttached { .. } => "YieldWrapperAttached",
            Event::LiquidityReserveSet { .. } => "LiquidityReserveSet",
            Event::AutomationAgentChanged { .. } => "AutomationAgentChanged",
            Event::MarketOpened { .. } => "MarketOpened",
            Event::YieldDeposited { .. } => "YieldDeposited",
            Event::YieldWithdrawn { .. } => "YieldWithdrawn",
        }
    }

    /// Order the event relates to, if any
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            Event::OrderCreated { id, .. }
            | Event::OrderCancelled { id, .. }
            | Event::CycleExecuted { id, .. }
            | Event::OrderCompleted { id }
            | Event::ResidualRefunded { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Currency the event relates to, if it is currency-scoped
    pub fn currency(&self) -> Option<&CurrencyId> {
        match self {
            Event::RefundDeferred { currency, .. }
            | Event::RefundClaimed { currency, .. }
            | Event::CurrencyDefined { currency, .. }
            | Event::YieldWrapperAttached { currency, .. }
            | Event::LiquidityReserveSet { currency, .. }
            | Event::YieldDeposited { currency, .. }
            | Event::YieldWithdrawn { currency, .. } => Some(currency),
            Event::OrderCreated {
                source_currency, ..
            } => Some(source_currency),
            _ => None,
        }
    }
}

/// Append-only event log.
///
/// This is a simple wrapper around Vec<Event> with convenience queries.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Events for a specific order
    pub fn events_for_order(&self, id: OrderId) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.order_id() == Some(id))
            .collect()
    }

    /// Events scoped to a specific currency
    pub fn events_for_currency(&self, currency: &CurrencyId) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.currency() == Some(currency))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(id: OrderId) -> Event {
        Event::OrderCreated {
            id,
            owner: AccountId::new("alice"),
            source_currency: CurrencyId::new("ETH"),
            target_currency: CurrencyId::new("DAI"),
            contribution: 5,
            interval_seconds: 3_600,
            total_cycles: 3,
        }
    }

    #[test]
    fn test_event_accessors() {
        let event = created(9);
        assert_eq!(event.event_type(), "OrderCreated");
        assert_eq!(event.order_id(), Some(9));
        assert_eq!(event.currency(), Some(&CurrencyId::new("ETH")));

        let agent = Event::AutomationAgentChanged { agent: None };
        assert_eq!(agent.order_id(), None);
        assert_eq!(agent.currency(), None);
    }

    #[test]
    fn test_event_log_queries() {
        let mut log = EventLog::new();
        log.log(created(1));
        log.log(created(2));
        log.log(Event::CycleExecuted {
            id: 1,
            cycle_index: 1,
            amount_in: 5,
            amount_out: 900,
        });

        assert_eq!(log.len(), 3);
        assert_eq!(log.events_of_type("OrderCreated").len(), 2);
        assert_eq!(log.events_for_order(1).len(), 2);
        assert_eq!(log.events_for_currency(&CurrencyId::new("ETH")).len(), 2);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(Event::OrderCompleted { id: 4 }).unwrap();
        assert_eq!(json["type"], "OrderCompleted");
        assert_eq!(json["id"], 4);
    }
}
