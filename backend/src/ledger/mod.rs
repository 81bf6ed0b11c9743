//! Order ledger
//!
//! Owns the canonical set of orders and an owner → order-list index used for
//! enumeration.
//!
//! # Critical Invariants
//!
//! 1. **Sequential ids**: ids start at 1, increase by one per order and are
//!    never reused
//! 2. **Append-only index**: an owner's list preserves creation order and
//!    is never pruned; terminal orders stay queryable
//! 3. **Index validity**: every id in the owner index exists in `orders`

pub mod refunds;

pub use refunds::PendingRefunds;

use crate::core::{AccountId, Amount, CurrencyId, OrderId};
use crate::error::{EngineError, EngineResult};
use crate::models::{Order, OrderRequest};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct OrderLedger {
    orders: BTreeMap<OrderId, Order>,
    owner_index: HashMap<AccountId, Vec<OrderId>>,
    next_id: OrderId,
}

impl Default for OrderLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderLedger {
    pub fn new() -> Self {
        Self {
            orders: BTreeMap::new(),
            owner_index: HashMap::new(),
            next_id: 1,
        }
    }

    /// Rebuild a ledger from persisted orders
    ///
    /// The owner index is derived from ids, which are assigned in creation
    /// order.
    pub(crate) fn from_orders(orders: Vec<Order>, next_id: OrderId) -> Self {
        let mut ledger = Self {
            orders: BTreeMap::new(),
            owner_index: HashMap::new(),
            next_id,
        };
        for order in orders {
            ledger.orders.insert(order.id(), order);
        }
        for order in ledger.orders.values() {
            ledger
                .owner_index
                .entry(order.owner().clone())
                .or_default()
                .push(order.id());
        }
        ledger
    }

    /// Record a new active order for `owner` and return its id
    ///
    /// The request must already be validated.
    pub(crate) fn insert(&mut self, owner: AccountId, request: &OrderRequest) -> OrderId {
        let id = self.next_id;
        self.next_id += 1;
        self.orders.insert(id, Order::new(id, owner.clone(), request));
        self.owner_index.entry(owner).or_default().push(id);
        id
    }

    /// Undo the most recent `insert`
    pub(crate) fn revert_insert(&mut self, id: OrderId) {
        debug_assert_eq!(id + 1, self.next_id, "only the latest insert can be reverted");
        if let Some(order) = self.orders.remove(&id) {
            if let Some(ids) = self.owner_index.get_mut(order.owner()) {
                ids.pop();
                if ids.is_empty() {
                    self.owner_index.remove(order.owner());
                }
            }
            self.next_id = id;
        }
    }

    /// Put back a previously captured copy of an order
    pub(crate) fn restore(&mut self, order: Order) {
        self.orders.insert(order.id(), order);
    }

    pub fn get(&self, id: OrderId) -> EngineResult<&Order> {
        self.orders.get(&id).ok_or(EngineError::UnknownOrder(id))
    }

    pub(crate) fn get_mut(&mut self, id: OrderId) -> EngineResult<&mut Order> {
        self.orders.get_mut(&id).ok_or(EngineError::UnknownOrder(id))
    }

    pub fn count_for_owner(&self, owner: &AccountId) -> usize {
        self.owner_index.get(owner).map(Vec::len).unwrap_or(0)
    }

    /// The `index`-th order created by `owner` (0-based, creation order)
    pub fn order_at_index(&self, owner: &AccountId, index: usize) -> EngineResult<&Order> {
        let ids = self.owner_index.get(owner).map(Vec::as_slice).unwrap_or(&[]);
        let id = ids.get(index).ok_or_else(|| EngineError::IndexOutOfRange {
            owner: owner.clone(),
            index,
            count: ids.len(),
        })?;
        self.get(*id)
    }

    pub fn orders_for_owner(&self, owner: &AccountId) -> Vec<&Order> {
        self.owner_index
            .get(owner)
            .map(|ids| ids.iter().filter_map(|id| self.orders.get(id)).collect())
            .unwrap_or_default()
    }

    /// Ids of active orders in ascending id order
    pub fn active_ids(&self) -> Vec<OrderId> {
        self.orders
            .values()
            .filter(|order| order.is_active())
            .map(Order::id)
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.orders.values().filter(|order| order.is_active()).count()
    }

    /// Sum of contributions of active orders funded in `currency`
    pub fn active_contributions(&self, currency: &CurrencyId) -> Amount {
        self.orders
            .values()
            .filter(|order| order.is_active() && order.source_currency() == currency)
            .map(Order::contribution)
            .sum()
    }

    /// Remaining escrow per source currency, summed across all orders
    pub fn escrow_by_currency(&self) -> HashMap<CurrencyId, Amount> {
        let mut totals = HashMap::new();
        for order in self.orders.values() {
            *totals.entry(order.source_currency().clone()).or_insert(0) +=
                order.remaining_balance();
        }
        totals
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn next_id(&self) -> OrderId {
        self.next_id
    }
}
