//! Refunds parked after a failed transfer
//!
//! When a residual refund cannot be delivered, the amount leaves the order's
//! escrow and waits here until the owner claims it. Part of what is owed in a
//! currency may still sit in its yield wrapper; see
//! [`CurrencyConfig::refund_principal`](crate::models::CurrencyConfig::refund_principal).

use crate::core::{AccountId, Amount, CurrencyId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingRefunds {
    owed: BTreeMap<(AccountId, CurrencyId), Amount>,
}

impl PendingRefunds {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(
        entries: impl IntoIterator<Item = (AccountId, CurrencyId, Amount)>,
    ) -> Self {
        let mut refunds = Self::new();
        for (owner, currency, amount) in entries {
            refunds.credit(&owner, &currency, amount);
        }
        refunds
    }

    pub(crate) fn credit(&mut self, owner: &AccountId, currency: &CurrencyId, amount: Amount) {
        *self
            .owed
            .entry((owner.clone(), currency.clone()))
            .or_insert(0) += amount;
    }

    /// Remove and return everything owed to `owner` in `currency`
    pub(crate) fn take(&mut self, owner: &AccountId, currency: &CurrencyId) -> Option<Amount> {
        self.owed.remove(&(owner.clone(), currency.clone()))
    }

    pub fn get(&self, owner: &AccountId, currency: &CurrencyId) -> Amount {
        self.owed
            .get(&(owner.clone(), currency.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Everything owed in `currency`, across owners
    pub fn total_for_currency(&self, currency: &CurrencyId) -> Amount {
        self.owed
            .iter()
            .filter(|((_, c), _)| c == currency)
            .map(|(_, amount)| *amount)
            .sum()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&AccountId, &CurrencyId, Amount)> {
        self.owed
            .iter()
            .map(|((owner, currency), amount)| (owner, currency, *amount))
    }

    pub fn is_empty(&self) -> bool {
        self.owed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_accumulates_and_take_clears() {
        let mut refunds = PendingRefunds::new();
        let alice = AccountId::new("alice");
        let eth = CurrencyId::new("ETH");

        refunds.credit(&alice, &eth, 3);
        refunds.credit(&alice, &eth, 2);
        assert_eq!(refunds.get(&alice, &eth), 5);

        assert_eq!(refunds.take(&alice, &eth), Some(5));
        assert_eq!(refunds.take(&alice, &eth), None);
        assert!(refunds.is_empty());
    }

    #[test]
    fn test_total_for_currency_spans_owners() {
        let mut refunds = PendingRefunds::new();
        let eth = CurrencyId::new("ETH");
        refunds.credit(&AccountId::new("alice"), &eth, 3);
        refunds.credit(&AccountId::new("bob"), &eth, 4);
        refunds.credit(&AccountId::new("bob"), &CurrencyId::new("DAI"), 50);

        assert_eq!(refunds.total_for_currency(&eth), 7);
        assert_eq!(refunds.total_for_currency(&CurrencyId::new("BTC")), 0);
    }
}
