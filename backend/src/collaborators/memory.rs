//! In-memory collaborators
//!
//! Deterministic stand-ins for the AMM, the yield wrapper and the funds
//! substrate. Each one can be told to fail so that failure isolation can be
//! exercised.

use super::{
    AmmExchange, FundsTransfer, SwapError, SwapRequest, TransferError, YieldError, YieldWrapper,
};
use crate::core::{AccountId, Amount, CurrencyId, MarketRef, WrapperRef};
use std::collections::{HashMap, HashSet};

/// Fixed-rate market for one target token
#[derive(Debug, Clone, PartialEq, Eq)]
struct Market {
    market: MarketRef,
    /// Output = amount_in * rate_num / rate_den
    rate_num: Amount,
    rate_den: Amount,
}

/// Output delivered by a swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub recipient: AccountId,
    pub currency_in: CurrencyId,
    pub currency_out: CurrencyId,
    pub amount_in: Amount,
    pub amount_out: Amount,
}

/// Fixed-rate AMM
///
/// # Example
/// ```
/// use dca_engine_core_rs::collaborators::{AmmExchange, InMemoryAmm, SwapRequest};
/// use dca_engine_core_rs::core::{AccountId, CurrencyId};
///
/// let mut amm = InMemoryAmm::new();
/// let dai = CurrencyId::new("DAI");
/// let market = amm.create_market(&dai).unwrap();
/// amm.set_rate(&dai, 2_000, 1).unwrap();
///
/// let out = amm
///     .swap_exact_input(SwapRequest {
///         market: &market,
///         currency_in: &CurrencyId::new("ETH"),
///         amount_in: 3,
///         min_amount_out: 0,
///         deadline: u64::MAX,
///         recipient: &AccountId::new("alice"),
///     })
///     .unwrap();
/// assert_eq!(out, 6_000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryAmm {
    markets: HashMap<CurrencyId, Market>,
    failing: bool,
    payouts: Vec<Payout>,
}

impl InMemoryAmm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output rate of an existing market
    pub fn set_rate(
        &mut self,
        token: &CurrencyId,
        rate_num: Amount,
        rate_den: Amount,
    ) -> Result<(), SwapError> {
        if rate_num < 0 || rate_den <= 0 {
            return Err(SwapError::Rejected(format!(
                "invalid rate {}/{}",
                rate_num, rate_den
            )));
        }
        let market = self
            .markets
            .get_mut(token)
            .ok_or_else(|| SwapError::MarketNotFound(token.clone()))?;
        market.rate_num = rate_num;
        market.rate_den = rate_den;
        Ok(())
    }

    /// While failing, every swap is rejected
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    pub fn payouts(&self) -> &[Payout] {
        &self.payouts
    }

    /// Total `currency_out` delivered to `recipient`
    pub fn delivered_to(&self, recipient: &AccountId, currency_out: &CurrencyId) -> Amount {
        self.payouts
            .iter()
            .filter(|p| &p.recipient == recipient && &p.currency_out == currency_out)
            .map(|p| p.amount_out)
            .sum()
    }
}

impl AmmExchange for InMemoryAmm {
    fn create_market(&mut self, token: &CurrencyId) -> Result<MarketRef, SwapError> {
        let market = self
            .markets
            .entry(token.clone())
            .or_insert_with(|| Market {
                market: MarketRef::new(format!("amm:{}", token)),
                rate_num: 1,
                rate_den: 1,
            });
        Ok(market.market.clone())
    }

    fn get_market(&self, token: &CurrencyId) -> Option<MarketRef> {
        self.markets.get(token).map(|m| m.market.clone())
    }

    fn swap_exact_input(&mut self, request: SwapRequest<'_>) -> Result<Amount, SwapError> {
        if self.failing {
            return Err(SwapError::Rejected("exchange unavailable".to_string()));
        }
        let (token, market) = self
            .markets
            .iter()
            .find(|(_, m)| &m.market == request.market)
            .ok_or_else(|| SwapError::Rejected(format!("unknown market {}", request.market)))?;

        let amount_out = request.amount_in * market.rate_num / market.rate_den;
        if amount_out < request.min_amount_out {
            return Err(SwapError::SlippageExceeded {
                min: request.min_amount_out,
                actual: amount_out,
            });
        }

        let payout = Payout {
            recipient: request.recipient.clone(),
            currency_in: request.currency_in.clone(),
            currency_out: token.clone(),
            amount_in: request.amount_in,
            amount_out,
        };
        self.payouts.push(payout);
        Ok(amount_out)
    }
}

/// Interest-bearing wrapper holding principal per (wrapper, currency)
///
/// Interest added with [`accrue`](Self::accrue) is paid out together with
/// the next withdrawal from the same pool.
#[derive(Debug, Clone, Default)]
pub struct InMemoryYieldWrapper {
    principal: HashMap<(WrapperRef, CurrencyId), Amount>,
    interest: HashMap<(WrapperRef, CurrencyId), Amount>,
    redemption_limit: Option<Amount>,
    deposits_failing: bool,
}

impl InMemoryYieldWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap any single withdrawal; `None` removes the cap
    pub fn set_redemption_limit(&mut self, limit: Option<Amount>) {
        self.redemption_limit = limit;
    }

    pub fn set_deposits_failing(&mut self, failing: bool) {
        self.deposits_failing = failing;
    }

    pub fn accrue(&mut self, wrapper: &WrapperRef, currency: &CurrencyId, interest: Amount) {
        *self
            .interest
            .entry((wrapper.clone(), currency.clone()))
            .or_insert(0) += interest;
    }

    pub fn principal(&self, wrapper: &WrapperRef, currency: &CurrencyId) -> Amount {
        self.principal
            .get(&(wrapper.clone(), currency.clone()))
            .copied()
            .unwrap_or(0)
    }
}

impl YieldWrapper for InMemoryYieldWrapper {
    fn deposit(
        &mut self,
        wrapper: &WrapperRef,
        currency: &CurrencyId,
        amount: Amount,
    ) -> Result<(), YieldError> {
        if self.deposits_failing {
            return Err(YieldError::Rejected("market paused".to_string()));
        }
        *self
            .principal
            .entry((wrapper.clone(), currency.clone()))
            .or_insert(0) += amount;
        Ok(())
    }

    fn withdraw(
        &mut self,
        wrapper: &WrapperRef,
        currency: &CurrencyId,
        amount: Amount,
    ) -> Result<Amount, YieldError> {
        let key = (wrapper.clone(), currency.clone());
        let available = self.principal.get(&key).copied().unwrap_or(0);
        let limit = self.redemption_limit.unwrap_or(available).min(available);
        if amount > limit {
            return Err(YieldError::RedemptionLimit {
                requested: amount,
                available: limit,
            });
        }
        self.principal.insert(key.clone(), available - amount);
        let interest = self.interest.remove(&key).unwrap_or(0);
        Ok(amount + interest)
    }
}

/// Wrapper used when no currency earns yield; every call is rejected
#[derive(Debug, Clone, Copy, Default)]
pub struct NoYieldWrapper;

impl YieldWrapper for NoYieldWrapper {
    fn deposit(
        &mut self,
        wrapper: &WrapperRef,
        _currency: &CurrencyId,
        _amount: Amount,
    ) -> Result<(), YieldError> {
        Err(YieldError::Rejected(format!("no yield wrapper backs {}", wrapper)))
    }

    fn withdraw(
        &mut self,
        wrapper: &WrapperRef,
        _currency: &CurrencyId,
        _amount: Amount,
    ) -> Result<Amount, YieldError> {
        Err(YieldError::Rejected(format!("no yield wrapper backs {}", wrapper)))
    }
}

/// Wallet ledger standing in for the funds substrate
#[derive(Debug, Clone, Default)]
pub struct InMemoryFunds {
    wallets: HashMap<(AccountId, CurrencyId), Amount>,
    frozen: HashSet<AccountId>,
}

impl InMemoryFunds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account outside the engine
    pub fn fund(&mut self, account: &AccountId, currency: &CurrencyId, amount: Amount) {
        *self
            .wallets
            .entry((account.clone(), currency.clone()))
            .or_insert(0) += amount;
    }

    pub fn balance(&self, account: &AccountId, currency: &CurrencyId) -> Amount {
        self.wallets
            .get(&(account.clone(), currency.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// A frozen account can neither send nor receive
    pub fn set_frozen(&mut self, account: &AccountId, frozen: bool) {
        if frozen {
            self.frozen.insert(account.clone());
        } else {
            self.frozen.remove(account);
        }
    }
}

impl FundsTransfer for InMemoryFunds {
    fn receive(
        &mut self,
        from: &AccountId,
        currency: &CurrencyId,
        declared: Amount,
    ) -> Result<(), TransferError> {
        if self.frozen.contains(from) {
            return Err(TransferError::Rejected(format!("{} is frozen", from)));
        }
        let available = self.balance(from, currency);
        if available < declared {
            return Err(TransferError::InsufficientFunds {
                required: declared,
                available,
            });
        }
        self.wallets
            .insert((from.clone(), currency.clone()), available - declared);
        Ok(())
    }

    fn send(
        &mut self,
        to: &AccountId,
        currency: &CurrencyId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        if self.frozen.contains(to) {
            return Err(TransferError::Rejected(format!("{} is frozen", to)));
        }
        self.fund(to, currency, amount);
        Ok(())
    }
}
