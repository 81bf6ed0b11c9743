//! Order book engine
//!
//! Owns every piece of engine state and the external collaborators, and
//! exposes the public operations:
//! - Administration (currencies, yield wrappers, automation agent, markets)
//! - Order lifecycle (create, cancel, claim deferred refunds)
//! - Due-conversion passes (automation agent or admin)
//! - Queries and enumeration
//!
//! # Atomicity
//!
//! Operations are serialized through `&mut self`. Each one either commits all
//! of its state changes and events or none of them. Internal state is booked
//! before any collaborator is called and reverted if that call fails.
//!
//! # Example
//!
//! ```rust
//! use dca_engine_core_rs::collaborators::{AmmExchange, InMemoryAmm, InMemoryFunds, NoYieldWrapper};
//! use dca_engine_core_rs::core::{AccountId, CurrencyId, ManualClock};
//! use dca_engine_core_rs::{DcaEngine, EngineConfig, OrderRequest, OrderStatus};
//!
//! let admin = AccountId::new("owner");
//! let alice = AccountId::new("alice");
//! let eth = CurrencyId::new("ETH");
//!
//! let mut funds = InMemoryFunds::new();
//! funds.fund(&alice, &eth, 100);
//! let mut amm = InMemoryAmm::new();
//! amm.create_market(&CurrencyId::new("DAI")).unwrap();
//!
//! let mut engine = DcaEngine::new(
//!     EngineConfig::new("owner"),
//!     amm,
//!     NoYieldWrapper,
//!     funds,
//!     ManualClock::new(1_000),
//! )
//! .unwrap();
//!
//! engine.define_currency(&admin, eth.clone(), 1, 50).unwrap();
//! let id = engine
//!     .create_order(&alice, OrderRequest::new("ETH", "DAI", 5, 3_600, 3, 5))
//!     .unwrap()
//!     .value;
//!
//! let report = engine.execute_due_conversions(&admin).unwrap().value;
//! assert_eq!(report.num_executed(), 1);
//! assert_eq!(engine.get_order(id).unwrap().status(), OrderStatus::Completed);
//! ```

use super::checkpoint::{compute_config_hash, validate_snapshot, EngineSnapshot, RefundSnapshot};
use super::config::EngineConfig;
use crate::access::AccessControl;
use crate::collaborators::{AmmExchange, FundsTransfer, YieldWrapper};
use crate::core::{AccountId, Amount, Clock, CurrencyId, MarketRef, OrderId, WrapperRef};
use crate::error::{EngineError, EngineResult};
use crate::ledger::{OrderLedger, PendingRefunds};
use crate::models::{CurrencyConfig, Event, EventLog, Order, OrderRequest};
use crate::registry::CurrencyRegistry;
use crate::scheduler::{PassContext, PassOptions, PassReport};
use crate::yield_coord;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Value returned by a mutating operation plus the events it emitted
#[derive(Debug, Clone)]
pub struct Receipt<T> {
    pub value: T,

    /// Events in emission order; also appended to the engine's event log
    pub events: Vec<Event>,

    /// Non-fatal follow-up failures (e.g. an automatic surplus deposit that
    /// the yield wrapper refused). The operation itself committed.
    pub warnings: Vec<EngineError>,
}

impl<T> Receipt<T> {
    fn new(value: T, events: Vec<Event>) -> Self {
        Self {
            value,
            events,
            warnings: Vec::new(),
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Recurring conversion engine
///
/// Generic over its collaborators so that callers keep typed access to them
/// (`amm_mut`, `funds_mut`, ...).
pub struct DcaEngine<A, Y, F> {
    config: EngineConfig,
    access: AccessControl,
    registry: CurrencyRegistry,
    ledger: OrderLedger,
    pending_refunds: PendingRefunds,
    amm: A,
    yield_wrapper: Y,
    funds: F,
    clock: Box<dyn Clock>,
    event_log: EventLog,
}

impl<A, Y, F> DcaEngine<A, Y, F>
where
    A: AmmExchange,
    Y: YieldWrapper,
    F: FundsTransfer,
{
    /// Create an empty engine
    ///
    /// # Returns
    ///
    /// * `Ok(DcaEngine)` - engine with no currencies and no orders
    /// * `Err(EngineError::InvalidConfig)` - configuration validation failed
    pub fn new(
        config: EngineConfig,
        amm: A,
        yield_wrapper: Y,
        funds: F,
        clock: impl Clock + 'static,
    ) -> EngineResult<Self> {
        config.validate()?;

        let mut access = AccessControl::new(config.admin.clone());
        if let Some(agent) = &config.automation_agent {
            access.set_automation_agent(&config.admin, Some(agent.clone()))?;
        }

        info!(admin = %config.admin, "order book engine initialized");
        Ok(Self {
            config,
            access,
            registry: CurrencyRegistry::new(),
            ledger: OrderLedger::new(),
            pending_refunds: PendingRefunds::new(),
            amm,
            yield_wrapper,
            funds,
            clock: Box::new(clock),
            event_log: EventLog::new(),
        })
    }

    /// Rebuild an engine from a checkpoint taken with the same config
    pub fn restore(
        config: EngineConfig,
        snapshot: EngineSnapshot,
        amm: A,
        yield_wrapper: Y,
        funds: F,
        clock: impl Clock + 'static,
    ) -> EngineResult<Self> {
        config.validate()?;
        let expected = compute_config_hash(&config)?;
        if snapshot.config_hash != expected {
            return Err(EngineError::SnapshotMismatch {
                expected,
                found: snapshot.config_hash,
            });
        }
        validate_snapshot(&snapshot)?;

        let mut access = AccessControl::new(config.admin.clone());
        access.set_automation_agent(&config.admin, snapshot.automation_agent)?;

        let pending_refunds = PendingRefunds::from_entries(
            snapshot
                .pending_refunds
                .into_iter()
                .map(|r| (r.owner, r.currency, r.amount)),
        );

        info!(
            orders = snapshot.orders.len(),
            taken_at = snapshot.taken_at,
            "order book engine restored"
        );
        Ok(Self {
            config,
            access,
            registry: CurrencyRegistry::from_configs(snapshot.currencies),
            ledger: OrderLedger::from_orders(snapshot.orders, snapshot.next_order_id),
            pending_refunds,
            amm,
            yield_wrapper,
            funds,
            clock: Box::new(clock),
            event_log: EventLog::new(),
        })
    }

    /// Capture all engine state (collaborators and event log excluded)
    pub fn snapshot(&self) -> EngineResult<EngineSnapshot> {
        Ok(EngineSnapshot {
            taken_at: self.clock.now(),
            config_hash: compute_config_hash(&self.config)?,
            automation_agent: self.access.automation_agent().cloned(),
            next_order_id: self.ledger.next_id(),
            orders: self.ledger.orders().cloned().collect(),
            currencies: self.registry.currencies().cloned().collect(),
            pending_refunds: self
                .pending_refunds
                .entries()
                .map(|(owner, currency, amount)| RefundSnapshot {
                    owner: owner.clone(),
                    currency: currency.clone(),
                    amount,
                })
                .collect(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn admin(&self) -> &AccountId {
        self.access.admin()
    }

    pub fn automation_agent(&self) -> Option<&AccountId> {
        self.access.automation_agent()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn amm(&self) -> &A {
        &self.amm
    }

    pub fn amm_mut(&mut self) -> &mut A {
        &mut self.amm
    }

    pub fn yield_wrapper(&self) -> &Y {
        &self.yield_wrapper
    }

    pub fn yield_wrapper_mut(&mut self) -> &mut Y {
        &mut self.yield_wrapper
    }

    pub fn funds(&self) -> &F {
        &self.funds
    }

    pub fn funds_mut(&mut self) -> &mut F {
        &mut self.funds
    }

    fn commit<T>(&mut self, receipt: Receipt<T>) -> Receipt<T> {
        self.event_log.extend(receipt.events.iter().cloned());
        receipt
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// Create or overwrite the accepted contribution range of a currency
    pub fn define_currency(
        &mut self,
        caller: &AccountId,
        currency: CurrencyId,
        min_contribution: Amount,
        max_contribution: Amount,
    ) -> EngineResult<Receipt<()>> {
        self.access.require_admin(caller, "define currencies")?;
        self.registry
            .define(currency.clone(), min_contribution, max_contribution)?;

        info!(%currency, min_contribution, max_contribution, "currency defined");
        let events = vec![Event::CurrencyDefined {
            currency,
            min_contribution,
            max_contribution,
        }];
        Ok(self.commit(Receipt::new((), events)))
    }

    /// Associate a yield wrapper with an already-defined currency
    pub fn attach_yield_wrapper(
        &mut self,
        caller: &AccountId,
        currency: &CurrencyId,
        wrapper: WrapperRef,
    ) -> EngineResult<Receipt<()>> {
        self.access.require_admin(caller, "attach yield wrappers")?;
        self.registry.attach_yield_wrapper(currency, wrapper.clone())?;

        info!(%currency, %wrapper, "yield wrapper attached");
        let events = vec![Event::YieldWrapperAttached {
            currency: currency.clone(),
            wrapper,
        }];
        Ok(self.commit(Receipt::new((), events)))
    }

    /// Liquid balance kept on top of the next cycle of every active order
    pub fn set_liquidity_reserve(
        &mut self,
        caller: &AccountId,
        currency: &CurrencyId,
        reserve: Amount,
    ) -> EngineResult<Receipt<()>> {
        self.access.require_admin(caller, "set liquidity reserves")?;
        self.registry.set_liquidity_reserve(currency, reserve)?;

        info!(%currency, reserve, "liquidity reserve set");
        let events = vec![Event::LiquidityReserveSet {
            currency: currency.clone(),
            reserve,
        }];
        Ok(self.commit(Receipt::new((), events)))
    }

    /// Replace the automation agent; `None` disables automated execution
    pub fn set_automation_agent(
        &mut self,
        caller: &AccountId,
        agent: Option<AccountId>,
    ) -> EngineResult<Receipt<()>> {
        self.access.set_automation_agent(caller, agent.clone())?;

        info!(agent = ?agent, "automation agent changed");
        let events = vec![Event::AutomationAgentChanged { agent }];
        Ok(self.commit(Receipt::new((), events)))
    }

    /// Make sure the AMM has a market for `token`, creating one if needed
    pub fn open_market(
        &mut self,
        caller: &AccountId,
        token: &CurrencyId,
    ) -> EngineResult<Receipt<MarketRef>> {
        self.access.require_admin(caller, "open markets")?;
        if let Some(market) = self.amm.get_market(token) {
            return Ok(Receipt::new(market, Vec::new()));
        }

        let market = self
            .amm
            .create_market(token)
            .map_err(|e| EngineError::MarketUnavailable {
                token: token.clone(),
                reason: e.to_string(),
            })?;

        info!(%token, %market, "market opened");
        let events = vec![Event::MarketOpened {
            token: token.clone(),
            market: market.clone(),
        }];
        Ok(self.commit(Receipt::new(market, events)))
    }

    /// Move liquid escrow above the currency's target into its yield wrapper
    ///
    /// Callable by the admin or the automation agent. Returns the amount
    /// deposited; 0 when there is no wrapper or no surplus.
    pub fn deposit_surplus(
        &mut self,
        caller: &AccountId,
        currency: &CurrencyId,
    ) -> EngineResult<Receipt<Amount>> {
        self.access
            .require_automation_agent(caller, "deposit surplus escrow")?;
        let mut events = Vec::new();
        let deposited = self.deposit_surplus_unchecked(currency, &mut events)?;
        Ok(self.commit(Receipt::new(deposited, events)))
    }

    fn deposit_surplus_unchecked(
        &mut self,
        currency: &CurrencyId,
        events: &mut Vec<Event>,
    ) -> EngineResult<Amount> {
        let upcoming_need = self.ledger.active_contributions(currency);
        let config = self.registry.get_mut(currency)?;
        yield_coord::deposit_surplus(config, &mut self.yield_wrapper, upcoming_need, events)
    }

    // ========================================================================
    // Order Lifecycle
    // ========================================================================

    /// Create and fund a new order owned by `caller`
    ///
    /// # Errors
    ///
    /// * `CurrencyNotAccepted` - source currency undefined, or contribution
    ///   outside its range (or not positive)
    /// * `InvalidSchedule` - zero interval or zero cycles
    /// * `InsufficientFunding` - deposit below one contribution
    /// * `InvalidRange` - negative minimum output
    /// * `TransferFailed` - the funds substrate refused the deposit, or the
    ///   currency's escrow totals cannot hold it
    pub fn create_order(
        &mut self,
        caller: &AccountId,
        request: OrderRequest,
    ) -> EngineResult<Receipt<OrderId>> {
        let source = request.source_currency.clone();
        if request.contribution <= 0 || !self.registry.is_accepted(&source, request.contribution)
        {
            return Err(EngineError::CurrencyNotAccepted {
                currency: source,
                amount: request.contribution,
            });
        }
        if request.interval_seconds == 0 {
            return Err(EngineError::InvalidSchedule(
                "interval_seconds must be > 0".to_string(),
            ));
        }
        if request.total_cycles == 0 {
            return Err(EngineError::InvalidSchedule(
                "total_cycles must be > 0".to_string(),
            ));
        }
        if request.deposit <= 0 || request.deposit < request.contribution {
            return Err(EngineError::InsufficientFunding {
                deposited: request.deposit,
                contribution: request.contribution,
            });
        }
        if request.min_output_per_cycle < 0 {
            return Err(EngineError::InvalidRange {
                min: request.min_output_per_cycle,
                max: request.min_output_per_cycle,
            });
        }

        // Book escrow first, then pull the funds
        if self
            .registry
            .get_mut(&source)?
            .try_escrow_in(request.deposit)
            .is_none()
        {
            warn!(%source, deposit = request.deposit, "deposit exceeds escrow capacity");
            return Err(EngineError::TransferFailed {
                currency: source,
                amount: request.deposit,
                reason: "escrow capacity exceeded".to_string(),
            });
        }
        let id = self.ledger.insert(caller.clone(), &request);

        if let Err(e) = self.funds.receive(caller, &source, request.deposit) {
            self.ledger.revert_insert(id);
            self.registry.get_mut(&source)?.escrow_out(request.deposit);
            return Err(EngineError::TransferFailed {
                currency: source,
                amount: request.deposit,
                reason: e.to_string(),
            });
        }

        info!(
            order_id = id,
            owner = %caller,
            %source,
            target = %request.target_currency,
            contribution = request.contribution,
            deposit = request.deposit,
            "order created"
        );
        let mut events = vec![Event::OrderCreated {
            id,
            owner: caller.clone(),
            source_currency: source.clone(),
            target_currency: request.target_currency.clone(),
            contribution: request.contribution,
            interval_seconds: request.interval_seconds,
            total_cycles: request.total_cycles,
        }];

        let mut warnings = Vec::new();
        if self.config.auto_deposit_surplus {
            if let Err(e) = self.deposit_surplus_unchecked(&source, &mut events) {
                warn!(order_id = id, error = %e, "automatic surplus deposit failed");
                warnings.push(e);
            }
        }

        let mut receipt = Receipt::new(id, events);
        receipt.warnings = warnings;
        Ok(self.commit(receipt))
    }

    /// Cancel an active order and refund its remaining escrow to the owner
    ///
    /// Returns the refunded amount.
    pub fn cancel_order(
        &mut self,
        caller: &AccountId,
        id: OrderId,
    ) -> EngineResult<Receipt<Amount>> {
        let order = self.ledger.get(id)?.clone();
        if order.owner() != caller {
            return Err(EngineError::Unauthorized {
                caller: caller.clone(),
                action: "cancel another owner's order",
            });
        }
        if !order.is_active() {
            return Err(EngineError::AlreadyTerminal(id));
        }

        let source = order.source_currency().clone();
        let refund = order.remaining_balance();
        let mut events = Vec::new();

        let config = self.registry.get_mut(&source)?;
        if let Err(e) =
            yield_coord::ensure_liquid(config, &mut self.yield_wrapper, refund, &mut events)
        {
            // Withdrawals that did happen are still reported
            self.event_log.extend(events);
            return Err(e);
        }

        self.ledger.get_mut(id)?.cancel();
        self.registry.get_mut(&source)?.escrow_out(refund);

        if let Err(e) = self.funds.send(caller, &source, refund) {
            self.ledger.restore(order);
            self.registry.get_mut(&source)?.escrow_in(refund);
            self.event_log.extend(events);
            return Err(EngineError::TransferFailed {
                currency: source,
                amount: refund,
                reason: e.to_string(),
            });
        }

        info!(order_id = id, refund, "order cancelled");
        events.push(Event::OrderCancelled {
            id,
            refunded_amount: refund,
        });
        Ok(self.commit(Receipt::new(refund, events)))
    }

    /// Pay out refunds that were parked after a failed transfer
    ///
    /// Parked refunds are paid from custody first; any part still held as
    /// earmarked yield-wrapper principal is redeemed before the transfer.
    /// The claim is all-or-nothing: on failure the full amount stays parked.
    pub fn claim_pending_refund(
        &mut self,
        caller: &AccountId,
        currency: &CurrencyId,
    ) -> EngineResult<Receipt<Amount>> {
        let owed_in_currency = self.pending_refunds.total_for_currency(currency);
        let earmarked = self
            .registry
            .get(currency)
            .map(|c| c.refund_principal())
            .unwrap_or(0);
        let amount = self
            .pending_refunds
            .take(caller, currency)
            .ok_or_else(|| EngineError::NoPendingRefund {
                owner: caller.clone(),
                currency: currency.clone(),
            })?;

        let mut events = Vec::new();
        let from_wrapper = (amount - (owed_in_currency - earmarked)).max(0);
        if from_wrapper > 0 {
            let redeemed = match self.registry.get_mut(currency) {
                Ok(config) => yield_coord::redeem_refund_principal(
                    config,
                    &mut self.yield_wrapper,
                    from_wrapper,
                    &mut events,
                ),
                Err(e) => Err(e),
            };
            let shortfall = match redeemed {
                Ok(redeemed) if redeemed == from_wrapper => None,
                Ok(redeemed) => Some(EngineError::YieldWithdrawalFailed {
                    currency: currency.clone(),
                    reason: format!("wrapper returned {} of {}", redeemed, from_wrapper),
                }),
                Err(e) => Some(e),
            };
            if let Some(e) = shortfall {
                self.pending_refunds.credit(caller, currency, amount);
                self.event_log.extend(events);
                return Err(e);
            }
        }

        if let Err(e) = self.funds.send(caller, currency, amount) {
            // Anything redeemed above now waits in custody
            self.pending_refunds.credit(caller, currency, amount);
            self.event_log.extend(events);
            return Err(EngineError::TransferFailed {
                currency: currency.clone(),
                amount,
                reason: e.to_string(),
            });
        }

        info!(owner = %caller, %currency, amount, from_wrapper, "pending refund claimed");
        events.push(Event::RefundClaimed {
            owner: caller.clone(),
            currency: currency.clone(),
            amount,
        });
        Ok(self.commit(Receipt::new(amount, events)))
    }

    // ========================================================================
    // Conversion Passes
    // ========================================================================

    /// Run one pass over all active orders with the configured limits
    pub fn execute_due_conversions(
        &mut self,
        caller: &AccountId,
    ) -> EngineResult<Receipt<PassReport>> {
        let options = self.config.pass_options();
        self.execute_due_conversions_with(caller, options)
    }

    /// Run one pass with explicit limits
    ///
    /// Only the automation agent or the admin may call this. Per-order
    /// failures do not fail the pass; they are listed in the report.
    pub fn execute_due_conversions_with(
        &mut self,
        caller: &AccountId,
        options: PassOptions,
    ) -> EngineResult<Receipt<PassReport>> {
        self.access
            .require_automation_agent(caller, "execute due conversions")?;

        let now = self.clock.now();
        let mut events = Vec::new();
        let mut report = PassContext {
            ledger: &mut self.ledger,
            registry: &mut self.registry,
            pending_refunds: &mut self.pending_refunds,
            amm: &mut self.amm,
            yield_wrapper: &mut self.yield_wrapper,
            funds: &mut self.funds,
            now,
            swap_deadline_secs: self.config.swap_deadline_secs,
        }
        .execute_due(options, &mut events);

        if self.config.auto_deposit_surplus {
            let touched: BTreeSet<CurrencyId> = report
                .executed
                .iter()
                .filter_map(|c| self.ledger.get(c.order_id).ok())
                .map(|order| order.source_currency().clone())
                .collect();
            for currency in touched {
                if let Err(e) = self.deposit_surplus_unchecked(&currency, &mut events) {
                    warn!(%currency, error = %e, "post-pass surplus deposit failed");
                    report.rebalance_failures.push(e);
                }
            }
        }

        Ok(self.commit(Receipt::new(report, events)))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_order(&self, id: OrderId) -> EngineResult<&Order> {
        self.ledger.get(id)
    }

    pub fn order_count_for_owner(&self, owner: &AccountId) -> usize {
        self.ledger.count_for_owner(owner)
    }

    /// The `index`-th order created by `owner`, in creation order
    pub fn order_at_index(&self, owner: &AccountId, index: usize) -> EngineResult<&Order> {
        self.ledger.order_at_index(owner, index)
    }

    pub fn orders_for_owner(&self, owner: &AccountId) -> Vec<&Order> {
        self.ledger.orders_for_owner(owner)
    }

    pub fn active_order_count(&self) -> usize {
        self.ledger.active_count()
    }

    pub fn is_accepted(&self, currency: &CurrencyId, amount: Amount) -> bool {
        self.registry.is_accepted(currency, amount)
    }

    pub fn currency_config(&self, currency: &CurrencyId) -> EngineResult<&CurrencyConfig> {
        self.registry.get(currency)
    }

    pub fn pending_refund(&self, owner: &AccountId, currency: &CurrencyId) -> Amount {
        self.pending_refunds.get(owner, currency)
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &CurrencyRegistry {
        &self.registry
    }
}
