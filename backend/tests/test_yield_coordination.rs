//! Yield Coordination Tests
//!
//! Surplus deposits, on-demand withdrawals and realized interest.
//!
//! Critical invariants tested:
//! - `liquid + deposited == aggregate_escrow` after every operation
//! - A refused wrapper call leaves accounting exactly as before
//! - Interest never inflates order escrow
//! - A redemption limit delays a final-cycle residual refund, never the
//!   conversion itself

use dca_engine_core_rs::collaborators::{
    AmmExchange, InMemoryAmm, InMemoryFunds, InMemoryYieldWrapper,
};
use dca_engine_core_rs::{
    AccountId, CurrencyId, DcaEngine, EngineConfig, EngineError, Event, ManualClock, OrderRequest,
    OrderStatus, WrapperRef,
};

type Engine = DcaEngine<InMemoryAmm, InMemoryYieldWrapper, InMemoryFunds>;

// ============================================================================
// Test Helpers
// ============================================================================

fn admin() -> AccountId {
    AccountId::new("owner")
}

fn keeper() -> AccountId {
    AccountId::new("keeper")
}

fn alice() -> AccountId {
    AccountId::new("alice")
}

fn eth() -> CurrencyId {
    CurrencyId::new("ETH")
}

fn ceth() -> WrapperRef {
    WrapperRef::new("cETH")
}

fn create_engine_with(config: EngineConfig, clock: &ManualClock) -> Engine {
    let mut funds = InMemoryFunds::new();
    funds.fund(&alice(), &eth(), 1_000);

    let mut amm = InMemoryAmm::new();
    amm.create_market(&CurrencyId::new("DAI")).unwrap();

    let mut engine = DcaEngine::new(
        config,
        amm,
        InMemoryYieldWrapper::new(),
        funds,
        clock.clone(),
    )
    .unwrap();
    engine.define_currency(&admin(), eth(), 1, 100).unwrap();
    engine.attach_yield_wrapper(&admin(), &eth(), ceth()).unwrap();
    engine
}

/// ETH engine with the cETH wrapper attached and `keeper` as agent
fn create_engine(clock: &ManualClock) -> Engine {
    let mut config = EngineConfig::new("owner");
    config.automation_agent = Some(keeper());
    create_engine_with(config, clock)
}

fn request(contribution: i128, cycles: u32, deposit: i128) -> OrderRequest {
    OrderRequest::new("ETH", "DAI", contribution, 3_600, cycles, deposit)
}

fn assert_balanced(engine: &Engine) {
    let config = engine.currency_config(&eth()).unwrap();
    assert!(
        config.is_balanced(),
        "liquid {} + deposited {} != escrow {}",
        config.liquid(),
        config.deposited(),
        config.aggregate_escrow()
    );
}

// ============================================================================
// Deposits
// ============================================================================

#[test]
fn test_surplus_above_next_cycle_is_deposited() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);
    engine.create_order(&alice(), request(10, 3, 30)).unwrap();

    let receipt = engine.deposit_surplus(&keeper(), &eth()).unwrap();

    assert_eq!(receipt.value, 20);
    assert_eq!(
        receipt.events,
        vec![Event::YieldDeposited {
            currency: eth(),
            amount: 20
        }]
    );
    let config = engine.currency_config(&eth()).unwrap();
    assert_eq!(config.liquid(), 10);
    assert_eq!(config.deposited(), 20);
    assert_eq!(config.aggregate_escrow(), 30);
    assert_eq!(engine.yield_wrapper().principal(&ceth(), &eth()), 20);

    // Nothing further to move
    assert_eq!(engine.deposit_surplus(&keeper(), &eth()).unwrap().value, 0);
}

#[test]
fn test_liquidity_reserve_stays_liquid() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);
    engine.create_order(&alice(), request(10, 3, 30)).unwrap();
    engine.set_liquidity_reserve(&admin(), &eth(), 5).unwrap();

    assert_eq!(engine.deposit_surplus(&admin(), &eth()).unwrap().value, 15);
    assert_eq!(engine.currency_config(&eth()).unwrap().liquid(), 15);
    assert!(matches!(
        engine.set_liquidity_reserve(&admin(), &eth(), -1),
        Err(EngineError::InvalidRange { .. })
    ));
}

#[test]
fn test_liquidity_reserve_change_is_logged() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);

    let receipt = engine.set_liquidity_reserve(&admin(), &eth(), 25).unwrap();

    let expected = Event::LiquidityReserveSet {
        currency: eth(),
        reserve: 25,
    };
    assert_eq!(receipt.events, vec![expected.clone()]);
    assert_eq!(
        engine.event_log().events_of_type("LiquidityReserveSet"),
        vec![&expected]
    );
    assert_eq!(engine.currency_config(&eth()).unwrap().liquidity_reserve(), 25);
}

#[test]
fn test_refused_deposit_leaves_accounting_unchanged() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);
    engine.create_order(&alice(), request(10, 3, 30)).unwrap();
    engine.yield_wrapper_mut().set_deposits_failing(true);

    let err = engine.deposit_surplus(&keeper(), &eth()).unwrap_err();

    assert!(matches!(err, EngineError::YieldDepositFailed { .. }));
    let config = engine.currency_config(&eth()).unwrap();
    assert_eq!(config.liquid(), 30);
    assert_eq!(config.deposited(), 0);
    assert!(engine.event_log().events_of_type("YieldDeposited").is_empty());
}

#[test]
fn test_deposit_surplus_requires_agent_or_admin() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);

    assert!(matches!(
        engine.deposit_surplus(&alice(), &eth()),
        Err(EngineError::Unauthorized { .. })
    ));
    assert!(matches!(
        engine.deposit_surplus(&keeper(), &CurrencyId::new("BTC")),
        Err(EngineError::UnknownCurrency(_))
    ));
}

#[test]
fn test_currency_without_wrapper_deposits_nothing() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);
    let btc = CurrencyId::new("BTC");
    engine.define_currency(&admin(), btc.clone(), 1, 10).unwrap();

    let receipt = engine.deposit_surplus(&admin(), &btc).unwrap();
    assert_eq!(receipt.value, 0);
    assert!(receipt.events.is_empty());
}

#[test]
fn test_auto_deposit_after_create() {
    let clock = ManualClock::new(1_000);
    let mut config = EngineConfig::new("owner");
    config.auto_deposit_surplus = true;
    let mut engine = create_engine_with(config, &clock);

    let receipt = engine.create_order(&alice(), request(10, 3, 30)).unwrap();

    assert_eq!(receipt.events.len(), 2);
    assert_eq!(receipt.events[0].event_type(), "OrderCreated");
    assert_eq!(
        receipt.events[1],
        Event::YieldDeposited {
            currency: eth(),
            amount: 20
        }
    );
    assert_balanced(&engine);
}

#[test]
fn test_auto_deposit_failure_is_a_warning() {
    let clock = ManualClock::new(1_000);
    let mut config = EngineConfig::new("owner");
    config.auto_deposit_surplus = true;
    let mut engine = create_engine_with(config, &clock);
    engine.yield_wrapper_mut().set_deposits_failing(true);

    let receipt = engine.create_order(&alice(), request(10, 3, 30)).unwrap();

    assert_eq!(receipt.value, 1);
    assert_eq!(receipt.warnings.len(), 1);
    assert!(matches!(
        receipt.warnings[0],
        EngineError::YieldDepositFailed { .. }
    ));
    assert_eq!(engine.currency_config(&eth()).unwrap().liquid(), 30);
}

// ============================================================================
// Withdrawals
// ============================================================================

#[test]
fn test_pass_withdraws_shortfall() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);
    let id = engine.create_order(&alice(), request(10, 3, 30)).unwrap().value;
    engine.deposit_surplus(&keeper(), &eth()).unwrap();

    // First cycle is covered by the liquid portion
    let first = engine.execute_due_conversions(&keeper()).unwrap();
    assert!(first
        .events
        .iter()
        .all(|e| e.event_type() != "YieldWithdrawn"));

    clock.advance(3_600);
    let second = engine.execute_due_conversions(&keeper()).unwrap();
    assert_eq!(
        second.events[0],
        Event::YieldWithdrawn {
            currency: eth(),
            requested: 10,
            received: 10
        }
    );
    assert_eq!(engine.get_order(id).unwrap().cycles_executed(), 2);
    let config = engine.currency_config(&eth()).unwrap();
    assert_eq!(config.aggregate_escrow(), 10);
    assert_eq!(config.deposited(), 10);
    assert_eq!(config.liquid(), 0);
    assert_balanced(&engine);
}

#[test]
fn test_interest_is_realized_outside_escrow() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);
    engine.create_order(&alice(), request(10, 3, 30)).unwrap();
    engine.deposit_surplus(&keeper(), &eth()).unwrap();
    engine.execute_due_conversions(&keeper()).unwrap();
    engine.yield_wrapper_mut().accrue(&ceth(), &eth(), 3);

    clock.advance(3_600);
    engine.execute_due_conversions(&keeper()).unwrap();

    let config = engine.currency_config(&eth()).unwrap();
    assert_eq!(config.realized_yield(), 3);
    assert_eq!(config.aggregate_escrow(), 10);
    assert_balanced(&engine);
}

#[test]
fn test_refused_withdrawal_fails_cycle_without_side_effects() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);
    let id = engine.create_order(&alice(), request(10, 3, 30)).unwrap().value;
    engine.set_liquidity_reserve(&admin(), &eth(), 0).unwrap();
    engine.deposit_surplus(&keeper(), &eth()).unwrap();
    engine.execute_due_conversions(&keeper()).unwrap();
    let before = engine.get_order(id).unwrap().clone();
    engine.yield_wrapper_mut().set_redemption_limit(Some(5));

    clock.advance(3_600);
    let report = engine.execute_due_conversions(&keeper()).unwrap().value;

    assert_eq!(report.failed_ids(), vec![id]);
    assert!(matches!(
        report.failed[0].error,
        EngineError::YieldWithdrawalFailed { .. }
    ));
    assert_eq!(engine.get_order(id).unwrap(), &before);
    assert_eq!(engine.currency_config(&eth()).unwrap().deposited(), 20);
    assert_balanced(&engine);
}

#[test]
fn test_final_cycle_runs_when_residual_exceeds_redemption_limit() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);
    let id = engine.create_order(&alice(), request(5, 1, 100)).unwrap().value;
    engine.deposit_surplus(&keeper(), &eth()).unwrap();
    {
        let config = engine.currency_config(&eth()).unwrap();
        assert_eq!(config.liquid(), 5);
        assert_eq!(config.deposited(), 95);
    }
    engine.yield_wrapper_mut().set_redemption_limit(Some(10));

    let receipt = engine.execute_due_conversions(&keeper()).unwrap();
    let report = &receipt.value;

    assert_eq!(report.completed_ids(), vec![id]);
    assert!(report.failed.is_empty());
    assert_eq!(report.executed[0].residual_refunded, 0);
    assert_eq!(engine.get_order(id).unwrap().status(), OrderStatus::Completed);
    assert!(receipt.events.contains(&Event::RefundDeferred {
        owner: alice(),
        currency: eth(),
        amount: 95
    }));
    assert_eq!(engine.pending_refund(&alice(), &eth()), 95);

    let config = engine.currency_config(&eth()).unwrap();
    assert_eq!(config.aggregate_escrow(), 0);
    assert_eq!(config.deposited(), 0);
    assert_eq!(config.refund_principal(), 95);
    assert_balanced(&engine);

    // The earmarked principal is redeemed once the wrapper allows it
    assert!(matches!(
        engine.claim_pending_refund(&alice(), &eth()),
        Err(EngineError::YieldWithdrawalFailed { .. })
    ));
    assert_eq!(engine.pending_refund(&alice(), &eth()), 95);

    engine.yield_wrapper_mut().set_redemption_limit(None);
    let claimed = engine.claim_pending_refund(&alice(), &eth()).unwrap();

    assert_eq!(claimed.value, 95);
    assert_eq!(claimed.events[0].event_type(), "YieldWithdrawn");
    assert_eq!(engine.funds().balance(&alice(), &eth()), 995);
    assert_eq!(engine.yield_wrapper().principal(&ceth(), &eth()), 0);
    assert_eq!(engine.currency_config(&eth()).unwrap().refund_principal(), 0);
}

#[test]
fn test_final_cycle_redeems_residual_from_wrapper() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);
    let id = engine.create_order(&alice(), request(5, 1, 100)).unwrap().value;
    engine.deposit_surplus(&keeper(), &eth()).unwrap();

    let receipt = engine.execute_due_conversions(&keeper()).unwrap();

    assert_eq!(receipt.value.executed[0].residual_refunded, 95);
    assert!(receipt.events.contains(&Event::ResidualRefunded { id, amount: 95 }));
    assert_eq!(engine.pending_refund(&alice(), &eth()), 0);
    assert_eq!(engine.funds().balance(&alice(), &eth()), 995);
    let config = engine.currency_config(&eth()).unwrap();
    assert_eq!(config.refund_principal(), 0);
    assert_eq!(config.aggregate_escrow(), 0);
    assert_balanced(&engine);
}

#[test]
fn test_cancel_withdraws_before_refunding() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);
    let id = engine.create_order(&alice(), request(10, 3, 30)).unwrap().value;
    engine.deposit_surplus(&keeper(), &eth()).unwrap();

    let receipt = engine.cancel_order(&alice(), id).unwrap();

    assert_eq!(receipt.value, 30);
    assert_eq!(receipt.events[0].event_type(), "YieldWithdrawn");
    assert_eq!(receipt.events[1].event_type(), "OrderCancelled");
    assert_eq!(engine.funds().balance(&alice(), &eth()), 1_000);
    let config = engine.currency_config(&eth()).unwrap();
    assert_eq!(config.aggregate_escrow(), 0);
    assert_eq!(config.deposited(), 0);
}

#[test]
fn test_cancel_fails_when_wrapper_refuses() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);
    let id = engine.create_order(&alice(), request(10, 3, 30)).unwrap().value;
    engine.deposit_surplus(&keeper(), &eth()).unwrap();
    engine.yield_wrapper_mut().set_redemption_limit(Some(0));

    let err = engine.cancel_order(&alice(), id).unwrap_err();

    assert!(matches!(err, EngineError::YieldWithdrawalFailed { .. }));
    assert_eq!(engine.get_order(id).unwrap().status(), OrderStatus::Active);
    assert_eq!(engine.funds().balance(&alice(), &eth()), 970);
    assert_balanced(&engine);
}

// ============================================================================
// Wrapper Attachment
// ============================================================================

#[test]
fn test_wrapper_replacement_rules() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);

    assert!(matches!(
        engine.attach_yield_wrapper(&admin(), &CurrencyId::new("BTC"), ceth()),
        Err(EngineError::UnknownCurrency(_))
    ));
    assert!(matches!(
        engine.attach_yield_wrapper(&alice(), &eth(), ceth()),
        Err(EngineError::Unauthorized { .. })
    ));

    engine.create_order(&alice(), request(10, 3, 30)).unwrap();
    engine.deposit_surplus(&keeper(), &eth()).unwrap();

    assert!(matches!(
        engine.attach_yield_wrapper(&admin(), &eth(), WrapperRef::new("aETH")),
        Err(EngineError::YieldWrapperBusy { deposited: 20, .. })
    ));
    // Re-attaching the same wrapper is harmless
    engine.attach_yield_wrapper(&admin(), &eth(), ceth()).unwrap();
}

#[test]
fn test_wrapper_holding_parked_refunds_cannot_be_replaced() {
    let clock = ManualClock::new(1_000);
    let mut engine = create_engine(&clock);
    engine.create_order(&alice(), request(5, 1, 100)).unwrap();
    engine.deposit_surplus(&keeper(), &eth()).unwrap();
    engine.yield_wrapper_mut().set_redemption_limit(Some(0));
    engine.execute_due_conversions(&keeper()).unwrap();
    assert_eq!(engine.currency_config(&eth()).unwrap().deposited(), 0);

    assert!(matches!(
        engine.attach_yield_wrapper(&admin(), &eth(), WrapperRef::new("aETH")),
        Err(EngineError::YieldWrapperBusy { deposited: 95, .. })
    ));
}
