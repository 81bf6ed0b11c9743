//! Checkpoint Tests - Save/Restore Engine State
//!
//! Critical invariants tested:
//! - Restored engine continues exactly where the original stopped
//! - Escrow conservation is checked before restoring
//! - Config matching: reject state taken under a different config

use dca_engine_core_rs::collaborators::{
    AmmExchange, InMemoryAmm, InMemoryFunds, InMemoryYieldWrapper,
};
use dca_engine_core_rs::{
    AccountId, CurrencyId, DcaEngine, EngineConfig, EngineError, EngineSnapshot, ManualClock,
    OrderRequest, OrderStatus, WrapperRef,
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

fn config() -> EngineConfig {
    EngineConfig::new("owner")
}

fn collaborators() -> (InMemoryAmm, InMemoryYieldWrapper, InMemoryFunds) {
    let mut amm = InMemoryAmm::new();
    amm.create_market(&CurrencyId::new("DAI")).unwrap();
    let mut funds = InMemoryFunds::new();
    funds.fund(&alice(), &eth(), 1_000);
    (amm, InMemoryYieldWrapper::new(), funds)
}

/// Engine with two orders: one mid-schedule, one completed with a parked
/// residual refund
fn create_busy_engine(clock: &ManualClock) -> Engine {
    let (amm, wrapper, funds) = collaborators();
    let mut engine = DcaEngine::new(config(), amm, wrapper, funds, clock.clone()).unwrap();
    engine.define_currency(&admin(), eth(), 1, 100).unwrap();
    engine
        .attach_yield_wrapper(&admin(), &eth(), WrapperRef::new("cETH"))
        .unwrap();
    engine
        .set_automation_agent(&admin(), Some(keeper()))
        .unwrap();

    engine
        .create_order(&alice(), OrderRequest::new("ETH", "DAI", 10, 3_600, 3, 30))
        .unwrap();
    engine
        .create_order(&alice(), OrderRequest::new("ETH", "DAI", 10, 3_600, 1, 15))
        .unwrap();
    engine.deposit_surplus(&keeper(), &eth()).unwrap();

    engine.funds_mut().set_frozen(&alice(), true);
    engine.execute_due_conversions(&keeper()).unwrap();
    engine.funds_mut().set_frozen(&alice(), false);
    engine
}

fn restore(snapshot: EngineSnapshot, clock: &ManualClock) -> Result<Engine, EngineError> {
    let (amm, wrapper, funds) = collaborators();
    DcaEngine::restore(config(), snapshot, amm, wrapper, funds, clock.clone())
}

// ============================================================================
// Save / Restore
// ============================================================================

#[test]
fn test_restored_engine_matches_original() {
    let clock = ManualClock::new(1_000);
    let engine = create_busy_engine(&clock);

    let json = engine.snapshot().unwrap().to_json().unwrap();
    let restored = restore(EngineSnapshot::from_json(&json).unwrap(), &clock).unwrap();

    let originals: Vec<_> = engine.ledger().orders().cloned().collect();
    let copies: Vec<_> = restored.ledger().orders().cloned().collect();
    assert_eq!(originals, copies);
    assert_eq!(
        restored.currency_config(&eth()).unwrap(),
        engine.currency_config(&eth()).unwrap()
    );
    assert_eq!(restored.automation_agent(), Some(&keeper()));
    assert_eq!(restored.pending_refund(&alice(), &eth()), 5);
    assert_eq!(restored.order_at_index(&alice(), 1).unwrap().id(), 2);
    assert_eq!(
        restored.get_order(2).unwrap().status(),
        OrderStatus::Completed
    );
    assert!(restored.event_log().is_empty());
}

#[test]
fn test_restored_engine_continues_schedule() {
    let clock = ManualClock::new(1_000);
    let engine = create_busy_engine(&clock);
    let snapshot = engine.snapshot().unwrap();

    // Collaborator state lives outside the snapshot; the wrapper still holds
    // the deposited principal
    let (amm, _, funds) = collaborators();
    let wrapper = engine.yield_wrapper().clone();
    let mut restored =
        DcaEngine::restore(config(), snapshot, amm, wrapper, funds, clock.clone()).unwrap();

    // Ids keep counting from where the original left off
    let id = restored
        .create_order(&alice(), OrderRequest::new("ETH", "DAI", 10, 3_600, 1, 10))
        .unwrap()
        .value;
    assert_eq!(id, 3);

    clock.advance(3_600);
    let report = restored.execute_due_conversions(&keeper()).unwrap().value;
    assert_eq!(report.num_executed(), 2);
    assert_eq!(restored.get_order(1).unwrap().cycles_executed(), 2);
}

#[test]
fn test_snapshot_from_other_config_rejected() {
    let clock = ManualClock::new(1_000);
    let engine = create_busy_engine(&clock);
    let snapshot = engine.snapshot().unwrap();

    let mut other = config();
    other.swap_deadline_secs = 60;
    let (amm, wrapper, funds) = collaborators();
    let result = DcaEngine::restore(other, snapshot, amm, wrapper, funds, clock.clone());

    assert!(matches!(result, Err(EngineError::SnapshotMismatch { .. })));
}

#[test]
fn test_tampered_snapshot_rejected() {
    let clock = ManualClock::new(1_000);
    let engine = create_busy_engine(&clock);
    let mut snapshot = engine.snapshot().unwrap();
    snapshot.orders.remove(0);

    let result = restore(snapshot, &clock);

    assert!(matches!(result, Err(EngineError::InvalidSnapshot(_))));
}

#[test]
fn test_malformed_snapshot_json_rejected() {
    assert!(matches!(
        EngineSnapshot::from_json("{\"orders\": 3}"),
        Err(EngineError::InvalidSnapshot(_))
    ));
}
