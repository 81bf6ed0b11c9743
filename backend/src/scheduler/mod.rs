//! Due-conversion scheduler
//!
//! One pass walks every active order in ascending id order and, for each due
//! order, runs a single cycle:
//!
//! ```text
//! 1. Eligibility   now - last_execution >= interval, escrow >= contribution
//!                  and a market exists for the target currency
//! 2. Liquidity     pull the contribution out of the yield wrapper if the
//!                  liquid portion is short
//! 3. Bookkeeping   debit escrow, bump cycle counter, stamp time, complete;
//!                  a residual still in the wrapper is earmarked for refund
//! 4. Swap          exact-input swap; the AMM pays the owner directly
//! 5. Residual      redeem the earmarked part and refund the leftover escrow
//!                  of a completing order, parking whatever cannot be paid
//! 6. Events        CycleExecuted (+ ResidualRefunded / RefundDeferred,
//!                  OrderCompleted)
//! ```
//!
//! Only the contribution has to be redeemable for a cycle to run. A
//! redemption limit smaller than a completing order's residual delays the
//! refund, never the conversion.
//!
//! # Failure Isolation
//!
//! Each order's cycle is atomic; the pass is not. A failed liquidity
//! withdrawal or swap leaves that order exactly as it was before the pass and
//! is reported in [`PassReport::failed`]; processing continues with the next
//! order. Orders already settled in the same pass stay settled.
//!
//! Bookkeeping (step 3) happens before the swap is issued so that a
//! reentrant caller observes the debited escrow; a failed swap reverses it.

use crate::collaborators::{AmmExchange, FundsTransfer, SwapRequest, YieldWrapper};
use crate::core::{Amount, OrderId};
use crate::error::{EngineError, EngineResult};
use crate::ledger::{OrderLedger, PendingRefunds};
use crate::models::{Event, Order};
use crate::registry::CurrencyRegistry;
use crate::yield_coord;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Limits applied to a single pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassOptions {
    /// Maximum conversions attempted; further due orders are deferred
    pub max_conversions: Option<usize>,
}

/// A cycle that executed during a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub order_id: OrderId,
    /// 1-based index of the cycle just executed
    pub cycle_index: u32,
    pub amount_in: Amount,
    pub amount_out: Amount,
    /// Escrow refunded because the order completed with funds left over
    pub residual_refunded: Amount,
    pub completed: bool,
}

/// An order that was due but could not be converted this pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionFailure {
    pub order_id: OrderId,
    pub error: EngineError,
}

/// Result of one `execute_due_conversions` pass
#[derive(Debug, Clone)]
pub struct PassReport {
    pub pass_id: Uuid,
    /// Unix seconds the pass ran at
    pub executed_at: u64,
    pub executed: Vec<CycleOutcome>,
    pub failed: Vec<ConversionFailure>,
    /// Due orders left for the next pass because of `max_conversions`
    pub deferred: Vec<OrderId>,
    /// Active orders that were not due
    pub skipped: usize,
    /// Surplus deposits that failed after the pass; escrow stayed liquid
    pub rebalance_failures: Vec<EngineError>,
}

impl PassReport {
    fn new(executed_at: u64) -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            executed_at,
            executed: Vec::new(),
            failed: Vec::new(),
            deferred: Vec::new(),
            skipped: 0,
            rebalance_failures: Vec::new(),
        }
    }

    pub fn num_executed(&self) -> usize {
        self.executed.len()
    }

    pub fn num_failed(&self) -> usize {
        self.failed.len()
    }

    pub fn failed_ids(&self) -> Vec<OrderId> {
        self.failed.iter().map(|f| f.order_id).collect()
    }

    pub fn completed_ids(&self) -> Vec<OrderId> {
        self.executed
            .iter()
            .filter(|c| c.completed)
            .map(|c| c.order_id)
            .collect()
    }
}

/// Everything a pass reads and writes
pub(crate) struct PassContext<'a, A: ?Sized, Y: ?Sized, F: ?Sized> {
    pub ledger: &'a mut OrderLedger,
    pub registry: &'a mut CurrencyRegistry,
    pub pending_refunds: &'a mut PendingRefunds,
    pub amm: &'a mut A,
    pub yield_wrapper: &'a mut Y,
    pub funds: &'a mut F,
    pub now: u64,
    pub swap_deadline_secs: u64,
}

impl<'a, A, Y, F> PassContext<'a, A, Y, F>
where
    A: AmmExchange + ?Sized,
    Y: YieldWrapper + ?Sized,
    F: FundsTransfer + ?Sized,
{
    /// Run one pass over all active orders
    pub fn execute_due(&mut self, options: PassOptions, events: &mut Vec<Event>) -> PassReport {
        let mut report = PassReport::new(self.now);
        let mut attempted = 0usize;

        for id in self.ledger.active_ids() {
            let due = self
                .ledger
                .get(id)
                .map(|order| order.is_due(self.now))
                .unwrap_or(false);
            if !due {
                report.skipped += 1;
                continue;
            }
            if options.max_conversions.is_some_and(|max| attempted >= max) {
                report.deferred.push(id);
                continue;
            }
            attempted += 1;

            match self.convert_order(id, events) {
                Ok(outcome) => report.executed.push(outcome),
                Err(error) => {
                    warn!(order_id = id, %error, "conversion failed; order left for retry");
                    report.failed.push(ConversionFailure { order_id: id, error });
                }
            }
        }

        info!(
            pass_id = %report.pass_id,
            executed = report.executed.len(),
            failed = report.failed.len(),
            deferred = report.deferred.len(),
            skipped = report.skipped,
            "conversion pass finished"
        );
        report
    }

    /// Execute one cycle of a due order
    fn convert_order(&mut self, id: OrderId, events: &mut Vec<Event>) -> EngineResult<CycleOutcome> {
        let order = self.ledger.get(id)?.clone();
        let source = order.source_currency().clone();
        let contribution = order.contribution();
        let completes = order.next_cycle_completes();
        let residual = if completes {
            order.remaining_balance() - contribution
        } else {
            0
        };

        let market = self
            .amm
            .get_market(order.target_currency())
            .ok_or_else(|| EngineError::SwapFailed {
                order_id: id,
                reason: format!("no market for {}", order.target_currency()),
            })?;

        let config = self.registry.get_mut(&source)?;
        yield_coord::ensure_liquid(config, &mut *self.yield_wrapper, contribution, events)?;
        // Residual beyond the spare liquid balance stays in the wrapper
        let residual_liquid = residual.min(config.liquid() - contribution).max(0);
        let residual_in_wrapper = residual - residual_liquid;

        // Book the cycle before calling out
        let cycle_index = {
            let booked = self.ledger.get_mut(id)?;
            let index = booked.record_cycle(self.now);
            if completes {
                booked.complete();
            }
            index
        };
        let config = self.registry.get_mut(&source)?;
        config.escrow_out(contribution + residual_liquid);
        config.earmark_for_refund(residual_in_wrapper);

        let swap = self.amm.swap_exact_input(SwapRequest {
            market: &market,
            currency_in: &source,
            amount_in: contribution,
            min_amount_out: order.min_output_per_cycle(),
            deadline: self.now.saturating_add(self.swap_deadline_secs),
            recipient: order.owner(),
        });
        let amount_out = match swap {
            Ok(amount_out) => amount_out,
            Err(e) => {
                self.ledger.restore(order);
                let config = self.registry.get_mut(&source)?;
                config.unearmark(residual_in_wrapper);
                config.escrow_in(contribution + residual_liquid);
                return Err(EngineError::SwapFailed {
                    order_id: id,
                    reason: e.to_string(),
                });
            }
        };

        debug!(order_id = id, cycle_index, contribution, amount_out, "cycle executed");
        events.push(Event::CycleExecuted {
            id,
            cycle_index,
            amount_in: contribution,
            amount_out,
        });

        let residual_refunded = if residual > 0 {
            self.refund_residual(&order, residual_liquid, residual_in_wrapper, events)
        } else {
            0
        };

        if completes {
            info!(order_id = id, cycles = cycle_index, "order completed");
            events.push(Event::OrderCompleted { id });
        }

        Ok(CycleOutcome {
            order_id: id,
            cycle_index,
            amount_in: contribution,
            amount_out,
            residual_refunded,
            completed: completes,
        })
    }

    /// Pay out a completed order's residual; returns the amount delivered
    ///
    /// The cycle has already settled, so nothing here can fail it. Whatever
    /// cannot be redeemed or delivered is parked for the owner to claim.
    fn refund_residual(
        &mut self,
        order: &Order,
        liquid: Amount,
        in_wrapper: Amount,
        events: &mut Vec<Event>,
    ) -> Amount {
        let id = order.id();
        let source = order.source_currency();
        let mut payable = liquid;

        if in_wrapper > 0 {
            if let Ok(config) = self.registry.get_mut(source) {
                match yield_coord::redeem_refund_principal(
                    config,
                    &mut *self.yield_wrapper,
                    in_wrapper,
                    events,
                ) {
                    Ok(redeemed) => payable += redeemed,
                    Err(error) => {
                        warn!(order_id = id, in_wrapper, %error, "residual left in yield wrapper")
                    }
                }
            }
        }

        let mut refunded = 0;
        if payable > 0 {
            match self.funds.send(order.owner(), source, payable) {
                Ok(()) => {
                    refunded = payable;
                    events.push(Event::ResidualRefunded {
                        id,
                        amount: payable,
                    });
                }
                Err(e) => warn!(order_id = id, payable, error = %e, "residual transfer rejected"),
            }
        }

        let parked = liquid + in_wrapper - refunded;
        if parked > 0 {
            warn!(order_id = id, parked, "residual refund deferred");
            self.pending_refunds.credit(order.owner(), source, parked);
            events.push(Event::RefundDeferred {
                owner: order.owner().clone(),
                currency: source.clone(),
                amount: parked,
            });
        }
        refunded
    }
}
