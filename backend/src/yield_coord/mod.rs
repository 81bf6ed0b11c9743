//! Yield coordination
//!
//! Moves idle escrow of a currency into its yield wrapper and back, keeping
//! enough liquid balance for upcoming conversions while the remainder earns
//! interest.
//!
//! # Critical Invariants
//!
//! - `liquid + deposited == aggregate_escrow` before and after every call
//! - Accounting moves before the wrapper is called and is reverted if the
//!   call fails, so a reentrant observer never sees funds counted twice
//! - Wrapper output above the requested principal is realized yield and is
//!   kept outside the escrow aggregate
//! - Principal earmarked for parked refunds is only redeemed through
//!   [`redeem_refund_principal`], never for conversions

use crate::collaborators::YieldWrapper;
use crate::core::Amount;
use crate::error::{EngineError, EngineResult};
use crate::models::{CurrencyConfig, Event};
use tracing::{debug, info, warn};

/// Make at least `amount` of the currency liquid
///
/// Withdraws the shortfall from the currency's yield wrapper. Fails with
/// `YieldWithdrawalFailed` if there is no wrapper to draw from or the wrapper
/// refuses the redemption.
pub fn ensure_liquid<Y: YieldWrapper + ?Sized>(
    config: &mut CurrencyConfig,
    wrapper: &mut Y,
    amount: Amount,
    events: &mut Vec<Event>,
) -> EngineResult<()> {
    if config.liquid() >= amount {
        return Ok(());
    }
    let shortfall = amount - config.liquid();
    let currency = config.id().clone();

    let wrapper_ref = config.yield_wrapper().cloned().ok_or_else(|| {
        EngineError::YieldWithdrawalFailed {
            currency: currency.clone(),
            reason: format!(
                "liquid {} below {} and no yield wrapper attached",
                config.liquid(),
                amount
            ),
        }
    })?;
    if shortfall > config.deposited() {
        return Err(EngineError::YieldWithdrawalFailed {
            currency,
            reason: format!(
                "shortfall {} exceeds deposited {}",
                shortfall,
                config.deposited()
            ),
        });
    }

    config.move_from_wrapper(shortfall);
    let received = match wrapper.withdraw(&wrapper_ref, &currency, shortfall) {
        Ok(received) => received,
        Err(e) => {
            config.move_to_wrapper(shortfall);
            warn!(%currency, %wrapper_ref, shortfall, error = %e, "yield withdrawal rejected");
            return Err(EngineError::YieldWithdrawalFailed {
                currency,
                reason: e.to_string(),
            });
        }
    };

    events.push(Event::YieldWithdrawn {
        currency: currency.clone(),
        requested: shortfall,
        received,
    });

    if received < shortfall {
        // Unreturned principal stays booked as deposited
        config.move_to_wrapper(shortfall - received);
        warn!(%currency, shortfall, received, "yield wrapper returned less than requested");
        return Err(EngineError::YieldWithdrawalFailed {
            currency,
            reason: format!("wrapper returned {} of {}", received, shortfall),
        });
    }
    if received > shortfall {
        config.credit_yield(received - shortfall);
    }

    info!(%currency, shortfall, received, "withdrew escrow from yield wrapper");
    Ok(())
}

/// Redeem up to `amount` of principal earmarked for parked refunds
///
/// Returns the principal actually redeemed. Whatever the wrapper does not
/// return stays earmarked; interest above the principal is realized yield.
pub fn redeem_refund_principal<Y: YieldWrapper + ?Sized>(
    config: &mut CurrencyConfig,
    wrapper: &mut Y,
    amount: Amount,
    events: &mut Vec<Event>,
) -> EngineResult<Amount> {
    if amount <= 0 {
        return Ok(0);
    }
    let currency = config.id().clone();
    if amount > config.refund_principal() {
        return Err(EngineError::YieldWithdrawalFailed {
            currency,
            reason: format!(
                "requested {} exceeds earmarked principal {}",
                amount,
                config.refund_principal()
            ),
        });
    }
    let wrapper_ref = config.yield_wrapper().cloned().ok_or_else(|| {
        EngineError::YieldWithdrawalFailed {
            currency: currency.clone(),
            reason: "no yield wrapper attached".to_string(),
        }
    })?;

    config.release_refund_principal(amount);
    let received = match wrapper.withdraw(&wrapper_ref, &currency, amount) {
        Ok(received) => received,
        Err(e) => {
            config.restore_refund_principal(amount);
            warn!(%currency, %wrapper_ref, amount, error = %e, "refund redemption rejected");
            return Err(EngineError::YieldWithdrawalFailed {
                currency,
                reason: e.to_string(),
            });
        }
    };

    events.push(Event::YieldWithdrawn {
        currency: currency.clone(),
        requested: amount,
        received,
    });

    let redeemed = received.clamp(0, amount);
    if redeemed < amount {
        config.restore_refund_principal(amount - redeemed);
        warn!(%currency, amount, received, "yield wrapper returned less than requested");
    }
    if received > amount {
        config.credit_yield(received - amount);
    }

    info!(%currency, redeemed, "redeemed principal for parked refunds");
    Ok(redeemed)
}

/// Deposit liquid escrow above `reserve + upcoming_need` into the wrapper
///
/// Returns the amount deposited. Without an attached wrapper this is a
/// no-op returning 0.
pub fn deposit_surplus<Y: YieldWrapper + ?Sized>(
    config: &mut CurrencyConfig,
    wrapper: &mut Y,
    upcoming_need: Amount,
    events: &mut Vec<Event>,
) -> EngineResult<Amount> {
    let Some(wrapper_ref) = config.yield_wrapper().cloned() else {
        return Ok(0);
    };
    let target = config.liquidity_reserve() + upcoming_need;
    let surplus = config.liquid() - target;
    if surplus <= 0 {
        debug!(currency = %config.id(), liquid = config.liquid(), target, "no surplus to deposit");
        return Ok(0);
    }

    let currency = config.id().clone();
    config.move_to_wrapper(surplus);
    if let Err(e) = wrapper.deposit(&wrapper_ref, &currency, surplus) {
        config.move_from_wrapper(surplus);
        warn!(%currency, %wrapper_ref, surplus, error = %e, "yield deposit rejected");
        return Err(EngineError::YieldDepositFailed {
            currency,
            reason: e.to_string(),
        });
    }

    events.push(Event::YieldDeposited {
        currency: currency.clone(),
        amount: surplus,
    });
    info!(%currency, %wrapper_ref, surplus, "deposited surplus escrow");
    Ok(surplus)
}
