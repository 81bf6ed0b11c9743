//! Currency registry
//!
//! Admin-managed table of accepted source currencies. Authorization is checked
//! by the engine before these methods are called; the registry only validates
//! its own inputs.

use crate::core::{Amount, CurrencyId, WrapperRef};
use crate::error::{EngineError, EngineResult};
use crate::models::CurrencyConfig;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct CurrencyRegistry {
    currencies: BTreeMap<CurrencyId, CurrencyConfig>,
}

impl CurrencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_configs(configs: impl IntoIterator<Item = CurrencyConfig>) -> Self {
        Self {
            currencies: configs
                .into_iter()
                .map(|config| (config.id().clone(), config))
                .collect(),
        }
    }

    /// Create or overwrite the acceptance bounds of a currency
    ///
    /// Overwriting keeps the currency's escrow accounting and yield wrapper.
    pub fn define(&mut self, currency: CurrencyId, min: Amount, max: Amount) -> EngineResult<()> {
        if min < 0 || max < 0 || min > max {
            return Err(EngineError::InvalidRange { min, max });
        }
        match self.currencies.get_mut(&currency) {
            Some(existing) => existing.set_bounds(min, max),
            None => {
                self.currencies
                    .insert(currency.clone(), CurrencyConfig::new(currency, min, max));
            }
        }
        Ok(())
    }

    /// Associate a yield wrapper with an already-defined currency
    ///
    /// A different wrapper cannot replace one that still holds deposits.
    pub fn attach_yield_wrapper(
        &mut self,
        currency: &CurrencyId,
        wrapper: WrapperRef,
    ) -> EngineResult<()> {
        let config = self.get_mut(currency)?;
        let held = config.deposited() + config.refund_principal();
        if held > 0 && config.yield_wrapper() != Some(&wrapper) {
            return Err(EngineError::YieldWrapperBusy {
                currency: currency.clone(),
                deposited: held,
            });
        }
        config.set_yield_wrapper(wrapper);
        Ok(())
    }

    pub fn set_liquidity_reserve(
        &mut self,
        currency: &CurrencyId,
        reserve: Amount,
    ) -> EngineResult<()> {
        if reserve < 0 {
            return Err(EngineError::InvalidRange {
                min: reserve,
                max: reserve,
            });
        }
        self.get_mut(currency)?.set_liquidity_reserve(reserve);
        Ok(())
    }

    /// True iff the currency is defined and `min <= amount <= max`
    pub fn is_accepted(&self, currency: &CurrencyId, amount: Amount) -> bool {
        self.currencies
            .get(currency)
            .map(|config| config.accepts(amount))
            .unwrap_or(false)
    }

    pub fn get(&self, currency: &CurrencyId) -> EngineResult<&CurrencyConfig> {
        self.currencies
            .get(currency)
            .ok_or_else(|| EngineError::UnknownCurrency(currency.clone()))
    }

    pub(crate) fn get_mut(&mut self, currency: &CurrencyId) -> EngineResult<&mut CurrencyConfig> {
        self.currencies
            .get_mut(currency)
            .ok_or_else(|| EngineError::UnknownCurrency(currency.clone()))
    }

    pub fn currencies(&self) -> impl Iterator<Item = &CurrencyConfig> {
        self.currencies.values()
    }

    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }
}
