//! Engine configuration
//!
//! Loaded from JSON or built in code. Only identities and pass/yield tuning
//! live here; currencies are registered at runtime by the administrator.

use crate::core::AccountId;
use crate::error::{EngineError, EngineResult};
use crate::scheduler::PassOptions;
use serde::{Deserialize, Serialize};

fn default_swap_deadline_secs() -> u64 {
    300
}

/// Complete engine configuration
///
/// # Example
///
/// ```rust
/// use dca_engine_core_rs::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{
///     "admin": "owner",
///     "automation_agent": "keeper",
///     "auto_deposit_surplus": true
/// }"#).unwrap();
///
/// assert_eq!(config.swap_deadline_secs, 300);
/// assert!(config.auto_deposit_surplus);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Administrator identity, fixed for the engine's lifetime
    pub admin: AccountId,

    /// Initial automation agent (None = only the admin can run passes)
    #[serde(default)]
    pub automation_agent: Option<AccountId>,

    /// Seconds added to the pass time to form each swap's deadline
    #[serde(default = "default_swap_deadline_secs")]
    pub swap_deadline_secs: u64,

    /// Deposit surplus escrow into yield wrappers after order creation and
    /// after each pass
    #[serde(default)]
    pub auto_deposit_surplus: bool,

    /// Cap on conversions attempted per pass (None = unlimited)
    #[serde(default)]
    pub max_conversions_per_pass: Option<usize>,
}

impl EngineConfig {
    pub fn new(admin: impl Into<AccountId>) -> Self {
        Self {
            admin: admin.into(),
            automation_agent: None,
            swap_deadline_secs: default_swap_deadline_secs(),
            auto_deposit_surplus: false,
            max_conversions_per_pass: None,
        }
    }

    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.admin.is_empty() {
            return Err(EngineError::InvalidConfig("admin must be set".to_string()));
        }
        if self.swap_deadline_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "swap_deadline_secs must be > 0".to_string(),
            ));
        }
        if self.automation_agent.as_ref().is_some_and(AccountId::is_empty) {
            return Err(EngineError::InvalidConfig(
                "automation_agent must not be empty".to_string(),
            ));
        }
        if self.max_conversions_per_pass == Some(0) {
            return Err(EngineError::InvalidConfig(
                "max_conversions_per_pass must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn pass_options(&self) -> PassOptions {
        PassOptions {
            max_conversions: self.max_conversions_per_pass,
        }
    }
}
