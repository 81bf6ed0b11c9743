//! Access control
//!
//! Two roles guard privileged operations:
//! - **Administrator**: fixed at construction; manages currencies, wrappers
//!   and the automation agent
//! - **Automation agent**: the single identity allowed to trigger conversion
//!   passes (the administrator is accepted as a fallback)

use crate::core::AccountId;
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    admin: AccountId,
    automation_agent: Option<AccountId>,
}

impl AccessControl {
    pub fn new(admin: AccountId) -> Self {
        Self {
            admin,
            automation_agent: None,
        }
    }

    pub fn admin(&self) -> &AccountId {
        &self.admin
    }

    pub fn automation_agent(&self) -> Option<&AccountId> {
        self.automation_agent.as_ref()
    }

    /// Replace the automation agent; `None` disables automated execution
    pub fn set_automation_agent(
        &mut self,
        caller: &AccountId,
        agent: Option<AccountId>,
    ) -> EngineResult<()> {
        self.require_admin(caller, "set the automation agent")?;
        self.automation_agent = agent;
        Ok(())
    }

    pub fn require_admin(&self, caller: &AccountId, action: &'static str) -> EngineResult<()> {
        if caller == &self.admin {
            Ok(())
        } else {
            Err(EngineError::Unauthorized {
                caller: caller.clone(),
                action,
            })
        }
    }

    /// Accepts the configured agent or the administrator
    pub fn require_automation_agent(
        &self,
        caller: &AccountId,
        action: &'static str,
    ) -> EngineResult<()> {
        if self.automation_agent.as_ref() == Some(caller) || caller == &self.admin {
            Ok(())
        } else {
            Err(EngineError::Unauthorized {
                caller: caller.clone(),
                action,
            })
        }
    }
}
