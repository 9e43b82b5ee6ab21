mod plugin;
mod plugin_driver;

use crate::{EffectiveRef, Result, RunId, RunResult, SessionLog, StepOutcome, TestStep};
pub use plugin::*;
pub use plugin_driver::*;
use serde::{Deserialize, Serialize};

pub type HookNoopResult = Result<()>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunStartedEvent {
  pub id: RunId,
  pub effective_ref: EffectiveRef,
  pub server_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProvisionedEvent {
  pub id: RunId,
  pub vm_name: String,
  pub address: String,
}

/// Observer of a run. Hook errors are logged and never affect the run.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str;
  async fn on_run_started(&self, _event: RunStartedEvent) -> HookNoopResult {
    Ok(())
  }
  async fn on_provisioned(&self, _event: ProvisionedEvent) -> HookNoopResult {
    Ok(())
  }
  async fn on_log(&self, _log: SessionLog) -> HookNoopResult {
    Ok(())
  }
  async fn on_step_started(&self, _step: TestStep) -> HookNoopResult {
    Ok(())
  }
  async fn on_step_completed(&self, _outcome: StepOutcome) -> HookNoopResult {
    Ok(())
  }
  async fn on_run_completed(&self, _result: RunResult) -> HookNoopResult {
    Ok(())
  }
}
