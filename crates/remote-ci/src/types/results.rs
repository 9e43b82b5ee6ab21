use crate::{Error, EffectiveRef, Result, RunId};
use serde::{Deserialize, Serialize};

pub type Time = chrono::DateTime<chrono::Utc>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StepOutcome {
  pub position: usize,
  pub name: String,
  pub succeeded: bool,
  pub exit_code: i32,
  /// Everything the step printed, stderr merged into stdout.
  pub output: Vec<String>,
  pub started_at: Option<Time>,
  pub completed_at: Option<Time>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunResult {
  pub id: RunId,
  pub effective_ref: EffectiveRef,
  /// AND over every `StepOutcome::succeeded`, true for an empty step list.
  pub succeeded: bool,
  pub steps: Vec<StepOutcome>,
  pub started_at: Option<Time>,
  pub completed_at: Option<Time>,
}

impl RunResult {
  pub fn failed_steps(&self) -> Vec<&StepOutcome> {
    self.steps.iter().filter(|step| !step.succeeded).collect()
  }

  /// Turns a failed aggregate into `Error::StepFailed` naming every failed step.
  pub fn ensure_succeeded(&self) -> Result<()> {
    if self.succeeded {
      return Ok(());
    }

    Err(Error::step_failed(
      self
        .failed_steps()
        .into_iter()
        .map(|step| step.name.clone())
        .collect(),
    ))
  }
}
