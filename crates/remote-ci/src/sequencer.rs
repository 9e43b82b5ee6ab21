use crate::{
  export_statements, EffectiveRef, EnvironmentVariable, EnvironmentVariables, Marker, Markers,
  RunId, RunResult, StepOutcome, Time,
};
use serde::{Deserialize, Serialize};

/// Shell variable holding the exit code of the step that just ran.
const STATUS_VAR: &str = "remote_ci_status";

/// One test invocation. Its overrides apply to its own command only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TestStep {
  pub position: usize,
  pub name: String,
  pub run: String,
  pub environments: EnvironmentVariables,
}

impl TestStep {
  pub fn new(position: usize, name: impl Into<String>, run: impl Into<String>) -> Self {
    Self {
      position,
      name: name.into(),
      run: run.into(),
      environments: EnvironmentVariables::new(),
    }
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<EnvironmentVariable>) -> Self {
    self.environments.insert(key.into(), value.into());
    self
  }

  /// The command runs in a subshell so exported overrides and directory
  /// changes end with the step.
  pub fn statements(&self, markers: &Markers) -> Vec<String> {
    let mut body = export_statements(&self.environments);
    body.push(if self.run.trim().is_empty() {
      ":".to_string()
    } else {
      self.run.trim_end().to_string()
    });

    vec![
      markers.echo(&Marker::StepBegin {
        position: self.position,
      }),
      // stdin carries the rest of the script
      format!("(\n{}\n) < /dev/null", body.join("\n")),
      format!("{}=$?", STATUS_VAR),
      markers.echo_with_var(&format!("step-end::{}::", self.position), STATUS_VAR),
    ]
  }
}

/// Folds step outcomes into the run verdict. The failure latch starts
/// cleared, is set by any failed step and never resets.
#[derive(Debug, Default)]
pub struct Aggregator {
  any_failure: bool,
  outcomes: Vec<StepOutcome>,
}

impl Aggregator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&mut self, outcome: StepOutcome) {
    self.any_failure |= !outcome.succeeded;
    self.outcomes.push(outcome);
  }

  pub fn any_failure(&self) -> bool {
    self.any_failure
  }

  pub fn outcomes(&self) -> &[StepOutcome] {
    &self.outcomes
  }

  pub fn finish(self, id: RunId, effective_ref: EffectiveRef, started_at: Option<Time>) -> RunResult {
    RunResult {
      id,
      effective_ref,
      succeeded: !self.any_failure,
      steps: self.outcomes,
      started_at,
      completed_at: Some(chrono::Utc::now()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn outcome(position: usize, exit_code: i32) -> StepOutcome {
    StepOutcome {
      position,
      name: format!("step-{}", position),
      succeeded: exit_code == 0,
      exit_code,
      output: vec![],
      started_at: None,
      completed_at: None,
    }
  }

  fn finish(aggregator: Aggregator) -> RunResult {
    aggregator.finish(RunId::new("run"), EffectiveRef::new("master"), None)
  }

  #[test]
  fn test_zero_steps_succeed() {
    let result = finish(Aggregator::new());

    assert!(result.succeeded);
    assert!(result.steps.is_empty());
  }

  #[test]
  fn test_all_steps_succeed() {
    let mut aggregator = Aggregator::new();
    for position in 0..4 {
      aggregator.record(outcome(position, 0));
    }

    let result = finish(aggregator);
    assert!(result.succeeded);
    assert_eq!(result.steps.len(), 4);
  }

  #[test]
  fn test_failure_latches() {
    let mut aggregator = Aggregator::new();
    aggregator.record(outcome(0, 0));
    aggregator.record(outcome(1, 2));
    assert!(aggregator.any_failure());

    for position in 2..5 {
      aggregator.record(outcome(position, 0));
      assert!(aggregator.any_failure());
    }

    let result = finish(aggregator);
    assert!(!result.succeeded);
    assert_eq!(
      result.steps.iter().map(|s| s.position).collect::<Vec<_>>(),
      vec![0, 1, 2, 3, 4]
    );
  }

  #[test]
  fn test_step_statements() {
    let step = TestStep::new(2, "gpu", "pytest tests/\n")
      .env("DEVITO_PLATFORM", "nvidiaX")
      .env("DEVITO_ARCH", "pgcc");

    assert_eq!(
      step.statements(&Markers::new(&RunId::new("run"))),
      vec![
        "echo '::remote-ci::run::step-begin::2'".to_string(),
        "(\nexport DEVITO_ARCH='pgcc'\nexport DEVITO_PLATFORM='nvidiaX'\npytest tests/\n) < /dev/null".to_string(),
        "remote_ci_status=$?".to_string(),
        "echo '::remote-ci::run::step-end::2::'\"$remote_ci_status\"".to_string(),
      ]
    );
  }

  #[test]
  fn test_empty_run_is_noop() {
    let markers = Markers::new(&RunId::new("run"));
    let statements = TestStep::new(0, "empty", "  ").statements(&markers);
    assert_eq!(statements[1], "(\n:\n) < /dev/null");
  }
}
