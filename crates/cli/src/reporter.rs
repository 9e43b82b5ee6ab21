use colored::Colorize;
use remote_ci::{
  HookNoopResult, LogType, Plugin, ProvisionedEvent, RunResult, RunStartedEvent, SessionLog,
  StepOutcome, TestStep,
};

/// Prints step headers, remote output and a summary table to stdout.
pub struct ConsoleReporter;

#[remote_ci::async_trait]
impl Plugin for ConsoleReporter {
  fn name(&self) -> &'static str {
    "console-reporter"
  }

  async fn on_run_started(&self, event: RunStartedEvent) -> HookNoopResult {
    println!(
      "{} `{}` on {}",
      "Testing".bold(),
      event.effective_ref.as_str().escape_debug(),
      event.server_name
    );

    Ok(())
  }

  async fn on_provisioned(&self, event: ProvisionedEvent) -> HookNoopResult {
    println!("{} is up at {}", event.vm_name, event.address);

    Ok(())
  }

  async fn on_step_started(&self, step: TestStep) -> HookNoopResult {
    println!(
      "{}",
      format!("==> [{}] {}", step.position + 1, step.name)
        .cyan()
        .bold()
    );

    Ok(())
  }

  async fn on_log(&self, log: SessionLog) -> HookNoopResult {
    match log.log_type {
      LogType::Log => println!("{}", log.message),
      LogType::Error => println!("{}", log.message.red()),
    }

    Ok(())
  }

  async fn on_step_completed(&self, outcome: StepOutcome) -> HookNoopResult {
    let verdict = if outcome.succeeded {
      "passed".green()
    } else {
      format!("failed with exit code {}", outcome.exit_code).red()
    };

    println!("<== [{}] {} {}", outcome.position + 1, outcome.name, verdict);

    Ok(())
  }

  async fn on_run_completed(&self, result: RunResult) -> HookNoopResult {
    let mut lines = summary(&result);
    let verdict = lines.pop().unwrap_or_default();

    println!();
    for line in &lines {
      println!("{}", line);
    }

    if result.succeeded {
      println!("{}", verdict.green().bold());
    } else {
      println!("{}", verdict.red().bold());
    }

    Ok(())
  }
}

fn elapsed(outcome: &StepOutcome) -> String {
  match (outcome.started_at, outcome.completed_at) {
    (Some(started_at), Some(completed_at)) => format!(
      "{:.1}s",
      (completed_at - started_at).num_milliseconds() as f64 / 1000.0
    ),
    _ => "-".to_string(),
  }
}

/// Table rows followed by the verdict line.
pub fn summary(result: &RunResult) -> Vec<String> {
  let width = result
    .steps
    .iter()
    .map(|step| step.name.len())
    .max()
    .unwrap_or(0)
    .max("step".len());

  let mut lines = vec![format!(
    "{:>3}  {:<width$}  {:<6}  {:>4}  {}",
    "#",
    "step",
    "result",
    "exit",
    "time",
    width = width
  )];

  for step in &result.steps {
    lines.push(format!(
      "{:>3}  {:<width$}  {:<6}  {:>4}  {}",
      step.position + 1,
      step.name,
      if step.succeeded { "passed" } else { "failed" },
      step.exit_code,
      elapsed(step),
      width = width
    ));
  }

  let failed = result.failed_steps().len();
  lines.push(format!(
    "{} {}: {} of {} steps failed",
    if result.succeeded { "PASSED" } else { "FAILED" },
    result.effective_ref,
    failed,
    result.steps.len()
  ));

  lines
}
