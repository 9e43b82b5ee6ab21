use crate::reporter::ConsoleReporter;
use anyhow::{Context, Result};
use remote_ci::{
  Orchestrator, ProvisionSpec, RunConfig, RunRequest, RunResult, StaticProvisioner, SyncPlan,
  UserConfig, VmProvider,
};
use remote_ci_runner::{AzureCliProvisioner, LocalShellRunner, SshSessionRunner};
use std::path::{Path, PathBuf};

/// Consulted when neither `--ref` nor `GITHUB_HEAD_REF` is set.
pub const REF_ENV: &str = "REMOTE_CI_REF";

pub struct RunArgs {
  pub config: PathBuf,
  pub reference: Option<String>,
  pub report: Option<PathBuf>,
  pub no_teardown: bool,
  pub local: Option<PathBuf>,
}

fn env(key: &str) -> Option<String> {
  std::env::var(key).ok()
}

fn load_config(path: &Path) -> Result<UserConfig> {
  let content =
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

  UserConfig::try_from(content.as_str()).with_context(|| format!("Invalid config {}", path.display()))
}

fn triggering_ref(reference: Option<String>) -> Option<String> {
  reference
    .filter(|reference| !reference.is_empty())
    .or_else(|| env(REF_ENV))
}

pub async fn run(args: RunArgs) -> Result<()> {
  let user_config = load_config(&args.config)?;
  let mut config = user_config.run_config(env)?;
  if args.no_teardown {
    config.teardown = false;
  }

  let request = config.request(triggering_ref(args.reference));
  let shell = config.session.shell.clone();
  let ssh = SshSessionRunner::new()
    .connect_timeout(user_config.connect_timeout()?)
    .shell(shell.clone());

  let builder = Orchestrator::builder()
    .plugin(ConsoleReporter)
    .config(config);

  let builder = match (args.local, &user_config.vm.provider) {
    (Some(dir), _) => builder
      .provisioner(StaticProvisioner::new("localhost"))
      .session_runner(LocalShellRunner::new(dir).shell(shell)),
    (None, VmProvider::Static) => builder
      .provisioner(StaticProvisioner::new(
        user_config.vm.address.clone().unwrap_or_default(),
      ))
      .session_runner(ssh),
    (None, VmProvider::Azure) => builder
      .provisioner(AzureCliProvisioner::new().poll_interval(user_config.poll_interval()?))
      .session_runner(ssh),
  };

  let result = builder.build()?.run(request).await?;

  if let Some(path) = &args.report {
    write_report(path, &result)?;
  }

  result.ensure_succeeded()?;

  Ok(())
}

fn write_report(path: &Path, result: &RunResult) -> Result<()> {
  let report = serde_json::to_string_pretty(result).context("Failed to serialize the run result")?;
  std::fs::write(path, report).with_context(|| format!("Failed to write {}", path.display()))?;

  log::info!("Wrote report to {}", path.display());

  Ok(())
}

pub fn check(path: &Path, reference: Option<String>) -> Result<()> {
  let user_config = load_config(path)?;
  let config = user_config.run_config(env)?;
  let request = config.request(triggering_ref(reference));

  if config.strict_refs {
    request.effective_ref().validate_branch_name()?;
  }

  for line in plan_lines(&user_config.vm.provider, &config, &request) {
    println!("{}", line);
  }

  Ok(())
}

fn plan_lines(provider: &VmProvider, config: &RunConfig, request: &RunRequest) -> Vec<String> {
  let effective_ref = request.effective_ref();
  let plan = SyncPlan::for_ref(&effective_ref, &request.default_ref);
  let provider = match provider {
    VmProvider::Azure => "azure",
    VmProvider::Static => "static",
  };

  let mut lines = vec![
    format!("ref:        {}", effective_ref.as_str().escape_debug()),
    format!(
      "server:     {} ({})",
      ProvisionSpec::server_name_for(&config.vm.name_prefix, &effective_ref),
      provider
    ),
    format!("checkout:   {}", config.session.working_directory),
    format!(
      "sync:       {}",
      plan
        .stages()
        .iter()
        .map(|stage| stage.name())
        .collect::<Vec<_>>()
        .join(", ")
    ),
    format!(
      "teardown:   {}",
      if config.teardown { "yes" } else { "no" }
    ),
  ];

  if config.steps.is_empty() {
    lines.push("steps:      none".to_string());
  } else {
    lines.push("steps:".to_string());
    for step in &config.steps {
      let command = step.run.lines().next().unwrap_or_default();
      lines.push(format!("  {}. {}: {}", step.position + 1, step.name, command));
    }
  }

  lines
}

#[cfg(test)]
mod tests {
  use super::*;

  const CONFIG: &str = r#"
name: devito-gpu
vm:
  provider: static
  address: 10.0.0.4
admin:
  username: devito
session:
  working-directory: ~/devito
steps:
  - name: unit
    run: |
      pytest tests/
      pytest examples/
  - run: python benchmarks/user/run.py
"#;

  fn plan(reference: Option<&str>) -> Vec<String> {
    let user_config = UserConfig::try_from(CONFIG).unwrap();
    let config = user_config.run_config(|_| None).unwrap();
    let request = config.request(reference.map(|reference| reference.to_string()));

    plan_lines(&user_config.vm.provider, &config, &request)
  }

  #[remote_ci_test::test]
  fn test_plan_for_default_ref() {
    let lines = plan(Some(""));

    assert_eq!(lines[0], "ref:        master");
    assert_eq!(lines[1], "server:     devito-gpu-master (static)");
    assert_eq!(lines[3], "sync:       checkout-default, pull-default");
    assert_eq!(lines[6], "  1. unit: pytest tests/");
    assert_eq!(lines[7], "  2. step-2: python benchmarks/user/run.py");
  }

  #[remote_ci_test::test]
  fn test_plan_for_branch() {
    let lines = plan(Some("feature/gpu"));

    assert_eq!(lines[1], "server:     devito-gpu-feature-gpu (static)");
    assert_eq!(
      lines[3],
      "sync:       checkout-default, delete-stale-branch, fetch, checkout-ref"
    );
  }

  #[remote_ci_test::test]
  fn test_load_missing_config() {
    let err = load_config(Path::new("/nonexistent/remote-ci.yml")).unwrap_err();

    assert!(err.to_string().contains("Failed to read /nonexistent/remote-ci.yml"));
  }
}
