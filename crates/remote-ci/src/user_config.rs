use crate::{
  is_valid_env_key, Credentials, EnvironmentVariables, Error, Result, RunConfig, SessionContext,
  TestStep, VmSettings, DEFAULT_REF, DEFAULT_REMOTE, DEFAULT_SHELL,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::PathBuf, time::Duration};

pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum VmProvider {
  #[default]
  Azure,
  /// An existing machine at `address`
  Static,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct UserVmConfig {
  #[serde(default)]
  pub provider: VmProvider,
  pub size: Option<String>,
  pub image: Option<String>,
  pub resource_group: Option<String>,
  pub location: Option<String>,
  pub name_prefix: Option<String>,
  pub address: Option<String>,
  pub ready_timeout: Option<String>,
  pub poll_interval: Option<String>,
  pub teardown: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct UserAdminConfig {
  pub username: String,
  /// Name of the environment variable holding the password
  pub password_env: Option<String>,
  pub ssh_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct UserSessionConfig {
  pub working_directory: String,
  pub remote: Option<String>,
  pub port: Option<u16>,
  pub connect_timeout: Option<String>,
  pub shell: Option<String>,
  pub strict_refs: Option<bool>,
  pub environments: Option<EnvironmentVariables>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct UserStep {
  pub name: Option<String>,
  pub run: String,
  pub environments: Option<EnvironmentVariables>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserConfig {
  pub name: Option<String>,
  pub default_ref: Option<String>,
  pub vm: UserVmConfig,
  pub admin: UserAdminConfig,
  pub session: UserSessionConfig,
  pub steps: Option<Vec<UserStep>>,
}

fn parse_duration(field: &str, value: Option<&String>, default: Duration) -> Result<Duration> {
  match value {
    Some(value) => humantime::parse_duration(value)
      .map_err(|e| Error::config_error(format!("Invalid duration for `{}`: {}", field, e))),
    None => Ok(default),
  }
}

fn validate_environments(owner: &str, environments: Option<&EnvironmentVariables>) -> Result<()> {
  for key in environments.into_iter().flat_map(|envs| envs.keys()) {
    if !is_valid_env_key(key) {
      return Err(Error::config_error(format!(
        "{} has invalid environment variable name `{}`",
        owner, key
      )));
    }
  }

  Ok(())
}

fn require<'a>(provider: &str, field: &str, value: &'a Option<String>) -> Result<&'a str> {
  match value.as_deref().map(str::trim) {
    Some(value) if !value.is_empty() => Ok(value),
    _ => Err(Error::config_error(format!(
      "`vm.{}` is required for the {} provider",
      field, provider
    ))),
  }
}

impl UserConfig {
  fn validate(config: &UserConfig) -> Result<()> {
    if config.admin.username.trim().is_empty() {
      return Err(Error::config_error("`admin.username` must not be empty"));
    }

    if config.session.working_directory.trim().is_empty() {
      return Err(Error::config_error(
        "`session.working-directory` must not be empty",
      ));
    }

    if let Some(default_ref) = &config.default_ref {
      if default_ref.is_empty() {
        return Err(Error::config_error("`default-ref` must not be empty"));
      }
    }

    match config.vm.provider {
      VmProvider::Azure => {
        for (field, value) in [
          ("size", &config.vm.size),
          ("image", &config.vm.image),
          ("resource-group", &config.vm.resource_group),
          ("location", &config.vm.location),
        ] {
          require("azure", field, value)?;
        }
      }
      VmProvider::Static => {
        require("static", "address", &config.vm.address)?;
      }
    }

    config.ready_timeout()?;
    config.poll_interval()?;
    config.connect_timeout()?;

    validate_environments("Session", config.session.environments.as_ref())?;

    let mut names = HashSet::new();
    for (position, step) in config.steps.iter().flatten().enumerate() {
      let name = Self::step_name(position, step);

      if step.run.trim().is_empty() {
        return Err(Error::config_error(format!(
          "Step `{}` must have a command to run",
          name
        )));
      }

      validate_environments(&format!("Step `{}`", name), step.environments.as_ref())?;

      if !names.insert(name.clone()) {
        return Err(Error::config_error(format!(
          "Step name `{}` is used more than once",
          name
        )));
      }
    }

    Ok(())
  }

  fn step_name(position: usize, step: &UserStep) -> String {
    step
      .name
      .clone()
      .unwrap_or_else(|| format!("step-{}", position + 1))
  }

  pub fn default_ref(&self) -> &str {
    self.default_ref.as_deref().unwrap_or(DEFAULT_REF)
  }

  pub fn ready_timeout(&self) -> Result<Duration> {
    parse_duration(
      "vm.ready-timeout",
      self.vm.ready_timeout.as_ref(),
      DEFAULT_READY_TIMEOUT,
    )
  }

  pub fn poll_interval(&self) -> Result<Duration> {
    parse_duration(
      "vm.poll-interval",
      self.vm.poll_interval.as_ref(),
      DEFAULT_POLL_INTERVAL,
    )
  }

  pub fn connect_timeout(&self) -> Result<Duration> {
    parse_duration(
      "session.connect-timeout",
      self.session.connect_timeout.as_ref(),
      DEFAULT_CONNECT_TIMEOUT,
    )
  }

  pub fn steps(&self) -> Vec<TestStep> {
    self
      .steps
      .iter()
      .flatten()
      .enumerate()
      .map(|(position, step)| TestStep {
        position,
        name: Self::step_name(position, step),
        run: step.run.clone(),
        environments: step.environments.clone().unwrap_or_default(),
      })
      .collect()
  }

  pub fn session_context(&self) -> SessionContext {
    SessionContext::new(self.session.working_directory.clone())
      .remote(
        self
          .session
          .remote
          .clone()
          .unwrap_or_else(|| DEFAULT_REMOTE.to_string()),
      )
      .shell(
        self
          .session
          .shell
          .clone()
          .unwrap_or_else(|| DEFAULT_SHELL.to_string()),
      )
      .environments(self.session.environments.clone().unwrap_or_default())
  }

  /// Resolves the admin credentials, reading the password through `env`.
  pub fn credentials<F>(&self, env: F) -> Result<Credentials>
  where
    F: Fn(&str) -> Option<String>,
  {
    let password = match &self.admin.password_env {
      Some(key) => Some(env(key).filter(|value| !value.is_empty()).ok_or_else(|| {
        Error::config_error(format!(
          "Environment variable `{}` for the admin password is not set",
          key
        ))
      })?),
      None => None,
    };

    let ssh_key = self.admin.ssh_key.as_ref().map(|path| {
      match (path.strip_prefix("~/"), env("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
      }
    });

    Ok(Credentials {
      username: self.admin.username.clone(),
      password,
      ssh_key,
    })
  }

  pub fn run_config<F>(&self, env: F) -> Result<RunConfig>
  where
    F: Fn(&str) -> Option<String>,
  {
    let vm = VmSettings {
      size: self.vm.size.clone().unwrap_or_default(),
      image: self.vm.image.clone().unwrap_or_default(),
      resource_group: self.vm.resource_group.clone().unwrap_or_default(),
      location: self.vm.location.clone().unwrap_or_default(),
      name_prefix: self
        .vm
        .name_prefix
        .clone()
        .or_else(|| self.name.clone())
        .unwrap_or_else(|| "remote-ci".to_string()),
    };

    Ok(RunConfig {
      default_ref: self.default_ref().to_string(),
      vm,
      admin: self.credentials(env)?,
      session: self.session_context(),
      port: self.session.port.unwrap_or(DEFAULT_SSH_PORT),
      ready_timeout: self.ready_timeout()?,
      teardown: self.vm.teardown.unwrap_or(true),
      strict_refs: self.session.strict_refs.unwrap_or(false),
      steps: self.steps(),
    })
  }
}

impl TryFrom<&str> for UserConfig {
  type Error = Error;

  fn try_from(value: &str) -> Result<Self> {
    let config = serde_yaml::from_str(value).map_err(|e| Error::config_error(e.to_string()))?;

    Self::validate(&config)?;

    Ok(config)
  }
}

impl TryFrom<String> for UserConfig {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> {
    Self::try_from(value.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::EnvironmentVariable;

  const CONFIG: &str = r#"
name: gpu-tests
vm:
  provider: azure
  size: Standard_NC6s_v3
  image: /subscriptions/x/images/gpu
  resource-group: ci
  location: eastus
  ready-timeout: 5m
admin:
  username: ci
  password-env: VM_PASSWORD
session:
  working-directory: ~/devito
  environments:
    OMP_NUM_THREADS: 4
steps:
  - name: gcc
    run: pytest tests/
    environments:
      DEVITO_ARCH: gcc
  - run: |
      pytest -m gpu tests/
    environments:
      DEVITO_PLATFORM: nvidiaX
      DEVITO_LANGUAGE: openacc
"#;

  fn env(key: &str) -> Option<String> {
    match key {
      "VM_PASSWORD" => Some("secret".to_string()),
      "HOME" => Some("/home/runner".to_string()),
      _ => None,
    }
  }

  #[test]
  fn test_parse() {
    let config = UserConfig::try_from(CONFIG).unwrap();

    assert_eq!(config.name.as_deref(), Some("gpu-tests"));
    assert_eq!(config.default_ref(), "master");
    assert_eq!(config.ready_timeout().unwrap(), Duration::from_secs(300));
    assert_eq!(config.poll_interval().unwrap(), DEFAULT_POLL_INTERVAL);

    let steps = config.steps();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].name, "gcc");
    assert_eq!(steps[0].position, 0);
    assert_eq!(
      steps[0].environments.get("DEVITO_ARCH"),
      Some(&EnvironmentVariable::from("gcc"))
    );
    assert_eq!(steps[1].name, "step-2");
    assert_eq!(steps[1].run, "pytest -m gpu tests/\n");
    assert_eq!(steps[1].environments.len(), 2);
  }

  #[test]
  fn test_run_config() {
    let config = UserConfig::try_from(CONFIG).unwrap();
    let run_config = config.run_config(env).unwrap();

    assert_eq!(run_config.default_ref, "master");
    assert_eq!(run_config.vm.name_prefix, "gpu-tests");
    assert_eq!(run_config.vm.size, "Standard_NC6s_v3");
    assert_eq!(run_config.admin.password.as_deref(), Some("secret"));
    assert_eq!(run_config.port, 22);
    assert!(run_config.teardown);
    assert!(!run_config.strict_refs);
    assert_eq!(run_config.session.remote, "origin");
    assert_eq!(run_config.session.shell, "bash");
    assert_eq!(
      run_config.session.environments.get("OMP_NUM_THREADS"),
      Some(&EnvironmentVariable::Number(4.0))
    );
  }

  #[test]
  fn test_missing_password_env() {
    let config = UserConfig::try_from(CONFIG).unwrap();

    assert_eq!(
      config.credentials(|_| None).unwrap_err(),
      Error::config_error("Environment variable `VM_PASSWORD` for the admin password is not set")
    );
  }

  #[test]
  fn test_ssh_key_home_expansion() {
    let yaml = r#"
vm:
  provider: static
  address: 10.0.0.4
admin:
  username: ci
  ssh-key: ~/.ssh/id_ed25519
session:
  working-directory: /srv/repo
"#;

    let config = UserConfig::try_from(yaml).unwrap();
    let credentials = config.credentials(env).unwrap();

    assert_eq!(
      credentials.ssh_key,
      Some(PathBuf::from("/home/runner/.ssh/id_ed25519"))
    );
    assert!(credentials.password.is_none());
    assert!(config.steps().is_empty());
  }

  #[test]
  fn test_azure_requires_fields() {
    let yaml = r#"
vm:
  size: Standard_NC6s_v3
  resource-group: ci
  location: eastus
admin:
  username: ci
session:
  working-directory: /srv/repo
"#;

    assert_eq!(
      UserConfig::try_from(yaml).unwrap_err(),
      Error::config_error("`vm.image` is required for the azure provider")
    );
  }

  #[test]
  fn test_static_requires_address() {
    let yaml = r#"
vm:
  provider: static
admin:
  username: ci
session:
  working-directory: /srv/repo
"#;

    assert_eq!(
      UserConfig::try_from(yaml).unwrap_err(),
      Error::config_error("`vm.address` is required for the static provider")
    );
  }

  #[test]
  fn test_invalid_env_key() {
    let yaml = r#"
vm:
  provider: static
  address: localhost
admin:
  username: ci
session:
  working-directory: /srv/repo
steps:
  - name: bad
    run: "true"
    environments:
      DEVITO-ARCH: gcc
"#;

    assert_eq!(
      UserConfig::try_from(yaml).unwrap_err(),
      Error::config_error("Step `bad` has invalid environment variable name `DEVITO-ARCH`")
    );
  }

  #[test]
  fn test_duplicate_step_names() {
    let yaml = r#"
vm:
  provider: static
  address: localhost
admin:
  username: ci
session:
  working-directory: /srv/repo
steps:
  - name: tests
    run: "true"
  - name: tests
    run: "false"
"#;

    assert_eq!(
      UserConfig::try_from(yaml).unwrap_err(),
      Error::config_error("Step name `tests` is used more than once")
    );
  }

  #[test]
  fn test_invalid_duration() {
    let yaml = r#"
vm:
  provider: static
  address: localhost
  ready-timeout: soon
admin:
  username: ci
session:
  working-directory: /srv/repo
"#;

    let err = UserConfig::try_from(yaml).unwrap_err();
    assert!(matches!(err, Error::ConfigError(message) if message.starts_with("Invalid duration for `vm.ready-timeout`")));
  }

  #[test]
  fn test_malformed_yaml_message_has_single_prefix() {
    let err = UserConfig::try_from("vm: [unclosed").unwrap_err();
    let message = err.to_string();

    assert!(message.starts_with("Failed to parse config: "));
    assert_eq!(message.matches("Failed to parse config").count(), 1);
  }

  #[test]
  fn test_empty_steps_are_allowed() {
    let yaml = r#"
vm:
  provider: static
  address: localhost
admin:
  username: ci
session:
  working-directory: /srv/repo
steps: []
"#;

    let config = UserConfig::try_from(yaml).unwrap();
    assert!(config.steps().is_empty());
  }
}
