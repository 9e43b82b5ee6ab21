use crate::{EnvironmentVariables, Host, Result, Script, StreamReceiver};
use serde::{Deserialize, Serialize};

pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_SHELL: &str = "bash";

/// Shell-local state of the remote session, rendered into the script
/// preamble and shared by every statement that follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
  /// Checkout of the repository, expected to exist from a previous run.
  pub working_directory: String,
  /// Git remote the working copy fetches from.
  pub remote: String,
  /// Base environment exported before synchronization, visible to every step.
  pub environments: EnvironmentVariables,
  /// Interpreter the script is fed to on the host.
  pub shell: String,
}

impl SessionContext {
  pub fn new(working_directory: impl Into<String>) -> Self {
    Self {
      working_directory: working_directory.into(),
      remote: DEFAULT_REMOTE.to_string(),
      environments: EnvironmentVariables::new(),
      shell: DEFAULT_SHELL.to_string(),
    }
  }

  pub fn remote(mut self, remote: impl Into<String>) -> Self {
    self.remote = remote.into();
    self
  }

  pub fn shell(mut self, shell: impl Into<String>) -> Self {
    self.shell = shell.into();
    self
  }

  pub fn environments(mut self, environments: EnvironmentVariables) -> Self {
    self.environments = environments;
    self
  }
}

/// How the session process ended. `exit_code` is `None` when it was killed by a signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionExit {
  pub exit_code: Option<i32>,
}

impl SessionExit {
  pub fn success(&self) -> bool {
    self.exit_code == Some(0)
  }
}

/// # SessionRunner
/// Opens exactly one authenticated session on a host and feeds it the whole
/// script. The returned stream carries every output line until the session
/// ends; an error means the session could not be started at all.
#[async_trait::async_trait]
pub trait SessionRunner: Send + Sync {
  async fn open(&self, host: &Host, script: Script) -> Result<StreamReceiver>;
}
