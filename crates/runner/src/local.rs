use crate::command::Command;
use remote_ci::{Host, Result, Script, SessionRunner, StreamReceiver, DEFAULT_SHELL};
use std::path::PathBuf;

/// Feeds the script to `<shell> -s` on this machine. The host is ignored,
/// which makes it suitable for self-hosted runners and for tests.
#[derive(Debug, Clone)]
pub struct LocalShellRunner {
  pub working_directory: PathBuf,
  shell: String,
}

impl LocalShellRunner {
  pub fn new(working_directory: impl Into<PathBuf>) -> Self {
    Self {
      working_directory: working_directory.into(),
      shell: DEFAULT_SHELL.to_string(),
    }
  }

  pub fn shell(mut self, shell: impl Into<String>) -> Self {
    self.shell = shell.into();

    self
  }
}

#[remote_ci::async_trait]
impl SessionRunner for LocalShellRunner {
  async fn open(&self, host: &Host, script: Script) -> Result<StreamReceiver> {
    log::debug!(
      "Running session for {} locally with {} in {}",
      host.address,
      self.shell,
      self.working_directory.display()
    );

    Command::new(&self.shell)
      .arg("-s")
      .dir(&self.working_directory)
      .stdin(script.render())
      .run()
  }
}
