use crate::command::Command;
use remote_ci::{
  Host, Result, Script, SessionRunner, StreamReceiver, DEFAULT_CONNECT_TIMEOUT, DEFAULT_SHELL,
};
use std::time::Duration;

/// Environment variable `sshpass -e` reads the password from.
pub const SSHPASS_ENV: &str = "SSHPASS";

/// Opens one `ssh` connection per run and feeds the script to the remote
/// shell over stdin.
#[derive(Debug, Clone)]
pub struct SshSessionRunner {
  connect_timeout: Duration,
  shell: String,
}

impl SshSessionRunner {
  pub fn new() -> Self {
    Self {
      connect_timeout: DEFAULT_CONNECT_TIMEOUT,
      shell: DEFAULT_SHELL.to_string(),
    }
  }

  pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
    self.connect_timeout = connect_timeout;

    self
  }

  pub fn shell(mut self, shell: impl Into<String>) -> Self {
    self.shell = shell.into();

    self
  }

  /// Password authentication is only used when no key is configured.
  fn password<'a>(&self, host: &'a Host) -> Option<&'a str> {
    match (&host.credentials.ssh_key, &host.credentials.password) {
      (None, Some(password)) => Some(password.as_str()),
      _ => None,
    }
  }

  pub fn ssh_args(&self, host: &Host) -> Vec<String> {
    let mut args = vec!["-T".to_string()];

    let mut option = |value: String| {
      args.push("-o".to_string());
      args.push(value);
    };

    if self.password(host).is_some() {
      option("NumberOfPasswordPrompts=1".to_string());
    } else {
      option("BatchMode=yes".to_string());
    }
    option(format!(
      "ConnectTimeout={}",
      self.connect_timeout.as_secs().max(1)
    ));
    option("StrictHostKeyChecking=accept-new".to_string());

    args.push("-p".to_string());
    args.push(host.port.to_string());

    if let Some(key) = &host.credentials.ssh_key {
      args.push("-i".to_string());
      args.push(key.to_string_lossy().to_string());
    }

    args.push(format!("{}@{}", host.credentials.username, host.address));
    args.push(self.shell.clone());
    args.push("-s".to_string());

    args
  }

  pub fn command(&self, host: &Host) -> Command {
    let args = self.ssh_args(host);

    match self.password(host) {
      Some(password) => {
        let mut command = Command::new("sshpass");
        command.arg("-e").arg("ssh").args(args).env(SSHPASS_ENV, password);
        command
      }
      None => {
        let mut command = Command::new("ssh");
        command.args(args);
        command
      }
    }
  }
}

impl Default for SshSessionRunner {
  fn default() -> Self {
    Self::new()
  }
}

#[remote_ci::async_trait]
impl SessionRunner for SshSessionRunner {
  async fn open(&self, host: &Host, script: Script) -> Result<StreamReceiver> {
    let mut command = self.command(host);
    log::debug!(
      "Opening session to {}@{}:{} via {}",
      host.credentials.username,
      host.address,
      host.port,
      command.program()
    );

    command.stdin(script.render()).run()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use remote_ci::Credentials;
  use std::path::PathBuf;

  fn host(credentials: Credentials) -> Host {
    Host {
      address: "20.1.2.3".to_string(),
      port: 2222,
      credentials,
    }
  }

  #[test]
  fn test_key_auth_args() {
    let host = host(Credentials {
      username: "devito".to_string(),
      password: Some("ignored".to_string()),
      ssh_key: Some(PathBuf::from("/keys/ci")),
    });
    let runner = SshSessionRunner::new().connect_timeout(Duration::from_secs(15));

    assert_eq!(
      runner.ssh_args(&host),
      vec![
        "-T",
        "-o",
        "BatchMode=yes",
        "-o",
        "ConnectTimeout=15",
        "-o",
        "StrictHostKeyChecking=accept-new",
        "-p",
        "2222",
        "-i",
        "/keys/ci",
        "devito@20.1.2.3",
        "bash",
        "-s",
      ]
    );
    assert_eq!(runner.command(&host).program(), "ssh");
  }

  #[test]
  fn test_password_auth_uses_sshpass() {
    let host = host(Credentials {
      username: "devito".to_string(),
      password: Some("hunter2".to_string()),
      ssh_key: None,
    });
    let runner = SshSessionRunner::new().shell("sh");
    let args = runner.ssh_args(&host);

    assert!(!args.contains(&"BatchMode=yes".to_string()));
    assert!(args.contains(&"NumberOfPasswordPrompts=1".to_string()));
    assert!(!args.iter().any(|arg| arg.contains("hunter2")));
    assert_eq!(&args[args.len() - 2..], ["sh", "-s"]);
    assert_eq!(runner.command(&host).program(), "sshpass");
  }

  #[test]
  fn test_connect_timeout_is_at_least_one_second() {
    let runner = SshSessionRunner::new().connect_timeout(Duration::from_millis(10));
    let args = runner.ssh_args(&host(Credentials::default()));

    assert!(args.contains(&"ConnectTimeout=1".to_string()));
  }
}
