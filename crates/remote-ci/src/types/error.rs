#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("Failed to parse config: {0}")]
  ConfigError(String),

  #[error("Failed to provision VM: {0}")]
  ProvisionError(String),

  #[error("Timed out: {0}")]
  TimeoutError(String),

  #[error("Remote session failed: {0}")]
  SessionError(String),

  #[error("Branch synchronization failed at `{stage}` with exit code {exit_code}")]
  SyncError { stage: String, exit_code: i32 },

  #[error("Test steps failed: {}", .failed.join(", "))]
  StepFailed { failed: Vec<String> },

  #[error("Error while running: {0}")]
  InternalRuntimeError(String),

  #[error("IO error: {0}")]
  IOError(#[from] std::io::Error),
}

impl Error {
  pub fn config_error<T: ToString>(message: T) -> Self {
    Self::ConfigError(message.to_string())
  }

  pub fn provision_error<T: ToString>(message: T) -> Self {
    Self::ProvisionError(message.to_string())
  }

  pub fn timeout_error<T: ToString>(message: T) -> Self {
    Self::TimeoutError(message.to_string())
  }

  pub fn session_error<T: ToString>(message: T) -> Self {
    Self::SessionError(message.to_string())
  }

  pub fn sync_error<T: ToString>(stage: T, exit_code: i32) -> Self {
    Self::SyncError {
      stage: stage.to_string(),
      exit_code,
    }
  }

  pub fn step_failed(failed: Vec<String>) -> Self {
    Self::StepFailed { failed }
  }

  pub fn internal_runtime_error<T: ToString>(message: T) -> Self {
    Self::InternalRuntimeError(message.to_string())
  }

  pub fn io_error(source: std::io::Error) -> Self {
    Self::IOError(source)
  }

  /// Every variant except an aggregate step failure aborts the run before all steps ran.
  pub fn is_fatal(&self) -> bool {
    !matches!(self, Self::StepFailed { .. })
  }
}

// implement PartialEq for Error so that we can compare errors in tests
impl PartialEq for Error {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::ConfigError(a), Self::ConfigError(b)) => a == b,
      (Self::ProvisionError(a), Self::ProvisionError(b)) => a == b,
      (Self::TimeoutError(a), Self::TimeoutError(b)) => a == b,
      (Self::SessionError(a), Self::SessionError(b)) => a == b,
      (
        Self::SyncError {
          stage: a,
          exit_code: x,
        },
        Self::SyncError {
          stage: b,
          exit_code: y,
        },
      ) => a == b && x == y,
      (Self::StepFailed { failed: a }, Self::StepFailed { failed: b }) => a == b,
      (Self::InternalRuntimeError(a), Self::InternalRuntimeError(b)) => a == b,
      (Self::IOError(a), Self::IOError(b)) => a.kind() == b.kind(),
      _ => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_eq() {
    assert_eq!(Error::config_error("hello"), Error::config_error("hello"));
    assert_eq!(
      Error::provision_error("quota"),
      Error::provision_error("quota")
    );
    assert_eq!(
      Error::sync_error("fetch", 128),
      Error::sync_error("fetch", 128)
    );
    assert_eq!(
      Error::io_error(std::io::Error::new(std::io::ErrorKind::Other, "hello")),
      Error::io_error(std::io::Error::new(std::io::ErrorKind::Other, "world"))
    );
  }

  #[test]
  fn test_ne() {
    assert_ne!(Error::session_error("a"), Error::session_error("b"));
    assert_ne!(Error::sync_error("fetch", 1), Error::sync_error("fetch", 2));
    assert_ne!(Error::timeout_error("a"), Error::session_error("a"));
  }

  #[test]
  fn test_display() {
    assert_eq!(
      Error::sync_error("checkout-ref", 1).to_string(),
      "Branch synchronization failed at `checkout-ref` with exit code 1"
    );
    assert_eq!(
      Error::step_failed(vec!["gcc".to_string(), "icc".to_string()]).to_string(),
      "Test steps failed: gcc, icc"
    );
  }

  #[test]
  fn test_is_fatal() {
    assert!(!Error::step_failed(vec![]).is_fatal());
    assert!(Error::session_error("dropped").is_fatal());
    assert!(Error::sync_error("fetch", 1).is_fatal());
    assert!(Error::timeout_error("no address").is_fatal());
  }
}
