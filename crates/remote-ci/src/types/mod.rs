mod envs;
mod error;
mod id;
mod results;

pub use envs::*;
pub use error::*;
pub use id::*;
pub use results::*;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
  Error,
  Log,
}

impl std::fmt::Display for LogType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      LogType::Error => write!(f, "error"),
      LogType::Log => write!(f, "log"),
    }
  }
}

/// One line of remote output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Log {
  pub log_type: LogType,
  pub message: String,
}

impl Log {
  pub fn log(message: impl Into<String>) -> Self {
    Self {
      log_type: LogType::Log,
      message: message.into(),
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      log_type: LogType::Error,
      message: message.into(),
    }
  }

  pub fn is_error(&self) -> bool {
    self.log_type == LogType::Error
  }
}

/// An output line as seen by plugins, attributed to the step that printed it.
/// `step` is `None` for synchronization and session output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionLog {
  pub step: Option<usize>,
  pub log_type: LogType,
  pub message: String,
  pub time: chrono::DateTime<chrono::Utc>,
}

impl SessionLog {
  pub fn new(step: Option<usize>, log: Log) -> Self {
    Self {
      step,
      log_type: log.log_type,
      message: log.message,
      time: chrono::Utc::now(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_log() {
    let log = Log::log("test");
    assert_eq!(log.log_type, LogType::Log);
    assert_eq!(log.message, "test");
    assert!(!log.is_error());

    let log = Log::error("test");
    assert_eq!(log.log_type, LogType::Error);
    assert!(log.is_error());
  }

  #[test]
  fn test_session_log() {
    let log = SessionLog::new(Some(2), Log::error("boom"));
    assert_eq!(log.step, Some(2));
    assert_eq!(log.log_type, LogType::Error);
    assert_eq!(log.message, "boom");
    assert_eq!(LogType::Error.to_string(), "error");
  }
}
