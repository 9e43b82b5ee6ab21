use colored::Colorize;
use log::{Level, LevelFilter};
use std::sync::OnceLock;

/// Environment variable that overrides the level passed to [`init_logger_with_level`].
pub const LOG_LEVEL_ENV: &str = "REMOTE_CI_LOG";

#[derive(Clone)]
pub struct Logger {
  level: Level,
}

impl log::Log for Logger {
  fn enabled(&self, metadata: &log::Metadata) -> bool {
    metadata.level() <= self.level
  }

  fn log(&self, record: &log::Record) {
    if !self.enabled(record.metadata()) {
      return;
    }

    let time = chrono::Local::now()
      .format("%Y-%m-%d %H:%M:%S")
      .to_string()
      .magenta();

    let level = match record.level() {
      Level::Error => "ERROR".red(),
      Level::Warn => "WARN".yellow(),
      Level::Info => "INFO".green(),
      Level::Debug => "DEBUG".blue(),
      Level::Trace => "TRACE".dimmed(),
    };

    // Only our own crates carry a useful file:line, dependencies just get the target
    let prefix = match (record.file(), record.line()) {
      (Some(file), Some(line)) if record.target().starts_with("remote_ci") => {
        format!("{}:{} ", file, line).cyan()
      }
      _ => format!("{} ", record.target()).cyan(),
    };

    eprintln!("{}{} {} {}", prefix, time, level, record.args());
  }

  fn flush(&self) {}
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

pub fn init_logger() {
  init_logger_with_level(Level::Debug);
}

/// Installs the logger once, later calls are no-ops.
pub fn init_logger_with_level(level: Level) {
  if LOGGER.get().is_some() {
    return;
  }

  let level = std::env::var(LOG_LEVEL_ENV)
    .ok()
    .and_then(|value| parse_level(&value))
    .unwrap_or(level);

  let logger = LOGGER.get_or_init(|| Logger { level });

  if log::set_logger(logger).is_ok() {
    log::set_max_level(level.to_level_filter());
  }
}

fn parse_level(value: &str) -> Option<Level> {
  match value.trim().parse::<LevelFilter>().ok()? {
    LevelFilter::Off => None,
    filter => filter.to_level(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_level() {
    assert_eq!(parse_level("trace"), Some(Level::Trace));
    assert_eq!(parse_level(" WARN "), Some(Level::Warn));
    assert_eq!(parse_level("off"), None);
    assert_eq!(parse_level("loud"), None);
  }

  #[test]
  fn test_init_twice() {
    init_logger_with_level(Level::Info);
    init_logger();

    log::info!("logger initialized");
  }
}
