use crate::shell_quote;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of an environment override. YAML numbers and booleans are accepted
/// and passed through as their textual form.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum EnvironmentVariable {
  String(String),
  Number(f64),
  Boolean(bool),
}

impl std::fmt::Display for EnvironmentVariable {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      EnvironmentVariable::String(s) => write!(f, "{}", s),
      EnvironmentVariable::Number(n) => write!(f, "{}", n),
      EnvironmentVariable::Boolean(b) => write!(f, "{}", b),
    }
  }
}

impl From<String> for EnvironmentVariable {
  fn from(s: String) -> Self {
    EnvironmentVariable::String(s)
  }
}

impl From<&str> for EnvironmentVariable {
  fn from(s: &str) -> Self {
    EnvironmentVariable::String(s.to_string())
  }
}

impl From<f64> for EnvironmentVariable {
  fn from(n: f64) -> Self {
    EnvironmentVariable::Number(n)
  }
}

impl From<bool> for EnvironmentVariable {
  fn from(b: bool) -> Self {
    EnvironmentVariable::Boolean(b)
  }
}

/// Ordered so rendered scripts are deterministic.
pub type EnvironmentVariables = BTreeMap<String, EnvironmentVariable>;

/// A key must be usable as a POSIX shell variable name.
pub fn is_valid_env_key(key: &str) -> bool {
  let mut chars = key.chars();

  match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
    _ => return false,
  }

  chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `export KEY='value'` statements, one per variable.
pub fn export_statements(environments: &EnvironmentVariables) -> Vec<String> {
  environments
    .iter()
    .map(|(key, value)| format!("export {}={}", key, shell_quote(&value.to_string())))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_to_string() {
    assert_eq!(EnvironmentVariable::from("gcc").to_string(), "gcc");
    assert_eq!(EnvironmentVariable::Number(1.0).to_string(), "1");
    assert_eq!(EnvironmentVariable::Number(0.5).to_string(), "0.5");
    assert_eq!(EnvironmentVariable::Boolean(true).to_string(), "true");
  }

  #[test]
  fn test_valid_keys() {
    assert!(is_valid_env_key("DEVITO_ARCH"));
    assert!(is_valid_env_key("_private"));
    assert!(is_valid_env_key("cuda11"));
    assert!(!is_valid_env_key(""));
    assert!(!is_valid_env_key("1LANG"));
    assert!(!is_valid_env_key("MY-VAR"));
    assert!(!is_valid_env_key("A B"));
  }

  #[test]
  fn test_export_statements_are_sorted_and_quoted() {
    let mut environments = EnvironmentVariables::new();
    environments.insert("ZETA".to_string(), EnvironmentVariable::from("it's"));
    environments.insert("ALPHA".to_string(), EnvironmentVariable::from(2.0));

    assert_eq!(
      export_statements(&environments),
      vec![
        "export ALPHA='2'".to_string(),
        "export ZETA='it'\\''s'".to_string(),
      ]
    );
  }
}
