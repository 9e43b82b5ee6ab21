use crate::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_REF: &str = "master";

/// The ref a run targets after the default has been applied. Never empty.
///
/// The value is untrusted input from the CI trigger: it is only ever
/// interpolated into remote commands through [`crate::shell_quote`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectiveRef(String);

impl EffectiveRef {
  pub fn new(reference: impl Into<String>) -> Self {
    Self(reference.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn is_default(&self, default_ref: &str) -> bool {
    self.0 == default_ref
  }

  /// Checks the ref against git's branch name rules.
  pub fn validate_branch_name(&self) -> Result<()> {
    let name = self.0.as_str();
    let invalid = |reason: &str| {
      Err(Error::config_error(format!(
        "Ref `{}` is not a valid branch name: {}",
        name.escape_debug(),
        reason
      )))
    };

    if name.is_empty() || name == "@" {
      return invalid("empty name");
    }
    if name.starts_with('-') {
      return invalid("starts with `-`");
    }
    if name.starts_with('/') || name.ends_with('/') || name.contains("//") {
      return invalid("empty path component");
    }
    if name.ends_with('.') {
      return invalid("ends with `.`");
    }
    if name.contains("..") || name.contains("@{") {
      return invalid("contains `..` or `@{`");
    }
    if let Some(c) = name
      .chars()
      .find(|c| c.is_ascii_control() || matches!(c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
    {
      return invalid(&format!("contains forbidden character {:?}", c));
    }
    if name
      .split('/')
      .any(|component| component.starts_with('.') || component.ends_with(".lock"))
    {
      return invalid("component starts with `.` or ends with `.lock`");
    }

    Ok(())
  }
}

impl std::fmt::Display for EffectiveRef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Picks the ref for this run: the trigger's ref verbatim, or the default when
/// the trigger carried none.
pub fn resolve(triggering_ref: Option<&str>, default_ref: &str) -> EffectiveRef {
  match triggering_ref {
    Some(reference) if !reference.is_empty() => EffectiveRef::new(reference),
    _ => EffectiveRef::new(default_ref),
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
  pub triggering_ref: Option<String>,
  pub default_ref: String,
}

impl RunRequest {
  pub fn new(triggering_ref: Option<String>) -> Self {
    Self {
      triggering_ref,
      default_ref: DEFAULT_REF.to_string(),
    }
  }

  pub fn default_ref(mut self, default_ref: impl Into<String>) -> Self {
    self.default_ref = default_ref.into();
    self
  }

  pub fn effective_ref(&self) -> EffectiveRef {
    resolve(self.triggering_ref.as_deref(), &self.default_ref)
  }
}

impl Default for RunRequest {
  fn default() -> Self {
    Self::new(None)
  }
}
