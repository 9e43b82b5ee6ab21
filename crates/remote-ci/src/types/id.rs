use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn generate() -> Self {
    Self(uuid::Uuid::new_v4().to_string())
  }

  pub fn inner(&self) -> &str {
    &self.0
  }
}

impl Default for RunId {
  fn default() -> Self {
    Self::generate()
  }
}

impl std::fmt::Display for RunId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}
