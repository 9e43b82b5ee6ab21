use crate::{EffectiveRef, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Azure limits Linux VM names to 64 characters.
pub const MAX_SERVER_NAME_LENGTH: usize = 64;

/// Opaque credential bundle handed to the provisioner and the session runner.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Credentials {
  pub username: String,
  #[serde(skip_serializing)]
  pub password: Option<String>,
  pub ssh_key: Option<PathBuf>,
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("username", &self.username)
      .field("password", &self.password.as_ref().map(|_| "<redacted>"))
      .field("ssh_key", &self.ssh_key)
      .finish()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionSpec {
  pub vm_size: String,
  pub image: String,
  pub resource_group: String,
  pub location: String,
  pub server_name: String,
  pub admin: Credentials,
}

impl ProvisionSpec {
  /// Deterministic VM name for a ref: lowercase alphanumerics joined by `-`.
  pub fn server_name_for(prefix: &str, reference: &EffectiveRef) -> String {
    let sanitized = sanitize_name(reference.as_str());
    let sanitized = if sanitized.is_empty() {
      "ref".to_string()
    } else {
      sanitized
    };

    let prefix = sanitize_name(prefix);
    let name = if prefix.is_empty() {
      sanitized
    } else {
      format!("{}-{}", prefix, sanitized)
    };

    let name: String = name.chars().take(MAX_SERVER_NAME_LENGTH).collect();
    name.trim_end_matches('-').to_string()
  }
}

fn sanitize_name(value: &str) -> String {
  let mut name = String::with_capacity(value.len());
  for c in value.chars().flat_map(char::to_lowercase) {
    if c.is_ascii_alphanumeric() {
      name.push(c);
    } else if !name.is_empty() && !name.ends_with('-') {
      name.push('-');
    }
  }

  name.trim_end_matches('-').to_string()
}

/// A VM the provisioner created, enough to poll and delete it.
#[derive(Debug, Clone, PartialEq)]
pub struct VmIdentity {
  pub name: String,
  pub resource_group: String,
  /// Address already known at creation time, if any.
  pub address: Option<String>,
}

/// A reachable machine plus the credentials to open a session on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Host {
  pub address: String,
  pub port: u16,
  pub credentials: Credentials,
}

/// # Provisioner
/// Narrow interface to whatever creates the VM. Calls block until they
/// finish; retries, if any, are the implementation's business.
#[async_trait::async_trait]
pub trait Provisioner: Send + Sync {
  async fn provision(&self, spec: &ProvisionSpec) -> Result<VmIdentity>;

  /// Resolves once the VM has an address. The orchestrator bounds the wait.
  async fn await_reachable(&self, vm: &VmIdentity) -> Result<String>;

  async fn teardown(&self, _vm: &VmIdentity) -> Result<()> {
    Ok(())
  }
}

/// A machine that already exists, nothing is created or deleted.
pub struct StaticProvisioner {
  address: String,
}

impl StaticProvisioner {
  pub fn new(address: impl Into<String>) -> Self {
    Self {
      address: address.into(),
    }
  }
}

#[async_trait::async_trait]
impl Provisioner for StaticProvisioner {
  async fn provision(&self, spec: &ProvisionSpec) -> Result<VmIdentity> {
    log::debug!(
      "Static host {} stands in for {}",
      self.address,
      spec.server_name
    );

    Ok(VmIdentity {
      name: spec.server_name.clone(),
      resource_group: spec.resource_group.clone(),
      address: Some(self.address.clone()),
    })
  }

  async fn await_reachable(&self, _vm: &VmIdentity) -> Result<String> {
    Ok(self.address.clone())
  }
}
