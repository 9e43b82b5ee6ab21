use crate::command::Command;
use remote_ci::{
  Error, ProvisionSpec, Provisioner, Result, VmIdentity, DEFAULT_POLL_INTERVAL,
};
use std::time::Duration;

const PUBLIC_IP_QUERY: &str = "[0].virtualMachine.network.publicIpAddresses[0].ipAddress";

/// Provisions VMs through the Azure CLI, which must be installed and logged in.
#[derive(Debug, Clone)]
pub struct AzureCliProvisioner {
  program: String,
  poll_interval: Duration,
}

impl AzureCliProvisioner {
  pub fn new() -> Self {
    Self {
      program: "az".to_string(),
      poll_interval: DEFAULT_POLL_INTERVAL,
    }
  }

  pub fn program(mut self, program: impl Into<String>) -> Self {
    self.program = program.into();

    self
  }

  pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
    self.poll_interval = poll_interval;

    self
  }

  pub fn create_args(spec: &ProvisionSpec) -> Vec<String> {
    let mut args: Vec<String> = [
      "vm",
      "create",
      "--resource-group",
      spec.resource_group.as_str(),
      "--name",
      spec.server_name.as_str(),
      "--image",
      spec.image.as_str(),
      "--size",
      spec.vm_size.as_str(),
      "--location",
      spec.location.as_str(),
      "--admin-username",
      spec.admin.username.as_str(),
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect();

    match (&spec.admin.ssh_key, &spec.admin.password) {
      (Some(key), _) => {
        args.push("--ssh-key-values".to_string());
        args.push(format!("{}.pub", key.to_string_lossy()));
      }
      (None, Some(password)) => {
        args.push("--authentication-type".to_string());
        args.push("password".to_string());
        args.push("--admin-password".to_string());
        args.push(password.clone());
      }
      (None, None) => args.push("--generate-ssh-keys".to_string()),
    }

    args.push("--output".to_string());
    args.push("json".to_string());

    args
  }

  pub fn list_ip_args(vm: &VmIdentity) -> Vec<String> {
    [
      "vm",
      "list-ip-addresses",
      "--resource-group",
      vm.resource_group.as_str(),
      "--name",
      vm.name.as_str(),
      "--query",
      PUBLIC_IP_QUERY,
      "-o",
      "tsv",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect()
  }

  pub fn delete_args(vm: &VmIdentity) -> Vec<String> {
    [
      "vm",
      "delete",
      "--resource-group",
      vm.resource_group.as_str(),
      "--name",
      vm.name.as_str(),
      "--yes",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect()
  }

  /// Reads `publicIpAddress` from the output of `az vm create`.
  pub fn parse_create_output(output: &str) -> Result<Option<String>> {
    let value: serde_json::Value = serde_json::from_str(output).map_err(|err| {
      Error::provision_error(format!("Unexpected output of `az vm create`: {}", err))
    })?;

    Ok(
      value
        .get("publicIpAddress")
        .and_then(|address| address.as_str())
        .map(|address| address.trim().to_string())
        .filter(|address| !address.is_empty()),
    )
  }

  async fn az(&self, args: Vec<String>) -> Result<String> {
    Command::new(&self.program).args(args).exec().await
  }
}

impl Default for AzureCliProvisioner {
  fn default() -> Self {
    Self::new()
  }
}

#[remote_ci::async_trait]
impl Provisioner for AzureCliProvisioner {
  async fn provision(&self, spec: &ProvisionSpec) -> Result<VmIdentity> {
    log::info!(
      "Creating {} ({}, {}) in {}/{}",
      spec.server_name,
      spec.vm_size,
      spec.image,
      spec.resource_group,
      spec.location
    );

    let output = self
      .az(Self::create_args(spec))
      .await
      .map_err(|err| Error::provision_error(format!("az vm create failed: {}", err)))?;

    Ok(VmIdentity {
      name: spec.server_name.clone(),
      resource_group: spec.resource_group.clone(),
      address: Self::parse_create_output(&output)?,
    })
  }

  async fn await_reachable(&self, vm: &VmIdentity) -> Result<String> {
    if let Some(address) = &vm.address {
      return Ok(address.clone());
    }

    loop {
      match self.az(Self::list_ip_args(vm)).await {
        Ok(address) if !address.is_empty() => return Ok(address),
        Ok(_) => log::debug!("{} has no public address yet", vm.name),
        Err(err) => log::warn!("Failed to query the address of {}: {}", vm.name, err),
      }

      tokio::time::sleep(self.poll_interval).await;
    }
  }

  async fn teardown(&self, vm: &VmIdentity) -> Result<()> {
    self
      .az(Self::delete_args(vm))
      .await
      .map_err(|err| Error::provision_error(format!("az vm delete failed: {}", err)))?;

    log::info!("Deleted {}", vm.name);

    Ok(())
  }
}
