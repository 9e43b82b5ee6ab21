use crate::{
  Credentials, EffectiveRef, Error, Host, Markers, OutputCollector, Plugin, PluginDriver,
  ProvisionSpec, ProvisionedEvent, Provisioner, Result, RunId, RunRequest, RunResult,
  RunStartedEvent, Script, SessionContext, SessionRunner, SharedPluginDriver, SyncPlan, TestStep,
  VmIdentity, DEFAULT_REF,
};
use std::{sync::Arc, time::Duration};

/// Provisioning parameters shared by every run. The server name is derived per run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VmSettings {
  pub size: String,
  pub image: String,
  pub resource_group: String,
  pub location: String,
  pub name_prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
  pub default_ref: String,
  pub vm: VmSettings,
  pub admin: Credentials,
  pub session: SessionContext,
  pub port: u16,
  pub ready_timeout: Duration,
  pub teardown: bool,
  pub strict_refs: bool,
  pub steps: Vec<TestStep>,
}

impl RunConfig {
  pub fn new(session: SessionContext) -> Self {
    Self {
      default_ref: DEFAULT_REF.to_string(),
      vm: VmSettings::default(),
      admin: Credentials::default(),
      session,
      port: crate::DEFAULT_SSH_PORT,
      ready_timeout: crate::DEFAULT_READY_TIMEOUT,
      teardown: true,
      strict_refs: false,
      steps: vec![],
    }
  }

  pub fn provision_spec(&self, reference: &EffectiveRef) -> ProvisionSpec {
    ProvisionSpec {
      vm_size: self.vm.size.clone(),
      image: self.vm.image.clone(),
      resource_group: self.vm.resource_group.clone(),
      location: self.vm.location.clone(),
      server_name: ProvisionSpec::server_name_for(&self.vm.name_prefix, reference),
      admin: self.admin.clone(),
    }
  }

  /// A request for `triggering_ref` against this repository's default branch.
  pub fn request(&self, triggering_ref: Option<String>) -> RunRequest {
    RunRequest::new(triggering_ref).default_ref(self.default_ref.clone())
  }

  pub fn script(&self, plan: &SyncPlan, markers: &Markers) -> Script {
    Script::compose(&self.session, plan, &self.steps, markers)
  }
}

/// Drives one run end to end: provision, synchronize, test, tear down.
pub struct Orchestrator {
  provisioner: Arc<dyn Provisioner>,
  session_runner: Arc<dyn SessionRunner>,
  plugin_driver: SharedPluginDriver,
  config: RunConfig,
}

impl Orchestrator {
  pub fn builder() -> OrchestratorBuilder {
    OrchestratorBuilder::new()
  }

  pub fn config(&self) -> &RunConfig {
    &self.config
  }

  /// Errors abort the run; failed steps do not and are reported through
  /// `RunResult::succeeded` instead.
  pub async fn run(&self, request: RunRequest) -> Result<RunResult> {
    let id = RunId::generate();
    let started_at = chrono::Utc::now();
    let effective_ref = request.effective_ref();

    if self.config.strict_refs {
      effective_ref.validate_branch_name()?;
    }

    let spec = self.config.provision_spec(&effective_ref);
    log::info!(
      "Run {} targets `{}` on {}",
      id,
      effective_ref.as_str().escape_debug(),
      spec.server_name
    );

    self
      .plugin_driver
      .on_run_started(RunStartedEvent {
        id: id.clone(),
        effective_ref: effective_ref.clone(),
        server_name: spec.server_name.clone(),
      })
      .await;

    let vm = self.provisioner.provision(&spec).await?;
    log::info!("Provisioned {} in {}", vm.name, vm.resource_group);

    let plan = SyncPlan::for_ref(&effective_ref, &request.default_ref);
    let result = self
      .run_on_vm(&id, &vm, &effective_ref, &plan, started_at)
      .await;

    if self.config.teardown {
      self.teardown(&vm).await;
    } else {
      log::info!("Leaving {} running, teardown is disabled", vm.name);
    }

    let result = result?;
    self.plugin_driver.on_run_completed(result.clone()).await;

    Ok(result)
  }

  async fn run_on_vm(
    &self,
    id: &RunId,
    vm: &VmIdentity,
    effective_ref: &EffectiveRef,
    plan: &SyncPlan,
    started_at: chrono::DateTime<chrono::Utc>,
  ) -> Result<RunResult> {
    let address = self.await_address(vm).await?;
    log::info!("{} is reachable at {}", vm.name, address);

    self
      .plugin_driver
      .on_provisioned(ProvisionedEvent {
        id: id.clone(),
        vm_name: vm.name.clone(),
        address: address.clone(),
      })
      .await;

    let host = Host {
      address,
      port: self.config.port,
      credentials: self.config.admin.clone(),
    };

    if self.config.steps.is_empty() {
      log::warn!("No test steps are configured, the run succeeds once the working copy is synchronized");
    }

    let markers = Markers::new(id);
    let script = self.config.script(plan, &markers);
    log::trace!("Remote script:\n{}", script.render());

    let receiver = self.session_runner.open(&host, script).await?;
    let aggregator = OutputCollector::new(&self.config.steps, markers, self.plugin_driver.clone())
      .collect(receiver)
      .await?;

    Ok(aggregator.finish(id.clone(), effective_ref.clone(), Some(started_at)))
  }

  async fn await_address(&self, vm: &VmIdentity) -> Result<String> {
    let timeout = self.config.ready_timeout;

    match tokio::time::timeout(timeout, self.provisioner.await_reachable(vm)).await {
      Ok(address) => address,
      Err(_) => Err(Error::timeout_error(format!(
        "{} had no reachable address after {}",
        vm.name,
        humantime::format_duration(timeout)
      ))),
    }
  }

  async fn teardown(&self, vm: &VmIdentity) {
    log::info!("Tearing down {}", vm.name);

    if let Err(err) = self.provisioner.teardown(vm).await {
      log::error!("Failed to tear down {}: {}", vm.name, err);
    }
  }
}

pub struct OrchestratorBuilder {
  provisioner: Option<Arc<dyn Provisioner>>,
  session_runner: Option<Arc<dyn SessionRunner>>,
  plugins: Vec<Box<dyn Plugin>>,
  config: Option<RunConfig>,
}

impl OrchestratorBuilder {
  pub fn new() -> Self {
    Self {
      provisioner: None,
      session_runner: None,
      plugins: vec![],
      config: None,
    }
  }

  pub fn provisioner<P: Provisioner + 'static>(mut self, provisioner: P) -> Self {
    self.provisioner = Some(Arc::new(provisioner));
    self
  }

  pub fn session_runner<S: SessionRunner + 'static>(mut self, session_runner: S) -> Self {
    self.session_runner = Some(Arc::new(session_runner));
    self
  }

  pub fn plugin<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Box::new(plugin));
    self
  }

  pub fn config(mut self, config: RunConfig) -> Self {
    self.config = Some(config);
    self
  }

  pub fn build(self) -> Result<Orchestrator> {
    let provisioner = self
      .provisioner
      .ok_or_else(|| Error::config_error("OrchestratorBuilder: provisioner is required"))?;
    let session_runner = self
      .session_runner
      .ok_or_else(|| Error::config_error("OrchestratorBuilder: session runner is required"))?;
    let config = self
      .config
      .ok_or_else(|| Error::config_error("OrchestratorBuilder: config is required"))?;

    Ok(Orchestrator {
      provisioner,
      session_runner,
      plugin_driver: Arc::new(PluginDriver::new(self.plugins)),
      config,
    })
  }
}

impl Default for OrchestratorBuilder {
  fn default() -> Self {
    Self::new()
  }
}
