use crate::{
  HookNoopResult, Plugin, ProvisionedEvent, RunResult, RunStartedEvent, SessionLog, StepOutcome,
  TestStep,
};

type OnRunStarted = dyn Fn(RunStartedEvent) -> HookNoopResult + Send + Sync;
type OnProvisioned = dyn Fn(ProvisionedEvent) -> HookNoopResult + Send + Sync;
type OnLog = dyn Fn(SessionLog) -> HookNoopResult + Send + Sync;
type OnStepStarted = dyn Fn(TestStep) -> HookNoopResult + Send + Sync;
type OnStepCompleted = dyn Fn(StepOutcome) -> HookNoopResult + Send + Sync;
type OnRunCompleted = dyn Fn(RunResult) -> HookNoopResult + Send + Sync;

pub struct PluginBuilder {
  name: &'static str,
  on_run_started: Option<Box<OnRunStarted>>,
  on_provisioned: Option<Box<OnProvisioned>>,
  on_log: Option<Box<OnLog>>,
  on_step_started: Option<Box<OnStepStarted>>,
  on_step_completed: Option<Box<OnStepCompleted>>,
  on_run_completed: Option<Box<OnRunCompleted>>,
}

impl PluginBuilder {
  fn new(name: &'static str) -> Self {
    PluginBuilder {
      name,
      on_run_started: None,
      on_provisioned: None,
      on_log: None,
      on_step_started: None,
      on_step_completed: None,
      on_run_completed: None,
    }
  }

  pub fn on_run_started<T>(mut self, on_run_started: T) -> Self
  where
    T: Fn(RunStartedEvent) -> HookNoopResult + 'static + Send + Sync,
  {
    self.on_run_started = Some(Box::new(on_run_started));
    self
  }

  pub fn on_provisioned<T>(mut self, on_provisioned: T) -> Self
  where
    T: Fn(ProvisionedEvent) -> HookNoopResult + 'static + Send + Sync,
  {
    self.on_provisioned = Some(Box::new(on_provisioned));
    self
  }

  pub fn on_log<T>(mut self, on_log: T) -> Self
  where
    T: Fn(SessionLog) -> HookNoopResult + 'static + Send + Sync,
  {
    self.on_log = Some(Box::new(on_log));
    self
  }

  pub fn on_step_started<T>(mut self, on_step_started: T) -> Self
  where
    T: Fn(TestStep) -> HookNoopResult + 'static + Send + Sync,
  {
    self.on_step_started = Some(Box::new(on_step_started));
    self
  }

  pub fn on_step_completed<T>(mut self, on_step_completed: T) -> Self
  where
    T: Fn(StepOutcome) -> HookNoopResult + 'static + Send + Sync,
  {
    self.on_step_completed = Some(Box::new(on_step_completed));
    self
  }

  pub fn on_run_completed<T>(mut self, on_run_completed: T) -> Self
  where
    T: Fn(RunResult) -> HookNoopResult + 'static + Send + Sync,
  {
    self.on_run_completed = Some(Box::new(on_run_completed));
    self
  }

  pub fn build(self) -> RemoteCiPlugin {
    RemoteCiPlugin {
      name: self.name,
      on_run_started: self.on_run_started,
      on_provisioned: self.on_provisioned,
      on_log: self.on_log,
      on_step_started: self.on_step_started,
      on_step_completed: self.on_step_completed,
      on_run_completed: self.on_run_completed,
    }
  }
}

/// `RemoteCiPlugin` defines a plugin from closures, without declaring a new
/// struct to implement the `Plugin` trait.
pub struct RemoteCiPlugin {
  name: &'static str,
  on_run_started: Option<Box<OnRunStarted>>,
  on_provisioned: Option<Box<OnProvisioned>>,
  on_log: Option<Box<OnLog>>,
  on_step_started: Option<Box<OnStepStarted>>,
  on_step_completed: Option<Box<OnStepCompleted>>,
  on_run_completed: Option<Box<OnRunCompleted>>,
}

impl RemoteCiPlugin {
  pub fn builder(name: &'static str) -> PluginBuilder {
    PluginBuilder::new(name)
  }
}

#[async_trait::async_trait]
impl Plugin for RemoteCiPlugin {
  fn name(&self) -> &'static str {
    self.name
  }

  async fn on_run_started(&self, event: RunStartedEvent) -> HookNoopResult {
    if let Some(on_run_started) = &self.on_run_started {
      on_run_started(event)?;
    }

    Ok(())
  }

  async fn on_provisioned(&self, event: ProvisionedEvent) -> HookNoopResult {
    if let Some(on_provisioned) = &self.on_provisioned {
      on_provisioned(event)?;
    }

    Ok(())
  }

  async fn on_log(&self, log: SessionLog) -> HookNoopResult {
    if let Some(on_log) = &self.on_log {
      on_log(log)?;
    }

    Ok(())
  }

  async fn on_step_started(&self, step: TestStep) -> HookNoopResult {
    if let Some(on_step_started) = &self.on_step_started {
      on_step_started(step)?;
    }

    Ok(())
  }

  async fn on_step_completed(&self, outcome: StepOutcome) -> HookNoopResult {
    if let Some(on_step_completed) = &self.on_step_completed {
      on_step_completed(outcome)?;
    }

    Ok(())
  }

  async fn on_run_completed(&self, result: RunResult) -> HookNoopResult {
    if let Some(on_run_completed) = &self.on_run_completed {
      on_run_completed(result)?;
    }

    Ok(())
  }
}
