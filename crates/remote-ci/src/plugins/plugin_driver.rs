use crate::{
  Plugin, ProvisionedEvent, RunResult, RunStartedEvent, SessionLog, StepOutcome, TestStep,
};
use std::sync::Arc;

pub type SharedPluginDriver = Arc<PluginDriver>;

#[derive(Default)]
pub struct PluginDriver {
  pub(crate) plugins: Vec<Box<dyn Plugin>>,
}

impl PluginDriver {
  pub fn new(plugins: Vec<Box<dyn Plugin>>) -> Self {
    PluginDriver { plugins }
  }

  pub async fn on_run_started(&self, event: RunStartedEvent) {
    for plugin in &self.plugins {
      if let Err(err) = plugin.on_run_started(event.clone()).await {
        log::error!(
          "Plugin {} failed to handle run started: {}",
          plugin.name(),
          err
        );
      }
    }
  }

  pub async fn on_provisioned(&self, event: ProvisionedEvent) {
    for plugin in &self.plugins {
      if let Err(err) = plugin.on_provisioned(event.clone()).await {
        log::error!(
          "Plugin {} failed to handle provisioned: {}",
          plugin.name(),
          err
        );
      }
    }
  }

  pub async fn on_log(&self, log: SessionLog) {
    for plugin in &self.plugins {
      if let Err(err) = plugin.on_log(log.clone()).await {
        log::error!("Plugin {} failed to handle log: {}", plugin.name(), err);
      }
    }
  }

  pub async fn on_step_started(&self, step: TestStep) {
    for plugin in &self.plugins {
      if let Err(err) = plugin.on_step_started(step.clone()).await {
        log::error!(
          "Plugin {} failed to handle step started: {}",
          plugin.name(),
          err
        );
      }
    }
  }

  pub async fn on_step_completed(&self, outcome: StepOutcome) {
    for plugin in &self.plugins {
      if let Err(err) = plugin.on_step_completed(outcome.clone()).await {
        log::error!(
          "Plugin {} failed to handle step completed: {}",
          plugin.name(),
          err
        );
      }
    }
  }

  pub async fn on_run_completed(&self, result: RunResult) {
    for plugin in &self.plugins {
      if let Err(err) = plugin.on_run_completed(result.clone()).await {
        log::error!(
          "Plugin {} failed to handle run completed: {}",
          plugin.name(),
          err
        );
      }
    }
  }
}
