use crate::{
  Aggregator, Error, Log, Marker, Markers, Result, SessionLog, SharedPluginDriver, StepOutcome,
  StreamReceiver, TestStep, Time,
};
use std::collections::VecDeque;
use tokio_stream::StreamExt;

/// Output lines kept outside of steps, quoted in session errors.
const TAIL_LINES: usize = 20;

struct ActiveStep {
  position: usize,
  name: String,
  output: Vec<String>,
  started_at: Time,
}

/// Reads the session stream, attributes lines to steps and turns the
/// markers into outcomes.
pub struct OutputCollector<'a> {
  steps: &'a [TestStep],
  markers: Markers,
  plugin_driver: SharedPluginDriver,
  opened: bool,
  sync_done: bool,
  sync_failure: Option<(String, i32)>,
  done: bool,
  current: Option<ActiveStep>,
  aggregator: Aggregator,
  tail: VecDeque<String>,
}

impl<'a> OutputCollector<'a> {
  pub fn new(steps: &'a [TestStep], markers: Markers, plugin_driver: SharedPluginDriver) -> Self {
    Self {
      steps,
      markers,
      plugin_driver,
      opened: false,
      sync_done: false,
      sync_failure: None,
      done: false,
      current: None,
      aggregator: Aggregator::new(),
      tail: VecDeque::with_capacity(TAIL_LINES),
    }
  }

  pub async fn collect(mut self, mut receiver: StreamReceiver) -> Result<Aggregator> {
    while let Some(log) = receiver.next().await {
      match self.markers.parse(&log.message) {
        Some(marker) => self.on_marker(marker).await,
        None => self.on_output(log).await,
      }
    }

    let exit_code = receiver.exit().and_then(|exit| exit.exit_code);

    if let Some((stage, exit_code)) = self.sync_failure.take() {
      return Err(Error::sync_error(stage, exit_code));
    }

    if !self.opened {
      return Err(Error::session_error(format!(
        "session could not be opened (exit code {}){}",
        describe_exit(exit_code),
        self.describe_tail()
      )));
    }

    if !self.done {
      let stage = if self.sync_done {
        "test steps"
      } else {
        "branch synchronization"
      };

      return Err(Error::session_error(format!(
        "session dropped during {} after {} of {} steps (exit code {}){}",
        stage,
        self.aggregator.outcomes().len(),
        self.steps.len(),
        describe_exit(exit_code),
        self.describe_tail()
      )));
    }

    if exit_code != Some(0) {
      log::warn!(
        "Session reported exit code {} after all steps completed",
        describe_exit(exit_code)
      );
    }

    if self.aggregator.outcomes().len() != self.steps.len() {
      return Err(Error::internal_runtime_error(format!(
        "expected {} step outcomes, received {}",
        self.steps.len(),
        self.aggregator.outcomes().len()
      )));
    }

    Ok(self.aggregator)
  }

  async fn on_marker(&mut self, marker: Marker) {
    log::trace!("Marker {:?}", marker);

    match marker {
      Marker::SessionOpen => self.opened = true,
      Marker::SyncBegin => log::info!("Synchronizing working copy"),
      Marker::SyncDone => {
        self.sync_done = true;
        log::info!("Working copy synchronized");
      }
      Marker::SyncFailed { stage, .. } if self.sync_done => {
        log::warn!(
          "Ignoring synchronization failure at {} reported after synchronization",
          stage
        );
      }
      Marker::SyncFailed { stage, exit_code } => {
        log::error!("Synchronization failed at {} (exit code {})", stage, exit_code);
        self.sync_failure = Some((stage, exit_code));
      }
      Marker::StepBegin { position } => self.begin_step(position).await,
      Marker::StepEnd {
        position,
        exit_code,
      } => self.end_step(position, exit_code).await,
      Marker::Done => self.done = true,
    }
  }

  async fn begin_step(&mut self, position: usize) {
    let steps = self.steps;
    let Some(step) = steps.iter().find(|step| step.position == position) else {
      log::warn!("Ignoring begin marker of unknown step {}", position);
      return;
    };

    if let Some(active) = &self.current {
      log::warn!(
        "Step {} began before step {} ended",
        position,
        active.position
      );
    }

    log::info!("Running step {} `{}`", position, step.name);
    self.plugin_driver.on_step_started(step.clone()).await;

    self.current = Some(ActiveStep {
      position,
      name: step.name.clone(),
      output: vec![],
      started_at: chrono::Utc::now(),
    });
  }

  async fn end_step(&mut self, position: usize, exit_code: i32) {
    let active = match self.current.take() {
      Some(active) if active.position == position => active,
      other => {
        log::warn!("Ignoring end marker of step {} that is not running", position);
        self.current = other;
        return;
      }
    };

    let outcome = StepOutcome {
      position,
      name: active.name,
      succeeded: exit_code == 0,
      exit_code,
      output: active.output,
      started_at: Some(active.started_at),
      completed_at: Some(chrono::Utc::now()),
    };

    if outcome.succeeded {
      log::info!("Step {} `{}` succeeded", position, outcome.name);
    } else {
      log::error!(
        "Step {} `{}` failed with exit code {}",
        position,
        outcome.name,
        exit_code
      );
    }

    self.aggregator.record(outcome.clone());
    self.plugin_driver.on_step_completed(outcome).await;
  }

  async fn on_output(&mut self, log: Log) {
    let step = match &mut self.current {
      Some(active) => {
        active.output.push(log.message.clone());
        Some(active.position)
      }
      None => {
        if self.tail.len() == TAIL_LINES {
          self.tail.pop_front();
        }
        self.tail.push_back(log.message.clone());
        None
      }
    };

    self.plugin_driver.on_log(SessionLog::new(step, log)).await;
  }

  fn describe_tail(&self) -> String {
    if self.tail.is_empty() {
      return String::new();
    }

    format!(": {}", self.tail.iter().cloned().collect::<Vec<_>>().join("\n"))
  }
}

fn describe_exit(exit_code: Option<i32>) -> String {
  exit_code
    .map(|code| code.to_string())
    .unwrap_or_else(|| "none".to_string())
}
