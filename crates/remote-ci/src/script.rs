use crate::{export_statements, RunId, SessionContext, SyncPlan, TestStep};

pub const MARKER_PREFIX: &str = "::remote-ci::";

/// Name of the shell function sync statements call on failure.
pub(crate) const SYNC_FAILED_FN: &str = "remote_ci_sync_failed";

/// Quotes a value as a single POSIX shell word.
pub fn shell_quote(value: &str) -> String {
  format!("'{}'", value.replace('\'', "'\\''"))
}

/// Like [`shell_quote`] but keeps a leading `~` expanding to `$HOME`.
pub fn shell_path(path: &str) -> String {
  if path == "~" {
    return "\"$HOME\"".to_string();
  }

  match path.strip_prefix("~/") {
    Some(rest) if !rest.is_empty() => format!("\"$HOME\"/{}", shell_quote(rest)),
    Some(_) => "\"$HOME\"".to_string(),
    None => shell_quote(path),
  }
}

/// Progress lines the script prints so the output can be attributed.
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
  SessionOpen,
  SyncBegin,
  SyncFailed { stage: String, exit_code: i32 },
  SyncDone,
  StepBegin { position: usize },
  StepEnd { position: usize, exit_code: i32 },
  Done,
}

impl Marker {
  fn parse_body(body: &str) -> Option<Self> {
    let fields: Vec<&str> = body.split("::").collect();

    let marker = match fields.as_slice() {
      ["session-open"] => Self::SessionOpen,
      ["sync-begin"] => Self::SyncBegin,
      ["sync-failed", stage, exit_code] => Self::SyncFailed {
        stage: stage.to_string(),
        exit_code: exit_code.parse().ok()?,
      },
      ["sync-done"] => Self::SyncDone,
      ["step-begin", position] => Self::StepBegin {
        position: position.parse().ok()?,
      },
      ["step-end", position, exit_code] => Self::StepEnd {
        position: position.parse().ok()?,
        exit_code: exit_code.parse().ok()?,
      },
      ["done"] => Self::Done,
      _ => return None,
    };

    Some(marker)
  }

  fn body(&self) -> String {
    match self {
      Self::SessionOpen => "session-open".to_string(),
      Self::SyncBegin => "sync-begin".to_string(),
      Self::SyncFailed { stage, exit_code } => format!("sync-failed::{}::{}", stage, exit_code),
      Self::SyncDone => "sync-done".to_string(),
      Self::StepBegin { position } => format!("step-begin::{}", position),
      Self::StepEnd {
        position,
        exit_code,
      } => format!("step-end::{}::{}", position, exit_code),
      Self::Done => "done".to_string(),
    }
  }
}

/// Marker lines of one run, prefixed with `::remote-ci::<run id>::`. Lines
/// without this run's id are plain output, whatever else they look like.
#[derive(Debug, Clone, PartialEq)]
pub struct Markers {
  prefix: String,
}

impl Markers {
  pub fn new(id: &RunId) -> Self {
    Self {
      prefix: format!("{}{}::", MARKER_PREFIX, id),
    }
  }

  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  pub fn parse(&self, line: &str) -> Option<Marker> {
    Marker::parse_body(line.trim_end().strip_prefix(self.prefix.as_str())?)
  }

  /// The literal line printed for `marker`.
  pub fn line(&self, marker: &Marker) -> String {
    format!("{}{}", self.prefix, marker.body())
  }

  pub(crate) fn echo(&self, marker: &Marker) -> String {
    format!("echo {}", shell_quote(&self.line(marker)))
  }

  /// `echo` of a marker whose last field is the value of a shell variable.
  pub(crate) fn echo_with_var(&self, body: &str, var: &str) -> String {
    format!(
      "echo {}\"${}\"",
      shell_quote(&format!("{}{}", self.prefix, body)),
      var
    )
  }
}

/// Ordered shell statements executed in one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
  statements: Vec<String>,
  markers: Option<Markers>,
}

impl Script {
  pub fn new() -> Self {
    Self::default()
  }

  /// Full run: preamble, branch synchronization, every step, completion marker.
  pub fn compose(
    ctx: &SessionContext,
    plan: &SyncPlan,
    steps: &[TestStep],
    markers: &Markers,
  ) -> Self {
    let mut script = Self::new();

    script.push("exec 2>&1");
    script.push(markers.echo(&Marker::SessionOpen));
    script.push(format!(
      "{}() {{ echo {}\"$1\"'::'\"$2\"; exit \"$2\"; }}",
      SYNC_FAILED_FN,
      shell_quote(&format!("{}sync-failed::", markers.prefix()))
    ));
    script.extend(export_statements(&ctx.environments));

    script.push(markers.echo(&Marker::SyncBegin));
    script.extend(plan.statements(ctx));
    script.push(markers.echo(&Marker::SyncDone));
    // steps never see the failure helper
    script.push(format!("unset -f {}", SYNC_FAILED_FN));

    for step in steps {
      script.extend(step.statements(markers));
    }

    script.push(markers.echo(&Marker::Done));
    script.push("exit 0");

    script.markers = Some(markers.clone());
    script
  }

  /// Set for composed scripts.
  pub fn markers(&self) -> Option<&Markers> {
    self.markers.as_ref()
  }

  pub fn push(&mut self, statement: impl Into<String>) {
    self.statements.push(statement.into());
  }

  pub fn extend<I, S>(&mut self, statements: I)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self
      .statements
      .extend(statements.into_iter().map(Into::into));
  }

  pub fn statements(&self) -> &[String] {
    &self.statements
  }

  pub fn render(&self) -> String {
    let mut rendered = self.statements.join("\n");
    rendered.push('\n');
    rendered
  }
}
