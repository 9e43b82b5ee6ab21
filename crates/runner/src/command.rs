use remote_ci::{stream, Error, Result, StreamReceiver};
use std::{path::Path, process::Stdio};
use tokio::{
  io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader},
  process::Command as Cmd,
};

/// A child process whose output is either collected at once ([`Command::exec`])
/// or streamed line by line ([`Command::run`]).
pub struct Command {
  program: String,
  command: Cmd,
  stdin: Option<String>,
}

impl Command {
  pub fn new(program: impl Into<String>) -> Self {
    let program: String = program.into();
    let command = Cmd::new(&program);

    Command {
      program,
      command,
      stdin: None,
    }
  }

  pub fn sh(cmd: impl Into<String>) -> Self {
    let mut command = Command::new("sh");

    command.arg("-c").arg(cmd.into());

    command
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
    self.command.env(key.into(), value.into());

    self
  }

  pub fn dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
    self.command.current_dir(dir);

    self
  }

  pub fn arg<S>(&mut self, arg: S) -> &mut Self
  where
    S: AsRef<std::ffi::OsStr>,
  {
    self.command.arg(arg);

    self
  }

  pub fn args<I, S>(&mut self, args: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
  {
    self.command.args(args);

    self
  }

  /// Written to the child's stdin, which is closed afterwards.
  pub fn stdin(&mut self, input: impl Into<String>) -> &mut Self {
    self.stdin = Some(input.into());

    self
  }

  pub async fn exec(&mut self) -> Result<String> {
    let stdin_mode = self.stdin_mode();
    let mut child = self
      .command
      .stdin(stdin_mode)
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|err| self.spawn_error(err))?;

    if let (Some(input), Some(mut stdin)) = (self.stdin.take(), child.stdin.take()) {
      stdin.write_all(input.as_bytes()).await?;
    }

    let output = child.wait_with_output().await.map_err(|err| {
      Error::internal_runtime_error(format!("Failed to wait for `{}`: {}", self.program, err))
    })?;

    if output.status.success() {
      let stdout = String::from_utf8(output.stdout)
        .map_err(|err| Error::internal_runtime_error(format!("Failed to parse stdout: {}", err)))?;
      return Ok(stdout.trim().to_string());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    Err(Error::internal_runtime_error(format!(
      "`{}` exited with {}: {}",
      self.program, output.status, stderr
    )))
  }

  /// Spawns the child and streams stdout as logs and stderr as error logs.
  /// The stream ends with the child's exit code once both pipes are drained.
  pub fn run(&mut self) -> Result<StreamReceiver> {
    let stdin_mode = self.stdin_mode();
    let mut child = self
      .command
      .stdin(stdin_mode)
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|err| Error::session_error(self.spawn_error(err).to_string()))?;

    let out = child.stdout.take().ok_or(Error::internal_runtime_error(
      "Failed to get stdout from child process".to_string(),
    ))?;
    let err = child.stderr.take().ok_or(Error::internal_runtime_error(
      "Failed to get stderr from child process".to_string(),
    ))?;

    if let (Some(input), Some(mut stdin)) = (self.stdin.take(), child.stdin.take()) {
      let program = self.program.clone();
      tokio::spawn(async move {
        if let Err(err) = stdin.write_all(input.as_bytes()).await {
          log::warn!("Failed to write stdin of `{}`: {}", program, err);
        }
      });
    }

    let (sender, receiver) = stream();
    let program = self.program.clone();

    tokio::spawn(async move {
      let mut stdout = BufReader::new(out);
      let mut stderr = BufReader::new(err);
      let mut out_buf = vec![];
      let mut err_buf = vec![];
      let mut stdout_open = true;
      let mut stderr_open = true;

      while stdout_open || stderr_open {
        tokio::select! {
          line = next_line(&mut stdout, &mut out_buf), if stdout_open => {
            match line {
              Ok(Some(line)) => sender.log(line),
              Ok(None) => stdout_open = false,
              Err(err) => {
                sender.error(err.to_string());
                stdout_open = false;
              }
            }
          }
          error = next_line(&mut stderr, &mut err_buf), if stderr_open => {
            match error {
              Ok(Some(error)) => sender.error(error),
              Ok(None) => stderr_open = false,
              Err(err) => {
                sender.error(err.to_string());
                stderr_open = false;
              }
            }
          }
        }
      }

      match child.wait().await {
        Ok(status) => {
          log::trace!("`{}` exited with {}", program, status);
          sender.exited(status.code());
        }
        Err(err) => {
          sender.error(format!("Failed to wait for `{}`: {}", program, err));
          sender.exited(None);
        }
      }
    });

    Ok(receiver)
  }

  fn stdin_mode(&self) -> Stdio {
    if self.stdin.is_some() {
      Stdio::piped()
    } else {
      Stdio::null()
    }
  }

  fn spawn_error(&self, err: std::io::Error) -> Error {
    Error::internal_runtime_error(format!("Failed to spawn `{}`: {}", self.program, err))
  }
}

/// Reads one line and decodes it lossily, so bytes that are not UTF-8 never
/// stop the stream. Partial reads stay in `buf` when the future is dropped.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
  R: AsyncBufRead + Unpin,
{
  let read = reader.read_until(b'\n', buf).await?;
  if read == 0 && buf.is_empty() {
    return Ok(None);
  }

  let mut line = &buf[..];
  if let Some(rest) = line.strip_suffix(b"\n") {
    line = rest;
  }
  if let Some(rest) = line.strip_suffix(b"\r") {
    line = rest;
  }

  let line = String::from_utf8_lossy(line).into_owned();
  buf.clear();

  Ok(Some(line))
}
