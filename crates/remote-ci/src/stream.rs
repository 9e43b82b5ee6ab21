use crate::{Log, SessionExit};
use parking_lot::Mutex;
use std::{collections::VecDeque, pin::Pin, sync::Arc, task::Waker};
use tokio_stream::Stream;

#[derive(Debug)]
struct SharedState {
  logs: VecDeque<Log>,
  exit: Option<SessionExit>,
  waker: Option<Waker>,
}

impl SharedState {
  fn wake(&mut self) {
    if let Some(waker) = self.waker.take() {
      waker.wake();
    }
  }
}

/// Output of one remote session. Yields every line in order and ends once the
/// session has exited and all lines were consumed.
#[derive(Debug)]
pub struct StreamReceiver {
  state: Arc<Mutex<SharedState>>,
}

impl StreamReceiver {
  /// Set once the session process is gone.
  pub fn exit(&self) -> Option<SessionExit> {
    self.state.lock().exit.clone()
  }
}

impl Stream for StreamReceiver {
  type Item = Log;

  fn poll_next(
    self: Pin<&mut Self>,
    cx: &mut std::task::Context<'_>,
  ) -> std::task::Poll<Option<Self::Item>> {
    let mut state = self.state.lock();

    if let Some(log) = state.logs.pop_front() {
      return std::task::Poll::Ready(Some(log));
    }

    if state.exit.is_some() {
      return std::task::Poll::Ready(None);
    }

    state.waker = Some(cx.waker().clone());

    std::task::Poll::Pending
  }
}

#[derive(Clone)]
pub struct StreamSender {
  state: Arc<Mutex<SharedState>>,
}

impl StreamSender {
  pub fn log(&self, message: impl Into<String>) {
    self.push(Log::log(message));
  }

  pub fn error(&self, message: impl Into<String>) {
    self.push(Log::error(message));
  }

  fn push(&self, log: Log) {
    let mut state = self.state.lock();
    if state.exit.is_some() {
      log::warn!("Dropping output received after session exit: {}", log.message);
      return;
    }

    state.logs.push_back(log);
    state.wake();
  }

  pub fn exited(&self, exit_code: Option<i32>) {
    self.end(SessionExit { exit_code })
  }

  pub fn end(&self, exit: SessionExit) {
    let mut state = self.state.lock();
    if state.exit.is_none() {
      state.exit = Some(exit);
    }

    state.wake();
  }

  pub fn is_ended(&self) -> bool {
    self.state.lock().exit.is_some()
  }
}

pub fn stream() -> (StreamSender, StreamReceiver) {
  let state = Arc::new(Mutex::new(SharedState {
    logs: VecDeque::new(),
    exit: None,
    waker: None,
  }));

  (
    StreamSender {
      state: state.clone(),
    },
    StreamReceiver { state },
  )
}
