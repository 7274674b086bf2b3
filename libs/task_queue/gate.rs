// Copyright 2018-2026 the Deno authors. MIT license.

use std::future::Future;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateState {
  Open,
  Closed,
}

/// A two state signal that any number of futures can wait on.
///
/// While closed, the gate holds a single wait point that every waiter
/// registered during that closed period observes. Opening the gate releases
/// all of them together and discards the wait point. The next close creates
/// a fresh one, so a released wait point is never reused.
#[derive(Debug)]
pub struct Gate {
  // `None` when open
  wait_point: Mutex<Option<CancellationToken>>,
}

impl Default for Gate {
  fn default() -> Self {
    Self::new(GateState::Open)
  }
}

impl Gate {
  pub fn new(state: GateState) -> Self {
    let wait_point = match state {
      GateState::Open => None,
      GateState::Closed => Some(CancellationToken::new()),
    };
    Self {
      wait_point: Mutex::new(wait_point),
    }
  }

  pub fn state(&self) -> GateState {
    if self.wait_point.lock().is_some() {
      GateState::Closed
    } else {
      GateState::Open
    }
  }

  pub fn is_open(&self) -> bool {
    self.state() == GateState::Open
  }

  /// Closes the gate. Does nothing when already closed.
  ///
  /// Returns `true` if this call changed the state.
  pub fn close(&self) -> bool {
    let mut wait_point = self.wait_point.lock();
    if wait_point.is_some() {
      return false;
    }
    *wait_point = Some(CancellationToken::new());
    true
  }

  /// Opens the gate, releasing everything waiting on the current
  /// wait point. Does nothing when already open.
  ///
  /// Returns `true` if this call changed the state.
  pub fn open(&self) -> bool {
    let wait_point = self.wait_point.lock().take();
    match wait_point {
      Some(wait_point) => {
        wait_point.cancel();
        true
      }
      None => false,
    }
  }

  /// Returns a future that resolves once the gate is open.
  ///
  /// The wait point is captured when this is called rather than when the
  /// future is first polled. If the gate is open at that moment, the
  /// returned future is immediately ready.
  pub fn wait_open(&self) -> impl Future<Output = ()> + Send + use<> {
    let wait_point = self.wait_point.lock().clone();
    async move {
      if let Some(wait_point) = wait_point {
        wait_point.cancelled_owned().await;
      }
    }
  }
}
