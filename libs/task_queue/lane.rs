// Copyright 2018-2026 the Deno authors. MIT license.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::task::Context;
use std::task::Poll;

use futures::task::AtomicWaker;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct LaneWaiter {
  is_ready: AtomicBool,
  waker: AtomicWaker,
}

#[derive(Debug, Default)]
struct LaneState {
  is_running: bool,
  waiters: VecDeque<Arc<LaneWaiter>>,
}

/// A lane that admits one holder at a time, strictly in the order
/// that slots were reserved.
///
/// Note that tokio's semaphore doesn't maintain order when waiters are
/// registered lazily on first poll, so slots are reserved synchronously
/// here instead.
#[derive(Debug, Default)]
pub struct SerialLane {
  state: Mutex<LaneState>,
}

impl SerialLane {
  /// Reserves the next slot in the lane. The position is taken when
  /// this is called, not when the ticket is first polled.
  pub fn reserve(self: &Arc<Self>) -> LaneTicket {
    let waiter = Arc::new(LaneWaiter::default());
    {
      let mut state = self.state.lock();
      if state.is_running {
        state.waiters.push_back(waiter.clone());
      } else {
        state.is_running = true;
        waiter.is_ready.store(true, Ordering::SeqCst);
      }
    }
    LaneTicket {
      lane: Some(self.clone()),
      waiter,
    }
  }

  /// Runs the future once admitted, holding the lane for its duration.
  /// The slot is reserved immediately.
  pub fn run<R>(
    self: &Arc<Self>,
    future: impl Future<Output = R>,
  ) -> impl Future<Output = R> {
    let ticket = self.reserve();
    async move {
      let _permit = ticket.await;
      future.await
    }
  }

  #[cfg(test)]
  fn waiting(&self) -> usize {
    self.state.lock().waiters.len()
  }

  fn release(&self) {
    let next = {
      let mut state = self.state.lock();
      Self::admit_next(&mut state)
    };
    if let Some(next) = next {
      next.waker.wake();
    }
  }

  fn abandon(&self, waiter: &Arc<LaneWaiter>) {
    let next = {
      let mut state = self.state.lock();
      if waiter.is_ready.load(Ordering::SeqCst) {
        // it was already admitted, so pass the lane along
        Self::admit_next(&mut state)
      } else {
        state.waiters.retain(|w| !Arc::ptr_eq(w, waiter));
        None
      }
    };
    if let Some(next) = next {
      next.waker.wake();
    }
  }

  fn admit_next(state: &mut LaneState) -> Option<Arc<LaneWaiter>> {
    let next = state.waiters.pop_front();
    state.is_running = next.is_some();
    if let Some(next) = &next {
      next.is_ready.store(true, Ordering::SeqCst);
    }
    next
  }
}

/// A reserved slot in a [`SerialLane`] that resolves to a permit once
/// every earlier reservation has been released.
#[must_use = "dropping a ticket gives up its place in the lane"]
#[derive(Debug)]
pub struct LaneTicket {
  // taken once the permit is handed out
  lane: Option<Arc<SerialLane>>,
  waiter: Arc<LaneWaiter>,
}

impl Future for LaneTicket {
  type Output = LanePermit;

  fn poll(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
  ) -> Poll<LanePermit> {
    // update with the latest waker
    self.waiter.waker.register(cx.waker());

    if !self.waiter.is_ready.load(Ordering::SeqCst) {
      return Poll::Pending;
    }
    match self.lane.take() {
      Some(lane) => Poll::Ready(LanePermit(lane)),
      None => panic!("LaneTicket polled after completion"),
    }
  }
}

impl Drop for LaneTicket {
  fn drop(&mut self) {
    if let Some(lane) = self.lane.take() {
      lane.abandon(&self.waiter);
    }
  }
}

/// A permit that when dropped will admit the next reservation.
#[derive(Debug)]
pub struct LanePermit(Arc<SerialLane>);

impl Drop for LanePermit {
  fn drop(&mut self) {
    self.0.release();
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use futures::FutureExt;
  use parking_lot::Mutex;

  use super::SerialLane;

  #[tokio::test]
  async fn lane_runs_one_after_other() {
    let lane = Arc::new(SerialLane::default());
    let mut tasks = Vec::new();
    let data = Arc::new(Mutex::new(0));
    for i in 0..100 {
      let data = data.clone();
      tasks.push(lane.run(async move {
        tokio::task::spawn_blocking(move || {
          let mut data = data.lock();
          if *data != i {
            panic!("Value was not equal.");
          }
          *data = i + 1;
        })
        .await
        .unwrap();
      }));
    }
    futures::future::join_all(tasks).await;
    assert_eq!(*data.lock(), 100);
  }

  #[tokio::test]
  async fn order_is_reservation_order_not_poll_order() {
    let lane = Arc::new(SerialLane::default());
    let first = lane.reserve();
    let second = lane.reserve();
    let third = lane.reserve();
    assert_eq!(lane.waiting(), 2);

    let order = Arc::new(Mutex::new(Vec::new()));
    // spawn in reverse so they are polled in reverse
    let mut handles = Vec::new();
    for (name, ticket) in [(3, third), (2, second)] {
      let order = order.clone();
      handles.push(tokio::spawn(async move {
        let _permit = ticket.await;
        order.lock().push(name);
      }));
    }
    tokio::task::yield_now().await;
    assert!(order.lock().is_empty());

    let permit = first.await;
    order.lock().push(1);
    drop(permit);
    futures::future::join_all(handles).await;
    assert_eq!(*order.lock(), vec![1, 2, 3]);
  }

  #[test]
  fn dropped_waiting_ticket_is_skipped() {
    let lane = Arc::new(SerialLane::default());
    let first = lane.reserve().now_or_never().unwrap();
    let second = lane.reserve();
    let third = lane.reserve();
    drop(second);
    assert_eq!(lane.waiting(), 1);
    drop(first);
    assert!(third.now_or_never().is_some());
  }

  #[test]
  fn dropped_admitted_ticket_passes_lane_on() {
    let lane = Arc::new(SerialLane::default());
    let first = lane.reserve();
    let second = lane.reserve();
    // admitted immediately but never polled
    drop(first);
    let permit = second.now_or_never().unwrap();
    drop(permit);
    assert!(lane.reserve().now_or_never().is_some());
  }
}
