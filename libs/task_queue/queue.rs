// Copyright 2018-2026 the Deno authors. MIT license.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::error::AnyError;
use crate::error::TaskAbortedError;
use crate::error::TaskPanicError;
use crate::gate::Gate;
use crate::lane::SerialLane;

#[derive(Debug, Default)]
struct TaskQueueInner {
  pending: Mutex<usize>,
  // closed whenever `pending` is non-zero, only changed with `pending` locked
  drain: Gate,
  pause: Gate,
  lane: Arc<SerialLane>,
}

impl TaskQueueInner {
  fn start_one(&self, pending: &mut usize) {
    *pending += 1;
    if *pending == 1 {
      self.drain.close();
      log::trace!("Task queue is busy.");
    }
  }

  fn finish_one(&self) {
    let mut pending = self.pending.lock();
    *pending -= 1;
    if *pending == 0 {
      self.drain.open();
      log::trace!("Task queue drained.");
    }
  }
}

/// Counts a task as pending until dropped.
struct PendingGuard(Arc<TaskQueueInner>);

impl Drop for PendingGuard {
  fn drop(&mut self) {
    self.0.finish_one();
  }
}

/// A queue that runs submitted tasks one at a time in the order they
/// were submitted.
///
/// Tasks are driven by the Tokio runtime the queue is used from, so they
/// run whether or not the returned handles are awaited. A task's failure,
/// including a panic, is only reported through its own handle and never
/// stops the tasks after it.
///
/// Cloning produces another handle to the same queue.
#[derive(Debug, Default, Clone)]
pub struct TaskQueue {
  inner: Arc<TaskQueueInner>,
}

impl TaskQueue {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of tasks that were submitted and have not finished yet,
  /// including the one currently running.
  ///
  /// The count can only be changed by the queue itself:
  ///
  /// ```compile_fail
  /// let queue = deno_task_queue::TaskQueue::new();
  /// queue.len() = 3;
  /// ```
  pub fn len(&self) -> usize {
    *self.inner.pending.lock()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn is_paused(&self) -> bool {
    !self.inner.pause.is_open()
  }

  /// Prevents any further task from starting. A task that is already
  /// running is not interrupted.
  pub fn pause(&self) {
    if self.inner.pause.close() {
      log::debug!("Paused task queue with {} pending task(s).", self.len());
    }
  }

  pub fn resume(&self) {
    if self.inner.pause.open() {
      log::debug!("Resumed task queue with {} pending task(s).", self.len());
    }
  }

  /// Resolves once no tasks are pending.
  ///
  /// Tasks submitted after this is called but before the queue empties
  /// keep it pending until they have finished too.
  pub fn wait(&self) -> impl Future<Output = ()> + Send + use<> {
    self.inner.drain.wait_open()
  }

  /// Submits a task and returns a handle that resolves to its outcome.
  ///
  /// The task is counted as pending as soon as this returns. Must be
  /// called from within a Tokio runtime.
  pub fn add<F, Fut, T>(&self, task: F) -> TaskHandle<T>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, AnyError>> + Send + 'static,
    T: Send + 'static,
  {
    let future = {
      let mut pending = self.inner.pending.lock();
      self.prepare(&mut pending, task)
    };
    TaskHandle::spawn(future)
  }

  /// Submits a synchronous task.
  pub fn add_fn<F, T>(&self, task: F) -> TaskHandle<T>
  where
    F: FnOnce() -> Result<T, AnyError> + Send + 'static,
    T: Send + 'static,
  {
    self.add(move || futures::future::ready(task()))
  }

  /// Submits several tasks as a batch. They run in iteration order with
  /// nothing from other submitters interleaved.
  ///
  /// The returned handle resolves to every result in submission order, or
  /// to the first failure. A failure does not stop the rest of the batch.
  pub fn add_all<I, F, Fut, T>(&self, tasks: I) -> BatchHandle<T>
  where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, AnyError>> + Send + 'static,
    T: Send + 'static,
  {
    let tasks = tasks.into_iter().collect::<Vec<_>>();
    if tasks.is_empty() {
      let results = futures::future::ok::<_, AnyError>(Vec::new());
      return BatchHandle(results.boxed());
    }
    let futures = {
      let mut pending = self.inner.pending.lock();
      tasks
        .into_iter()
        .map(|task| self.prepare(&mut pending, task))
        .collect::<Vec<_>>()
    };
    // spawned outside the lock so a rejected spawn can't deadlock on it
    let handles = futures.into_iter().map(TaskHandle::spawn);
    BatchHandle(futures::future::try_join_all(handles).boxed())
  }

  fn prepare<F, Fut, T>(
    &self,
    pending: &mut usize,
    task: F,
  ) -> impl Future<Output = Result<T, AnyError>> + Send + use<F, Fut, T>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, AnyError>> + Send + 'static,
    T: Send + 'static,
  {
    self.inner.start_one(pending);
    let guard = PendingGuard(self.inner.clone());
    let ticket = self.inner.lane.reserve();
    let inner = self.inner.clone();
    async move {
      let _permit = ticket.await;
      inner.pause.wait_open().await;
      let outcome = invoke(task).await;
      drop(guard);
      outcome
    }
  }
}

async fn invoke<F, Fut, T>(task: F) -> Result<T, AnyError>
where
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<T, AnyError>>,
{
  // the closure is called inside the unwind boundary so a panic while
  // invoking it is treated the same as one while polling
  match AssertUnwindSafe(async move { task().await })
    .catch_unwind()
    .await
  {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(err)) => {
      log::debug!("Task failed: {:#}", err);
      Err(err)
    }
    Err(payload) => {
      let err = TaskPanicError::from_payload(payload);
      log::debug!("Task panicked: {}", err.message);
      Err(err.into())
    }
  }
}

/// Resolves to the outcome of a task submitted with [`TaskQueue::add`].
///
/// Dropping the handle does not cancel the task.
#[derive(Debug)]
pub struct TaskHandle<T>(tokio::task::JoinHandle<Result<T, AnyError>>);

impl<T: Send + 'static> TaskHandle<T> {
  fn spawn<Fut>(future: Fut) -> Self
  where
    Fut: Future<Output = Result<T, AnyError>> + Send + 'static,
  {
    Self(tokio::task::spawn(future))
  }
}

impl<T> Future for TaskHandle<T> {
  type Output = Result<T, AnyError>;

  fn poll(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
  ) -> Poll<Self::Output> {
    match Pin::new(&mut self.0).poll(cx) {
      Poll::Pending => Poll::Pending,
      Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
      Poll::Ready(Err(err)) => {
        log::debug!("Task did not run to completion: {}", err);
        Poll::Ready(Err(TaskAbortedError.into()))
      }
    }
  }
}

/// Resolves to the results of a batch submitted with
/// [`TaskQueue::add_all`].
pub struct BatchHandle<T>(BoxFuture<'static, Result<Vec<T>, AnyError>>);

impl<T> Future for BatchHandle<T> {
  type Output = Result<Vec<T>, AnyError>;

  fn poll(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
  ) -> Poll<Self::Output> {
    self.0.poll_unpin(cx)
  }
}
