// Copyright 2018-2026 the Deno authors. MIT license.

//! A single lane task queue.
//!
//! Tasks submitted to a [`TaskQueue`] run one at a time in submission
//! order. The queue can be paused and resumed, and callers can wait for it
//! to drain.
//!
//! ```
//! use deno_task_queue::TaskQueue;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), deno_task_queue::AnyError> {
//! let queue = TaskQueue::new();
//! let first = queue.add(|| async { Ok(1) });
//! let rest = queue.add_all((2..=3).map(|i| move || async move { Ok(i) }));
//! assert_eq!(queue.len(), 3);
//!
//! assert_eq!(first.await?, 1);
//! assert_eq!(rest.await?, vec![2, 3]);
//! queue.wait().await;
//! assert!(queue.is_empty());
//! # Ok(())
//! # }
//! ```

mod error;
mod gate;
mod lane;
mod queue;

pub use error::AnyError;
pub use error::TaskAbortedError;
pub use error::TaskPanicError;
pub use gate::Gate;
pub use gate::GateState;
pub use lane::LanePermit;
pub use lane::LaneTicket;
pub use lane::SerialLane;
pub use queue::BatchHandle;
pub use queue::TaskHandle;
pub use queue::TaskQueue;
