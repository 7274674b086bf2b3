// Copyright 2018-2026 the Deno authors. MIT license.

use std::any::Any;

pub use anyhow::Error as AnyError;

/// A task panicked, either while being invoked or while its
/// future was being polled.
#[derive(Debug, thiserror::Error, deno_error::JsError)]
#[class(generic)]
#[error("{message}")]
pub struct TaskPanicError {
  pub message: String,
}

impl TaskPanicError {
  pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
    let message = match payload.downcast::<String>() {
      Ok(message) => *message,
      Err(payload) => match payload.downcast::<&'static str>() {
        Ok(message) => message.to_string(),
        Err(_) => "Task panicked.".to_string(),
      },
    };
    Self { message }
  }
}

/// The task was dropped before it produced an outcome, which happens
/// when the runtime driving it shuts down.
#[derive(Debug, thiserror::Error, deno_error::JsError)]
#[class(generic)]
#[error("Task was dropped before it completed.")]
pub struct TaskAbortedError;
