//! Serial execution queue.
//!
//! A `SerialQueue` runs submitted async operations strictly one at a time,
//! in the order they were submitted, no matter how many callers share it.
//! Work is handed to a single worker task over an unbounded channel; each
//! task carries a oneshot sender that resolves the submitter's
//! [`Completion`].
//!
//! # Example
//!
//! ```ignore
//! let queue = SerialQueue::new();
//!
//! let first = queue.submit(|| async { Ok(1) });
//! let second = queue.submit(|| async { Ok(2) });
//!
//! // `second` never starts before `first` has settled.
//! assert_eq!(first.await?, 1);
//! assert_eq!(second.await?, 2);
//! ```

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// A queued unit of work. The closure is only called once the worker
/// reaches it.
type Task = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// FIFO runner with at most one operation in flight.
///
/// Must be created from within a Tokio runtime; the worker is spawned on
/// construction and exits once every handle to the queue is dropped and the
/// backlog is drained.
pub struct SerialQueue {
  sender: mpsc::UnboundedSender<Task>,
  /// Submitted but not yet settled, including the running one.
  pending: Arc<AtomicUsize>,
}

impl SerialQueue {
  pub fn new() -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));

    tokio::spawn(run_worker(receiver, Arc::clone(&pending)));

    Self { sender, pending }
  }

  /// Queue an operation and return a handle to its result.
  ///
  /// The task is enqueued before this returns, so the order of `submit`
  /// calls is the execution order. A failure or panic inside `operation`
  /// resolves only this submission's [`Completion`] with an error; later
  /// submissions still run.
  pub fn submit<F, Fut, T>(&self, operation: F) -> Completion<T>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
  {
    let (tx, rx) = oneshot::channel();

    let task: Task = Box::new(move || {
      async move {
        let outcome = AssertUnwindSafe(async move { operation().await })
          .catch_unwind()
          .await
          .unwrap_or_else(|_| Err(eyre!("Queued operation panicked")));

        if let Err(e) = &outcome {
          debug!("Queued operation failed: {}", e);
        }
        // Receiver may have been dropped
        let _ = tx.send(outcome);
      }
      .boxed()
    });

    self.pending.fetch_add(1, Ordering::SeqCst);
    if self.sender.send(task).is_err() {
      // The task (and its sender) is dropped, so the completion reports
      // the closed queue.
      self.pending.fetch_sub(1, Ordering::SeqCst);
      warn!("Serial queue worker is gone; rejecting submission");
    }

    Completion { receiver: rx }
  }

  /// Submit and wait for the result in one step.
  pub async fn run<F, Fut, T>(&self, operation: F) -> Result<T>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
  {
    self.submit(operation).await
  }

  /// Number of operations submitted but not yet settled.
  pub fn pending(&self) -> usize {
    self.pending.load(Ordering::SeqCst)
  }

  /// True when nothing is running or waiting.
  pub fn is_idle(&self) -> bool {
    self.pending() == 0
  }
}

impl Default for SerialQueue {
  fn default() -> Self {
    Self::new()
  }
}

impl std::fmt::Debug for SerialQueue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SerialQueue")
      .field("pending", &self.pending())
      .finish_non_exhaustive()
  }
}

async fn run_worker(mut receiver: mpsc::UnboundedReceiver<Task>, pending: Arc<AtomicUsize>) {
  while let Some(task) = receiver.recv().await {
    task().await;
    pending.fetch_sub(1, Ordering::SeqCst);
  }
  debug!("Serial queue worker stopped");
}

/// Completion handle for a submitted operation.
///
/// Resolves exactly once with the operation's own result. Dropping it does
/// not cancel the queued operation.
#[must_use = "a completion does nothing unless awaited"]
pub struct Completion<T> {
  receiver: oneshot::Receiver<Result<T>>,
}

impl<T> Future for Completion<T> {
  type Output = Result<T>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    match Pin::new(&mut self.receiver).poll(cx) {
      Poll::Ready(Ok(result)) => Poll::Ready(result),
      Poll::Ready(Err(_)) => Poll::Ready(Err(eyre!("Serial queue closed before the operation ran"))),
      Poll::Pending => Poll::Pending,
    }
  }
}
