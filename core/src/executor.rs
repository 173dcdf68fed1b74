//! Sequential task executor.
//!
//! Both the focus manager and the speech synthesizer serialize their internal
//! state changes on an executor of this kind: a FIFO queue of futures drained
//! one at a time by a single worker task. Public API methods only capture the
//! parameters they need and submit; they never run component logic inline.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tracing::debug;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// FIFO executor backed by one worker task.
///
/// Dropping the executor closes the queue; the worker finishes whatever was
/// already submitted and then exits.
pub struct Executor {
    name: &'static str,
    tx: mpsc::UnboundedSender<Job>,
}

impl Executor {
    /// Spawn the worker task. Must be called from within a tokio runtime.
    pub fn new(name: &'static str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.await;
            }
            debug!(target: "executor", name, "Executor drained and stopped");
        });
        Self { name, tx }
    }

    /// Queue a task for execution. Tasks run in submission order, one at a
    /// time; `submit` itself never blocks.
    pub fn submit<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tx.send(Box::pin(fut)).is_err() {
            debug!(target: "executor", name = self.name, "Submit after shutdown; task dropped");
        }
    }
}
