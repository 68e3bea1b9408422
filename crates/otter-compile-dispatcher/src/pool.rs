//! Default thread pool for dispatch tasks.
//!
//! A fixed set of named threads pulls tasks from a shared channel. Embedders
//! that already own a platform pool can implement [`TaskRunner`] on it instead.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::error::{DispatchError, DispatchResult};
use crate::task::{TaskRunner, WorkerTask};

/// Fixed-size pool of worker threads.
pub struct WorkerPool {
    task_tx: Mutex<Option<Sender<Box<dyn WorkerTask>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Start a pool with `size` worker threads.
    pub fn new(size: usize) -> DispatchResult<Self> {
        if size == 0 {
            return Err(DispatchError::ZeroWorkers);
        }

        let (task_tx, task_rx) = unbounded::<Box<dyn WorkerTask>>();
        let mut workers = Vec::with_capacity(size);

        for i in 0..size {
            let rx = task_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("otter-opt-worker-{}", i))
                .spawn(move || run_worker(rx))?;
            workers.push(handle);
        }

        Ok(Self {
            task_tx: Mutex::new(Some(task_tx)),
            workers: Mutex::new(workers),
            size,
        })
    }

    /// Start a pool with one thread per CPU core.
    pub fn with_default_size() -> DispatchResult<Self> {
        Self::new(num_cpus::get().max(1))
    }

    /// Number of worker threads the pool was started with.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the pool still accepts tasks.
    pub fn is_running(&self) -> bool {
        self.task_tx.lock().is_some()
    }

    /// Stop accepting tasks and join every worker.
    ///
    /// Tasks already posted still run before the workers exit.
    pub fn shutdown(&self) {
        drop(self.task_tx.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                warn!("optimizing worker thread panicked");
            }
        }
    }
}

impl TaskRunner for WorkerPool {
    fn post_task(&self, task: Box<dyn WorkerTask>) {
        let sender = self.task_tx.lock().clone();
        let Some(sender) = sender else {
            warn!("worker pool shut down, running task on the calling thread");
            task.run();
            return;
        };
        if let Err(err) = sender.send(task) {
            warn!("worker pool disconnected, running task on the calling thread");
            err.0.run();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(task_rx: Receiver<Box<dyn WorkerTask>>) {
    debug!("Optimizing worker starting");
    for task in task_rx {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(move || task.run())) {
            error!(panic = panic_message(&*payload), "Dispatch task panicked");
        }
    }
    debug!("Optimizing worker stopping");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
