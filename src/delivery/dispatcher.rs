//! Per-backend flush queues.
//!
//! Each backend id gets one bounded queue and one worker task. Flushes of the
//! same backend run strictly one after another; different backends proceed in
//! parallel.

use std::collections::HashMap;
use std::sync::Mutex;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::orchestrator::{FlushOutcome, UploadTask};

struct FlushJob {
    task: UploadTask,
    done: oneshot::Sender<FlushOutcome>,
}

struct Worker {
    tx: mpsc::Sender<FlushJob>,
    handle: JoinHandle<()>,
}

/// Awaitable receipt for a dispatched flush.
///
/// Dropping the handle leaves the flush running in the background.
#[derive(Debug)]
pub struct FlushHandle {
    rx: oneshot::Receiver<FlushOutcome>,
}

impl FlushHandle {
    /// Waits for the flush to finish.
    ///
    /// Returns `None` if the worker went away before running it.
    pub async fn wait(self) -> Option<FlushOutcome> {
        self.rx.await.ok()
    }
}

/// Routes upload tasks to their backend's worker.
pub struct FlushDispatcher {
    capacity: usize,
    workers: Mutex<HashMap<String, Worker>>,
}

impl FlushDispatcher {
    /// `capacity` bounds each backend's queue; a full queue makes `dispatch` wait.
    pub fn new(capacity: usize) -> Self {
        FlushDispatcher {
            capacity: capacity.max(1),
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Queues `task` on its backend's worker, starting the worker if needed.
    pub async fn dispatch(&self, task: UploadTask) -> FlushHandle {
        let (done, rx) = oneshot::channel();
        let tx = self.sender_for(task.backend_id());
        let job = FlushJob { task, done };

        if let Err(mpsc::error::SendError(job)) = tx.send(job).await {
            // The worker exited between lookup and send; run the flush on a fresh one
            log::warn!(
                "[analytics] dispatcher: worker for backend {} stopped, restarting",
                job.task.backend_id()
            );
            self.remove_worker(job.task.backend_id());
            let tx = self.sender_for(job.task.backend_id());
            if let Err(mpsc::error::SendError(job)) = tx.send(job).await {
                log::error!(
                    "[analytics] dispatcher: could not queue flush of session {}",
                    job.task.session_id()
                );
            }
        }

        FlushHandle { rx }
    }

    /// Number of backends with a live worker.
    pub fn worker_count(&self) -> usize {
        self.lock_workers()
            .values()
            .filter(|w| !w.tx.is_closed())
            .count()
    }

    /// Closes every queue and waits for the queued flushes to finish.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.lock_workers();
            workers.drain().map(|(_, worker)| worker.handle).collect()
        };
        log::debug!(
            "[analytics] dispatcher: waiting for {} worker(s) to finish",
            handles.len()
        );
        for result in join_all(handles).await {
            if let Err(e) = result {
                log::error!("[analytics] dispatcher: worker task failed: {e}");
            }
        }
    }

    fn sender_for(&self, backend_id: &str) -> mpsc::Sender<FlushJob> {
        let mut workers = self.lock_workers();
        if let Some(worker) = workers.get(backend_id) {
            if !worker.tx.is_closed() {
                return worker.tx.clone();
            }
        }
        let worker = spawn_worker(backend_id.to_string(), self.capacity);
        let tx = worker.tx.clone();
        workers.insert(backend_id.to_string(), worker);
        tx
    }

    fn remove_worker(&self, backend_id: &str) {
        self.lock_workers().remove(backend_id);
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, HashMap<String, Worker>> {
        self.workers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn spawn_worker(backend_id: String, capacity: usize) -> Worker {
    let (tx, mut rx) = mpsc::channel::<FlushJob>(capacity);
    let handle = tokio::spawn(async move {
        log::debug!("[analytics] dispatcher: worker for backend {backend_id} started");
        while let Some(FlushJob { task, done }) = rx.recv().await {
            let outcome = task.run().await;
            // The caller may have dropped its handle
            let _ = done.send(outcome);
        }
        log::debug!("[analytics] dispatcher: worker for backend {backend_id} stopped");
    });
    Worker { tx, handle }
}
