//! Bounded FIFO task queue drained by a fixed pool of workers.
//!
//! `submit` waits while the buffer is full; `try_submit` refuses instead. Each
//! task runs under its own deadline with a child of the root cancellation
//! token. A task that outlives its deadline, or is still buffered when a
//! cancelled queue stops, is reported to the processor via `abandon`.
//! Failures are logged and the task discarded; nothing is retried.
use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use grantdb_core::{Task, TaskContext, TaskProcessor};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Task queue is stopped")]
    Closed,

    #[error("Task queue is shutting down")]
    ShuttingDown,

    #[error("Task queue is full")]
    Full,

    #[error("Task queue was already started")]
    AlreadyStarted,
}

pub struct TaskQueue {
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    receiver: Arc<Mutex<mpsc::Receiver<Task>>>,
    processor: Arc<dyn TaskProcessor>,
    workers: usize,
    task_timeout: Duration,
    root: OnceLock<CancellationToken>,
    handles: StdMutex<Vec<JoinHandle<()>>>,
}

impl TaskQueue {
    pub fn new(capacity: usize, workers: usize, task_timeout: Duration, processor: Arc<dyn TaskProcessor>) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Arc::new(Mutex::new(rx)),
            processor,
            workers: workers.max(1),
            task_timeout,
            root: OnceLock::new(),
            handles: StdMutex::new(Vec::new()),
        }
    }

    /// Spawn the worker pool. Workers stop taking new tasks once `root` is
    /// cancelled; a task already running keeps going until it finishes or
    /// its deadline passes.
    pub fn start(&self, root: CancellationToken) -> Result<(), QueueError> {
        self.root.set(root.clone()).map_err(|_| QueueError::AlreadyStarted)?;
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for id in 0..self.workers {
            let worker = Worker {
                id,
                receiver: self.receiver.clone(),
                processor: self.processor.clone(),
                task_timeout: self.task_timeout,
                root: root.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }
        info!(workers = self.workers, timeout_secs = self.task_timeout.as_secs(), "task queue started");
        Ok(())
    }

    /// Enqueue `task`, waiting for room. Calling this after `stop` is a
    /// caller error reported as `QueueError::Closed`.
    pub async fn submit(&self, task: Task) -> Result<(), QueueError> {
        let sender = self.sender.lock().await.clone().ok_or(QueueError::Closed)?;
        match self.root.get() {
            Some(root) => tokio::select! {
                () = root.cancelled() => Err(QueueError::ShuttingDown),
                sent = sender.send(task) => sent.map_err(|_| QueueError::Closed),
            },
            None => sender.send(task).await.map_err(|_| QueueError::Closed),
        }
    }

    /// Enqueue `task` only if there is room right now.
    pub async fn try_submit(&self, task: Task) -> Result<(), QueueError> {
        let sender = self.sender.lock().await.clone().ok_or(QueueError::Closed)?;
        if self.root.get().is_some_and(CancellationToken::is_cancelled) {
            return Err(QueueError::ShuttingDown);
        }
        sender.try_send(task).map_err(|err| match err {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Close the queue and wait for the workers to drain it and exit. Tasks
    /// left in the buffer after a root cancellation are abandoned.
    pub async fn stop(&self) {
        self.sender.lock().await.take();
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "worker ended abnormally");
            }
        }
        let mut receiver = self.receiver.lock().await;
        while let Ok(task) = receiver.try_recv() {
            warn!(task = %task, "queued task dropped at shutdown");
            self.processor.abandon(&task).await;
        }
        info!("task queue stopped");
    }
}

struct Worker {
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Task>>>,
    processor: Arc<dyn TaskProcessor>,
    task_timeout: Duration,
    root: CancellationToken,
}

impl Worker {
    async fn run(self) {
        debug!(worker = self.id, "worker started");
        loop {
            let next = tokio::select! {
                biased;
                () = self.root.cancelled() => None,
                task = next_task(&self.receiver) => task,
            };
            let Some(task) = next else { break };
            self.execute(task).await;
        }
        debug!(worker = self.id, "worker exited");
    }

    async fn execute(&self, task: Task) {
        let ctx = TaskContext::new(self.root.child_token(), self.task_timeout);
        let started = Instant::now();
        match tokio::time::timeout(self.task_timeout, self.processor.process(&task, &ctx)).await {
            Ok(Ok(())) => {
                info!(worker = self.id, task = %task, elapsed_ms = started.elapsed().as_millis(), "task finished");
            }
            Ok(Err(err)) => {
                warn!(worker = self.id, task = %task, error = %format!("{err:#}"), "task failed; discarded");
            }
            Err(_) => {
                ctx.cancel.cancel();
                warn!(worker = self.id, task = %task, timeout_secs = self.task_timeout.as_secs(), "task timed out; abandoned");
                self.processor.abandon(&task).await;
            }
        }
        ctx.cancel.cancel();
    }
}

async fn next_task(receiver: &Mutex<mpsc::Receiver<Task>>) -> Option<Task> {
    receiver.lock().await.recv().await
}
