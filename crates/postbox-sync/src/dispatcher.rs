//! Job queues in front of the [`SyncEngine`].
//!
//! One worker task per [`ActionClass`] drains its own queue serially, so two
//! runs of the same class never overlap while messages, user and state jobs
//! can proceed side by side.  A run that ends in [`SyncOutcome::Failure`] is
//! retried in place with exponential backoff until the retry budget is spent.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use postbox_shared::jobs::{ActionClass, JobInfo, SyncAction};

use crate::engine::{SyncEngine, SyncOutcome};
use crate::error::SyncError;
use crate::retry::RetryConfig;

const QUEUE_CAPACITY: usize = 64;

/// A queued action and, optionally, where to report its final outcome.
struct QueuedJob {
    action: SyncAction,
    reply: Option<oneshot::Sender<SyncOutcome>>,
}

/// Cloneable submission side of the dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    messages: mpsc::Sender<QueuedJob>,
    user: mpsc::Sender<QueuedJob>,
    state: mpsc::Sender<QueuedJob>,
}

impl DispatcherHandle {
    fn queue(&self, class: ActionClass) -> &mpsc::Sender<QueuedJob> {
        match class {
            ActionClass::Messages => &self.messages,
            ActionClass::User => &self.user,
            ActionClass::State => &self.state,
        }
    }

    /// Queue `action` and wait for its final outcome, retries included.
    pub async fn submit(&self, action: SyncAction) -> Result<SyncOutcome, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.queue(action.class())
            .send(QueuedJob {
                action,
                reply: Some(reply),
            })
            .await
            .map_err(|_| SyncError::DispatcherClosed)?;
        rx.await.map_err(|_| SyncError::DispatcherClosed)
    }

    /// Queue `action` without waiting for it to run.
    pub async fn enqueue(&self, action: SyncAction) -> Result<(), SyncError> {
        self.queue(action.class())
            .send(QueuedJob {
                action,
                reply: None,
            })
            .await
            .map_err(|_| SyncError::DispatcherClosed)
    }

    /// Submit a scheduler job.  Unknown actions are dropped with a warning
    /// and report `None`.
    pub async fn submit_job(&self, job: &JobInfo) -> Result<Option<SyncOutcome>, SyncError> {
        match SyncAction::from_job(job) {
            Some(action) => self.submit(action).await.map(Some),
            None => {
                warn!(action = %job.action, "ignoring unknown inbox job");
                Ok(None)
            }
        }
    }
}

/// Owner of the worker tasks.
pub struct JobDispatcher {
    handle: DispatcherHandle,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl JobDispatcher {
    /// Spawn the three class workers on the current runtime.
    pub fn spawn(engine: Arc<SyncEngine>, retry: RetryConfig) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut workers = Vec::with_capacity(3);

        let mut queue = |class: ActionClass| {
            let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
            workers.push(tokio::spawn(run_worker(
                class,
                engine.clone(),
                retry.clone(),
                rx,
                shutdown_rx.clone(),
            )));
            tx
        };

        let handle = DispatcherHandle {
            messages: queue(ActionClass::Messages),
            user: queue(ActionClass::User),
            state: queue(ActionClass::State),
        };

        info!("inbox job dispatcher started");
        Self {
            handle,
            shutdown,
            workers,
        }
    }

    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    /// Stop all workers.  A job that is mid-run finishes its current attempt;
    /// queued jobs are dropped and their submitters see `DispatcherClosed`.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for worker in self.workers {
            let _ = worker.await;
        }
        info!("inbox job dispatcher stopped");
    }
}

async fn run_worker(
    class: ActionClass,
    engine: Arc<SyncEngine>,
    retry: RetryConfig,
    mut jobs: mpsc::Receiver<QueuedJob>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let job = tokio::select! {
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
            _ = shutdown.changed() => break,
        };

        let Some(outcome) = run_with_retry(&engine, &retry, job.action, &mut shutdown).await else {
            break;
        };

        if let Some(reply) = job.reply {
            let _ = reply.send(outcome);
        }
    }
    debug!(?class, "inbox worker exiting");
}

/// `None` when shutdown interrupted a backoff wait.
async fn run_with_retry(
    engine: &SyncEngine,
    retry: &RetryConfig,
    action: SyncAction,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<SyncOutcome> {
    let mut attempt = 0;
    loop {
        let outcome = engine.run(action).await;
        if !outcome.should_retry() {
            return Some(outcome);
        }

        attempt += 1;
        let Some(delay) = retry.delay_for(attempt) else {
            warn!(action = action.name(), attempts = attempt, "inbox job failed, giving up");
            return Some(outcome);
        };

        debug!(action = action.name(), attempt, ?delay, "inbox job failed, retrying");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => return None,
        }
    }
}
