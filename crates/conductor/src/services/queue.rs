//! Bounded-concurrency job scheduler
//!
//! Jobs are admitted FIFO by a single dispatcher task and run under a
//! semaphore capped at the configured concurrency. Each job emits exactly
//! one terminal outcome: only the `Running -> terminal` edge in the shared
//! registry may deliver, so concurrent completion races cannot double-fire.
//! `stop` closes admission and resolves once in-flight jobs finish; queued
//! jobs are abandoned (there is no cancellation hook for executors).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{
    Mutex, OwnedSemaphorePermit, RwLock, Semaphore, broadcast, mpsc, watch,
};
use tokio::task::JoinHandle;

use crate::domain::events::DomainEvent;
use crate::domain::job::{Job, JobOutcome, JobStatus};
use crate::executor::PipelineExecutor;

/// Errors from queue lifecycle operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("no executor configured")]
    NoExecutor,

    #[error("queue already started")]
    AlreadyStarted,
}

/// Point-in-time accounting of the queue.
#[derive(Debug, Clone, Default)]
pub struct QueueStatus {
    /// Jobs waiting for capacity.
    pub queued: usize,
    /// Jobs currently executing.
    pub running: usize,
    /// Jobs finished successfully since startup.
    pub completed: u64,
    /// Jobs finished with an error since startup.
    pub failed: u64,
}

struct QueueState {
    statuses: HashMap<String, JobStatus>,
    queued: usize,
    running: usize,
    completed: u64,
    failed: u64,
    accepting: bool,
}

/// Runs accepted jobs with a fixed concurrency bound.
pub struct JobQueue {
    max_concurrent: usize,
    shared: Arc<RwLock<QueueState>>,
    semaphore: Arc<Semaphore>,
    intake_tx: mpsc::UnboundedSender<Job>,
    intake_rx: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    outcomes_tx: Mutex<Option<mpsc::UnboundedSender<(Job, JobOutcome)>>>,
    outcomes_rx: Mutex<Option<mpsc::UnboundedReceiver<(Job, JobOutcome)>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    executor: Option<Arc<dyn PipelineExecutor>>,
    events: Option<broadcast::Sender<DomainEvent>>,
}

impl JobQueue {
    /// Create a queue that runs at most `max_concurrent` jobs at once.
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let (intake_tx, intake_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            max_concurrent,
            shared: Arc::new(RwLock::new(QueueState {
                statuses: HashMap::new(),
                queued: 0,
                running: 0,
                completed: 0,
                failed: 0,
                accepting: true,
            })),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            intake_tx,
            intake_rx: Mutex::new(Some(intake_rx)),
            outcomes_tx: Mutex::new(Some(outcomes_tx)),
            outcomes_rx: Mutex::new(Some(outcomes_rx)),
            shutdown_tx,
            shutdown_rx,
            dispatcher: Mutex::new(None),
            executor: None,
            events: None,
        }
    }

    /// Attach an event channel.
    pub fn with_events(mut self, events: broadcast::Sender<DomainEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Set the pipeline executor. Must happen before [`JobQueue::start`].
    pub fn set_executor(&mut self, executor: Arc<dyn PipelineExecutor>) {
        self.executor = Some(executor);
    }

    /// Start the dispatcher.
    pub async fn start(&self) -> Result<(), QueueError> {
        let executor = self.executor.clone().ok_or(QueueError::NoExecutor)?;
        let Some(intake_rx) = self.intake_rx.lock().await.take() else {
            return Err(QueueError::AlreadyStarted);
        };
        let outcomes_tx = self
            .outcomes_tx
            .lock()
            .await
            .clone()
            .ok_or(QueueError::AlreadyStarted)?;

        let task = tokio::spawn(run_dispatcher(
            self.shared.clone(),
            self.semaphore.clone(),
            intake_rx,
            outcomes_tx,
            executor,
            self.events.clone(),
            self.shutdown_rx.clone(),
        ));
        *self.dispatcher.lock().await = Some(task);

        tracing::debug!(max_concurrent = self.max_concurrent, "job queue started");
        Ok(())
    }

    /// Accept a job for execution. Never blocks the caller; a stopped queue
    /// drops the job with a warning rather than failing.
    pub async fn enqueue(&self, job: Job) {
        {
            let mut state = self.shared.write().await;
            if !state.accepting {
                tracing::warn!(job = %job.short_id(), "queue stopped; dropping job");
                return;
            }
            state.queued += 1;
            state.statuses.insert(job.job_id.clone(), JobStatus::Queued);
        }

        let job_id = job.job_id.clone();
        if self.intake_tx.send(job).is_err() {
            let mut state = self.shared.write().await;
            state.queued = state.queued.saturating_sub(1);
            state.statuses.remove(&job_id);
            tracing::warn!("dispatcher gone; dropping job");
        }
    }

    /// Take the outcome receiver. Each terminal job is delivered exactly
    /// once to whoever holds this.
    pub async fn take_outcomes(&self) -> Option<mpsc::UnboundedReceiver<(Job, JobOutcome)>> {
        self.outcomes_rx.lock().await.take()
    }

    /// Stop admitting jobs and wait for in-flight work to finish. Queued
    /// jobs never start; the queue cannot be restarted afterwards.
    pub async fn stop(&self) {
        {
            let mut state = self.shared.write().await;
            if !state.accepting {
                return;
            }
            state.accepting = false;
        }
        let _ = self.shutdown_tx.send(true);

        if let Some(dispatcher) = self.dispatcher.lock().await.take() {
            let _ = dispatcher.await;
        }

        // all permits back means no job is still running
        if let Ok(permits) = self
            .semaphore
            .clone()
            .acquire_many_owned(self.max_concurrent as u32)
            .await
        {
            drop(permits);
        }

        // close the outcome channel so the consumer can drain and finish
        self.outcomes_tx.lock().await.take();
        tracing::info!("job queue stopped");
    }

    /// Current queue accounting.
    pub async fn status(&self) -> QueueStatus {
        let state = self.shared.read().await;
        QueueStatus {
            queued: state.queued,
            running: state.running,
            completed: state.completed,
            failed: state.failed,
        }
    }

    /// Status of a live (non-terminal) job.
    pub async fn job_status(&self, job_id: &str) -> Option<JobStatus> {
        self.shared.read().await.statuses.get(job_id).copied()
    }
}

async fn run_dispatcher(
    shared: Arc<RwLock<QueueState>>,
    semaphore: Arc<Semaphore>,
    mut intake_rx: mpsc::UnboundedReceiver<Job>,
    outcomes_tx: mpsc::UnboundedSender<(Job, JobOutcome)>,
    executor: Arc<dyn PipelineExecutor>,
    events: Option<broadcast::Sender<DomainEvent>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let job = tokio::select! {
            _ = shutdown_rx.changed() => break,
            received = intake_rx.recv() => match received {
                Some(job) => job,
                None => break,
            },
        };

        // capacity gate; FIFO because only this task admits
        let permit = tokio::select! {
            _ = shutdown_rx.changed() => break,
            acquired = semaphore.clone().acquire_owned() => match acquired {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        spawn_worker(
            job,
            permit,
            shared.clone(),
            outcomes_tx.clone(),
            executor.clone(),
            events.clone(),
        );
    }
    tracing::debug!("job dispatcher stopped");
}

fn spawn_worker(
    mut job: Job,
    permit: OwnedSemaphorePermit,
    shared: Arc<RwLock<QueueState>>,
    outcomes_tx: mpsc::UnboundedSender<(Job, JobOutcome)>,
    executor: Arc<dyn PipelineExecutor>,
    events: Option<broadcast::Sender<DomainEvent>>,
) {
    tokio::spawn(async move {
        let _permit = permit;

        {
            let mut state = shared.write().await;
            state.queued = state.queued.saturating_sub(1);
            state.running += 1;
            state.statuses.insert(job.job_id.clone(), JobStatus::Running);
        }
        job.status = JobStatus::Running;
        if let Some(events) = &events {
            let _ = events.send(DomainEvent::JobStarted {
                job_id: job.job_id.clone(),
                pipeline: job.pipeline.clone(),
                timestamp: Utc::now(),
            });
        }
        tracing::info!(job = %job.short_id(), pipeline = %job.pipeline, "job started");

        let outcome = match executor
            .execute(&job.pipeline, &job.parameters, job.options.as_ref())
            .await
        {
            Ok(result) => JobOutcome::Completed(result),
            Err(err) => JobOutcome::Failed(err.to_string()),
        };
        let terminal = match &outcome {
            JobOutcome::Completed(_) => JobStatus::Completed,
            JobOutcome::Failed(_) => JobStatus::Failed,
        };

        // only the running -> terminal edge may deliver
        let may_deliver = {
            let mut state = shared.write().await;
            match state.statuses.get(&job.job_id) {
                Some(JobStatus::Running) => {
                    state.statuses.remove(&job.job_id);
                    state.running = state.running.saturating_sub(1);
                    match terminal {
                        JobStatus::Completed => state.completed += 1,
                        _ => state.failed += 1,
                    }
                    true
                }
                _ => false,
            }
        };
        if !may_deliver {
            return;
        }

        job.status = terminal;
        let duration_ms = (Utc::now() - job.created_at).num_milliseconds().max(0) as u64;
        match &outcome {
            JobOutcome::Completed(_) => {
                tracing::info!(job = %job.short_id(), duration_ms, "job completed");
                if let Some(events) = &events {
                    let _ = events.send(DomainEvent::JobCompleted {
                        job_id: job.job_id.clone(),
                        duration_ms,
                        timestamp: Utc::now(),
                    });
                }
            }
            JobOutcome::Failed(error) => {
                tracing::warn!(job = %job.short_id(), error = %error, "job failed");
                if let Some(events) = &events {
                    let _ = events.send(DomainEvent::JobFailed {
                        job_id: job.job_id.clone(),
                        error: error.clone(),
                        timestamp: Utc::now(),
                    });
                }
            }
        }

        if outcomes_tx.send((job, outcome)).is_err() {
            tracing::warn!("no outcome listener; dropping job result");
        }
    });
}
