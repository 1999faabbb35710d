//! Observability events emitted by the service
//!
//! These events represent state changes in the trigger pipeline and can be
//! used for logging, dashboards, and persistence. Sender identities are
//! stored in truncated form; the full value never leaves the component that
//! checked it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events that occur while handling trigger requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The service opened its subscription and accepts requests.
    ServiceStarted {
        relays: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    /// The service closed its subscription and drained the queue.
    ServiceStopped { timestamp: DateTime<Utc> },

    /// An authorized request was accepted and queued.
    JobReceived {
        job_id: String,
        pipeline: String,
        /// Truncated sender identity.
        sender: String,
        timestamp: DateTime<Utc>,
    },
    /// Job execution started.
    JobStarted {
        job_id: String,
        pipeline: String,
        timestamp: DateTime<Utc>,
    },
    /// Job execution finished successfully.
    JobCompleted {
        job_id: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// Job execution failed.
    JobFailed {
        job_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A sender failed authorization.
    SenderRejected {
        /// Truncated sender identity.
        sender: String,
        timestamp: DateTime<Utc>,
    },
    /// A request failed structural validation.
    RequestRejected {
        request_id: String,
        errors: Vec<String>,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::ServiceStarted { timestamp, .. } => *timestamp,
            DomainEvent::ServiceStopped { timestamp } => *timestamp,
            DomainEvent::JobReceived { timestamp, .. } => *timestamp,
            DomainEvent::JobStarted { timestamp, .. } => *timestamp,
            DomainEvent::JobCompleted { timestamp, .. } => *timestamp,
            DomainEvent::JobFailed { timestamp, .. } => *timestamp,
            DomainEvent::SenderRejected { timestamp, .. } => *timestamp,
            DomainEvent::RequestRejected { timestamp, .. } => *timestamp,
        }
    }

    /// Get a short description of the event for logging.
    pub fn description(&self) -> String {
        match self {
            DomainEvent::ServiceStarted { relays, .. } => {
                format!("Service started ({} relays)", relays.len())
            }
            DomainEvent::ServiceStopped { .. } => "Service stopped".to_string(),
            DomainEvent::JobReceived {
                job_id, pipeline, ..
            } => {
                format!("Job received: {} ({})", short_job_id(job_id), pipeline)
            }
            DomainEvent::JobStarted {
                job_id, pipeline, ..
            } => {
                format!("Job started: {} ({})", short_job_id(job_id), pipeline)
            }
            DomainEvent::JobCompleted {
                job_id,
                duration_ms,
                ..
            } => {
                format!(
                    "Job completed: {} ({:.1}s)",
                    short_job_id(job_id),
                    *duration_ms as f64 / 1000.0
                )
            }
            DomainEvent::JobFailed { job_id, error, .. } => {
                format!("Job failed: {} - {}", short_job_id(job_id), error)
            }
            DomainEvent::SenderRejected { sender, .. } => {
                format!("Sender rejected: {sender}")
            }
            DomainEvent::RequestRejected {
                request_id, errors, ..
            } => {
                format!(
                    "Request rejected: {} ({} errors)",
                    request_id,
                    errors.len()
                )
            }
        }
    }
}

fn short_job_id(job_id: &str) -> &str {
    &job_id[..8.min(job_id.len())]
}
