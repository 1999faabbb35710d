//! Job lifecycle types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One accepted unit of pipeline execution tied to a request.
///
/// Created by the message handler after authorization succeeds; owned by the
/// job queue from enqueue until a terminal status, then handed back for
/// result delivery. Jobs are not persisted; in-flight work at shutdown is
/// abandoned, not resumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job id, generated at acceptance.
    pub job_id: String,
    /// Correlation id of the originating request.
    pub request_id: String,
    /// Normalized identity of the sender the result is addressed to.
    pub sender: String,
    /// Name of the pipeline to run.
    pub pipeline: String,
    /// Opaque pipeline parameters.
    pub parameters: Value,
    /// Optional execution options.
    pub options: Option<Value>,
    /// Current status.
    pub status: JobStatus,
    /// When the job was accepted.
    pub created_at: DateTime<Utc>,
}

/// Status of a job in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, waiting for capacity.
    Queued,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Terminal outcome of a job, delivered exactly once per job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The executor returned a result value.
    Completed(Value),
    /// The executor failed; only the error message is carried outward.
    Failed(String),
}

impl Job {
    /// Create a new queued job.
    pub fn new(
        job_id: impl Into<String>,
        request_id: impl Into<String>,
        sender: impl Into<String>,
        pipeline: impl Into<String>,
        parameters: Value,
        options: Option<Value>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            request_id: request_id.into(),
            sender: sender.into(),
            pipeline: pipeline.into(),
            parameters,
            options,
            status: JobStatus::Queued,
            created_at: Utc::now(),
        }
    }

    /// Get a short display id.
    pub fn short_id(&self) -> String {
        if self.job_id.len() > 8 {
            self.job_id[..8].to_string()
        } else {
            self.job_id.clone()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_lifecycle_states() {
        let job = Job::new(
            "job-123456789",
            "req-1",
            "17162c921dc4d2518f9a101db33695df1afb56ab82f5ff3e5da07eb3e8690a25",
            "dialogue",
            json!({"sourceText": "t"}),
            None,
        );

        assert_eq!(job.status, JobStatus::Queued);
        assert!(!job.is_terminal());
        assert_eq!(job.short_id(), "job-1234");
    }

    #[test]
    fn test_status_terminality() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(JobStatus::Queued.as_str(), "queued");
        assert_eq!(JobStatus::Running.as_str(), "running");
        assert_eq!(JobStatus::Completed.as_str(), "completed");
        assert_eq!(JobStatus::Failed.as_str(), "failed");
    }
}
