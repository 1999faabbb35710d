//! Pipeline execution boundary
//!
//! Pipelines are opaque, named units of work. The queue invokes an executor
//! and treats its return value as the job result and its error message as
//! the job failure; there is no cancellation hook, so an executor that needs
//! a deadline must enforce it internally and report a failure.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by a pipeline executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("unknown pipeline: {0}")]
    UnknownPipeline(String),

    #[error("execution failed: {0}")]
    Failed(String),

    #[error("execution timed out after {0} ms")]
    TimedOut(u64),
}

/// Runs a named pipeline with opaque parameters.
#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    /// Execute `pipeline` with `parameters`, returning the result payload.
    async fn execute(
        &self,
        pipeline: &str,
        parameters: &Value,
        options: Option<&Value>,
    ) -> Result<Value, ExecutorError>;
}
