//! Outbound protocol messages
//!
//! Every inbound request that parses structurally produces exactly one
//! `pipeline-ack`; every accepted job produces exactly one subsequent
//! `pipeline-result`. The ack reflects queueing, not completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error code for structurally invalid requests.
pub const CODE_VALIDATION_ERROR: &str = "VALIDATION_ERROR";
/// Error code for senders that fail authorization.
pub const CODE_UNAUTHORIZED_PUBKEY: &str = "UNAUTHORIZED_PUBKEY";
/// Error code for unexpected handler failures.
pub const CODE_INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Messages published back to a sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    /// Immediate acknowledgment of a trigger request.
    #[serde(rename = "pipeline-ack")]
    Ack(PipelineAck),
    /// Terminal outcome of a previously acknowledged job.
    #[serde(rename = "pipeline-result")]
    Result(PipelineResult),
}

impl OutboundMessage {
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Acknowledgment that a request was accepted, rejected, or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineAck {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub status: AckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Ack status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Accepted,
    Unauthorized,
    Error,
}

/// Structured error payload carried by an ack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl PipelineAck {
    /// Ack for a queued job.
    pub fn accepted(
        request_id: impl Into<String>,
        job_id: impl Into<String>,
        estimated_duration: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            job_id: Some(job_id.into()),
            status: AckStatus::Accepted,
            error: None,
            estimated_duration: Some(estimated_duration.into()),
            timestamp: Utc::now(),
        }
    }

    /// Ack for a sender that failed authorization. Carries no detail about
    /// the allow-list or the identity itself.
    pub fn unauthorized(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            job_id: None,
            status: AckStatus::Unauthorized,
            error: Some(ErrorInfo {
                code: CODE_UNAUTHORIZED_PUBKEY.to_string(),
                message: "sender is not authorized to trigger pipelines".to_string(),
            }),
            estimated_duration: None,
            timestamp: Utc::now(),
        }
    }

    /// Ack for a structurally invalid request.
    pub fn validation_error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::error(request_id, CODE_VALIDATION_ERROR, message)
    }

    /// Ack for an unexpected handler failure. The detail stays server-side.
    pub fn internal_error(request_id: impl Into<String>) -> Self {
        Self::error(request_id, CODE_INTERNAL_ERROR, "internal error")
    }

    fn error(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            job_id: None,
            status: AckStatus::Error,
            error: Some(ErrorInfo {
                code: code.into(),
                message: message.into(),
            }),
            estimated_duration: None,
            timestamp: Utc::now(),
        }
    }
}

/// Terminal outcome message for an accepted job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub request_id: String,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResultError>,
    pub timestamp: DateTime<Utc>,
}

/// Result status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Completed,
    Failed,
}

/// Failure payload carried by a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultError {
    pub message: String,
}

impl PipelineResult {
    pub fn completed(request_id: impl Into<String>, result: Value) -> Self {
        Self {
            request_id: request_id.into(),
            status: ResultStatus::Completed,
            result: Some(result),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: ResultStatus::Failed,
            result: None,
            error: Some(ResultError {
                message: message.into(),
            }),
            timestamp: Utc::now(),
        }
    }
}
