//! Inbound trigger requests

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire `type` discriminator for pipeline trigger requests.
pub const REQUEST_TYPE: &str = "pipeline-trigger";

/// A pipeline trigger request as received over the wire.
///
/// Deserialized only after [`crate::services::RequestValidator`] has passed
/// the raw payload, so the fields here can be relied on structurally.
/// `parameters` and `options` stay opaque; their interpretation belongs to
/// the pipeline executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    /// Message discriminator, always `pipeline-trigger`.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Sender-supplied correlation id. Generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Name of the pipeline to run.
    pub pipeline: String,
    /// Opaque pipeline parameters (object or array).
    pub parameters: Value,
    /// Optional execution options, passed through to the executor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl InboundRequest {
    /// Deserialize a validated payload.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}
