//! Structural validation of inbound trigger payloads
//!
//! Validation is pure and accumulates every failure instead of stopping at
//! the first, so a sender can fix a request in one round trip. Semantic
//! checks (does the pipeline exist, do the parameters make sense) belong to
//! the execution layer, not here.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::domain::request::REQUEST_TYPE;

/// Maximum serialized request size in bytes.
pub const MAX_REQUEST_BYTES: usize = 100_000;

/// Pipeline names: 1-50 chars of `[A-Za-z0-9_-]`.
static PIPELINE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,50}$").unwrap());

/// Outcome of validating one payload.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn passed() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }

    fn failed(errors: Vec<String>) -> Self {
        Self { ok: false, errors }
    }

    /// All errors joined for an ack message.
    pub fn joined(&self) -> String {
        self.errors.join("; ")
    }
}

/// Validates the structure and size of inbound payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestValidator;

impl RequestValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a raw payload. Pure, no I/O, never panics; cost is linear
    /// in the size of the input.
    pub fn validate(&self, payload: &Value) -> ValidationReport {
        let Some(fields) = payload.as_object() else {
            return ValidationReport::failed(vec!["payload must be a JSON object".to_string()]);
        };

        let mut errors = Vec::new();

        match fields.get("type").and_then(Value::as_str) {
            Some(REQUEST_TYPE) => {}
            Some(other) => errors.push(format!("unsupported type: {other}")),
            None => errors.push(format!("type must be the string \"{REQUEST_TYPE}\"")),
        }

        match fields.get("pipeline") {
            Some(Value::String(name)) if name.is_empty() => {
                errors.push("pipeline must not be empty".to_string());
            }
            Some(Value::String(name)) if !PIPELINE_NAME_RE.is_match(name) => {
                errors.push(
                    "pipeline must be 1-50 characters of letters, digits, '_' or '-'".to_string(),
                );
            }
            Some(Value::String(_)) => {}
            Some(_) => errors.push("pipeline must be a string".to_string()),
            None => errors.push("missing pipeline field".to_string()),
        }

        match fields.get("parameters") {
            // arrays satisfy the object check for wire compatibility with
            // existing senders
            Some(value) if value.is_object() || value.is_array() => {}
            Some(_) => errors.push("parameters must be an object".to_string()),
            None => errors.push("missing parameters field".to_string()),
        }

        if let Some(request_id) = fields.get("requestId") {
            if !request_id.is_string() {
                errors.push("requestId must be a string".to_string());
            }
        }

        if let Some(options) = fields.get("options") {
            if !options.is_null() && !options.is_object() && !options.is_array() {
                errors.push("options must be an object".to_string());
            }
        }

        match serde_json::to_vec(payload) {
            Ok(bytes) if bytes.len() > MAX_REQUEST_BYTES => {
                errors.push(format!("request exceeds {MAX_REQUEST_BYTES} bytes"));
            }
            Ok(_) => {}
            Err(err) => errors.push(format!("request is not serializable: {err}")),
        }

        if errors.is_empty() {
            ValidationReport::passed()
        } else {
            ValidationReport::failed(errors)
        }
    }
}
