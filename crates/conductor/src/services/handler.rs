//! Protocol state machine for inbound trigger messages
//!
//! Every inbound payload runs validate -> authorize -> ack -> enqueue; the
//! ack reflects acceptance into the queue, not completion, and always
//! reaches the transport before the job can produce a result. Nothing here
//! may escape to the transport's delivery callback: any internal failure
//! becomes a generic error ack and the detail stays server-side.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::events::DomainEvent;
use crate::domain::identity::{normalize, short_identity};
use crate::domain::job::{Job, JobOutcome};
use crate::domain::message::{OutboundMessage, PipelineAck, PipelineResult};
use crate::domain::request::InboundRequest;
use crate::services::auth::IdentityValidator;
use crate::services::queue::JobQueue;
use crate::services::validation::RequestValidator;
use crate::transport::{Envelope, RelayOptions, Transport};

#[derive(Debug, Error)]
enum HandlerError {
    #[error("malformed request: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Drives inbound messages through the protocol and publishes the replies.
pub struct MessageHandler {
    auth: Arc<IdentityValidator>,
    validator: RequestValidator,
    queue: Arc<JobQueue>,
    transport: Arc<dyn Transport>,
    relay_options: RelayOptions,
    estimated_duration: String,
    events: Option<broadcast::Sender<DomainEvent>>,
}

impl MessageHandler {
    pub fn new(
        auth: Arc<IdentityValidator>,
        validator: RequestValidator,
        queue: Arc<JobQueue>,
        transport: Arc<dyn Transport>,
        relay_options: RelayOptions,
        estimated_duration: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            validator,
            queue,
            transport,
            relay_options,
            estimated_duration: estimated_duration.into(),
            events: None,
        }
    }

    /// Attach an event channel.
    pub fn with_events(mut self, events: broadcast::Sender<DomainEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Handle one inbound delivery. Fire-and-forget: every outcome is
    /// communicated through an outbound message, never a return value.
    pub async fn handle(&self, payload: Value, sender: String, envelope: Envelope) {
        tracing::debug!(event = %envelope.event_id, "inbound message");

        let request_id = payload
            .get("requestId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let (ack, job) = match self.process(&payload, &sender, &request_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    event = %envelope.event_id,
                    "internal failure while handling request"
                );
                (PipelineAck::internal_error(request_id), None)
            }
        };

        // the ack goes out before the job can reach the queue, so even an
        // instant executor cannot get its result published first
        self.send(&sender, OutboundMessage::Ack(ack)).await;
        if let Some(job) = job {
            self.queue.enqueue(job).await;
        }
    }

    async fn process(
        &self,
        payload: &Value,
        sender: &str,
        request_id: &str,
    ) -> Result<(PipelineAck, Option<Job>), HandlerError> {
        // structural validation first: authorization is never consulted for
        // malformed payloads
        let report = self.validator.validate(payload);
        if !report.ok {
            if let Some(events) = &self.events {
                let _ = events.send(DomainEvent::RequestRejected {
                    request_id: request_id.to_string(),
                    errors: report.errors.clone(),
                    timestamp: Utc::now(),
                });
            }
            return Ok((
                PipelineAck::validation_error(request_id, report.joined()),
                None,
            ));
        }

        if !self.auth.validate(sender).await {
            return Ok((PipelineAck::unauthorized(request_id), None));
        }

        let request = InboundRequest::from_value(payload)?;
        let job = Job::new(
            Uuid::new_v4().to_string(),
            request_id,
            normalize(sender),
            request.pipeline,
            request.parameters,
            request.options,
        );

        if let Some(events) = &self.events {
            let _ = events.send(DomainEvent::JobReceived {
                job_id: job.job_id.clone(),
                pipeline: job.pipeline.clone(),
                sender: short_identity(sender),
                timestamp: Utc::now(),
            });
        }
        tracing::info!(
            job = %job.short_id(),
            pipeline = %job.pipeline,
            sender = %short_identity(sender),
            "accepted pipeline trigger"
        );

        let ack = PipelineAck::accepted(
            request_id,
            job.job_id.clone(),
            self.estimated_duration.clone(),
        );
        Ok((ack, Some(job)))
    }

    /// Publish the terminal result for a job to its original sender.
    /// Best-effort: a transport failure is logged and terminal.
    pub async fn deliver_result(&self, job: Job, outcome: JobOutcome) {
        let message = match outcome {
            JobOutcome::Completed(result) => {
                PipelineResult::completed(job.request_id.clone(), result)
            }
            JobOutcome::Failed(error) => PipelineResult::failed(job.request_id.clone(), error),
        };
        tracing::debug!(job = %job.short_id(), "delivering result");
        self.send(&job.sender, OutboundMessage::Result(message)).await;
    }

    async fn send(&self, target: &str, message: OutboundMessage) {
        let payload = match message.to_value() {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize outbound message");
                return;
            }
        };

        if let Err(err) = self
            .transport
            .send(target, payload, &self.relay_options)
            .await
        {
            tracing::warn!(
                target = %short_identity(target),
                error = %err,
                "outbound send failed"
            );
        }
    }
}
