//! Conductor - trigger long-running generation pipelines over Nostr-style relays
//!
//! Conductor accepts `pipeline-trigger` requests from authenticated senders
//! over a store-less publish/subscribe transport, acknowledges queueing
//! immediately, executes pipelines under a concurrency bound, and delivers
//! results back to the requesting identity:
//!
//! 1. An inbound payload is structurally validated ([`services::RequestValidator`])
//! 2. The sender is checked against the configured allow-list ([`services::IdentityValidator`])
//! 3. The job is queued and acknowledged ([`services::JobQueue`], `pipeline-ack`)
//! 4. On completion a `pipeline-result` is published to the original sender
//!
//! The transport and the pipelines themselves are injected collaborators;
//! see [`transport::Transport`] and [`executor::PipelineExecutor`].

pub mod config;
pub mod domain;
pub mod executor;
pub mod services;
pub mod transport;

pub use config::{ConductorConfig, ConfigError};
pub use domain::{DomainEvent, Job, JobOutcome, JobStatus, OutboundMessage};
pub use executor::{ExecutorError, PipelineExecutor};
pub use services::{
    IdentityValidator, JobQueue, MessageHandler, PipelineService, RequestValidator,
};
pub use transport::{Envelope, RelayOptions, Transport, TransportError};
