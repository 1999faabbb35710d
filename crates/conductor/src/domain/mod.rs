//! Domain types for the pipeline trigger protocol

pub mod events;
pub mod identity;
pub mod job;
pub mod message;
pub mod request;

pub use events::DomainEvent;
pub use identity::{is_valid_format, normalize, short_identity};
pub use job::{Job, JobOutcome, JobStatus};
pub use message::{
    AckStatus, ErrorInfo, OutboundMessage, PipelineAck, PipelineResult, ResultError, ResultStatus,
};
pub use request::{InboundRequest, REQUEST_TYPE};
