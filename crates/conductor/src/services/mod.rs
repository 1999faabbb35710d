//! Active components of the trigger protocol

pub mod auth;
pub mod handler;
pub mod queue;
pub mod service;
pub mod validation;

pub use auth::IdentityValidator;
pub use handler::MessageHandler;
pub use queue::{JobQueue, QueueError, QueueStatus};
pub use service::{PipelineService, ServiceError};
pub use validation::{RequestValidator, ValidationReport};
