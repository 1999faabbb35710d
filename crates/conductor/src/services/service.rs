//! Process-level composition root
//!
//! Wires the validators, queue, and message handler to a transport and a
//! pipeline executor, and owns startup/shutdown. No business logic lives
//! here beyond required-field checks on the configuration.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{ConductorConfig, ConfigError};
use crate::domain::events::DomainEvent;
use crate::executor::PipelineExecutor;
use crate::services::auth::IdentityValidator;
use crate::services::handler::MessageHandler;
use crate::services::queue::{JobQueue, QueueError, QueueStatus};
use crate::services::validation::RequestValidator;
use crate::transport::{DeliveryHandler, Transport, TransportError};

/// Errors from service lifecycle operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("already running")]
    AlreadyRunning,

    #[error("not running")]
    NotRunning,
}

/// The running service: subscription, handler, queue, result delivery.
pub struct PipelineService {
    config: ConductorConfig,
    transport: Arc<dyn Transport>,
    auth: Arc<IdentityValidator>,
    queue: Arc<JobQueue>,
    handler: Arc<MessageHandler>,
    events_tx: broadcast::Sender<DomainEvent>,
    delivery_task: Option<JoinHandle<()>>,
    running: bool,
}

impl PipelineService {
    /// Build the service. Fails fast when the configuration is missing
    /// `authorized_identities`, `relays`, or `private_key`.
    pub fn new(
        config: ConductorConfig,
        transport: Arc<dyn Transport>,
        executor: Arc<dyn PipelineExecutor>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let (events_tx, _) = broadcast::channel(256);

        let auth = Arc::new(
            IdentityValidator::new(&config.authorized_identities)
                .with_ttl(config.auth_cache_ttl())
                .with_events(events_tx.clone()),
        );

        let mut queue =
            JobQueue::new(config.max_concurrent_jobs).with_events(events_tx.clone());
        queue.set_executor(executor);
        let queue = Arc::new(queue);

        let handler = Arc::new(
            MessageHandler::new(
                auth.clone(),
                RequestValidator::new(),
                queue.clone(),
                transport.clone(),
                config.relay_options(),
                config.estimated_duration.clone(),
            )
            .with_events(events_tx.clone()),
        );

        Ok(Self {
            config,
            transport,
            auth,
            queue,
            handler,
            events_tx,
            delivery_task: None,
            running: false,
        })
    }

    /// Start the queue, the result-delivery loop, and the subscription.
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        if self.running {
            return Err(ServiceError::AlreadyRunning);
        }

        self.queue.start().await?;

        let Some(mut outcomes) = self.queue.take_outcomes().await else {
            return Err(ServiceError::Queue(QueueError::AlreadyStarted));
        };
        let handler = self.handler.clone();
        self.delivery_task = Some(tokio::spawn(async move {
            while let Some((job, outcome)) = outcomes.recv().await {
                handler.deliver_result(job, outcome).await;
            }
        }));

        // each delivery is handled on its own task; a bad message can never
        // take down the subscription callback
        let handler = self.handler.clone();
        let on_message: DeliveryHandler = Arc::new(move |payload, sender, envelope| {
            let handler = handler.clone();
            tokio::spawn(async move {
                handler.handle(payload, sender, envelope).await;
            });
        });
        self.transport
            .subscribe(&self.config.relay_options(), on_message)
            .await?;

        self.running = true;
        let _ = self.events_tx.send(DomainEvent::ServiceStarted {
            relays: self.config.relays.clone(),
            timestamp: Utc::now(),
        });
        tracing::info!(
            name = %self.config.name,
            relays = self.config.relays.len(),
            max_concurrent = self.config.max_concurrent_jobs,
            "pipeline service started"
        );
        Ok(())
    }

    /// Close the subscription and drain in-flight jobs.
    pub async fn stop(&mut self) -> Result<(), ServiceError> {
        if !self.running {
            return Err(ServiceError::NotRunning);
        }

        if let Err(err) = self.transport.unsubscribe().await {
            tracing::warn!(error = %err, "failed to close subscription cleanly");
        }
        self.queue.stop().await;
        if let Some(task) = self.delivery_task.take() {
            let _ = task.await;
        }

        self.running = false;
        let _ = self.events_tx.send(DomainEvent::ServiceStopped {
            timestamp: Utc::now(),
        });
        tracing::info!("pipeline service stopped");
        Ok(())
    }

    /// Replace the authorized sender list at runtime.
    pub async fn reload_authorized(&self, identities: Vec<String>) {
        self.auth.reload(identities).await;
    }

    /// Subscribe to domain events.
    pub fn events(&self) -> broadcast::Receiver<DomainEvent> {
        self.events_tx.subscribe()
    }

    /// Current queue accounting.
    pub async fn queue_status(&self) -> QueueStatus {
        self.queue.status().await
    }

    /// Check if running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Get the config.
    pub fn config(&self) -> &ConductorConfig {
        &self.config
    }
}
