//! End-to-end protocol scenarios
//!
//! Drives a full `PipelineService` through an in-memory transport: inbound
//! deliveries are injected by hand and outbound messages are recorded, with
//! a scripted executor standing in for real pipelines.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use conductor::config::ConductorConfig;
use conductor::executor::{ExecutorError, PipelineExecutor};
use conductor::services::PipelineService;
use conductor::transport::{
    DeliveryHandler, Envelope, RelayOptions, Transport, TransportError,
};

const AUTHORIZED: &str = "17162c921dc4d2518f9a101db33695df1afb56ab82f5ff3e5da07eb3e8690a25";
const STRANGER: &str = "99990c921dc4d2518f9a101db33695df1afb56ab82f5ff3e5da07eb3e8690a25";

/// In-memory transport: records publishes, hands deliveries to the service.
struct FakeRelay {
    sent: Mutex<Vec<(String, Value)>>,
    delivery: Mutex<Option<DeliveryHandler>>,
}

impl FakeRelay {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            delivery: Mutex::new(None),
        })
    }

    /// Inject one inbound message as the transport would.
    async fn deliver(&self, payload: Value, sender: &str) {
        let handler = self
            .delivery
            .lock()
            .await
            .clone()
            .expect("subscription should be open");
        handler(payload, sender.to_string(), Envelope::new("evt-test"));
    }

    async fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().await.clone()
    }

    /// Wait until at least `count` outbound messages were published.
    async fn wait_for_sent(&self, count: usize) -> Vec<(String, Value)> {
        for _ in 0..300 {
            let sent = self.sent.lock().await.clone();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {count} outbound messages");
    }
}

#[async_trait]
impl Transport for FakeRelay {
    async fn send(
        &self,
        target: &str,
        payload: Value,
        _options: &RelayOptions,
    ) -> Result<String, TransportError> {
        self.sent.lock().await.push((target.to_string(), payload));
        Ok("msg-id".to_string())
    }

    async fn subscribe(
        &self,
        _options: &RelayOptions,
        on_message: DeliveryHandler,
    ) -> Result<(), TransportError> {
        *self.delivery.lock().await = Some(on_message);
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<(), TransportError> {
        *self.delivery.lock().await = None;
        Ok(())
    }
}

/// Executor that succeeds for every pipeline except `broken`.
struct ScriptedExecutor {
    delay: Duration,
}

#[async_trait]
impl PipelineExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        pipeline: &str,
        _parameters: &Value,
        _options: Option<&Value>,
    ) -> Result<Value, ExecutorError> {
        tokio::time::sleep(self.delay).await;
        if pipeline == "broken" {
            Err(ExecutorError::Failed("model unavailable".to_string()))
        } else {
            Ok(json!({"text": "generated", "pipeline": pipeline}))
        }
    }
}

fn config() -> ConductorConfig {
    ConductorConfig::default()
        .with_relays(vec!["wss://relay.test".to_string()])
        .with_authorized_identities(vec![AUTHORIZED.to_string()])
        .with_private_key("nsec1testkey")
        .with_max_concurrent_jobs(2)
}

fn trigger(pipeline: &str, request_id: &str) -> Value {
    json!({
        "type": "pipeline-trigger",
        "requestId": request_id,
        "pipeline": pipeline,
        "parameters": {"sourceText": "t", "discussionPrompt": "p"},
    })
}

async fn running_service(relay: Arc<FakeRelay>, delay: Duration) -> PipelineService {
    let mut service = PipelineService::new(
        config(),
        relay,
        Arc::new(ScriptedExecutor { delay }),
    )
    .expect("service should build");
    service.start().await.expect("service should start");
    service
}

#[tokio::test]
async fn test_accepted_request_acks_then_delivers_result() {
    let relay = FakeRelay::new();
    let mut service = running_service(relay.clone(), Duration::ZERO).await;

    relay.deliver(trigger("dialogue", "req-1"), AUTHORIZED).await;

    let sent = relay.wait_for_sent(2).await;
    assert_eq!(sent.len(), 2);

    // the ack always precedes the result
    let (ack_target, ack) = &sent[0];
    assert_eq!(ack_target, AUTHORIZED);
    assert_eq!(ack["type"], "pipeline-ack");
    assert_eq!(ack["status"], "accepted");
    assert_eq!(ack["requestId"], "req-1");
    assert!(ack["jobId"].is_string());
    assert!(ack["estimatedDuration"].is_string());

    let (result_target, result) = &sent[1];
    assert_eq!(result_target, AUTHORIZED);
    assert_eq!(result["type"], "pipeline-result");
    assert_eq!(result["status"], "completed");
    assert_eq!(result["requestId"], "req-1");
    assert_eq!(result["result"]["text"], "generated");

    service.stop().await.expect("service should stop");
}

#[tokio::test]
async fn test_identity_variants_of_authorized_sender_pass() {
    let relay = FakeRelay::new();
    let mut service = running_service(relay.clone(), Duration::ZERO).await;

    let variant = format!("0x{}", AUTHORIZED.to_uppercase());
    relay.deliver(trigger("dialogue", "req-var"), &variant).await;

    let sent = relay.wait_for_sent(2).await;
    assert_eq!(sent[0].1["status"], "accepted");
    assert_eq!(sent[1].1["status"], "completed");

    service.stop().await.expect("service should stop");
}

#[tokio::test]
async fn test_unauthorized_sender_gets_one_ack_and_nothing_runs() {
    let relay = FakeRelay::new();
    let mut service = running_service(relay.clone(), Duration::ZERO).await;

    relay.deliver(trigger("dialogue", "req-2"), STRANGER).await;

    let sent = relay.wait_for_sent(1).await;
    let ack = &sent[0].1;
    assert_eq!(ack["type"], "pipeline-ack");
    assert_eq!(ack["status"], "unauthorized");
    assert_eq!(ack["error"]["code"], "UNAUTHORIZED_PUBKEY");

    // no result ever follows and no job was admitted
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(relay.sent().await.len(), 1);
    let status = service.queue_status().await;
    assert_eq!(status.queued, 0);
    assert_eq!(status.running, 0);
    assert_eq!(status.completed, 0);

    service.stop().await.expect("service should stop");
}

#[tokio::test]
async fn test_malformed_payload_gets_validation_error_ack() {
    let relay = FakeRelay::new();
    let mut service = running_service(relay.clone(), Duration::ZERO).await;

    relay.deliver(json!({"type": "bad"}), AUTHORIZED).await;

    let sent = relay.wait_for_sent(1).await;
    let ack = &sent[0].1;
    assert_eq!(ack["status"], "error");
    assert_eq!(ack["error"]["code"], "VALIDATION_ERROR");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(relay.sent().await.len(), 1);

    service.stop().await.expect("service should stop");
}

#[tokio::test]
async fn test_failed_pipeline_delivers_failed_result() {
    let relay = FakeRelay::new();
    let mut service = running_service(relay.clone(), Duration::ZERO).await;

    relay.deliver(trigger("broken", "req-3"), AUTHORIZED).await;

    let sent = relay.wait_for_sent(2).await;
    assert_eq!(sent[0].1["status"], "accepted");

    let result = &sent[1].1;
    assert_eq!(result["type"], "pipeline-result");
    assert_eq!(result["status"], "failed");
    assert_eq!(result["error"]["message"], "execution failed: model unavailable");
    assert!(result.get("result").is_none());

    service.stop().await.expect("service should stop");
}

#[tokio::test]
async fn test_reload_revokes_previously_authorized_sender() {
    let relay = FakeRelay::new();
    let mut service = running_service(relay.clone(), Duration::ZERO).await;

    relay.deliver(trigger("dialogue", "req-4"), AUTHORIZED).await;
    relay.wait_for_sent(2).await;

    service.reload_authorized(Vec::new()).await;

    relay.deliver(trigger("dialogue", "req-5"), AUTHORIZED).await;
    let sent = relay.wait_for_sent(3).await;
    assert_eq!(sent[2].1["status"], "unauthorized");

    // the revoked request produces no result
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(relay.sent().await.len(), 3);

    service.stop().await.expect("service should stop");
}

#[tokio::test]
async fn test_concurrent_requests_each_get_ack_and_result() {
    let relay = FakeRelay::new();
    let mut service = running_service(relay.clone(), Duration::from_millis(20)).await;

    for i in 0..4 {
        relay
            .deliver(trigger("dialogue", &format!("req-{i}")), AUTHORIZED)
            .await;
    }

    let sent = relay.wait_for_sent(8).await;

    for i in 0..4 {
        let request_id = format!("req-{i}");
        let ack_pos = sent.iter().position(|(_, m)| {
            m["type"] == "pipeline-ack" && m["requestId"] == request_id.as_str()
        });
        let result_pos = sent.iter().position(|(_, m)| {
            m["type"] == "pipeline-result" && m["requestId"] == request_id.as_str()
        });

        let ack_pos = ack_pos.unwrap_or_else(|| panic!("no ack for {request_id}"));
        let result_pos =
            result_pos.unwrap_or_else(|| panic!("no result for {request_id}"));
        assert!(ack_pos < result_pos, "ack must precede result for {request_id}");

        assert_eq!(sent[ack_pos].1["status"], "accepted");
        assert_eq!(sent[result_pos].1["status"], "completed");
    }

    let status = service.queue_status().await;
    assert_eq!(status.completed, 4);

    service.stop().await.expect("service should stop");
}
