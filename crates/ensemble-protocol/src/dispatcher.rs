use crate::registry::AgentRegistry;
use ensemble_core::{AgentMessage, EnsembleError, EnsembleResult, MessageType};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

/// Routes messages to registered agents, correlates request/response pairs
/// under timeout, and fans out broadcasts.
///
/// Correlation is keyed by the request's `message_id`: each in-flight
/// request holds an independent pending entry, so any number of requests
/// may be outstanding at once.
pub struct MessageDispatcher {
    registry: Arc<AgentRegistry>,
    pending: Mutex<HashMap<String, oneshot::Sender<AgentMessage>>>,
}

/// Outcome of one broadcast call: which targets confirmed delivery and
/// which failed, in no particular order.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    /// Agent ids that accepted their copy.
    pub delivered: Vec<String>,
    /// Per-target failures; these never abort the other deliveries.
    pub failed: Vec<BroadcastFailure>,
}

/// A single isolated broadcast delivery failure.
#[derive(Debug)]
pub struct BroadcastFailure {
    /// The target that failed.
    pub agent_id: String,
    /// The error it produced, rendered.
    pub error: String,
}

impl MessageDispatcher {
    /// Creates a dispatcher over the given registry.
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// The registry this dispatcher routes against.
    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Validates and delivers a message to its addressed agent, awaiting
    /// the agent's optional response.
    ///
    /// Fails fast with a protocol error on validation failure and with
    /// [`EnsembleError::AgentNotFound`] when the receiver is absent. If the
    /// message was a request and the agent answered while a pending
    /// correlation exists for its id, the response is also handed to the
    /// waiting correlator entry.
    pub async fn route(&self, message: AgentMessage) -> EnsembleResult<Option<AgentMessage>> {
        message.validate()?;

        let agent = self
            .registry
            .get(&message.receiver_id)
            .await
            .ok_or_else(|| EnsembleError::AgentNotFound(message.receiver_id.clone()))?;

        let was_request = message.message_type == MessageType::Request;
        let request_id = message.message_id.clone();
        debug!(
            message_id = %request_id,
            receiver = %message.receiver_id,
            kind = ?message.message_type,
            "Routing message"
        );

        let response = agent.handle(message).await?;

        if was_request {
            if let Some(resp) = &response {
                self.complete_pending(&request_id, resp.clone()).await;
            }
        }

        Ok(response)
    }

    /// Sends a request and waits for its correlated response.
    ///
    /// Registers a pending entry keyed by the message id, routes the
    /// request, then blocks until the entry completes or `timeout`
    /// elapses. On timeout the pending entry is removed before the error
    /// is surfaced, so no entry leaks; the underlying remote call is not
    /// aborted, only the wait.
    pub async fn send_request(
        &self,
        message: AgentMessage,
        timeout: Duration,
    ) -> EnsembleResult<AgentMessage> {
        let message_id = message.message_id.clone();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(message_id.clone(), tx);
        }

        if let Err(e) = self.route(message).await {
            self.pending.lock().await.remove(&message_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&message_id);
                Err(EnsembleError::Dispatch(
                    "response channel dropped before completion".to_string(),
                ))
            }
            Err(_) => {
                self.pending.lock().await.remove(&message_id);
                warn!(message_id = %message_id, ?timeout, "Request timed out");
                Err(EnsembleError::RequestTimeout {
                    message_id,
                    timeout,
                })
            }
        }
    }

    /// Hands a response to the pending entry for `request_id`, if one is
    /// still waiting. Returns true when an entry was completed.
    pub async fn complete_pending(&self, request_id: &str, response: AgentMessage) -> bool {
        let tx = self.pending.lock().await.remove(request_id);
        match tx {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// True when a pending correlation entry exists for the given id.
    pub async fn has_pending(&self, request_id: &str) -> bool {
        self.pending.lock().await.contains_key(request_id)
    }

    /// Number of in-flight pending correlations.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Fans `message` out to every registered agent, optionally restricted
    /// to those advertising `capability`.
    ///
    /// Each target receives an addressed copy (fresh message id,
    /// `correlation_id` = the original id) and all targets are invoked
    /// concurrently. A target's failure is caught and recorded without
    /// affecting delivery to the others.
    pub async fn broadcast(
        &self,
        message: &AgentMessage,
        capability: Option<&str>,
    ) -> BroadcastReport {
        let targets = self.registry.agents_with(capability).await;

        let deliveries = targets.into_iter().map(|agent| {
            let copy = message.addressed_copy(agent.id());
            async move {
                let agent_id = agent.id().to_string();
                match agent.handle(copy).await {
                    Ok(_) => Ok(agent_id),
                    Err(e) => Err(BroadcastFailure {
                        agent_id,
                        error: e.to_string(),
                    }),
                }
            }
        });

        let mut report = BroadcastReport::default();
        for outcome in join_all(deliveries).await {
            match outcome {
                Ok(agent_id) => report.delivered.push(agent_id),
                Err(failure) => {
                    warn!(
                        agent = %failure.agent_id,
                        error = %failure.error,
                        "Broadcast delivery failed"
                    );
                    report.failed.push(failure);
                }
            }
        }
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use async_trait::async_trait;
    use serde_json::json;

    /// Echoes every request back as a response.
    struct EchoAgent {
        id: String,
    }

    #[async_trait]
    impl Agent for EchoAgent {
        fn id(&self) -> &str {
            &self.id
        }

        async fn handle(&self, message: AgentMessage) -> EnsembleResult<Option<AgentMessage>> {
            let content = message.content.clone();
            Ok(Some(AgentMessage::response_to(&message, content)))
        }
    }

    async fn dispatcher_with_echo(id: &str) -> MessageDispatcher {
        let registry = Arc::new(AgentRegistry::new());
        registry
            .register(Arc::new(EchoAgent { id: id.to_string() }))
            .await
            .unwrap();
        MessageDispatcher::new(registry)
    }

    #[tokio::test]
    async fn test_route_delivers_and_returns_response() {
        let dispatcher = dispatcher_with_echo("echo").await;
        let msg = AgentMessage::request("host", "echo", json!({"ping": true}));
        let response = dispatcher.route(msg).await.unwrap().unwrap();
        assert_eq!(response.content["ping"], json!(true));
    }

    #[tokio::test]
    async fn test_route_unknown_agent() {
        let dispatcher = dispatcher_with_echo("echo").await;
        let msg = AgentMessage::request("host", "ghost", json!("q"));
        let err = dispatcher.route(msg).await.unwrap_err();
        assert!(matches!(err, EnsembleError::AgentNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_route_rejects_invalid_message() {
        let dispatcher = dispatcher_with_echo("echo").await;
        let msg = AgentMessage::request("host", "echo", serde_json::Value::Null);
        let err = dispatcher.route(msg).await.unwrap_err();
        assert!(matches!(err, EnsembleError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_send_request_correlates_response() {
        let dispatcher = dispatcher_with_echo("echo").await;
        let msg = AgentMessage::request("host", "echo", json!({"n": 1}));
        let id = msg.message_id.clone();
        let response = dispatcher
            .send_request(msg, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response.correlation_id.as_deref(), Some(id.as_str()));
        assert!(!dispatcher.has_pending(&id).await);
    }

    #[tokio::test]
    async fn test_concurrent_requests_keyed_independently() {
        let dispatcher = Arc::new(dispatcher_with_echo("echo").await);
        let mut handles = Vec::new();
        for n in 0..4 {
            let d = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                let msg = AgentMessage::request("host", "echo", json!({ "n": n }));
                d.send_request(msg, Duration::from_secs(1)).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(dispatcher.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_send_request_cleans_up_on_routing_error() {
        let dispatcher = dispatcher_with_echo("echo").await;
        let msg = AgentMessage::request("host", "ghost", json!("q"));
        let id = msg.message_id.clone();
        let err = dispatcher
            .send_request(msg, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EnsembleError::AgentNotFound(_)));
        assert!(!dispatcher.has_pending(&id).await);
    }
}
