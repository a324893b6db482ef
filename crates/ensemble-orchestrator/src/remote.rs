use async_trait::async_trait;
use ensemble_core::{AgentMessage, EnsembleResult, TaskEvent};
use ensemble_protocol::MessageDispatcher;
use ensemble_workflow::TaskExecutor;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes workflow nodes by sending protocol requests to a named remote
/// agent and translating its response into the task event stream.
///
/// The request content carries `query`, `task_id`, and `context_id`; the
/// response content is expected to hold an `events` array of serialized
/// [`TaskEvent`]s. Responses without one are treated as an opaque result:
/// a single `result` artifact followed by a completed status. Dispatch
/// failures (including timeouts) surface as a failed status event.
pub struct RemoteAgentExecutor {
    dispatcher: Arc<MessageDispatcher>,
    sender_id: String,
    agent_id: String,
    timeout: Duration,
}

impl RemoteAgentExecutor {
    /// Creates an executor delegating to `agent_id` on behalf of
    /// `sender_id`, with the default request timeout.
    pub fn new(
        dispatcher: Arc<MessageDispatcher>,
        sender_id: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            sender_id: sender_id.into(),
            agent_id: agent_id.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Overrides the per-request timeout, builder style.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TaskExecutor for RemoteAgentExecutor {
    async fn execute(
        &self,
        query: &str,
        task_id: &str,
        context_id: &str,
    ) -> EnsembleResult<mpsc::Receiver<TaskEvent>> {
        let request = AgentMessage::request(
            &self.sender_id,
            &self.agent_id,
            json!({
                "query": query,
                "task_id": task_id,
                "context_id": context_id,
            }),
        );

        let (tx, rx) = mpsc::channel(16);
        let dispatcher = Arc::clone(&self.dispatcher);
        let timeout = self.timeout;
        tokio::spawn(async move {
            match dispatcher.send_request(request, timeout).await {
                Ok(response) => {
                    for event in translate_response(&response) {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(TaskEvent::failed(e.to_string())).await;
                }
            }
        });
        Ok(rx)
    }
}

fn translate_response(response: &AgentMessage) -> Vec<TaskEvent> {
    if let Some(raw) = response.content.get("events") {
        if let Ok(events) = serde_json::from_value::<Vec<TaskEvent>>(raw.clone()) {
            return events;
        }
    }
    vec![
        TaskEvent::artifact("result", response.content.clone()),
        TaskEvent::completed(),
    ]
}
