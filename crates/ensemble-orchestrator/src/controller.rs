use crate::session::SessionContext;
use crate::synthesis::Synthesizer;
use ensemble_core::{EnsembleError, EnsembleResult};
use ensemble_workflow::{
    NodeArtifact, RunOutcome, RunState, SchedulerConfig, TaskExecutor, WorkflowEvent,
    WorkflowNode, WorkflowScheduler, PLANNER_KEY,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

/// Controller tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Scheduler settings applied to every run.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Capacity of the event channel behind [`Orchestrator::advance`].
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// The orchestrating controller: one instance drives one session's
/// conversational turns end to end.
///
/// Each turn builds or resumes the session graph, then loops over
/// scheduler outcomes as an explicit trampoline — resume and extension
/// targets feed the next pass, and the loop terminates only when none
/// remains (pause surfaced or workflow completed and synthesized).
pub struct Orchestrator {
    executor: Arc<dyn TaskExecutor>,
    synthesizer: Arc<dyn Synthesizer>,
    session: Mutex<Option<SessionContext>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Creates a controller with the default configuration.
    pub fn new(executor: Arc<dyn TaskExecutor>, synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self::with_config(executor, synthesizer, OrchestratorConfig::default())
    }

    /// Creates a controller with an explicit configuration.
    pub fn with_config(
        executor: Arc<dyn TaskExecutor>,
        synthesizer: Arc<dyn Synthesizer>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            executor,
            synthesizer,
            session: Mutex::new(None),
            config,
        }
    }

    /// Performs one full controller iteration for the given user query,
    /// streaming workflow events terminated by a
    /// [`WorkflowEvent::Synthesis`] (or a surfaced pause / failure).
    pub fn advance(
        self: &Arc<Self>,
        query: impl Into<String>,
        context_id: impl Into<String>,
        task_id: impl Into<String>,
    ) -> ReceiverStream<WorkflowEvent> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let this = Arc::clone(self);
        let query = query.into();
        let context_id = context_id.into();
        let task_id = task_id.into();
        tokio::spawn(async move {
            if let Err(e) = this.drive(&query, &context_id, &task_id, &tx).await {
                error!(context = %context_id, error = %e, "Workflow turn failed");
                let _ = tx
                    .send(WorkflowEvent::Failed {
                        reason: e.to_string(),
                    })
                    .await;
            }
        });
        ReceiverStream::new(rx)
    }

    /// One conversational turn: set up or resume the graph, then trampoline
    /// over scheduler outcomes until a pause surfaces or synthesis lands.
    async fn drive(
        &self,
        query: &str,
        context_id: &str,
        task_id: &str,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> EnsembleResult<()> {
        let mut guard = self.session.lock().await;
        let stale = guard
            .as_ref()
            .map(|s| s.context_id != context_id)
            .unwrap_or(true);
        if stale {
            *guard = Some(SessionContext::new(context_id));
        }
        let session = guard
            .as_mut()
            .ok_or_else(|| EnsembleError::Workflow("session context missing".to_string()))?;

        session.record(format!("user: {query}"));
        let start_id = self.prepare_graph(session, query, task_id, context_id);
        info!(context = %context_id, start = %start_id, "Orchestrator: starting turn");

        let scheduler =
            WorkflowScheduler::with_config(Arc::clone(&self.executor), self.config.scheduler.clone());
        let mut start = Some(start_id);

        loop {
            let outcome = scheduler
                .run(&mut session.graph, start.as_deref(), events)
                .await?;
            match outcome {
                RunOutcome::Extended { resume_from } => {
                    // Silent restart; no intermediate completion surfaces.
                    start = Some(resume_from);
                }
                RunOutcome::Paused { node_id, question } => {
                    let answer = self
                        .synthesizer
                        .answer_clarification(&question, &session.history)
                        .await?;
                    match answer {
                        Some(answer) => {
                            info!(node = %node_id, "Orchestrator: auto-answered clarification");
                            session.record(format!("auto-answer: {answer}"));
                            if let Some(node) = session.graph.node_mut(&node_id) {
                                node.set_query(answer);
                            }
                            session.graph.resume();
                            start = Some(node_id);
                        }
                        None => {
                            let _ = events
                                .send(WorkflowEvent::Paused { node_id, question })
                                .await;
                            return Ok(());
                        }
                    }
                }
                RunOutcome::Completed => {
                    let artifacts: Vec<NodeArtifact> = session
                        .graph
                        .all_artifacts()
                        .into_iter()
                        .cloned()
                        .collect();
                    let summary = self.synthesizer.summarize(query, &artifacts).await?;
                    session.record(format!("summary: {summary}"));
                    session.graph.clear();
                    info!(
                        context = %context_id,
                        artifacts = artifacts.len(),
                        "Orchestrator: turn complete"
                    );
                    let _ = events.send(WorkflowEvent::Synthesis { content: summary }).await;
                    return Ok(());
                }
            }
        }
    }

    /// Chooses the scheduling start point for this turn: the paused node
    /// (treating the query as its answer) when resuming, otherwise a fresh
    /// graph holding a single planner node.
    fn prepare_graph(
        &self,
        session: &mut SessionContext,
        query: &str,
        task_id: &str,
        context_id: &str,
    ) -> String {
        if session.graph.state() == RunState::Paused {
            if let Some(paused) = session.graph.paused_node_id().map(str::to_string) {
                if let Some(node) = session.graph.node_mut(&paused) {
                    node.set_query(query);
                }
                session.graph.resume();
                return paused;
            }
        }

        if !session.graph.is_empty() {
            session.graph.clear();
        }
        let planner = WorkflowNode::new(query, task_id, context_id)
            .with_key(PLANNER_KEY)
            .with_label("planner");
        session.graph.add_node(planner)
    }
}
