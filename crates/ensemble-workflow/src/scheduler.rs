use crate::builder;
use crate::executor::TaskExecutor;
use crate::graph::WorkflowGraph;
use crate::node::RunState;
use ensemble_core::{EnsembleResult, TaskEvent, TaskState};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Scheduler tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minimum level size at which the level's nodes are dispatched
    /// concurrently. Below it, nodes run one at a time with immediate
    /// event forwarding — small levels gain little from concurrency
    /// overhead, larger fan-outs benefit materially.
    pub parallel_threshold: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 2,
        }
    }
}

/// Events streamed to the caller while a workflow runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// An event produced by one node's delegated work.
    Node {
        /// The node the event belongs to.
        node_id: String,
        /// The underlying task event.
        event: TaskEvent,
    },
    /// The workflow paused awaiting an answer to a clarifying question.
    Paused {
        /// The node that requested input.
        node_id: String,
        /// The clarifying question.
        question: String,
    },
    /// Terminal event: the final synthesis of the completed workflow.
    Synthesis {
        /// Synthesized result text.
        content: String,
    },
    /// Terminal event: the turn failed before producing a synthesis.
    Failed {
        /// Rendered error.
        reason: String,
    },
}

/// How one scheduler pass over the graph ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every reachable node completed; the graph is now
    /// [`RunState::Completed`].
    Completed,
    /// A node requested input; the graph is paused at it.
    Paused {
        /// The paused node.
        node_id: String,
        /// The clarifying question to surface or auto-answer.
        question: String,
    },
    /// The planner's output extended the graph; scheduling should restart
    /// from the first newly inserted node.
    Extended {
        /// The resume target.
        resume_from: String,
    },
}

/// Snapshot of the attributes a node run needs, taken before dispatch so
/// the executor futures do not borrow the graph.
struct NodeRun {
    id: String,
    query: String,
    task_id: String,
    context_id: String,
}

enum NodeControl {
    Continue,
    Pause(String),
}

/// Executes a [`WorkflowGraph`] level by level.
///
/// Each pass partitions the subgraph reachable from the start node into
/// dependency levels and settles one level fully before the next begins.
/// A level at or above the parallel threshold is dispatched concurrently
/// with each node's event stream collected before forwarding; smaller
/// levels run sequentially with immediate streaming.
pub struct WorkflowScheduler {
    executor: Arc<dyn TaskExecutor>,
    config: SchedulerConfig,
}

impl WorkflowScheduler {
    /// Creates a scheduler with the default configuration.
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self::with_config(executor, SchedulerConfig::default())
    }

    /// Creates a scheduler with an explicit configuration.
    pub fn with_config(executor: Arc<dyn TaskExecutor>, config: SchedulerConfig) -> Self {
        Self { executor, config }
    }

    /// Runs the graph from `start` (or from all zero-in-degree nodes),
    /// forwarding [`WorkflowEvent`]s to `events` as they occur.
    ///
    /// Returns when the reachable subgraph completes, a node pauses the
    /// run, or the planner extends the graph. Pause policy: a sequential
    /// level pauses immediately and later siblings do not start; a
    /// parallel batch is already in flight, so every sibling settles
    /// first and the first paused node in level order wins.
    pub async fn run(
        &self,
        graph: &mut WorkflowGraph,
        start: Option<&str>,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> EnsembleResult<RunOutcome> {
        graph.set_running();
        let levels = graph.execution_levels(start);
        info!(
            levels = levels.len(),
            nodes = levels.iter().map(Vec::len).sum::<usize>(),
            "Scheduling workflow"
        );

        for level in levels {
            let outcome = if level.len() >= self.config.parallel_threshold {
                self.run_level_parallel(graph, &level, events).await?
            } else {
                self.run_level_sequential(graph, &level, events).await?
            };
            if let Some(outcome) = outcome {
                return Ok(outcome);
            }
        }

        graph.set_completed();
        Ok(RunOutcome::Completed)
    }

    /// Dispatches a whole level concurrently and applies the collected
    /// results in level order once every node has settled.
    async fn run_level_parallel(
        &self,
        graph: &mut WorkflowGraph,
        level: &[String],
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> EnsembleResult<Option<RunOutcome>> {
        debug!(size = level.len(), "Executing level concurrently");
        let runs: Vec<NodeRun> = level
            .iter()
            .filter_map(|id| snapshot(graph, id))
            .collect();
        for run in &runs {
            if let Some(node) = graph.node_mut(&run.id) {
                node.state = RunState::Running;
            }
        }

        let results = join_all(runs.into_iter().map(|run| {
            let executor = Arc::clone(&self.executor);
            async move {
                let collected = collect_events(executor.as_ref(), &run).await;
                (run.id, collected)
            }
        }))
        .await;

        let mut pause: Option<(String, String)> = None;
        for (node_id, result) in results {
            match result {
                Ok(collected) => {
                    let control = apply_events(graph, &node_id, collected, events).await;
                    if let NodeControl::Pause(question) = control {
                        if pause.is_none() {
                            pause = Some((node_id, question));
                        }
                    }
                }
                Err(e) => {
                    // Isolated: the failure is recorded on the node and the
                    // siblings' results still land.
                    error!(node = %node_id, error = %e, "Node failed inside parallel level");
                    if let Some(node) = graph.node_mut(&node_id) {
                        node.state = RunState::Paused;
                        node.last_error = Some(e.to_string());
                    }
                }
            }
        }

        if let Some((node_id, question)) = pause {
            graph.pause_at(&node_id);
            return Ok(Some(RunOutcome::Paused { node_id, question }));
        }

        for node_id in level {
            if let Some(resume_from) = self.check_extension(graph, node_id) {
                return Ok(Some(RunOutcome::Extended { resume_from }));
            }
        }
        Ok(None)
    }

    /// Runs a level one node at a time, forwarding each event downstream
    /// the moment it arrives.
    async fn run_level_sequential(
        &self,
        graph: &mut WorkflowGraph,
        level: &[String],
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> EnsembleResult<Option<RunOutcome>> {
        for node_id in level {
            let Some(run) = snapshot(graph, node_id) else {
                continue;
            };
            if let Some(node) = graph.node_mut(node_id) {
                node.state = RunState::Running;
            }

            let mut rx = self
                .executor
                .execute(&run.query, &run.task_id, &run.context_id)
                .await?;

            let mut control = NodeControl::Continue;
            while let Some(event) = rx.recv().await {
                let stop = matches!(
                    &event,
                    TaskEvent::StatusUpdate {
                        state: TaskState::InputRequired,
                        ..
                    }
                );
                let c = apply_single_event(graph, node_id, event, events).await;
                if stop {
                    control = c;
                    break;
                }
            }
            if let Some(node) = graph.node_mut(node_id) {
                if node.state == RunState::Running {
                    node.state = RunState::Completed;
                }
            }

            if let NodeControl::Pause(question) = control {
                graph.pause_at(node_id);
                return Ok(Some(RunOutcome::Paused {
                    node_id: node_id.clone(),
                    question,
                }));
            }

            if let Some(resume_from) = self.check_extension(graph, node_id) {
                return Ok(Some(RunOutcome::Extended { resume_from }));
            }
        }
        Ok(None)
    }

    /// After a node completes, asks the dynamic builder whether its output
    /// extends the graph.
    fn check_extension(&self, graph: &mut WorkflowGraph, node_id: &str) -> Option<String> {
        let completed = graph
            .node(node_id)
            .map(|n| n.state == RunState::Completed)
            .unwrap_or(false);
        if !completed {
            return None;
        }
        builder::extend_from_plan(graph, node_id)
    }
}

fn snapshot(graph: &WorkflowGraph, node_id: &str) -> Option<NodeRun> {
    graph.node(node_id).map(|node| NodeRun {
        id: node.id.clone(),
        query: node.query.clone(),
        task_id: node.task_id.clone(),
        context_id: node.context_id.clone(),
    })
}

/// Drains a node's full event stream into a buffer (parallel mode).
async fn collect_events(
    executor: &dyn TaskExecutor,
    run: &NodeRun,
) -> EnsembleResult<Vec<TaskEvent>> {
    let mut rx = executor
        .execute(&run.query, &run.task_id, &run.context_id)
        .await?;
    let mut collected = Vec::new();
    while let Some(event) = rx.recv().await {
        collected.push(event);
    }
    Ok(collected)
}

/// Applies a node's collected events in order, stopping at the first
/// input request.
async fn apply_events(
    graph: &mut WorkflowGraph,
    node_id: &str,
    collected: Vec<TaskEvent>,
    events: &mpsc::Sender<WorkflowEvent>,
) -> NodeControl {
    for event in collected {
        if let NodeControl::Pause(q) = apply_single_event(graph, node_id, event, events).await {
            return NodeControl::Pause(q);
        }
    }
    if let Some(node) = graph.node_mut(node_id) {
        if node.state == RunState::Running {
            node.state = RunState::Completed;
        }
    }
    NodeControl::Continue
}

/// Records one event on its node, forwards it downstream, and reports
/// whether it pauses the run.
async fn apply_single_event(
    graph: &mut WorkflowGraph,
    node_id: &str,
    event: TaskEvent,
    events: &mpsc::Sender<WorkflowEvent>,
) -> NodeControl {
    let mut control = NodeControl::Continue;
    match &event {
        TaskEvent::ArtifactUpdate { name, payload } => {
            if let Some(node) = graph.node_mut(node_id) {
                node.add_artifact(name.clone(), payload.clone());
            }
        }
        TaskEvent::StatusUpdate { state, message } => match state {
            TaskState::Completed => {
                if let Some(node) = graph.node_mut(node_id) {
                    node.state = RunState::Completed;
                }
            }
            TaskState::InputRequired => {
                if let Some(node) = graph.node_mut(node_id) {
                    node.state = RunState::Paused;
                }
                let question = message
                    .clone()
                    .unwrap_or_else(|| "Additional input required".to_string());
                control = NodeControl::Pause(question);
            }
            TaskState::Failed => {
                if let Some(node) = graph.node_mut(node_id) {
                    node.state = RunState::Paused;
                    node.last_error = message.clone();
                }
            }
            TaskState::Working => {}
        },
    }

    // The caller may have stopped listening; execution still finishes.
    let _ = events
        .send(WorkflowEvent::Node {
            node_id: node_id.to_string(),
            event,
        })
        .await;
    control
}
