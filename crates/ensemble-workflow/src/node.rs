use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Node key marking the distinguished planning node of a graph.
pub const PLANNER_KEY: &str = "planner";

/// Lifecycle state shared by workflow nodes and the graph itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created, never run.
    Initialized,
    /// Currently being scheduled or executed.
    Running,
    /// Suspended pending an answer to a clarifying question, or holding a
    /// recorded in-batch failure.
    Paused,
    /// Finished successfully.
    Completed,
}

/// A named artifact accumulated on a node during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeArtifact {
    /// Artifact name as reported by the delegated task.
    pub name: String,
    /// Structured payload.
    pub payload: serde_json::Value,
}

/// One task in the workflow graph: the query to delegate plus its routing
/// attributes and lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique node id, generated on creation.
    pub id: String,
    /// The original task description this node was created with.
    pub task: String,
    /// Optional machine-readable key (e.g. [`PLANNER_KEY`]).
    pub node_key: Option<String>,
    /// Optional human-readable label.
    pub node_label: Option<String>,
    /// Lifecycle state.
    pub state: RunState,
    /// The query currently delegated for this node. Starts equal to
    /// `task`; rewritten when an answer is supplied to resume a pause.
    pub query: String,
    /// Routing attribute: the task id this node executes under.
    pub task_id: String,
    /// Routing attribute: the conversation context id.
    pub context_id: String,
    /// Artifacts produced so far, in arrival order.
    pub artifacts: Vec<NodeArtifact>,
    /// Failure recorded during an isolated parallel-batch error, surfaced
    /// only when the node is later inspected or resumed.
    pub last_error: Option<String>,
}

impl WorkflowNode {
    /// Creates a node for the given task and routing context.
    pub fn new(
        task: impl Into<String>,
        task_id: impl Into<String>,
        context_id: impl Into<String>,
    ) -> Self {
        let task = task.into();
        Self {
            id: Uuid::new_v4().to_string(),
            query: task.clone(),
            task,
            node_key: None,
            node_label: None,
            state: RunState::Initialized,
            task_id: task_id.into(),
            context_id: context_id.into(),
            artifacts: Vec::new(),
            last_error: None,
        }
    }

    /// Sets the machine-readable node key, builder style.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.node_key = Some(key.into());
        self
    }

    /// Sets the human-readable label, builder style.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.node_label = Some(label.into());
        self
    }

    /// Rewrites the query delegated for this node (resume path).
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// True when this node is the graph's distinguished planner.
    pub fn is_planner(&self) -> bool {
        self.node_key.as_deref() == Some(PLANNER_KEY)
    }

    /// Appends an artifact.
    pub fn add_artifact(&mut self, name: impl Into<String>, payload: serde_json::Value) {
        self.artifacts.push(NodeArtifact {
            name: name.into(),
            payload,
        });
    }
}
