use crate::node::{NodeArtifact, RunState, WorkflowNode};
use ensemble_core::{EnsembleError, EnsembleResult};
use std::collections::{HashMap, HashSet, VecDeque};

/// The task dependency DAG for one session.
///
/// Nodes are inserted by the controller (the initial planner node) and by
/// the dynamic graph builder; edges are only ever added from an existing
/// predecessor to a newly created successor, so cycles cannot be
/// introduced through normal construction. Nodes are never removed
/// individually — the whole graph is cleared atomically when the session
/// ends or changes context.
pub struct WorkflowGraph {
    nodes: HashMap<String, WorkflowNode>,
    order: Vec<String>,
    successors: HashMap<String, Vec<String>>,
    predecessors: HashMap<String, Vec<String>>,
    state: RunState,
    paused_node_id: Option<String>,
    latest_node: Option<String>,
}

impl WorkflowGraph {
    /// Creates an empty graph in the [`RunState::Initialized`] state.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            order: Vec::new(),
            successors: HashMap::new(),
            predecessors: HashMap::new(),
            state: RunState::Initialized,
            paused_node_id: None,
            latest_node: None,
        }
    }

    /// Inserts a node, returning its id.
    pub fn add_node(&mut self, node: WorkflowNode) -> String {
        let id = node.id.clone();
        self.order.push(id.clone());
        self.latest_node = Some(id.clone());
        self.nodes.insert(id.clone(), node);
        id
    }

    /// Records that `to` depends on the completion of `from`.
    ///
    /// Both ids must already exist in the graph.
    pub fn add_edge(&mut self, from: &str, to: &str) -> EnsembleResult<()> {
        if !self.nodes.contains_key(from) {
            return Err(EnsembleError::Workflow(format!(
                "edge source '{from}' is not in the graph"
            )));
        }
        if !self.nodes.contains_key(to) {
            return Err(EnsembleError::Workflow(format!(
                "edge target '{to}' is not in the graph"
            )));
        }
        let succs = self.successors.entry(from.to_string()).or_default();
        if !succs.iter().any(|s| s == to) {
            succs.push(to.to_string());
            self.predecessors
                .entry(to.to_string())
                .or_default()
                .push(from.to_string());
        }
        Ok(())
    }

    /// Looks up a node by id.
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.get(id)
    }

    /// Looks up a node mutably.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut WorkflowNode> {
        self.nodes.get_mut(id)
    }

    /// True when the graph contains the given node id.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> &[String] {
        &self.order
    }

    /// Direct successors of a node.
    pub fn successors_of(&self, id: &str) -> &[String] {
        self.successors.get(id).map_or(&[], Vec::as_slice)
    }

    /// Direct predecessors of a node.
    pub fn predecessors_of(&self, id: &str) -> &[String] {
        self.predecessors.get(id).map_or(&[], Vec::as_slice)
    }

    /// The most recently added node, for convenience chaining.
    pub fn latest_node(&self) -> Option<&str> {
        self.latest_node.as_deref()
    }

    /// Current graph lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The node that requested clarification, while paused.
    pub fn paused_node_id(&self) -> Option<&str> {
        self.paused_node_id.as_deref()
    }

    /// Marks the graph running (first run call, or after resume).
    pub fn set_running(&mut self) {
        self.state = RunState::Running;
    }

    /// Marks the graph completed.
    pub fn set_completed(&mut self) {
        self.state = RunState::Completed;
        self.paused_node_id = None;
    }

    /// Pauses the graph at the given node.
    pub fn pause_at(&mut self, node_id: &str) {
        self.state = RunState::Paused;
        self.paused_node_id = Some(node_id.to_string());
    }

    /// Transitions a paused graph back to running, clearing the paused
    /// node marker.
    pub fn resume(&mut self) {
        self.state = RunState::Running;
        self.paused_node_id = None;
    }

    /// Drops all nodes and edges atomically, returning the graph to its
    /// initial state.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.order.clear();
        self.successors.clear();
        self.predecessors.clear();
        self.state = RunState::Initialized;
        self.paused_node_id = None;
        self.latest_node = None;
    }

    /// Every artifact accumulated across the graph, in node insertion
    /// order then arrival order.
    pub fn all_artifacts(&self) -> Vec<&NodeArtifact> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .flat_map(|n| n.artifacts.iter())
            .collect()
    }

    /// Partitions the subgraph reachable from `start` into execution
    /// levels (topological generations).
    ///
    /// Level 0 is the start node (or all zero-in-degree nodes when none is
    /// given); level k+1 holds every direct successor of a level-≤k node
    /// whose reachable predecessors have all been assigned to a level ≤ k.
    /// No node is placed before all of its dependencies, and nodes within
    /// one level have no dependency relationship between them.
    pub fn execution_levels(&self, start: Option<&str>) -> Vec<Vec<String>> {
        let roots: Vec<String> = match start {
            Some(id) if self.nodes.contains_key(id) => vec![id.to_string()],
            Some(_) => Vec::new(),
            None => self
                .order
                .iter()
                .filter(|id| self.predecessors_of(id).is_empty())
                .cloned()
                .collect(),
        };
        if roots.is_empty() {
            return Vec::new();
        }

        // Reachable subgraph first; predecessor checks are restricted to
        // it so a side edge from an unreachable node cannot starve a level.
        let mut reachable: HashSet<String> = roots.iter().cloned().collect();
        let mut frontier: VecDeque<String> = roots.iter().cloned().collect();
        while let Some(id) = frontier.pop_front() {
            for succ in self.successors_of(&id) {
                if reachable.insert(succ.clone()) {
                    frontier.push_back(succ.clone());
                }
            }
        }

        let mut assigned: HashSet<String> = roots.iter().cloned().collect();
        let mut levels = vec![roots];
        loop {
            let next: Vec<String> = self
                .order
                .iter()
                .filter(|id| reachable.contains(*id) && !assigned.contains(*id))
                .filter(|id| {
                    self.predecessors_of(id)
                        .iter()
                        .filter(|p| reachable.contains(*p))
                        .all(|p| assigned.contains(p))
                })
                .cloned()
                .collect();
            if next.is_empty() {
                break;
            }
            assigned.extend(next.iter().cloned());
            levels.push(next);
        }
        levels
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new()
    }
}
