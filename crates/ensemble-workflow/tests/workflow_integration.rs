//! Integration tests for the workflow engine: level correctness over
//! random DAGs, parallel/sequential artifact equivalence, pause/resume,
//! and planner-driven extension.

use async_trait::async_trait;
use ensemble_core::{EnsembleResult, TaskEvent};
use ensemble_workflow::{
    extend_from_plan, RunOutcome, RunState, SchedulerConfig, TaskExecutor, WorkflowEvent,
    WorkflowGraph, WorkflowNode, WorkflowScheduler, PLANNER_KEY, PLAN_ARTIFACT,
};
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Emits one `result` artifact echoing the query, then completes.
struct EchoExecutor;

#[async_trait]
impl TaskExecutor for EchoExecutor {
    async fn execute(
        &self,
        query: &str,
        _task_id: &str,
        _context_id: &str,
    ) -> EnsembleResult<mpsc::Receiver<TaskEvent>> {
        let (tx, rx) = mpsc::channel(8);
        let query = query.to_string();
        tokio::spawn(async move {
            let _ = tx
                .send(TaskEvent::artifact("result", json!({ "query": query })))
                .await;
            let _ = tx.send(TaskEvent::completed()).await;
        });
        Ok(rx)
    }
}

/// Pauses on the given query the first time, completes on any other input.
struct PauseOnceExecutor {
    pause_on: String,
}

#[async_trait]
impl TaskExecutor for PauseOnceExecutor {
    async fn execute(
        &self,
        query: &str,
        _task_id: &str,
        _context_id: &str,
    ) -> EnsembleResult<mpsc::Receiver<TaskEvent>> {
        let (tx, rx) = mpsc::channel(8);
        let events = if query == self.pause_on {
            vec![TaskEvent::input_required("Need a date range")]
        } else {
            vec![
                TaskEvent::artifact("result", json!({ "answered": query })),
                TaskEvent::completed(),
            ]
        };
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

fn build_random_graph(n: usize, edge_bits: &[bool]) -> (WorkflowGraph, Vec<String>) {
    let mut graph = WorkflowGraph::new();
    let ids: Vec<String> = (0..n)
        .map(|i| graph.add_node(WorkflowNode::new(format!("task {i}"), "t", "c")))
        .collect();
    // Edges only from earlier to later nodes, matching the construction
    // path the graph supports (predecessor to newly created successor).
    let mut bit = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            if edge_bits.get(bit).copied().unwrap_or(false) {
                graph
                    .add_edge(&ids[i], &ids[j])
                    .unwrap_or_else(|e| panic!("edge insert failed: {e}"));
            }
            bit += 1;
        }
    }
    (graph, ids)
}

proptest! {
    /// Every node in level k has all its predecessors in levels < k, and
    /// every reachable node is assigned exactly one level.
    #[test]
    fn level_assignment_respects_dependencies(
        n in 1usize..12,
        edge_bits in proptest::collection::vec(any::<bool>(), 0..66),
    ) {
        let (graph, _ids) = build_random_graph(n, &edge_bits);
        let levels = graph.execution_levels(None);

        let mut level_of: HashMap<String, usize> = HashMap::new();
        for (k, level) in levels.iter().enumerate() {
            for id in level {
                prop_assert!(
                    level_of.insert(id.clone(), k).is_none(),
                    "node assigned to two levels"
                );
            }
        }
        // In a DAG every node is reachable from some zero-in-degree root.
        prop_assert_eq!(level_of.len(), graph.node_count());

        for (id, k) in &level_of {
            for pred in graph.predecessors_of(id) {
                let pk = level_of[pred];
                prop_assert!(
                    pk < *k,
                    "predecessor {} (level {}) not before {} (level {})",
                    pred, pk, id, k
                );
            }
        }
    }
}

async fn run_to_completion(
    graph: &mut WorkflowGraph,
    start: &str,
    threshold: usize,
) -> Vec<(String, serde_json::Value)> {
    let scheduler = WorkflowScheduler::with_config(
        Arc::new(EchoExecutor),
        SchedulerConfig {
            parallel_threshold: threshold,
        },
    );
    let (tx, mut rx) = mpsc::channel(256);
    let mut start = Some(start.to_string());
    loop {
        let outcome = scheduler
            .run(graph, start.as_deref(), &tx)
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        match outcome {
            RunOutcome::Completed => break,
            RunOutcome::Extended { resume_from } => start = Some(resume_from),
            RunOutcome::Paused { node_id, .. } => panic!("unexpected pause at {node_id}"),
        }
    }
    drop(tx);
    let mut artifacts = Vec::new();
    while let Some(event) = rx.recv().await {
        if let WorkflowEvent::Node {
            event: TaskEvent::ArtifactUpdate { name, payload },
            ..
        } = event
        {
            artifacts.push((name, payload));
        }
    }
    artifacts
}

fn diamond_graph() -> (WorkflowGraph, String) {
    let mut graph = WorkflowGraph::new();
    let a = graph.add_node(WorkflowNode::new("root", "t", "c"));
    let b = graph.add_node(WorkflowNode::new("left", "t", "c"));
    let c = graph.add_node(WorkflowNode::new("right", "t", "c"));
    let d = graph.add_node(WorkflowNode::new("join", "t", "c"));
    for (from, to) in [(&a, &b), (&a, &c), (&b, &d), (&c, &d)] {
        graph.add_edge(from, to).unwrap_or_else(|e| panic!("{e}"));
    }
    (graph, a)
}

#[tokio::test]
async fn parallel_and_sequential_emit_same_artifact_multiset() {
    let (mut always_parallel, start) = diamond_graph();
    let mut parallel = run_to_completion(&mut always_parallel, &start, 1).await;

    let (mut always_sequential, start) = diamond_graph();
    let mut sequential = run_to_completion(&mut always_sequential, &start, usize::MAX).await;

    let key = |(name, payload): &(String, serde_json::Value)| {
        format!("{name}:{payload}")
    };
    parallel.sort_by_key(key);
    sequential.sort_by_key(key);
    assert_eq!(parallel.len(), 4);
    assert_eq!(
        parallel.iter().map(key).collect::<Vec<_>>(),
        sequential.iter().map(key).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn pause_resume_round_trip_reaches_completion() {
    let mut graph = WorkflowGraph::new();
    let a = graph.add_node(WorkflowNode::new("when is the trip?", "t", "c"));
    let b = graph.add_node(WorkflowNode::new("book it", "t", "c"));
    graph.add_edge(&a, &b).unwrap_or_else(|e| panic!("{e}"));

    let scheduler = WorkflowScheduler::new(Arc::new(PauseOnceExecutor {
        pause_on: "when is the trip?".to_string(),
    }));
    let (tx, _rx) = mpsc::channel(64);

    let outcome = scheduler
        .run(&mut graph, Some(&a), &tx)
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(
        outcome,
        RunOutcome::Paused {
            node_id: a.clone(),
            question: "Need a date range".to_string()
        }
    );
    assert_eq!(graph.state(), RunState::Paused);
    assert_eq!(graph.paused_node_id(), Some(a.as_str()));

    // Supply the answer on the paused node and restart from it.
    if let Some(node) = graph.node_mut(&a) {
        node.set_query("June 10-17");
    }
    graph.resume();
    let outcome = scheduler
        .run(&mut graph, Some(&a), &tx)
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(graph.state(), RunState::Completed);
    assert_eq!(graph.node(&b).map(|n| n.state), Some(RunState::Completed));
}

#[tokio::test]
async fn planner_artifact_with_three_tasks_adds_three_chained_nodes() {
    let mut graph = WorkflowGraph::new();
    let planner = graph.add_node(
        WorkflowNode::new("plan the research", "task-9", "ctx-9").with_key(PLANNER_KEY),
    );
    if let Some(node) = graph.node_mut(&planner) {
        node.state = RunState::Completed;
        node.add_artifact(
            PLAN_ARTIFACT,
            json!({"tasks": ["gather sources", "compare claims", "draft summary"]}),
        );
    }

    let resume_from = extend_from_plan(&mut graph, &planner)
        .unwrap_or_else(|| panic!("extension did not happen"));

    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.successors_of(&planner), [resume_from.clone()]);
    // Scheduling resumes from the first new node and covers all three.
    let levels = graph.execution_levels(Some(&resume_from));
    assert_eq!(levels.len(), 3);
    assert!(levels.iter().all(|level| level.len() == 1));
}
