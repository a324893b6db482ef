use crate::graph::WorkflowGraph;
use crate::node::WorkflowNode;
use tracing::{debug, info};

/// Artifact name marking the planner's output task list.
pub const PLAN_ARTIFACT: &str = "task_plan";

/// Extends the graph with the follow-up tasks found in the planner node's
/// output artifact.
///
/// Creates one node per task, chains them linearly after the planner (each
/// inheriting the planner's `task_id`/`context_id`), and returns the first
/// new node's id as the resume target. Returns `None` — leaving the graph
/// untouched — when the node is not the planner, already has successors,
/// or its artifact is missing or malformed; in that case the artifact is
/// treated as ordinary output.
pub fn extend_from_plan(graph: &mut WorkflowGraph, planner_id: &str) -> Option<String> {
    let planner = graph.node(planner_id)?;
    if !planner.is_planner() || !graph.successors_of(planner_id).is_empty() {
        return None;
    }

    let payload = planner
        .artifacts
        .iter()
        .rev()
        .find(|a| a.name == PLAN_ARTIFACT)?
        .payload
        .clone();
    let tasks = parse_task_list(&payload)?;
    if tasks.is_empty() {
        debug!(node = %planner_id, "Planner artifact contained no tasks");
        return None;
    }

    let task_id = planner.task_id.clone();
    let context_id = planner.context_id.clone();

    let mut first = None;
    let mut prev = planner_id.to_string();
    for task in &tasks {
        let id = graph.add_node(WorkflowNode::new(task, &task_id, &context_id));
        // Both endpoints exist by construction.
        let _ = graph.add_edge(&prev, &id);
        if first.is_none() {
            first = Some(id.clone());
        }
        prev = id;
    }

    info!(
        planner = %planner_id,
        new_nodes = tasks.len(),
        "Extended workflow graph from planner output"
    );
    first
}

/// Pulls task descriptions out of a planner artifact payload.
///
/// Accepted shapes: a JSON array, or an object with a `tasks` array;
/// elements may be strings or objects carrying a `description`, `task`,
/// or `query` string. Anything else is malformed and yields `None`.
fn parse_task_list(payload: &serde_json::Value) -> Option<Vec<String>> {
    let items = match payload {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) => map.get("tasks")?.as_array()?,
        _ => return None,
    };

    let tasks: Vec<String> = items.iter().filter_map(task_description).collect();
    if tasks.is_empty() && !items.is_empty() {
        // Entries were present but none was usable.
        return None;
    }
    Some(tasks)
}

fn task_description(item: &serde_json::Value) -> Option<String> {
    match item {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Object(map) => ["description", "task", "query"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::node::PLANNER_KEY;
    use serde_json::json;

    fn graph_with_planner() -> (WorkflowGraph, String) {
        let mut graph = WorkflowGraph::new();
        let planner =
            WorkflowNode::new("Plan the research", "task-1", "ctx-1").with_key(PLANNER_KEY);
        let id = graph.add_node(planner);
        (graph, id)
    }

    #[test]
    fn test_extension_chains_tasks_after_planner() {
        let (mut graph, planner_id) = graph_with_planner();
        graph.node_mut(&planner_id).unwrap().add_artifact(
            PLAN_ARTIFACT,
            json!({"tasks": ["find flights", "find hotels", "build itinerary"]}),
        );

        let first = extend_from_plan(&mut graph, &planner_id).unwrap();

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.successors_of(&planner_id), [first.clone()]);
        // Linear chain: planner -> t1 -> t2 -> t3.
        let second = graph.successors_of(&first)[0].clone();
        let third = graph.successors_of(&second)[0].clone();
        assert!(graph.successors_of(&third).is_empty());
        assert_eq!(graph.node(&first).unwrap().task, "find flights");
        assert_eq!(graph.node(&first).unwrap().task_id, "task-1");
        assert_eq!(graph.node(&third).unwrap().context_id, "ctx-1");
    }

    #[test]
    fn test_object_entries_with_description() {
        let (mut graph, planner_id) = graph_with_planner();
        graph.node_mut(&planner_id).unwrap().add_artifact(
            PLAN_ARTIFACT,
            json!([{"description": "step one"}, {"task": "step two"}]),
        );
        assert!(extend_from_plan(&mut graph, &planner_id).is_some());
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn test_malformed_artifact_is_a_no_op() {
        let (mut graph, planner_id) = graph_with_planner();
        graph
            .node_mut(&planner_id)
            .unwrap()
            .add_artifact(PLAN_ARTIFACT, json!("not a plan"));
        assert!(extend_from_plan(&mut graph, &planner_id).is_none());
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_missing_artifact_is_a_no_op() {
        let (mut graph, planner_id) = graph_with_planner();
        graph
            .node_mut(&planner_id)
            .unwrap()
            .add_artifact("result", json!({"tasks": ["x"]}));
        assert!(extend_from_plan(&mut graph, &planner_id).is_none());
    }

    #[test]
    fn test_non_planner_node_is_ignored() {
        let mut graph = WorkflowGraph::new();
        let id = graph.add_node(WorkflowNode::new("ordinary", "t", "c"));
        graph
            .node_mut(&id)
            .unwrap()
            .add_artifact(PLAN_ARTIFACT, json!(["a"]));
        assert!(extend_from_plan(&mut graph, &id).is_none());
    }

    #[test]
    fn test_planner_with_successors_is_not_extended_twice() {
        let (mut graph, planner_id) = graph_with_planner();
        graph
            .node_mut(&planner_id)
            .unwrap()
            .add_artifact(PLAN_ARTIFACT, json!(["a", "b"]));
        let first = extend_from_plan(&mut graph, &planner_id);
        assert!(first.is_some());
        assert!(extend_from_plan(&mut graph, &planner_id).is_none());
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn test_empty_task_list_is_a_no_op() {
        let (mut graph, planner_id) = graph_with_planner();
        graph
            .node_mut(&planner_id)
            .unwrap()
            .add_artifact(PLAN_ARTIFACT, json!({"tasks": []}));
        assert!(extend_from_plan(&mut graph, &planner_id).is_none());
    }
}
