//! Workflow engine for the Ensemble framework: the task dependency graph,
//! its level-parallel scheduler with pause/resume semantics, and the
//! planner-driven dynamic graph builder.
//!
//! Graphs start as a single planner node; every other node is materialized
//! at runtime from the planner's output artifact. The scheduler partitions
//! the reachable subgraph into dependency levels and executes each level
//! either concurrently or sequentially, streaming events as they arrive.
//!
//! # Main types
//!
//! - [`WorkflowGraph`] / [`WorkflowNode`] — The task dependency DAG.
//! - [`WorkflowScheduler`] — Level-parallel execution with pause/resume.
//! - [`TaskExecutor`] — Boundary trait to the remote agent collaborator.
//! - [`WorkflowEvent`] — Events streamed to the scheduler's caller.

/// Planner-driven dynamic graph extension.
pub mod builder;
/// The task executor boundary trait.
pub mod executor;
/// The workflow dependency graph.
pub mod graph;
/// Workflow nodes and their lifecycle states.
pub mod node;
/// The level-parallel scheduler.
pub mod scheduler;

pub use builder::{extend_from_plan, PLAN_ARTIFACT};
pub use executor::TaskExecutor;
pub use graph::WorkflowGraph;
pub use node::{NodeArtifact, RunState, WorkflowNode, PLANNER_KEY};
pub use scheduler::{RunOutcome, SchedulerConfig, WorkflowEvent, WorkflowScheduler};
