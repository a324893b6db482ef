//! Agent registry, message routing, request/response correlation, and
//! capability-filtered broadcast for the Ensemble framework.
//!
//! # Main types
//!
//! - [`Agent`] — The capability interface every remote agent handle implements.
//! - [`AgentRegistry`] — Maps agent ids to live handles, shared across sessions.
//! - [`MessageDispatcher`] — Routes messages, correlates request/response
//!   pairs under timeout, and fans out broadcasts with per-target failure
//!   isolation.
//! - [`BroadcastReport`] — Collected outcome of one broadcast call.

/// The agent capability interface.
pub mod agent;
/// Message routing, correlation, and broadcast.
pub mod dispatcher;
/// The shared agent registry.
pub mod registry;

pub use agent::Agent;
pub use dispatcher::{BroadcastFailure, BroadcastReport, MessageDispatcher};
pub use registry::AgentRegistry;
