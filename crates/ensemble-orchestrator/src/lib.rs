//! Top-level orchestration for the Ensemble framework.
//!
//! Drives one conversational turn at a time: build (or resume) the session's
//! workflow graph, run the level-parallel scheduler, handle pause and
//! dynamic-extension outcomes in a trampoline loop, and finish each
//! completed workflow with a synthesis event.
//!
//! # Main types
//!
//! - [`Orchestrator`] — The controller behind the streaming `advance` API.
//! - [`SessionContext`] — Per-conversation state, rebuilt on context change.
//! - [`Synthesizer`] — Boundary to the external model collaborator.
//! - [`RemoteAgentExecutor`] — Bridges the message protocol into the
//!   workflow executor contract.

/// The orchestrating controller.
pub mod controller;
/// Remote-agent task execution over the message protocol.
pub mod remote;
/// Per-conversation session state.
pub mod session;
/// The synthesis boundary trait and its default implementation.
pub mod synthesis;

pub use controller::{Orchestrator, OrchestratorConfig};
pub use remote::RemoteAgentExecutor;
pub use session::SessionContext;
pub use synthesis::{ReportSynthesizer, Synthesizer};
