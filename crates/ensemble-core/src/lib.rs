//! Core types and error definitions for the Ensemble framework.
//!
//! This crate provides the foundational types shared across all Ensemble
//! crates: the inter-agent message envelope with its validation and version
//! compatibility rules, the task event stream contract, and error handling.
//! Pure data and rules — no I/O lives here.
//!
//! # Main types
//!
//! - [`EnsembleError`] — Unified error enum for all Ensemble subsystems.
//! - [`EnsembleResult`] — Convenience alias for `Result<T, EnsembleError>`.
//! - [`AgentMessage`] — The inter-agent message envelope.
//! - [`MessageType`] / [`MessageStatus`] — Envelope classification enums.
//! - [`TaskEvent`] / [`TaskState`] — Events streamed by delegated task work.

/// Task event stream types.
pub mod events;
/// The inter-agent message envelope and its validation rules.
pub mod message;

mod error;

pub use error::{EnsembleError, EnsembleResult};
pub use events::{TaskEvent, TaskState};
pub use message::{
    version_compatible, AgentMessage, MessageStatus, MessageType, PROTOCOL_VERSION,
};
