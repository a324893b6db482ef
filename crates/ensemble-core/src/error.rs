use std::time::Duration;

/// Top-level error type for the Ensemble framework.
///
/// Each variant corresponds to a subsystem or protocol rule that can fail.
#[derive(Debug, thiserror::Error)]
pub enum EnsembleError {
    /// A message failed validation. Carries every violation found, not just
    /// the first, so callers can report all problems at once.
    #[error("Protocol violation: {}", violations.join("; "))]
    Protocol {
        /// Human-readable descriptions of each rule the message broke.
        violations: Vec<String>,
    },

    /// An agent with this id is already present in the registry.
    #[error("Agent '{0}' is already registered")]
    AlreadyRegistered(String),

    /// The addressed agent is not present in the registry.
    #[error("Agent '{0}' not found")]
    AgentNotFound(String),

    /// A correlated request did not receive its response in time.
    /// The pending entry has already been cleaned up when this surfaces.
    #[error("Request '{message_id}' timed out after {timeout:?}")]
    RequestTimeout {
        /// The message id the request was keyed by.
        message_id: String,
        /// How long the caller was willing to wait.
        timeout: Duration,
    },

    /// An error in message delivery outside of routing lookups.
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// An error in workflow graph construction or scheduling.
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// An error raised by a delegated agent while executing a task.
    #[error("Execution error: {0}")]
    Execution(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EnsembleError {
    /// Creates a [`EnsembleError::Protocol`] from a single violation.
    pub fn protocol(violation: impl Into<String>) -> Self {
        Self::Protocol {
            violations: vec![violation.into()],
        }
    }
}

/// A convenience `Result` alias using [`EnsembleError`].
pub type EnsembleResult<T> = Result<T, EnsembleError>;
