use serde::{Deserialize, Serialize};

/// Terminal and intermediate states reported by delegated task work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// The task is making progress.
    Working,
    /// The task needs an answer to a clarifying question before it can
    /// continue; the question travels in the event's `message`.
    InputRequired,
    /// The task finished successfully.
    Completed,
    /// The task failed.
    Failed,
}

/// Events emitted while a delegated task executes.
///
/// A task's delegation yields a lazy, finite sequence of these; consumers
/// (the scheduler, and through it the controller's callers) receive them
/// as they arrive. A [`TaskState::Completed`] status ends normal
/// processing; [`TaskState::InputRequired`] triggers the pause transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A change in the task's execution state.
    StatusUpdate {
        /// The new state.
        state: TaskState,
        /// Free-form detail; for [`TaskState::InputRequired`] this is the
        /// clarifying question.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// A named piece of output produced by the task.
    ArtifactUpdate {
        /// Artifact name; distinguished names mark planner output.
        name: String,
        /// Structured artifact payload.
        payload: serde_json::Value,
    },
}

impl TaskEvent {
    /// A [`TaskState::Working`] status update.
    pub fn working(message: impl Into<String>) -> Self {
        Self::StatusUpdate {
            state: TaskState::Working,
            message: Some(message.into()),
        }
    }

    /// A [`TaskState::Completed`] status update.
    pub fn completed() -> Self {
        Self::StatusUpdate {
            state: TaskState::Completed,
            message: None,
        }
    }

    /// A [`TaskState::InputRequired`] status update carrying the question.
    pub fn input_required(question: impl Into<String>) -> Self {
        Self::StatusUpdate {
            state: TaskState::InputRequired,
            message: Some(question.into()),
        }
    }

    /// A [`TaskState::Failed`] status update carrying the reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::StatusUpdate {
            state: TaskState::Failed,
            message: Some(reason.into()),
        }
    }

    /// An artifact update.
    pub fn artifact(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::ArtifactUpdate {
            name: name.into(),
            payload,
        }
    }
}
