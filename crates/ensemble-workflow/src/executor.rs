use async_trait::async_trait;
use ensemble_core::{EnsembleResult, TaskEvent};
use tokio::sync::mpsc;

/// Boundary to the domain-specific agent collaborator that performs a
/// node's actual work.
///
/// Given the node's current query and routing context, the collaborator
/// returns a lazy, finite stream of [`TaskEvent`]s. The scheduler consumes
/// the stream and never branches on what kind of agent produced it.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Delegates one task, returning its event stream.
    ///
    /// The stream ends when the sender side is dropped; a
    /// [`ensemble_core::TaskState::Completed`] status ends normal
    /// processing, and `InputRequired` triggers the pause transition.
    async fn execute(
        &self,
        query: &str,
        task_id: &str,
        context_id: &str,
    ) -> EnsembleResult<mpsc::Receiver<TaskEvent>>;
}
