use async_trait::async_trait;
use ensemble_core::{AgentMessage, EnsembleResult};

/// The capability interface implemented by every agent handle.
///
/// The router and dispatcher never branch on what kind of agent sits behind
/// the handle — a domain specialist, a proxy to a remote process, or a test
/// double all look the same: accept a message, eventually produce an
/// optional response.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique identifier this agent is registered under.
    fn id(&self) -> &str;

    /// Capabilities this agent advertises, used by broadcast filtering.
    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Accept a message and eventually produce an optional response.
    async fn handle(&self, message: AgentMessage) -> EnsembleResult<Option<AgentMessage>>;
}
