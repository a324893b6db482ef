use crate::agent::Agent;
use ensemble_core::{EnsembleError, EnsembleResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Central registry mapping agent ids to live handles.
///
/// Shared across sessions; registration and unregistration are infrequent
/// administrative operations, so a single `RwLock` over the map is all the
/// coordination needed.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent handle under its id.
    ///
    /// Fails with [`EnsembleError::AlreadyRegistered`] if the id is taken;
    /// the existing handle is left in place.
    pub async fn register(&self, agent: Arc<dyn Agent>) -> EnsembleResult<()> {
        let id = agent.id().to_string();
        let mut agents = self.agents.write().await;
        if agents.contains_key(&id) {
            return Err(EnsembleError::AlreadyRegistered(id));
        }
        info!(agent = %id, "Registered agent");
        agents.insert(id, agent);
        Ok(())
    }

    /// Removes an agent by id. Unknown ids are a no-op.
    pub async fn unregister(&self, agent_id: &str) {
        if self.agents.write().await.remove(agent_id).is_some() {
            info!(agent = %agent_id, "Unregistered agent");
        }
    }

    /// Looks up an agent handle by id.
    pub async fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().await.get(agent_id).cloned()
    }

    /// Returns the capabilities advertised by the given agent, if present.
    pub async fn capabilities(&self, agent_id: &str) -> Option<Vec<String>> {
        self.agents
            .read()
            .await
            .get(agent_id)
            .map(|a| a.capabilities())
    }

    /// Returns every registered agent, optionally restricted to those
    /// advertising the given capability.
    pub async fn agents_with(&self, capability: Option<&str>) -> Vec<Arc<dyn Agent>> {
        let agents = self.agents.read().await;
        agents
            .values()
            .filter(|a| match capability {
                Some(cap) => a.capabilities().iter().any(|c| c == cap),
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Number of registered agents.
    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    /// True when no agents are registered.
    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }
}
