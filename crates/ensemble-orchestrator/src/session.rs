use ensemble_workflow::WorkflowGraph;

/// Per-conversation state: the live workflow graph plus the accumulated
/// exchange history used for synthesis and auto-answering.
///
/// One context exists per conversation; the controller rebuilds it whenever
/// the context id changes. The graph inside is cleared atomically once a
/// completed workflow has been summarized.
pub struct SessionContext {
    /// The conversation this session belongs to.
    pub context_id: String,
    /// The session's workflow graph.
    pub graph: WorkflowGraph,
    /// Chronological log of user queries, auto-answers, and summaries.
    pub history: Vec<String>,
}

impl SessionContext {
    /// Creates a fresh session for the given context id.
    pub fn new(context_id: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
            graph: WorkflowGraph::new(),
            history: Vec::new(),
        }
    }

    /// Appends an entry to the exchange history.
    pub fn record(&mut self, entry: impl Into<String>) {
        self.history.push(entry.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_empty() {
        let session = SessionContext::new("ctx-1");
        assert_eq!(session.context_id, "ctx-1");
        assert!(session.graph.is_empty());
        assert!(session.history.is_empty());
    }

    #[test]
    fn test_record_appends() {
        let mut session = SessionContext::new("ctx-1");
        session.record("user: hello");
        session.record("summary: done");
        assert_eq!(session.history.len(), 2);
    }
}
