use async_trait::async_trait;
use ensemble_core::EnsembleResult;
use ensemble_workflow::NodeArtifact;

/// Boundary to the external model collaborator that turns a completed
/// workflow's artifacts into a final answer, and that may answer a node's
/// clarifying question from accumulated context so the pause never reaches
/// the caller.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Produces the final synthesis for a completed workflow.
    async fn summarize(
        &self,
        query: &str,
        artifacts: &[NodeArtifact],
    ) -> EnsembleResult<String>;

    /// Attempts to answer a clarifying question from the session history.
    ///
    /// Returning `None` surfaces the pause to the caller instead.
    async fn answer_clarification(
        &self,
        _question: &str,
        _history: &[String],
    ) -> EnsembleResult<Option<String>> {
        Ok(None)
    }
}

/// Deterministic synthesizer that formats a completion report from the
/// collected artifacts. Suitable as a default and for tests; LLM-backed
/// synthesis plugs in behind the same trait.
pub struct ReportSynthesizer;

#[async_trait]
impl Synthesizer for ReportSynthesizer {
    async fn summarize(
        &self,
        query: &str,
        artifacts: &[NodeArtifact],
    ) -> EnsembleResult<String> {
        let mut report = format!(
            "Workflow complete: {} artifact(s) produced for \"{query}\"",
            artifacts.len()
        );
        for artifact in artifacts {
            report.push_str(&format!("\n- {}: {}", artifact.name, artifact.payload));
        }
        Ok(report)
    }
}
