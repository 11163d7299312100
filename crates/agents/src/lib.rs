//! The five sub-agent roles dispatched by the orchestrator against plan
//! steps: Planner, Researcher, Analyzer, Executor, Synthesizer.
//!
//! A single `SubAgent` trait replaces the reference implementation's
//! `SubAgentBase` inheritance hierarchy — each role is a distinct type
//! implementing the same trait rather than a subclass overriding a
//! handful of hook methods.

mod json_extract;

pub mod analyzer;
pub mod executor;
pub mod planner;
pub mod researcher;
pub mod synthesizer;

pub use analyzer::AnalyzerSubAgent;
pub use executor::ExecutorSubAgent;
pub use planner::PlannerSubAgent;
pub use researcher::ResearcherSubAgent;
pub use synthesizer::SynthesizerSubAgent;

use orc_blackboard::BlackboardWriter;
use orc_domain::{PlanStep, RequestContext, Result, SubAgentKind};

/// Outcome of one sub-agent invocation. `success: false` represents a
/// caught failure (LLM error, tool error) folded into the result rather
/// than propagated, mirroring the Python `try/except ->
/// SubAgentResult.failure_result` pattern; the trait still returns
/// `Result` so truly unexpected errors (a poisoned lock, a bug) can use
/// `?` like everywhere else in the crate.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubAgentResult {
    pub success: bool,
    pub output: serde_json::Value,
    pub tokens_used: u32,
    pub error: Option<String>,
}

impl SubAgentResult {
    pub fn success(output: serde_json::Value, tokens_used: u32) -> Self {
        Self { success: true, output, tokens_used, error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, output: serde_json::Value::Null, tokens_used: 0, error: Some(error.into()) }
    }
}

#[async_trait::async_trait]
pub trait SubAgent: Send + Sync {
    fn kind(&self) -> SubAgentKind;

    async fn execute(
        &self,
        ctx: &RequestContext,
        blackboard: &mut BlackboardWriter<'_>,
        step: &PlanStep,
        system_prompt: &str,
    ) -> Result<SubAgentResult>;
}
