use crate::json_extract::extract_array;
use crate::{SubAgent, SubAgentResult};
use orc_blackboard::BlackboardWriter;
use orc_domain::config::SubAgentConfig;
use orc_domain::{PlanStep, RequestContext, Result, SubAgentKind};
use orc_providers::{ChatRequest, LlmRouter};
use std::sync::Arc;

/// Produces the final Markdown answer from everything the plan
/// accumulated: the last 15 findings and last 10 compacted tool
/// results. The result is written to `blackboard.final_result` (the
/// counterpart of `ExecutionPlan.final_result` in the Python original,
/// kept on the blackboard here rather than on `ExecutionPlan` for the
/// same reason `goal` is — see [`crate::planner`]).
pub struct SynthesizerSubAgent {
    router: Arc<LlmRouter>,
    config: SubAgentConfig,
}

impl SynthesizerSubAgent {
    pub fn new(router: Arc<LlmRouter>, config: SubAgentConfig) -> Self {
        Self { router, config }
    }

    /// Ask the model for up to `n` short, phrased-as-a-question follow-ups.
    pub async fn generate_suggestions(&self, query: &str, response: &str, n: usize) -> Vec<String> {
        let prompt = format!(
            "The user asked: {query}\n\nThe response given was:\n{response}\n\n\
            Suggest up to {n} short, natural follow-up questions the user might ask next. \
            Output as a JSON array of strings, nothing else.",
        );
        let req = ChatRequest {
            messages: vec![orc_domain::Message::user(prompt)],
            temperature: Some(0.7),
            max_tokens: Some(256),
            ..Default::default()
        };
        match self.router.chat_for_role(SubAgentKind::Synthesizer, req).await {
            Ok(resp) => extract_array(&resp.content)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .take(n)
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to generate follow-up suggestions");
                Vec::new()
            }
        }
    }

    pub fn summarize(content: &str, max_len: usize) -> String {
        if content.chars().count() > max_len {
            let truncated: String = content.chars().take(max_len).collect();
            format!("{truncated}…")
        } else {
            content.to_string()
        }
    }
}

#[async_trait::async_trait]
impl SubAgent for SynthesizerSubAgent {
    fn kind(&self) -> SubAgentKind {
        SubAgentKind::Synthesizer
    }

    async fn execute(
        &self,
        _ctx: &RequestContext,
        blackboard: &mut BlackboardWriter<'_>,
        step: &PlanStep,
        system_prompt: &str,
    ) -> Result<SubAgentResult> {
        let findings = recent_findings_text(blackboard, 15);
        let tool_results = recent_tool_results_text(blackboard, 10);

        let prompt = format!(
            "Task: {}\n\nOriginal Query: {}\n\nFindings:\n{findings}\n\nTool Results:\n{tool_results}\n\n\
            Write a clear, well-formatted Markdown response that answers the user's request using the \
            information above.",
            step.description,
            blackboard.query(),
        );

        let req = ChatRequest {
            messages: vec![orc_domain::Message::system(system_prompt), orc_domain::Message::user(prompt)],
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            ..Default::default()
        };

        let resp = match self.router.chat_for_role(SubAgentKind::Synthesizer, req).await {
            Ok(r) => r,
            Err(e) => return Ok(SubAgentResult::failure(e.to_string())),
        };

        blackboard.set("final_result", serde_json::json!(resp.content), "synthesizer");

        let tokens = resp.usage.map(|u| u.total_tokens).unwrap_or(0);
        Ok(SubAgentResult::success(serde_json::json!({"content": resp.content}), tokens))
    }
}

fn recent_findings_text(blackboard: &BlackboardWriter<'_>, n: usize) -> String {
    let findings = blackboard.findings();
    let start = findings.len().saturating_sub(n);
    findings[start..]
        .iter()
        .map(|f| format!("- [{}] {}", f.source, f.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn recent_tool_results_text(blackboard: &BlackboardWriter<'_>, n: usize) -> String {
    let results = blackboard.tool_results();
    let start = results.len().saturating_sub(n);
    results[start..]
        .iter()
        .map(|r| {
            if r.success {
                format!("- {}: {}", r.tool_name, SynthesizerSubAgent::summarize(&r.output.to_string(), 500))
            } else {
                format!("- {}: ERROR: {}", r.tool_name, r.error.as_deref().unwrap_or("unknown error"))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_passes_through_short_content() {
        assert_eq!(SynthesizerSubAgent::summarize("hello", 10), "hello");
    }

    #[test]
    fn summarize_truncates_with_ellipsis() {
        let result = SynthesizerSubAgent::summarize("abcdefghij", 5);
        assert_eq!(result, "abcde…");
    }
}
