use crate::{SubAgent, SubAgentResult};
use orc_blackboard::BlackboardWriter;
use orc_domain::config::SubAgentConfig;
use orc_domain::{PlanStep, RequestContext, Result, SubAgentKind};
use orc_knowledge::{KnowledgeRetriever, NodeType, SearchQuery};
use orc_providers::{ChatRequest, LlmRouter};
use std::sync::Arc;

/// Gathers information relevant to a step's instruction: a knowledge
/// bundle search (FAQs + schemas) plus an LLM call to synthesize and
/// extract discrete findings, each recorded on the blackboard
/// individually so downstream steps can cite them.
pub struct ResearcherSubAgent {
    router: Arc<LlmRouter>,
    retriever: Option<Arc<dyn KnowledgeRetriever>>,
    config: SubAgentConfig,
}

impl ResearcherSubAgent {
    pub fn new(
        router: Arc<LlmRouter>,
        retriever: Option<Arc<dyn KnowledgeRetriever>>,
        config: SubAgentConfig,
    ) -> Self {
        Self { router, retriever, config }
    }

    async fn knowledge_context(&self, ctx: &RequestContext, query: &str) -> String {
        let Some(retriever) = &self.retriever else {
            return String::new();
        };
        let mut q = SearchQuery::new(ctx.user.id.clone(), query, 8);
        q.node_types = Some(vec![NodeType::Faq, NodeType::Schema, NodeType::Concept]);
        match retriever.bundle(&q).await {
            Ok(bundle) => bundle.for_prompt(4000),
            Err(e) => {
                tracing::warn!(error = %e, "failed to retrieve knowledge for research");
                String::new()
            }
        }
    }
}

#[async_trait::async_trait]
impl SubAgent for ResearcherSubAgent {
    fn kind(&self) -> SubAgentKind {
        SubAgentKind::Researcher
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        blackboard: &mut BlackboardWriter<'_>,
        step: &PlanStep,
        system_prompt: &str,
    ) -> Result<SubAgentResult> {
        let knowledge_context = self.knowledge_context(ctx, &step.description).await;
        let blackboard_context = blackboard.context_for_llm(3000);

        let mut prompt = format!("Research task: {}\n\n", step.description);
        if !knowledge_context.is_empty() {
            prompt.push_str(&format!("Relevant Knowledge:\n{knowledge_context}\n\n"));
        }
        if !blackboard_context.is_empty() {
            prompt.push_str(&format!("Current Context:\n{blackboard_context}\n\n"));
        }
        prompt.push_str("Provide your findings as one or more short paragraphs, each covering a distinct fact or conclusion.");

        let req = ChatRequest {
            messages: vec![orc_domain::Message::system(system_prompt), orc_domain::Message::user(prompt)],
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            ..Default::default()
        };

        let resp = match self.router.chat_for_role(SubAgentKind::Researcher, req).await {
            Ok(r) => r,
            Err(e) => return Ok(SubAgentResult::failure(e.to_string())),
        };

        let findings = split_into_findings(&resp.content);
        for finding in &findings {
            blackboard.add_finding("researcher", finding.clone(), None, 0.7);
        }

        let tokens = resp.usage.map(|u| u.total_tokens).unwrap_or(0);
        Ok(SubAgentResult::success(
            serde_json::json!({"findings": findings, "count": findings.len()}),
            tokens,
        ))
    }
}

/// One finding per blank-line-separated block; the whole reply as a
/// single finding when the model didn't naturally paragraph its answer.
fn split_into_findings(content: &str) -> Vec<String> {
    let blocks: Vec<String> = content
        .split("\n\n")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if blocks.is_empty() {
        vec![content.trim().to_string()]
    } else {
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_blank_lines() {
        let content = "First finding.\n\nSecond finding.\n\nThird finding.";
        let findings = split_into_findings(content);
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0], "First finding.");
    }

    #[test]
    fn treats_unstructured_reply_as_one_finding() {
        let findings = split_into_findings("just one line of text");
        assert_eq!(findings, vec!["just one line of text".to_string()]);
    }

    #[test]
    fn trims_and_drops_empty_blocks() {
        let content = "  padded finding  \n\n\n\nanother";
        let findings = split_into_findings(content);
        assert_eq!(findings, vec!["padded finding".to_string(), "another".to_string()]);
    }
}
