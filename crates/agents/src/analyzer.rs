use crate::json_extract::extract_object;
use crate::{SubAgent, SubAgentResult};
use orc_blackboard::BlackboardWriter;
use orc_domain::config::SubAgentConfig;
use orc_domain::{PlanStep, RequestContext, Result, SubAgentKind};
use orc_providers::{ChatRequest, LlmRouter};
use std::sync::Arc;

/// Reasons over the blackboard's accumulated state — variables, recent
/// findings, recent tool results — without issuing tool calls of its
/// own. Emits at least one finding and may derive new variables from a
/// `"## Variables"` JSON block in its reply.
pub struct AnalyzerSubAgent {
    router: Arc<LlmRouter>,
    config: SubAgentConfig,
}

impl AnalyzerSubAgent {
    pub fn new(router: Arc<LlmRouter>, config: SubAgentConfig) -> Self {
        Self { router, config }
    }
}

#[async_trait::async_trait]
impl SubAgent for AnalyzerSubAgent {
    fn kind(&self) -> SubAgentKind {
        SubAgentKind::Analyzer
    }

    async fn execute(
        &self,
        _ctx: &RequestContext,
        blackboard: &mut BlackboardWriter<'_>,
        step: &PlanStep,
        system_prompt: &str,
    ) -> Result<SubAgentResult> {
        let variables = blackboard.all_variables();
        let variables_json = serde_json::to_string_pretty(&variables).unwrap_or_default();
        let blackboard_context = blackboard.context_for_llm(4000);

        let prompt = format!(
            "Analysis task: {}\n\nCurrent Variables:\n{variables_json}\n\nContext:\n{blackboard_context}\n\n\
            Provide your analysis. If you derive any new variables, include a final section titled \
            \"## Variables\" containing a JSON object of key/value pairs.",
            step.description,
        );

        let req = ChatRequest {
            messages: vec![orc_domain::Message::system(system_prompt), orc_domain::Message::user(prompt)],
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            ..Default::default()
        };

        let resp = match self.router.chat_for_role(SubAgentKind::Analyzer, req).await {
            Ok(r) => r,
            Err(e) => return Ok(SubAgentResult::failure(e.to_string())),
        };

        let (analysis_text, derived) = extract_variables_section(&resp.content);
        blackboard.add_finding("analyzer", analysis_text.clone(), None, 0.75);

        let mut set_keys = Vec::new();
        if let Some(obj) = derived.as_ref().and_then(|v| v.as_object()) {
            for (key, value) in obj {
                blackboard.set(key.clone(), value.clone(), "analyzer");
                set_keys.push(key.clone());
            }
        }

        let tokens = resp.usage.map(|u| u.total_tokens).unwrap_or(0);
        Ok(SubAgentResult::success(
            serde_json::json!({"analysis": analysis_text, "variables_set": set_keys}),
            tokens,
        ))
    }
}

/// Split off a trailing `"## Variables"` section and parse it as JSON,
/// returning the remaining prose plus the parsed object (if any).
fn extract_variables_section(content: &str) -> (String, Option<serde_json::Value>) {
    match content.find("## Variables") {
        Some(idx) => {
            let (prose, section) = content.split_at(idx);
            (prose.trim().to_string(), extract_object(section))
        }
        None => (content.trim().to_string(), None),
    }
}
