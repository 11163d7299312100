use crate::{SubAgent, SubAgentResult};
use orc_blackboard::BlackboardWriter;
use orc_domain::config::{HilConfig, SubAgentConfig};
use orc_domain::{PlanStep, RequestContext, Result, SubAgentKind, ToolDefinition};
use orc_providers::{ChatRequest, LlmRouter};
use orc_tools::{ToolExecutor, ToolRegistry};
use std::sync::Arc;

/// Drives an LLM turn with the tool list attached, then dispatches
/// whatever tool calls the model makes through `ToolExecutor`. A call
/// gated behind human confirmation suspends the whole batch — later
/// calls in the same reply are not attempted until the interaction
/// resolves, matching the reference executor's early `return`.
pub struct ExecutorSubAgent {
    router: Arc<LlmRouter>,
    registry: Arc<ToolRegistry>,
    hil: Arc<HilConfig>,
    config: SubAgentConfig,
}

impl ExecutorSubAgent {
    pub fn new(router: Arc<LlmRouter>, registry: Arc<ToolRegistry>, hil: Arc<HilConfig>, config: SubAgentConfig) -> Self {
        Self { router, registry, hil, config }
    }

    fn tool_definitions_for(&self, ctx: &RequestContext) -> Vec<ToolDefinition> {
        self.registry
            .names()
            .into_iter()
            .filter_map(|name| self.registry.spec(name))
            .filter(|spec| spec.required_permissions.iter().all(|p| ctx.user.has_permission(p)))
            .map(|spec| spec.definition())
            .collect()
    }

    /// Resume a tool call that was suspended for human approval.
    pub async fn execute_approved_action(
        &self,
        ctx: RequestContext,
        blackboard: &mut BlackboardWriter<'_>,
        interaction_id: &str,
        tool_name: &str,
        args: serde_json::Value,
    ) -> SubAgentResult {
        let tool_executor = ToolExecutor::new(&self.registry, &self.hil);
        let call_id = format!("hil_{interaction_id}");
        let result = tool_executor
            .execute_approved(ctx, blackboard, interaction_id, tool_name, args, &call_id)
            .await;

        if result.success {
            SubAgentResult::success(
                serde_json::json!({"total": 1, "successful": 1, "failed": 0, "results": [compact_result(&result)]}),
                0,
            )
        } else {
            SubAgentResult::success(
                serde_json::json!({"total": 1, "successful": 0, "failed": 1, "results": [compact_result(&result)]}),
                0,
            )
        }
    }
}

#[async_trait::async_trait]
impl SubAgent for ExecutorSubAgent {
    fn kind(&self) -> SubAgentKind {
        SubAgentKind::Executor
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        blackboard: &mut BlackboardWriter<'_>,
        step: &PlanStep,
        system_prompt: &str,
    ) -> Result<SubAgentResult> {
        let blackboard_context = blackboard.context_for_llm(3000);
        let prompt = format!(
            "Execution task: {}\n\nContext:\n{blackboard_context}\n\nUse the available tools as needed to complete this task.",
            step.description,
        );

        let req = ChatRequest {
            messages: vec![orc_domain::Message::system(system_prompt), orc_domain::Message::user(prompt)],
            tools: self.tool_definitions_for(ctx),
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            ..Default::default()
        };

        let resp = match self.router.chat_for_role(SubAgentKind::Executor, req).await {
            Ok(r) => r,
            Err(e) => return Ok(SubAgentResult::failure(e.to_string())),
        };

        let tokens = resp.usage.map(|u| u.total_tokens).unwrap_or(0);

        if resp.tool_calls.is_empty() {
            return Ok(SubAgentResult::success(serde_json::json!({"content": resp.content}), tokens));
        }

        let tool_executor = ToolExecutor::new(&self.registry, &self.hil);
        let mut results = Vec::with_capacity(resp.tool_calls.len());

        for call in &resp.tool_calls {
            let result = tool_executor
                .execute(ctx.clone(), &call.tool_name, call.arguments.clone(), &call.call_id, Some(&mut *blackboard))
                .await;

            if result.output.get("status").and_then(|v| v.as_str()) == Some("awaiting_approval") {
                return Ok(SubAgentResult {
                    success: true,
                    output: result.output,
                    tokens_used: tokens,
                    error: None,
                });
            }

            results.push(compact_result(&result));
        }

        let successful = results.iter().filter(|r| r["success"] == serde_json::json!(true)).count();
        let failed = results.len() - successful;

        Ok(SubAgentResult::success(
            serde_json::json!({"total": results.len(), "successful": successful, "failed": failed, "results": results}),
            tokens,
        ))
    }
}

fn compact_result(result: &orc_domain::ToolResult) -> serde_json::Value {
    if result.success {
        serde_json::json!({"tool": result.tool_name, "success": true, "result": result.output})
    } else {
        serde_json::json!({"tool": result.tool_name, "success": false, "error": result.error})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::{RiskTier, ToolSpec, User};
    use orc_tools::ToolFn;
    use std::sync::Arc as StdArc;

    fn ctx() -> RequestContext {
        RequestContext::new(
            User { id: "u1".into(), username: "alice".into(), email: None, permissions: Default::default(), bearer_token: None },
            "sess1",
            "req1",
        )
    }

    fn locked_tool() -> (ToolSpec, ToolFn) {
        (
            ToolSpec {
                name: "admin_only".into(),
                description: "restricted".into(),
                parameters: serde_json::json!({}),
                risk: Some(RiskTier::Write),
                timeout_ms: None,
                required_permissions: vec!["admin".into()],
                confirmation_prompt: None,
            },
            StdArc::new(|_ctx, _args| Box::pin(async { Ok(serde_json::json!({})) })),
        )
    }

    fn open_tool() -> (ToolSpec, ToolFn) {
        (
            ToolSpec {
                name: "open".into(),
                description: "open to all".into(),
                parameters: serde_json::json!({}),
                risk: Some(RiskTier::Read),
                timeout_ms: None,
                required_permissions: vec![],
                confirmation_prompt: None,
            },
            StdArc::new(|_ctx, _args| Box::pin(async { Ok(serde_json::json!({})) })),
        )
    }

    #[test]
    fn tool_definitions_filter_by_permission() {
        let registry = Arc::new(ToolRegistry::build(vec![locked_tool(), open_tool()]).unwrap());
        let hil = Arc::new(HilConfig::default());
        let router = Arc::new(LlmRouter::new(
            orc_providers::ProviderRegistry::from_providers(Default::default(), Default::default()),
            Default::default(),
            5000,
        ));
        let sub_agent = ExecutorSubAgent::new(router, registry, hil, SubAgentConfig { temperature: 0.2, max_tokens: 512 });

        let defs = sub_agent.tool_definitions_for(&ctx());
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "open");
    }

    #[test]
    fn compact_result_marks_success_and_failure() {
        let ok = orc_domain::ToolResult {
            call_id: "1".into(), tool_name: "t".into(), success: true,
            output: serde_json::json!({"x": 1}), error: None, duration_ms: 1, truncated: false,
        };
        assert_eq!(compact_result(&ok)["success"], serde_json::json!(true));

        let err = orc_domain::ToolResult {
            call_id: "2".into(), tool_name: "t".into(), success: false,
            output: serde_json::Value::Null, error: Some("boom".into()), duration_ms: 1, truncated: false,
        };
        assert_eq!(compact_result(&err)["success"], serde_json::json!(false));
    }
}
