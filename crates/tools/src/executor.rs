use crate::registry::ToolRegistry;
use orc_blackboard::{BlackboardWriter, InteractionType};
use orc_domain::config::HilConfig;
use orc_domain::{RequestContext, ToolResult};
use std::time::{Duration, Instant};

/// A tool call awaiting dispatch, as produced by an LLM's tool-use turn.
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs tool calls against a `ToolRegistry`, gating destructive or
/// high-value calls behind human confirmation before they execute.
///
/// Mirrors the reference executor's try/except-to-result translation:
/// `execute` never returns `Err` — every failure mode folds into a
/// `ToolResult { success: false, .. }` so callers always get a uniform
/// shape to feed back to the LLM.
pub struct ToolExecutor<'a> {
    registry: &'a ToolRegistry,
    hil: &'a HilConfig,
}

impl<'a> ToolExecutor<'a> {
    pub fn new(registry: &'a ToolRegistry, hil: &'a HilConfig) -> Self {
        Self { registry, hil }
    }

    pub async fn execute(
        &self,
        ctx: RequestContext,
        name: &str,
        args: serde_json::Value,
        call_id: &str,
        mut blackboard: Option<&mut BlackboardWriter<'_>>,
    ) -> ToolResult {
        let start = Instant::now();

        let (spec, func) = match self.registry.get(name) {
            Some(found) => found,
            None => return failure(call_id, name, start, format!("tool '{name}' not found")),
        };

        for required in &spec.required_permissions {
            if !ctx.user.has_permission(required) {
                return failure(call_id, name, start, "permission denied".to_string());
            }
        }

        if spec.requires_hil_for(&args, self.hil) {
            let prompt = spec.confirmation_prompt.clone().unwrap_or_else(|| {
                format!("Approve action: {name}?\n{}", describe_args(&args))
            });
            let interaction_id = match blackboard.as_deref_mut() {
                Some(bb) => bb.add_pending_interaction(InteractionType::Confirm, prompt, None, None, 0.0),
                None => uuid::Uuid::new_v4().to_string(),
            };
            return ToolResult {
                call_id: call_id.to_string(),
                tool_name: name.to_string(),
                success: true,
                output: serde_json::json!({
                    "status": "awaiting_approval",
                    "interaction_id": interaction_id,
                    "tool_name": name,
                    "arguments": args,
                }),
                error: None,
                duration_ms: elapsed_ms(start),
                truncated: false,
            };
        }

        let timeout = spec
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let result = tokio::time::timeout(timeout, func(ctx, args)).await;

        let tool_result = match result {
            Ok(Ok(value)) => ToolResult {
                call_id: call_id.to_string(),
                tool_name: name.to_string(),
                success: true,
                output: value,
                error: None,
                duration_ms: elapsed_ms(start),
                truncated: false,
            },
            Ok(Err(err)) => failure(call_id, name, start, err.to_string()),
            Err(_) => failure(
                call_id,
                name,
                start,
                format!("{name} timed out after {}s", timeout.as_secs()),
            ),
        };

        if let Some(bb) = blackboard {
            bb.add_tool_result(tool_result.clone());
        }

        tool_result
    }

    /// Run every call, preserving input order in the output. Parallel
    /// execution cannot share a single `BlackboardWriter` (it requires
    /// exclusive `&mut` access), so parallel calls run without blackboard
    /// recording and the caller records results afterward; sequential
    /// calls can record as they go.
    pub async fn execute_many(
        &self,
        ctx: RequestContext,
        calls: Vec<PendingCall>,
        parallel: bool,
        mut blackboard: Option<&mut BlackboardWriter<'_>>,
    ) -> Vec<ToolResult> {
        if parallel {
            let futures = calls.into_iter().map(|call| {
                let ctx = ctx.clone();
                async move {
                    self.execute(ctx, &call.tool_name, call.arguments, &call.call_id, None)
                        .await
                }
            });
            let results = futures_util::future::join_all(futures).await;
            if let Some(bb) = blackboard.as_deref_mut() {
                for result in &results {
                    bb.add_tool_result(result.clone());
                }
            }
            results
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                let result = self
                    .execute(
                        ctx.clone(),
                        &call.tool_name,
                        call.arguments,
                        &call.call_id,
                        blackboard.as_deref_mut(),
                    )
                    .await;
                results.push(result);
            }
            results
        }
    }

    /// Resolve a suspended interaction and run the originally-gated call.
    pub async fn execute_approved(
        &self,
        ctx: RequestContext,
        blackboard: &mut BlackboardWriter<'_>,
        interaction_id: &str,
        name: &str,
        args: serde_json::Value,
        call_id: &str,
    ) -> ToolResult {
        blackboard.resolve_interaction(interaction_id, serde_json::json!({"approved": true}));

        let (spec, func) = match self.registry.get(name) {
            Some(found) => found,
            None => {
                let start = Instant::now();
                return failure(call_id, name, start, format!("tool '{name}' not found"));
            }
        };
        let start = Instant::now();
        let timeout = spec
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let result = tokio::time::timeout(timeout, func(ctx, args)).await;
        let tool_result = match result {
            Ok(Ok(value)) => ToolResult {
                call_id: call_id.to_string(),
                tool_name: name.to_string(),
                success: true,
                output: value,
                error: None,
                duration_ms: elapsed_ms(start),
                truncated: false,
            },
            Ok(Err(err)) => failure(call_id, name, start, err.to_string()),
            Err(_) => failure(
                call_id,
                name,
                start,
                format!("{name} timed out after {}s", timeout.as_secs()),
            ),
        };
        blackboard.add_tool_result(tool_result.clone());
        tool_result
    }
}

fn failure(call_id: &str, name: &str, start: Instant, message: String) -> ToolResult {
    ToolResult {
        call_id: call_id.to_string(),
        tool_name: name.to_string(),
        success: false,
        output: serde_json::Value::Null,
        error: Some(message),
        duration_ms: elapsed_ms(start),
        truncated: false,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn describe_args(args: &serde_json::Value) -> String {
    match args.as_object() {
        Some(map) if !map.is_empty() => map
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(", "),
        _ => "(no arguments)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ToolFn, ToolRegistry};
    use orc_domain::{RiskTier, ToolSpec, User};
    use std::sync::Arc;

    fn ctx() -> RequestContext {
        RequestContext::new(
            User {
                id: "u1".into(),
                username: "alice".into(),
                email: None,
                permissions: Default::default(),
                bearer_token: None,
            },
            "sess1",
            "req1",
        )
    }

    fn echo_tool() -> (ToolSpec, ToolFn) {
        (
            ToolSpec {
                name: "echo".into(),
                description: "echoes args".into(),
                parameters: serde_json::json!({}),
                risk: Some(RiskTier::Read),
                timeout_ms: None,
                required_permissions: vec![],
                confirmation_prompt: None,
            },
            Arc::new(|_ctx, args| Box::pin(async move { Ok(args) })),
        )
    }

    fn delete_tool() -> (ToolSpec, ToolFn) {
        (
            ToolSpec {
                name: "delete_record".into(),
                description: "deletes a record".into(),
                parameters: serde_json::json!({}),
                risk: Some(RiskTier::Destructive),
                timeout_ms: None,
                required_permissions: vec![],
                confirmation_prompt: None,
            },
            Arc::new(|_ctx, _args| Box::pin(async move { Ok(serde_json::json!({"deleted": true})) })),
        )
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_panicking() {
        let registry = ToolRegistry::build(vec![echo_tool()]).unwrap();
        let hil = HilConfig::default();
        let executor = ToolExecutor::new(&registry, &hil);
        let result = executor.execute(ctx(), "missing", serde_json::json!({}), "c1", None).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn successful_call_reports_output() {
        let registry = ToolRegistry::build(vec![echo_tool()]).unwrap();
        let hil = HilConfig::default();
        let executor = ToolExecutor::new(&registry, &hil);
        let result = executor
            .execute(ctx(), "echo", serde_json::json!({"x": 1}), "c1", None)
            .await;
        assert!(result.success);
        assert_eq!(result.output, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn destructive_tool_suspends_for_approval() {
        let registry = ToolRegistry::build(vec![delete_tool()]).unwrap();
        let hil = HilConfig::default();
        let executor = ToolExecutor::new(&registry, &hil);
        let result = executor
            .execute(ctx(), "delete_record", serde_json::json!({}), "c1", None)
            .await;
        assert!(result.success);
        assert_eq!(result.output["status"], "awaiting_approval");
    }

    #[tokio::test]
    async fn execute_many_parallel_preserves_order() {
        let registry = ToolRegistry::build(vec![echo_tool()]).unwrap();
        let hil = HilConfig::default();
        let executor = ToolExecutor::new(&registry, &hil);
        let calls = vec![
            PendingCall { call_id: "1".into(), tool_name: "echo".into(), arguments: serde_json::json!({"n": 1}) },
            PendingCall { call_id: "2".into(), tool_name: "echo".into(), arguments: serde_json::json!({"n": 2}) },
        ];
        let results = executor.execute_many(ctx(), calls, true, None).await;
        assert_eq!(results[0].output["n"], 1);
        assert_eq!(results[1].output["n"], 2);
    }
}
