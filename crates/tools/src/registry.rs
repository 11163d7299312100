use futures_util::future::BoxFuture;
use orc_domain::{Error, RequestContext, Result, ToolSpec};
use std::collections::HashMap;
use std::sync::Arc;

/// A registered tool's implementation. Every tool fn takes the calling
/// request's context and its arguments; tools that don't need `ctx`
/// simply ignore it — Rust closures have no reflection to make the
/// parameter conditional the way the reference implementation's
/// `func(ctx, **kwargs)` dynamic dispatch does.
pub type ToolFn =
    Arc<dyn Fn(RequestContext, serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value>> + Send + Sync>;

struct RegisteredTool {
    spec: ToolSpec,
    func: ToolFn,
}

/// Process-wide, immutable once built: the set of tools the orchestrator
/// and its sub-agents can call.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Build the registry from `(spec, func)` pairs, rejecting duplicate
    /// names up front rather than letting the last registration win
    /// silently at call time.
    pub fn build(entries: Vec<(ToolSpec, ToolFn)>) -> Result<Self> {
        let mut tools = HashMap::with_capacity(entries.len());
        for (spec, func) in entries {
            let name = spec.name.clone();
            if tools.contains_key(&name) {
                return Err(Error::Config(format!("duplicate tool registration: {name}")));
            }
            tools.insert(name, RegisteredTool { spec, func });
        }
        Ok(Self { tools })
    }

    pub fn get(&self, name: &str) -> Option<(&ToolSpec, &ToolFn)> {
        self.tools.get(name).map(|t| (&t.spec, &t.func))
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name).map(|t| &t.spec)
    }

    pub fn definitions(&self) -> Vec<orc_domain::ToolDefinition> {
        self.tools.values().map(|t| t.spec.definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::RiskTier;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.into(),
            description: "test tool".into(),
            parameters: serde_json::json!({}),
            risk: Some(RiskTier::Read),
            timeout_ms: None,
            required_permissions: vec![],
            confirmation_prompt: None,
        }
    }

    fn noop_fn() -> ToolFn {
        Arc::new(|_ctx, _args| Box::pin(async { Ok(serde_json::json!({})) }))
    }

    #[test]
    fn build_rejects_duplicate_names() {
        let entries = vec![(spec("echo"), noop_fn()), (spec("echo"), noop_fn())];
        let err = ToolRegistry::build(entries).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("echo")));
    }

    #[test]
    fn build_succeeds_with_unique_names() {
        let entries = vec![(spec("echo"), noop_fn()), (spec("ping"), noop_fn())];
        let registry = ToolRegistry::build(entries).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("echo").is_some());
    }
}
