//! Per-request shared state for the orchestrator/sub-agent loop.
//!
//! The blackboard is the hub in the hub-and-spoke architecture: sub-agents
//! never talk to each other directly, they read from and write to the
//! blackboard, which the orchestrator owns exclusively for the lifetime
//! of one request. There is no internal locking here — the orchestrator
//! awaits each sub-agent's `execute()` call in turn and never hands out
//! overlapping `&mut` access, so a plain struct plays the role a
//! lock-guarded shared object would in a system with concurrent writers.

mod types;

pub use types::{
    BlackboardSummary, Finding, InteractionType, PendingInteraction, VariableEntry,
};

use chrono::Utc;
use orc_domain::{ExecutionPlan, RequestContext, ToolResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rough chars-per-token estimate used to size the LLM context budget,
/// matching the reference implementation's heuristic.
const CHARS_PER_TOKEN: usize = 4;

/// Truncate by character count, not byte offset — `String::truncate`
/// panics when the cut lands inside a multi-byte UTF-8 sequence.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

/// Serializable so the orchestrator can checkpoint an in-flight request
/// (e.g. while suspended awaiting human input) and rehydrate it later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blackboard {
    pub ctx: RequestContext,
    pub query: String,
    pub plan: Option<ExecutionPlan>,

    variables: std::collections::HashMap<String, VariableEntry>,
    variable_history: Vec<VariableEntry>,

    pub tool_results: Vec<ToolResult>,
    pub findings: Vec<Finding>,
    pub pending_interactions: Vec<PendingInteraction>,
    pub message_history: Vec<(String, String)>,
}

impl Blackboard {
    pub fn create(ctx: RequestContext, query: impl Into<String>) -> Self {
        Self {
            ctx,
            query: query.into(),
            plan: None,
            variables: std::collections::HashMap::new(),
            variable_history: Vec::new(),
            tool_results: Vec::new(),
            findings: Vec::new(),
            pending_interactions: Vec::new(),
            message_history: Vec::new(),
        }
    }

    /// A read-only view, handed to sub-agents that only need to consult
    /// state (e.g. the Planner reading prior findings before a replan).
    pub fn view(&self) -> BlackboardView<'_> {
        BlackboardView(self)
    }

    /// A mutation handle, handed to the sub-agent the orchestrator is
    /// currently dispatching. Scoped to one `execute()` call.
    pub fn writer(&mut self) -> BlackboardWriter<'_> {
        BlackboardWriter(self)
    }

    // ── Variable operations ─────────────────────────────────────────

    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value, source: impl Into<String>) {
        let entry = VariableEntry {
            key: key.into(),
            value,
            source: source.into(),
            timestamp: Utc::now(),
        };
        self.variables.insert(entry.key.clone(), entry.clone());
        self.variable_history.push(entry);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.variables.get(key).map(|e| &e.value)
    }

    pub fn has(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    pub fn all_variables(&self) -> std::collections::HashMap<String, serde_json::Value> {
        self.variables
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }

    pub fn variable_history(&self, key: Option<&str>) -> Vec<&VariableEntry> {
        match key {
            None => self.variable_history.iter().collect(),
            Some(k) => self.variable_history.iter().filter(|e| e.key == k).collect(),
        }
    }

    // ── Tool result operations ──────────────────────────────────────

    pub fn add_tool_result(&mut self, result: ToolResult) {
        self.tool_results.push(result);
    }

    pub fn get_tool_result(&self, call_id: &str) -> Option<&ToolResult> {
        self.tool_results.iter().find(|r| r.call_id == call_id)
    }

    // ── Finding operations ───────────────────────────────────────────

    pub fn add_finding(
        &mut self,
        source: impl Into<String>,
        content: impl Into<String>,
        evidence: Option<String>,
        confidence: f64,
    ) {
        self.findings.push(Finding {
            source: source.into(),
            content: content.into(),
            evidence,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: Utc::now(),
        });
    }

    pub fn findings_by_source(&self, source: &str) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.source == source).collect()
    }

    // ── Human-in-the-loop operations ─────────────────────────────────

    pub fn add_pending_interaction(
        &mut self,
        interaction_type: InteractionType,
        prompt: impl Into<String>,
        options: Option<Vec<String>>,
        form_schema: Option<serde_json::Value>,
        timeout_secs: f64,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.pending_interactions.push(PendingInteraction {
            id: id.clone(),
            interaction_type,
            prompt: prompt.into(),
            options,
            form_schema,
            timeout_secs,
            created_at: Utc::now(),
            response: None,
            resolved_at: None,
        });
        id
    }

    pub fn resolve_interaction(&mut self, interaction_id: &str, response: serde_json::Value) -> bool {
        if let Some(i) = self.pending_interactions.iter_mut().find(|i| i.id == interaction_id) {
            i.response = Some(response);
            i.resolved_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    pub fn has_pending_interactions(&self) -> bool {
        self.pending_interactions.iter().any(|i| !i.is_resolved())
    }

    // ── Message history ───────────────────────────────────────────────

    pub fn add_message(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.message_history.push((role.into(), content.into()));
    }

    // ── Context generation for LLM prompts ────────────────────────────

    /// Render a budget-truncated summary of current state for inclusion
    /// in a sub-agent's prompt: variables, last 10 findings, last 5 tool
    /// results (compact form). Hard-truncates at `max_tokens * 4` chars.
    pub fn context_for_llm(&self, max_tokens: usize) -> String {
        let max_chars = max_tokens * CHARS_PER_TOKEN;
        let mut parts = Vec::new();

        if !self.variables.is_empty() {
            let mut section = vec!["## Current Variables".to_string()];
            for (key, entry) in &self.variables {
                let line = format!("- {key}: {}", entry.value);
                section.push(truncate_chars(&line, 200));
            }
            parts.push(section.join("\n"));
        }

        if !self.findings.is_empty() {
            let mut section = vec!["## Findings".to_string()];
            for finding in self.findings.iter().rev().take(10).collect::<Vec<_>>().into_iter().rev() {
                let line = format!("- [{}] {}", finding.source, finding.content);
                section.push(truncate_chars(&line, 300));
            }
            parts.push(section.join("\n"));
        }

        if !self.tool_results.is_empty() {
            let mut section = vec!["## Recent Tool Results".to_string()];
            for result in self.tool_results.iter().rev().take(5).collect::<Vec<_>>().into_iter().rev() {
                let mut line = format!("- {}: ", result.tool_name);
                if result.success {
                    line.push_str(&truncate_chars(&result.output.to_string(), 500));
                } else {
                    line.push_str("ERROR: ");
                    line.push_str(result.error.as_deref().unwrap_or("unknown error"));
                }
                section.push(line);
            }
            parts.push(section.join("\n"));
        }

        let context = parts.join("\n\n");
        if context.chars().count() > max_chars {
            let truncated: String = context.chars().take(max_chars).collect();
            format!("{truncated}\n\n[Context truncated]")
        } else {
            context
        }
    }

    pub fn to_summary(&self) -> BlackboardSummary {
        BlackboardSummary {
            query: self.query.clone(),
            has_plan: self.plan.is_some(),
            plan_progress_percent: self
                .plan
                .as_ref()
                .map(|p| {
                    if p.steps.is_empty() {
                        0
                    } else {
                        (p.completed_steps().len() * 100 / p.steps.len()) as u8
                    }
                })
                .unwrap_or(0),
            variables_count: self.variables.len(),
            tool_results_count: self.tool_results.len(),
            findings_count: self.findings.len(),
            pending_interactions: self
                .pending_interactions
                .iter()
                .filter(|i| !i.is_resolved())
                .count(),
        }
    }
}

/// Read-only handle onto a blackboard.
pub struct BlackboardView<'a>(&'a Blackboard);

impl<'a> BlackboardView<'a> {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn context_for_llm(&self, max_tokens: usize) -> String {
        self.0.context_for_llm(max_tokens)
    }

    pub fn findings(&self) -> &[Finding] {
        &self.0.findings
    }

    pub fn plan(&self) -> Option<&ExecutionPlan> {
        self.0.plan.as_ref()
    }
}

/// Mutation handle onto a blackboard, scoped to the sub-agent the
/// orchestrator is currently dispatching. Also exposes the read-only
/// accessors sub-agents need to build their prompts, since the
/// orchestrator hands out exactly one of these per step dispatch rather
/// than a separate read + write pair.
pub struct BlackboardWriter<'a>(&'a mut Blackboard);

impl<'a> BlackboardWriter<'a> {
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value, source: impl Into<String>) {
        self.0.set(key, value, source);
    }

    pub fn add_finding(
        &mut self,
        source: impl Into<String>,
        content: impl Into<String>,
        evidence: Option<String>,
        confidence: f64,
    ) {
        self.0.add_finding(source, content, evidence, confidence);
    }

    pub fn add_tool_result(&mut self, result: ToolResult) {
        self.0.add_tool_result(result);
    }

    pub fn add_pending_interaction(
        &mut self,
        interaction_type: InteractionType,
        prompt: impl Into<String>,
        options: Option<Vec<String>>,
        form_schema: Option<serde_json::Value>,
        timeout_secs: f64,
    ) -> String {
        self.0.add_pending_interaction(interaction_type, prompt, options, form_schema, timeout_secs)
    }

    pub fn add_message(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.0.add_message(role, content);
    }

    pub fn resolve_interaction(&mut self, interaction_id: &str, response: serde_json::Value) -> bool {
        self.0.resolve_interaction(interaction_id, response)
    }

    // ── Read-through accessors ──────────────────────────────────────

    pub fn query(&self) -> &str {
        &self.0.query
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn all_variables(&self) -> std::collections::HashMap<String, serde_json::Value> {
        self.0.all_variables()
    }

    pub fn plan(&self) -> Option<&ExecutionPlan> {
        self.0.plan.as_ref()
    }

    pub fn findings(&self) -> &[Finding] {
        &self.0.findings
    }

    pub fn findings_by_source(&self, source: &str) -> Vec<&Finding> {
        self.0.findings_by_source(source)
    }

    pub fn tool_results(&self) -> &[ToolResult] {
        &self.0.tool_results
    }

    pub fn context_for_llm(&self, max_tokens: usize) -> String {
        self.0.context_for_llm(max_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::{RiskTier, User};

    fn ctx() -> RequestContext {
        RequestContext::new(
            User { id: "u1".into(), username: "alice".into(), email: None, permissions: Default::default(), bearer_token: None },
            "sess-1",
            "req-1",
        )
    }

    #[test]
    fn set_and_get_roundtrip() {
        let mut bb = Blackboard::create(ctx(), "find my invoice");
        bb.set("invoice_id", serde_json::json!("INV-42"), "researcher");
        assert_eq!(bb.get("invoice_id").unwrap(), &serde_json::json!("INV-42"));
        assert!(bb.has("invoice_id"));
        assert!(!bb.has("missing"));
    }

    #[test]
    fn overwriting_a_key_preserves_history() {
        let mut bb = Blackboard::create(ctx(), "q");
        bb.set("x", serde_json::json!(1), "planner");
        bb.set("x", serde_json::json!(2), "analyzer");
        assert_eq!(bb.get("x").unwrap(), &serde_json::json!(2));
        assert_eq!(bb.variable_history(Some("x")).len(), 2);
        assert_eq!(bb.variable_history(None).len(), 2);
    }

    #[test]
    fn pending_interaction_lifecycle() {
        let mut bb = Blackboard::create(ctx(), "transfer $50000");
        let id = bb.add_pending_interaction(
            InteractionType::Confirm,
            "Confirm transfer of $50000?",
            None,
            None,
            300.0,
        );
        assert!(bb.has_pending_interactions());
        assert!(bb.resolve_interaction(&id, serde_json::json!(true)));
        assert!(!bb.has_pending_interactions());
        assert!(!bb.resolve_interaction("nonexistent", serde_json::json!(true)));
    }

    #[test]
    fn context_for_llm_includes_sections() {
        let mut bb = Blackboard::create(ctx(), "q");
        bb.set("k", serde_json::json!("v"), "planner");
        bb.add_finding("researcher", "found something", None, 0.9);
        let context = bb.context_for_llm(8000);
        assert!(context.contains("## Current Variables"));
        assert!(context.contains("## Findings"));
    }

    #[test]
    fn context_for_llm_truncates_to_budget() {
        let mut bb = Blackboard::create(ctx(), "q");
        for i in 0..50 {
            bb.add_finding("researcher", &"x".repeat(100), None, 1.0);
            let _ = i;
        }
        let context = bb.context_for_llm(10);
        assert!(context.len() <= 10 * 4 + "\n\n[Context truncated]".len());
        assert!(context.ends_with("[Context truncated]"));
    }

    #[test]
    fn context_for_llm_does_not_panic_on_multibyte_utf8_at_truncation_boundary() {
        let mut bb = Blackboard::create(ctx(), "q");
        // "Database" in Cyrillic, repeated past the 300-char finding-line
        // truncation point so the cut lands inside a multi-byte sequence
        // under a naive byte-offset truncate.
        bb.add_finding("researcher", &"база данных ".repeat(40), None, 1.0);
        let context = bb.context_for_llm(8000);
        assert!(context.contains("база данных"));
    }

    #[test]
    fn findings_by_source_filters() {
        let mut bb = Blackboard::create(ctx(), "q");
        bb.add_finding("researcher", "a", None, 1.0);
        bb.add_finding("analyzer", "b", None, 1.0);
        assert_eq!(bb.findings_by_source("researcher").len(), 1);
    }

    #[test]
    fn writer_scopes_mutation() {
        let mut bb = Blackboard::create(ctx(), "q");
        {
            let mut w = bb.writer();
            w.set("k", serde_json::json!(1), "executor");
        }
        assert_eq!(bb.get("k").unwrap(), &serde_json::json!(1));
    }

    #[test]
    fn risk_tier_orders_destructive_highest() {
        assert!(RiskTier::Destructive > RiskTier::Write);
        assert!(RiskTier::Write > RiskTier::Read);
    }
}
