use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator / agent loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Max number of replans before the request fails.
    #[serde(default = "d_replan_budget")]
    pub replan_budget: u32,
    /// Max plan steps dispatched concurrently.
    #[serde(default = "d_parallelism")]
    pub max_step_parallelism: usize,
    /// Wall-clock budget per sub-agent step.
    #[serde(default = "d_step_timeout_ms")]
    pub step_timeout_ms: u64,
    /// Wall-clock budget for the whole request, end to end.
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Max chars per outbound `markdown` frame when streaming the
    /// synthesizer's answer, so one large reply doesn't block the
    /// connection on a single frame.
    #[serde(default = "d_markdown_chunk_chars")]
    pub markdown_chunk_chars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            replan_budget: d_replan_budget(),
            max_step_parallelism: d_parallelism(),
            step_timeout_ms: d_step_timeout_ms(),
            request_timeout_ms: d_request_timeout_ms(),
            markdown_chunk_chars: d_markdown_chunk_chars(),
        }
    }
}

fn d_replan_budget() -> u32 {
    2
}
fn d_parallelism() -> usize {
    4
}
fn d_step_timeout_ms() -> u64 {
    60_000
}
fn d_request_timeout_ms() -> u64 {
    300_000
}
fn d_markdown_chunk_chars() -> usize {
    800
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Human-in-the-loop gating
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Default gating policy: a tool call requires human confirmation when
/// its name/description matches a destructive keyword, or when an
/// `amount`-shaped numeric argument exceeds the threshold.
///
/// Ported from the reference executor's `_requires_hil` check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HilConfig {
    #[serde(default = "d_keywords")]
    pub destructive_keywords: Vec<String>,
    #[serde(default = "d_amount_threshold")]
    pub amount_threshold: f64,
    #[serde(default = "d_amount_fields")]
    pub amount_fields: Vec<String>,
    /// How long a suspended interaction remains resumable before it expires.
    #[serde(default = "d_interaction_ttl_secs")]
    pub interaction_ttl_secs: u64,
}

impl Default for HilConfig {
    fn default() -> Self {
        Self {
            destructive_keywords: d_keywords(),
            amount_threshold: d_amount_threshold(),
            amount_fields: d_amount_fields(),
            interaction_ttl_secs: d_interaction_ttl_secs(),
        }
    }
}

fn d_keywords() -> Vec<String> {
    vec![
        "delete".into(),
        "remove".into(),
        "drop".into(),
        "terminate".into(),
        "cancel".into(),
        "transfer".into(),
        "withdraw".into(),
        "purge".into(),
        "revoke".into(),
    ]
}
fn d_amount_threshold() -> f64 {
    10_000.0
}
fn d_amount_fields() -> Vec<String> {
    vec!["amount".into()]
}
fn d_interaction_ttl_secs() -> u64 {
    86_400
}
