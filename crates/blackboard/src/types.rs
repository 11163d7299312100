use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single variable stored on the blackboard, immutable once recorded.
/// Overwriting a key appends a new entry to the history rather than
/// mutating the old one, so the full derivation chain survives a replan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableEntry {
    pub key: String,
    pub value: serde_json::Value,
    /// Which component set this value (e.g. "planner", "researcher").
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// A finding/insight recorded by a sub-agent during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub source: String,
    pub content: String,
    #[serde(default)]
    pub evidence: Option<String>,
    #[serde(default = "d_confidence")]
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

fn d_confidence() -> f64 {
    1.0
}

/// The kind of human confirmation a pending interaction is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    Confirm,
    Input,
    Form,
}

/// A human-in-the-loop prompt raised by a tool execution or sub-agent,
/// parked on the blackboard until resolved (or it expires).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInteraction {
    pub id: String,
    pub interaction_type: InteractionType,
    pub prompt: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub form_schema: Option<serde_json::Value>,
    pub timeout_secs: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PendingInteraction {
    pub fn is_resolved(&self) -> bool {
        self.response.is_some()
    }
}

/// A flat, loggable snapshot of blackboard state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackboardSummary {
    pub query: String,
    pub has_plan: bool,
    pub plan_progress_percent: u8,
    pub variables_count: usize,
    pub tool_results_count: usize,
    pub findings_count: usize,
    pub pending_interactions: usize,
}
