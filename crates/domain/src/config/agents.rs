use crate::plan::SubAgentKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sub-agent definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-role sampling defaults. Each sub-agent role gets its own
/// temperature/token budget; callers can override per step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubAgentConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Role -> config map, keyed by `SubAgentKind::as_str()` (matches the
/// `[llm.roles]` string-keyed convention). `Default` seeds the values
/// the reference sub-agents were tuned with: planners and synthesizers
/// run warmer (more creative decomposition / prose), executors run
/// near-deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default)]
    pub roles: HashMap<String, SubAgentConfig>,
    /// Tool allow/deny policy shared by all sub-agents unless overridden.
    #[serde(default)]
    pub tool_policy: ToolPolicy,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        let mut roles = HashMap::new();
        roles.insert("planner".into(), SubAgentConfig { temperature: 0.3, max_tokens: 2048 });
        roles.insert("researcher".into(), SubAgentConfig { temperature: 0.5, max_tokens: 1536 });
        roles.insert("analyzer".into(), SubAgentConfig { temperature: 0.4, max_tokens: 1536 });
        roles.insert("executor".into(), SubAgentConfig { temperature: 0.2, max_tokens: 2048 });
        roles.insert("synthesizer".into(), SubAgentConfig { temperature: 0.7, max_tokens: 2048 });
        Self { roles, tool_policy: ToolPolicy::default() }
    }
}

impl AgentsConfig {
    pub fn for_role(&self, kind: SubAgentKind) -> SubAgentConfig {
        self.roles
            .get(kind.as_str())
            .copied()
            .unwrap_or(SubAgentConfig { temperature: 0.5, max_tokens: 1536 })
    }
}

/// Tool allow/deny policy — prefix-based matching.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolPolicy {
    /// Tool name prefixes this agent may use.  `["*"]` or empty = unrestricted.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Tool name prefixes this agent is denied (evaluated before allow).
    #[serde(default)]
    pub deny: Vec<String>,
}

impl ToolPolicy {
    /// Check whether the given tool name is permitted by this policy.
    ///
    /// Matching is **case-insensitive** — tool names are normalized to
    /// lowercase before comparison.  Deny always wins over allow.
    pub fn allows(&self, tool_name: &str) -> bool {
        let name = tool_name.to_ascii_lowercase();

        // Deny takes precedence.
        for d in &self.deny {
            let d_lower = d.to_ascii_lowercase();
            if d_lower == "*" || name == d_lower || name.starts_with(&format!("{d_lower}.")) {
                return false;
            }
        }
        // Empty allow or ["*"] means unrestricted (after deny check).
        if self.allow.is_empty() || self.allow.iter().any(|a| a == "*") {
            return true;
        }
        // Otherwise must match at least one allow entry.
        for a in &self.allow {
            let a_lower = a.to_ascii_lowercase();
            if name == a_lower || name.starts_with(&format!("{a_lower}.")) {
                return true;
            }
        }
        false
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_policy_empty_allows_all() {
        let policy = ToolPolicy::default();
        assert!(policy.allows("exec"));
        assert!(policy.allows("knowledge.search"));
        assert!(policy.allows("agent.run"));
    }

    #[test]
    fn tool_policy_allow_restricts() {
        let policy = ToolPolicy {
            allow: vec!["exec".into(), "knowledge".into()],
            deny: vec![],
        };
        assert!(policy.allows("exec"));
        assert!(policy.allows("knowledge.search"));
        assert!(!policy.allows("agent.run"));
    }

    #[test]
    fn tool_policy_deny_takes_precedence() {
        let policy = ToolPolicy {
            allow: vec!["*".into()],
            deny: vec!["exec".into()],
        };
        assert!(!policy.allows("exec"));
        assert!(policy.allows("knowledge.search"));
    }

    #[test]
    fn tool_policy_deny_prefix_blocks_subtree() {
        let policy = ToolPolicy {
            allow: vec![],
            deny: vec!["finance".into()],
        };
        assert!(policy.allows("exec"));
        assert!(!policy.allows("finance.transfer"));
    }

    #[test]
    fn tool_policy_case_insensitive() {
        let policy = ToolPolicy {
            allow: vec!["Exec".into()],
            deny: vec![],
        };
        assert!(policy.allows("exec"));
        assert!(policy.allows("EXEC"));
    }

    #[test]
    fn default_role_config_matches_reference_tuning() {
        let cfg = AgentsConfig::default();
        assert!((cfg.for_role(SubAgentKind::Planner).temperature - 0.3).abs() < 1e-6);
        assert_eq!(cfg.for_role(SubAgentKind::Planner).max_tokens, 2048);
        assert!((cfg.for_role(SubAgentKind::Executor).temperature - 0.2).abs() < 1e-6);
        assert!((cfg.for_role(SubAgentKind::Synthesizer).temperature - 0.7).abs() < 1e-6);
    }

    #[test]
    fn unknown_role_falls_back_to_sane_default() {
        let cfg = AgentsConfig { roles: HashMap::new(), tool_policy: ToolPolicy::default() };
        let fallback = cfg.for_role(SubAgentKind::Researcher);
        assert!((fallback.temperature - 0.5).abs() < 1e-6);
    }
}
