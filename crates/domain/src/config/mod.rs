mod agents;
mod knowledge;
mod llm;
mod observability;
mod orchestrator;
mod server;
mod sessions;
mod tools;

pub use agents::*;
pub use knowledge::*;
pub use llm::*;
pub use observability::*;
pub use orchestrator::*;
pub use server::*;
pub use sessions::*;
pub use tools::*;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub hil: HilConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Environment variable holding the admin bearer token.
    /// If the env var is unset, admin endpoints are **disabled** (403).
    #[serde(default = "d_admin_token_env")]
    pub token_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token_env: d_admin_token_env(),
        }
    }
}

fn d_admin_token_env() -> String {
    "ORC_ADMIN_TOKEN".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Warning,
    Error,
}

/// A single config validation finding, surfaced by `config validate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigIssue {
    pub severity: IssueSeverity,
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}: {}", self.severity, self.path, self.message)
    }
}

impl Config {
    /// Validate cross-field invariants that `serde`'s defaulting can't
    /// catch on its own (e.g. an RRF weight outside `[0, 1]`).
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.llm.providers.is_empty() {
            issues.push(ConfigIssue {
                severity: IssueSeverity::Warning,
                path: "llm.providers".into(),
                message: "no LLM providers configured; LLM-backed routes will fail".into(),
            });
        }

        let w = self.knowledge.rrf_weight_bm25 + self.knowledge.rrf_weight_vector;
        if (w - 1.0).abs() > 0.05 {
            issues.push(ConfigIssue {
                severity: IssueSeverity::Warning,
                path: "knowledge.rrf_weight_bm25 + rrf_weight_vector".into(),
                message: format!("RRF weights sum to {w:.2}, expected close to 1.0"),
            });
        }

        if self.orchestrator.max_step_parallelism == 0 {
            issues.push(ConfigIssue {
                severity: IssueSeverity::Error,
                path: "orchestrator.max_step_parallelism".into(),
                message: "must be at least 1".into(),
            });
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_warns_on_missing_providers() {
        let cfg = Config::default();
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.path == "llm.providers"));
    }

    #[test]
    fn zero_parallelism_is_an_error() {
        let mut cfg = Config::default();
        cfg.orchestrator.max_step_parallelism = 0;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error && i.path == "orchestrator.max_step_parallelism"));
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = Config::default();
        let s = toml::to_string(&cfg).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back.server.port, cfg.server.port);
    }
}
