//! Wires a [`Config`] into a fully-built [`AppState`] — provider registry,
//! knowledge retriever, tool registry, sub-agent roster and orchestrator.
//!
//! `--mock` swaps the network-backed LLM registry and the disk-backed
//! session store for their in-memory test doubles so `serve --mock` boots
//! without any provider credentials or writable state directory, the same
//! role the reference gateway's dev harness plays.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;

use orc_domain::config::{Config, IssueSeverity};
use orc_domain::SubAgentKind;
use orc_knowledge::{InMemoryKnowledgeRetriever, KnowledgeRetriever, MockEmbedder};
use orc_orchestrator::{Orchestrator, Roster, SystemPrompts};
use orc_providers::mock::MockLlmProvider;
use orc_providers::{LlmProvider, LlmRouter, ProviderRegistry};
use orc_sessions::{ConversationStore, MockSessionStore, SessionRepository};
use orc_tools::{builtin_tools, ProcessManager, ToolRegistry};
use tokio::sync::Semaphore;

use crate::state::AppState;

/// Validate config, initialize every subsystem, return a fully-wired
/// [`AppState`]. Shared by `serve` and `run`.
pub async fn build_app_state(config: Arc<Config>, mock: bool) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            IssueSeverity::Warning => tracing::warn!("config: {issue}"),
            IssueSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == IssueSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == IssueSeverity::Error).count()
        );
    }

    let router = Arc::new(build_router(&config, mock)?);

    let retriever: Option<Arc<dyn KnowledgeRetriever>> = Some(Arc::new(
        InMemoryKnowledgeRetriever::new(&config.knowledge, Box::new(MockEmbedder { dims: 8 })),
    ));

    let process_manager = Arc::new(ProcessManager::new(config.tools.exec.clone()));
    let workspace_root = std::path::PathBuf::from(&config.tools.workspace_root);
    let tool_registry = Arc::new(
        ToolRegistry::build(builtin_tools(process_manager, workspace_root)).context("building tool registry")?,
    );
    tracing::info!(tools = tool_registry.len(), "tool registry ready");

    let hil = Arc::new(config.hil.clone());
    let roster = Roster::new(router, retriever, tool_registry, hil, &config.agents);

    let sessions: Arc<dyn SessionRepository> = if mock {
        Arc::new(MockSessionStore::new(config.sessions.max_messages_per_session))
    } else {
        let state_path = std::path::PathBuf::from(&config.tools.workspace_root).join("state");
        Arc::new(
            ConversationStore::new(&state_path, config.sessions.max_messages_per_session)
                .context("initializing conversation store")?,
        )
    };
    tracing::info!(mock, "session store ready");

    let orchestrator = Arc::new(Orchestrator::new(
        roster,
        sessions.clone(),
        config.orchestrator.clone(),
        SystemPrompts::default(),
    ));

    let connection_semaphore = Arc::new(Semaphore::new(config.server.transport.max_connections));

    let api_token = config
        .server
        .api_token
        .clone()
        .or_else(|| std::env::var(&config.server.api_token_env).ok())
        .map(|t| t.into());
    if api_token.is_none() {
        tracing::warn!("no API token configured — chat connections will not require auth");
    }

    Ok(AppState { config, orchestrator, sessions, connection_semaphore, api_token })
}

fn build_router(config: &Config, mock: bool) -> anyhow::Result<LlmRouter> {
    if mock {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        for kind in [
            SubAgentKind::Planner,
            SubAgentKind::Researcher,
            SubAgentKind::Analyzer,
            SubAgentKind::Executor,
            SubAgentKind::Synthesizer,
        ] {
            let id = format!("mock-{}", kind.as_str());
            providers.insert(id.clone(), Arc::new(MockLlmProvider::always_ok(&id, mock_reply(kind))));
        }
        let mut roles = config.llm.roles.clone();
        for kind in [
            SubAgentKind::Planner,
            SubAgentKind::Researcher,
            SubAgentKind::Analyzer,
            SubAgentKind::Executor,
            SubAgentKind::Synthesizer,
        ] {
            roles.entry(kind.as_str().to_string()).or_insert_with(|| orc_domain::config::RoleConfig {
                model: format!("mock-{}/mock-1", kind.as_str()),
                require_tools: false,
                require_json: false,
                require_streaming: false,
                fallbacks: vec![],
            });
        }
        let registry = ProviderRegistry::from_providers(providers, HashMap::new());
        Ok(LlmRouter::new(registry, roles, config.llm.default_timeout_ms))
    } else {
        LlmRouter::from_config(&config.llm).context("initializing LLM providers")
    }
}

fn mock_reply(kind: SubAgentKind) -> &'static str {
    match kind {
        SubAgentKind::Planner => {
            r#"{"goal": "answer the request", "steps": [{"id": "step_1", "description": "gather relevant information", "sub_agent": "researcher", "depends_on": []}, {"id": "step_2", "description": "write the final answer", "sub_agent": "synthesizer", "depends_on": ["step_1"]}]}"#
        }
        SubAgentKind::Researcher => "No external sources were consulted in mock mode.",
        SubAgentKind::Analyzer => "No additional analysis was required.",
        SubAgentKind::Executor => "no tools needed",
        SubAgentKind::Synthesizer => "# Mock response\n\nThis is a mock reply — no real model was called.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_app_state_in_mock_mode_needs_no_credentials_or_disk() {
        let config = Arc::new(Config::default());
        let state = build_app_state(config, true).await.expect("mock app state should build");
        assert!(state.api_token.is_none());
        assert_eq!(
            state.connection_semaphore.available_permits(),
            state.config.server.transport.max_connections
        );
    }

    #[test]
    fn build_router_in_mock_mode_covers_every_sub_agent_role() {
        let config = Config::default();
        let router = build_router(&config, true).expect("mock router should build");
        for kind in [
            SubAgentKind::Planner,
            SubAgentKind::Researcher,
            SubAgentKind::Analyzer,
            SubAgentKind::Executor,
            SubAgentKind::Synthesizer,
        ] {
            let id = format!("mock-{}", kind.as_str());
            assert!(router.registry().get(&id).is_some(), "missing mock provider for {kind:?}");
        }
    }
}
