use std::sync::Arc;

use orc_agents::{AnalyzerSubAgent, ExecutorSubAgent, PlannerSubAgent, ResearcherSubAgent, SubAgent, SynthesizerSubAgent};
use orc_domain::config::{AgentsConfig, HilConfig};
use orc_domain::SubAgentKind;
use orc_knowledge::KnowledgeRetriever;
use orc_providers::LlmRouter;
use orc_tools::ToolRegistry;

/// Owns one instance of each sub-agent role, built once per orchestrator
/// and shared across every request it handles.
pub struct Roster {
    pub planner: PlannerSubAgent,
    pub researcher: ResearcherSubAgent,
    pub analyzer: AnalyzerSubAgent,
    pub executor: ExecutorSubAgent,
    pub synthesizer: SynthesizerSubAgent,
}

impl Roster {
    pub fn new(
        router: Arc<LlmRouter>,
        retriever: Option<Arc<dyn KnowledgeRetriever>>,
        registry: Arc<ToolRegistry>,
        hil: Arc<HilConfig>,
        agents_config: &AgentsConfig,
    ) -> Self {
        Self {
            planner: PlannerSubAgent::new(router.clone(), retriever.clone(), agents_config.for_role(SubAgentKind::Planner)),
            researcher: ResearcherSubAgent::new(router.clone(), retriever, agents_config.for_role(SubAgentKind::Researcher)),
            analyzer: AnalyzerSubAgent::new(router.clone(), agents_config.for_role(SubAgentKind::Analyzer)),
            executor: ExecutorSubAgent::new(router.clone(), registry, hil, agents_config.for_role(SubAgentKind::Executor)),
            synthesizer: SynthesizerSubAgent::new(router, agents_config.for_role(SubAgentKind::Synthesizer)),
        }
    }

    pub fn for_kind(&self, kind: SubAgentKind) -> &dyn SubAgent {
        match kind {
            SubAgentKind::Planner => &self.planner,
            SubAgentKind::Researcher => &self.researcher,
            SubAgentKind::Analyzer => &self.analyzer,
            SubAgentKind::Executor => &self.executor,
            SubAgentKind::Synthesizer => &self.synthesizer,
        }
    }
}
