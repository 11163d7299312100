use serde::{Deserialize, Serialize};

/// The role a sub-agent plays when dispatched a plan step.
///
/// A tagged variant plus a registration map (see `orc-agents::registry`)
/// stands in for the inheritance hierarchy a planner-style system might
/// otherwise use — there is one concrete type per role, selected by
/// matching on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAgentKind {
    Planner,
    Researcher,
    Analyzer,
    Executor,
    Synthesizer,
}

impl SubAgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubAgentKind::Planner => "planner",
            SubAgentKind::Researcher => "researcher",
            SubAgentKind::Analyzer => "analyzer",
            SubAgentKind::Executor => "executor",
            SubAgentKind::Synthesizer => "synthesizer",
        }
    }
}

impl std::fmt::Display for SubAgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a single plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// One unit of work in an execution plan: dispatch a named task to a
/// sub-agent, honoring dependencies on earlier steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub agent: SubAgentKind,
    pub description: String,
    /// IDs of steps that must be `Completed` before this one may run.
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub status: StepStatus,
    /// Free-form result payload once the step completes.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Default for StepStatus {
    fn default() -> Self {
        StepStatus::Pending
    }
}

impl PlanStep {
    pub fn new(id: impl Into<String>, agent: SubAgentKind, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent,
            description: description.into(),
            depends_on: Vec::new(),
            status: StepStatus::Pending,
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

/// A plan produced by the Planner sub-agent and driven to completion by
/// the orchestrator. Steps form a DAG via `depends_on`; the orchestrator
/// dispatches any step whose dependencies are all `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionPlan {
    pub steps: Vec<PlanStep>,
    /// Number of times this plan has been revised by a replan.
    #[serde(default)]
    pub replan_count: u32,
}

impl ExecutionPlan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self {
            steps,
            replan_count: 0,
        }
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut PlanStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    /// Steps whose dependencies are all completed and which are still pending.
    pub fn ready_steps(&self) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Pending)
            .filter(|s| {
                s.depends_on.iter().all(|dep| {
                    self.step(dep)
                        .map(|d| d.status == StepStatus::Completed)
                        .unwrap_or(false)
                })
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.is_terminal())
    }

    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    pub fn completed_steps(&self) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .collect()
    }

    pub fn failed_steps(&self) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_steps_respects_dependencies() {
        let mut plan = ExecutionPlan::new(vec![
            PlanStep::new("a", SubAgentKind::Researcher, "gather"),
            {
                let mut s = PlanStep::new("b", SubAgentKind::Analyzer, "analyze");
                s.depends_on = vec!["a".into()];
                s
            },
        ]);
        assert_eq!(plan.ready_steps().iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), vec!["a"]);
        plan.step_mut("a").unwrap().status = StepStatus::Completed;
        assert_eq!(plan.ready_steps().iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn is_complete_requires_all_terminal() {
        let mut plan = ExecutionPlan::new(vec![PlanStep::new("a", SubAgentKind::Planner, "x")]);
        assert!(!plan.is_complete());
        plan.step_mut("a").unwrap().status = StepStatus::Failed;
        assert!(plan.is_complete());
        assert!(plan.has_failures());
    }
}
