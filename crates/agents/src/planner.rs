use crate::json_extract::extract_object;
use crate::{SubAgent, SubAgentResult};
use orc_blackboard::BlackboardWriter;
use orc_domain::config::SubAgentConfig;
use orc_domain::{ExecutionPlan, PlanStep, RequestContext, Result, StepStatus, SubAgentKind};
use orc_knowledge::{KnowledgeRetriever, NodeType, SearchQuery};
use orc_providers::{ChatRequest, LlmRouter};
use std::sync::Arc;

/// Decomposes a user query into an `ExecutionPlan` and revises it when a
/// wave of steps fails. The "goal" concept from the reference
/// implementation's `ExecutionPlan.goal` lives on the blackboard
/// (`blackboard.set("goal", ..)`) rather than on `ExecutionPlan` itself,
/// since steps are shared state the orchestrator persists independently
/// of any one request's framing of its own goal.
pub struct PlannerSubAgent {
    router: Arc<LlmRouter>,
    retriever: Option<Arc<dyn KnowledgeRetriever>>,
    config: SubAgentConfig,
}

impl PlannerSubAgent {
    pub fn new(
        router: Arc<LlmRouter>,
        retriever: Option<Arc<dyn KnowledgeRetriever>>,
        config: SubAgentConfig,
    ) -> Self {
        Self { router, retriever, config }
    }

    pub async fn create_plan(
        &self,
        ctx: &RequestContext,
        query: &str,
        system_prompt: &str,
        blackboard_context: &str,
    ) -> Result<ExecutionPlan> {
        let knowledge_context = self.knowledge_context(ctx, query).await;
        let prompt = build_planning_prompt(query, &knowledge_context, blackboard_context, None);
        let content = self.call(system_prompt, &prompt).await?;
        Ok(parse_plan(&content))
    }

    pub async fn replan(
        &self,
        ctx: &RequestContext,
        current: &mut ExecutionPlan,
        reason: &str,
        system_prompt: &str,
        query: &str,
        blackboard_context: &str,
    ) -> Result<()> {
        let knowledge_context = self.knowledge_context(ctx, query).await;

        let completed = render_steps(current.completed_steps(), "COMPLETED", |s| {
            s.result.as_ref().map(|v| v.to_string()).unwrap_or_default()
        });
        let failed = render_steps(current.failed_steps(), "FAILED", |s| {
            s.error.clone().unwrap_or_default()
        });

        let prompt = format!(
            "You need to revise the execution plan.\n\n\
            Original Query: {query}\n\n\
            Reason for Replanning: {reason}\n\n\
            Completed Steps:\n{completed}\n\n\
            Failed Steps:\n{failed}\n\n\
            {knowledge_section}\
            Current Context:\n{blackboard_context}\n\n\
            Create a revised plan with the remaining steps needed to complete the goal. \
            Keep completed step results and build on them.\n\n\
            Output as JSON:\n\
            {{\n  \"goal\": \"Updated goal if needed\",\n  \"steps\": [\n    {{\n      \"id\": \"step_N\",\n      \
            \"description\": \"Brief description\",\n      \"sub_agent\": \"researcher|analyzer|executor|synthesizer\",\n      \
            \"instruction\": \"Detailed instructions\",\n      \"depends_on\": []\n    }}\n  ]\n}}",
            knowledge_section = if knowledge_context.is_empty() {
                String::new()
            } else {
                format!("Relevant Knowledge:\n{knowledge_context}\n\n")
            },
        );

        let content = self.call(system_prompt, &prompt).await?;
        let new_plan = parse_plan(&content);
        replan_in_place(current, new_plan.steps);
        Ok(())
    }

    async fn knowledge_context(&self, ctx: &RequestContext, query: &str) -> String {
        let Some(retriever) = &self.retriever else {
            return String::new();
        };
        let mut q = SearchQuery::new(ctx.user.id.clone(), query, 8);
        q.node_types = Some(vec![NodeType::Schema, NodeType::Playbook]);
        match retriever.bundle(&q).await {
            Ok(bundle) => bundle.for_prompt(4000),
            Err(e) => {
                tracing::warn!(error = %e, "failed to retrieve knowledge for planning");
                String::new()
            }
        }
    }

    async fn call(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let req = ChatRequest {
            messages: vec![
                orc_domain::Message::system(system_prompt),
                orc_domain::Message::user(user_prompt),
            ],
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            json_mode: true,
            ..Default::default()
        };
        let resp = self.router.chat_for_role(SubAgentKind::Planner, req).await?;
        Ok(resp.content)
    }
}

#[async_trait::async_trait]
impl SubAgent for PlannerSubAgent {
    fn kind(&self) -> SubAgentKind {
        SubAgentKind::Planner
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        blackboard: &mut BlackboardWriter<'_>,
        _step: &PlanStep,
        system_prompt: &str,
    ) -> Result<SubAgentResult> {
        let query = blackboard.query().to_string();
        let blackboard_context = blackboard.context_for_llm(4000);
        let replan_reason = blackboard.get("_replan_reason").and_then(|v| v.as_str()).map(str::to_string);

        let knowledge_context = self.knowledge_context(ctx, &query).await;
        let prompt = build_planning_prompt(&query, &knowledge_context, &blackboard_context, replan_reason.as_deref());

        let content = match self.call(system_prompt, &prompt).await {
            Ok(c) => c,
            Err(e) => return Ok(SubAgentResult::failure(e.to_string())),
        };

        let plan = parse_plan(&content);
        let tokens = estimate_tokens(&content);
        Ok(SubAgentResult::success(serde_json::to_value(&plan).unwrap_or_default(), tokens))
    }
}

fn build_planning_prompt(
    query: &str,
    knowledge_context: &str,
    blackboard_context: &str,
    replan_reason: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Decompose the following request into an execution plan.\n\nQuery: {query}\n\n"
    );
    if !knowledge_context.is_empty() {
        prompt.push_str(&format!("Relevant Knowledge:\n{knowledge_context}\n\n"));
    }
    if !blackboard_context.is_empty() {
        prompt.push_str(&format!("Current Context:\n{blackboard_context}\n\n"));
    }
    if let Some(reason) = replan_reason {
        if !reason.is_empty() {
            prompt.push_str(&format!("Note — this is a replan. Reason: {reason}\n\n"));
        }
    }
    prompt.push_str(
        "Output as JSON:\n{\n  \"goal\": \"What the plan accomplishes\",\n  \"steps\": [\n    {\n      \
        \"id\": \"step_1\",\n      \"description\": \"Brief description\",\n      \
        \"sub_agent\": \"researcher|analyzer|executor|synthesizer\",\n      \
        \"instruction\": \"Detailed instructions\",\n      \"depends_on\": []\n    }\n  ]\n}",
    );
    prompt
}

fn render_steps<'a>(steps: Vec<&'a PlanStep>, label: &str, detail: impl Fn(&PlanStep) -> String) -> String {
    if steps.is_empty() {
        return "None".to_string();
    }
    steps
        .iter()
        .map(|s| format!("- {}: {} [{label}] -> {}", s.id, s.description, detail(s)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Find the first `{`/last `}`, parse as JSON, fall back to a fixed
/// two-step plan (research then synthesize) on any parse failure.
fn parse_plan(content: &str) -> ExecutionPlan {
    match extract_object(content) {
        Some(data) => plan_from_json(&data),
        None => fallback_plan(),
    }
}

fn plan_from_json(data: &serde_json::Value) -> ExecutionPlan {
    let raw_steps = data.get("steps").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    if raw_steps.is_empty() {
        return fallback_plan();
    }
    let steps = raw_steps
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let id = s.get("id").and_then(|v| v.as_str()).map(str::to_string).unwrap_or_else(|| format!("step_{}", i + 1));
            let description = s.get("description").and_then(|v| v.as_str()).unwrap_or_default();
            let instruction = s.get("instruction").and_then(|v| v.as_str()).unwrap_or_default();
            let text = match (description.is_empty(), instruction.is_empty()) {
                (false, false) => format!("{description}: {instruction}"),
                (false, true) => description.to_string(),
                (true, false) => instruction.to_string(),
                (true, true) => String::new(),
            };
            let agent = parse_sub_agent(s.get("sub_agent").and_then(|v| v.as_str()).unwrap_or("researcher"));
            let depends_on = s
                .get("depends_on")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            PlanStep { id, agent, description: text, depends_on, status: StepStatus::Pending, result: None, error: None }
        })
        .collect();
    ExecutionPlan::new(steps)
}

fn parse_sub_agent(raw: &str) -> SubAgentKind {
    match raw {
        "planner" => SubAgentKind::Planner,
        "analyzer" => SubAgentKind::Analyzer,
        "executor" => SubAgentKind::Executor,
        "synthesizer" => SubAgentKind::Synthesizer,
        _ => SubAgentKind::Researcher,
    }
}

fn fallback_plan() -> ExecutionPlan {
    ExecutionPlan::new(vec![
        PlanStep::new("step_1", SubAgentKind::Researcher, "Research the query"),
        {
            let mut s = PlanStep::new("step_2", SubAgentKind::Synthesizer, "Generate a helpful response based on the research");
            s.depends_on = vec!["step_1".into()];
            s
        },
    ])
}

/// Keep completed steps verbatim; replace only pending/failed/running
/// steps with the freshly-planned ones.
fn replan_in_place(plan: &mut ExecutionPlan, new_steps: Vec<PlanStep>) {
    let mut kept: Vec<PlanStep> = plan
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed)
        .cloned()
        .collect();
    kept.extend(new_steps);
    plan.steps = kept;
    plan.replan_count += 1;
}

fn estimate_tokens(content: &str) -> u32 {
    (content.len() / 4) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plan_extracts_steps_from_prose_wrapped_json() {
        let content = r#"Here's the plan:
```json
{"goal": "answer", "steps": [
  {"id": "step_1", "description": "look things up", "sub_agent": "researcher", "instruction": "find X", "depends_on": []},
  {"id": "step_2", "description": "write answer", "sub_agent": "synthesizer", "depends_on": ["step_1"]}
]}
```"#;
        let plan = parse_plan(content);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].agent, SubAgentKind::Researcher);
        assert_eq!(plan.steps[1].depends_on, vec!["step_1"]);
    }

    #[test]
    fn parse_plan_falls_back_on_malformed_json() {
        let plan = parse_plan("not json at all");
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].id, "step_1");
        assert_eq!(plan.steps[1].depends_on, vec!["step_1"]);
    }

    #[test]
    fn parse_plan_falls_back_on_empty_steps_array() {
        let plan = parse_plan(r#"{"goal": "x", "steps": []}"#);
        assert_eq!(plan.steps.len(), 2);
    }

    #[test]
    fn missing_step_id_defaults_to_positional() {
        let plan = parse_plan(r#"{"steps": [{"description": "do it", "sub_agent": "analyzer"}]}"#);
        assert_eq!(plan.steps[0].id, "step_1");
    }

    #[test]
    fn replan_keeps_completed_and_replaces_rest() {
        let mut plan = ExecutionPlan::new(vec![
            {
                let mut s = PlanStep::new("a", SubAgentKind::Researcher, "done");
                s.status = StepStatus::Completed;
                s
            },
            PlanStep::new("b", SubAgentKind::Analyzer, "stale"),
        ]);
        let new_steps = vec![PlanStep::new("c", SubAgentKind::Executor, "fresh")];
        replan_in_place(&mut plan, new_steps);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].id, "a");
        assert_eq!(plan.steps[1].id, "c");
        assert_eq!(plan.replan_count, 1);
    }
}
