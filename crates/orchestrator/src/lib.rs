//! Drives one request through plan → dispatch → (replan | HIL suspend)*
//! → synthesize, emitting [`orc_protocol::OutboundFrame`]s as it goes.
//!
//! The blackboard is not `Send`-shared: the orchestrator is its sole
//! owner and awaits every sub-agent `execute()` call serially from its
//! own task rather than spawning steps with independent ownership of it
//! (see `orc-blackboard`'s module doc). A "wave" of ready steps is
//! therefore dispatched one at a time, bounded to
//! `orchestrator.max_step_parallelism` steps per pass before dependency
//! readiness is recomputed — this is a scheduling batch size, not OS-level
//! concurrency.

mod roster;
mod run_state;

pub use roster::Roster;
pub use run_state::RunState;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use orc_agents::SubAgent;
use orc_blackboard::{Blackboard, InteractionType};
use orc_domain::config::OrchestratorConfig;
use orc_domain::{Error, ExecutionPlan, PlanStep, RequestContext, Result, StepStatus, SubAgentKind, TraceEvent};
use orc_protocol::{ComponentPayload, InboundFrame, OutboundFrame, UiInteractionData, UiInteractionKind};
use orc_sessions::SessionRepository;

const THREAD_ID: &str = "main";

pub struct Orchestrator {
    roster: Roster,
    sessions: Arc<dyn SessionRepository>,
    config: OrchestratorConfig,
    system_prompts: SystemPrompts,
}

/// System prompts handed to each sub-agent's `execute()` call. Kept as
/// plain strings rather than a templating layer — the reference
/// sub-agents each hardcode one short role prompt.
#[derive(Debug, Clone)]
pub struct SystemPrompts {
    pub planner: String,
    pub researcher: String,
    pub analyzer: String,
    pub executor: String,
    pub synthesizer: String,
}

impl Default for SystemPrompts {
    fn default() -> Self {
        Self {
            planner: "You are a planning agent. Decompose the user's request into a short sequence of steps, each assigned to one of: researcher, analyzer, executor, synthesizer.".into(),
            researcher: "You are a research agent. Gather and summarize the information needed to answer the request.".into(),
            analyzer: "You are an analysis agent. Reason over the information gathered so far and surface conclusions.".into(),
            executor: "You are an execution agent. Use the available tools to carry out the requested action.".into(),
            synthesizer: "You are a synthesis agent. Write the final answer for the user in clear Markdown.".into(),
        }
    }
}

impl Orchestrator {
    pub fn new(
        roster: Roster,
        sessions: Arc<dyn SessionRepository>,
        config: OrchestratorConfig,
        system_prompts: SystemPrompts,
    ) -> Self {
        Self { roster, sessions, config, system_prompts }
    }

    fn system_prompt_for(&self, kind: SubAgentKind) -> &str {
        match kind {
            SubAgentKind::Planner => &self.system_prompts.planner,
            SubAgentKind::Researcher => &self.system_prompts.researcher,
            SubAgentKind::Analyzer => &self.system_prompts.analyzer,
            SubAgentKind::Executor => &self.system_prompts.executor,
            SubAgentKind::Synthesizer => &self.system_prompts.synthesizer,
        }
    }

    /// Drive a fresh request end to end, or until it suspends for human
    /// input (in which case this returns `Ok(())` having sent a
    /// `ui_interaction` frame and checkpointed state for
    /// [`Self::resume_request`] to pick back up).
    pub async fn handle_request(
        &self,
        ctx: RequestContext,
        query: String,
        outbound: mpsc::Sender<OutboundFrame>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let request_started = Instant::now();
        TraceEvent::RequestAdmitted {
            request_id: ctx.request_id.clone(),
            session_id: ctx.session_id.clone(),
            user_id: ctx.user.id.clone(),
        }
        .emit();

        let mut blackboard = Blackboard::create(ctx.clone(), query.clone());
        let _ = outbound.send(OutboundFrame::progress("Thinking")).await;

        let plan = match self.create_initial_plan(&ctx, &mut blackboard).await {
            Ok(plan) => plan,
            Err(e) => {
                let _ = outbound.send(OutboundFrame::error("PLANNING_FAILED", e.to_string())).await;
                return Ok(());
            }
        };
        blackboard.plan = Some(plan);
        let _ = outbound.send(OutboundFrame::progress("Planning complete")).await;

        let run_state = self.drive(&ctx, &mut blackboard, &outbound, &cancel, request_started).await?;

        if run_state == RunState::AwaitingHil {
            self.checkpoint(&blackboard, run_state).await;
        }

        Ok(())
    }

    /// Resume a request parked in [`RunState::AwaitingHil`] after a
    /// matching `human_input` inbound frame arrives.
    pub async fn resume_request(
        &self,
        ctx: RequestContext,
        inbound: InboundFrame,
        outbound: mpsc::Sender<OutboundFrame>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let InboundFrame::HumanInput { payload } = inbound else {
            return Err(Error::Validation("resume_request expects a human_input frame".into()));
        };

        let checkpoint = self
            .sessions
            .get_latest_checkpoint(&payload.session_id, THREAD_ID)
            .ok_or_else(|| Error::NotFound(format!("no checkpoint for session '{}'", payload.session_id)))?;

        let mut blackboard: Blackboard = serde_json::from_value(checkpoint.state.clone())
            .map_err(|e| Error::Validation(format!("corrupt checkpoint: {e}")))?;

        TraceEvent::CheckpointResumed { session_id: payload.session_id.clone(), request_id: ctx.request_id.clone() }.emit();

        let approved = !payload.is_rejected();
        blackboard.resolve_interaction(&payload.interaction_id, payload.values.clone().unwrap_or(serde_json::Value::Null));
        TraceEvent::HilResolved { request_id: ctx.request_id.clone(), interaction_id: payload.interaction_id.clone(), approved }.emit();

        let pending = blackboard.get(&format!("_pending_tool.{}", payload.interaction_id)).cloned();
        let Some((step_id, tool_name, args)) = pending.as_ref().and_then(|v| {
            let step_id = v.get("step_id")?.as_str()?.to_string();
            let tool_name = v.get("tool_name")?.as_str()?.to_string();
            let args = v.get("arguments").cloned().unwrap_or(serde_json::Value::Null);
            Some((step_id, tool_name, args))
        }) else {
            return Err(Error::NotFound(format!("no step awaiting interaction '{}'", payload.interaction_id)));
        };

        if approved {
            let mut writer = blackboard.writer();
            let result = self
                .roster
                .executor
                .execute_approved_action(ctx.clone(), &mut writer, &payload.interaction_id, &tool_name, args)
                .await;
            apply_step_result(&mut blackboard, &step_id, result);
        } else {
            if let Some(plan) = blackboard.plan.as_mut() {
                if let Some(step) = plan.step_mut(&step_id) {
                    step.status = StepStatus::Failed;
                    step.error = Some("user rejected".into());
                }
            }
        }

        let request_started = Instant::now();
        let run_state = self.drive(&ctx, &mut blackboard, &outbound, &cancel, request_started).await?;
        if run_state == RunState::AwaitingHil {
            self.checkpoint(&blackboard, run_state).await;
        }
        Ok(())
    }

    async fn create_initial_plan(&self, ctx: &RequestContext, blackboard: &mut Blackboard) -> Result<ExecutionPlan> {
        let query = blackboard.query.clone();
        let context = blackboard.context_for_llm(4000);
        let plan = self.roster.planner.create_plan(ctx, &query, &self.system_prompts.planner, &context).await?;
        TraceEvent::PlanCreated { request_id: ctx.request_id.clone(), step_count: plan.steps.len(), replan_count: plan.replan_count }.emit();
        Ok(plan)
    }

    /// Run the dispatch/replan/synthesis loop until the plan is
    /// complete, the request is cancelled, or a step suspends for HIL.
    async fn drive(
        &self,
        ctx: &RequestContext,
        blackboard: &mut Blackboard,
        outbound: &mpsc::Sender<OutboundFrame>,
        cancel: &CancellationToken,
        request_started: Instant,
    ) -> Result<RunState> {
        let mut replans_used = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Ok(self.cancel_request(ctx, blackboard, outbound).await);
            }

            let plan = blackboard.plan.clone().unwrap_or_default();
            if plan.is_complete() {
                break;
            }

            let ready_ids: Vec<String> = plan
                .ready_steps()
                .into_iter()
                .take(self.config.max_step_parallelism.max(1))
                .map(|s| s.id.clone())
                .collect();

            for step_id in ready_ids {
                if cancel.is_cancelled() {
                    return Ok(self.cancel_request(ctx, blackboard, outbound).await);
                }

                let Some(step) = blackboard.plan.as_mut().and_then(|p| p.step_mut(&step_id)) else { continue };
                step.status = StepStatus::Running;
                let agent_kind = step.agent;
                TraceEvent::StepStarted { request_id: ctx.request_id.clone(), step_id: step_id.clone(), agent: agent_kind.to_string() }.emit();

                let started = Instant::now();
                let result = self.dispatch_step(ctx, blackboard, &step_id, agent_kind).await;

                match result {
                    StepOutcome::AwaitingHil => {
                        self.send_pending_interactions(blackboard, outbound).await;
                        return Ok(RunState::AwaitingHil);
                    }
                    StepOutcome::Completed(result) => {
                        let tokens = result.tokens_used;
                        if let Some(step) = blackboard.plan.as_mut().and_then(|p| p.step_mut(&step_id)) {
                            step.status = StepStatus::Completed;
                            step.result = Some(result.output.clone());
                        }
                        blackboard.set(format!("step.{step_id}"), result.output, agent_kind.as_str());
                        TraceEvent::StepCompleted {
                            request_id: ctx.request_id.clone(),
                            step_id: step_id.clone(),
                            agent: agent_kind.to_string(),
                            duration_ms: started.elapsed().as_millis() as u64,
                            tokens_used: tokens,
                        }
                        .emit();
                    }
                    StepOutcome::Failed(error) => {
                        if let Some(step) = blackboard.plan.as_mut().and_then(|p| p.step_mut(&step_id)) {
                            step.status = StepStatus::Failed;
                            step.error = Some(error.clone());
                        }
                        TraceEvent::StepFailed { request_id: ctx.request_id.clone(), step_id: step_id.clone(), agent: agent_kind.to_string(), error }.emit();
                    }
                }
            }

            // A wave just ran (or nothing was ready to dispatch). If there
            // are failures — whether the plan is nominally "complete"
            // (every step terminal) or stuck blocked on a failed
            // dependency — try to replan while budget remains; otherwise
            // stop dispatching and let the synthesizer explain things.
            let plan_ref = blackboard.plan.as_ref().unwrap();
            if plan_ref.has_failures() && replans_used < self.config.replan_budget {
                let failed_reason = plan_ref
                    .failed_steps()
                    .iter()
                    .map(|s| format!("{}: {}", s.id, s.error.clone().unwrap_or_default()))
                    .collect::<Vec<_>>()
                    .join("; ");

                let _ = outbound.send(OutboundFrame::progress("Revising plan")).await;
                replans_used += 1;
                TraceEvent::ReplanTriggered { request_id: ctx.request_id.clone(), replan_count: replans_used, reason: failed_reason.clone() }.emit();

                let query = blackboard.query.clone();
                let context = blackboard.context_for_llm(4000);
                let mut plan_owned = blackboard.plan.clone().unwrap_or_default();
                self.roster
                    .planner
                    .replan(ctx, &mut plan_owned, &failed_reason, &self.system_prompts.planner, &query, &context)
                    .await?;
                blackboard.plan = Some(plan_owned);
                continue;
            }

            if blackboard.plan.as_ref().unwrap().is_complete() || blackboard.plan.as_ref().unwrap().ready_steps().is_empty() {
                break;
            }
        }

        self.synthesize(ctx, blackboard, outbound, request_started).await?;
        Ok(RunState::Complete)
    }

    async fn dispatch_step(&self, ctx: &RequestContext, blackboard: &mut Blackboard, step_id: &str, kind: SubAgentKind) -> StepOutcome {
        let step = blackboard.plan.as_ref().and_then(|p| p.step(step_id)).cloned();
        let Some(step) = step else {
            return StepOutcome::Failed("step disappeared from plan".into());
        };

        let sub_agent = self.roster.for_kind(kind);
        let system_prompt = self.system_prompt_for(kind).to_string();
        let timeout = std::time::Duration::from_millis(self.config.step_timeout_ms);

        let mut writer = blackboard.writer();
        let outcome = tokio::time::timeout(timeout, sub_agent.execute(ctx, &mut writer, &step, &system_prompt)).await;

        match outcome {
            Err(_) => StepOutcome::Failed("step timed out".into()),
            Ok(Err(e)) => StepOutcome::Failed(e.to_string()),
            Ok(Ok(result)) if !result.success => StepOutcome::Failed(result.error.unwrap_or_else(|| "sub-agent failed".into())),
            Ok(Ok(result)) if result.output.get("status").and_then(|v| v.as_str()) == Some("awaiting_approval") => {
                self.raise_hil(ctx, blackboard, step_id, &result.output);
                StepOutcome::AwaitingHil
            }
            Ok(Ok(result)) => StepOutcome::Completed(result),
        }
    }

    fn raise_hil(&self, ctx: &RequestContext, blackboard: &mut Blackboard, step_id: &str, output: &serde_json::Value) {
        let interaction_id = output.get("interaction_id").and_then(|v| v.as_str()).unwrap_or_default();
        let tool_name = output.get("tool_name").and_then(|v| v.as_str()).unwrap_or_default();
        let arguments = output.get("arguments").cloned().unwrap_or(serde_json::Value::Null);
        TraceEvent::HilRaised {
            request_id: ctx.request_id.clone(),
            step_id: step_id.to_string(),
            interaction_id: interaction_id.to_string(),
            reason: format!("approval required for tool '{tool_name}'"),
        }
        .emit();
        blackboard.set(
            format!("_pending_tool.{interaction_id}"),
            serde_json::json!({"tool_name": tool_name, "step_id": step_id, "arguments": arguments}),
            "executor",
        );
    }

    async fn synthesize(&self, ctx: &RequestContext, blackboard: &mut Blackboard, outbound: &mpsc::Sender<OutboundFrame>, request_started: Instant) -> Result<()> {
        let _ = outbound.send(OutboundFrame::progress("Synthesizing")).await;

        let synthesis_step = blackboard
            .plan
            .as_ref()
            .and_then(|p| p.steps.iter().find(|s| s.agent == SubAgentKind::Synthesizer).cloned());

        // A synthesizer step already dispatched and completed in the wave
        // loop carries its output on `step.result` — reuse it rather than
        // invoking the synthesizer a second time. Only a plan with no
        // synthesizer step at all needs a fresh, synthetic invocation.
        let output = match synthesis_step.as_ref().and_then(|s| s.result.clone()) {
            Some(output) => output,
            None => {
                let step = synthesis_step
                    .unwrap_or_else(|| PlanStep::new("_synthesis", SubAgentKind::Synthesizer, "Produce the final answer for the user"));
                let mut writer = blackboard.writer();
                let result = self
                    .roster
                    .synthesizer
                    .execute(ctx, &mut writer, &step, &self.system_prompts.synthesizer)
                    .await?;
                result.output
            }
        };

        let _ = outbound.send(OutboundFrame::progress("_synthesis_complete")).await;

        let content = output.get("content").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        for chunk in chunk_markdown(&content, self.config.markdown_chunk_chars) {
            let _ = outbound.send(OutboundFrame::markdown(chunk)).await;
        }

        let suggestions = self.roster.synthesizer.generate_suggestions(&blackboard.query, &content, 3).await;
        if !suggestions.is_empty() {
            let _ = outbound.send(OutboundFrame::suggestions(suggestions)).await;
        }

        TraceEvent::RequestCompleted {
            request_id: ctx.request_id.clone(),
            duration_ms: request_started.elapsed().as_millis() as u64,
            step_count: blackboard.plan.as_ref().map(|p| p.steps.len()).unwrap_or(0),
        }
        .emit();

        Ok(())
    }

    async fn cancel_request(&self, ctx: &RequestContext, blackboard: &mut Blackboard, outbound: &mpsc::Sender<OutboundFrame>) -> RunState {
        if let Some(plan) = blackboard.plan.as_mut() {
            for step in &mut plan.steps {
                if !step.is_terminal() {
                    step.status = StepStatus::Skipped;
                }
            }
        }
        TraceEvent::RequestCancelled { request_id: ctx.request_id.clone(), reason: "cancelled by client".into() }.emit();
        let _ = outbound.send(OutboundFrame::error(orc_protocol::CANCELLED_CODE, "request cancelled")).await;
        RunState::Cancelled
    }

    async fn checkpoint(&self, blackboard: &Blackboard, _state: RunState) {
        let Ok(state) = serde_json::to_value(blackboard) else { return };
        self.sessions.create_checkpoint(&blackboard.ctx.session_id, THREAD_ID, state, None, serde_json::Value::Null);
        TraceEvent::CheckpointSaved { session_id: blackboard.ctx.session_id.clone(), request_id: blackboard.ctx.request_id.clone() }.emit();
    }

    /// Surface every unresolved pending interaction as a `ui_interaction`
    /// frame, so a step that suspended mid-wave and any still-open
    /// interaction from a prior wave are both visible to the client.
    async fn send_pending_interactions(&self, blackboard: &Blackboard, outbound: &mpsc::Sender<OutboundFrame>) {
        for interaction in &blackboard.pending_interactions {
            if interaction.is_resolved() {
                continue;
            }
            let kind = match interaction.interaction_type {
                InteractionType::Confirm => UiInteractionKind::Confirm,
                InteractionType::Form => UiInteractionKind::Form,
                InteractionType::Input => UiInteractionKind::Choice,
            };
            let frame = OutboundFrame::Component {
                payload: ComponentPayload::UiInteraction {
                    data: UiInteractionData {
                        interaction_id: interaction.id.clone(),
                        kind,
                        prompt: interaction.prompt.clone(),
                        options: interaction.options.clone(),
                        form_schema: interaction.form_schema.clone(),
                    },
                },
            };
            let _ = outbound.send(frame).await;
        }
    }
}

enum StepOutcome {
    Completed(orc_agents::SubAgentResult),
    Failed(String),
    AwaitingHil,
}

fn apply_step_result(blackboard: &mut Blackboard, step_id: &str, result: orc_agents::SubAgentResult) {
    if result.success {
        if let Some(plan) = blackboard.plan.as_mut() {
            if let Some(step) = plan.step_mut(step_id) {
                step.status = StepStatus::Completed;
                step.result = Some(result.output.clone());
            }
        }
        blackboard.set(format!("step.{step_id}"), result.output, "executor");
    } else if let Some(plan) = blackboard.plan.as_mut() {
        if let Some(step) = plan.step_mut(step_id) {
            step.status = StepStatus::Failed;
            step.error = result.error;
        }
    }
}

fn chunk_markdown(content: &str, max_chars: usize) -> Vec<String> {
    if content.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|c| c.iter().collect::<String>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::config::{AgentsConfig, HilConfig};
    use orc_domain::config::RoleConfig;
    use orc_domain::{RiskTier, ToolSpec, User};
    use orc_providers::mock::{MockLlmProvider, MockOutcome};
    use orc_providers::{LlmRouter, ProviderRegistry};
    use orc_sessions::MockSessionStore;
    use orc_tools::{ToolFn, ToolRegistry};
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn ctx(session_id: &str) -> RequestContext {
        RequestContext::new(
            User { id: "u1".into(), username: "alice".into(), email: None, permissions: Default::default(), bearer_token: None },
            session_id,
            "req-1",
        )
    }

    fn role_config(provider_id: &str) -> RoleConfig {
        RoleConfig {
            model: format!("{provider_id}/mock-1"),
            require_tools: false,
            require_json: false,
            require_streaming: false,
            fallbacks: vec![],
        }
    }

    /// Wires a router with one scripted provider per role, a tool-less
    /// registry, an in-memory session store, and `max_step_parallelism: 1`
    /// so waves dispatch deterministically for assertions.
    fn build_orchestrator(
        planner_reply: &str,
        researcher_reply: &str,
        synthesizer_reply: &str,
        tools: Vec<(ToolSpec, ToolFn)>,
    ) -> (Orchestrator, std::sync::Arc<MockSessionStore>) {
        let mut providers: HashMap<String, std::sync::Arc<dyn orc_providers::LlmProvider>> = HashMap::new();
        providers.insert("planner-llm".into(), std::sync::Arc::new(MockLlmProvider::always_ok("planner-llm", planner_reply)));
        providers.insert("researcher-llm".into(), std::sync::Arc::new(MockLlmProvider::always_ok("researcher-llm", researcher_reply)));
        providers.insert("analyzer-llm".into(), std::sync::Arc::new(MockLlmProvider::always_ok("analyzer-llm", "analysis done")));
        providers.insert("executor-llm".into(), std::sync::Arc::new(MockLlmProvider::always_ok("executor-llm", "no tools needed")));
        providers.insert("synthesizer-llm".into(), std::sync::Arc::new(MockLlmProvider::always_ok("synthesizer-llm", synthesizer_reply)));

        let mut roles = HashMap::new();
        roles.insert("planner".into(), role_config("planner-llm"));
        roles.insert("researcher".into(), role_config("researcher-llm"));
        roles.insert("analyzer".into(), role_config("analyzer-llm"));
        roles.insert("executor".into(), role_config("executor-llm"));
        roles.insert("synthesizer".into(), role_config("synthesizer-llm"));

        let registry = ProviderRegistry::from_providers(providers, HashMap::new());
        let router = std::sync::Arc::new(LlmRouter::new(registry, roles, 5_000));
        let tool_registry = std::sync::Arc::new(ToolRegistry::build(tools).unwrap());
        let hil = std::sync::Arc::new(HilConfig::default());
        let agents_config = AgentsConfig::default();

        let roster = Roster::new(router, None, tool_registry, hil, &agents_config);
        let sessions = std::sync::Arc::new(MockSessionStore::default());
        let mut config = OrchestratorConfig::default();
        config.max_step_parallelism = 1;

        let orchestrator = Orchestrator::new(roster, sessions.clone(), config, SystemPrompts::default());
        (orchestrator, sessions)
    }

    fn delete_tool(captured: std::sync::Arc<Mutex<Option<serde_json::Value>>>) -> (ToolSpec, ToolFn) {
        (
            ToolSpec {
                name: "delete_record".into(),
                description: "deletes a record".into(),
                parameters: serde_json::json!({}),
                risk: Some(RiskTier::Destructive),
                timeout_ms: None,
                required_permissions: vec![],
                confirmation_prompt: None,
            },
            std::sync::Arc::new(move |_ctx, args: serde_json::Value| {
                let captured = captured.clone();
                Box::pin(async move {
                    *captured.lock().unwrap() = Some(args);
                    Ok(serde_json::json!({"deleted": true}))
                })
            }),
        )
    }

    #[tokio::test]
    async fn handle_request_completes_plan_and_streams_markdown() {
        let plan_json = r#"{"goal": "answer", "steps": [
            {"id": "step_1", "description": "look into it", "sub_agent": "researcher", "depends_on": []},
            {"id": "step_2", "description": "write the answer", "sub_agent": "synthesizer", "depends_on": ["step_1"]}
        ]}"#;
        let (orchestrator, _sessions) = build_orchestrator(plan_json, "here is what I found", "# Final Answer\n\nAll done.", vec![]);

        let (tx, mut rx) = mpsc::channel(32);
        orchestrator
            .handle_request(ctx("sess-1"), "what happened?".into(), tx, CancellationToken::new())
            .await
            .unwrap();

        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }

        let has_markdown = frames.iter().any(|f| matches!(f, OutboundFrame::Markdown { payload } if payload.contains("Final Answer")));
        assert!(has_markdown, "expected a markdown frame with the synthesized answer, got {frames:?}");

        let has_error = frames.iter().any(|f| matches!(f, OutboundFrame::Component { payload: ComponentPayload::Error { .. } }));
        assert!(!has_error, "did not expect an error frame, got {frames:?}");
    }

    #[tokio::test]
    async fn handle_request_synthesizes_only_once_when_plan_has_a_synthesizer_step() {
        let plan_json = r#"{"goal": "answer", "steps": [
            {"id": "step_1", "description": "look into it", "sub_agent": "researcher", "depends_on": []},
            {"id": "step_2", "description": "write the answer", "sub_agent": "synthesizer", "depends_on": ["step_1"]}
        ]}"#;
        let mut providers: HashMap<String, std::sync::Arc<dyn orc_providers::LlmProvider>> = HashMap::new();
        providers.insert("planner-llm".into(), std::sync::Arc::new(MockLlmProvider::always_ok("planner-llm", plan_json)));
        providers.insert("researcher-llm".into(), std::sync::Arc::new(MockLlmProvider::always_ok("researcher-llm", "here is what I found")));
        providers.insert(
            "synthesizer-llm".into(),
            std::sync::Arc::new(MockLlmProvider::new(
                "synthesizer-llm",
                Default::default(),
                vec![MockOutcome::Reply("# Final Answer\n\nAll done.".into()), MockOutcome::Reply("SHOULD NOT APPEAR".into())],
            )),
        );

        let mut roles = HashMap::new();
        roles.insert("planner".into(), role_config("planner-llm"));
        roles.insert("researcher".into(), role_config("researcher-llm"));
        roles.insert("synthesizer".into(), role_config("synthesizer-llm"));

        let registry = ProviderRegistry::from_providers(providers, HashMap::new());
        let router = std::sync::Arc::new(LlmRouter::new(registry, roles, 5_000));
        let tool_registry = std::sync::Arc::new(ToolRegistry::build(vec![]).unwrap());
        let hil = std::sync::Arc::new(HilConfig::default());
        let agents_config = AgentsConfig::default();
        let roster = Roster::new(router, None, tool_registry, hil, &agents_config);
        let sessions = std::sync::Arc::new(MockSessionStore::default());
        let mut config = OrchestratorConfig::default();
        config.max_step_parallelism = 1;
        let orchestrator = Orchestrator::new(roster, sessions, config, SystemPrompts::default());

        let (tx, mut rx) = mpsc::channel(32);
        orchestrator
            .handle_request(ctx("sess-1"), "what happened?".into(), tx, CancellationToken::new())
            .await
            .unwrap();

        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }

        let has_first_reply = frames.iter().any(|f| matches!(f, OutboundFrame::Markdown { payload } if payload.contains("Final Answer")));
        assert!(has_first_reply, "expected the synthesizer's single reply to be streamed, got {frames:?}");

        let has_second_reply = frames.iter().any(|f| matches!(f, OutboundFrame::Markdown { payload } if payload.contains("SHOULD NOT APPEAR")));
        assert!(!has_second_reply, "synthesizer was invoked a second time, got {frames:?}");
    }

    #[tokio::test]
    async fn handle_request_emits_error_frame_on_planning_failure() {
        let mut providers: HashMap<String, std::sync::Arc<dyn orc_providers::LlmProvider>> = HashMap::new();
        providers.insert("planner-llm".into(), std::sync::Arc::new(MockLlmProvider::new("planner-llm", Default::default(), vec![MockOutcome::Fail("boom".into())])));
        let mut roles = HashMap::new();
        roles.insert("planner".into(), role_config("planner-llm"));
        let registry = ProviderRegistry::from_providers(providers, HashMap::new());
        let router = std::sync::Arc::new(LlmRouter::new(registry, roles, 5_000));
        let tool_registry = std::sync::Arc::new(ToolRegistry::build(vec![]).unwrap());
        let hil = std::sync::Arc::new(HilConfig::default());
        let agents_config = AgentsConfig::default();
        let roster = Roster::new(router, None, tool_registry, hil, &agents_config);
        let sessions = std::sync::Arc::new(MockSessionStore::default());
        let orchestrator = Orchestrator::new(roster, sessions, OrchestratorConfig::default(), SystemPrompts::default());

        let (tx, mut rx) = mpsc::channel(32);
        orchestrator
            .handle_request(ctx("sess-2"), "do something".into(), tx, CancellationToken::new())
            .await
            .unwrap();

        let frame = rx.recv().await.unwrap();
        match frame {
            OutboundFrame::Component { payload: ComponentPayload::Error { data } } => {
                assert_eq!(data.code, "PLANNING_FAILED");
            }
            other => panic!("expected an error frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resume_request_runs_the_approved_tool_with_its_original_arguments() {
        let captured = std::sync::Arc::new(Mutex::new(None));
        let (orchestrator, sessions) = build_orchestrator(
            "unused",
            "unused",
            "# Done\n\nThe record was deleted.",
            vec![delete_tool(captured.clone())],
        );

        let request_ctx = ctx("sess-3");
        let mut blackboard = Blackboard::create(request_ctx.clone(), "delete record 42");
        let mut plan = ExecutionPlan::new(vec![
            PlanStep::new("step_1", SubAgentKind::Executor, "delete the record"),
            {
                let mut s = PlanStep::new("step_2", SubAgentKind::Synthesizer, "report back");
                s.depends_on = vec!["step_1".into()];
                s
            },
        ]);
        plan.step_mut("step_1").unwrap().status = StepStatus::Running;
        blackboard.plan = Some(plan);

        let interaction_id = blackboard.add_pending_interaction(InteractionType::Confirm, "Approve deletion?".into(), None, None, 300.0);
        blackboard.set(
            format!("_pending_tool.{interaction_id}"),
            serde_json::json!({"tool_name": "delete_record", "step_id": "step_1", "arguments": {"record_id": "42"}}),
            "executor",
        );

        let state = serde_json::to_value(&blackboard).unwrap();
        sessions.create_checkpoint(&request_ctx.session_id, THREAD_ID, state, None, serde_json::Value::Null);

        let inbound = InboundFrame::HumanInput {
            payload: orc_protocol::HumanInputPayload {
                interaction_id: interaction_id.clone(),
                session_id: request_ctx.session_id.clone(),
                values: Some(serde_json::json!({"approved": true})),
            },
        };

        let (tx, mut rx) = mpsc::channel(32);
        orchestrator.resume_request(request_ctx, inbound, tx, CancellationToken::new()).await.unwrap();

        assert_eq!(*captured.lock().unwrap(), Some(serde_json::json!({"record_id": "42"})));

        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        let has_markdown = frames.iter().any(|f| matches!(f, OutboundFrame::Markdown { payload } if payload.contains("deleted")));
        assert!(has_markdown, "expected the synthesized answer after the approved tool ran, got {frames:?}");
    }

    #[tokio::test]
    async fn resume_request_skips_the_tool_when_rejected() {
        let captured = std::sync::Arc::new(Mutex::new(None));
        let (orchestrator, sessions) = build_orchestrator(
            "unused",
            "unused",
            "# Cancelled\n\nThe deletion was not performed.",
            vec![delete_tool(captured.clone())],
        );

        let request_ctx = ctx("sess-4");
        let mut blackboard = Blackboard::create(request_ctx.clone(), "delete record 42");
        let mut plan = ExecutionPlan::new(vec![
            PlanStep::new("step_1", SubAgentKind::Executor, "delete the record"),
            {
                let mut s = PlanStep::new("step_2", SubAgentKind::Synthesizer, "report back");
                s.depends_on = vec!["step_1".into()];
                s
            },
        ]);
        plan.step_mut("step_1").unwrap().status = StepStatus::Running;
        blackboard.plan = Some(plan);

        let interaction_id = blackboard.add_pending_interaction(InteractionType::Confirm, "Approve deletion?".into(), None, None, 300.0);
        blackboard.set(
            format!("_pending_tool.{interaction_id}"),
            serde_json::json!({"tool_name": "delete_record", "step_id": "step_1", "arguments": {"record_id": "42"}}),
            "executor",
        );

        let state = serde_json::to_value(&blackboard).unwrap();
        sessions.create_checkpoint(&request_ctx.session_id, THREAD_ID, state, None, serde_json::Value::Null);

        let inbound = InboundFrame::HumanInput {
            payload: orc_protocol::HumanInputPayload {
                interaction_id: interaction_id.clone(),
                session_id: request_ctx.session_id.clone(),
                values: None,
            },
        };

        let (tx, mut rx) = mpsc::channel(32);
        orchestrator.resume_request(request_ctx, inbound, tx, CancellationToken::new()).await.unwrap();

        assert!(captured.lock().unwrap().is_none(), "rejected interaction must not run the gated tool");

        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        let has_markdown = frames.iter().any(|f| matches!(f, OutboundFrame::Markdown { .. }));
        assert!(has_markdown, "synthesis should still run to explain the rejection, got {frames:?}");
    }

    #[tokio::test]
    async fn cancelled_request_skips_remaining_steps() {
        let plan_json = r#"{"goal": "answer", "steps": [
            {"id": "step_1", "description": "look into it", "sub_agent": "researcher", "depends_on": []}
        ]}"#;
        let (orchestrator, _sessions) = build_orchestrator(plan_json, "finding", "final", vec![]);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let (tx, mut rx) = mpsc::channel(32);
        orchestrator.handle_request(ctx("sess-5"), "query".into(), tx, cancel).await.unwrap();

        let frame = rx.recv().await.unwrap();
        match frame {
            OutboundFrame::Component { payload: ComponentPayload::Error { data } } => {
                assert_eq!(data.code, orc_protocol::CANCELLED_CODE);
            }
            other => panic!("expected a cancellation error frame, got {other:?}"),
        }
    }

    #[test]
    fn chunk_markdown_splits_on_char_boundaries() {
        let chunks = chunk_markdown("hello world", 5);
        assert_eq!(chunks, vec!["hello", " worl", "d"]);
    }

    #[test]
    fn chunk_markdown_handles_empty_content() {
        assert_eq!(chunk_markdown("", 10), vec![""]);
    }
}
