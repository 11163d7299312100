use serde::Serialize;

/// Structured trace events emitted across the orchestration core.
///
/// Every event is a flat, serializable snapshot of something that
/// happened at a component boundary. `emit()` never panics or
/// propagates — a tracing failure must never take down a request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    RequestAdmitted {
        request_id: String,
        session_id: String,
        user_id: String,
    },
    PlanCreated {
        request_id: String,
        step_count: usize,
        replan_count: u32,
    },
    ReplanTriggered {
        request_id: String,
        replan_count: u32,
        reason: String,
    },
    StepStarted {
        request_id: String,
        step_id: String,
        agent: String,
    },
    StepCompleted {
        request_id: String,
        step_id: String,
        agent: String,
        duration_ms: u64,
        tokens_used: u32,
    },
    StepFailed {
        request_id: String,
        step_id: String,
        agent: String,
        error: String,
    },
    HilRaised {
        request_id: String,
        step_id: String,
        interaction_id: String,
        reason: String,
    },
    HilResolved {
        request_id: String,
        interaction_id: String,
        approved: bool,
    },
    RequestCompleted {
        request_id: String,
        duration_ms: u64,
        step_count: usize,
    },
    RequestCancelled {
        request_id: String,
        reason: String,
    },
    ToolCalled {
        request_id: String,
        tool_name: String,
        duration_ms: u64,
        success: bool,
    },
    KnowledgeSearch {
        request_id: String,
        query_chars: usize,
        bm25_hits: usize,
        vector_hits: usize,
        fused_hits: usize,
        duration_ms: u64,
    },
    LlmRequest {
        provider: String,
        model: String,
        role: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    LlmFallback {
        from_provider: String,
        from_model: String,
        to_provider: String,
        to_model: String,
        reason: String,
    },
    SessionResolved {
        session_key: String,
        session_id: String,
        is_new: bool,
    },
    SessionReset {
        session_key: String,
        old_session_id: String,
        new_session_id: String,
        reason: String,
    },
    CheckpointSaved {
        session_id: String,
        request_id: String,
    },
    CheckpointResumed {
        session_id: String,
        request_id: String,
    },
    IdentityResolved {
        raw_peer_id: String,
        canonical: String,
    },
    TranscriptAppend {
        session_id: String,
        lines: usize,
    },
}

impl TraceEvent {
    /// Emit this event as a structured `tracing::info!` record.
    ///
    /// Serialization failure (should be unreachable — every variant is
    /// composed of plain scalars) degrades to an empty payload rather
    /// than panicking or dropping the span.
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "orc_event");
    }
}
