//! In-memory [`LlmProvider`] for tests — no network calls.

use crate::traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider};
use orc_domain::capability::LlmCapabilities;
use orc_domain::error::{Error, Result};
use orc_domain::stream::{BoxStream, StreamEvent};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A scripted provider that returns canned responses or errors, in order.
///
/// Each call to `chat` consumes the next scripted outcome. Once the script is
/// exhausted, `chat` returns the last outcome repeatedly.
pub struct MockLlmProvider {
    id: String,
    capabilities: LlmCapabilities,
    script: Vec<MockOutcome>,
    cursor: AtomicUsize,
}

/// One scripted response for [`MockLlmProvider`].
#[derive(Clone)]
pub enum MockOutcome {
    Reply(String),
    Fail(String),
}

impl MockLlmProvider {
    pub fn new(id: impl Into<String>, capabilities: LlmCapabilities, script: Vec<MockOutcome>) -> Self {
        assert!(!script.is_empty(), "MockLlmProvider needs at least one scripted outcome");
        Self {
            id: id.into(),
            capabilities,
            script,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Convenience constructor for a provider that always succeeds with the
    /// same reply text.
    pub fn always_ok(id: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::new(id, LlmCapabilities::default(), vec![MockOutcome::Reply(reply.into())])
    }

    /// Convenience constructor for a provider that always times out.
    pub fn always_timeout(id: impl Into<String>) -> Self {
        Self::new(
            id,
            LlmCapabilities::default(),
            vec![MockOutcome::Fail("timeout".into())],
        )
    }

    fn next_outcome(&self) -> MockOutcome {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        let pos = idx.min(self.script.len() - 1);
        self.script[pos].clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockLlmProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        match self.next_outcome() {
            MockOutcome::Reply(content) => Ok(ChatResponse {
                content,
                tool_calls: Vec::new(),
                usage: None,
                model: req.model.unwrap_or_else(|| "mock-model".into()),
                finish_reason: Some("stop".into()),
            }),
            MockOutcome::Fail(msg) if msg == "timeout" => Err(Error::Timeout(msg)),
            MockOutcome::Fail(msg) => Err(Error::Provider {
                provider: self.id.clone(),
                message: msg,
            }),
        }
    }

    async fn chat_stream(&self, _req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        Err(Error::Provider {
            provider: self.id.clone(),
            message: "MockLlmProvider does not support streaming".into(),
        })
    }

    async fn embeddings(&self, req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        let embeddings = req
            .input
            .iter()
            .map(|text| vec![text.len() as f32; 4])
            .collect();
        Ok(EmbeddingsResponse { embeddings })
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
