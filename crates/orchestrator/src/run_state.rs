use serde::Serialize;

/// Lifecycle state of one request as it moves through the agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Admitted,
    Planning,
    Dispatching,
    AwaitingDeps,
    AwaitingHil,
    Replan,
    Synthesizing,
    Complete,
    Failed,
    Cancelled,
}
