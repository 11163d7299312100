pub mod capability;
pub mod config;
pub mod error;
pub mod plan;
pub mod request;
pub mod stream;
pub mod tool;
pub mod trace;

pub use capability::{LlmCapabilities, ToolSupport};
pub use config::Config;
pub use error::{Error, Result};
pub use plan::{ExecutionPlan, PlanStep, StepStatus, SubAgentKind};
pub use request::{Locale, RequestContext, User};
pub use stream::{BoxStream, StreamEvent, Usage};
pub use tool::{
    ContentPart, Message, MessageContent, RiskTier, Role, ToolCall, ToolDefinition, ToolResult,
    ToolSpec,
};
pub use trace::TraceEvent;
