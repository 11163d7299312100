use serde::{Deserialize, Serialize};

/// Internal tool call format (provider-agnostic).
/// Every adapter converts provider-specific tool calls to/from this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// Tool definition exposed to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

/// Risk tier used to gate human-in-the-loop confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Read,
    Write,
    Destructive,
}

/// A registered, callable tool: schema plus permission and risk metadata.
/// The closure invoked at execution time lives in `orc-tools::ToolFn` —
/// this type is the provider- and executor-agnostic description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub risk: Option<RiskTier>,
    /// Default timeout for this tool if the caller doesn't override it.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Permissions the caller's `User` must hold for this tool to run.
    #[serde(default)]
    pub required_permissions: Vec<String>,
    /// Overrides the default HIL confirmation copy for this tool.
    #[serde(default)]
    pub confirmation_prompt: Option<String>,
}

impl ToolSpec {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }

    /// True when this call should be suspended for human confirmation,
    /// per the reference executor's `_requires_hil`: a destructive
    /// keyword in the tool name, or an amount-shaped argument over the
    /// configured threshold.
    pub fn requires_hil_for(
        &self,
        args: &serde_json::Value,
        hil: &crate::config::HilConfig,
    ) -> bool {
        let name_lower = self.name.to_lowercase();
        if hil.destructive_keywords.iter().any(|kw| name_lower.contains(kw.as_str())) {
            return true;
        }
        if let Some(obj) = args.as_object() {
            for field in &hil.amount_fields {
                if let Some(value) = obj.get(field) {
                    let amount = match value {
                        serde_json::Value::Number(n) => n.as_f64(),
                        serde_json::Value::String(s) => s.parse::<f64>().ok(),
                        _ => None,
                    };
                    if let Some(amount) = amount {
                        if amount > hil.amount_threshold {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }
}

/// Outcome of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub success: bool,
    pub output: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
    pub duration_ms: u64,
    /// `true` when `output` was compacted to fit the result budget.
    #[serde(default)]
    pub truncated: bool,
}

/// A message in the conversation (provider-agnostic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(rename = "image")]
    Image {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
}

// ── Convenience constructors ───────────────────────────────────────

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::Parts(vec![ContentPart::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
                is_error: false,
            }]),
        }
    }
}

impl MessageContent {
    /// Extract the plain-text content (first text part, or the full text).
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(t) => Some(t.as_str()),
            MessageContent::Parts(parts) => parts.iter().find_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            }),
        }
    }

    /// Extract and join all text content, returning an owned String.
    ///
    /// For `Text` variant, returns the string directly.
    /// For `Parts` variant, joins all `Text` parts with `"\n"`.
    /// Non-text parts (ToolUse, ToolResult, Image) are skipped.
    pub fn extract_all_text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_all_text_from_text_variant() {
        let content = MessageContent::Text("hello world".into());
        assert_eq!(content.extract_all_text(), "hello world");
    }

    #[test]
    fn extract_all_text_from_parts_joins_with_newline() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text { text: "line one".into() },
            ContentPart::ToolUse {
                id: "c1".into(),
                name: "exec".into(),
                input: serde_json::json!({}),
            },
            ContentPart::Text { text: "line two".into() },
        ]);
        assert_eq!(content.extract_all_text(), "line one\nline two");
    }

    #[test]
    fn extract_all_text_empty_parts() {
        let content = MessageContent::Parts(vec![]);
        assert_eq!(content.extract_all_text(), "");
    }

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.into(),
            description: "test".into(),
            parameters: serde_json::json!({}),
            risk: None,
            timeout_ms: None,
            required_permissions: vec![],
            confirmation_prompt: None,
        }
    }

    #[test]
    fn destructive_keyword_in_name_requires_hil() {
        let hil = crate::config::HilConfig::default();
        assert!(spec("delete_account").requires_hil_for(&serde_json::json!({}), &hil));
        assert!(!spec("read_account").requires_hil_for(&serde_json::json!({}), &hil));
    }

    #[test]
    fn amount_over_threshold_requires_hil() {
        let hil = crate::config::HilConfig::default();
        let args = serde_json::json!({"amount": 50_000.0});
        assert!(spec("submit_payment").requires_hil_for(&args, &hil));
    }

    #[test]
    fn small_amount_under_threshold_does_not_require_hil() {
        let hil = crate::config::HilConfig::default();
        let args = serde_json::json!({"amount": 10.0});
        assert!(!spec("log_payment").requires_hil_for(&args, &hil));
    }
}
