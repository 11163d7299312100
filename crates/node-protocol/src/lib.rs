//! Chat transport protocol: the WebSocket frame contract between a
//! connected client and the gateway.
//!
//! Frames are tagged unions (`#[serde(tag = "type")]`) the same way the
//! node-sidecar protocol this crate replaces tagged its `WsMessage`
//! union — only the variants and payload shapes changed, the framing
//! idiom (one Rust enum per direction, one JSON object per frame) did
//! not.

use orc_domain::Locale;
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inbound (client → gateway)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum InboundFrame {
    #[serde(rename = "auth")]
    Auth {
        token: String,
        #[serde(default)]
        language: Option<String>,
        #[serde(default, rename = "loadBotIntro")]
        load_bot_intro: Option<bool>,
    },

    #[serde(rename = "query")]
    Query {
        query: String,
        session_id: String,
        question_answer_uuid: String,
        #[serde(default)]
        locale: Locale,
        user_id: String,
        user_name: String,
        user_agent: UserAgent,
        #[serde(default)]
        selected_docs: Vec<String>,
        #[serde(default)]
        attachments: Vec<Attachment>,
        #[serde(default)]
        context: Option<String>,
    },

    #[serde(rename = "human_input")]
    HumanInput { payload: HumanInputPayload },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAgent {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub client: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub size: u64,
    pub mime_type: String,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HumanInputPayload {
    pub interaction_id: String,
    pub session_id: String,
    /// `None` means the interaction was rejected (e.g. "Cancel" in a
    /// confirm dialog); `Some` carries the submitted form/confirm values.
    #[serde(default)]
    pub values: Option<serde_json::Value>,
}

impl HumanInputPayload {
    pub fn is_rejected(&self) -> bool {
        self.values.is_none()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outbound (gateway → client)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum OutboundFrame {
    #[serde(rename = "auth")]
    AuthResponse { payload: AuthResponsePayload },

    #[serde(rename = "suggestions")]
    Suggestions { payload: SuggestionsPayload },

    #[serde(rename = "component")]
    Component { payload: ComponentPayload },

    #[serde(rename = "ui_field_options")]
    UiFieldOptions { payload: UiFieldOptionsPayload },

    #[serde(rename = "markdown")]
    Markdown { payload: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthResponsePayload {
    pub success: bool,
    #[serde(default)]
    pub user: Option<UserInfo>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AuthResponsePayload {
    pub fn success(user: UserInfo) -> Self {
        Self { success: true, user: Some(user), error: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { success: false, user: None, error: Some(message.into()) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestionsPayload {
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiFieldOptionsPayload {
    pub field: String,
    pub options: Vec<String>,
}

/// Tagged by `component` so the three kinds of in-progress UI event
/// (progress ticks, HIL prompts, terminal errors) share one outbound
/// frame variant while still round-tripping distinctly through JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "component", rename_all = "snake_case")]
pub enum ComponentPayload {
    Progress { data: ProgressData },
    UiInteraction { data: UiInteractionData },
    Error { data: ErrorData },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressData {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiInteractionData {
    pub interaction_id: String,
    pub kind: UiInteractionKind,
    pub prompt: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub form_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UiInteractionKind {
    Confirm,
    Form,
    Choice,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorData {
    pub code: String,
    pub message: String,
}

impl OutboundFrame {
    pub fn progress(status: impl Into<String>) -> Self {
        OutboundFrame::Component {
            payload: ComponentPayload::Progress { data: ProgressData { status: status.into() } },
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        OutboundFrame::Component {
            payload: ComponentPayload::Error { data: ErrorData { code: code.into(), message: message.into() } },
        }
    }

    pub fn markdown(content: impl Into<String>) -> Self {
        OutboundFrame::Markdown { payload: content.into() }
    }

    pub fn suggestions(options: Vec<String>) -> Self {
        OutboundFrame::Suggestions { payload: SuggestionsPayload { options } }
    }
}

/// Error code used when a frame other than `auth` arrives before
/// authentication has completed, or auth itself fails.
pub const AUTH_ERROR_CODE: &str = "AUTH_ERROR";
/// Error code sent when a request is aborted by cancellation.
pub const CANCELLED_CODE: &str = "CANCELLED";

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: Serialize + for<'de> Deserialize<'de> + PartialEq + std::fmt::Debug>(value: T) {
        let json = serde_json::to_string(&value).unwrap();
        let back: T = serde_json::from_str(&json).unwrap();
        assert_eq!(value, back);
    }

    #[test]
    fn auth_frame_roundtrips() {
        roundtrip(InboundFrame::Auth { token: "t".into(), language: Some("en".into()), load_bot_intro: Some(true) });
    }

    #[test]
    fn query_frame_roundtrips() {
        roundtrip(InboundFrame::Query {
            query: "hello".into(),
            session_id: "s1".into(),
            question_answer_uuid: "qa1".into(),
            locale: Locale::default(),
            user_id: "u1".into(),
            user_name: "alice".into(),
            user_agent: UserAgent { platform: Some("web".into()), client: None },
            selected_docs: vec![],
            attachments: vec![],
            context: None,
        });
    }

    #[test]
    fn human_input_frame_roundtrips() {
        roundtrip(InboundFrame::HumanInput {
            payload: HumanInputPayload {
                interaction_id: "i1".into(),
                session_id: "s1".into(),
                values: Some(serde_json::json!({"approved": true})),
            },
        });
    }

    #[test]
    fn human_input_with_no_values_is_rejected() {
        let payload = HumanInputPayload { interaction_id: "i1".into(), session_id: "s1".into(), values: None };
        assert!(payload.is_rejected());
    }

    #[test]
    fn progress_component_roundtrips() {
        roundtrip(OutboundFrame::progress("Thinking"));
    }

    #[test]
    fn ui_interaction_component_roundtrips() {
        roundtrip(OutboundFrame::Component {
            payload: ComponentPayload::UiInteraction {
                data: UiInteractionData {
                    interaction_id: "i1".into(),
                    kind: UiInteractionKind::Confirm,
                    prompt: "Approve?".into(),
                    options: None,
                    form_schema: None,
                },
            },
        });
    }

    #[test]
    fn error_component_roundtrips() {
        roundtrip(OutboundFrame::error(AUTH_ERROR_CODE, "not authenticated"));
    }

    #[test]
    fn markdown_frame_roundtrips() {
        roundtrip(OutboundFrame::markdown("# hi"));
    }

    #[test]
    fn suggestions_frame_roundtrips() {
        roundtrip(OutboundFrame::suggestions(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn auth_response_success_and_error_roundtrip() {
        roundtrip(OutboundFrame::AuthResponse {
            payload: AuthResponsePayload::success(UserInfo {
                user_id: "u1".into(), display_name: "Alice".into(), email: None, permissions: vec![],
            }),
        });
        roundtrip(OutboundFrame::AuthResponse { payload: AuthResponsePayload::error("bad token") });
    }
}
