use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The authenticated caller driving a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub permissions: HashSet<String>,
    #[serde(default, skip_serializing)]
    pub bearer_token: Option<String>,
}

impl User {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains("*") || self.permissions.contains(permission)
    }
}

/// Locale settings carried with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    #[serde(default = "d_timezone")]
    pub timezone: String,
    #[serde(default = "d_language")]
    pub language: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            timezone: d_timezone(),
            language: d_language(),
        }
    }
}

fn d_timezone() -> String {
    "UTC".into()
}
fn d_language() -> String {
    "en".into()
}

/// Immutable for the life of a request: created at admission, carried
/// by reference through the orchestrator, retriever, and sub-agents,
/// and dropped when the response stream ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub user: User,
    pub session_id: String,
    pub request_id: String,
    #[serde(default)]
    pub locale: Locale,
}

impl RequestContext {
    pub fn new(user: User, session_id: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            user,
            session_id: session_id.into(),
            request_id: request_id.into(),
            locale: Locale::default(),
        }
    }
}
