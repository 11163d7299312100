//! Orchestrator-facing conversation store: sessions, messages, checkpoints.
//!
//! Distinct from [`crate::store::SessionStore`], which tracks gateway
//! channel routing and token counters keyed by `session_key`. This store
//! tracks agent-facing conversation state addressed directly by
//! `session_id`, as used by the transport protocol and orchestrator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orc_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An orchestrator-facing conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub agent_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A single stored conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A point-in-time snapshot of orchestrator state for a `(session_id, thread_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub session_id: String,
    pub thread_id: String,
    pub state: serde_json::Value,
    #[serde(default)]
    pub parent_checkpoint_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Repository interface implemented by both the disk-backed
/// [`ConversationStore`] and the in-memory [`MockSessionStore`] test double.
pub trait SessionRepository: Send + Sync {
    fn get(&self, session_id: &str) -> Option<Session>;

    fn get_or_create(
        &self,
        session_id: &str,
        user_id: &str,
        agent_type: &str,
        ttl_hours: Option<u32>,
    ) -> Session;

    fn save(&self, session: Session);

    fn add_message(&self, session_id: &str, msg: StoredMessage) -> Result<Uuid>;

    fn get_messages(
        &self,
        session_id: &str,
        limit: Option<usize>,
        since: Option<DateTime<Utc>>,
    ) -> Vec<StoredMessage>;

    fn delete(&self, session_id: &str) -> bool;

    fn cleanup_expired(&self) -> usize;

    fn create_checkpoint(
        &self,
        session_id: &str,
        thread_id: &str,
        state: serde_json::Value,
        parent: Option<String>,
        metadata: serde_json::Value,
    ) -> Checkpoint;

    fn get_latest_checkpoint(&self, session_id: &str, thread_id: &str) -> Option<Checkpoint>;

    fn list_sessions(
        &self,
        user_id: Option<&str>,
        agent_type: Option<&str>,
        limit: usize,
    ) -> Vec<Session>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Disk-backed store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// JSON-file-backed conversation store, persisted under
/// `state_path/sessions/{conversations,messages,checkpoints}.json`.
pub struct ConversationStore {
    conversations_path: PathBuf,
    messages_path: PathBuf,
    checkpoints_path: PathBuf,
    max_messages_per_session: usize,

    conversations: RwLock<HashMap<String, Session>>,
    messages: RwLock<HashMap<String, Vec<StoredMessage>>>,
    checkpoints: RwLock<HashMap<(String, String), Vec<Checkpoint>>>,
}

impl ConversationStore {
    /// Load or create the conversation store at `state_path/sessions/`.
    pub fn new(state_path: &Path, max_messages_per_session: usize) -> Result<Self> {
        let dir = state_path.join("sessions");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;

        let conversations_path = dir.join("conversations.json");
        let messages_path = dir.join("messages.json");
        let checkpoints_path = dir.join("checkpoints.json");

        let conversations = load_json(&conversations_path)?.unwrap_or_default();
        let messages = load_json(&messages_path)?.unwrap_or_default();
        let flat_checkpoints: Vec<Checkpoint> =
            load_json(&checkpoints_path)?.unwrap_or_default();
        let mut checkpoints: HashMap<(String, String), Vec<Checkpoint>> = HashMap::new();
        for cp in flat_checkpoints {
            checkpoints
                .entry((cp.session_id.clone(), cp.thread_id.clone()))
                .or_default()
                .push(cp);
        }

        Ok(Self {
            conversations_path,
            messages_path,
            checkpoints_path,
            max_messages_per_session,
            conversations: RwLock::new(conversations),
            messages: RwLock::new(messages),
            checkpoints: RwLock::new(checkpoints),
        })
    }

    /// Persist all three tables to disk.
    pub fn flush(&self) -> Result<()> {
        write_json(&self.conversations_path, &*self.conversations.read())?;
        write_json(&self.messages_path, &*self.messages.read())?;
        let checkpoints = self.checkpoints.read();
        let flat: Vec<&Checkpoint> = checkpoints.values().flat_map(|v| v.iter()).collect();
        write_json(&self.checkpoints_path, &flat)?;
        Ok(())
    }
}

impl SessionRepository for ConversationStore {
    fn get(&self, session_id: &str) -> Option<Session> {
        self.conversations.read().get(session_id).cloned()
    }

    fn get_or_create(
        &self,
        session_id: &str,
        user_id: &str,
        agent_type: &str,
        ttl_hours: Option<u32>,
    ) -> Session {
        if let Some(existing) = self.conversations.read().get(session_id) {
            return existing.clone();
        }

        let now = Utc::now();
        let session = Session {
            session_id: session_id.to_owned(),
            user_id: user_id.to_owned(),
            agent_type: agent_type.to_owned(),
            created_at: now,
            updated_at: now,
            expires_at: ttl_hours.map(|h| now + chrono::Duration::hours(h as i64)),
            metadata: serde_json::Value::Null,
        };

        self.conversations
            .write()
            .insert(session_id.to_owned(), session.clone());
        session
    }

    fn save(&self, mut session: Session) {
        session.updated_at = Utc::now();
        self.conversations
            .write()
            .insert(session.session_id.clone(), session);
    }

    fn add_message(&self, session_id: &str, msg: StoredMessage) -> Result<Uuid> {
        if self.conversations.read().get(session_id).is_none() {
            return Err(Error::Validation(format!(
                "no session found for id '{session_id}'"
            )));
        }

        let mut messages = self.messages.write();
        let entry = messages.entry(session_id.to_owned()).or_default();
        if entry.len() >= self.max_messages_per_session {
            return Err(Error::Validation(format!(
                "session '{session_id}' has reached the maximum of {} messages",
                self.max_messages_per_session
            )));
        }

        let id = msg.id;
        entry.push(msg);
        drop(messages);

        if let Some(session) = self.conversations.write().get_mut(session_id) {
            session.updated_at = Utc::now();
        }

        Ok(id)
    }

    fn get_messages(
        &self,
        session_id: &str,
        limit: Option<usize>,
        since: Option<DateTime<Utc>>,
    ) -> Vec<StoredMessage> {
        let messages = self.messages.read();
        let Some(all) = messages.get(session_id) else {
            return Vec::new();
        };

        let filtered: Vec<StoredMessage> = all
            .iter()
            .filter(|m| since.map(|s| m.created_at >= s).unwrap_or(true))
            .cloned()
            .collect();

        match limit {
            Some(n) if filtered.len() > n => filtered[filtered.len() - n..].to_vec(),
            _ => filtered,
        }
    }

    fn delete(&self, session_id: &str) -> bool {
        let removed = self.conversations.write().remove(session_id).is_some();
        self.messages.write().remove(session_id);
        self.checkpoints
            .write()
            .retain(|(sid, _), _| sid != session_id);
        removed
    }

    fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut conversations = self.conversations.write();
        let expired: Vec<String> = conversations
            .iter()
            .filter(|(_, s)| s.expires_at.map(|exp| exp < now).unwrap_or(false))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            conversations.remove(id);
        }
        drop(conversations);

        for id in &expired {
            self.messages.write().remove(id);
            self.checkpoints.write().retain(|(sid, _), _| sid != id);
        }

        expired.len()
    }

    fn create_checkpoint(
        &self,
        session_id: &str,
        thread_id: &str,
        state: serde_json::Value,
        parent: Option<String>,
        metadata: serde_json::Value,
    ) -> Checkpoint {
        let effective_parent =
            parent.or_else(|| self.get_latest_checkpoint(session_id, thread_id).map(|c| c.id));

        let checkpoint = Checkpoint {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_owned(),
            thread_id: thread_id.to_owned(),
            state,
            parent_checkpoint_id: effective_parent,
            metadata,
            created_at: Utc::now(),
        };

        self.checkpoints
            .write()
            .entry((session_id.to_owned(), thread_id.to_owned()))
            .or_default()
            .push(checkpoint.clone());

        checkpoint
    }

    fn get_latest_checkpoint(&self, session_id: &str, thread_id: &str) -> Option<Checkpoint> {
        self.checkpoints
            .read()
            .get(&(session_id.to_owned(), thread_id.to_owned()))
            .and_then(|v| v.last().cloned())
    }

    fn list_sessions(
        &self,
        user_id: Option<&str>,
        agent_type: Option<&str>,
        limit: usize,
    ) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .conversations
            .read()
            .values()
            .filter(|s| user_id.map(|u| s.user_id == u).unwrap_or(true))
            .filter(|s| agent_type.map(|a| s.agent_type == a).unwrap_or(true))
            .cloned()
            .collect();

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions.truncate(limit);
        sessions
    }
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
    Ok(serde_json::from_str(&raw).unwrap_or(None))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Other(format!("serializing {}: {e}", path.display())))?;
    std::fs::write(path, json).map_err(Error::Io)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// In-memory mock
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// In-memory-only [`SessionRepository`], with no disk I/O. Backs unit and
/// integration tests for the orchestrator and protocol layers.
pub struct MockSessionStore {
    max_messages_per_session: usize,
    conversations: RwLock<HashMap<String, Session>>,
    messages: RwLock<HashMap<String, Vec<StoredMessage>>>,
    checkpoints: RwLock<HashMap<(String, String), Vec<Checkpoint>>>,
}

impl MockSessionStore {
    pub fn new(max_messages_per_session: usize) -> Self {
        Self {
            max_messages_per_session,
            conversations: RwLock::new(HashMap::new()),
            messages: RwLock::new(HashMap::new()),
            checkpoints: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MockSessionStore {
    fn default() -> Self {
        Self::new(500)
    }
}

impl SessionRepository for MockSessionStore {
    fn get(&self, session_id: &str) -> Option<Session> {
        self.conversations.read().get(session_id).cloned()
    }

    fn get_or_create(
        &self,
        session_id: &str,
        user_id: &str,
        agent_type: &str,
        ttl_hours: Option<u32>,
    ) -> Session {
        if let Some(existing) = self.conversations.read().get(session_id) {
            return existing.clone();
        }
        let now = Utc::now();
        let session = Session {
            session_id: session_id.to_owned(),
            user_id: user_id.to_owned(),
            agent_type: agent_type.to_owned(),
            created_at: now,
            updated_at: now,
            expires_at: ttl_hours.map(|h| now + chrono::Duration::hours(h as i64)),
            metadata: serde_json::Value::Null,
        };
        self.conversations
            .write()
            .insert(session_id.to_owned(), session.clone());
        session
    }

    fn save(&self, mut session: Session) {
        session.updated_at = Utc::now();
        self.conversations
            .write()
            .insert(session.session_id.clone(), session);
    }

    fn add_message(&self, session_id: &str, msg: StoredMessage) -> Result<Uuid> {
        if self.conversations.read().get(session_id).is_none() {
            return Err(Error::Validation(format!(
                "no session found for id '{session_id}'"
            )));
        }
        let mut messages = self.messages.write();
        let entry = messages.entry(session_id.to_owned()).or_default();
        if entry.len() >= self.max_messages_per_session {
            return Err(Error::Validation(format!(
                "session '{session_id}' has reached the maximum of {} messages",
                self.max_messages_per_session
            )));
        }
        let id = msg.id;
        entry.push(msg);
        Ok(id)
    }

    fn get_messages(
        &self,
        session_id: &str,
        limit: Option<usize>,
        since: Option<DateTime<Utc>>,
    ) -> Vec<StoredMessage> {
        let messages = self.messages.read();
        let Some(all) = messages.get(session_id) else {
            return Vec::new();
        };
        let filtered: Vec<StoredMessage> = all
            .iter()
            .filter(|m| since.map(|s| m.created_at >= s).unwrap_or(true))
            .cloned()
            .collect();
        match limit {
            Some(n) if filtered.len() > n => filtered[filtered.len() - n..].to_vec(),
            _ => filtered,
        }
    }

    fn delete(&self, session_id: &str) -> bool {
        let removed = self.conversations.write().remove(session_id).is_some();
        self.messages.write().remove(session_id);
        self.checkpoints
            .write()
            .retain(|(sid, _), _| sid != session_id);
        removed
    }

    fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut conversations = self.conversations.write();
        let expired: Vec<String> = conversations
            .iter()
            .filter(|(_, s)| s.expires_at.map(|exp| exp < now).unwrap_or(false))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            conversations.remove(id);
        }
        drop(conversations);
        for id in &expired {
            self.messages.write().remove(id);
            self.checkpoints.write().retain(|(sid, _), _| sid != id);
        }
        expired.len()
    }

    fn create_checkpoint(
        &self,
        session_id: &str,
        thread_id: &str,
        state: serde_json::Value,
        parent: Option<String>,
        metadata: serde_json::Value,
    ) -> Checkpoint {
        let effective_parent =
            parent.or_else(|| self.get_latest_checkpoint(session_id, thread_id).map(|c| c.id));
        let checkpoint = Checkpoint {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_owned(),
            thread_id: thread_id.to_owned(),
            state,
            parent_checkpoint_id: effective_parent,
            metadata,
            created_at: Utc::now(),
        };
        self.checkpoints
            .write()
            .entry((session_id.to_owned(), thread_id.to_owned()))
            .or_default()
            .push(checkpoint.clone());
        checkpoint
    }

    fn get_latest_checkpoint(&self, session_id: &str, thread_id: &str) -> Option<Checkpoint> {
        self.checkpoints
            .read()
            .get(&(session_id.to_owned(), thread_id.to_owned()))
            .and_then(|v| v.last().cloned())
    }

    fn list_sessions(
        &self,
        user_id: Option<&str>,
        agent_type: Option<&str>,
        limit: usize,
    ) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .conversations
            .read()
            .values()
            .filter(|s| user_id.map(|u| s.user_id == u).unwrap_or(true))
            .filter(|s| agent_type.map(|a| s.agent_type == a).unwrap_or(true))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions.truncate(limit);
        sessions
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(session_id: &str, content: &str) -> StoredMessage {
        StoredMessage {
            id: Uuid::new_v4(),
            session_id: session_id.to_owned(),
            role: "user".into(),
            content: content.into(),
            created_at: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let store = MockSessionStore::default();
        let a = store.get_or_create("s1", "alice", "assistant", None);
        let b = store.get_or_create("s1", "bob", "other", None);
        assert_eq!(a.session_id, b.session_id);
        assert_eq!(b.user_id, "alice");
    }

    #[test]
    fn add_message_rejects_unknown_session() {
        let store = MockSessionStore::default();
        let err = store.add_message("missing", msg("missing", "hi")).unwrap_err();
        assert!(err.to_string().contains("no session found"));
    }

    #[test]
    fn add_message_rejects_over_limit() {
        let store = MockSessionStore::new(2);
        store.get_or_create("s1", "alice", "assistant", None);
        store.add_message("s1", msg("s1", "one")).unwrap();
        store.add_message("s1", msg("s1", "two")).unwrap();
        let err = store.add_message("s1", msg("s1", "three")).unwrap_err();
        assert!(err.to_string().contains("maximum"));
    }

    #[test]
    fn get_messages_respects_limit_in_ascending_order() {
        let store = MockSessionStore::default();
        store.get_or_create("s1", "alice", "assistant", None);
        for i in 0..5 {
            store.add_message("s1", msg("s1", &i.to_string())).unwrap();
        }
        let last_two = store.get_messages("s1", Some(2), None);
        assert_eq!(
            last_two.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
            vec!["3", "4"]
        );
    }

    #[test]
    fn delete_removes_session_and_messages() {
        let store = MockSessionStore::default();
        store.get_or_create("s1", "alice", "assistant", None);
        store.add_message("s1", msg("s1", "hi")).unwrap();
        assert!(store.delete("s1"));
        assert!(store.get("s1").is_none());
        assert!(store.get_messages("s1", None, None).is_empty());
        assert!(!store.delete("s1"));
    }

    #[test]
    fn cleanup_expired_removes_only_expired_sessions() {
        let store = MockSessionStore::default();
        let mut expired = store.get_or_create("expired", "alice", "assistant", None);
        expired.expires_at = Some(Utc::now() - chrono::Duration::hours(1));
        store.save(expired);
        store.get_or_create("fresh", "bob", "assistant", Some(24));

        let removed = store.cleanup_expired();
        assert_eq!(removed, 1);
        assert!(store.get("expired").is_none());
        assert!(store.get("fresh").is_some());
    }

    #[test]
    fn checkpoints_form_a_linear_chain() {
        let store = MockSessionStore::default();
        let c1 = store.create_checkpoint(
            "s1",
            "t1",
            serde_json::json!({"step": 1}),
            None,
            serde_json::Value::Null,
        );
        assert!(c1.parent_checkpoint_id.is_none());

        let c2 = store.create_checkpoint(
            "s1",
            "t1",
            serde_json::json!({"step": 2}),
            None,
            serde_json::Value::Null,
        );
        assert_eq!(c2.parent_checkpoint_id, Some(c1.id.clone()));

        let latest = store.get_latest_checkpoint("s1", "t1").unwrap();
        assert_eq!(latest.id, c2.id);
    }

    #[test]
    fn list_sessions_filters_and_sorts_by_recency() {
        let store = MockSessionStore::default();
        store.get_or_create("a", "alice", "assistant", None);
        store.get_or_create("b", "alice", "reviewer", None);
        store.get_or_create("c", "bob", "assistant", None);

        let alice_sessions = store.list_sessions(Some("alice"), None, 10);
        assert_eq!(alice_sessions.len(), 2);

        let assistants = store.list_sessions(None, Some("assistant"), 10);
        assert_eq!(assistants.len(), 2);
    }
}
