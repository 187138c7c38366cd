use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::constants::{
    DEFAULT_SESSION_ID, DEFAULT_SESSION_TITLE, TITLE_MAX_CHARS, WELCOME_MESSAGE,
};
use crate::core::message::Message;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Time-based id with a process-wide counter so ids created within the same
/// millisecond never collide.
pub fn next_id(prefix: &str) -> String {
    let n = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let millis = Utc::now().timestamp_millis();
    if prefix.is_empty() {
        format!("{millis}-{n}")
    } else {
        format!("{prefix}-{millis}-{n}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    id: String,
    title: String,
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
}

impl Session {
    /// A session seeded with the welcome message, so `messages` is never empty.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            messages: vec![Message::new(
                next_id("welcome"),
                crate::core::message::Role::Model,
                WELCOME_MESSAGE,
            )],
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id() == id)
    }

    pub(crate) fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id() == id)
    }

    pub fn has_user_messages(&self) -> bool {
        self.messages.iter().any(Message::is_user)
    }

    pub fn is_streaming(&self) -> bool {
        self.messages.iter().any(Message::is_streaming)
    }

    /// Appends the user's message, deriving the title first if this is the
    /// session's first real user message.
    pub(crate) fn push_user_message(&mut self, message: Message) {
        if !self.has_user_messages() {
            self.title = derive_title(message.content());
        }
        self.messages.push(message);
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }
}

pub fn derive_title(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Ordered session list (newest first) with one active session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Vec<Session>,
    active_id: String,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: vec![Session::new(DEFAULT_SESSION_ID)],
            active_id: DEFAULT_SESSION_ID.to_string(),
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active(&self) -> &Session {
        self.get(&self.active_id).unwrap_or(&self.sessions[0])
    }

    pub(crate) fn active_mut(&mut self) -> &mut Session {
        let index = self
            .sessions
            .iter()
            .position(|s| s.id == self.active_id)
            .unwrap_or(0);
        &mut self.sessions[index]
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    /// Creates a fresh session, puts it at the front, and makes it active.
    pub fn create_session(&mut self) -> &Session {
        let session = Session::new(next_id(""));
        self.active_id = session.id.clone();
        self.sessions.insert(0, session);
        &self.sessions[0]
    }

    pub fn switch_to(&mut self, id: &str) -> bool {
        if self.get(id).is_some() {
            self.active_id = id.to_string();
            true
        } else {
            false
        }
    }

    /// Removes a session. Deleting the last one swaps in a fresh default
    /// session in the same call, so the store is never empty.
    pub fn delete_session(&mut self, id: &str) -> bool {
        let Some(index) = self.sessions.iter().position(|s| s.id == id) else {
            return false;
        };

        if self.sessions.len() == 1 {
            let replacement = Session::new(next_id(""));
            self.active_id = replacement.id.clone();
            self.sessions = vec![replacement];
            return true;
        }

        self.sessions.remove(index);
        if self.active_id == id {
            self.active_id = self.sessions[0].id.clone();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_seeded_with_welcome_message() {
        let session = Session::new("s");
        assert_eq!(session.messages().len(), 1);
        assert!(session.messages()[0].is_model());
        assert_eq!(session.messages()[0].content(), WELCOME_MESSAGE);
        assert_eq!(session.title(), DEFAULT_SESSION_TITLE);
    }

    #[test]
    fn title_is_derived_once_from_first_user_message() {
        let mut session = Session::new("s");
        session.push_user_message(Message::user("u1", "Tell me about synthetic sociology today"));
        assert_eq!(session.title(), "Tell me about synthetic sociol...");

        session.push_user_message(Message::user("u2", "Something else"));
        assert_eq!(session.title(), "Tell me about synthetic sociol...");
    }

    #[test]
    fn short_titles_are_not_ellipsized() {
        assert_eq!(derive_title("Hi"), "Hi");
        assert_eq!(derive_title(&"x".repeat(30)), "x".repeat(30));
        assert_eq!(derive_title("héllo wörld ünïcode çharacters!"), "héllo wörld ünïcode çharacters...");
    }

    #[test]
    fn create_session_prepends_and_activates() {
        let mut store = SessionStore::new();
        let id = store.create_session().id().to_string();
        assert_eq!(store.len(), 2);
        assert_eq!(store.sessions()[0].id(), id);
        assert_eq!(store.active_id(), id);
    }

    #[test]
    fn deleting_last_session_replaces_it() {
        let mut store = SessionStore::new();
        assert!(store.delete_session(DEFAULT_SESSION_ID));
        assert_eq!(store.len(), 1);
        assert_ne!(store.active_id(), DEFAULT_SESSION_ID);
        assert_eq!(store.active().messages().len(), 1);
    }

    #[test]
    fn deleting_active_session_activates_first_remaining() {
        let mut store = SessionStore::new();
        let newer = store.create_session().id().to_string();
        assert!(store.delete_session(&newer));
        assert_eq!(store.len(), 1);
        assert_eq!(store.active_id(), DEFAULT_SESSION_ID);
    }

    #[test]
    fn deleting_inactive_session_keeps_active() {
        let mut store = SessionStore::new();
        let newer = store.create_session().id().to_string();
        assert!(store.delete_session(DEFAULT_SESSION_ID));
        assert_eq!(store.active_id(), newer);
        assert!(!store.delete_session("missing"));
    }

    #[test]
    fn ids_are_unique_within_a_millisecond() {
        let a = next_id("m");
        let b = next_id("m");
        assert_ne!(a, b);
    }
}
