use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Model,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::System => "system",
        }
    }

    /// Role name understood by the provider, or `None` for transcript-only roles.
    pub fn to_api_role(self) -> Option<&'static str> {
        match self {
            Role::User => Some("user"),
            Role::Model => Some("model"),
            Role::System => None,
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }

    pub fn is_model(self) -> bool {
        self == Role::Model
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "model" => Ok(Role::Model),
            "system" => Ok(Role::System),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebReference {
    pub uri: String,
    pub title: String,
}

/// One grounding reference attached to a model message. Chunks without a web
/// reference are kept so positions line up with what the provider sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationChunk {
    pub web: Option<WebReference>,
}

impl CitationChunk {
    pub fn web(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            web: Some(WebReference {
                uri: uri.into(),
                title: title.into(),
            }),
        }
    }
}

/// A transcript entry.
///
/// Content and citations can only change while `streaming` is set, and only
/// through the reducer. Once the flag is cleared the message is frozen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    id: String,
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
    streaming: bool,
    citations: Vec<CitationChunk>,
    #[serde(skip)]
    next_seq: u64,
}

impl Message {
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            streaming: false,
            citations: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content)
    }

    /// Empty model message that accepts stream updates until frozen.
    pub fn streaming_placeholder(id: impl Into<String>) -> Self {
        Self {
            streaming: true,
            ..Self::new(id, Role::Model, String::new())
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn citations(&self) -> &[CitationChunk] {
        &self.citations
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn is_model(&self) -> bool {
        self.role.is_model()
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub(crate) fn append_text(&mut self, text: &str) {
        self.content.push_str(text);
        self.next_seq += 1;
    }

    pub(crate) fn append_citations(&mut self, chunks: &[CitationChunk]) {
        self.citations.extend_from_slice(chunks);
        self.next_seq += 1;
    }

    pub(crate) fn freeze(&mut self) {
        self.streaming = false;
    }

    pub(crate) fn freeze_with(&mut self, content: String) {
        self.content = content;
        self.streaming = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_role_strings_are_rejected() {
        assert!(Role::try_from("assistant").is_err());
        assert_eq!(Role::try_from("model"), Ok(Role::Model));
    }

    #[test]
    fn system_role_is_not_sent_to_the_api() {
        assert_eq!(Role::System.to_api_role(), None);
        assert_eq!(Role::User.to_api_role(), Some("user"));
    }

    #[test]
    fn placeholder_starts_streaming_and_empty() {
        let message = Message::streaming_placeholder("m1");
        assert!(message.is_streaming());
        assert!(message.is_model());
        assert!(message.content().is_empty());
        assert!(message.citations().is_empty());
    }

    #[test]
    fn role_round_trips_through_serde_as_string() {
        let message = Message::user("u1", "hi");
        let json = serde_json::to_value(&message).expect("serialize");
        assert_eq!(json["role"], "user");
        let back: Message = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.role(), Role::User);
    }
}
