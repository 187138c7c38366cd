//! Host-side conversation state: the session store, the current mood, and
//! the credential status. Exchange output reaches it only through
//! [`actions::apply_action`].

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::config::data::Config;
use crate::core::credentials::{CredentialError, CredentialProvider, CredentialStatus};
use crate::core::message::Message;
use crate::core::orchestrator::ExchangeRequest;
use crate::core::reducer::{reduce, SessionAction};
use crate::core::session::{next_id, Session, SessionStore};
use crate::core::tools::Mood;

pub mod actions;
pub mod exchange;

pub use actions::{apply_action, AppAction, AppCommand};
pub use exchange::{ExchangeParams, ExchangeReceiver, ExchangeService, ExchangeTarget, ExchangeUpdate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    Empty,
    /// The session already has a reply streaming.
    Busy { session_id: String },
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Empty => write!(f, "Cannot send an empty message"),
            SubmitError::Busy { .. } => {
                write!(f, "Wait for the current reply to finish before sending")
            }
        }
    }
}

impl Error for SubmitError {}

struct ActiveExchange {
    message_id: String,
    cancel_token: CancellationToken,
}

pub struct App {
    sessions: SessionStore,
    mood: Mood,
    credential_status: CredentialStatus,
    system_prompt: Option<String>,
    exchanges: HashMap<String, ActiveExchange>,
    notices: Vec<String>,
}

impl App {
    pub fn new(config: &Config) -> Self {
        Self {
            sessions: SessionStore::new(),
            mood: config.effective_mood(),
            credential_status: CredentialStatus::Unknown,
            system_prompt: Some(config.effective_system_prompt().to_string()),
            exchanges: HashMap::new(),
            notices: Vec::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn active_session(&self) -> &Session {
        self.sessions.active()
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn credential_status(&self) -> CredentialStatus {
        self.credential_status
    }

    pub fn set_credential_status(&mut self, status: CredentialStatus) {
        self.credential_status = status;
    }

    pub fn is_streaming(&self) -> bool {
        self.sessions.active().is_streaming()
    }

    /// Messages queued for the user since the last call.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, notice: impl Into<String>) {
        self.notices.push(notice.into());
    }

    /// Records the user's message and a streaming placeholder in the active
    /// session, returning what the exchange needs. The history passed along
    /// is the session as it was before this message.
    pub fn begin_exchange(&mut self, content: &str) -> Result<ExchangeParams, SubmitError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SubmitError::Empty);
        }

        let session_id = self.sessions.active_id().to_string();
        let system_prompt = self.system_prompt.clone();
        let session = self.sessions.active_mut();
        if session.is_streaming() {
            return Err(SubmitError::Busy { session_id });
        }

        let history = session.messages().to_vec();
        let message_id = next_id("model");
        session.push_user_message(Message::user(next_id("user"), content));
        session.push_message(Message::streaming_placeholder(message_id.clone()));

        let cancel_token = CancellationToken::new();
        self.exchanges.insert(
            session_id.clone(),
            ActiveExchange {
                message_id: message_id.clone(),
                cancel_token: cancel_token.clone(),
            },
        );
        debug!(session = %session_id, message = %message_id, "Starting exchange");

        Ok(ExchangeParams {
            target: ExchangeTarget {
                session_id,
                message_id,
            },
            request: ExchangeRequest {
                history,
                content: content.to_string(),
                system_prompt,
            },
            cancel_token,
        })
    }

    /// Stops the exchange running in `session_id`, if any, and freezes what it
    /// streamed so far. Returns whether an exchange was running.
    pub fn cancel_exchange(&mut self, session_id: &str) -> bool {
        let Some(active) = self.exchanges.remove(session_id) else {
            return false;
        };
        active.cancel_token.cancel();
        if let Some(session) = self.sessions.get_mut(session_id) {
            let _ = reduce(
                session,
                SessionAction::Complete {
                    message_id: active.message_id,
                },
            );
        }
        true
    }

    /// Whether `target` is the exchange currently running in its session.
    pub fn is_active_exchange(&self, target: &ExchangeTarget) -> bool {
        self.exchanges
            .get(&target.session_id)
            .is_some_and(|active| active.message_id == target.message_id)
    }

    fn finish_exchange(&mut self, target: &ExchangeTarget) {
        if self.is_active_exchange(target) {
            self.exchanges.remove(&target.session_id);
        }
    }

    /// Explicit re-selection, outside any exchange.
    pub fn reselect_credential(
        &mut self,
        provider: &mut dyn CredentialProvider,
    ) -> Result<(), CredentialError> {
        match provider.select_credential() {
            Ok(()) => {
                self.credential_status = CredentialStatus::Present;
                Ok(())
            }
            Err(err) => {
                self.credential_status = CredentialStatus::from_presence(provider.has_credential());
                Err(err)
            }
        }
    }
}
