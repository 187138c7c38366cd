mod sessions;
mod stream_errors;
mod streaming;

use super::exchange::{ExchangeParams, ExchangeTarget, ExchangeUpdate};
use super::App;
use crate::core::credentials::CredentialProvider;
use crate::core::tools::Mood;

#[derive(Debug)]
pub enum AppAction {
    SubmitMessage {
        content: String,
    },
    Exchange {
        update: ExchangeUpdate,
        target: ExchangeTarget,
    },
    NewSession,
    /// Index into the session list, newest first.
    SwitchSession {
        index: usize,
    },
    DeleteSession {
        index: usize,
    },
    SetMood {
        mood: Mood,
    },
    CancelStreaming,
    ReselectCredential,
}

pub enum AppCommand {
    SpawnExchange(ExchangeParams),
}

pub fn apply_action(
    app: &mut App,
    action: AppAction,
    credentials: &mut dyn CredentialProvider,
) -> Option<AppCommand> {
    match action {
        AppAction::SubmitMessage { content } => match app.begin_exchange(&content) {
            Ok(params) => Some(AppCommand::SpawnExchange(params)),
            Err(err) => {
                app.notify(err.to_string());
                None
            }
        },
        AppAction::Exchange { update, target } => {
            streaming::apply_exchange_update(app, update, target, credentials);
            None
        }
        AppAction::NewSession => {
            sessions::new_session(app);
            None
        }
        AppAction::SwitchSession { index } => {
            sessions::switch_session(app, index);
            None
        }
        AppAction::DeleteSession { index } => {
            sessions::delete_session(app, index);
            None
        }
        AppAction::SetMood { mood } => {
            app.mood = mood;
            app.notify(format!("Mood set to {mood}"));
            None
        }
        AppAction::CancelStreaming => {
            let session_id = app.sessions.active_id().to_string();
            if app.cancel_exchange(&session_id) {
                app.notify("Stopped the current reply");
            }
            None
        }
        AppAction::ReselectCredential => {
            match app.reselect_credential(credentials) {
                Ok(()) => app.notify("API key updated"),
                Err(err) => app.notify(format!("Key selection failed: {err}")),
            }
            None
        }
    }
}
