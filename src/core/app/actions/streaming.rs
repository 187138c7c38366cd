use super::stream_errors::handle_exchange_failure;
use crate::core::app::exchange::{ExchangeTarget, ExchangeUpdate};
use tracing::debug;

use crate::core::app::App;
use crate::core::credentials::CredentialProvider;
use crate::core::reducer::{reduce, SessionAction};

pub(super) fn apply_exchange_update(
    app: &mut App,
    update: ExchangeUpdate,
    target: ExchangeTarget,
    credentials: &mut dyn CredentialProvider,
) {
    // A cancelled or deleted exchange may still have updates in flight. Their
    // side effects must not reach the app.
    if matches!(update, ExchangeUpdate::MoodChanged(_) | ExchangeUpdate::Failed(_))
        && !app.is_active_exchange(&target)
    {
        debug!(
            session = %target.session_id,
            message = %target.message_id,
            "Dropping update from an inactive exchange"
        );
        return;
    }

    let action = match update {
        ExchangeUpdate::Event { seq, event } => SessionAction::Apply {
            message_id: target.message_id.clone(),
            seq,
            event,
        },
        ExchangeUpdate::MoodChanged(mood) => {
            if app.mood != mood {
                app.mood = mood;
                app.notify(format!("Mood shifted to {mood}"));
            }
            return;
        }
        ExchangeUpdate::Completed => {
            app.finish_exchange(&target);
            SessionAction::Complete {
                message_id: target.message_id.clone(),
            }
        }
        ExchangeUpdate::Failed(err) => {
            handle_exchange_failure(app, err, target, credentials);
            return;
        }
    };

    // Updates for a deleted session have nowhere to go.
    if let Some(session) = app.sessions.get_mut(&target.session_id) {
        let _ = reduce(session, action);
    }
}
