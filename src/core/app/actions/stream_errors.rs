use tracing::warn;

use crate::core::app::exchange::ExchangeTarget;
use crate::core::app::App;
use crate::core::credentials::{CredentialProvider, CredentialStatus};
use crate::core::orchestrator::ExchangeError;
use crate::core::reducer::{reduce, SessionAction};
use crate::core::stream_errors::{resolve_failure, ErrorKind};

/// Freezes the target message with the classified message. A rejected key
/// also triggers re-selection through `credentials`.
pub(super) fn handle_exchange_failure(
    app: &mut App,
    err: ExchangeError,
    target: ExchangeTarget,
    credentials: &mut dyn CredentialProvider,
) {
    warn!(session = %target.session_id, error = %err, "Exchange failed");
    app.finish_exchange(&target);

    let classified = resolve_failure(err.transport(), credentials, &mut app.credential_status);
    if let Some(session) = app.sessions.get_mut(&target.session_id) {
        let _ = reduce(
            session,
            SessionAction::Fail {
                message_id: target.message_id,
                display: classified.user_message().to_string(),
            },
        );
    }

    if classified.kind == ErrorKind::EntityNotFound {
        match app.credential_status {
            CredentialStatus::Present => app.notify("API key updated. Send your message again."),
            _ => app.notify("No API key selected. Use /key to choose one."),
        }
    }
}
