//! Applies exchange output to session state, one action at a time.
//!
//! Every event carries the sequence number it was emitted with. A message
//! only accepts the next number it expects, so a replayed or skipped event is
//! rejected instead of corrupting the transcript.

use std::error::Error;
use std::fmt;

use tracing::debug;

use crate::core::orchestrator::ExchangeEvent;
use crate::core::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    Apply {
        message_id: String,
        seq: u64,
        event: ExchangeEvent,
    },
    /// The exchange finished normally; freeze what was streamed.
    Complete { message_id: String },
    /// The exchange failed; replace the partial content with `display`.
    Fail { message_id: String, display: String },
}

impl SessionAction {
    pub fn message_id(&self) -> &str {
        match self {
            SessionAction::Apply { message_id, .. }
            | SessionAction::Complete { message_id }
            | SessionAction::Fail { message_id, .. } => message_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReduceError {
    UnknownMessage(String),
    Frozen(String),
    OutOfOrder { expected: u64, got: u64 },
}

impl fmt::Display for ReduceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReduceError::UnknownMessage(id) => write!(f, "no message with id {id}"),
            ReduceError::Frozen(id) => write!(f, "message {id} is no longer streaming"),
            ReduceError::OutOfOrder { expected, got } => {
                write!(f, "expected event {expected}, got {got}")
            }
        }
    }
}

impl Error for ReduceError {}

pub fn reduce(session: &mut Session, action: SessionAction) -> Result<(), ReduceError> {
    let result = apply(session, action);
    if let Err(err) = &result {
        debug!(session = %session.id(), error = %err, "Rejected session update");
    }
    result
}

fn apply(session: &mut Session, action: SessionAction) -> Result<(), ReduceError> {
    let message = session
        .message_mut(action.message_id())
        .ok_or_else(|| ReduceError::UnknownMessage(action.message_id().to_string()))?;
    if !message.is_streaming() {
        return Err(ReduceError::Frozen(message.id().to_string()));
    }

    match action {
        SessionAction::Apply { seq, event, .. } => {
            let expected = message.next_seq();
            if seq != expected {
                return Err(ReduceError::OutOfOrder { expected, got: seq });
            }
            match event {
                ExchangeEvent::TextDelta(text) => message.append_text(&text),
                ExchangeEvent::Citations(chunks) => message.append_citations(&chunks),
            }
        }
        SessionAction::Complete { .. } => message.freeze(),
        SessionAction::Fail { display, .. } => message.freeze_with(display),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{CitationChunk, Message};
    use crate::core::stream_errors::TRANSPORT_FAILURE_MESSAGE;

    fn streaming_session() -> Session {
        let mut session = Session::new("s");
        session.push_user_message(Message::user("u", "hello"));
        session.push_message(Message::streaming_placeholder("m"));
        session
    }

    fn delta(seq: u64, text: &str) -> SessionAction {
        SessionAction::Apply {
            message_id: "m".into(),
            seq,
            event: ExchangeEvent::TextDelta(text.into()),
        }
    }

    #[test]
    fn deltas_concatenate_in_emission_order() {
        let mut session = streaming_session();
        for (seq, text) in ["The ", "quick ", "fox"].iter().enumerate() {
            reduce(&mut session, delta(seq as u64, text)).expect("apply");
        }
        reduce(&mut session, SessionAction::Complete { message_id: "m".into() }).expect("complete");

        let message = session.message("m").expect("message");
        assert_eq!(message.content(), "The quick fox");
        assert!(!message.is_streaming());
    }

    #[test]
    fn replayed_and_skipped_events_are_rejected() {
        let mut session = streaming_session();
        reduce(&mut session, delta(0, "a")).expect("apply");

        assert_eq!(
            reduce(&mut session, delta(0, "a")),
            Err(ReduceError::OutOfOrder { expected: 1, got: 0 })
        );
        assert_eq!(
            reduce(&mut session, delta(2, "c")),
            Err(ReduceError::OutOfOrder { expected: 1, got: 2 })
        );
        assert_eq!(session.message("m").expect("message").content(), "a");
    }

    #[test]
    fn citations_share_the_sequence_and_are_not_deduplicated() {
        let mut session = streaming_session();
        let chunk = CitationChunk::web("https://a.example", "A");
        for seq in 0..2 {
            reduce(
                &mut session,
                SessionAction::Apply {
                    message_id: "m".into(),
                    seq,
                    event: ExchangeEvent::Citations(vec![chunk.clone()]),
                },
            )
            .expect("apply");
        }
        reduce(&mut session, delta(2, "text")).expect("apply");

        let message = session.message("m").expect("message");
        assert_eq!(message.citations(), &[chunk.clone(), chunk][..]);
        assert_eq!(message.content(), "text");
    }

    #[test]
    fn failure_discards_partial_content() {
        let mut session = streaming_session();
        reduce(&mut session, delta(0, "partial ")).expect("apply");
        reduce(&mut session, delta(1, "answer")).expect("apply");
        reduce(
            &mut session,
            SessionAction::Fail {
                message_id: "m".into(),
                display: TRANSPORT_FAILURE_MESSAGE.into(),
            },
        )
        .expect("fail");

        let message = session.message("m").expect("message");
        assert_eq!(message.content(), TRANSPORT_FAILURE_MESSAGE);
        assert!(!message.is_streaming());
    }

    #[test]
    fn frozen_messages_reject_every_action() {
        let mut session = streaming_session();
        reduce(&mut session, SessionAction::Complete { message_id: "m".into() }).expect("complete");

        assert_eq!(
            reduce(&mut session, delta(0, "late")),
            Err(ReduceError::Frozen("m".into()))
        );
        assert_eq!(
            reduce(
                &mut session,
                SessionAction::Fail {
                    message_id: "m".into(),
                    display: "x".into()
                }
            ),
            Err(ReduceError::Frozen("m".into()))
        );
        assert_eq!(
            reduce(&mut session, SessionAction::Complete { message_id: "m".into() }),
            Err(ReduceError::Frozen("m".into()))
        );
    }

    #[test]
    fn unknown_message_is_reported() {
        let mut session = streaming_session();
        assert_eq!(
            reduce(&mut session, SessionAction::Complete { message_id: "nope".into() }),
            Err(ReduceError::UnknownMessage("nope".into()))
        );
    }
}
