//! Maps transport failures onto a closed set of user-facing error kinds.

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::chat_stream::TransportError;
use crate::core::credentials::{CredentialProvider, CredentialStatus};

pub const QUOTA_EXCEEDED_MESSAGE: &str = "⚠️ **Quota Exceeded**\n\nThe API key has exceeded its rate limit or quota. This often happens with shared keys.\n\nPlease run **moodchat auth** to use your own Google Cloud Project key with billing enabled.";

pub const ENTITY_NOT_FOUND_MESSAGE: &str = "API Key error. Please re-select your key.";

pub const TRANSPORT_FAILURE_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

const ENTITY_NOT_FOUND_MARKER: &str = "Requested entity was not found";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    QuotaExceeded,
    EntityNotFound,
    TransportFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorKind::EntityNotFound => "ENTITY_NOT_FOUND",
            ErrorKind::TransportFailure => "TRANSPORT_FAILURE",
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::QuotaExceeded => QUOTA_EXCEEDED_MESSAGE,
            ErrorKind::EntityNotFound => ENTITY_NOT_FOUND_MESSAGE,
            ErrorKind::TransportFailure => TRANSPORT_FAILURE_MESSAGE,
        }
    }
}

/// The fields classification looks at, pulled out of whatever shape the
/// failure arrived in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureDetails {
    pub message: String,
    pub code: Option<i64>,
    pub status: Option<String>,
}

impl FailureDetails {
    /// Tries a nested `error` object first, then a flat `message`, then falls
    /// back to the serialized value.
    pub fn from_value(value: &Value) -> Self {
        if let Some(error) = value.get("error").filter(|e| e.is_object()) {
            let message = error.get("message").and_then(Value::as_str);
            let code = error.get("code").and_then(code_from_value);
            let status = error
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_string);
            if message.is_some() || code.is_some() || status.is_some() {
                return Self {
                    message: message.map(str::to_string).unwrap_or_else(|| value.to_string()),
                    code,
                    status,
                };
            }
        }

        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return Self {
                message: message.to_string(),
                code: value.get("code").and_then(code_from_value),
                status: value
                    .get("status")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            };
        }

        let message = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        Self {
            message,
            ..Self::default()
        }
    }

    pub fn from_transport(err: &TransportError) -> Self {
        match err {
            TransportError::Status { status, body } => {
                let mut details = match serde_json::from_str::<Value>(body.trim()) {
                    Ok(value) => Self::from_value(&value),
                    Err(_) => Self {
                        message: body.trim().to_string(),
                        ..Self::default()
                    },
                };
                details.code.get_or_insert(i64::from(*status));
                details
            }
            TransportError::Provider(value) => Self::from_value(value),
            TransportError::Request(_) | TransportError::Stream(_) | TransportError::Decode { .. } => {
                Self {
                    message: err.to_string(),
                    ..Self::default()
                }
            }
        }
    }
}

fn code_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub details: FailureDetails,
}

impl ClassifiedError {
    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

/// First match wins: quota, then credential, then the generic kind.
pub fn classify(details: FailureDetails) -> ClassifiedError {
    let lower = details.message.to_lowercase();
    let kind = if details.code == Some(429)
        || details.status.as_deref() == Some("RESOURCE_EXHAUSTED")
        || lower.contains("quota")
        || details.message.contains("429")
    {
        ErrorKind::QuotaExceeded
    } else if details.message.contains(ENTITY_NOT_FOUND_MARKER) {
        ErrorKind::EntityNotFound
    } else {
        ErrorKind::TransportFailure
    };
    debug!(kind = kind.as_str(), code = ?details.code, status = ?details.status, "Classified failure");
    ClassifiedError { kind, details }
}

pub fn classify_transport(err: &TransportError) -> ClassifiedError {
    classify(FailureDetails::from_transport(err))
}

/// Classifies `err` and, for a rejected credential, asks `provider` for a
/// new one. `status` ends `Present` if re-selection succeeded and stays
/// `Missing` if it did not.
pub fn resolve_failure(
    err: &TransportError,
    provider: &mut dyn CredentialProvider,
    status: &mut CredentialStatus,
) -> ClassifiedError {
    let classified = classify_transport(err);
    if classified.kind == ErrorKind::EntityNotFound {
        *status = CredentialStatus::Missing;
        match provider.select_credential() {
            Ok(()) => {
                debug!("Credential re-selected after rejection");
                *status = CredentialStatus::Present;
            }
            Err(err) => {
                warn!(error = %err, "Credential re-selection failed");
            }
        }
    }
    classified
}
