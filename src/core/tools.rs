//! Tools the model may call mid-stream.
//!
//! Dispatch is fire-and-forget: every call is acknowledged with the same
//! `{"result": "success"}` payload, and side effects run synchronously before
//! the acknowledgment is returned.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::api::{FunctionDeclaration, FunctionResponse};

pub const SET_MOOD_TOOL: &str = "set_mood";
pub const MEMORY_CORE_TOOL: &str = "access_memory_core";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Light,
    #[default]
    Dark,
}

impl Mood {
    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Light => "light",
            Mood::Dark => "dark",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Mood::Light),
            "dark" => Ok(Mood::Dark),
            other => Err(format!("invalid mood: {other} (expected light or dark)")),
        }
    }
}

pub type MoodCallback = Arc<dyn Fn(Mood) + Send + Sync>;

/// A function call emitted by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
    /// Always set; generated locally when the provider sent no id.
    pub call_id: String,
    /// The id the provider sent, if any. Only this one goes back on the wire.
    pub provider_id: Option<String>,
}

/// Acknowledgment sent back to the model for a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolAck {
    pub call_id: String,
    pub provider_id: Option<String>,
    pub name: String,
    pub payload: Value,
}

impl ToolAck {
    pub fn success(call: &ToolCall) -> Self {
        Self {
            call_id: call.call_id.clone(),
            provider_id: call.provider_id.clone(),
            name: call.name.clone(),
            payload: json!({ "result": "success" }),
        }
    }

    pub fn to_function_response(&self) -> FunctionResponse {
        FunctionResponse {
            id: self.provider_id.clone(),
            name: self.name.clone(),
            response: self.payload.clone(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    on_mood_change: Option<MoodCallback>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("on_mood_change", &self.on_mood_change.is_some())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mood_callback(on_mood_change: MoodCallback) -> Self {
        Self {
            on_mood_change: Some(on_mood_change),
        }
    }

    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        vec![
            FunctionDeclaration {
                name: SET_MOOD_TOOL.to_string(),
                description: "Changes the visual theme/mood of the application interface based on the emotional context of the conversation.".to_string(),
                parameters: Some(json!({
                    "type": "OBJECT",
                    "properties": {
                        "mood": {
                            "type": "STRING",
                            "description": "The mood to set. Use \"light\" for cheerful, optimistic, or clarity-focused contexts. Use \"dark\" for serious, deep, introspective, or nighttime contexts.",
                            "enum": ["light", "dark"]
                        }
                    },
                    "required": ["mood"]
                })),
            },
            FunctionDeclaration {
                name: MEMORY_CORE_TOOL.to_string(),
                description: "Signals that you are consulting the dedicated memory core of the current conversation before answering.".to_string(),
                parameters: None,
            },
        ]
    }

    pub fn dispatch(&self, call: &ToolCall) -> ToolAck {
        match call.name.as_str() {
            SET_MOOD_TOOL => self.apply_mood(call),
            MEMORY_CORE_TOOL => {
                debug!(call_id = %call.call_id, "Model accessed memory core");
            }
            other => {
                debug!(tool = other, call_id = %call.call_id, "Acknowledging unknown tool call");
            }
        }
        ToolAck::success(call)
    }

    fn apply_mood(&self, call: &ToolCall) {
        let requested = call.arguments.get("mood").and_then(Value::as_str);
        let mood = match requested.map(Mood::from_str) {
            Some(Ok(mood)) => mood,
            Some(Err(err)) => {
                warn!(call_id = %call.call_id, error = %err, "Ignoring set_mood call");
                return;
            }
            None => {
                warn!(call_id = %call.call_id, "set_mood call without a mood argument");
                return;
            }
        };

        debug!(mood = %mood, call_id = %call.call_id, "Model setting mood");
        if let Some(callback) = &self.on_mood_change {
            // A panicking host callback must not abort the exchange.
            if panic::catch_unwind(AssertUnwindSafe(|| callback(mood))).is_err() {
                warn!(mood = %mood, "Mood callback panicked");
            }
        }
    }
}
