//! Wire types for the Gemini `streamGenerateContent` endpoint.
//!
//! Only the fields the client reads or writes are modelled; everything else in
//! a provider chunk is ignored during deserialisation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    /// Opaque signature the model attaches to reasoning-bearing parts; it must be
    /// echoed back unchanged in the history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub thought: bool,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn function_response(response: FunctionResponse) -> Self {
        Self {
            function_response: Some(response),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

/// One entry of the request's `tools` array. Function declarations and the
/// built-in search grounding tool travel as separate entries.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ToolDefinition {
    FunctionDeclarations(Vec<FunctionDeclaration>),
    GoogleSearch(EmptyObject),
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct EmptyObject {}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    pub fn first_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Option<Vec<GroundingChunk>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<GroundingWeb>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct GroundingWeb {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_tools_and_system_instruction() {
        let request = GenerateContentRequest {
            contents: vec![Content::text("user", "hi")],
            tools: vec![
                ToolDefinition::FunctionDeclarations(vec![FunctionDeclaration {
                    name: "set_mood".into(),
                    description: "d".into(),
                    parameters: None,
                }]),
                ToolDefinition::GoogleSearch(EmptyObject::default()),
            ],
            system_instruction: Some(Content::text("system", "be kind")),
        };

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
                "tools": [
                    {"functionDeclarations": [{"name": "set_mood", "description": "d"}]},
                    {"googleSearch": {}}
                ],
                "systemInstruction": {"role": "system", "parts": [{"text": "be kind"}]}
            })
        );
    }

    #[test]
    fn response_chunk_reads_parts_and_grounding() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "Hello"},
                    {"functionCall": {"name": "set_mood", "args": {"mood": "dark"}}, "thoughtSignature": "sig"}
                ]},
                "groundingMetadata": {"groundingChunks": [{"web": {"uri": "https://a", "title": "A"}}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"totalTokenCount": 4}
        }"#;

        let chunk: GenerateContentResponse = serde_json::from_str(raw).expect("parse");
        let candidate = chunk.first_candidate().expect("candidate");
        let parts = &candidate.content.as_ref().expect("content").parts;
        assert_eq!(parts[0].text.as_deref(), Some("Hello"));
        let call = parts[1].function_call.as_ref().expect("call");
        assert_eq!(call.name, "set_mood");
        assert!(call.id.is_none());
        assert_eq!(parts[1].thought_signature.as_deref(), Some("sig"));
        let grounding = candidate
            .grounding_metadata
            .as_ref()
            .and_then(|meta| meta.grounding_chunks.as_ref())
            .expect("grounding");
        assert_eq!(grounding[0].web.as_ref().expect("web").uri, "https://a");
        assert_eq!(candidate.finish_reason.as_deref(), Some("STOP"));
    }
}
