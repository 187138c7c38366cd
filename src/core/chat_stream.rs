use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use memchr::memchr;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{
    Content, EmptyObject, FunctionDeclaration, GenerateContentRequest, GenerateContentResponse,
    Part, ToolDefinition,
};
use crate::core::message::{CitationChunk, Message, WebReference};
use crate::core::tools::{ToolAck, ToolCall};
use crate::utils::url::stream_generate_url;

/// Transport-normalized event. Provider chunks are reduced to this closed set
/// at the seam so nothing downstream inspects provider shapes.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    Citations(Vec<CitationChunk>),
    ToolInvocation(ToolCall),
}

pub type RawEventStream =
    Pin<Box<dyn Stream<Item = Result<GenerateContentResponse, TransportError>> + Send>>;

/// What a single `send` carries: either the user's text or the acknowledgment
/// for one tool call.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnInput {
    Text(String),
    ToolAck(ToolAck),
}

impl TurnInput {
    pub fn into_content(self) -> Content {
        match self {
            TurnInput::Text(text) => Content::text("user", text),
            TurnInput::ToolAck(ack) => Content {
                role: "user".to_string(),
                parts: vec![Part::function_response(ack.to_function_response())],
            },
        }
    }
}

/// Everything needed to open a conversation handle.
#[derive(Clone, Debug)]
pub struct OpenConversation {
    pub history: Vec<Message>,
    pub system_prompt: Option<String>,
    pub tools: Vec<FunctionDeclaration>,
}

pub trait ChatTransport: Send + Sync {
    fn open(&self, request: OpenConversation)
        -> Result<Box<dyn ConversationHandle>, TransportError>;
}

/// A conversation context that survives several `send` calls. Dropping the
/// handle releases it.
#[async_trait]
pub trait ConversationHandle: Send {
    async fn send(&mut self, input: TurnInput) -> Result<RawEventStream, TransportError>;
}

#[derive(Debug)]
pub enum TransportError {
    /// The request could not be sent.
    Request(reqwest::Error),
    /// The provider answered with a non-success status.
    Status { status: u16, body: String },
    /// The response body failed while streaming.
    Stream(reqwest::Error),
    /// The provider delivered an error object inside the stream.
    Provider(Value),
    /// A stream payload was not valid JSON or did not match the chunk shape.
    Decode {
        payload: String,
        source: serde_json::Error,
    },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Request(err) => write!(f, "request failed: {err}"),
            TransportError::Status { status, body } => {
                write!(f, "provider returned HTTP {status}: {}", body.trim())
            }
            TransportError::Stream(err) => write!(f, "stream interrupted: {err}"),
            TransportError::Provider(value) => write!(f, "provider error: {value}"),
            TransportError::Decode { source, .. } => {
                write!(f, "failed to decode stream payload: {source}")
            }
        }
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TransportError::Request(err) | TransportError::Stream(err) => Some(err),
            TransportError::Decode { source, .. } => Some(source),
            TransportError::Status { .. } | TransportError::Provider(_) => None,
        }
    }
}

/// Pulls events out of provider chunks, in the order the provider sent them:
/// grounding first, then each content part.
#[derive(Debug, Default)]
pub struct EventExtractor {
    generated_ids: u64,
}

impl EventExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(&mut self, chunk: &GenerateContentResponse) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let Some(candidate) = chunk.first_candidate() else {
            return events;
        };

        if let Some(grounding) = candidate
            .grounding_metadata
            .as_ref()
            .and_then(|meta| meta.grounding_chunks.as_ref())
        {
            let citations = grounding
                .iter()
                .map(|chunk| CitationChunk {
                    web: chunk.web.as_ref().map(|web| WebReference {
                        uri: web.uri.clone(),
                        title: web.title.clone(),
                    }),
                })
                .collect();
            events.push(StreamEvent::Citations(citations));
        }

        let parts = candidate
            .content
            .as_ref()
            .map(|content| content.parts.as_slice())
            .unwrap_or_default();
        for part in parts {
            if let Some(call) = &part.function_call {
                let provider_id = call.id.clone().filter(|id| !id.is_empty());
                let call_id = match &provider_id {
                    Some(id) => id.clone(),
                    None => {
                        self.generated_ids += 1;
                        format!("call-{}", self.generated_ids)
                    }
                };
                events.push(StreamEvent::ToolInvocation(ToolCall {
                    name: call.name.clone(),
                    arguments: call.args.clone(),
                    call_id,
                    provider_id,
                }));
            }
            if part.thought {
                continue;
            }
            if let Some(text) = part.text.as_deref().filter(|text| !text.is_empty()) {
                events.push(StreamEvent::TextDelta(text.to_string()));
            }
        }

        events
    }
}

/// Maps transcript messages onto provider turns. Transcript-only roles and
/// empty messages are not sent.
pub fn format_history(messages: &[Message]) -> Vec<Content> {
    messages
        .iter()
        .filter(|msg| !msg.content().is_empty())
        .filter_map(|msg| {
            msg.role()
                .to_api_role()
                .map(|role| Content::text(role, msg.content()))
        })
        .collect()
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn parse_data_payload(payload: &str) -> Option<Result<GenerateContentResponse, TransportError>> {
    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(source) => {
            return Some(Err(TransportError::Decode {
                payload: payload.to_string(),
                source,
            }))
        }
    };

    if value.get("error").is_some() {
        return Some(Err(TransportError::Provider(value)));
    }

    Some(
        serde_json::from_value(value).map_err(|source| TransportError::Decode {
            payload: payload.to_string(),
            source,
        }),
    )
}

/// Incremental SSE line decoder. Bytes may split lines (and UTF-8 sequences)
/// anywhere; only complete lines are decoded.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<GenerateContentResponse, TransportError>> {
        self.buffer.extend_from_slice(bytes);
        let mut items = Vec::new();

        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(item) = Self::decode_line(&line[..newline_pos]) {
                let failed = item.is_err();
                items.push(item);
                if failed {
                    self.buffer.clear();
                    break;
                }
            }
        }

        items
    }

    /// Decodes a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Option<Result<GenerateContentResponse, TransportError>> {
        let rest = std::mem::take(&mut self.buffer);
        Self::decode_line(&rest)
    }

    fn decode_line(line: &[u8]) -> Option<Result<GenerateContentResponse, TransportError>> {
        let line = match std::str::from_utf8(line) {
            Ok(line) => line.trim(),
            Err(err) => {
                warn!(error = %err, "Skipping invalid UTF-8 line in stream");
                return None;
            }
        };
        extract_data_payload(line).and_then(parse_data_payload)
    }
}

struct SseState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<GenerateContentResponse, TransportError>>,
    finished: bool,
}

/// Turns a byte stream into provider chunks. The stream ends after the first
/// failure.
pub fn decode_sse<S, B>(body: S) -> RawEventStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.pending.clear();
                    state.finished = true;
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => state.pending.extend(state.decoder.push(bytes.as_ref())),
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(TransportError::Stream(err)), state));
                }
                None => {
                    state.finished = true;
                    state.pending.extend(state.decoder.finish());
                }
            }
        }
    }))
}

/// Gemini transport. Requests go to `streamGenerateContent` with SSE framing.
#[derive(Clone)]
pub struct GeminiTransport {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl fmt::Debug for GeminiTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiTransport")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiTransport {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub fn endpoint(&self) -> String {
        stream_generate_url(&self.base_url, &self.model)
    }
}

impl ChatTransport for GeminiTransport {
    fn open(
        &self,
        request: OpenConversation,
    ) -> Result<Box<dyn ConversationHandle>, TransportError> {
        let mut tools = Vec::new();
        if !request.tools.is_empty() {
            tools.push(ToolDefinition::FunctionDeclarations(request.tools));
        }
        tools.push(ToolDefinition::GoogleSearch(EmptyObject::default()));

        let history = format_history(&request.history);
        debug!(model = %self.model, turns = history.len(), "Opened Gemini conversation");

        Ok(Box::new(GeminiConversation {
            client: self.client.clone(),
            endpoint: self.endpoint(),
            api_key: self.api_key.clone(),
            system_instruction: request
                .system_prompt
                .map(|prompt| Content::text("system", prompt)),
            tools,
            history,
            model_turn: Arc::new(Mutex::new(Vec::new())),
        }))
    }
}

/// Client-side conversation context. The model's streamed parts are recorded
/// while the caller drains a turn and committed to the history on the next
/// send, so follow-up sends only carry the new input.
pub struct GeminiConversation {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    system_instruction: Option<Content>,
    tools: Vec<ToolDefinition>,
    history: Vec<Content>,
    model_turn: Arc<Mutex<Vec<Part>>>,
}

impl GeminiConversation {
    fn commit_model_turn(&mut self) {
        let parts = match self.model_turn.lock() {
            Ok(mut parts) => std::mem::take(&mut *parts),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        if !parts.is_empty() {
            self.history.push(Content {
                role: "model".to_string(),
                parts,
            });
        }
    }
}

fn record_model_parts(recorder: &Mutex<Vec<Part>>, chunk: &GenerateContentResponse) {
    let Some(content) = chunk
        .first_candidate()
        .and_then(|candidate| candidate.content.as_ref())
    else {
        return;
    };
    if let Ok(mut parts) = recorder.lock() {
        parts.extend(content.parts.iter().cloned());
    }
}

#[async_trait]
impl ConversationHandle for GeminiConversation {
    async fn send(&mut self, input: TurnInput) -> Result<RawEventStream, TransportError> {
        self.commit_model_turn();
        self.history.push(input.into_content());

        let request = GenerateContentRequest {
            contents: self.history.clone(),
            tools: self.tools.clone(),
            system_instruction: self.system_instruction.clone(),
        };

        debug!(endpoint = %self.endpoint, turns = request.contents.len(), "Sending Gemini request");
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(TransportError::Request)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(TransportError::Status { status, body });
        }

        let recorder = Arc::clone(&self.model_turn);
        let stream = decode_sse(response.bytes_stream()).inspect(move |item| {
            if let Ok(chunk) = item {
                record_model_parts(&recorder, chunk);
            }
        });
        Ok(Box::pin(stream))
    }
}

impl Drop for GeminiConversation {
    fn drop(&mut self) {
        debug!(turns = self.history.len(), "Released Gemini conversation handle");
    }
}
