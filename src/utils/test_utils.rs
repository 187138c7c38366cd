use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::GenerateContentResponse;
use crate::core::chat_stream::{
    ChatTransport, ConversationHandle, OpenConversation, RawEventStream, TransportError,
    TurnInput,
};

/// One scripted answer to a `send`.
pub enum ScriptedTurn {
    Chunks(Vec<Result<GenerateContentResponse, TransportError>>),
    SendError(TransportError),
}

impl ScriptedTurn {
    pub fn chunks(chunks: Vec<GenerateContentResponse>) -> Self {
        ScriptedTurn::Chunks(chunks.into_iter().map(Ok).collect())
    }
}

/// What the scripted transport observed.
#[derive(Default)]
pub struct TransportLog {
    opened: Mutex<Vec<OpenConversation>>,
    sends: Mutex<Vec<TurnInput>>,
    released: AtomicUsize,
}

impl TransportLog {
    pub fn opened(&self) -> Vec<OpenConversation> {
        self.opened.lock().expect("opened lock").clone()
    }

    pub fn sends(&self) -> Vec<TurnInput> {
        self.sends.lock().expect("sends lock").clone()
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

/// In-memory transport that answers each `send` with the next scripted turn.
/// Sends past the end of the script get an empty stream.
pub struct ScriptedTransport {
    turns: Arc<Mutex<VecDeque<ScriptedTurn>>>,
    log: Arc<TransportLog>,
}

impl ScriptedTransport {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns.into())),
            log: Arc::new(TransportLog::default()),
        }
    }

    pub fn log(&self) -> Arc<TransportLog> {
        Arc::clone(&self.log)
    }
}

impl ChatTransport for ScriptedTransport {
    fn open(
        &self,
        request: OpenConversation,
    ) -> Result<Box<dyn ConversationHandle>, TransportError> {
        self.log.opened.lock().expect("opened lock").push(request);
        Ok(Box::new(ScriptedHandle {
            turns: Arc::clone(&self.turns),
            log: Arc::clone(&self.log),
        }))
    }
}

struct ScriptedHandle {
    turns: Arc<Mutex<VecDeque<ScriptedTurn>>>,
    log: Arc<TransportLog>,
}

#[async_trait]
impl ConversationHandle for ScriptedHandle {
    async fn send(&mut self, input: TurnInput) -> Result<RawEventStream, TransportError> {
        self.log.sends.lock().expect("sends lock").push(input);
        let next = self.turns.lock().expect("turns lock").pop_front();
        match next {
            Some(ScriptedTurn::Chunks(items)) => Ok(Box::pin(futures_util::stream::iter(items))),
            Some(ScriptedTurn::SendError(err)) => Err(err),
            None => Ok(Box::pin(futures_util::stream::empty())),
        }
    }
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.log.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn chunk_from(value: Value) -> GenerateContentResponse {
    serde_json::from_value(value).expect("valid chunk")
}

pub fn text_chunk(text: &str) -> GenerateContentResponse {
    chunk_from(json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
    }))
}

pub fn call_chunk(name: &str, args: Value, id: Option<&str>) -> GenerateContentResponse {
    let mut call = json!({"name": name, "args": args});
    if let Some(id) = id {
        call["id"] = json!(id);
    }
    chunk_from(json!({
        "candidates": [{"content": {"role": "model", "parts": [{"functionCall": call}]}}]
    }))
}

pub fn grounding_chunk(sources: &[(&str, &str)]) -> GenerateContentResponse {
    let chunks: Vec<Value> = sources
        .iter()
        .map(|(uri, title)| json!({"web": {"uri": uri, "title": title}}))
        .collect();
    chunk_from(json!({
        "candidates": [{"groundingMetadata": {"groundingChunks": chunks}}]
    }))
}
