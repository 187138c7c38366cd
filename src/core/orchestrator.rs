//! Multi-turn send-and-resolve loop.
//!
//! An [`Exchange`] sends one user message, drains the provider stream, runs
//! any tool calls through the [`ToolRegistry`], answers them on a follow-up
//! turn, and repeats until a turn produces no tool call. Callers see a lazy
//! sequence of [`ExchangeEvent`]s; tool-resolution turns are invisible except
//! that the sequence keeps going.
//!
//! ```text
//! AwaitingSend -> Streaming -> ToolPending -> Streaming -> ... -> Done
//!                     \______________\____________________________-> Failed
//! ```

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::core::chat_stream::{
    ChatTransport, ConversationHandle, EventExtractor, OpenConversation, RawEventStream,
    StreamEvent, TransportError, TurnInput,
};
use crate::core::message::{CitationChunk, Message};
use crate::core::tools::{ToolAck, ToolRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingSend,
    Streaming,
    ToolPending,
    Done,
    Failed,
}

impl TurnState {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnState::AwaitingSend => "awaiting send",
            TurnState::Streaming => "streaming",
            TurnState::ToolPending => "tool pending",
            TurnState::Done => "done",
            TurnState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TurnState::Done | TurnState::Failed)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incremental output of an exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeEvent {
    TextDelta(String),
    Citations(Vec<CitationChunk>),
}

impl ExchangeEvent {
    pub fn text(&self) -> Option<&str> {
        match self {
            ExchangeEvent::TextDelta(text) => Some(text),
            ExchangeEvent::Citations(_) => None,
        }
    }

    pub fn citations(&self) -> Option<&[CitationChunk]> {
        match self {
            ExchangeEvent::Citations(chunks) => Some(chunks),
            ExchangeEvent::TextDelta(_) => None,
        }
    }
}

/// A transport fault, tagged with the state the exchange was in.
#[derive(Debug)]
pub struct ExchangeError {
    state: TurnState,
    source: TransportError,
}

impl ExchangeError {
    pub fn new(state: TurnState, source: TransportError) -> Self {
        Self { state, source }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn transport(&self) -> &TransportError {
        &self.source
    }
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exchange failed while {}: {}", self.state, self.source)
    }
}

impl StdError for ExchangeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

pub type ExchangeStream = Pin<Box<dyn Stream<Item = Result<ExchangeEvent, ExchangeError>> + Send>>;

#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub history: Vec<Message>,
    pub content: String,
    pub system_prompt: Option<String>,
}

#[derive(Clone)]
pub struct TurnOrchestrator {
    transport: Arc<dyn ChatTransport>,
    registry: ToolRegistry,
}

impl TurnOrchestrator {
    pub fn new(transport: Arc<dyn ChatTransport>, registry: ToolRegistry) -> Self {
        Self {
            transport,
            registry,
        }
    }

    /// Prepares an exchange. Nothing is sent until the first event is pulled.
    pub fn exchange(&self, request: ExchangeRequest) -> Exchange {
        self.exchange_with_registry(request, self.registry.clone())
    }

    /// Like [`exchange`](Self::exchange) but dispatches tool calls through
    /// `registry` instead of the orchestrator's default one.
    pub fn exchange_with_registry(&self, request: ExchangeRequest, registry: ToolRegistry) -> Exchange {
        let open = OpenConversation {
            history: request.history,
            system_prompt: request.system_prompt,
            tools: registry.declarations(),
        };
        Exchange {
            phase: Phase::AwaitingSend {
                open,
                input: TurnInput::Text(request.content),
            },
            transport: Arc::clone(&self.transport),
            registry,
            extractor: EventExtractor::new(),
            queued: VecDeque::new(),
            sends: 0,
        }
    }

    pub fn run(&self, request: ExchangeRequest) -> ExchangeStream {
        self.exchange(request).into_stream()
    }
}

enum Phase {
    AwaitingSend {
        open: OpenConversation,
        input: TurnInput,
    },
    Streaming {
        handle: Box<dyn ConversationHandle>,
        raw: RawEventStream,
        acks: Vec<ToolAck>,
    },
    ToolPending {
        handle: Box<dyn ConversationHandle>,
        acks: Vec<ToolAck>,
    },
    Done,
    Failed,
}

impl Phase {
    fn state(&self) -> TurnState {
        match self {
            Phase::AwaitingSend { .. } => TurnState::AwaitingSend,
            Phase::Streaming { .. } => TurnState::Streaming,
            Phase::ToolPending { .. } => TurnState::ToolPending,
            Phase::Done => TurnState::Done,
            Phase::Failed => TurnState::Failed,
        }
    }
}

/// One send-and-resolve operation. It owns the conversation handle and the
/// current raw stream; both are dropped as soon as the exchange finishes,
/// fails, or is itself dropped.
pub struct Exchange {
    phase: Phase,
    transport: Arc<dyn ChatTransport>,
    registry: ToolRegistry,
    extractor: EventExtractor,
    queued: VecDeque<ExchangeEvent>,
    sends: usize,
}

impl Exchange {
    pub fn state(&self) -> TurnState {
        self.phase.state()
    }

    /// Number of `send` calls made so far.
    pub fn sends(&self) -> usize {
        self.sends
    }

    /// Pulls the next event. Returns `None` once the exchange is done or has
    /// failed; a failure is reported exactly once.
    pub async fn next_event(&mut self) -> Option<Result<ExchangeEvent, ExchangeError>> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Some(Ok(event));
            }
            if self.state().is_terminal() {
                return None;
            }

            // Parked in `Failed` while the step runs so an abandoned step
            // leaves nothing reusable behind.
            let phase = std::mem::replace(&mut self.phase, Phase::Failed);
            let from = phase.state();
            match self.advance(phase).await {
                Ok(next) => {
                    if next.state() != from {
                        debug!(from = %from, to = %next.state(), sends = self.sends, "Turn state transition");
                    }
                    self.phase = next;
                }
                Err(source) => {
                    debug!(state = %from, error = %source, "Exchange failed");
                    self.queued.clear();
                    self.phase = Phase::Failed;
                    return Some(Err(ExchangeError::new(from, source)));
                }
            }
        }
    }

    pub fn into_stream(self) -> ExchangeStream {
        Box::pin(futures_util::stream::unfold(self, |mut exchange| async move {
            let item = exchange.next_event().await?;
            Some((item, exchange))
        }))
    }

    async fn advance(&mut self, phase: Phase) -> Result<Phase, TransportError> {
        match phase {
            Phase::AwaitingSend { open, input } => {
                let mut handle = self.transport.open(open)?;
                let raw = handle.send(input).await?;
                self.sends += 1;
                Ok(Phase::Streaming {
                    handle,
                    raw,
                    acks: Vec::new(),
                })
            }
            Phase::Streaming {
                handle,
                mut raw,
                mut acks,
            } => match raw.next().await {
                Some(Ok(chunk)) => {
                    if let Some(reason) = chunk
                        .first_candidate()
                        .and_then(|candidate| candidate.finish_reason.as_deref())
                    {
                        debug!(reason, sends = self.sends, "Model finished pass");
                    }
                    for event in self.extractor.extract(&chunk) {
                        match event {
                            StreamEvent::TextDelta(text) => {
                                self.queued.push_back(ExchangeEvent::TextDelta(text))
                            }
                            StreamEvent::Citations(chunks) => {
                                self.queued.push_back(ExchangeEvent::Citations(chunks))
                            }
                            StreamEvent::ToolInvocation(call) => {
                                debug!(tool = %call.name, call_id = %call.call_id, "Dispatching tool call");
                                acks.push(self.registry.dispatch(&call));
                            }
                        }
                    }
                    Ok(Phase::Streaming { handle, raw, acks })
                }
                Some(Err(err)) => Err(err),
                None if acks.is_empty() => Ok(Phase::Done),
                None => Ok(Phase::ToolPending { handle, acks }),
            },
            Phase::ToolPending { mut handle, acks } => {
                let mut acks = acks.into_iter();
                let Some(first) = acks.next() else {
                    return Ok(Phase::Done);
                };
                // Only the first call of a pass is answered; the rest are
                // dropped.
                let skipped = acks.count();
                if skipped > 0 {
                    debug!(
                        forwarded = %first.call_id,
                        skipped,
                        "Forwarding only the first tool acknowledgment"
                    );
                }
                let raw = handle.send(TurnInput::ToolAck(first)).await?;
                self.sends += 1;
                Ok(Phase::Streaming {
                    handle,
                    raw,
                    acks: Vec::new(),
                })
            }
            Phase::Done => Ok(Phase::Done),
            Phase::Failed => Ok(Phase::Failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;
    use crate::core::tools::Mood;
    use crate::utils::test_utils::{
        call_chunk, grounding_chunk, text_chunk, ScriptedTransport, ScriptedTurn,
    };
    use serde_json::json;
    use std::sync::Mutex;

    fn request(content: &str) -> ExchangeRequest {
        ExchangeRequest {
            history: vec![Message::new("w", Role::Model, "Welcome")],
            content: content.to_string(),
            system_prompt: Some("prompt".into()),
        }
    }

    async fn drain(exchange: &mut Exchange) -> Vec<Result<ExchangeEvent, ExchangeError>> {
        let mut items = Vec::new();
        while let Some(item) = exchange.next_event().await {
            items.push(item);
        }
        items
    }

    fn texts(items: &[Result<ExchangeEvent, ExchangeError>]) -> Vec<String> {
        items
            .iter()
            .filter_map(|item| item.as_ref().ok())
            .filter_map(|event| event.text().map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn plain_stream_sends_once_and_finishes() {
        let transport = ScriptedTransport::new(vec![ScriptedTurn::chunks(vec![
            text_chunk("Hel"),
            text_chunk("lo"),
        ])]);
        let log = transport.log();
        let orchestrator = TurnOrchestrator::new(Arc::new(transport), ToolRegistry::new());

        let mut exchange = orchestrator.exchange(request("hi"));
        assert_eq!(exchange.state(), TurnState::AwaitingSend);
        assert_eq!(log.sends().len(), 0);

        let items = drain(&mut exchange).await;
        assert_eq!(texts(&items), vec!["Hel", "lo"]);
        assert_eq!(exchange.state(), TurnState::Done);
        assert_eq!(exchange.sends(), 1);
        assert_eq!(log.sends(), vec![TurnInput::Text("hi".into())]);
        assert_eq!(log.released(), 1);
    }

    #[tokio::test]
    async fn open_receives_history_prompt_and_tool_schemas() {
        let transport = ScriptedTransport::new(vec![ScriptedTurn::chunks(vec![text_chunk("ok")])]);
        let log = transport.log();
        let orchestrator = TurnOrchestrator::new(Arc::new(transport), ToolRegistry::new());

        let mut exchange = orchestrator.exchange(request("hi"));
        drain(&mut exchange).await;

        let opened = log.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].history.len(), 1);
        assert_eq!(opened[0].system_prompt.as_deref(), Some("prompt"));
        assert_eq!(opened[0].tools.len(), ToolRegistry::new().declarations().len());
    }

    #[tokio::test]
    async fn set_mood_call_runs_before_single_acknowledgment_turn() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTurn::chunks(vec![call_chunk("set_mood", json!({"mood": "light"}), Some("fc-1"))]),
            ScriptedTurn::chunks(vec![text_chunk("Brighter now.")]),
        ]);
        let log = transport.log();
        let moods = Arc::new(Mutex::new(Vec::new()));
        let registry = {
            let moods = Arc::clone(&moods);
            let log = Arc::clone(&log);
            ToolRegistry::with_mood_callback(Arc::new(move |mood: Mood| {
                moods.lock().expect("lock").push((mood, log.sends().len()));
            }))
        };
        let orchestrator = TurnOrchestrator::new(Arc::new(transport), registry);

        let mut exchange = orchestrator.exchange(request("cheer me up"));
        let items = drain(&mut exchange).await;

        assert_eq!(*moods.lock().expect("lock"), vec![(Mood::Light, 1)]);
        let sends = log.sends();
        assert_eq!(sends.len(), 2);
        match &sends[1] {
            TurnInput::ToolAck(ack) => {
                assert_eq!(ack.call_id, "fc-1");
                assert_eq!(ack.name, "set_mood");
                assert_eq!(ack.payload, json!({"result": "success"}));
            }
            other => panic!("expected tool ack, got {other:?}"),
        }
        assert_eq!(texts(&items), vec!["Brighter now."]);
        assert_eq!(items.len(), 1);
        assert_eq!(exchange.state(), TurnState::Done);
    }

    #[tokio::test]
    async fn only_first_tool_ack_is_forwarded() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTurn::chunks(vec![
                call_chunk("set_mood", json!({"mood": "dark"}), Some("fc-1")),
                call_chunk("access_memory_core", json!({}), Some("fc-2")),
            ]),
            ScriptedTurn::chunks(vec![text_chunk("done")]),
        ]);
        let log = transport.log();
        let orchestrator = TurnOrchestrator::new(Arc::new(transport), ToolRegistry::new());

        let mut exchange = orchestrator.exchange(request("go"));
        drain(&mut exchange).await;

        let acked: Vec<_> = log
            .sends()
            .into_iter()
            .filter_map(|input| match input {
                TurnInput::ToolAck(ack) => Some(ack.call_id),
                TurnInput::Text(_) => None,
            })
            .collect();
        assert_eq!(acked, vec!["fc-1"]);
        assert_eq!(exchange.sends(), 2);
    }

    #[tokio::test]
    async fn tool_turns_chain_until_a_pass_has_no_calls() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTurn::chunks(vec![text_chunk("One. "), call_chunk("set_mood", json!({"mood": "dark"}), None)]),
            ScriptedTurn::chunks(vec![call_chunk("set_mood", json!({"mood": "light"}), None)]),
            ScriptedTurn::chunks(vec![text_chunk("Two.")]),
        ]);
        let log = transport.log();
        let orchestrator = TurnOrchestrator::new(Arc::new(transport), ToolRegistry::new());

        let mut exchange = orchestrator.exchange(request("go"));
        let items = drain(&mut exchange).await;

        assert_eq!(texts(&items), vec!["One. ", "Two."]);
        assert_eq!(exchange.sends(), 3);
        assert_eq!(log.released(), 1);
    }

    #[tokio::test]
    async fn repeated_grounding_is_passed_through_without_dedup() {
        // Duplicate citations across turns are preserved as-is.
        let transport = ScriptedTransport::new(vec![
            ScriptedTurn::chunks(vec![
                grounding_chunk(&[("https://a.example", "A")]),
                call_chunk("set_mood", json!({"mood": "dark"}), Some("fc-1")),
            ]),
            ScriptedTurn::chunks(vec![grounding_chunk(&[("https://a.example", "A")])]),
        ]);
        let orchestrator = TurnOrchestrator::new(Arc::new(transport), ToolRegistry::new());

        let mut exchange = orchestrator.exchange(request("sources?"));
        let items = drain(&mut exchange).await;
        let citations: Vec<_> = items
            .iter()
            .filter_map(|item| item.as_ref().ok())
            .filter_map(ExchangeEvent::citations)
            .flatten()
            .cloned()
            .collect();
        assert_eq!(
            citations,
            vec![
                CitationChunk::web("https://a.example", "A"),
                CitationChunk::web("https://a.example", "A"),
            ]
        );
    }

    #[tokio::test]
    async fn mid_stream_fault_fails_once_and_releases_handle() {
        let transport = ScriptedTransport::new(vec![ScriptedTurn::Chunks(vec![
            Ok(text_chunk("partial ")),
            Ok(text_chunk("text")),
            Err(TransportError::Provider(json!({"error": {"code": 500, "message": "boom"}}))),
            Ok(text_chunk("never")),
        ])]);
        let log = transport.log();
        let orchestrator = TurnOrchestrator::new(Arc::new(transport), ToolRegistry::new());

        let mut exchange = orchestrator.exchange(request("hi"));
        let items = drain(&mut exchange).await;

        assert_eq!(texts(&items), vec!["partial ", "text"]);
        let err = items
            .last()
            .and_then(|item| item.as_ref().err())
            .expect("failure");
        assert_eq!(err.state(), TurnState::Streaming);
        assert!(matches!(err.transport(), TransportError::Provider(_)));
        assert_eq!(exchange.state(), TurnState::Failed);
        assert!(exchange.next_event().await.is_none());
        assert_eq!(log.released(), 1);
    }

    #[tokio::test]
    async fn send_failure_is_reported_from_awaiting_send() {
        let transport = ScriptedTransport::new(vec![ScriptedTurn::SendError(TransportError::Status {
            status: 429,
            body: "{}".into(),
        })]);
        let orchestrator = TurnOrchestrator::new(Arc::new(transport), ToolRegistry::new());

        let mut exchange = orchestrator.exchange(request("hi"));
        let items = drain(&mut exchange).await;
        assert_eq!(items.len(), 1);
        let err = items[0].as_ref().expect_err("failure");
        assert_eq!(err.state(), TurnState::AwaitingSend);
        assert_eq!(exchange.sends(), 0);
    }

    #[tokio::test]
    async fn follow_up_send_failure_fails_from_tool_pending() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTurn::chunks(vec![call_chunk("set_mood", json!({"mood": "dark"}), Some("fc-1"))]),
            ScriptedTurn::SendError(TransportError::Status {
                status: 503,
                body: "unavailable".into(),
            }),
        ]);
        let orchestrator = TurnOrchestrator::new(Arc::new(transport), ToolRegistry::new());

        let mut exchange = orchestrator.exchange(request("hi"));
        let items = drain(&mut exchange).await;
        let err = items[0].as_ref().expect_err("failure");
        assert_eq!(err.state(), TurnState::ToolPending);
    }

    #[tokio::test]
    async fn abandoning_the_stream_releases_the_handle() {
        let transport = ScriptedTransport::new(vec![ScriptedTurn::chunks(vec![
            text_chunk("first"),
            text_chunk("second"),
        ])]);
        let log = transport.log();
        let orchestrator = TurnOrchestrator::new(Arc::new(transport), ToolRegistry::new());

        let mut stream = orchestrator.run(request("hi"));
        let first = stream.next().await.expect("item").expect("event");
        assert_eq!(first.text(), Some("first"));
        assert_eq!(log.released(), 0);

        drop(stream);
        assert_eq!(log.released(), 1);
    }

    #[tokio::test]
    async fn stream_is_lazy_until_polled() {
        let transport = ScriptedTransport::new(vec![ScriptedTurn::chunks(vec![text_chunk("x")])]);
        let log = transport.log();
        let orchestrator = TurnOrchestrator::new(Arc::new(transport), ToolRegistry::new());

        let stream = orchestrator.run(request("hi"));
        assert!(log.opened().is_empty());
        drop(stream);
        assert!(log.sends().is_empty());
    }
}
