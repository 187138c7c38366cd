use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::orchestrator::{ExchangeError, ExchangeEvent, ExchangeRequest, TurnOrchestrator};
use crate::core::tools::{Mood, ToolRegistry};

/// Where an exchange's updates land.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExchangeTarget {
    pub session_id: String,
    pub message_id: String,
}

#[derive(Debug)]
pub enum ExchangeUpdate {
    Event { seq: u64, event: ExchangeEvent },
    MoodChanged(Mood),
    Completed,
    Failed(ExchangeError),
}

impl ExchangeUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExchangeUpdate::Completed | ExchangeUpdate::Failed(_))
    }
}

pub struct ExchangeParams {
    pub target: ExchangeTarget,
    pub request: ExchangeRequest,
    pub cancel_token: CancellationToken,
}

pub type ExchangeReceiver = mpsc::UnboundedReceiver<(ExchangeUpdate, ExchangeTarget)>;

/// Runs exchanges on the tokio runtime and funnels every update through one
/// channel, so the receiver applies them to session state one at a time.
#[derive(Clone)]
pub struct ExchangeService {
    tx: mpsc::UnboundedSender<(ExchangeUpdate, ExchangeTarget)>,
}

impl ExchangeService {
    pub fn new() -> (Self, ExchangeReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_exchange(&self, orchestrator: &TurnOrchestrator, params: ExchangeParams) {
        let ExchangeParams {
            target,
            request,
            cancel_token,
        } = params;

        let registry = {
            let tx = self.tx.clone();
            let target = target.clone();
            ToolRegistry::with_mood_callback(Arc::new(move |mood: Mood| {
                let _ = tx.send((ExchangeUpdate::MoodChanged(mood), target.clone()));
            }))
        };
        let mut exchange = orchestrator.exchange_with_registry(request, registry);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let mut seq = 0u64;
            loop {
                let next = tokio::select! {
                    next = exchange.next_event() => next,
                    _ = cancel_token.cancelled() => {
                        debug!(message = %target.message_id, "Exchange cancelled");
                        return;
                    }
                };
                match next {
                    Some(Ok(event)) => {
                        let _ = tx.send((ExchangeUpdate::Event { seq, event }, target.clone()));
                        seq += 1;
                    }
                    Some(Err(err)) => {
                        let _ = tx.send((ExchangeUpdate::Failed(err), target));
                        return;
                    }
                    None => {
                        let _ = tx.send((ExchangeUpdate::Completed, target));
                        return;
                    }
                }
            }
        });
    }
}
