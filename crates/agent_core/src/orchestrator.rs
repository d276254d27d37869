//! Runs one conversation turn at a time: streams the agent's reply into the
//! transcript and executes the tools it requests, strictly in order.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use canvas_core::CanvasStore;
use futures::StreamExt;
use shared::{
    domain::Entity,
    protocol::{AgentTurnRequest, ContextEntitySummary, HistoryEntry, ToolInvocation},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    backend::GenerationBackend,
    chat::{ChatState, ChatStore, Message, Role, Step},
    executor::{ActionExecutor, ExecutorConfig, ToolError},
    tools::{self, Tool},
};

/// Characters of a text card forwarded to the agent as context.
const CONTEXT_EXCERPT_CHARS: usize = 280;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Another turn was already in flight.
    Busy,
    /// Nothing to send.
    Blank,
    Completed,
    Cancelled,
    /// The stream could not be opened or broke mid-turn.
    Failed,
}

struct ActiveTurn {
    id: u64,
    cancel: CancellationToken,
    /// Index of the turn's first agent message.
    first_message: usize,
}

struct Claim {
    message: String,
    history: Vec<HistoryEntry>,
    placeholder: usize,
}

/// Tracks the agent message currently receiving output.
struct Cursor {
    index: usize,
    text: String,
    after_tool: bool,
}

impl Cursor {
    fn new(index: usize) -> Self {
        Self {
            index,
            text: String::new(),
            after_tool: false,
        }
    }

    fn open_new(&mut self, state: &mut ChatState) {
        if let Some(previous) = state.messages.get_mut(self.index) {
            previous.is_streaming = false;
        }
        state.messages.push(Message::placeholder());
        self.index = state.messages.len() - 1;
        self.text.clear();
        self.after_tool = false;
    }

    fn message<'s>(&mut self, state: &'s mut ChatState) -> &'s mut Message {
        let valid = state
            .messages
            .get(self.index)
            .is_some_and(|message| message.role == Role::Agent);
        if !valid {
            self.open_new(state);
        }
        &mut state.messages[self.index]
    }
}

pub struct TurnOrchestrator {
    chat: ChatStore,
    canvas: CanvasStore,
    backend: Arc<dyn GenerationBackend>,
    executor: ActionExecutor,
    active: Mutex<Option<ActiveTurn>>,
    next_turn: AtomicU64,
}

impl TurnOrchestrator {
    pub fn new(
        chat: ChatStore,
        canvas: CanvasStore,
        backend: Arc<dyn GenerationBackend>,
        config: ExecutorConfig,
    ) -> Self {
        let executor = ActionExecutor::new(canvas.clone(), backend.clone(), config);
        Self {
            chat,
            canvas,
            backend,
            executor,
            active: Mutex::new(None),
            next_turn: AtomicU64::new(1),
        }
    }

    pub fn chat(&self) -> &ChatStore {
        &self.chat
    }

    pub fn is_busy(&self) -> bool {
        self.chat.is_typing()
    }

    /// Sends the current input box contents.
    pub async fn send_message(&self) -> TurnOutcome {
        self.start(None).await
    }

    /// Sends `text` regardless of the input box, which is still cleared.
    pub async fn submit(&self, text: impl Into<String>) -> TurnOutcome {
        self.start(Some(text.into())).await
    }

    /// Stops the in-flight turn. Text already streamed stays in the
    /// transcript; anything arriving later is discarded.
    pub fn cancel_turn(&self) -> bool {
        let mut active = self.active();
        let Some(turn) = active.take() else {
            return false;
        };
        turn.cancel.cancel();
        self.chat.update(|state| {
            for message in state.messages.iter_mut().skip(turn.first_message) {
                if message.is_active() {
                    message.settle();
                }
            }
            state.is_typing = false;
            true
        });
        info!(turn = turn.id, "turn: cancelled");
        true
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveTurn>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn start(&self, explicit: Option<String>) -> TurnOutcome {
        let turn_id = self.next_turn.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        let mut claim = Err(TurnOutcome::Blank);
        {
            // Held across the claim so a concurrent cancel sees either no
            // turn or a fully registered one.
            let mut active = self.active();
            self.chat.update(|state| {
                if state.is_typing {
                    claim = Err(TurnOutcome::Busy);
                    return false;
                }
                let raw = explicit.unwrap_or_else(|| state.input.clone());
                let message = raw.trim();
                if message.is_empty() {
                    return false;
                }
                let history = state.history();
                state.messages.push(Message::user(message));
                state.messages.push(Message::placeholder());
                state.input.clear();
                state.is_typing = true;
                claim = Ok(Claim {
                    message: message.to_string(),
                    history,
                    placeholder: state.messages.len() - 1,
                });
                true
            });
            if let Ok(claimed) = &claim {
                *active = Some(ActiveTurn {
                    id: turn_id,
                    cancel: cancel.clone(),
                    first_message: claimed.placeholder,
                });
            }
        }
        let claimed = match claim {
            Ok(claimed) => claimed,
            Err(outcome) => {
                debug!(?outcome, "turn: send ignored");
                return outcome;
            }
        };

        let context = self.canvas.selected_entities();
        info!(
            turn = turn_id,
            context = context.len(),
            history = claimed.history.len(),
            "turn: started"
        );
        let request = AgentTurnRequest {
            message: claimed.message,
            history: claimed.history,
            context: context.iter().map(summarize).collect(),
            tools: tools::declarations(),
        };
        let outcome = self
            .run(request, &context, &cancel, claimed.placeholder)
            .await;
        self.finish(turn_id, &cancel, claimed.placeholder);
        info!(turn = turn_id, ?outcome, "turn: finished");
        outcome
    }

    async fn run(
        &self,
        request: AgentTurnRequest,
        context: &[Entity],
        cancel: &CancellationToken,
        placeholder: usize,
    ) -> TurnOutcome {
        let mut cursor = Cursor::new(placeholder);
        let opened = tokio::select! {
            _ = cancel.cancelled() => return TurnOutcome::Cancelled,
            opened = self.backend.stream_turn(request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => {
                error!(error = %err, "turn: failed to open agent stream");
                self.report_failure(cancel, &mut cursor, &err);
                return TurnOutcome::Failed;
            }
        };

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return TurnOutcome::Cancelled,
                next = stream.next() => next,
            };
            let chunk = match next {
                None => break,
                Some(Ok(chunk)) => chunk,
                Some(Err(err)) => {
                    error!(error = %err, "turn: agent stream failed");
                    self.report_failure(cancel, &mut cursor, &err);
                    return TurnOutcome::Failed;
                }
            };
            if let Some(delta) = chunk.text.as_deref().filter(|delta| !delta.is_empty()) {
                if !self.append_text(cancel, &mut cursor, delta) {
                    return TurnOutcome::Cancelled;
                }
            }
            for invocation in &chunk.tool_invocations {
                if !self.run_tool(cancel, &mut cursor, invocation, context).await {
                    return TurnOutcome::Cancelled;
                }
            }
        }

        if cancel.is_cancelled() {
            TurnOutcome::Cancelled
        } else {
            TurnOutcome::Completed
        }
    }

    fn append_text(&self, cancel: &CancellationToken, cursor: &mut Cursor, delta: &str) -> bool {
        self.chat.update(|state| {
            if cancel.is_cancelled() {
                return false;
            }
            if cursor.after_tool {
                cursor.open_new(state);
            }
            cursor.text.push_str(delta);
            let text = cursor.text.clone();
            let message = cursor.message(state);
            message.content = text;
            message.step = Step::Writing;
            message.is_streaming = true;
            true
        })
    }

    /// Runs one invocation to completion. Returns `false` once the turn has
    /// been cancelled.
    async fn run_tool(
        &self,
        cancel: &CancellationToken,
        cursor: &mut Cursor,
        invocation: &ToolInvocation,
        context: &[Entity],
    ) -> bool {
        let label = Tool::from_name(&invocation.name)
            .map(Tool::progress_label)
            .unwrap_or("⚙️ Running tool...");
        let began = self.chat.update(|state| {
            if cancel.is_cancelled() {
                return false;
            }
            if cursor.after_tool || !cursor.text.is_empty() {
                cursor.open_new(state);
            }
            let message = cursor.message(state);
            message.content = format!("{label} `{}`", invocation.name);
            message.step = Step::Generating;
            message.is_streaming = true;
            message.is_executing = true;
            true
        });
        if !began {
            return false;
        }

        info!(tool = %invocation.name, "turn: executing tool");
        let summary = match self.executor.execute(invocation, context, cancel).await {
            Ok(outcome) => {
                info!(tool = %invocation.name, entity_id = %outcome.entity_id(), "turn: tool finished");
                outcome.summary()
            }
            Err(ToolError::Cancelled) => return false,
            Err(err) => {
                warn!(tool = %invocation.name, error = %err, "turn: tool failed");
                format!("❌ {} failed: {err}", invocation.name)
            }
        };

        self.chat.update(|state| {
            if cancel.is_cancelled() {
                return false;
            }
            let message = cursor.message(state);
            message.content = summary;
            message.step = Step::Done;
            message.is_executing = false;
            cursor.after_tool = true;
            true
        })
    }

    /// Writes a stream failure into the transcript, reusing the active
    /// message only when it is still empty.
    fn report_failure(&self, cancel: &CancellationToken, cursor: &mut Cursor, err: &anyhow::Error) {
        let text = format!("❌ The agent stopped responding: {err:#}");
        self.chat.update(|state| {
            if cancel.is_cancelled() {
                return false;
            }
            let reusable = state.messages.get(cursor.index).is_some_and(|message| {
                message.role == Role::Agent
                    && !message.is_executing
                    && message.content.trim().is_empty()
            });
            if !reusable {
                cursor.open_new(state);
            }
            let message = cursor.message(state);
            message.content = text;
            message.settle();
            true
        });
    }

    fn finish(&self, turn_id: u64, cancel: &CancellationToken, first_message: usize) {
        let mut active = self.active();
        if active.as_ref().is_some_and(|turn| turn.id == turn_id) {
            *active = None;
        }
        self.chat.update(|state| {
            if cancel.is_cancelled() {
                return false;
            }
            for message in state
                .messages
                .iter_mut()
                .skip(first_message)
                .filter(|message| message.role == Role::Agent)
            {
                message.settle();
            }
            // An empty reply leaves no bubble behind.
            if state
                .messages
                .last()
                .is_some_and(|message| message.role == Role::Agent && message.content.is_empty())
            {
                state.messages.pop();
            }
            state.is_typing = false;
            true
        });
    }
}

fn summarize(entity: &Entity) -> ContextEntitySummary {
    let excerpt = if entity.kind.is_textual() {
        Some(entity.payload.chars().take(CONTEXT_EXCERPT_CHARS).collect::<String>())
    } else {
        entity
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.prompt.clone())
    };
    ContextEntitySummary {
        id: entity.id,
        kind: entity.kind,
        title: entity.title.clone(),
        excerpt: excerpt.filter(|excerpt| !excerpt.trim().is_empty()),
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
