use crate::agent::ToolRegistry;
use crate::error::{ToolError, TurnError};
use crate::providers::ModelHandle;
use crate::traits::{ChatMessage, ChatRequest, ProviderEvent, ToolCall, ToolSpec};
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_MAX_ITERATIONS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Thinking,
    ToolCallPending,
    ToolCallRunning,
    Answering,
    Done,
    Failed,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnState::Done | TurnState::Failed)
    }

    pub fn can_advance_to(self, next: TurnState) -> bool {
        use TurnState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, Thinking)
            | (Thinking, ToolCallPending)
            | (Thinking, Answering)
            | (ToolCallPending, ToolCallRunning)
            | (ToolCallRunning, ToolCallPending)
            | (ToolCallRunning, Thinking)
            | (Answering, Done) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(Value),
    Failure(String),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    fn from_invocation(result: Result<crate::traits::ToolResult, ToolError>) -> Self {
        match result {
            Ok(r) if r.success => ToolOutcome::Success(r.output),
            Ok(r) => ToolOutcome::Failure(
                r.error
                    .unwrap_or_else(|| "Tool reported failure".to_string()),
            ),
            Err(e) => ToolOutcome::Failure(e.to_string()),
        }
    }

    fn to_message(&self) -> String {
        match self {
            ToolOutcome::Success(Value::String(s)) => s.clone(),
            ToolOutcome::Success(v) => v.to_string(),
            ToolOutcome::Failure(msg) => serde_json::json!({ "error": msg }).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallEvent {
    pub tool: String,
    pub arguments: String,
    pub outcome: ToolOutcome,
}

/// Receives the progress of a turn as it happens. Every method defaults to a
/// no-op.
pub trait TurnObserver: Send {
    fn on_message(&mut self, _fragment: &str) {}

    fn on_first_token(&mut self) {}

    fn on_tool_call_start(&mut self, _tool: &str) {}

    fn on_tool_call_end(&mut self, _event: &ToolCallEvent) {}
}

pub struct NullObserver;

impl TurnObserver for NullObserver {}

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub prompt: String,
    /// Tool names offered to the model. Empty offers none.
    pub tools: Vec<String>,
}

impl TurnRequest {
    pub fn new(prompt: impl Into<String>, tools: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            tools,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnSummary {
    pub answer: String,
    pub tool_calls: Vec<ToolCallEvent>,
    pub rounds: usize,
}

struct Turn {
    state: TurnState,
}

impl Turn {
    fn advance(&mut self, next: TurnState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal turn transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "Turn state");
        self.state = next;
    }

    fn fail(&mut self, err: TurnError) -> TurnError {
        self.advance(TurnState::Failed);
        err
    }
}

struct Round {
    text: String,
    tool_calls: Vec<ToolCall>,
}

pub struct ConversationDriver {
    model: ModelHandle,
    registry: Arc<ToolRegistry>,
    system_prompt: Option<String>,
    max_iterations: usize,
}

impl ConversationDriver {
    pub fn new(model: ModelHandle, registry: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            registry,
            system_prompt: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub async fn run(
        &self,
        request: &TurnRequest,
        observer: &mut dyn TurnObserver,
    ) -> Result<TurnSummary, TurnError> {
        let mut turn = Turn {
            state: TurnState::Idle,
        };

        let specs: Vec<ToolSpec> = match self.registry.specs_for(&request.tools) {
            Ok(specs) => specs,
            Err(ToolError::UnknownTool(name)) => {
                return Err(turn.fail(TurnError::UnknownTool(name)));
            }
            Err(e) => return Err(turn.fail(TurnError::UnknownTool(e.to_string()))),
        };

        let mut messages = Vec::with_capacity(4);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(request.prompt.clone()));

        info!(
            model = self.model.model(),
            tools = ?request.tools,
            "Starting turn"
        );

        let mut answer = String::new();
        let mut tool_calls = Vec::new();
        turn.advance(TurnState::Thinking);

        for round_no in 1..=self.max_iterations {
            let round = match self.stream_round(&messages, &specs, observer, &mut answer).await {
                Ok(round) => round,
                Err(e) => {
                    warn!(round = round_no, error = %e, "Turn failed");
                    return Err(turn.fail(e));
                }
            };

            if round.tool_calls.is_empty() {
                turn.advance(TurnState::Answering);
                turn.advance(TurnState::Done);
                info!(rounds = round_no, tool_calls = tool_calls.len(), "Turn complete");
                return Ok(TurnSummary {
                    answer,
                    tool_calls,
                    rounds: round_no,
                });
            }

            messages.push(ChatMessage::assistant_with_tool_calls(
                round.text,
                round.tool_calls.clone(),
            ));

            for call in round.tool_calls {
                turn.advance(TurnState::ToolCallPending);
                observer.on_tool_call_start(&call.name);

                turn.advance(TurnState::ToolCallRunning);
                let result = self.registry.invoke_raw(&call.name, &call.arguments).await;
                let event = ToolCallEvent {
                    tool: call.name,
                    arguments: call.arguments,
                    outcome: ToolOutcome::from_invocation(result),
                };
                debug!(tool = %event.tool, success = event.outcome.is_success(), "Tool call finished");

                observer.on_tool_call_end(&event);
                messages.push(ChatMessage::tool_result(call.id, event.outcome.to_message()));
                tool_calls.push(event);
            }

            turn.advance(TurnState::Thinking);
        }

        Err(turn.fail(TurnError::IterationLimit(self.max_iterations)))
    }

    async fn stream_round(
        &self,
        messages: &[ChatMessage],
        specs: &[ToolSpec],
        observer: &mut dyn TurnObserver,
        answer: &mut String,
    ) -> Result<Round, TurnError> {
        let request = ChatRequest {
            messages,
            tools: if specs.is_empty() { None } else { Some(specs) },
        };

        let mut stream = self.model.stream(request).await.map_err(TurnError::model)?;
        let mut round = Round {
            text: String::new(),
            tool_calls: Vec::new(),
        };
        let mut saw_first_token = false;

        while let Some(event) = stream.next().await {
            match event {
                ProviderEvent::Token(text) => {
                    if !saw_first_token {
                        saw_first_token = true;
                        observer.on_first_token();
                    }
                    observer.on_message(&text);
                    answer.push_str(&text);
                    round.text.push_str(&text);
                }
                ProviderEvent::Thinking(_) => {
                    if !saw_first_token {
                        saw_first_token = true;
                        observer.on_first_token();
                    }
                }
                ProviderEvent::ToolCall(call) => round.tool_calls.push(call),
                ProviderEvent::Error(message) => return Err(TurnError::ModelCall(message)),
                ProviderEvent::Done => return Ok(round),
            }
        }

        Err(TurnError::ModelCall(
            "model stream ended before completion".to_string(),
        ))
    }
}
