//! The iteration controller: drives one pass's model ⇄ tool round-trips
//! to a bounded terminal state.
//!
//! ```text
//! AwaitingModel ──final answer──────────────▶ Terminal(success)
//!      │        ──no tool selected──────────▶ Terminal(empty)
//!      │        ──round == max──────────────▶ Terminal(empty)
//!      ▼ tool use request
//! ToolRequested ──submit result, round += 1──▶ AwaitingModel
//! ```
//!
//! A malformed final answer is treated like a failed tool call: the error is
//! submitted back to the model and the loop continues.

use chrono::Utc;
use reviewloop_core::agent::{AgentOutput, PromptFeature};
use reviewloop_core::comment::ReviewVerdict;
use reviewloop_core::error::{RunError, ToolError};
use reviewloop_core::event::{EventBus, ReviewEvent};
use reviewloop_core::gateway::{ModelGateway, ModelResponse, ModelTurn, ToolDefinition, ToolSubmission, Usage};
use reviewloop_core::session::SessionContext;
use reviewloop_core::tool::ToolResult;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::dispatcher::ToolDispatcher;

/// How a final-answer payload is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    /// `{comments: [...]}`, validated field by field.
    Comments,
    /// Any JSON object, passed through.
    Raw,
}

impl ResultFormat {
    pub fn extract(&self, payload: &serde_json::Value) -> Result<AgentOutput, ToolError> {
        match self {
            Self::Comments => ReviewVerdict::from_final_answer(payload).map(AgentOutput::Verdict),
            Self::Raw if payload.is_object() => Ok(AgentOutput::Raw(payload.clone())),
            Self::Raw => Err(ToolError::InvalidFinalAnswer("payload must be a JSON object".into())),
        }
    }

    /// What an agent reports when its pass ends without an answer.
    pub fn empty_output(&self) -> Option<AgentOutput> {
        match self {
            Self::Comments => Some(AgentOutput::Verdict(ReviewVerdict::empty())),
            Self::Raw => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    NoToolSelected,
    MaxIterations,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    Success(AgentOutput),
    Empty(EmptyReason),
}

/// Loop state: the response being classified and the rounds completed so far.
#[derive(Debug, Clone)]
pub struct IterationState {
    pub response: ModelResponse,
    pub rounds: u32,
}

impl IterationState {
    pub fn new(initial: ModelResponse) -> Self {
        Self {
            response: initial,
            rounds: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationOutcome {
    pub terminal: Terminal,
    pub rounds: u32,
    /// Usage of the tool-result submissions; the initial call is not included.
    pub usage: Usage,
}

/// Everything the controller needs to know about the pass it drives.
#[derive(Debug, Clone, Copy)]
pub struct PassScope<'a> {
    pub agent_name: &'a str,
    pub feature: &'a PromptFeature,
    pub model: &'a str,
    pub pass: usize,
    pub tools: &'a [ToolDefinition],
    pub format: ResultFormat,
}

pub struct IterationController {
    gateway: Arc<dyn ModelGateway>,
    dispatcher: Arc<ToolDispatcher>,
    max_iterations: u32,
    events: Option<EventBus>,
}

impl IterationController {
    pub fn new(gateway: Arc<dyn ModelGateway>, dispatcher: Arc<ToolDispatcher>, max_iterations: u32) -> Self {
        Self {
            gateway,
            dispatcher,
            max_iterations,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run the loop starting from the pass's first response.
    ///
    /// Only gateway failures and cancellation escape as errors.
    pub async fn run(
        &self,
        session: &SessionContext,
        scope: PassScope<'_>,
        initial: ModelResponse,
    ) -> Result<IterationOutcome, RunError> {
        let mut state = IterationState::new(initial);
        let mut usage = Usage::default();

        let terminal = loop {
            let pending: ToolResult = match &state.response.turn {
                ModelTurn::FinalAnswer { call_id, payload } => match scope.format.extract(payload) {
                    Ok(output) => {
                        debug!(agent = %scope.agent_name, pass = scope.pass, rounds = state.rounds, "Final answer received");
                        break Terminal::Success(output);
                    }
                    Err(e) => {
                        warn!(agent = %scope.agent_name, pass = scope.pass, error = %e, "Malformed final answer");
                        if self.ceiling_reached(&state, &scope) {
                            break Terminal::Empty(EmptyReason::MaxIterations);
                        }
                        ToolDispatcher::final_answer_failure(call_id, &e)
                    }
                },
                ModelTurn::NoToolSelected { .. } => {
                    warn!(agent = %scope.agent_name, pass = scope.pass, rounds = state.rounds, "no tools used");
                    break Terminal::Empty(EmptyReason::NoToolSelected);
                }
                ModelTurn::ToolUseRequest(request) => {
                    if self.ceiling_reached(&state, &scope) {
                        break Terminal::Empty(EmptyReason::MaxIterations);
                    }
                    let started = Instant::now();
                    let result = session.guard(self.dispatcher.execute(request)).await?;
                    self.publish(ReviewEvent::ToolExecuted {
                        agent: scope.agent_name.to_string(),
                        tool_name: request.name.clone(),
                        success: !result.is_error(),
                        duration_ms: started.elapsed().as_millis() as u64,
                        timestamp: Utc::now(),
                    });
                    result
                }
            };

            let submission = ToolSubmission {
                agent_name: scope.agent_name.to_string(),
                feature: scope.feature.clone(),
                model: scope.model.to_string(),
                result: pending,
                tools: scope.tools.to_vec(),
                final_round: state.rounds + 1 == self.max_iterations,
            };
            let response = session
                .guard(self.gateway.submit_tool_result(session, submission))
                .await??;

            state.rounds += 1;
            usage.input += response.usage.input;
            usage.output += response.usage.output;
            self.publish(ReviewEvent::ModelCalled {
                agent: scope.agent_name.to_string(),
                pass: scope.pass,
                round: state.rounds,
                input_tokens: response.usage.input,
                output_tokens: response.usage.output,
                timestamp: Utc::now(),
            });
            debug!(agent = %scope.agent_name, pass = scope.pass, round = state.rounds, "Tool round-trip complete");
            state.response = response;
        };

        Ok(IterationOutcome {
            terminal,
            rounds: state.rounds,
            usage,
        })
    }

    fn ceiling_reached(&self, state: &IterationState, scope: &PassScope<'_>) -> bool {
        if state.rounds < self.max_iterations {
            return false;
        }
        error!(
            agent = %scope.agent_name,
            pass = scope.pass,
            rounds = state.rounds,
            max = self.max_iterations,
            "max iterations reached"
        );
        true
    }

    fn publish(&self, event: ReviewEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}
