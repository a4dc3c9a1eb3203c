//! # reviewloop Core
//!
//! Domain types, traits, and error definitions for the reviewloop agent
//! execution engine. This crate has **zero framework dependencies**: it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator of the engine is a trait here:
//! - [`ModelGateway`]: the model provider transport
//! - [`Tool`]: a single tool the model may invoke
//! - [`PromptRenderer`]: turns prompt variables into messages
//!
//! Implementations live in their respective crates, so the engine can be
//! driven by real providers in production and by scripted gateways in tests.

pub mod agent;
pub mod comment;
pub mod error;
pub mod event;
pub mod gateway;
pub mod prompt;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{
    AgentDescriptor, AgentOutput, AgentRunResult, AgentType, PassTokens, PromptFeature,
    TokenAccounting, TokenKind,
};
pub use comment::{LineNumber, ReviewComment, ReviewVerdict};
pub use error::{AgentError, GatewayError, PromptError, RunError, ToolError};
pub use event::{EventBus, ReviewEvent};
pub use gateway::{ModelGateway, ModelResponse, ModelTurn, QueryRequest, ToolDefinition, ToolSubmission, Usage};
pub use prompt::{PromptRenderer, PromptVariables, RenderedMessages};
pub use session::{Cancelled, SessionContext, SessionId};
pub use tool::{FINAL_ANSWER_TOOL, Tool, ToolFailure, ToolOutcome, ToolRegistry, ToolResult, ToolUseRequest};
