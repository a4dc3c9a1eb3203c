//! ModelGateway trait: the abstraction over the model provider transport.
//!
//! The engine never talks to an LLM API directly. It asks a gateway to start
//! a query for a prompt feature and to continue it with a tool result; the
//! gateway returns one classified [`ModelResponse`] per call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::PromptFeature;
use crate::error::GatewayError;
use crate::prompt::{PromptVariables, RenderedMessages};
use crate::session::SessionContext;
use crate::tool::{ToolResult, ToolUseRequest};

/// A tool definition sent to the model so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Token usage reported by the provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
}

/// What the model did in one round. Exactly one of these per response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelTurn {
    /// The model called the final-answer tool.
    FinalAnswer {
        call_id: String,
        payload: serde_json::Value,
    },

    /// The model asked for a tool to be executed.
    ToolUseRequest(ToolUseRequest),

    /// The model answered in prose without selecting any tool.
    NoToolSelected {
        #[serde(default)]
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub turn: ModelTurn,

    #[serde(default)]
    pub usage: Usage,
}

impl ModelResponse {
    pub fn final_answer(call_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            turn: ModelTurn::FinalAnswer {
                call_id: call_id.into(),
                payload,
            },
            usage: Usage::default(),
        }
    }

    pub fn tool_use(call_id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            turn: ModelTurn::ToolUseRequest(ToolUseRequest {
                call_id: call_id.into(),
                name: name.into(),
                arguments,
            }),
            usage: Usage::default(),
        }
    }

    pub fn no_tool(text: impl Into<String>) -> Self {
        Self {
            turn: ModelTurn::NoToolSelected { text: text.into() },
            usage: Usage::default(),
        }
    }

    pub fn with_usage(mut self, input: u64, output: u64) -> Self {
        self.usage = Usage { input, output };
        self
    }
}

/// First call of a pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub agent_name: String,
    pub feature: PromptFeature,
    pub model: String,
    pub messages: RenderedMessages,
    pub variables: PromptVariables,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// Continuation of a pass with the result of the previous tool request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSubmission {
    pub agent_name: String,
    pub feature: PromptFeature,
    pub model: String,
    pub result: ToolResult,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Set on the last permitted round; the model should answer now.
    #[serde(default)]
    pub final_round: bool,
}

/// The model provider transport.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Gateway name for logging.
    fn name(&self) -> &str;

    async fn start_query(
        &self,
        session: &SessionContext,
        request: QueryRequest,
    ) -> Result<ModelResponse, GatewayError>;

    async fn submit_tool_result(
        &self,
        session: &SessionContext,
        submission: ToolSubmission,
    ) -> Result<ModelResponse, GatewayError>;
}
