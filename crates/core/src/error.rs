//! Error types for the reviewloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`AgentError`] attaches the
//! identity of the agent that failed so the caller can attribute every fault.

use thiserror::Error;

use crate::agent::AgentType;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool {0} is handled by the engine and cannot be executed")]
    NotExecutable(String),

    #[error("Invalid final answer: {0}")]
    InvalidFinalAnswer(String),
}

impl ToolError {
    /// Short machine-readable classification fed back to the model.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "ToolNotFound",
            Self::ExecutionFailed { .. } => "ExecutionFailed",
            Self::Timeout { .. } => "Timeout",
            Self::PermissionDenied { .. } => "PermissionDenied",
            Self::InvalidArguments(_) => "InvalidArguments",
            Self::NotExecutable(_) => "NotExecutable",
            Self::InvalidFinalAnswer(_) => "InvalidFinalAnswer",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum PromptError {
    #[error("No prompt template registered for feature {feature} (model {model})")]
    MissingTemplate { feature: String, model: String },
}

/// Why a single agent run stopped with a fault.
///
/// Expected outcomes (token limit, tool failure, no tool selected, iteration
/// ceiling) are NOT errors; they are encoded in the run result.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    #[error("model gateway failure: {0}")]
    Gateway(#[from] GatewayError),

    #[error("prompt rendering failure: {0}")]
    Prompt(#[from] PromptError),

    #[error("run cancelled")]
    Cancelled,

    #[error("agent task panicked: {0}")]
    Panicked(String),
}

impl From<crate::session::Cancelled> for RunError {
    fn from(_: crate::session::Cancelled) -> Self {
        Self::Cancelled
    }
}

/// A [`RunError`] attributed to the agent it happened in.
#[derive(Debug, Clone, Error)]
#[error("agent '{agent_name}' ({agent_type}) failed: {source}")]
pub struct AgentError {
    pub agent_name: String,
    pub agent_type: AgentType,
    #[source]
    pub source: RunError,
}

impl AgentError {
    pub fn new(agent_name: impl Into<String>, agent_type: AgentType, source: RunError) -> Self {
        Self {
            agent_name: agent_name.into(),
            agent_type,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_displays_correctly() {
        let err = RunError::Gateway(GatewayError::ApiError {
            status_code: 529,
            message: "Overloaded".into(),
        });
        assert!(err.to_string().contains("529"));
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn tool_error_types_are_stable() {
        assert_eq!(ToolError::NotFound("x".into()).error_type(), "ToolNotFound");
        assert_eq!(
            ToolError::InvalidFinalAnswer("missing comments".into()).error_type(),
            "InvalidFinalAnswer"
        );
    }

    #[test]
    fn agent_error_names_the_agent() {
        let err = AgentError::new(
            "security",
            AgentType::Security,
            RunError::Gateway(GatewayError::Network("connection reset".into())),
        );
        let text = err.to_string();
        assert!(text.contains("security"));
        assert!(text.contains("connection reset"));
    }

    #[test]
    fn panicked_agent_error_keeps_the_panic_message() {
        let err = AgentError::new("error", AgentType::Error, RunError::Panicked("index out of bounds".into()));
        assert_eq!(
            err.to_string(),
            "agent 'error' (error) failed: agent task panicked: index out of bounds"
        );
    }
}
