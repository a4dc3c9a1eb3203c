//! Tool dispatcher: routes a model's tool-use request to a registered tool
//! and packages whatever happens into a [`ToolResult`].
//!
//! Nothing a tool does escapes `dispatch`: errors, timeouts and panics all
//! come back as a structured error result the model can react to.

use futures::FutureExt;
use reviewloop_core::error::ToolError;
use reviewloop_core::gateway::{ModelResponse, ModelTurn};
use reviewloop_core::tool::{FINAL_ANSWER_TOOL, ToolRegistry, ToolResult, ToolUseRequest};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn is_final_answer(response: &ModelResponse) -> bool {
        matches!(response.turn, ModelTurn::FinalAnswer { .. })
    }

    /// The raw final-answer payload, if the response carries one.
    pub fn extract_final_answer(response: &ModelResponse) -> Option<&serde_json::Value> {
        match &response.turn {
            ModelTurn::FinalAnswer { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Execute the tool requested by `response`. `None` when the response
    /// holds no tool-use request.
    pub async fn dispatch(&self, response: &ModelResponse) -> Option<ToolResult> {
        match &response.turn {
            ModelTurn::ToolUseRequest(request) => Some(self.execute(request).await),
            _ => None,
        }
    }

    /// Execute one request. Always yields a result.
    pub async fn execute(&self, request: &ToolUseRequest) -> ToolResult {
        let Some(tool) = self.registry.get(&request.name) else {
            let error = if self.registry.is_intercepted(&request.name) {
                ToolError::NotExecutable(request.name.clone())
            } else {
                ToolError::NotFound(request.name.clone())
            };
            warn!(tool = %request.name, "Model requested a tool that cannot be executed");
            return self.failure(request, &error);
        };

        debug!(tool = %request.name, call_id = %request.call_id, "Executing tool");
        let call = AssertUnwindSafe(tool.execute(request.arguments.clone())).catch_unwind();

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(Ok(payload))) => ToolResult::success(&request.call_id, &request.name, payload),
            Ok(Ok(Err(error))) => {
                warn!(tool = %request.name, error = %error, "Tool execution failed");
                self.failure(request, &error)
            }
            Ok(Err(panic)) => {
                let reason = panic_message(panic.as_ref());
                warn!(tool = %request.name, reason = %reason, "Tool panicked");
                self.failure(
                    request,
                    &ToolError::ExecutionFailed {
                        tool_name: request.name.clone(),
                        reason: format!("tool panicked: {reason}"),
                    },
                )
            }
            Err(_) => {
                warn!(tool = %request.name, timeout_secs = self.timeout.as_secs(), "Tool timed out");
                self.failure(
                    request,
                    &ToolError::Timeout {
                        tool_name: request.name.clone(),
                        timeout_secs: self.timeout.as_secs(),
                    },
                )
            }
        }
    }

    /// Error result fed back when a final answer cannot be extracted.
    pub fn final_answer_failure(call_id: &str, error: &ToolError) -> ToolResult {
        ToolResult::failure(
            call_id,
            FINAL_ANSWER_TOOL,
            error,
            format!(
                "Call {FINAL_ANSWER_TOOL} again with a `comments` array; every comment needs \
                 description, file_path, line_number, confidence_score, bucket and rationale."
            ),
        )
    }

    fn failure(&self, request: &ToolUseRequest, error: &ToolError) -> ToolResult {
        ToolResult::failure(&request.call_id, &request.name, error, self.remediation_hint(error))
    }

    fn remediation_hint(&self, error: &ToolError) -> String {
        match error {
            ToolError::NotFound(_) => format!(
                "Use one of the available tools: {}.",
                self.registry.names().join(", ")
            ),
            ToolError::NotExecutable(name) => {
                format!("{name} submits your answer; pass its input as the final response.")
            }
            ToolError::InvalidArguments(_) => {
                "Check the tool's parameter schema and retry with the required arguments.".into()
            }
            ToolError::PermissionDenied { .. } => {
                "Use paths relative to the repository root without `..`.".into()
            }
            ToolError::Timeout { .. } => "Narrow the request (smaller range or directory) and retry.".into(),
            ToolError::ExecutionFailed { .. } => {
                "Verify the inputs (file exists, directory is correct) or try a different tool.".into()
            }
            ToolError::InvalidFinalAnswer(_) => "Fix the payload and submit it again.".into(),
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
