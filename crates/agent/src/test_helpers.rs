//! Shared test helpers for engine tests.

use async_trait::async_trait;
use reviewloop_core::error::{GatewayError, ToolError};
use reviewloop_core::gateway::{ModelGateway, ModelResponse, QueryRequest, ToolSubmission};
use reviewloop_core::session::SessionContext;
use reviewloop_core::tool::{Tool, ToolRegistry};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A mock gateway that returns a sequence of scripted responses.
///
/// `start_query` and `submit_tool_result` both pop from the same queue.
/// Every request is recorded for later assertions.
pub struct ScriptedGateway {
    responses: Mutex<VecDeque<ModelResponse>>,
    failure: Option<GatewayError>,
    queries: Mutex<Vec<QueryRequest>>,
    submissions: Mutex<Vec<ToolSubmission>>,
}

impl ScriptedGateway {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            failure: None,
            queries: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// A gateway whose every call fails with `error`.
    pub fn failing(error: GatewayError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(vec![])
        }
    }

    pub fn queries(&self) -> Vec<QueryRequest> {
        self.queries.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<ToolSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    fn next(&self) -> Result<ModelResponse, GatewayError> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GatewayError::UnexpectedResponse("script exhausted".into()))
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn start_query(&self, _session: &SessionContext, request: QueryRequest) -> Result<ModelResponse, GatewayError> {
        self.queries.lock().unwrap().push(request);
        self.next()
    }

    async fn submit_tool_result(
        &self,
        _session: &SessionContext,
        submission: ToolSubmission,
    ) -> Result<ModelResponse, GatewayError> {
        self.submissions.lock().unwrap().push(submission);
        self.next()
    }
}

/// A tool that always returns the same payload.
pub struct StaticTool {
    name: String,
    payload: serde_json::Value,
}

impl StaticTool {
    pub fn new(name: &str, payload: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            payload,
        }
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Returns a fixed payload"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        Ok(self.payload.clone())
    }
}

/// A tool that always fails.
pub struct FailingTool {
    name: String,
}

impl FailingTool {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: self.name.clone(),
            reason: "file not found".into(),
        })
    }
}

pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "explode"
    }
    fn description(&self) -> &str {
        "Panics"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        panic!("index out of bounds");
    }
}

pub struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }
    fn description(&self) -> &str {
        "Sleeps for a minute"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(serde_json::Value::Null)
    }
}

/// Registry with `tools` plus the final-answer definition.
pub fn registry_with(tools: Vec<Arc<dyn Tool>>) -> ToolRegistry {
    let mut registry = reviewloop_tools::final_answer_registry();
    for tool in tools {
        registry.register(tool);
    }
    registry
}

/// A valid comment as the model would send it.
pub fn sample_comment(file_path: &str, line: u64) -> serde_json::Value {
    serde_json::json!({
        "description": format!("Unchecked input in {file_path}"),
        "file_path": file_path,
        "line_number": line,
        "confidence_score": 0.95,
        "bucket": "SECURITY",
        "rationale": "value flows from the request into a query"
    })
}

pub fn comments_payload(comments: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({ "comments": comments })
}

/// Log lines written while a [`CapturedLogs`] subscriber is the thread default.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Install a capturing subscriber for the current thread until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_target(false)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
