//! Tool trait: the abstraction over reviewer capabilities.
//!
//! Tools let a reviewing model look beyond the diff: read files, grep the
//! repository, locate paths. The model asks for a tool by name; the engine
//! looks it up in the [`ToolRegistry`], executes it, and feeds back a
//! [`ToolResult`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ToolError;
use crate::gateway::ToolDefinition;

/// Name of the designated final-answer tool. A call to it ends the loop
/// instead of being executed.
pub const FINAL_ANSWER_TOOL: &str = "parse_final_response";

/// A request from the model to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseRequest {
    /// Matches the model's tool_use id
    pub call_id: String,

    pub name: String,

    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Structured error fed back to the model instead of a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub tool_name: String,
    pub error_type: String,
    pub error_message: String,
    pub remediation_hint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { payload: serde_json::Value },
    Error(ToolFailure),
}

/// The result of dispatching one [`ToolUseRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, tool_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            outcome: ToolOutcome::Success { payload },
        }
    }

    /// Package a [`ToolError`] with a hint on how the model can recover.
    pub fn failure(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        error: &ToolError,
        remediation_hint: impl Into<String>,
    ) -> Self {
        let tool_name = tool_name.into();
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.clone(),
            outcome: ToolOutcome::Error(ToolFailure {
                tool_name,
                error_type: error.error_type().to_string(),
                error_message: error.to_string(),
                remediation_hint: remediation_hint.into(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Error(_))
    }

    pub fn failure_details(&self) -> Option<&ToolFailure> {
        match &self.outcome {
            ToolOutcome::Error(f) => Some(f),
            ToolOutcome::Success { .. } => None,
        }
    }
}

/// The core Tool trait.
///
/// Each repository tool (file reader, grep, path search) implements this
/// trait and is registered in the [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "grep_search").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A read-only catalog of tools, shared across agents behind an `Arc`.
///
/// Besides executable tools it holds definitions the engine intercepts
/// itself (the final-answer tool): they are advertised to the model but never
/// executed.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    intercepted: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.intercepted.remove(&name);
        self.tools.insert(name, tool);
    }

    /// Advertise a definition that the engine handles without executing.
    pub fn register_definition(&mut self, definition: ToolDefinition) {
        self.tools.remove(&definition.name);
        self.intercepted.insert(definition.name.clone(), definition);
    }

    /// Get an executable tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn is_intercepted(&self, name: &str) -> bool {
        self.intercepted.contains_key(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name) || self.intercepted.contains_key(name)
    }

    /// Definition of a single tool, executable or intercepted.
    pub fn definition(&self, name: &str) -> Option<ToolDefinition> {
        self.tools
            .get(name)
            .map(|t| t.to_definition())
            .or_else(|| self.intercepted.get(name).cloned())
    }

    /// Every definition, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| t.to_definition())
            .chain(self.intercepted.values().cloned())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// All tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .tools
            .keys()
            .chain(self.intercepted.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len() + self.intercepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
