//! Agent identity, prompt features, token accounting, and run results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::comment::ReviewVerdict;

/// The closed set of reviewer kinds the engine knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Security,
    CodeMaintainability,
    CodeCommunication,
    Error,
    PerformanceOptimization,
    BusinessLogicValidation,
    CustomCommenterAgent,
    PrSummary,
    CommentValidation,
    CommentSummarization,
}

impl AgentType {
    /// Predefined commenter types, in declaration order.
    pub const COMMENTERS: [AgentType; 6] = [
        AgentType::Security,
        AgentType::CodeMaintainability,
        AgentType::CodeCommunication,
        AgentType::Error,
        AgentType::PerformanceOptimization,
        AgentType::BusinessLogicValidation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::CodeMaintainability => "code_maintainability",
            Self::CodeCommunication => "code_communication",
            Self::Error => "error",
            Self::PerformanceOptimization => "performance_optimization",
            Self::BusinessLogicValidation => "business_logic_validation",
            Self::CustomCommenterAgent => "custom_commenter_agent",
            Self::PrSummary => "pr_summary",
            Self::CommentValidation => "comment_validation",
            Self::CommentSummarization => "comment_summarization",
        }
    }

    /// Whether agents of this type produce review comments.
    pub fn is_commenter(&self) -> bool {
        Self::COMMENTERS.contains(self) || *self == Self::CustomCommenterAgent
    }

    /// Model used when `feature_models` does not override it.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::PrSummary => "gpt-4o",
            Self::CommentValidation | Self::CommentSummarization => "gpt-4.1",
            _ => "claude-sonnet-4.5",
        }
    }

    /// Human-readable name used when settings do not provide one.
    pub fn default_display_name(&self) -> &'static str {
        match self {
            Self::Security => "Security",
            Self::CodeMaintainability => "Code Maintainability",
            Self::CodeCommunication => "Code Communication",
            Self::Error => "Error",
            Self::PerformanceOptimization => "Performance Optimization",
            Self::BusinessLogicValidation => "Business Logic Validation",
            Self::CustomCommenterAgent => "Custom Agent",
            Self::PrSummary => "PR Summary",
            Self::CommentValidation => "Comment Validation",
            Self::CommentSummarization => "Comment Summarization",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        [
            Self::Security,
            Self::CodeMaintainability,
            Self::CodeCommunication,
            Self::Error,
            Self::PerformanceOptimization,
            Self::BusinessLogicValidation,
            Self::CustomCommenterAgent,
            Self::PrSummary,
            Self::CommentValidation,
            Self::CommentSummarization,
        ]
        .into_iter()
        .find(|t| t.as_str() == normalized)
        .ok_or_else(|| format!("unknown agent type: {s}"))
    }
}

/// A prompt template identifier. Each agent holds an ordered list of one or
/// two of these, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptFeature {
    CommentsGeneration { agent: AgentType, pass: u8 },
    CustomAgentCommentsGeneration { pass: u8 },
    PrSummary,
    CommentValidation,
    CommentSummarization,
}

impl PromptFeature {
    /// Stable template id, e.g. `security_comments_generation_pass_1`.
    pub fn id(&self) -> String {
        match self {
            Self::CommentsGeneration { agent, pass } => {
                format!("{}_comments_generation_pass_{pass}", agent.as_str())
            }
            Self::CustomAgentCommentsGeneration { pass } => {
                format!("custom_agent_comments_generation_pass_{pass}")
            }
            Self::PrSummary => "pr_summary_generation".into(),
            Self::CommentValidation => "comment_validation".into(),
            Self::CommentSummarization => "comment_summarization".into(),
        }
    }
}

impl fmt::Display for PromptFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Immutable description of one agent, built once per review from settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub agent_type: AgentType,

    /// Settings key. Custom agents are identified by this name.
    pub name: String,

    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    #[serde(default)]
    pub objective: String,

    #[serde(default)]
    pub custom_prompt: String,

    /// Comments scoring below this are dropped from the report.
    pub confidence_threshold: f64,

    #[serde(default)]
    pub is_custom: bool,
}

impl AgentDescriptor {
    /// Descriptor with defaults derived from the agent type.
    pub fn for_type(agent_type: AgentType) -> Self {
        Self {
            agent_type,
            name: agent_type.as_str().to_string(),
            display_name: agent_type.default_display_name().to_string(),
            agent_id: None,
            objective: String::new(),
            custom_prompt: String::new(),
            confidence_threshold: 0.0,
            is_custom: false,
        }
    }

    /// Bucket label for comments this agent produces: `Code Maintainability`
    /// becomes `CODE_MAINTAINABILITY`.
    pub fn bucket(&self) -> String {
        self.display_name
            .split_whitespace()
            .map(|w| w.to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// A kind of token count recorded per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    SystemPrompt,
    UserPrompt,
    PrDiffTokens,
    CommentsTokens,
    InputTokens,
    OutputTokens,
}

/// Token counts for one pass.
pub type PassTokens = BTreeMap<TokenKind, u64>;

/// Per-pass token counts for one agent run, keyed `{agent_name}_PASS_{n}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAccounting {
    passes: BTreeMap<String, PassTokens>,
}

impl TokenAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass_key(agent_name: &str, pass: usize) -> String {
        format!("{agent_name}_PASS_{pass}")
    }

    /// Replace the counts recorded under `key`.
    pub fn record_pass(&mut self, key: impl Into<String>, tokens: PassTokens) {
        self.passes.insert(key.into(), tokens);
    }

    /// Add gateway usage counters to an existing (or new) pass entry.
    pub fn add_usage(&mut self, key: &str, input: u64, output: u64) {
        let entry = self.passes.entry(key.to_string()).or_default();
        *entry.entry(TokenKind::InputTokens).or_default() += input;
        *entry.entry(TokenKind::OutputTokens).or_default() += output;
    }

    pub fn get(&self, key: &str) -> Option<&PassTokens> {
        self.passes.get(key)
    }

    pub fn passes(&self) -> impl Iterator<Item = (&String, &PassTokens)> {
        self.passes.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Sum of one kind across all passes.
    pub fn total(&self, kind: TokenKind) -> u64 {
        self.passes
            .values()
            .filter_map(|p| p.get(&kind))
            .sum()
    }

    /// Fold another accounting into this one. Entries with the same key are summed.
    pub fn merge(&mut self, other: &TokenAccounting) {
        for (key, tokens) in &other.passes {
            let entry = self.passes.entry(key.clone()).or_default();
            for (kind, count) in tokens {
                *entry.entry(*kind).or_default() += count;
            }
        }
    }
}

/// The terminal payload of an agent's last pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentOutput {
    /// Structured comments from commenter and validation agents.
    Verdict(ReviewVerdict),
    /// Free-form payload (summary agents).
    Raw(serde_json::Value),
}

impl AgentOutput {
    pub fn as_verdict(&self) -> Option<&ReviewVerdict> {
        match self {
            Self::Verdict(v) => Some(v),
            Self::Raw(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Verdict(v) => serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
            Self::Raw(v) => v.clone(),
        }
    }
}

/// The sole artifact an agent run hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunResult {
    pub agent_name: String,
    pub agent_type: AgentType,
    pub model: String,
    pub display_name: String,
    pub prompt_tokens_exceeded: bool,
    pub result: Option<AgentOutput>,
    pub token_accounting: TokenAccounting,
    pub confidence_threshold: f64,
}

impl AgentRunResult {
    /// Result for an agent stopped by the token budget guard.
    pub fn budget_exceeded(descriptor: &AgentDescriptor, model: &str, accounting: TokenAccounting) -> Self {
        Self {
            agent_name: descriptor.name.clone(),
            agent_type: descriptor.agent_type,
            model: model.to_string(),
            display_name: descriptor.display_name.clone(),
            prompt_tokens_exceeded: true,
            result: None,
            token_accounting: accounting,
            confidence_threshold: descriptor.confidence_threshold,
        }
    }
}
