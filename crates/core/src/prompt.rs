//! Prompt variables and the renderer trait.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::agent::PromptFeature;
use crate::error::PromptError;

/// Ephemeral key→value map built fresh for each pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptVariables(BTreeMap<String, String>);

impl PromptVariables {
    pub const PULL_REQUEST_TITLE: &'static str = "PULL_REQUEST_TITLE";
    pub const PULL_REQUEST_DESCRIPTION: &'static str = "PULL_REQUEST_DESCRIPTION";
    pub const PULL_REQUEST_DIFF: &'static str = "PULL_REQUEST_DIFF";
    pub const PR_DIFF_WITHOUT_LINE_NUMBER: &'static str = "PR_DIFF_WITHOUT_LINE_NUMBER";
    pub const USER_STORY: &'static str = "USER_STORY";
    pub const AGENT_OBJECTIVE: &'static str = "AGENT_OBJECTIVE";
    pub const CUSTOM_PROMPT: &'static str = "CUSTOM_PROMPT";
    pub const BUCKET: &'static str = "BUCKET";
    pub const AGENT_NAME: &'static str = "AGENT_NAME";
    /// Pass 1's serialized result, injected into pass 2.
    pub const REVIEW_COMMENTS_BY_JUNIOR_DEVELOPER: &'static str = "REVIEW_COMMENTS_BY_JUNIOR_DEVELOPER";
    /// Comments handed to the finalization agents.
    pub const COMMENTS: &'static str = "COMMENTS";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// System and user messages rendered for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessages {
    pub system: String,
    pub user: String,

    /// When set, only the final-answer tool is attached to the call.
    #[serde(default)]
    pub disable_tools: bool,
}

/// Turns (feature, model, variables) into messages.
pub trait PromptRenderer: Send + Sync {
    fn render(
        &self,
        feature: &PromptFeature,
        model: &str,
        variables: &PromptVariables,
    ) -> Result<RenderedMessages, PromptError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_builder() {
        let vars = PromptVariables::new()
            .with(PromptVariables::PULL_REQUEST_TITLE, "Fix login")
            .with(PromptVariables::USER_STORY, "");
        assert_eq!(vars.get(PromptVariables::PULL_REQUEST_TITLE), Some("Fix login"));
        assert!(vars.contains(PromptVariables::USER_STORY));
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn variables_serialize_as_plain_map() {
        let vars = PromptVariables::new().with("A", "1");
        assert_eq!(serde_json::to_string(&vars).unwrap(), r#"{"A":"1"}"#);
    }
}
