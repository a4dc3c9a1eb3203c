//! Agent catalog: builds the ordered agent list for a review from settings.
//!
//! Agent kinds form a closed set. Each [`AgentType`] maps to an
//! [`AgentBlueprint`] that knows how to turn settings into a [`ReviewAgent`].

use reviewloop_config::{AgentSettings, AppConfig};
use reviewloop_core::agent::{AgentDescriptor, AgentType};
use reviewloop_core::comment::ReviewComment;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::review_agent::ReviewAgent;

/// How an agent type is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentBlueprint {
    /// Predefined or custom commenter, one or two passes.
    Commenter,
    PrSummary,
    CommentValidator,
    CommentSummarizer,
}

impl AgentBlueprint {
    pub fn for_type(agent_type: AgentType) -> Self {
        match agent_type {
            AgentType::PrSummary => Self::PrSummary,
            AgentType::CommentValidation => Self::CommentValidator,
            AgentType::CommentSummarization => Self::CommentSummarizer,
            _ => Self::Commenter,
        }
    }
}

pub struct AgentFactory;

impl AgentFactory {
    /// Review-stage agents in declaration order, then the PR summary agent.
    ///
    /// `include` restricts the set to the named agents when present;
    /// `exclude` removes names from it. Unknown names are skipped.
    pub fn build_review_agents(config: &AppConfig, include: Option<&[String]>, exclude: &[String]) -> Vec<ReviewAgent> {
        let wanted = |name: &str| {
            include.is_none_or(|names| names.iter().any(|n| n == name)) && !exclude.iter().any(|n| n == name)
        };

        let mut agents = Vec::new();
        if config.code_review_agents.enable {
            for settings in &config.agents {
                if !settings.enable || !wanted(&settings.name) {
                    debug!(agent = %settings.name, "Agent not selected");
                    continue;
                }
                let Some(descriptor) = Self::describe(settings) else {
                    continue;
                };
                let model = Self::model_for(config, &descriptor);
                agents.push(ReviewAgent::commenter(descriptor, model, config.runtime.reflection_enabled));
            }
        } else {
            debug!("Code review agents disabled");
        }

        let summary = AgentType::PrSummary;
        if config.summary_agent.enable && wanted(summary.as_str()) {
            let descriptor = AgentDescriptor::for_type(summary);
            let model = Self::model_for(config, &descriptor);
            agents.push(ReviewAgent::pr_summary(descriptor, model));
        }
        agents
    }

    /// Post-review agents: validator then summarizer. Not subject to
    /// enable flags; both skip themselves when `comments` is empty.
    pub fn build_finalization_agents(comments: Vec<ReviewComment>, config: &AppConfig) -> Vec<ReviewAgent> {
        let comments = Arc::new(comments);
        [AgentType::CommentValidation, AgentType::CommentSummarization]
            .into_iter()
            .map(|agent_type| {
                let model = Self::model_for(config, &AgentDescriptor::for_type(agent_type));
                match AgentBlueprint::for_type(agent_type) {
                    AgentBlueprint::CommentValidator => ReviewAgent::comment_validator(model, comments.clone()),
                    _ => ReviewAgent::comment_summarizer(model, comments.clone()),
                }
            })
            .collect()
    }

    /// Resolve settings to a commenter descriptor, or `None` with a warning
    /// when the name is not a known commenter.
    fn describe(settings: &AgentSettings) -> Option<AgentDescriptor> {
        let agent_type = if settings.is_custom_agent {
            AgentType::CustomCommenterAgent
        } else {
            match settings.name.parse::<AgentType>() {
                Ok(t) if AgentBlueprint::for_type(t) == AgentBlueprint::Commenter && t != AgentType::CustomCommenterAgent => t,
                Ok(t) => {
                    warn!(agent = %settings.name, agent_type = %t, "Not a commenter agent, skipping");
                    return None;
                }
                Err(_) => {
                    warn!(agent = %settings.name, "Unknown agent name, skipping");
                    return None;
                }
            }
        };

        let mut descriptor = AgentDescriptor::for_type(agent_type);
        descriptor.name = settings.name.clone();
        descriptor.is_custom = settings.is_custom_agent;
        descriptor.agent_id = settings.agent_id.clone();
        descriptor.objective = settings.objective.clone();
        descriptor.custom_prompt = settings.custom_prompt.clone();
        descriptor.confidence_threshold = settings.confidence_score;
        match &settings.display_name {
            Some(name) => descriptor.display_name = name.clone(),
            None if settings.is_custom_agent => descriptor.display_name = settings.name.clone(),
            None => {}
        }
        Some(descriptor)
    }

    /// `feature_models` by agent name, then by type, then the type default.
    fn model_for(config: &AppConfig, descriptor: &AgentDescriptor) -> String {
        config
            .feature_models
            .get(&descriptor.name)
            .or_else(|| config.feature_models.get(descriptor.agent_type.as_str()))
            .cloned()
            .unwrap_or_else(|| descriptor.agent_type.default_model().to_string())
    }
}
