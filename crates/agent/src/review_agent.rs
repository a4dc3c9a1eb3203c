//! A reviewing agent and its pass controller.
//!
//! An agent owns one review dimension and runs one or two passes. Each pass:
//!
//! 1. builds prompt variables (pass 2 also gets pass 1's result),
//! 2. renders messages and checks them against the model's token ceiling,
//! 3. calls the model and hands the response to the [`IterationController`].
//!
//! A budget breach stops the agent immediately with
//! `prompt_tokens_exceeded = true` and no further passes.
//!
//! [`IterationController`]: crate::iteration::IterationController

use chrono::Utc;
use reviewloop_core::agent::{
    AgentDescriptor, AgentOutput, AgentRunResult, AgentType, PromptFeature, TokenAccounting, TokenKind,
};
use reviewloop_core::comment::ReviewComment;
use reviewloop_core::error::{AgentError, RunError};
use reviewloop_core::event::ReviewEvent;
use reviewloop_core::gateway::QueryRequest;
use reviewloop_core::prompt::PromptVariables;
use reviewloop_core::session::SessionContext;
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::ReviewContext;
use crate::iteration::{PassScope, ResultFormat, Terminal};
use crate::services::EngineServices;

#[derive(Debug, Clone)]
enum AgentRole {
    Commenter,
    PrSummary,
    /// Validation and summarization of comments from the review stage.
    Finalization { comments: Arc<Vec<ReviewComment>> },
}

#[derive(Debug, Clone)]
pub struct ReviewAgent {
    descriptor: AgentDescriptor,
    model: String,
    features: Vec<PromptFeature>,
    format: ResultFormat,
    role: AgentRole,
}

impl ReviewAgent {
    /// A commenter runs a reflection pass when `reflection` is set.
    pub fn commenter(descriptor: AgentDescriptor, model: impl Into<String>, reflection: bool) -> Self {
        let passes: &[u8] = if reflection { &[1, 2] } else { &[1] };
        let features = passes
            .iter()
            .map(|&pass| {
                if descriptor.is_custom {
                    PromptFeature::CustomAgentCommentsGeneration { pass }
                } else {
                    PromptFeature::CommentsGeneration {
                        agent: descriptor.agent_type,
                        pass,
                    }
                }
            })
            .collect();
        Self {
            descriptor,
            model: model.into(),
            features,
            format: ResultFormat::Comments,
            role: AgentRole::Commenter,
        }
    }

    pub fn pr_summary(descriptor: AgentDescriptor, model: impl Into<String>) -> Self {
        Self {
            descriptor,
            model: model.into(),
            features: vec![PromptFeature::PrSummary],
            format: ResultFormat::Raw,
            role: AgentRole::PrSummary,
        }
    }

    pub fn comment_validator(model: impl Into<String>, comments: Arc<Vec<ReviewComment>>) -> Self {
        Self {
            descriptor: AgentDescriptor::for_type(AgentType::CommentValidation),
            model: model.into(),
            features: vec![PromptFeature::CommentValidation],
            format: ResultFormat::Comments,
            role: AgentRole::Finalization { comments },
        }
    }

    pub fn comment_summarizer(model: impl Into<String>, comments: Arc<Vec<ReviewComment>>) -> Self {
        Self {
            descriptor: AgentDescriptor::for_type(AgentType::CommentSummarization),
            model: model.into(),
            features: vec![PromptFeature::CommentSummarization],
            format: ResultFormat::Raw,
            role: AgentRole::Finalization { comments },
        }
    }

    pub fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn agent_type(&self) -> AgentType {
        self.descriptor.agent_type
    }

    pub fn display_name(&self) -> &str {
        &self.descriptor.display_name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn features(&self) -> &[PromptFeature] {
        &self.features
    }

    pub fn pass_count(&self) -> usize {
        self.features.len()
    }

    /// Cheap precondition. Finalization agents have nothing to do without
    /// comments.
    pub fn should_execute(&self) -> bool {
        match &self.role {
            AgentRole::Finalization { comments } => !comments.is_empty(),
            AgentRole::Commenter | AgentRole::PrSummary => true,
        }
    }

    /// Run every pass and return the result record, or the fault with this
    /// agent's identity attached.
    pub async fn run(
        &self,
        session: &SessionContext,
        services: &EngineServices,
        context: &ReviewContext,
    ) -> Result<AgentRunResult, AgentError> {
        services.events.publish(ReviewEvent::AgentStarted {
            agent: self.name().to_string(),
            agent_type: self.agent_type(),
            model: self.model.clone(),
            timestamp: Utc::now(),
        });
        self.run_passes(session, services, context)
            .await
            .map_err(|e| AgentError::new(self.name(), self.agent_type(), e))
    }

    async fn run_passes(
        &self,
        session: &SessionContext,
        services: &EngineServices,
        context: &ReviewContext,
    ) -> Result<AgentRunResult, RunError> {
        let controller = services.controller();
        let mut accounting = TokenAccounting::new();
        let mut last: Option<AgentOutput> = None;

        for (index, feature) in self.features.iter().enumerate() {
            let pass = index + 1;
            let key = TokenAccounting::pass_key(self.name(), pass);
            let variables = self.build_variables(context, pass, last.as_ref());
            let messages = services.renderer.render(feature, &self.model, &variables)?;

            let extras = self.extra_tokens(services, context);
            let verdict = services.guard.evaluate(&messages, &extras, &self.model);
            accounting.record_pass(&key, verdict.tokens.clone());

            if verdict.exceeded {
                info!(
                    agent = %self.name(),
                    pass,
                    tokens = verdict.total,
                    ceiling = verdict.ceiling,
                    "Prompt token limit exceeded, skipping agent"
                );
                services.events.publish(ReviewEvent::TokenBudgetExceeded {
                    agent: self.name().to_string(),
                    pass,
                    tokens: verdict.total,
                    ceiling: verdict.ceiling,
                    timestamp: Utc::now(),
                });
                return Ok(AgentRunResult::budget_exceeded(&self.descriptor, &self.model, accounting));
            }

            let tools = services.tool_catalog(messages.disable_tools);
            let request = QueryRequest {
                agent_name: self.name().to_string(),
                feature: feature.clone(),
                model: self.model.clone(),
                messages,
                variables,
                tools: tools.clone(),
            };
            let initial = session
                .guard(services.gateway.start_query(session, request))
                .await??;
            accounting.add_usage(&key, initial.usage.input, initial.usage.output);
            services.events.publish(ReviewEvent::ModelCalled {
                agent: self.name().to_string(),
                pass,
                round: 0,
                input_tokens: initial.usage.input,
                output_tokens: initial.usage.output,
                timestamp: Utc::now(),
            });

            let scope = PassScope {
                agent_name: self.name(),
                feature,
                model: &self.model,
                pass,
                tools: &tools,
                format: self.format,
            };
            let outcome = controller.run(session, scope, initial).await?;
            accounting.add_usage(&key, outcome.usage.input, outcome.usage.output);
            debug!(agent = %self.name(), pass, rounds = outcome.rounds, "Pass finished");

            last = match outcome.terminal {
                Terminal::Success(output) => Some(output),
                Terminal::Empty(_) => self.format.empty_output(),
            };
        }

        let comments = last
            .as_ref()
            .and_then(AgentOutput::as_verdict)
            .map_or(0, |v| v.comments.len());
        services.events.publish(ReviewEvent::AgentFinished {
            agent: self.name().to_string(),
            prompt_tokens_exceeded: false,
            comments,
            timestamp: Utc::now(),
        });

        Ok(AgentRunResult {
            agent_name: self.name().to_string(),
            agent_type: self.agent_type(),
            model: self.model.clone(),
            display_name: self.display_name().to_string(),
            prompt_tokens_exceeded: false,
            result: last,
            token_accounting: accounting,
            confidence_threshold: self.descriptor.confidence_threshold,
        })
    }

    fn build_variables(&self, context: &ReviewContext, pass: usize, previous: Option<&AgentOutput>) -> PromptVariables {
        let mut vars = context
            .base_variables()
            .with(PromptVariables::AGENT_NAME, self.name())
            .with(PromptVariables::AGENT_OBJECTIVE, &self.descriptor.objective)
            .with(PromptVariables::CUSTOM_PROMPT, &self.descriptor.custom_prompt)
            .with(PromptVariables::BUCKET, self.descriptor.bucket());

        if pass >= 2 {
            vars.insert(
                PromptVariables::REVIEW_COMMENTS_BY_JUNIOR_DEVELOPER,
                serialize_previous(previous),
            );
        }
        if let AgentRole::Finalization { comments } = &self.role {
            vars.insert(PromptVariables::COMMENTS, serialize_comments(comments));
        }
        vars
    }

    fn extra_tokens(&self, services: &EngineServices, context: &ReviewContext) -> Vec<(TokenKind, u64)> {
        match &self.role {
            AgentRole::Commenter | AgentRole::PrSummary => {
                vec![(TokenKind::PrDiffTokens, services.guard.count(&context.numbered_diff()))]
            }
            AgentRole::Finalization { comments } => {
                vec![(TokenKind::CommentsTokens, services.guard.count(&serialize_comments(comments)))]
            }
        }
    }
}

/// Pass 1's result as handed to pass 2. An absent result is an empty list.
fn serialize_previous(previous: Option<&AgentOutput>) -> String {
    let serialized = match previous {
        Some(AgentOutput::Verdict(verdict)) => serde_json::to_string(&verdict.comments),
        Some(AgentOutput::Raw(value)) => serde_json::to_string(value),
        None => return "[]".into(),
    };
    serialized.unwrap_or_else(|_| "[]".into())
}

fn serialize_comments(comments: &[ReviewComment]) -> String {
    serde_json::to_string(comments).unwrap_or_else(|_| "[]".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedGateway, comments_payload, registry_with, sample_comment};
    use reviewloop_config::AppConfig;
    use reviewloop_core::comment::ReviewVerdict;
    use reviewloop_core::error::GatewayError;
    use reviewloop_core::gateway::ModelResponse;

    fn services(gateway: Arc<ScriptedGateway>) -> EngineServices {
        EngineServices::new(gateway, Arc::new(registry_with(vec![])), &AppConfig::default())
    }

    fn security(reflection: bool) -> ReviewAgent {
        ReviewAgent::commenter(AgentDescriptor::for_type(AgentType::Security), "claude-sonnet-4.5", reflection)
    }

    #[test]
    fn pass_features_follow_reflection_switch() {
        assert_eq!(security(true).pass_count(), 2);
        assert_eq!(security(false).pass_count(), 1);
        assert_eq!(
            security(true).features()[1].id(),
            "security_comments_generation_pass_2"
        );

        let mut custom = AgentDescriptor::for_type(AgentType::CustomCommenterAgent);
        custom.is_custom = true;
        let agent = ReviewAgent::commenter(custom, "m", true);
        assert_eq!(agent.features()[0], PromptFeature::CustomAgentCommentsGeneration { pass: 1 });
    }

    #[test]
    fn finalization_agents_skip_without_comments() {
        assert!(!ReviewAgent::comment_validator("gpt-4.1", Arc::new(vec![])).should_execute());
        assert!(security(true).should_execute());
    }

    #[tokio::test]
    async fn single_pass_records_usage_under_pass_key() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            ModelResponse::final_answer("f", comments_payload(vec![sample_comment("a.py", 1)])).with_usage(300, 30),
        ]));
        let result = security(false)
            .run(&SessionContext::new(), &services(gateway.clone()), &ReviewContext::new("t", "d"))
            .await
            .unwrap();
        assert!(!result.prompt_tokens_exceeded);
        let pass = result.token_accounting.get("security_PASS_1").unwrap();
        assert_eq!(pass[&TokenKind::InputTokens], 300);
        assert_eq!(pass[&TokenKind::OutputTokens], 30);
        assert!(pass.contains_key(&TokenKind::PrDiffTokens));
        assert_eq!(gateway.query_count(), 1);
        assert_eq!(gateway.queries()[0].tools.len(), 1);
    }

    #[tokio::test]
    async fn empty_pass_one_still_feeds_pass_two() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            ModelResponse::no_tool("nothing to add"),
            ModelResponse::final_answer("f", comments_payload(vec![])),
        ]));
        let result = security(true)
            .run(&SessionContext::new(), &services(gateway.clone()), &ReviewContext::new("t", "d"))
            .await
            .unwrap();
        let queries = gateway.queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(
            queries[1].variables.get(PromptVariables::REVIEW_COMMENTS_BY_JUNIOR_DEVELOPER),
            Some("[]")
        );
        assert!(!queries[0].variables.contains(PromptVariables::REVIEW_COMMENTS_BY_JUNIOR_DEVELOPER));
        assert_eq!(result.result, Some(AgentOutput::Verdict(ReviewVerdict::empty())));
    }

    #[tokio::test]
    async fn gateway_failure_is_attributed() {
        let gateway = Arc::new(ScriptedGateway::failing(GatewayError::RateLimited { retry_after_secs: 30 }));
        let err = security(true)
            .run(&SessionContext::new(), &services(gateway), &ReviewContext::new("t", "d"))
            .await
            .unwrap_err();
        assert_eq!(err.agent_name, "security");
        assert_eq!(err.agent_type, AgentType::Security);
        assert!(matches!(err.source, RunError::Gateway(GatewayError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn summary_agent_without_answer_has_no_result() {
        let gateway = Arc::new(ScriptedGateway::new(vec![ModelResponse::no_tool("Adds a cache.")]));
        let agent = ReviewAgent::pr_summary(AgentDescriptor::for_type(AgentType::PrSummary), "gpt-4o");
        let result = agent
            .run(&SessionContext::new(), &services(gateway.clone()), &ReviewContext::new("t", "d"))
            .await
            .unwrap();
        assert_eq!(result.result, None);
        assert!(!result.prompt_tokens_exceeded);
    }

    #[tokio::test]
    async fn validator_receives_comments_variable() {
        let comments: Vec<ReviewComment> =
            ReviewVerdict::from_final_answer(&comments_payload(vec![sample_comment("a.py", 4)]))
                .unwrap()
                .comments;
        let gateway = Arc::new(ScriptedGateway::new(vec![ModelResponse::final_answer(
            "f",
            comments_payload(vec![sample_comment("a.py", 4)]),
        )]));
        let agent = ReviewAgent::comment_validator("gpt-4.1", Arc::new(comments));
        let result = agent
            .run(&SessionContext::new(), &services(gateway.clone()), &ReviewContext::new("t", "d"))
            .await
            .unwrap();
        let vars = &gateway.queries()[0].variables;
        assert!(vars.get(PromptVariables::COMMENTS).unwrap().contains("a.py"));
        assert!(result.token_accounting.get("comment_validation_PASS_1").unwrap().contains_key(&TokenKind::CommentsTokens));
    }
}
