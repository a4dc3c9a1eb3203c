//! Review runner: executes a catalog of agents over a bounded worker pool
//! and aggregates their outcomes.
//!
//! Every agent runs as its own tokio task. A failing or panicking agent
//! becomes an attributed [`AgentFailure`]; its siblings are unaffected.

use chrono::Utc;
use reviewloop_config::AppConfig;
use reviewloop_core::agent::{AgentOutput, AgentRunResult, AgentType, TokenAccounting, TokenKind};
use reviewloop_core::comment::ReviewComment;
use reviewloop_core::error::{AgentError, RunError};
use reviewloop_core::event::ReviewEvent;
use reviewloop_core::session::{SessionContext, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::context::ReviewContext;
use crate::dispatcher::panic_message;
use crate::factory::AgentFactory;
use crate::review_agent::ReviewAgent;
use crate::services::EngineServices;

/// An agent that produced no result, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFailure {
    pub agent_name: String,
    pub agent_type: AgentType,
    pub error: String,
}

/// Outcome of one stage. Every submitted agent appears exactly once in
/// `results`, `failures` or `skipped`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewReport {
    pub session_id: SessionId,
    /// Catalog order.
    pub results: Vec<AgentRunResult>,
    /// Catalog order.
    pub failures: Vec<AgentFailure>,
    /// Agents whose precondition was false.
    pub skipped: Vec<String>,
    /// Every executed agent was stopped by its token budget.
    pub is_large_pr: bool,
    pub token_accounting: TokenAccounting,
}

impl ReviewReport {
    fn aggregate(session_id: SessionId, outcomes: Vec<Outcome>, skipped: Vec<String>) -> Self {
        let mut results = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Finished(result) => results.push(result),
                Outcome::Failed(failure) => failures.push(failure),
            }
        }

        let mut token_accounting = TokenAccounting::new();
        for result in &results {
            token_accounting.merge(&result.token_accounting);
        }
        let is_large_pr = !results.is_empty() && results.iter().all(|r| r.prompt_tokens_exceeded);

        Self {
            session_id,
            results,
            failures,
            skipped,
            is_large_pr,
            token_accounting,
        }
    }

    pub fn result(&self, agent_name: &str) -> Option<&AgentRunResult> {
        self.results.iter().find(|r| r.agent_name == agent_name)
    }

    pub fn output(&self, agent_type: AgentType) -> Option<&AgentOutput> {
        self.results
            .iter()
            .find(|r| r.agent_type == agent_type)
            .and_then(|r| r.result.as_ref())
    }

    /// Commenter comments at or above each agent's confidence threshold,
    /// in catalog order.
    pub fn comments(&self) -> Vec<ReviewComment> {
        self.results
            .iter()
            .filter(|r| r.agent_type.is_commenter())
            .filter_map(|r| {
                let verdict = r.result.as_ref()?.as_verdict()?;
                Some(verdict.filter_by_confidence(r.confidence_threshold).comments)
            })
            .flatten()
            .collect()
    }
}

/// Both stages of a review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub review: ReviewReport,
    pub finalization: ReviewReport,
}

enum Outcome {
    Finished(AgentRunResult),
    Failed(AgentFailure),
}

impl From<AgentError> for AgentFailure {
    fn from(e: AgentError) -> Self {
        Self {
            agent_name: e.agent_name.clone(),
            agent_type: e.agent_type,
            error: e.to_string(),
        }
    }
}

pub struct ReviewRunner {
    services: Arc<EngineServices>,
    max_concurrent: usize,
}

impl ReviewRunner {
    pub fn new(services: Arc<EngineServices>, max_concurrent: usize) -> Self {
        Self {
            services,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn services(&self) -> &Arc<EngineServices> {
        &self.services
    }

    /// Run `agents` concurrently and report in catalog order.
    pub async fn run(&self, session: &SessionContext, agents: Vec<ReviewAgent>, context: Arc<ReviewContext>) -> ReviewReport {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut join_set = JoinSet::new();
        let mut tasks = HashMap::new();
        let mut skipped = Vec::new();
        let mut slots: Vec<Option<Outcome>> = Vec::new();

        for (index, agent) in agents.into_iter().enumerate() {
            slots.push(None);
            if !agent.should_execute() {
                info!(agent = %agent.name(), "Precondition not met, skipping agent");
                skipped.push(agent.name().to_string());
                continue;
            }

            let identity = (agent.name().to_string(), agent.agent_type());
            let semaphore = semaphore.clone();
            let services = self.services.clone();
            let context = context.clone();
            let session = session.clone();
            let handle = join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                agent.run(&session, &services, &context).await
            });
            tasks.insert(handle.id(), (index, identity));
        }

        while let Some(joined) = join_set.join_next_with_id().await {
            let (index, outcome) = match joined {
                Ok((id, Ok(result))) => {
                    info!(
                        agent = %result.agent_name,
                        prompt_tokens_exceeded = result.prompt_tokens_exceeded,
                        "Agent finished"
                    );
                    (tasks.get(&id).map(|(i, _)| *i), Outcome::Finished(result))
                }
                Ok((id, Err(e))) => {
                    error!(agent = %e.agent_name, error = %e.source, "Agent failed");
                    (tasks.get(&id).map(|(i, _)| *i), Outcome::Failed(e.into()))
                }
                Err(e) => {
                    let Some((index, (agent_name, agent_type))) = tasks.get(&e.id()).cloned() else {
                        warn!(error = %e, "Join error for an untracked task");
                        continue;
                    };
                    let source = if e.is_panic() {
                        RunError::Panicked(panic_message(&*e.into_panic()))
                    } else {
                        RunError::Cancelled
                    };
                    error!(agent = %agent_name, error = %source, "Agent failed");
                    let failure = AgentError::new(agent_name, agent_type, source);
                    (Some(index), Outcome::Failed(failure.into()))
                }
            };

            if let Outcome::Failed(failure) = &outcome {
                self.services.events.publish(ReviewEvent::AgentFailed {
                    agent: failure.agent_name.clone(),
                    error_message: failure.error.clone(),
                    timestamp: Utc::now(),
                });
            }
            if let Some(slot) = index.and_then(|i| slots.get_mut(i)) {
                *slot = Some(outcome);
            }
        }

        let report = ReviewReport::aggregate(session.session_id.clone(), slots.into_iter().flatten().collect(), skipped);
        info!(
            session = %session.session_id,
            results = report.results.len(),
            failures = report.failures.len(),
            skipped = report.skipped.len(),
            input_tokens = report.token_accounting.total(TokenKind::InputTokens),
            output_tokens = report.token_accounting.total(TokenKind::OutputTokens),
            "Stage finished"
        );
        report
    }

    /// Review stage, then finalization over the review stage's comments.
    pub async fn run_pipeline(
        &self,
        session: &SessionContext,
        config: &AppConfig,
        context: Arc<ReviewContext>,
        include: Option<&[String]>,
        exclude: &[String],
    ) -> PipelineReport {
        let agents = AgentFactory::build_review_agents(config, include, exclude);
        info!(session = %session.session_id, agents = agents.len(), "Starting review stage");
        let review = self.run(session, agents, context.clone()).await;

        if review.is_large_pr {
            warn!(session = %session.session_id, "Every agent exceeded its token budget");
        }

        let comments = review.comments();
        info!(session = %session.session_id, comments = comments.len(), "Starting finalization stage");
        let finalizers = AgentFactory::build_finalization_agents(comments, config);
        let finalization = self.run(session, finalizers, context).await;

        PipelineReport { review, finalization }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedGateway, comments_payload, registry_with, sample_comment};
    use reviewloop_core::agent::AgentDescriptor;
    use reviewloop_core::gateway::ModelResponse;
    use serde_json::json;

    fn runner(gateway: Arc<ScriptedGateway>, config: &AppConfig) -> ReviewRunner {
        let services = EngineServices::new(gateway, Arc::new(registry_with(vec![])), config);
        ReviewRunner::new(Arc::new(services), 2)
    }

    fn commenter(agent_type: AgentType, threshold: f64) -> ReviewAgent {
        let mut descriptor = AgentDescriptor::for_type(agent_type);
        descriptor.confidence_threshold = threshold;
        ReviewAgent::commenter(descriptor, "claude-sonnet-4.5", false)
    }

    #[tokio::test]
    async fn skipped_agents_are_listed_and_not_run() {
        let gateway = Arc::new(ScriptedGateway::new(vec![]));
        let agents = AgentFactory::build_finalization_agents(vec![], &AppConfig::default());
        let report = runner(gateway.clone(), &AppConfig::default())
            .run(&SessionContext::new(), agents, Arc::new(ReviewContext::new("t", "d")))
            .await;
        assert_eq!(report.skipped, vec!["comment_validation", "comment_summarization"]);
        assert!(report.results.is_empty());
        assert!(!report.is_large_pr);
        assert!(report.token_accounting.is_empty());
        assert_eq!(gateway.query_count(), 0);
    }

    #[tokio::test]
    async fn comments_are_filtered_by_agent_threshold() {
        let mut low = sample_comment("a.py", 1);
        low["confidence_score"] = json!(0.4);
        let gateway = Arc::new(ScriptedGateway::new(vec![ModelResponse::final_answer(
            "f",
            comments_payload(vec![sample_comment("a.py", 2), low]),
        )]));
        let report = runner(gateway, &AppConfig::default())
            .run(
                &SessionContext::new(),
                vec![commenter(AgentType::Security, 0.9)],
                Arc::new(ReviewContext::new("t", "d")),
            )
            .await;
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.comments().len(), 1);
        assert!(report.result("security").is_some());
    }

    #[tokio::test]
    async fn stage_accounting_sums_usage_across_agents() {
        let answer = |id| ModelResponse::final_answer(id, comments_payload(vec![]));
        let gateway = Arc::new(ScriptedGateway::new(vec![
            answer("a").with_usage(100, 10),
            answer("b").with_usage(50, 5),
        ]));
        let report = runner(gateway, &AppConfig::default())
            .run(
                &SessionContext::new(),
                vec![commenter(AgentType::Security, 0.9), commenter(AgentType::Error, 0.9)],
                Arc::new(ReviewContext::new("t", "d")),
            )
            .await;
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.token_accounting.total(TokenKind::InputTokens), 150);
        assert_eq!(report.token_accounting.total(TokenKind::OutputTokens), 15);
    }

    #[tokio::test]
    async fn large_pr_when_every_agent_exceeds_budget() {
        let mut config = AppConfig::default();
        config.models.clear();
        let services = EngineServices::new(
            Arc::new(ScriptedGateway::new(vec![])),
            Arc::new(registry_with(vec![])),
            &config,
        )
        .with_tokenizer(
            Arc::new(crate::token::HeuristicTokenizer),
            crate::token::ModelCeilings::new(Default::default()).with_fallback(1),
        );
        let report = ReviewRunner::new(Arc::new(services), 4)
            .run(
                &SessionContext::new(),
                vec![commenter(AgentType::Security, 0.9), commenter(AgentType::Error, 0.9)],
                Arc::new(ReviewContext::new("t", "d")),
            )
            .await;
        assert!(report.is_large_pr);
        assert!(report.results.iter().all(|r| r.result.is_none()));
    }

    #[tokio::test]
    async fn pipeline_feeds_filtered_comments_to_finalization() {
        let mut config = AppConfig::default();
        config.agents.truncate(1);
        config.summary_agent.enable = false;
        config.runtime.reflection_enabled = false;
        let gateway = Arc::new(ScriptedGateway::new(vec![
            ModelResponse::final_answer("f", comments_payload(vec![sample_comment("a.py", 2)])),
            ModelResponse::final_answer("v", comments_payload(vec![sample_comment("a.py", 2)])),
            ModelResponse::final_answer("s", json!({ "comments": [] })),
        ]));
        let report = runner(gateway.clone(), &config)
            .run_pipeline(&SessionContext::new(), &config, Arc::new(ReviewContext::new("t", "d")), None, &[])
            .await;
        assert_eq!(report.review.results.len(), 1);
        assert_eq!(report.finalization.results.len(), 2);
        assert!(report.finalization.output(AgentType::CommentValidation).is_some());
        assert_eq!(gateway.query_count(), 3);
    }
}
