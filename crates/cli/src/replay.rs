//! A model gateway that replays recorded responses.
//!
//! Transcript format:
//!
//! ```json
//! {
//!   "agents": {
//!     "security": [
//!       { "turn": { "type": "tool_use_request", "call_id": "t1", "name": "grep_search",
//!                   "arguments": { "search_terms": ["execute\\("] } } },
//!       { "turn": { "type": "final_answer", "call_id": "f1", "payload": { "comments": [] } },
//!         "usage": { "input": 1200, "output": 80 } }
//!     ]
//!   }
//! }
//! ```
//!
//! Each agent consumes its own queue in order, across passes and rounds.

use async_trait::async_trait;
use reviewloop_core::error::GatewayError;
use reviewloop_core::gateway::{ModelGateway, ModelResponse, QueryRequest, ToolSubmission};
use reviewloop_core::session::SessionContext;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub agents: BTreeMap<String, Vec<ModelResponse>>,
}

impl Transcript {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

pub struct ReplayGateway {
    queues: Mutex<BTreeMap<String, VecDeque<ModelResponse>>>,
}

impl ReplayGateway {
    pub fn new(transcript: Transcript) -> Self {
        let queues = transcript
            .agents
            .into_iter()
            .map(|(agent, responses)| (agent, responses.into()))
            .collect();
        Self {
            queues: Mutex::new(queues),
        }
    }

    fn next(&self, agent: &str) -> Result<ModelResponse, GatewayError> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| GatewayError::UnexpectedResponse("replay state poisoned".into()))?;
        queues
            .get_mut(agent)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| GatewayError::UnexpectedResponse(format!("transcript has no more responses for '{agent}'")))
    }
}

#[async_trait]
impl ModelGateway for ReplayGateway {
    fn name(&self) -> &str {
        "replay"
    }

    async fn start_query(&self, _session: &SessionContext, request: QueryRequest) -> Result<ModelResponse, GatewayError> {
        debug!(agent = %request.agent_name, feature = %request.feature, model = %request.model, "Replaying query");
        self.next(&request.agent_name)
    }

    async fn submit_tool_result(
        &self,
        _session: &SessionContext,
        submission: ToolSubmission,
    ) -> Result<ModelResponse, GatewayError> {
        debug!(
            agent = %submission.agent_name,
            tool = %submission.result.tool_name,
            is_error = submission.result.is_error(),
            final_round = submission.final_round,
            "Replaying tool result"
        );
        self.next(&submission.agent_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewloop_agent::{EngineServices, ReviewContext, ReviewRunner};
    use reviewloop_config::AppConfig;
    use reviewloop_core::gateway::ModelTurn;
    use std::sync::Arc;

    const TRANSCRIPT: &str = r#"{
        "agents": {
            "security": [
                { "turn": { "type": "tool_use_request", "call_id": "t1", "name": "grep_search",
                            "arguments": { "search_terms": ["execute\\("] } } },
                { "turn": { "type": "final_answer", "call_id": "f1",
                            "payload": { "comments": [] } },
                  "usage": { "input": 1200, "output": 80 } }
            ]
        }
    }"#;

    #[test]
    fn transcript_parses_every_turn_kind() {
        let transcript: Transcript = serde_json::from_str(TRANSCRIPT).unwrap();
        let security = &transcript.agents["security"];
        assert!(matches!(security[0].turn, ModelTurn::ToolUseRequest(ref r) if r.name == "grep_search"));
        assert!(matches!(security[1].turn, ModelTurn::FinalAnswer { .. }));
        assert_eq!(security[1].usage.input, 1200);
    }

    #[tokio::test]
    async fn exhausted_transcript_is_a_gateway_error() {
        let gateway = ReplayGateway::new(Transcript::default());
        let err = gateway.next("security").unwrap_err();
        assert!(matches!(err, GatewayError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn replayed_review_runs_end_to_end() {
        let mut config = AppConfig::default();
        config.agents.truncate(1);
        config.summary_agent.enable = false;
        config.runtime.reflection_enabled = false;

        let transcript: Transcript = serde_json::from_str(TRANSCRIPT).unwrap();
        let services = EngineServices::new(
            Arc::new(ReplayGateway::new(transcript)),
            Arc::new(reviewloop_tools::final_answer_registry()),
            &config,
        );
        let runner = ReviewRunner::new(Arc::new(services), 1);
        let report = runner
            .run_pipeline(
                &SessionContext::new(),
                &config,
                Arc::new(ReviewContext::new("t", "d")),
                None,
                &[],
            )
            .await;

        // grep_search is not registered without a repo, so the model sees an
        // error result and then answers.
        assert_eq!(report.review.results.len(), 1);
        assert!(report.review.failures.is_empty());
        assert_eq!(report.finalization.skipped.len(), 2);
    }
}
