//! `reviewloop review` — Run the full engine against a replayed transcript.

use reviewloop_agent::{EngineServices, ReviewContext, ReviewRunner};
use reviewloop_core::event::EventBus;
use reviewloop_core::session::SessionContext;
use reviewloop_core::tool::ToolRegistry;
use reviewloop_tools::{RepoRoot, ToolLimits, default_registry, final_answer_registry};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::load_config;
use crate::replay::{ReplayGateway, Transcript};

pub async fn run(
    config_path: Option<&Path>,
    context_path: &Path,
    transcript_path: &Path,
    include: Vec<String>,
    exclude: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    let context: ReviewContext = serde_json::from_str(
        &std::fs::read_to_string(context_path)
            .map_err(|e| format!("Failed to read {}: {e}", context_path.display()))?,
    )?;
    let transcript = Transcript::load(transcript_path)?;

    let tools = build_tools(&context, &config)?;
    info!(tools = ?tools.names(), "Tool catalog ready");

    let gateway = Arc::new(ReplayGateway::new(transcript));
    let services = EngineServices::new(gateway, Arc::new(tools), &config);
    let event_log = spawn_event_log(&services.events);
    let runner = ReviewRunner::new(Arc::new(services), config.runtime.max_concurrent_agents);

    let session = SessionContext::new();
    let include = (!include.is_empty()).then_some(include);
    let report = runner
        .run_pipeline(&session, &config, Arc::new(context), include.as_deref(), &exclude)
        .await;

    // The log task ends once the last sender, held by the runner, is gone.
    drop(runner);
    let events = event_log.await?;
    info!(events, "Review finished");

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Log every engine event at debug level until the bus closes. Returns the
/// number of events seen.
fn spawn_event_log(events: &EventBus) -> JoinHandle<usize> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        let mut seen = 0;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    seen += 1;
                    match serde_json::to_string(event.as_ref()) {
                        Ok(json) => debug!(event = %json, "Engine event"),
                        Err(e) => warn!(error = %e, "Unserializable engine event"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event log fell behind"),
                Err(RecvError::Closed) => break seen,
            }
        }
    })
}

/// Repository tools when the context names a checkout, otherwise only the
/// final-answer tool.
fn build_tools(
    context: &ReviewContext,
    config: &reviewloop_config::AppConfig,
) -> Result<ToolRegistry, Box<dyn std::error::Error>> {
    let Some(root) = &context.repo_root else {
        return Ok(final_answer_registry());
    };
    let repo = RepoRoot::new(root).map_err(|e| format!("Invalid repo_root {}: {e}", root.display()))?;
    let limits = ToolLimits {
        max_results: config.tools.max_results,
        read_chunk_lines: config.tools.read_chunk_lines,
    };
    Ok(default_registry(repo, limits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reviewloop_config::AppConfig;
    use reviewloop_core::event::ReviewEvent;

    #[tokio::test]
    async fn event_log_drains_until_bus_closes() {
        let bus = EventBus::default();
        let handle = spawn_event_log(&bus);
        for agent in ["security", "error"] {
            bus.publish(ReviewEvent::AgentFailed {
                agent: agent.into(),
                error_message: "connection reset".into(),
                timestamp: Utc::now(),
            });
        }
        drop(bus);
        assert_eq!(handle.await.unwrap(), 2);
    }

    #[test]
    fn tools_follow_repo_root() {
        let mut context = ReviewContext::new("t", "d");
        assert_eq!(build_tools(&context, &AppConfig::default()).unwrap().len(), 1);

        let dir = tempfile::tempdir().unwrap();
        context.repo_root = Some(dir.path().to_path_buf());
        let tools = build_tools(&context, &AppConfig::default()).unwrap();
        assert!(tools.contains("grep_search"));
        assert!(tools.contains("iterative_file_reader"));
    }
}
