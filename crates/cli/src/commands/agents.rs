//! `reviewloop agents` — Show the agent catalog resolved from config.

use reviewloop_agent::AgentFactory;
use std::path::Path;

use super::load_config;

pub async fn run(
    config_path: Option<&Path>,
    include: Vec<String>,
    exclude: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let include = (!include.is_empty()).then_some(include);
    let agents = AgentFactory::build_review_agents(&config, include.as_deref(), &exclude);

    println!("Review agents ({})", agents.len());
    println!("==================");
    for agent in &agents {
        let features: Vec<String> = agent.features().iter().map(ToString::to_string).collect();
        println!(
            "  {:<28} {:<22} passes={}  threshold={:.2}  [{}]",
            agent.name(),
            agent.model(),
            agent.pass_count(),
            agent.descriptor().confidence_threshold,
            features.join(", ")
        );
    }

    let finalizers = AgentFactory::build_finalization_agents(Vec::new(), &config);
    println!();
    println!("Finalization agents (run when comments exist)");
    for agent in &finalizers {
        println!("  {:<28} {}", agent.name(), agent.model());
    }
    Ok(())
}
