//! `reviewloop config` — Configuration management commands.

use reviewloop_config::AppConfig;
use std::path::Path;

use super::load_config;

pub async fn validate(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match load_config(path) {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.code_review_agents.enable {
                warnings.push("Code review agents are disabled globally".to_string());
            }
            if config.agents.iter().all(|a| !a.enable) {
                warnings.push("No agent is enabled".to_string());
            }
            for (agent, model) in &config.feature_models {
                if !config.models.contains_key(model) {
                    warnings.push(format!(
                        "Model '{model}' for '{agent}' has no [models] entry; the default ceiling applies"
                    ));
                }
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Agents:       {}", config.agents.iter().filter(|a| a.enable).count());
            println!("   Iterations:   {}", config.runtime.max_review_tool_iterations);
            println!("   Concurrency:  {}", config.runtime.max_concurrent_agents);
            println!("   Reflection:   {}", if config.runtime.reflection_enabled { "enabled" } else { "disabled" });
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e);
        }
    }

    Ok(())
}

pub async fn show(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => AppConfig::config_dir().join("config.toml"),
    };
    println!("{}", config_path.display());
    Ok(())
}

pub async fn default() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::default_toml());
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = reviewloop_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        std::fs::write(&file, "[runtime]\nmax_review_tool_iterations = 3\n").unwrap();
        let config = super::load_config(Some(file.as_path())).unwrap();
        assert_eq!(config.runtime.max_review_tool_iterations, 3);
    }
}
