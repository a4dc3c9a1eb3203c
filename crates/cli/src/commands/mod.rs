pub mod agents;
pub mod config_cmd;
pub mod review;

use reviewloop_config::AppConfig;
use std::path::Path;

/// `--config` if given, else the default location with env overrides.
pub(crate) fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok())?;
            config.validate()?;
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}
