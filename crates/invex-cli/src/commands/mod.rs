pub mod annotate;
pub mod config;
pub mod dataset;
pub mod extract;
pub mod repair;
pub mod split;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use invex_core::InvexConfig;

/// Load configuration from `path`, else the default config file if it
/// exists, else defaults. Environment variables are applied on top.
pub fn load_config(path: Option<&str>) -> anyhow::Result<InvexConfig> {
    let mut config = match path {
        Some(path) => InvexConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to read config file {}", path))?,
        None => {
            let default_path = config::default_config_path();
            if default_path.exists() {
                debug!("Using config file {}", default_path.display());
                InvexConfig::from_file(&default_path)
                    .with_context(|| format!("Failed to read config file {}", default_path.display()))?
            } else {
                InvexConfig::default()
            }
        }
    };

    config.apply_env();
    Ok(config)
}

/// Read a whole input: a file, or stdin for `-` or no path.
pub fn read_input(input: Option<&PathBuf>) -> anyhow::Result<String> {
    match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}
