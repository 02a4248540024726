//! Config command - manage configuration.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;

use invex_core::InvexConfig;

const OPTIONAL_KEYS: &[&str] = &["llm.api_key"];

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Get a specific configuration value
    Get {
        /// Configuration key (e.g., "llm.text_model")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "extraction.jobs")
        key: String,
        /// New value (parsed as JSON, else taken as a string)
        value: String,
    },

    /// Show configuration file path
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(),
        ConfigCommand::Init(init_args) => init_config(init_args),
        ConfigCommand::Get { key } => get_config(&key),
        ConfigCommand::Set { key, value } => set_config(&key, &value),
        ConfigCommand::Path => show_path(),
    }
}

/// `<config dir>/invex/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invex")
        .join("config.json")
}

/// The saved configuration, or defaults when no file exists yet.
fn stored_config(path: &Path) -> anyhow::Result<Option<InvexConfig>> {
    if path.exists() {
        Ok(Some(InvexConfig::from_file(path)?))
    } else {
        Ok(None)
    }
}

fn show_config() -> anyhow::Result<()> {
    let config = stored_config(&default_config_path())?.unwrap_or_else(|| {
        eprintln!(
            "{} No config file found, showing defaults.",
            style("ℹ").blue()
        );
        InvexConfig::default()
    });

    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

fn init_config(args: InitArgs) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or_else(default_config_path);

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    InvexConfig::default().save(&output_path)?;

    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );

    Ok(())
}

fn get_config(key: &str) -> anyhow::Result<()> {
    let config = stored_config(&default_config_path())?.unwrap_or_default();
    let json = serde_json::to_value(&config)?;

    let value = key
        .split('.')
        .try_fold(&json, |node, part| node.get(part))
        .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;

    println!("{}", serde_json::to_string_pretty(value)?);

    Ok(())
}

fn set_config(key: &str, value: &str) -> anyhow::Result<()> {
    let config_path = default_config_path();
    let config = stored_config(&config_path)?.unwrap_or_default();

    let parsed_value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    let mut json = serde_json::to_value(&config)?;
    let (section_path, field) = key.rsplit_once('.').unwrap_or(("", key));

    let section = section_path
        .split('.')
        .filter(|p| !p.is_empty())
        .try_fold(&mut json, |node, part| node.get_mut(part))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| anyhow::anyhow!("Configuration path not found: {}", key))?;

    // Optional fields are omitted from the serialized config while unset
    if !section.contains_key(field) && !OPTIONAL_KEYS.contains(&key) {
        anyhow::bail!("Configuration key not found: {}", key);
    }
    section.insert(field.to_string(), parsed_value.clone());

    let updated: InvexConfig = serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    updated.save(&config_path)?;

    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(&parsed_value)?
    );

    Ok(())
}

fn show_path() -> anyhow::Result<()> {
    let config_path = default_config_path();

    println!("Configuration file: {}", config_path.display());

    if config_path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'invex config init' to create a configuration file.");
    }

    Ok(())
}
