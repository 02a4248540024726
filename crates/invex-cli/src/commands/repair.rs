//! Repair command - turn a raw model response into a JSON object.

use std::path::PathBuf;

use clap::Args;
use console::style;

use invex_core::error::RepairError;
use invex_core::{ModelOutputRepairer, RepairStage};

use super::read_input;

/// Arguments for the repair command.
#[derive(Args)]
pub struct RepairArgs {
    /// File holding the model response (default: stdin)
    input: Option<PathBuf>,

    /// Fall back to truncated-output recovery (quotes bare keys, fills missing values)
    #[arg(long)]
    strict: bool,

    /// Print compact JSON
    #[arg(long)]
    compact: bool,
}

pub fn run(args: RepairArgs) -> anyhow::Result<()> {
    let raw = read_input(args.input.as_ref())?;
    let repairer = ModelOutputRepairer::new();

    let repaired = match repairer.repair(Some(&raw)) {
        Err(err @ RepairError::Unparseable { .. }) if args.strict => {
            repairer.repair_truncated(Some(&raw)).map_err(|_| err)?
        }
        other => other?,
    };

    if repaired.stage != RepairStage::Direct {
        eprintln!(
            "{} Recovered at {} stage",
            style("ℹ").blue(),
            style(repaired.stage).cyan()
        );
    }

    let output = if args.compact {
        serde_json::to_string(&repaired.value)?
    } else {
        serde_json::to_string_pretty(&repaired.value)?
    };
    println!("{}", output);

    Ok(())
}
