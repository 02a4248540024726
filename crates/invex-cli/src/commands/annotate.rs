//! Annotate command - round trip datasets through manual correction.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use invex_core::dataset::{export_for_annotation, import_corrected};

use super::load_config;

/// Arguments for the annotate command.
#[derive(Args)]
pub struct AnnotateArgs {
    #[command(subcommand)]
    command: AnnotateCommand,

    /// Gold directory (default: <dataset.output_dir>/gold)
    #[arg(long, global = true)]
    gold_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum AnnotateCommand {
    /// Export a JSONL dataset as an editable JSON array
    Export {
        /// Dataset file (.jsonl)
        dataset: PathBuf,
    },

    /// Append a corrected JSON array to corrected_gold.jsonl
    Import {
        /// Corrected annotation file
        annotated: PathBuf,
    },
}

pub fn run(args: AnnotateArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let gold_dir = match args.gold_dir {
        Some(dir) => dir,
        None => load_config(config_path)?.dataset.gold_dir(),
    };

    match args.command {
        AnnotateCommand::Export { dataset } => {
            let path = export_for_annotation(&dataset, &gold_dir)?;
            println!(
                "{} Exported for annotation: {}",
                style("✓").green(),
                path.display()
            );
        }
        AnnotateCommand::Import { annotated } => {
            let (path, count) = import_corrected(&annotated, &gold_dir)?;
            println!(
                "{} Imported {} corrected records into {}",
                style("✓").green(),
                count,
                path.display()
            );
        }
    }

    Ok(())
}
