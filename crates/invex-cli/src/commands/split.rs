//! Split command - cut a document into per-invoice sections.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use invex_core::input::split_document;
use invex_core::{BoundarySegmenter, DocumentText, Section};

use super::{load_config, read_input};

/// Arguments for the split command.
#[derive(Args)]
pub struct SplitArgs {
    /// Input file (PDF or text), or - for stdin
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: SplitFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum SplitFormat {
    /// JSON array of sections
    Json,
    /// Sections separated by headers
    Text,
}

pub fn run(args: SplitArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let sections = if args.input.as_os_str() == "-" {
        let text = DocumentText::new(&read_input(None)?);
        BoundarySegmenter::with_config(&config.segmentation)?.split(&text)
    } else {
        if !args.input.exists() {
            anyhow::bail!("Input file not found: {}", args.input.display());
        }
        split_document(&args.input, &config)?
    };

    info!("Split {} into {} sections", args.input.display(), sections.len());

    let output = match args.format {
        SplitFormat::Json => serde_json::to_string_pretty(&sections)?,
        SplitFormat::Text => format_text(&sections),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} {} sections written to {}",
            style("✓").green(),
            sections.len(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    Ok(())
}

fn format_text(sections: &[Section]) -> String {
    let mut output = String::new();

    for section in sections {
        output.push_str(&format!(
            "=== Section {} ({} tokens) ===\n{}\n\n",
            section.section_id,
            section.token_count(),
            section.text
        ));
    }

    output.trim_end().to_string()
}
