//! Dataset command - split documents and record per-section model output.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{error, warn};

use invex_core::dataset::{DatasetRecord, DatasetWriter, RunReport};
use invex_core::{ChatClient, Extractor, InvexConfig};

use super::load_config;

/// Arguments for the dataset command.
#[derive(Args)]
pub struct DatasetArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory (default: dataset.output_dir from config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Concurrent model requests per document
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Also write a run report per document
    #[arg(long)]
    report: bool,

    /// Continue processing on errors
    #[arg(long)]
    continue_on_error: bool,
}

/// Outcome of one document.
struct FileOutcome {
    path: PathBuf,
    sections: usize,
    failed_sections: usize,
    error: Option<String>,
}

pub async fn run(args: DatasetArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(jobs) = args.jobs {
        config.extraction.jobs = jobs.max(1);
    }
    if let Some(dir) = &args.output_dir {
        config.dataset.output_dir = dir.clone();
    }

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let client = ChatClient::new(config.llm.clone())?;
    let extractor = Extractor::new(client, config)?;

    let multi_progress = MultiProgress::new();
    let overall_pb = multi_progress.add(ProgressBar::new(files.len() as u64));
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut outcomes = Vec::with_capacity(files.len());

    for path in files {
        overall_pb.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        match process_file(&path, &extractor, args.report).await {
            Ok((sections, failed_sections)) => outcomes.push(FileOutcome {
                path,
                sections,
                failed_sections,
                error: None,
            }),
            Err(e) => {
                let error_msg = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), error_msg);
                    outcomes.push(FileOutcome {
                        path,
                        sections: 0,
                        failed_sections: 0,
                        error: Some(error_msg),
                    });
                } else {
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    anyhow::bail!("Processing failed: {}", error_msg);
                }
            }
        }

        overall_pb.inc(1);
    }

    overall_pb.finish_with_message("Complete");

    let total_sections: usize = outcomes.iter().map(|o| o.sections).sum();
    let failed_sections: usize = outcomes.iter().map(|o| o.failed_sections).sum();
    let failed: Vec<_> = outcomes.iter().filter(|o| o.error.is_some()).collect();

    println!();
    println!(
        "{} Processed {} files ({} sections) in {:?}",
        style("✓").green(),
        outcomes.len(),
        total_sections,
        start.elapsed()
    );
    println!(
        "   {} sections extracted, {} sections failed",
        style(total_sections - failed_sections).green(),
        style(failed_sections).red()
    );
    println!(
        "   Datasets in {}",
        extractor.config().dataset.output_dir.display()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in &failed {
            println!(
                "  - {}: {}",
                outcome.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// Split one document, extract every section and append the dataset.
///
/// Returns the section count and how many sections failed.
async fn process_file(
    path: &Path,
    extractor: &Extractor<ChatClient>,
    write_report: bool,
) -> anyhow::Result<(usize, usize)> {
    let config: &InvexConfig = extractor.config();
    let sections = extractor.split_file(path)?;
    let results = extractor.extract_sections(&sections).await;

    let writer = DatasetWriter::create(&config.dataset.output_dir, path)?;
    let mut report = RunReport::new(path);
    let mut failed = 0;

    for result in &results {
        if result.is_error() {
            failed += 1;
        }
        writer.append(&DatasetRecord::new(
            path,
            result.section_id,
            result.text.clone(),
            result.output.clone(),
        ))?;
        report.push(
            result.section_id,
            &result.text,
            result.output.clone(),
            config.extraction.snippet_chars,
        );
    }

    if write_report {
        report.write(&config.dataset.output_dir)?;
    }

    Ok((results.len(), failed))
}
