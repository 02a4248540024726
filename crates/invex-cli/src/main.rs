//! CLI for splitting multi-invoice documents and extracting invoice records.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{annotate, config, dataset, extract, repair, split};

/// Invoice extraction - split documents into invoices and extract records with language models
#[derive(Parser)]
#[command(name = "invex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a document into per-invoice sections
    Split(split::SplitArgs),

    /// Repair a model response into a JSON object
    Repair(repair::RepairArgs),

    /// Extract an invoice record from a file or text
    Extract(extract::ExtractArgs),

    /// Build per-section JSONL datasets from documents
    Dataset(dataset::DatasetArgs),

    /// Export datasets for manual correction and import corrections
    Annotate(annotate::AnnotateArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Split(args) => split::run(args, config_path),
        Commands::Repair(args) => repair::run(args),
        Commands::Extract(args) => extract::run(args, config_path).await,
        Commands::Dataset(args) => dataset::run(args, config_path).await,
        Commands::Annotate(args) => annotate::run(args, config_path),
        Commands::Config(args) => config::run(args),
    }
}
