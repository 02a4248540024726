//! Extract command - extract an invoice record from a single file or text.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use tracing::{debug, info};

use invex_core::{ChatClient, Extractor, InvoiceRecord};

use super::load_config;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file (PDF, image or text)
    #[arg(required_unless_present = "text", conflicts_with = "text")]
    input: Option<PathBuf>,

    /// Extract from this text instead of a file
    #[arg(long)]
    text: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Recover heavily truncated model output
    #[arg(long)]
    strict: bool,

    /// Validate extracted data
    #[arg(long)]
    validate: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if args.strict {
        config.extraction.strict_recovery = true;
    }

    if let Some(input) = &args.input {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
    }

    let client = ChatClient::new(config.llm.clone())?;
    let extractor = Extractor::new(client, config)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Waiting for the model...");

    let result = match (&args.input, &args.text) {
        (Some(input), _) => {
            info!("Processing file: {}", input.display());
            extractor.extract_file(input).await
        }
        (None, Some(text)) => extractor.extract_text(text).await,
        (None, None) => unreachable!("clap requires an input or --text"),
    };
    pb.finish_and_clear();
    let extraction = result?;

    debug!(
        "Extracted via {:?} model, repaired at {} stage",
        extraction.route, extraction.stage
    );

    if args.validate {
        let issues = extraction.invoice()?.validate();
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    let output = format_record(&extraction.record, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn format_record(record: &Map<String, Value>, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
        OutputFormat::Csv => format_csv(&InvoiceRecord::from_map(record)?),
        OutputFormat::Text => Ok(format_text(&InvoiceRecord::from_map(record)?)),
    }
}

fn format_csv(invoice: &InvoiceRecord) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "invoice_number",
        "date",
        "vendor_name",
        "buyer_name",
        "gst_number",
        "currency",
        "subtotal",
        "tax",
        "total",
        "item_count",
    ])?;

    wtr.write_record([
        cell(&invoice.invoice_number),
        cell(&invoice.date),
        cell(&invoice.vendor_name),
        cell(&invoice.buyer_name),
        cell(&invoice.gst_number),
        cell(&invoice.currency),
        cell(&invoice.subtotal),
        cell(&invoice.tax),
        cell(&invoice.total),
        invoice.items.len().to_string(),
    ])?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn cell<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn format_text(invoice: &InvoiceRecord) -> String {
    let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    let currency = invoice.currency.clone().unwrap_or_default();
    let mut output = String::new();

    output.push_str(&format!("Invoice: {}\n", or_dash(&invoice.invoice_number)));
    output.push_str(&format!("Date: {}\n", or_dash(&invoice.date)));
    output.push_str(&format!("Vendor: {}\n", or_dash(&invoice.vendor_name)));
    output.push_str(&format!("Buyer: {}\n", or_dash(&invoice.buyer_name)));
    if let Some(gst) = &invoice.gst_number {
        output.push_str(&format!("GST: {}\n", gst));
    }

    if !invoice.items.is_empty() {
        output.push_str("\nItems:\n");
        for item in &invoice.items {
            let qty = item.quantity.map(|q| q.to_string()).unwrap_or_else(|| "?".to_string());
            let total = item.total_price.map(|t| t.to_string()).unwrap_or_else(|| "?".to_string());
            output.push_str(&format!(
                "  {} x {} = {} {}\n",
                qty,
                item.name.as_deref().unwrap_or("-"),
                total,
                currency
            ));
        }
    }

    output.push_str("\nSummary:\n");
    for (label, value) in [("Subtotal", invoice.subtotal), ("Tax", invoice.tax), ("Total", invoice.total)] {
        if let Some(value) = value {
            output.push_str(&format!("  {:<9}{} {}\n", format!("{}:", label), value, currency));
        }
    }

    output.trim_end().to_string()
}
