//! Dataset sinks for extraction runs and the annotation round trip.
//!
//! A dataset is a JSONL file with one [`DatasetRecord`] per section. For
//! manual correction it is exported as a pretty JSON array into the gold
//! directory; corrected arrays are appended back as JSONL to
//! `corrected_gold.jsonl`.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ExtractionError, Result};

/// File corrected annotations are appended to.
pub const CORRECTED_GOLD_FILE: &str = "corrected_gold.jsonl";

/// Subdirectory of the output directory holding run reports.
pub const RUN_OUTPUTS_DIR: &str = "run_outputs";

/// One section of a source document with the model's record for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub file: String,
    pub section_id: u32,
    pub text: String,
    /// Completed record, or `{"error": message}`.
    pub model_output: Value,
}

impl DatasetRecord {
    pub fn new(file: &Path, section_id: u32, text: impl Into<String>, model_output: Value) -> Self {
        Self {
            file: file.display().to_string(),
            section_id,
            text: text.into(),
            model_output,
        }
    }
}

fn file_base(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string())
}

/// Appends records to `<output_dir>/<base>_dataset.jsonl`.
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    path: PathBuf,
}

impl DatasetWriter {
    /// Writer for the dataset of `source`, creating `output_dir` if needed.
    pub fn create(output_dir: &Path, source: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir)?;
        let path = output_dir.join(format!("{}_dataset.jsonl", file_base(source)));
        debug!("Dataset sink: {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single JSON line.
    pub fn append(&self, record: &DatasetRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// One section entry of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub section_id: u32,
    pub text_snippet: String,
    pub parsed: Value,
}

/// Per-file summary of an extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub file: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<ReportSection>,
}

impl RunReport {
    pub fn new(file: &Path) -> Self {
        Self {
            file: file.display().to_string(),
            generated_at: Utc::now(),
            sections: Vec::new(),
        }
    }

    /// Add a section, keeping the first `snippet_chars` characters of its text.
    pub fn push(&mut self, section_id: u32, text: &str, parsed: Value, snippet_chars: usize) {
        self.sections.push(ReportSection {
            section_id,
            text_snippet: text.chars().take(snippet_chars).collect(),
            parsed,
        });
    }

    /// Write to `<output_dir>/run_outputs/<stem>_run.json`.
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        let dir = output_dir.join(RUN_OUTPUTS_DIR);
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}_run.json", file_base(Path::new(&self.file))));
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        info!("Wrote run report {}", path.display());
        Ok(path)
    }
}

/// Read every non-blank line of a JSONL file.
pub fn read_jsonl(path: &Path) -> Result<Vec<Value>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut values = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        values.push(serde_json::from_str(&line)?);
    }

    Ok(values)
}

/// Copy a JSONL dataset into `gold_dir` as a pretty JSON array for editing.
///
/// The export keeps the dataset's file name.
pub fn export_for_annotation(jsonl: &Path, gold_dir: &Path) -> Result<PathBuf> {
    let records = read_jsonl(jsonl)?;
    fs::create_dir_all(gold_dir)?;

    let name = jsonl
        .file_name()
        .ok_or_else(|| ExtractionError::NoData(format!("{} is not a file", jsonl.display())))?;
    let path = gold_dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(&records)?)?;

    info!("Exported {} records for annotation to {}", records.len(), path.display());
    Ok(path)
}

/// Append the records of a corrected JSON array to `corrected_gold.jsonl`.
///
/// Returns the gold file and the number of records appended.
pub fn import_corrected(annotated: &Path, gold_dir: &Path) -> Result<(PathBuf, usize)> {
    let content = fs::read_to_string(annotated)?;
    let records = match serde_json::from_str::<Value>(&content)? {
        Value::Array(records) => records,
        _ => {
            return Err(ExtractionError::Type {
                field: annotated.display().to_string(),
                expected: "a JSON array of records".to_string(),
            }
            .into())
        }
    };

    fs::create_dir_all(gold_dir)?;
    let path = gold_dir.join(CORRECTED_GOLD_FILE);
    let mut out = String::new();
    for record in &records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(out.as_bytes())?;

    info!("Imported {} corrected records into {}", records.len(), path.display());
    Ok((path, records.len()))
}
