//! Dataset exporters: CSV, JSON, Parquet and a checksum manifest.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field as ArrowField, Schema};
use freya_core::Dataset;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::SyncRunSummary;

pub const CSV_FILE: &str = "dataset.csv";
pub const JSON_FILE: &str = "dataset.json";
pub const PARQUET_FILE: &str = "dataset.parquet";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SUMMARY_FILE: &str = "summary.md";

/// Hand-off of a finished dataset to a consumer (files, a spreadsheet, ...).
pub trait Publisher: Send + Sync {
    fn publish(&self, dataset: &Dataset) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub schema_version: u32,
    pub run_id: String,
    pub run_at: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    pub name: String,
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

pub fn write_csv<W: Write>(dataset: &Dataset, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(dataset.header())
        .context("writing CSV header")?;
    for row in dataset.rows() {
        csv.write_record(row).context("writing CSV row")?;
    }
    csv.flush().context("flushing CSV writer")?;
    Ok(())
}

/// Rows as JSON objects keyed by column name.
pub fn write_json<W: Write>(dataset: &Dataset, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, &dataset.to_rows()).context("serializing dataset rows")
}

/// One Utf8 column per header entry, in export order.
pub fn dataset_record_batch(dataset: &Dataset) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(
        dataset
            .header()
            .iter()
            .map(|name| ArrowField::new(name, DataType::Utf8, false))
            .collect::<Vec<_>>(),
    ));
    let columns = (0..dataset.header().len())
        .map(|index| {
            let values = dataset
                .rows()
                .iter()
                .map(|row| row[index].as_str())
                .collect::<Vec<_>>();
            Arc::new(StringArray::from(values)) as ArrayRef
        })
        .collect::<Vec<_>>();
    RecordBatch::try_new(schema, columns).context("building dataset record batch")
}

pub fn write_parquet(path: &Path, dataset: &Dataset) -> Result<()> {
    let batch = dataset_record_batch(dataset)?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .with_context(|| format!("opening parquet writer {}", path.display()))?;
    writer
        .write(&batch)
        .with_context(|| format!("writing record batch {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("closing parquet writer {}", path.display()))?;
    Ok(())
}

pub fn manifest_entry(name: &str, dir: &Path, path: &Path) -> Result<ManifestFile> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let sha256 = hex::encode(hasher.finalize());
    let rel = path
        .strip_prefix(dir)
        .unwrap_or(path)
        .display()
        .to_string();
    Ok(ManifestFile {
        name: name.to_string(),
        path: rel,
        sha256,
        bytes: bytes.len() as u64,
    })
}

/// Writes `dataset.{csv,json,parquet}` and `manifest.json` into one run
/// directory.
pub struct FilePublisher {
    dir: PathBuf,
    run_id: String,
    run_at: String,
}

impl FilePublisher {
    pub fn new(dir: impl Into<PathBuf>, run_id: impl Into<String>, run_at: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            run_id: run_id.into(),
            run_at: run_at.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    fn create(&self, name: &str) -> Result<BufWriter<File>> {
        let path = self.dir.join(name);
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        Ok(BufWriter::new(file))
    }
}

impl Publisher for FilePublisher {
    fn publish(&self, dataset: &Dataset) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;

        write_csv(dataset, self.create(CSV_FILE)?)
            .with_context(|| format!("writing {CSV_FILE}"))?;
        let mut json = self.create(JSON_FILE)?;
        write_json(dataset, &mut json).with_context(|| format!("writing {JSON_FILE}"))?;
        json.flush().with_context(|| format!("flushing {JSON_FILE}"))?;
        write_parquet(&self.dir.join(PARQUET_FILE), dataset)?;

        let manifest = DatasetManifest {
            schema_version: 1,
            run_id: self.run_id.clone(),
            run_at: self.run_at.clone(),
            rows: dataset.len(),
            columns: dataset.header().to_vec(),
            files: vec![
                manifest_entry("csv", &self.dir, &self.dir.join(CSV_FILE))?,
                manifest_entry("json", &self.dir, &self.dir.join(JSON_FILE))?,
                manifest_entry("parquet", &self.dir, &self.dir.join(PARQUET_FILE))?,
            ],
        };
        let bytes = serde_json::to_vec_pretty(&manifest).context("serializing manifest")?;
        let manifest_path = self.manifest_path();
        fs::write(&manifest_path, bytes)
            .with_context(|| format!("writing {}", manifest_path.display()))?;
        Ok(())
    }
}

pub fn summary_markdown(summary: &SyncRunSummary) -> String {
    let mut lines = vec![
        "# Freya Sync Summary".to_string(),
        String::new(),
        format!("- Run ID: `{}`", summary.run_id),
        format!("- Run timestamp: {}", summary.run_at),
        format!("- Started: {}", summary.started_at),
        format!("- Finished: {}", summary.finished_at),
        format!("- Enabled sources: {}", summary.enabled_sources),
        format!("- Raw jobs: {}", summary.raw_jobs),
        format!("- Exported rows: {}", summary.exported_rows),
        format!("- First seen carried over: {}", summary.carried_first_seen),
        format!("- Dropped as duplicates: {}", summary.deduplicated),
        String::new(),
        "## Source Counts".to_string(),
    ];
    lines.extend(
        summary
            .source_counts
            .iter()
            .map(|(source, count)| format!("- {source}: {count}")),
    );
    if !summary.failed_sources.is_empty() {
        lines.push(String::new());
        lines.push("## Failed Sources".to_string());
        lines.extend(summary.failed_sources.iter().map(|s| format!("- {s}")));
    }
    lines.push(String::new());
    lines.push("## Freshness".to_string());
    lines.extend(
        summary
            .freshness_counts
            .iter()
            .map(|(age, count)| format!("- {age}: {count}")),
    );
    lines.push(String::new());
    lines.join("\n")
}
