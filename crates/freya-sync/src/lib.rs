//! Sync run orchestration: source registry, per-source normalization with one
//! shared run timestamp, first-seen carry-over, dedup and dataset export.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use freya_adapters::{adapter_for_source, load_fixture_bundle};
use freya_core::{
    format_canonical, normalize, parse_canonical, CanonicalField, CanonicalJobRecord, Dataset,
    JobAge, Row, SourceContext, SourceKind, NOT_AVAILABLE,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::fs;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

pub mod export;
pub mod hooks;

pub use export::{FilePublisher, Publisher};
pub use hooks::{DedupHook, NoopDedupHook, SourcedRecord, UrlDedupHook};

pub const CRATE_NAME: &str = "freya-sync";

/// File under the reports dir holding the id of the last completed run.
pub const LATEST_POINTER: &str = "latest";

/// `job_url -> first_seen` index under the reports dir, merged run over run.
pub const FIRST_SEEN_INDEX: &str = "first_seen.json";

pub type FirstSeenIndex = BTreeMap<String, String>;

#[derive(Debug, Clone, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceConfig>,
}

impl SourceRegistry {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing source registry")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn find(&self, source_id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.source_id == source_id)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub source_id: String,
    pub display_name: String,
    pub enabled: bool,
    #[serde(default)]
    pub kind: SourceKind,
    pub board_url: String,
    /// Bundle path relative to the workspace root.
    #[serde(default)]
    pub fixture: Option<PathBuf>,
    #[serde(default)]
    pub defaults: BTreeMap<String, JsonValue>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SourceConfig {
    pub fn context(&self) -> SourceContext {
        SourceContext {
            display_name: self.display_name.clone(),
            board_url: self.board_url.clone(),
            kind: self.kind,
            defaults: self.defaults.clone(),
        }
    }

    pub fn bundle_path(&self, workspace_root: &Path) -> PathBuf {
        match &self.fixture {
            Some(path) => workspace_root.join(path),
            None => workspace_root
                .join("fixtures")
                .join(&self.source_id)
                .join("sample")
                .join("bundle.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupMode {
    #[default]
    None,
    Url,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub workspace_root: PathBuf,
    pub reports_dir: PathBuf,
    pub scheduler_enabled: bool,
    pub sync_cron: String,
    pub dedup: DedupMode,
    pub carry_first_seen: bool,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let workspace_root = lookup("FREYA_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let reports_dir = lookup("FREYA_REPORTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| workspace_root.join("reports"));
        let dedup = match lookup("FREYA_DEDUP").as_deref().map(str::trim) {
            None | Some("") | Some("none") => DedupMode::None,
            Some("url") => DedupMode::Url,
            Some(other) => {
                warn!(value = other, "unknown FREYA_DEDUP mode; dedup disabled");
                DedupMode::None
            }
        };
        Self {
            reports_dir,
            scheduler_enabled: lookup("FREYA_SCHEDULER_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
            sync_cron: lookup("FREYA_SYNC_CRON").unwrap_or_else(|| "0 0 */6 * * *".to_string()),
            dedup,
            carry_first_seen: lookup("FREYA_CARRY_FIRST_SEEN")
                .map(|v| !matches!(v.as_str(), "0" | "false" | "FALSE" | "False" | "off"))
                .unwrap_or(true),
            workspace_root,
        }
    }

    /// Defaults rooted at `workspace_root`, ignoring the environment.
    pub fn for_workspace(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        Self::from_lookup(|key| match key {
            "FREYA_WORKSPACE_ROOT" => Some(workspace_root.display().to_string()),
            _ => None,
        })
    }

    pub fn registry_path(&self) -> PathBuf {
        self.workspace_root.join("sources.yaml")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    /// Canonical run timestamp shared by every record of the run.
    pub run_at: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub enabled_sources: usize,
    pub failed_sources: Vec<String>,
    pub raw_jobs: usize,
    pub exported_rows: usize,
    pub carried_first_seen: usize,
    pub deduplicated: usize,
    pub source_counts: BTreeMap<String, usize>,
    pub freshness_counts: BTreeMap<String, usize>,
    pub reports_dir: String,
    pub manifest: String,
}

pub struct SyncPipeline {
    config: SyncConfig,
    dedup: Box<dyn DedupHook>,
    publishers: Vec<Arc<dyn Publisher>>,
}

impl SyncPipeline {
    pub fn new(config: SyncConfig) -> Self {
        let dedup: Box<dyn DedupHook> = match config.dedup {
            DedupMode::None => Box::<NoopDedupHook>::default(),
            DedupMode::Url => Box::<UrlDedupHook>::default(),
        };
        Self {
            config,
            dedup,
            publishers: Vec::new(),
        }
    }

    pub fn with_dedup(mut self, dedup: Box<dyn DedupHook>) -> Self {
        self.dedup = dedup;
        self
    }

    /// Extra consumers invoked after the run's own files are written.
    pub fn with_publisher(mut self, publisher: Box<dyn Publisher>) -> Self {
        self.publishers.push(Arc::from(publisher));
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn run_once(&self) -> Result<SyncRunSummary> {
        self.run_once_at(Utc::now()).await
    }

    /// One full run whose records all share `started_at` (seconds precision)
    /// as their first-seen instant.
    pub async fn run_once_at(&self, started_at: DateTime<Utc>) -> Result<SyncRunSummary> {
        let run_id = Uuid::new_v4();
        let run_at = truncate_to_seconds(started_at.naive_utc());
        let run_at_text = format_canonical(run_at);

        let registry = self.load_source_registry().await?;
        let enabled = registry.enabled().cloned().collect::<Vec<_>>();
        info!(%run_id, run_at = %run_at_text, sources = enabled.len(), "sync run started");

        let mut raw_jobs = 0usize;
        let mut failed_sources = Vec::new();
        let mut sourced = Vec::new();
        for source in &enabled {
            match self.process_source(source, run_id, run_at) {
                Ok((raw_count, records)) => {
                    raw_jobs += raw_count;
                    sourced.extend(records.into_iter().map(|record| SourcedRecord {
                        source_id: source.source_id.clone(),
                        record,
                    }));
                }
                Err(err) => {
                    warn!(
                        source_id = %source.source_id,
                        error = %format!("{err:#}"),
                        "source failed; continuing run"
                    );
                    failed_sources.push(source.source_id.clone());
                }
            }
        }

        let mut first_seen_index = self.load_first_seen_index().await;
        let mut carried_first_seen = 0usize;
        if self.config.carry_first_seen {
            let previous = &first_seen_index;
            sourced = sourced
                .into_iter()
                .map(|mut item| {
                    let carried =
                        carried_value(previous, &item.record.job_url, &item.record.first_seen);
                    if let Some(earlier) = carried {
                        item.record = item.record.with_first_seen(earlier);
                        carried_first_seen += 1;
                    }
                    item
                })
                .collect();
        }

        merge_first_seen(&mut first_seen_index, sourced.iter().map(|item| &item.record));

        let before_dedup = sourced.len();
        let sourced = self.dedup.apply(sourced).context("applying dedup hook")?;
        let deduplicated = before_dedup - sourced.len();

        let mut source_counts = BTreeMap::new();
        let batches = enabled
            .iter()
            .map(|source| {
                let rows = sourced
                    .iter()
                    .filter(|item| item.source_id == source.source_id)
                    .map(|item| item.record.to_row())
                    .collect::<Vec<Row>>();
                source_counts.insert(source.source_id.clone(), rows.len());
                rows
            })
            .collect::<Vec<_>>();
        let dataset = Dataset::merge(batches);

        let run_dir = self.config.reports_dir.join(run_id.to_string());
        let files = FilePublisher::new(&run_dir, run_id.to_string(), run_at_text.clone());
        let manifest = files.manifest_path();
        let publishers = self.publishers.clone();
        let dataset = tokio::task::spawn_blocking(move || -> Result<Dataset> {
            files.publish(&dataset)?;
            for publisher in &publishers {
                publisher.publish(&dataset).context("publishing dataset")?;
            }
            Ok(dataset)
        })
        .await
        .context("joining export task")??;

        let summary = SyncRunSummary {
            run_id,
            run_at: run_at_text,
            started_at,
            finished_at: Utc::now(),
            enabled_sources: enabled.len(),
            failed_sources,
            raw_jobs,
            exported_rows: dataset.len(),
            carried_first_seen,
            deduplicated,
            source_counts,
            freshness_counts: freshness_counts(&dataset),
            reports_dir: run_dir.display().to_string(),
            manifest: manifest.display().to_string(),
        };
        self.write_run_reports(&run_dir, &summary, &first_seen_index).await?;
        info!(
            %run_id,
            rows = summary.exported_rows,
            failed = summary.failed_sources.len(),
            "sync run finished"
        );
        Ok(summary)
    }

    pub async fn maybe_build_scheduler(self: Arc<Self>) -> Result<Option<JobScheduler>> {
        if !self.config.scheduler_enabled {
            return Ok(None);
        }

        let sched = JobScheduler::new().await.context("creating scheduler")?;
        let cron = self.config.sync_cron.clone();
        let pipeline = Arc::clone(&self);
        let job = Job::new_async(cron.as_str(), move |_uuid, _l| {
            let pipeline = Arc::clone(&pipeline);
            Box::pin(async move {
                match pipeline.run_once().await {
                    Ok(summary) => info!(
                        run_id = %summary.run_id,
                        rows = summary.exported_rows,
                        "scheduled sync complete"
                    ),
                    Err(err) => error!(error = %format!("{err:#}"), "scheduled sync failed"),
                }
            })
        })
        .with_context(|| format!("creating scheduler job for cron {cron}"))?;
        sched.add(job).await.context("adding scheduler job")?;
        Ok(Some(sched))
    }

    /// Parse and normalize one source. Returns the raw job count and records.
    fn process_source(
        &self,
        source: &SourceConfig,
        run_id: Uuid,
        run_at: NaiveDateTime,
    ) -> Result<(usize, Vec<CanonicalJobRecord>)> {
        let span = info_span!("sync_source", %run_id, source_id = %source.source_id);
        let _enter = span.enter();

        let adapter = adapter_for_source(&source.source_id)
            .with_context(|| format!("no adapter registered for {}", source.source_id))?;
        let bundle_path = source.bundle_path(&self.config.workspace_root);
        let bundle = load_fixture_bundle(&bundle_path)?;
        let raw_jobs = adapter
            .parse_listing(&bundle)
            .with_context(|| format!("parsing {} listing", source.source_id))?;

        let context = source.context();
        let records = raw_jobs
            .iter()
            .map(|raw| normalize(raw, &context, run_at))
            .collect::<Vec<_>>();
        info!(raw_jobs = raw_jobs.len(), "source normalized");
        Ok((raw_jobs.len(), records))
    }

    async fn load_source_registry(&self) -> Result<SourceRegistry> {
        let path = self.config.registry_path();
        let text = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        SourceRegistry::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// First-seen history across every earlier run. Missing or unreadable
    /// history means no carry-over.
    async fn load_first_seen_index(&self) -> FirstSeenIndex {
        let path = self.config.reports_dir.join(FIRST_SEEN_INDEX);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no first-seen history");
                return FirstSeenIndex::new();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable first-seen history");
                return FirstSeenIndex::new();
            }
        };
        match serde_json::from_str::<FirstSeenIndex>(&text) {
            Ok(mut index) => {
                index.retain(|url, first_seen| {
                    url != NOT_AVAILABLE && parse_canonical(first_seen).is_some()
                });
                index
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring malformed first-seen history");
                FirstSeenIndex::new()
            }
        }
    }

    async fn write_run_reports(
        &self,
        run_dir: &Path,
        summary: &SyncRunSummary,
        first_seen_index: &FirstSeenIndex,
    ) -> Result<()> {
        fs::write(run_dir.join(export::SUMMARY_FILE), export::summary_markdown(summary))
            .await
            .with_context(|| format!("writing {}", export::SUMMARY_FILE))?;
        let index_path = self.config.reports_dir.join(FIRST_SEEN_INDEX);
        let bytes =
            serde_json::to_vec_pretty(first_seen_index).context("serializing first-seen index")?;
        fs::write(&index_path, bytes)
            .await
            .with_context(|| format!("writing {}", index_path.display()))?;
        let pointer = self.config.reports_dir.join(LATEST_POINTER);
        fs::write(&pointer, summary.run_id.to_string())
            .await
            .with_context(|| format!("writing {}", pointer.display()))?;
        Ok(())
    }
}

pub async fn run_sync_once_from_env() -> Result<SyncRunSummary> {
    SyncPipeline::new(SyncConfig::from_env()).run_once().await
}

fn truncate_to_seconds(value: NaiveDateTime) -> NaiveDateTime {
    value.with_nanosecond(0).unwrap_or(value)
}

/// Fold this run's records into the history, keeping the earliest first-seen
/// per `job_url`. URLs absent from this run keep their stored value.
fn merge_first_seen<'a>(
    index: &mut FirstSeenIndex,
    records: impl IntoIterator<Item = &'a CanonicalJobRecord>,
) {
    for record in records {
        if record.job_url == NOT_AVAILABLE {
            continue;
        }
        let Some(current) = parse_canonical(&record.first_seen) else {
            continue;
        };
        let earlier_stored = index
            .get(&record.job_url)
            .and_then(|stored| parse_canonical(stored))
            .is_some_and(|stored| stored <= current);
        if !earlier_stored {
            index.insert(record.job_url.clone(), record.first_seen.clone());
        }
    }
}

/// The stored first-seen for `job_url`, when it is strictly earlier than the
/// current one.
fn carried_value<'a>(
    previous: &'a FirstSeenIndex,
    job_url: &str,
    current_first_seen: &str,
) -> Option<&'a str> {
    if job_url == NOT_AVAILABLE {
        return None;
    }
    let stored = previous.get(job_url)?;
    let earlier = parse_canonical(stored)?;
    let current = parse_canonical(current_first_seen)?;
    (earlier < current).then_some(stored.as_str())
}

fn freshness_counts(dataset: &Dataset) -> BTreeMap<String, usize> {
    let mut counts = JobAge::ALL
        .iter()
        .map(|age| (age.as_str().to_string(), 0usize))
        .collect::<BTreeMap<_, _>>();
    for age in dataset.column(CanonicalField::JobAge) {
        *counts.entry(age.to_string()).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn config_defaults() {
        let config = SyncConfig::from_lookup(lookup(&[]));
        assert_eq!(config.workspace_root, PathBuf::from("."));
        assert_eq!(config.reports_dir, PathBuf::from("./reports"));
        assert!(!config.scheduler_enabled);
        assert_eq!(config.sync_cron, "0 0 */6 * * *");
        assert_eq!(config.dedup, DedupMode::None);
        assert!(config.carry_first_seen);
    }

    #[test]
    fn config_reads_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("FREYA_WORKSPACE_ROOT", "/srv/freya"),
            ("FREYA_SCHEDULER_ENABLED", "TRUE"),
            ("FREYA_SYNC_CRON", "0 30 7 * * *"),
            ("FREYA_DEDUP", "url"),
            ("FREYA_CARRY_FIRST_SEEN", "0"),
        ]));
        assert_eq!(config.reports_dir, PathBuf::from("/srv/freya/reports"));
        assert!(config.scheduler_enabled);
        assert_eq!(config.sync_cron, "0 30 7 * * *");
        assert_eq!(config.dedup, DedupMode::Url);
        assert!(!config.carry_first_seen);

        let unknown = SyncConfig::from_lookup(lookup(&[("FREYA_DEDUP", "fuzzy")]));
        assert_eq!(unknown.dedup, DedupMode::None);
    }

    #[test]
    fn registry_parses_kinds_defaults_and_fixture_override() {
        let registry = SourceRegistry::from_yaml_str(
            r#"
sources:
  - source_id: glints
    display_name: Glints
    enabled: true
    board_url: https://glints.com
  - source_id: mekari
    display_name: Mekari
    enabled: false
    kind: employer
    board_url: https://mekari.hire.trakstar.com
    fixture: captures/mekari.json
    defaults:
      work_arrangement: On-site
"#,
        )
        .unwrap();

        assert_eq!(registry.enabled().count(), 1);
        let glints = registry.find("glints").unwrap();
        assert_eq!(glints.kind, SourceKind::Aggregator);
        assert_eq!(
            glints.bundle_path(Path::new("/ws")),
            PathBuf::from("/ws/fixtures/glints/sample/bundle.json")
        );

        let mekari = registry.find("mekari").unwrap();
        let context = mekari.context();
        assert_eq!(context.kind, SourceKind::Employer);
        assert_eq!(context.defaults["work_arrangement"], "On-site");
        assert_eq!(
            mekari.bundle_path(Path::new("/ws")),
            PathBuf::from("/ws/captures/mekari.json")
        );
    }

    fn record(job_url: &str, run_at: &str) -> CanonicalJobRecord {
        let raw = serde_json::json!({"job_title": "Engineer", "job_url": job_url});
        normalize(
            raw.as_object().unwrap(),
            &SourceContext::default(),
            parse_canonical(run_at).unwrap(),
        )
    }

    #[test]
    fn first_seen_index_keeps_earliest_and_unseen_urls() {
        let mut index = FirstSeenIndex::from([
            ("https://x.test/1".to_string(), "2024-03-01 08:00:00".to_string()),
            ("https://x.test/gone".to_string(), "2024-02-01 00:00:00".to_string()),
        ]);
        let records = [
            record("https://x.test/1", "2024-03-05 10:00:00"),
            record("https://x.test/new", "2024-03-05 10:00:00"),
            record("N/A", "2024-03-05 10:00:00"),
        ];
        merge_first_seen(&mut index, &records);

        assert_eq!(index.len(), 3);
        assert_eq!(index["https://x.test/1"], "2024-03-01 08:00:00");
        assert_eq!(index["https://x.test/new"], "2024-03-05 10:00:00");
        assert_eq!(index["https://x.test/gone"], "2024-02-01 00:00:00");
        assert!(!index.contains_key("N/A"));

        merge_first_seen(&mut index, &[record("https://x.test/new", "2024-03-04 09:00:00")]);
        assert_eq!(index["https://x.test/new"], "2024-03-04 09:00:00");
    }

    #[test]
    fn carry_over_only_takes_strictly_earlier_history() {
        let previous = FirstSeenIndex::from([
            ("https://x.test/1".to_string(), "2024-03-01 08:00:00".to_string()),
            ("https://x.test/2".to_string(), "Not specified".to_string()),
        ]);

        assert_eq!(
            carried_value(&previous, "https://x.test/1", "2024-03-05 10:00:00"),
            Some("2024-03-01 08:00:00")
        );
        assert_eq!(
            carried_value(&previous, "https://x.test/1", "2024-02-01 00:00:00"),
            None
        );
        assert_eq!(carried_value(&previous, "N/A", "2024-03-05 10:00:00"), None);
        assert_eq!(
            carried_value(&previous, "https://x.test/2", "2024-03-05 10:00:00"),
            None
        );
    }

    #[test]
    fn run_timestamp_drops_subseconds() {
        let instant = parse_canonical("2024-03-05 10:00:00").unwrap()
            + chrono::Duration::milliseconds(987);
        assert_eq!(
            format_canonical(truncate_to_seconds(instant)),
            "2024-03-05 10:00:00"
        );
        assert_eq!(truncate_to_seconds(instant).nanosecond(), 0);
    }
}
