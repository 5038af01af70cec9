use std::collections::HashSet;

use anyhow::Result;
use freya_core::{CanonicalJobRecord, NOT_AVAILABLE};
use tracing::debug;

/// A normalized record tagged with the source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedRecord {
    pub source_id: String,
    pub record: CanonicalJobRecord,
}

pub trait DedupHook: Send + Sync {
    fn apply(&self, items: Vec<SourcedRecord>) -> Result<Vec<SourcedRecord>>;
}

#[derive(Default)]
pub struct NoopDedupHook;

impl DedupHook for NoopDedupHook {
    fn apply(&self, items: Vec<SourcedRecord>) -> Result<Vec<SourcedRecord>> {
        Ok(items)
    }
}

/// Keeps the first record per `job_url`; records without a URL fall back to
/// a case-insensitive `job_title + company` key.
#[derive(Default)]
pub struct UrlDedupHook;

impl UrlDedupHook {
    pub fn key(record: &CanonicalJobRecord) -> String {
        if record.job_url != NOT_AVAILABLE {
            format!("url:{}", record.job_url)
        } else {
            format!(
                "title:{}|{}",
                record.job_title.to_lowercase(),
                record.company.to_lowercase()
            )
        }
    }
}

impl DedupHook for UrlDedupHook {
    fn apply(&self, items: Vec<SourcedRecord>) -> Result<Vec<SourcedRecord>> {
        let mut seen = HashSet::new();
        let before = items.len();
        let kept = items
            .into_iter()
            .filter(|item| seen.insert(Self::key(&item.record)))
            .collect::<Vec<_>>();
        debug!(dropped = before - kept.len(), "url dedup applied");
        Ok(kept)
    }
}
