//! Raw per-job mapping -> canonical record.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::{debug, warn};

use crate::datetime::{
    compute_apply_end_date, format_canonical, normalize_datetime, normalize_epoch, parse_canonical,
};
use crate::freshness::classify_age;
use crate::sanitize::{
    sanitize, sanitize_job_type, sanitize_work_arrangement, FieldKind, NOT_AVAILABLE,
};
use crate::{CanonicalField, CanonicalJobRecord};

/// Flat key/value mapping handed over by a source adapter. `null` is the
/// explicit "unknown" marker.
pub type RawJob = Map<String, JsonValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Job board listing many employers.
    #[default]
    Aggregator,
    /// A single employer's careers page.
    Employer,
}

/// Per-source facts shared by every job the source yields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceContext {
    pub display_name: String,
    pub board_url: String,
    #[serde(default)]
    pub kind: SourceKind,
    /// Raw values used when a job leaves the key missing or unknown.
    #[serde(default)]
    pub defaults: BTreeMap<String, JsonValue>,
}

impl SourceContext {
    pub fn aggregator(display_name: impl Into<String>, board_url: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            board_url: board_url.into(),
            kind: SourceKind::Aggregator,
            defaults: BTreeMap::new(),
        }
    }

    pub fn employer(display_name: impl Into<String>, board_url: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            board_url: board_url.into(),
            kind: SourceKind::Employer,
            defaults: BTreeMap::new(),
        }
    }

    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("raw batch must be a JSON array of job objects, got {0}")]
    NotACollection(&'static str),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchOutcome {
    pub records: Vec<CanonicalJobRecord>,
    /// Elements that were not JSON objects.
    pub skipped: usize,
}

struct RawLookup<'a> {
    raw: &'a RawJob,
    source: &'a SourceContext,
}

impl<'a> RawLookup<'a> {
    fn value(&self, field: CanonicalField) -> Option<&'a JsonValue> {
        let aliases = field.raw_aliases();
        aliases
            .iter()
            .find_map(|key| self.raw.get(*key).filter(|v| !v.is_null()))
            .or_else(|| {
                aliases
                    .iter()
                    .find_map(|key| self.source.defaults.get(*key).filter(|v| !v.is_null()))
            })
    }

    fn text(&self, field: CanonicalField) -> Option<String> {
        self.value(field).and_then(|v| coerce_text(field, v))
    }

    fn sanitized(&self, field: CanonicalField, kind: FieldKind) -> String {
        sanitize(self.text(field).as_deref(), kind)
    }
}

/// Scalar -> text. Nested objects are structurally atypical and yield `None`.
fn coerce_text(field: CanonicalField, value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
        JsonValue::Array(items) => {
            let parts = items
                .iter()
                .filter_map(|item| match item {
                    JsonValue::Array(_) | JsonValue::Object(_) => None,
                    scalar => coerce_text(field, scalar),
                })
                .collect::<Vec<_>>();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        JsonValue::Object(_) => {
            debug!(field = %field, "object value where a scalar was expected");
            None
        }
    }
}

/// Canonical timestamp for a raw date signal, `None` when it cannot be parsed.
fn canonical_timestamp(field: CanonicalField, value: &JsonValue) -> Option<String> {
    let candidate = match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .map(normalize_epoch)?,
        other => normalize_datetime(&coerce_text(field, other)?),
    };
    if parse_canonical(&candidate).is_some() {
        Some(candidate)
    } else {
        debug!(field = %field, raw = %value, "unparsable timestamp");
        None
    }
}

fn is_active_flag(value: Option<&JsonValue>) -> &'static str {
    let inactive = match value {
        Some(JsonValue::Bool(b)) => !*b,
        Some(JsonValue::Number(n)) => n.as_f64() == Some(0.0),
        Some(JsonValue::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "false" | "no" | "closed" | "expired" | "inactive" | "filled" | "0"
        ),
        _ => false,
    };
    if inactive {
        "False"
    } else {
        "True"
    }
}

/// Normalize one raw job. `run_at` is the run-scoped first-seen instant.
///
/// Total: malformed fields degrade to sentinels, never to an error.
pub fn normalize(raw: &RawJob, source: &SourceContext, run_at: NaiveDateTime) -> CanonicalJobRecord {
    let lookup = RawLookup { raw, source };

    let first_seen = format_canonical(run_at);
    let last_seen = match lookup.value(CanonicalField::LastSeen) {
        None => first_seen.clone(),
        Some(value) => canonical_timestamp(CanonicalField::LastSeen, value)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    };
    let job_apply_end_date = lookup
        .value(CanonicalField::JobApplyEndDate)
        .and_then(|v| canonical_timestamp(CanonicalField::JobApplyEndDate, v))
        .unwrap_or_else(|| compute_apply_end_date(&last_seen));
    let job_age = classify_age(&first_seen, &last_seen);

    let (job_board, job_board_url, company_fallback, company_url_fallback) = match source.kind {
        SourceKind::Aggregator => (
            sanitize(Some(&source.display_name), FieldKind::FreeText),
            sanitize(Some(&source.board_url), FieldKind::Url),
            None,
            None,
        ),
        SourceKind::Employer => (
            NOT_AVAILABLE.to_string(),
            NOT_AVAILABLE.to_string(),
            Some(source.display_name.as_str()),
            Some(source.board_url.as_str()),
        ),
    };

    let company = lookup
        .text(CanonicalField::Company)
        .or_else(|| company_fallback.map(str::to_string));
    let company_url = lookup
        .text(CanonicalField::CompanyUrl)
        .or_else(|| company_url_fallback.map(str::to_string));

    CanonicalJobRecord {
        job_title: lookup.sanitized(CanonicalField::JobTitle, FieldKind::FreeText),
        company: sanitize(company.as_deref(), FieldKind::FreeText),
        company_url: sanitize(company_url.as_deref(), FieldKind::Url),
        job_url: lookup.sanitized(CanonicalField::JobUrl, FieldKind::Url),
        job_location: lookup.sanitized(CanonicalField::JobLocation, FieldKind::FreeText),
        job_department: lookup.sanitized(CanonicalField::JobDepartment, FieldKind::TitleCase),
        job_type: sanitize_job_type(lookup.text(CanonicalField::JobType).as_deref()),
        job_level: lookup.sanitized(CanonicalField::JobLevel, FieldKind::FreeText),
        work_arrangement: sanitize_work_arrangement(
            lookup.text(CanonicalField::WorkArrangement).as_deref(),
        ),
        base_salary: lookup.sanitized(CanonicalField::BaseSalary, FieldKind::FreeText),
        first_seen,
        last_seen,
        job_apply_end_date,
        is_active: is_active_flag(lookup.value(CanonicalField::IsActive)).to_string(),
        job_age,
        job_board,
        job_board_url,
    }
}

/// Normalize a whole raw batch. Non-object elements are skipped; a batch that
/// is not an array at all means the adapter is broken and is an error.
pub fn normalize_batch(
    batch: &JsonValue,
    source: &SourceContext,
    run_at: NaiveDateTime,
) -> Result<BatchOutcome, NormalizeError> {
    let items = match batch {
        JsonValue::Array(items) => items,
        JsonValue::Null => return Err(NormalizeError::NotACollection("null")),
        JsonValue::Bool(_) => return Err(NormalizeError::NotACollection("a boolean")),
        JsonValue::Number(_) => return Err(NormalizeError::NotACollection("a number")),
        JsonValue::String(_) => return Err(NormalizeError::NotACollection("a string")),
        JsonValue::Object(_) => return Err(NormalizeError::NotACollection("an object")),
    };

    let mut outcome = BatchOutcome::default();
    for (index, item) in items.iter().enumerate() {
        match item.as_object() {
            Some(raw) => outcome.records.push(normalize(raw, source, run_at)),
            None => {
                warn!(source = %source.display_name, index, "skipping non-object raw job");
                outcome.skipped += 1;
            }
        }
    }
    Ok(outcome)
}
