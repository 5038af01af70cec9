//! Source adapter contracts + fixture-first listing adapters.
//!
//! An adapter turns one captured listing payload (a fixture bundle) into raw
//! per-job mappings keyed by canonical field name. Interpreting those values
//! is left to `freya_core::normalize`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use freya_core::CanonicalField;
use scraper::{ElementRef, Html, Selector};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub use freya_core::{RawJob, SourceContext, SourceKind};

pub const CRATE_NAME: &str = "freya-adapters";

/// Source ids with a registered adapter.
pub const REGISTERED_SOURCES: [&str; 3] = ["glints", "dealls", "mekari"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    Json,
    Html,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &'static str;
    fn payload(&self) -> PayloadFormat;

    /// Raw jobs in listing order. A payload that does not parse, or has no
    /// job collection where one is expected, is an error.
    fn parse_listing(&self, bundle: &FixtureBundle) -> Result<Vec<RawJob>, AdapterError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureBundle {
    pub fixture_id: String,
    pub source_id: String,
    pub captured_from_url: String,
    pub fetched_at: DateTime<Utc>,
    pub raw_artifact: FixtureRawArtifact,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureRawArtifact {
    pub content_type: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub inline_text: Option<String>,
}

impl FixtureBundle {
    pub fn raw_text(&self) -> Result<&str, AdapterError> {
        self.raw_artifact.inline_text.as_deref().ok_or_else(|| {
            AdapterError::Message(format!(
                "fixture {} has no raw artifact text",
                self.fixture_id
            ))
        })
    }
}

pub fn load_fixture_bundle(path: impl AsRef<Path>) -> Result<FixtureBundle> {
    let path = path.as_ref();
    let mut bundle: FixtureBundle = read_json_file(path)?;
    hydrate_inline_raw_artifact(path, &mut bundle)?;
    Ok(bundle)
}

fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Relative artifact paths resolve against the bundle's own directory.
fn hydrate_inline_raw_artifact(bundle_path: &Path, bundle: &mut FixtureBundle) -> Result<()> {
    if bundle.raw_artifact.inline_text.is_some() {
        return Ok(());
    }
    let Some(rel_path) = &bundle.raw_artifact.path else {
        return Ok(());
    };
    let raw_path = bundle_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(rel_path);
    let raw = fs::read_to_string(&raw_path)
        .with_context(|| format!("reading fixture raw artifact {}", raw_path.display()))?;
    bundle.raw_artifact.inline_text = Some(raw);
    Ok(())
}

fn ensure_source(adapter_source_id: &str, bundle: &FixtureBundle) -> Result<(), AdapterError> {
    if bundle.source_id != adapter_source_id {
        return Err(AdapterError::Message(format!(
            "bundle source_id={} does not match adapter source_id={}",
            bundle.source_id, adapter_source_id
        )));
    }
    Ok(())
}

fn text_or_none(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => text_or_none(s),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// How one canonical field is read from a JSON listing entry.
#[derive(Debug, Clone, Copy)]
pub enum JsonRule {
    /// First JSON pointer holding a non-null value, passed through untouched.
    Pointer(&'static [&'static str]),
    /// `{/pointer}` placeholders replaced by scalar values. One unresolved
    /// placeholder leaves the field unknown.
    Template(&'static str),
    /// Scalars at each pointer joined with the separator; missing ones are
    /// skipped.
    Join(&'static [&'static str], &'static str),
    /// `rule` applied to the first element of the array at `array` whose
    /// `key` pointer holds the string `equals`.
    Within {
        array: &'static str,
        key: &'static str,
        equals: &'static str,
        rule: &'static JsonRule,
    },
}

impl JsonRule {
    fn extract(&self, item: &JsonValue) -> Option<JsonValue> {
        match self {
            JsonRule::Pointer(pointers) => pointers
                .iter()
                .find_map(|p| item.pointer(p).filter(|v| !v.is_null()))
                .cloned(),
            JsonRule::Template(template) => render_template(template, item).map(JsonValue::String),
            JsonRule::Join(pointers, separator) => {
                let parts = pointers
                    .iter()
                    .filter_map(|p| item.pointer(p).and_then(scalar_text))
                    .collect::<Vec<_>>();
                if parts.is_empty() {
                    None
                } else {
                    Some(JsonValue::String(parts.join(separator)))
                }
            }
            JsonRule::Within {
                array,
                key,
                equals,
                rule,
            } => item
                .pointer(array)
                .and_then(JsonValue::as_array)?
                .iter()
                .find(|entry| entry.pointer(key).and_then(JsonValue::as_str) == Some(*equals))
                .and_then(|entry| rule.extract(entry)),
        }
    }
}

fn render_template(template: &str, item: &JsonValue) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}')?;
        let pointer = &after[..end];
        out.push_str(&item.pointer(pointer).and_then(scalar_text)?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}

/// Listing served as JSON: one array of job objects somewhere in the payload.
#[derive(Debug, Clone, Copy)]
pub struct JsonListingAdapter {
    pub source_id: &'static str,
    /// JSON pointer to the job array.
    pub jobs_pointer: &'static str,
    pub fields: &'static [(CanonicalField, JsonRule)],
}

impl JsonListingAdapter {
    fn extract(&self, item: &JsonValue) -> RawJob {
        let mut raw = Map::new();
        for (field, rule) in self.fields {
            let value = rule.extract(item).unwrap_or(JsonValue::Null);
            raw.insert(field.as_str().to_string(), value);
        }
        raw
    }
}

impl SourceAdapter for JsonListingAdapter {
    fn source_id(&self) -> &'static str {
        self.source_id
    }

    fn payload(&self) -> PayloadFormat {
        PayloadFormat::Json
    }

    fn parse_listing(&self, bundle: &FixtureBundle) -> Result<Vec<RawJob>, AdapterError> {
        ensure_source(self.source_id, bundle)?;
        let payload: JsonValue = serde_json::from_str(bundle.raw_text()?).with_context(|| {
            format!(
                "parsing {} JSON payload of fixture {}",
                self.source_id, bundle.fixture_id
            )
        })?;
        let jobs = payload
            .pointer(self.jobs_pointer)
            .and_then(JsonValue::as_array)
            .ok_or_else(|| {
                AdapterError::Message(format!(
                    "{}: no job array at {} in fixture {}",
                    self.source_id, self.jobs_pointer, bundle.fixture_id
                ))
            })?;

        let mut raw_jobs = Vec::with_capacity(jobs.len());
        for (index, item) in jobs.iter().enumerate() {
            if !item.is_object() {
                warn!(source_id = self.source_id, index, "skipping non-object listing entry");
                continue;
            }
            raw_jobs.push(self.extract(item));
        }
        debug!(source_id = self.source_id, jobs = raw_jobs.len(), "parsed JSON listing");
        Ok(raw_jobs)
    }
}

/// How one canonical field is read from an HTML listing card.
#[derive(Debug, Clone, Copy)]
pub enum HtmlRule {
    /// Text content of the first match.
    Text(&'static str),
    /// Attribute of the first match.
    Attr(&'static str, &'static str),
    /// `href` of the first match, resolved against the adapter's base URL.
    Link(&'static str),
}

impl HtmlRule {
    fn selector(&self) -> &'static str {
        match self {
            HtmlRule::Text(s) | HtmlRule::Attr(s, _) | HtmlRule::Link(s) => *s,
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, AdapterError> {
    Selector::parse(selector)
        .map_err(|e| AdapterError::Message(format!("invalid selector {selector:?}: {e}")))
}

/// `href` joined onto `base_url`; `None` when either side is not a usable URL.
fn resolve_link(base_url: &str, href: &str) -> Option<String> {
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(url) => Some(url.to_string()),
        Err(err) => {
            debug!(base_url, href, error = %err, "unresolvable link");
            None
        }
    }
}

/// Listing served as an HTML page of job cards.
#[derive(Debug, Clone, Copy)]
pub struct HtmlListingAdapter {
    pub source_id: &'static str,
    pub base_url: &'static str,
    pub item_selector: &'static str,
    pub fields: &'static [(CanonicalField, HtmlRule)],
}

impl HtmlListingAdapter {
    fn extract(
        &self,
        card: ElementRef<'_>,
        compiled: &[(CanonicalField, HtmlRule, Selector)],
    ) -> RawJob {
        let mut raw = Map::new();
        for (field, rule, selector) in compiled {
            let first = card.select(selector).next();
            let value = match rule {
                HtmlRule::Text(_) => first.map(|n| n.text().collect::<String>()),
                HtmlRule::Attr(_, attr) => first
                    .and_then(|n| n.value().attr(attr))
                    .map(str::to_string),
                HtmlRule::Link(_) => first
                    .and_then(|n| n.value().attr("href"))
                    .and_then(text_or_none)
                    .and_then(|href| resolve_link(self.base_url, &href)),
            };
            let value = value
                .as_deref()
                .and_then(text_or_none)
                .map(JsonValue::String)
                .unwrap_or(JsonValue::Null);
            raw.insert(field.as_str().to_string(), value);
        }
        raw
    }
}

impl SourceAdapter for HtmlListingAdapter {
    fn source_id(&self) -> &'static str {
        self.source_id
    }

    fn payload(&self) -> PayloadFormat {
        PayloadFormat::Html
    }

    fn parse_listing(&self, bundle: &FixtureBundle) -> Result<Vec<RawJob>, AdapterError> {
        ensure_source(self.source_id, bundle)?;
        let document = Html::parse_document(bundle.raw_text()?);
        let item_selector = parse_selector(self.item_selector)?;
        let compiled = self
            .fields
            .iter()
            .map(|(field, rule)| -> Result<_, AdapterError> {
                Ok((*field, *rule, parse_selector(rule.selector())?))
            })
            .collect::<Result<Vec<_>, AdapterError>>()?;

        let raw_jobs = document
            .select(&item_selector)
            .map(|card| self.extract(card, &compiled))
            .collect::<Vec<_>>();
        if raw_jobs.is_empty() {
            warn!(
                source_id = self.source_id,
                selector = self.item_selector,
                fixture_id = %bundle.fixture_id,
                "no job cards matched"
            );
        }
        debug!(source_id = self.source_id, jobs = raw_jobs.len(), "parsed HTML listing");
        Ok(raw_jobs)
    }
}

const GLINTS_FIELDS: &[(CanonicalField, JsonRule)] = &[
    (CanonicalField::JobTitle, JsonRule::Pointer(&["/title"])),
    (CanonicalField::Company, JsonRule::Pointer(&["/company/name"])),
    (
        CanonicalField::CompanyUrl,
        JsonRule::Template("https://glints.com/id/companies/{/company/id}"),
    ),
    (
        CanonicalField::JobUrl,
        JsonRule::Template("https://glints.com/id/opportunities/jobs/{/id}"),
    ),
    (
        CanonicalField::JobLocation,
        JsonRule::Join(&["/city/name", "/country/name"], ", "),
    ),
    (
        CanonicalField::JobDepartment,
        JsonRule::Pointer(&["/hierarchicalJobCategory/name"]),
    ),
    (CanonicalField::JobType, JsonRule::Pointer(&["/type"])),
    (
        CanonicalField::JobLevel,
        JsonRule::Template("{/minYearsOfExperience}-{/maxYearsOfExperience} years"),
    ),
    (
        CanonicalField::WorkArrangement,
        JsonRule::Pointer(&["/workArrangementOption"]),
    ),
    (
        CanonicalField::BaseSalary,
        JsonRule::Within {
            array: "/salaries",
            key: "/salaryType",
            equals: "BASIC",
            rule: &JsonRule::Template("{/CurrencyCode} {/minAmount}-{/maxAmount}"),
        },
    ),
    (CanonicalField::LastSeen, JsonRule::Pointer(&["/updatedAt", "/createdAt"])),
    (CanonicalField::IsActive, JsonRule::Pointer(&["/isActivelyHiring"])),
];

const DEALLS_FIELDS: &[(CanonicalField, JsonRule)] = &[
    (CanonicalField::JobTitle, JsonRule::Pointer(&["/role"])),
    (CanonicalField::Company, JsonRule::Pointer(&["/company/name"])),
    (
        CanonicalField::CompanyUrl,
        JsonRule::Template("https://dealls.com/company/{/company/slug}"),
    ),
    (
        CanonicalField::JobUrl,
        JsonRule::Template("https://dealls.com/role/{/slug}"),
    ),
    (CanonicalField::JobLocation, JsonRule::Pointer(&["/city/name"])),
    (CanonicalField::JobDepartment, JsonRule::Pointer(&["/categorySlug"])),
    (CanonicalField::JobType, JsonRule::Pointer(&["/employmentTypes"])),
    (CanonicalField::WorkArrangement, JsonRule::Pointer(&["/workplaceType"])),
    (CanonicalField::BaseSalary, JsonRule::Pointer(&["/salaryRange/start"])),
    (
        CanonicalField::LastSeen,
        JsonRule::Pointer(&["/latestUpdatedAt", "/publishedAt"]),
    ),
];

const MEKARI_FIELDS: &[(CanonicalField, HtmlRule)] = &[
    (CanonicalField::JobTitle, HtmlRule::Text("h3.js-job-list-opening-name")),
    (CanonicalField::JobLocation, HtmlRule::Text("div.js-job-list-opening-loc")),
    (CanonicalField::JobDepartment, HtmlRule::Text("div.rb-text-4")),
    (
        CanonicalField::JobType,
        HtmlRule::Text("div.js-job-list-opening-meta span:first-child"),
    ),
    (
        CanonicalField::WorkArrangement,
        HtmlRule::Text("div.js-job-list-opening-meta span:last-child"),
    ),
    (CanonicalField::JobUrl, HtmlRule::Link("a")),
];

pub fn glints_adapter() -> JsonListingAdapter {
    JsonListingAdapter {
        source_id: "glints",
        jobs_pointer: "/data/searchJobs/jobsInPage",
        fields: GLINTS_FIELDS,
    }
}

pub fn dealls_adapter() -> JsonListingAdapter {
    JsonListingAdapter {
        source_id: "dealls",
        jobs_pointer: "/data/docs",
        fields: DEALLS_FIELDS,
    }
}

pub fn mekari_adapter() -> HtmlListingAdapter {
    HtmlListingAdapter {
        source_id: "mekari",
        base_url: "https://mekari.hire.trakstar.com",
        item_selector: "div.js-card.list-item",
        fields: MEKARI_FIELDS,
    }
}

pub fn adapter_for_source(source_id: &str) -> Option<Box<dyn SourceAdapter>> {
    match source_id {
        "glints" => Some(Box::new(glints_adapter())),
        "dealls" => Some(Box::new(dealls_adapter())),
        "mekari" => Some(Box::new(mekari_adapter())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(source_id: &str, content_type: &str, text: &str) -> FixtureBundle {
        FixtureBundle {
            fixture_id: format!("{source_id}-test"),
            source_id: source_id.to_string(),
            captured_from_url: "https://example.test/listing".to_string(),
            fetched_at: "2024-03-05T10:00:00Z".parse().unwrap(),
            raw_artifact: FixtureRawArtifact {
                content_type: content_type.to_string(),
                path: None,
                inline_text: Some(text.to_string()),
            },
            notes: None,
        }
    }

    #[test]
    fn registry_resolves_every_registered_source() {
        for source_id in REGISTERED_SOURCES {
            let adapter = adapter_for_source(source_id).expect("registered adapter");
            assert_eq!(adapter.source_id(), source_id);
        }
        assert_eq!(adapter_for_source("mekari").unwrap().payload(), PayloadFormat::Html);
        assert!(adapter_for_source("jobstreet").is_none());
    }

    #[test]
    fn json_adapter_maps_pointers_templates_and_joins() {
        let payload = json!({"data": {"searchJobs": {"jobsInPage": [{
            "id": "abc-1",
            "title": "Backend Engineer",
            "type": "FULL_TIME",
            "isActivelyHiring": true,
            "minYearsOfExperience": 2,
            "maxYearsOfExperience": 4,
            "updatedAt": "2024-03-01T10:00:00.000Z",
            "city": {"name": "Jakarta"},
            "country": {"name": "Indonesia"},
            "salaries": [
                {"salaryType": "BONUS", "CurrencyCode": "IDR", "minAmount": 500000, "maxAmount": 900000},
                {"salaryType": "BASIC", "CurrencyCode": "IDR", "minAmount": 10000000, "maxAmount": 15000000}
            ],
            "company": {"id": "co-9", "name": "Acme"}
        }]}}});
        let jobs = glints_adapter()
            .parse_listing(&bundle("glints", "application/json", &payload.to_string()))
            .unwrap();

        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job["job_title"], "Backend Engineer");
        assert_eq!(job["job_url"], "https://glints.com/id/opportunities/jobs/abc-1");
        assert_eq!(job["company_url"], "https://glints.com/id/companies/co-9");
        assert_eq!(job["job_location"], "Jakarta, Indonesia");
        assert_eq!(job["job_level"], "2-4 years");
        assert_eq!(job["base_salary"], "IDR 10000000-15000000");
        assert_eq!(job["is_active"], true);
        // Every configured field is present; unresolved ones are explicit nulls.
        assert_eq!(job.len(), GLINTS_FIELDS.len());
        assert!(job["job_department"].is_null());
        assert!(job["work_arrangement"].is_null());
    }

    #[test]
    fn salary_reads_only_the_basic_entry() {
        let rule = GLINTS_FIELDS
            .iter()
            .find(|(field, _)| *field == CanonicalField::BaseSalary)
            .map(|(_, rule)| *rule)
            .unwrap();
        let bonus_only = json!({"salaries": [
            {"salaryType": "BONUS", "CurrencyCode": "IDR", "minAmount": 1, "maxAmount": 2}
        ]});
        assert_eq!(rule.extract(&bonus_only), None);
        assert_eq!(rule.extract(&json!({"salaries": []})), None);
        assert_eq!(rule.extract(&json!({})), None);
    }

    #[test]
    fn unresolved_template_placeholder_leaves_field_unknown() {
        let item = json!({"minYearsOfExperience": 1, "maxYearsOfExperience": null});
        assert_eq!(
            render_template("{/minYearsOfExperience}-{/maxYearsOfExperience} years", &item),
            None
        );
        assert_eq!(
            render_template("{/minYearsOfExperience}+ years", &item).as_deref(),
            Some("1+ years")
        );
        assert_eq!(render_template("{/unterminated", &item), None);
    }

    #[test]
    fn pointer_rule_falls_through_nulls() {
        let item = json!({"latestUpdatedAt": null, "publishedAt": "2024-01-01"});
        let rule = JsonRule::Pointer(&["/latestUpdatedAt", "/publishedAt"]);
        assert_eq!(rule.extract(&item), Some(json!("2024-01-01")));
    }

    #[test]
    fn json_adapter_skips_non_object_entries() {
        let payload = json!({"data": {"docs": [{"role": "QA"}, "junk", null]}});
        let jobs = dealls_adapter()
            .parse_listing(&bundle("dealls", "application/json", &payload.to_string()))
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0]["job_title"], "QA");
    }

    #[test]
    fn missing_job_array_is_an_error_not_an_empty_batch() {
        let err = dealls_adapter()
            .parse_listing(&bundle("dealls", "application/json", r#"{"data": {"total": 0}}"#))
            .unwrap_err();
        assert!(err.to_string().contains("no job array at /data/docs"));

        let err = dealls_adapter()
            .parse_listing(&bundle("dealls", "application/json", "<html>rate limited</html>"))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Anyhow(_)));
    }

    #[test]
    fn bundle_for_another_source_is_rejected() {
        let err = glints_adapter()
            .parse_listing(&bundle("dealls", "application/json", "{}"))
            .unwrap_err();
        assert!(err.to_string().contains("does not match adapter source_id=glints"));
    }

    #[test]
    fn bundle_without_raw_text_is_rejected() {
        let mut b = bundle("mekari", "text/html", "");
        b.raw_artifact.inline_text = None;
        assert!(mekari_adapter().parse_listing(&b).is_err());
    }

    #[test]
    fn html_adapter_reads_cards_and_resolves_links() {
        let html = r#"
            <div class="js-card list-item">
              <a href="/jobs/fk01/">
                <h3 class="js-job-list-opening-name"> Product
                   Designer </h3>
                <div class="rb-text-4">Design</div>
                <div class="js-job-list-opening-loc">Jakarta</div>
                <div class="js-job-list-opening-meta"><span>Full Time</span><span>Hybrid</span></div>
              </a>
            </div>
            <div class="js-card list-item">
              <a href="https://elsewhere.test/jobs/2">
                <h3 class="js-job-list-opening-name">Analyst</h3>
              </a>
            </div>"#;
        let jobs = mekari_adapter()
            .parse_listing(&bundle("mekari", "text/html", html))
            .unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0]["job_url"], "https://mekari.hire.trakstar.com/jobs/fk01/");
        assert_eq!(jobs[0]["job_type"], "Full Time");
        assert_eq!(jobs[0]["work_arrangement"], "Hybrid");
        assert!(jobs[0]["job_title"].as_str().unwrap().contains("Designer"));
        assert_eq!(jobs[1]["job_url"], "https://elsewhere.test/jobs/2");
        assert!(jobs[1]["job_location"].is_null());
    }

    #[test]
    fn invalid_selector_is_reported() {
        const BROKEN: &[(CanonicalField, HtmlRule)] =
            &[(CanonicalField::JobTitle, HtmlRule::Text("h3[["))];
        let adapter = HtmlListingAdapter {
            source_id: "mekari",
            base_url: "https://example.test",
            item_selector: "div",
            fields: BROKEN,
        };
        let err = adapter
            .parse_listing(&bundle("mekari", "text/html", "<div></div>"))
            .unwrap_err();
        assert!(err.to_string().contains("invalid selector"));
    }

    #[test]
    fn relative_links_join_base_url() {
        let base = "https://mekari.hire.trakstar.com";
        let link = |href| resolve_link(base, href);
        assert_eq!(link("/jobs/9/").as_deref(), Some("https://mekari.hire.trakstar.com/jobs/9/"));
        assert_eq!(link("jobs/9").as_deref(), Some("https://mekari.hire.trakstar.com/jobs/9"));
        assert_eq!(link("../jobs/9").as_deref(), Some("https://mekari.hire.trakstar.com/jobs/9"));
        assert_eq!(
            link("//cdn.other.test/jobs/9").as_deref(),
            Some("https://cdn.other.test/jobs/9")
        );
        assert_eq!(link("HTTPS://x.test/a").as_deref(), Some("https://x.test/a"));
        assert_eq!(link("http://b.test/z").as_deref(), Some("http://b.test/z"));
    }

    #[test]
    fn unparsable_base_leaves_link_unknown() {
        assert_eq!(resolve_link("not a url", "/jobs/9"), None);
        assert_eq!(resolve_link("https://a.test", "http://[::1"), None);
    }

    #[test]
    fn fixture_bundle_loads_relative_raw_artifact() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("raw")).unwrap();
        fs::write(dir.path().join("raw/listing.json"), r#"{"data": {"docs": []}}"#).unwrap();
        let bundle_path = dir.path().join("bundle.json");
        fs::write(
            &bundle_path,
            json!({
                "fixture_id": "dealls-empty",
                "source_id": "dealls",
                "captured_from_url": "https://api.sejutacita.id/v1/explore-job/job",
                "fetched_at": "2024-03-05T10:00:00Z",
                "raw_artifact": {"content_type": "application/json", "path": "raw/listing.json"}
            })
            .to_string(),
        )
        .unwrap();

        let bundle = load_fixture_bundle(&bundle_path).unwrap();
        assert!(bundle.raw_text().unwrap().contains("docs"));
        assert!(dealls_adapter().parse_listing(&bundle).unwrap().is_empty());

        fs::remove_file(dir.path().join("raw/listing.json")).unwrap();
        assert!(load_fixture_bundle(&bundle_path).is_err());
    }
}
