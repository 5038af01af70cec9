//! Canonical job record model, field sanitizers, timestamp normalization and
//! freshness classification for Freya.
//!
//! Everything in this crate is pure: no I/O, no wall-clock reads. Callers pass
//! the run timestamp explicitly.

use serde::{Deserialize, Serialize};

pub mod dataset;
pub mod datetime;
pub mod freshness;
pub mod normalize;
pub mod sanitize;

pub use dataset::{Dataset, Row};
pub use datetime::{
    compute_apply_end_date, format_canonical, normalize_datetime, normalize_epoch,
    parse_canonical, parse_datetime, CANONICAL_FORMAT,
};
pub use freshness::{classify_age, days_between, JobAge};
pub use normalize::{
    normalize, normalize_batch, BatchOutcome, NormalizeError, RawJob, SourceContext, SourceKind,
};
pub use sanitize::{
    collapse_whitespace, sanitize, sanitize_job_type, sanitize_or, sanitize_work_arrangement,
    FieldKind, NOT_AVAILABLE, NOT_SPECIFIED,
};

pub const CRATE_NAME: &str = "freya-core";

/// Every column of the canonical record, in export order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    JobAge,
    Company,
    WorkArrangement,
    JobTitle,
    JobType,
    JobDepartment,
    JobLocation,
    JobUrl,
    BaseSalary,
    JobLevel,
    FirstSeen,
    LastSeen,
    JobApplyEndDate,
    IsActive,
    JobBoard,
    CompanyUrl,
    JobBoardUrl,
}

impl CanonicalField {
    pub const EXPORT_ORDER: [CanonicalField; 17] = [
        CanonicalField::JobAge,
        CanonicalField::Company,
        CanonicalField::WorkArrangement,
        CanonicalField::JobTitle,
        CanonicalField::JobType,
        CanonicalField::JobDepartment,
        CanonicalField::JobLocation,
        CanonicalField::JobUrl,
        CanonicalField::BaseSalary,
        CanonicalField::JobLevel,
        CanonicalField::FirstSeen,
        CanonicalField::LastSeen,
        CanonicalField::JobApplyEndDate,
        CanonicalField::IsActive,
        CanonicalField::JobBoard,
        CanonicalField::CompanyUrl,
        CanonicalField::JobBoardUrl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::JobAge => "job_age",
            CanonicalField::Company => "company",
            CanonicalField::WorkArrangement => "work_arrangement",
            CanonicalField::JobTitle => "job_title",
            CanonicalField::JobType => "job_type",
            CanonicalField::JobDepartment => "job_department",
            CanonicalField::JobLocation => "job_location",
            CanonicalField::JobUrl => "job_url",
            CanonicalField::BaseSalary => "base_salary",
            CanonicalField::JobLevel => "job_level",
            CanonicalField::FirstSeen => "first_seen",
            CanonicalField::LastSeen => "last_seen",
            CanonicalField::JobApplyEndDate => "job_apply_end_date",
            CanonicalField::IsActive => "is_active",
            CanonicalField::JobBoard => "job_board",
            CanonicalField::CompanyUrl => "company_url",
            CanonicalField::JobBoardUrl => "job_board_url",
        }
    }

    /// Raw mapping keys accepted for this field, canonical name first.
    pub fn raw_aliases(self) -> &'static [&'static str] {
        match self {
            CanonicalField::JobAge => &["job_age"],
            CanonicalField::Company => &["company", "company_name", "employer"],
            CanonicalField::WorkArrangement => {
                &["work_arrangement", "work_arrangements", "workplace", "arrangement"]
            }
            CanonicalField::JobTitle => &["job_title", "title", "role"],
            CanonicalField::JobType => &["job_type", "type", "employment_type", "work_type"],
            CanonicalField::JobDepartment => &["job_department", "department", "category"],
            CanonicalField::JobLocation => &["job_location", "location", "city"],
            CanonicalField::JobUrl => &["job_url", "url", "link"],
            CanonicalField::BaseSalary => &["base_salary", "salary"],
            CanonicalField::JobLevel => &["job_level", "level", "seniority"],
            CanonicalField::FirstSeen => &["first_seen"],
            CanonicalField::LastSeen => &["last_seen", "updated", "posted", "created"],
            CanonicalField::JobApplyEndDate => {
                &["job_apply_end_date", "apply_end", "expires_at", "valid_through"]
            }
            CanonicalField::IsActive => &["is_active", "active", "status"],
            CanonicalField::JobBoard => &["job_board"],
            CanonicalField::CompanyUrl => &["company_url"],
            CanonicalField::JobBoardUrl => &["job_board_url"],
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized job listing. Every field is always populated; unknown values
/// carry the `"N/A"` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalJobRecord {
    pub job_title: String,
    pub company: String,
    pub company_url: String,
    pub job_url: String,
    pub job_location: String,
    pub job_department: String,
    pub job_type: String,
    pub job_level: String,
    pub work_arrangement: String,
    pub base_salary: String,
    pub first_seen: String,
    pub last_seen: String,
    pub job_apply_end_date: String,
    pub is_active: String,
    pub job_age: JobAge,
    pub job_board: String,
    pub job_board_url: String,
}

impl CanonicalJobRecord {
    pub fn get(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::JobAge => self.job_age.as_str(),
            CanonicalField::Company => &self.company,
            CanonicalField::WorkArrangement => &self.work_arrangement,
            CanonicalField::JobTitle => &self.job_title,
            CanonicalField::JobType => &self.job_type,
            CanonicalField::JobDepartment => &self.job_department,
            CanonicalField::JobLocation => &self.job_location,
            CanonicalField::JobUrl => &self.job_url,
            CanonicalField::BaseSalary => &self.base_salary,
            CanonicalField::JobLevel => &self.job_level,
            CanonicalField::FirstSeen => &self.first_seen,
            CanonicalField::LastSeen => &self.last_seen,
            CanonicalField::JobApplyEndDate => &self.job_apply_end_date,
            CanonicalField::IsActive => &self.is_active,
            CanonicalField::JobBoard => &self.job_board,
            CanonicalField::CompanyUrl => &self.company_url,
            CanonicalField::JobBoardUrl => &self.job_board_url,
        }
    }

    pub fn to_row(&self) -> Row {
        CanonicalField::EXPORT_ORDER
            .iter()
            .map(|field| (field.as_str().to_string(), self.get(*field).to_string()))
            .collect()
    }

    /// Replace `first_seen` with an earlier observation and recompute `job_age`.
    pub fn with_first_seen(mut self, first_seen: &str) -> Self {
        if parse_canonical(first_seen).is_some() {
            self.first_seen = first_seen.to_string();
            self.job_age = classify_age(&self.first_seen, &self.last_seen);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> CanonicalJobRecord {
        CanonicalJobRecord {
            job_title: "Backend Engineer".into(),
            company: "Acme".into(),
            company_url: NOT_AVAILABLE.into(),
            job_url: "https://example.com/jobs/1".into(),
            job_location: NOT_AVAILABLE.into(),
            job_department: NOT_AVAILABLE.into(),
            job_type: "Full-time".into(),
            job_level: NOT_AVAILABLE.into(),
            work_arrangement: "Remote".into(),
            base_salary: NOT_AVAILABLE.into(),
            first_seen: "2024-03-05 10:00:00".into(),
            last_seen: "2024-03-01 10:00:00".into(),
            job_apply_end_date: "2024-03-31 10:00:00".into(),
            is_active: "True".into(),
            job_age: JobAge::New,
            job_board: NOT_AVAILABLE.into(),
            job_board_url: NOT_AVAILABLE.into(),
        }
    }

    #[test]
    fn export_order_names_every_field_once() {
        let mut names = CanonicalField::EXPORT_ORDER
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names[0], "job_age");
        assert_eq!(names[16], "job_board_url");
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 17);
    }

    #[test]
    fn row_contains_every_canonical_key() {
        let row = sample_record().to_row();
        for field in CanonicalField::EXPORT_ORDER {
            assert!(row.contains_key(field.as_str()), "missing {field}");
        }
        assert_eq!(row["job_age"], "new");
    }

    #[test]
    fn with_first_seen_recomputes_age_from_older_observation() {
        let record = sample_record().with_first_seen("2024-01-20 10:00:00");
        assert_eq!(record.first_seen, "2024-01-20 10:00:00");
        assert_eq!(record.job_age, JobAge::Expired);

        let untouched = sample_record().with_first_seen("not a timestamp");
        assert_eq!(untouched.first_seen, "2024-03-05 10:00:00");
        assert_eq!(untouched.job_age, JobAge::New);
    }

    #[test]
    fn record_serializes_job_age_as_lowercase_literal() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["job_age"], "new");
        let back: CanonicalJobRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample_record());
    }
}
