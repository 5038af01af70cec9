//! Display-safe string normalization for raw scalar values.
//!
//! Commas never survive sanitization: the exported dataset is comma-delimited
//! and cells must stay single-valued whatever the eventual storage format.

/// Per-record sentinel for unknown values.
pub const NOT_AVAILABLE: &str = "N/A";
/// Sentinel used when the dataset merge fills a cell a batch never supplied.
pub const NOT_SPECIFIED: &str = "Not specified";

const COMMA_SEPARATOR: &str = " - ";
const ARRANGEMENT_SEPARATOR: &str = " / ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Titles, names, salaries, locations.
    FreeText,
    /// Short labels: first letter capitalized.
    Categorical,
    /// Every word capitalized; `_` and slug hyphens become spaces.
    TitleCase,
    /// Whitespace and commas are percent-encoded.
    Url,
}

/// Sanitize a raw scalar into a display-safe string, `"N/A"` when unknown.
pub fn sanitize(raw: Option<&str>, kind: FieldKind) -> String {
    sanitize_or(raw, kind, NOT_AVAILABLE)
}

pub fn sanitize_or(raw: Option<&str>, kind: FieldKind, sentinel: &str) -> String {
    let Some(trimmed) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return sentinel.to_string();
    };

    let cleaned = match kind {
        FieldKind::Url => sanitize_url(trimmed),
        FieldKind::FreeText => sanitize_text(trimmed),
        FieldKind::Categorical => capitalize_first(&sanitize_text(trimmed)),
        FieldKind::TitleCase => title_case(&sanitize_text(&unslug(trimmed))),
    };

    if cleaned.is_empty() {
        sentinel.to_string()
    } else {
        cleaned
    }
}

/// Collapse every run of whitespace (newlines included) into a single space.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn sanitize_text(value: &str) -> String {
    let collapsed = collapse_whitespace(&strip_thousands_separators(value));
    collapsed
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(COMMA_SEPARATOR)
}

/// `5,000,000` -> `5000000`; commas not between two digits are left alone.
fn strip_thousands_separators(value: &str) -> String {
    let chars = value.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(value.len());
    for (i, ch) in chars.iter().enumerate() {
        if *ch == ',' {
            let before = i > 0 && chars[i - 1].is_ascii_digit();
            let after = chars.get(i + 1).is_some_and(|c| c.is_ascii_digit());
            if before && after {
                continue;
            }
        }
        out.push(*ch);
    }
    out
}

/// `software-engineering` -> `software engineering`. Hyphens inside text that
/// already has spaces are kept.
fn unslug(value: &str) -> String {
    let spaced = value.replace('_', " ");
    if spaced.contains(char::is_whitespace) {
        spaced
    } else {
        spaced.replace('-', " ")
    }
}

fn sanitize_url(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("%20")
        .replace(',', "%2C")
}

/// First character uppercased, the rest lowercased.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => {
            let mut s = String::new();
            s.extend(first.to_uppercase());
            s.push_str(&chars.as_str().to_lowercase());
            s
        }
        None => String::new(),
    }
}

fn capitalize_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => {
            let mut s = String::new();
            s.extend(first.to_uppercase());
            s.push_str(chars.as_str());
            s
        }
        None => String::new(),
    }
}

fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Job-type categories in priority order; the first category with a matching
/// synonym wins.
const JOB_TYPE_CATEGORIES: &[(&str, &[&str])] = &[
    ("Contract", &["contract", "kontrak"]),
    ("Freelance", &["freelance", "pekerja lepas"]),
    (
        "Part-time",
        &["part time", "part-time", "part_time", "parttime", "paruh waktu"],
    ),
    (
        "Full-time",
        &["full time", "full-time", "full_time", "fulltime", "penuh waktu"],
    ),
    ("Internship", &["intern", "magang"]),
    ("Permanent", &["permanent", "karyawan tetap"]),
    ("Consultant", &["consultant", "konsultan"]),
    ("Casual", &["casual"]),
    ("Partnership", &["partnership", "kemitraan"]),
];

/// Collapse a free-text job type into the closed category set.
///
/// Matching is a case-insensitive substring search over the whole input, so a
/// comma-joined list of several signals resolves to the highest-priority
/// category present. Unmatched input is sanitized and capitalized.
pub fn sanitize_job_type(raw: Option<&str>) -> String {
    let Some(value) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return NOT_AVAILABLE.to_string();
    };
    let haystack = value.replace(',', " & ").to_lowercase();

    for (label, synonyms) in JOB_TYPE_CATEGORIES {
        if synonyms.iter().any(|s| haystack.contains(s)) {
            return (*label).to_string();
        }
    }

    let cleaned = sanitize(Some(value), FieldKind::FreeText);
    if cleaned == NOT_AVAILABLE {
        cleaned
    } else {
        capitalize(&cleaned)
    }
}

/// Arrangement tags in output order.
const WORK_ARRANGEMENT_TAGS: &[(&str, &[&str])] = &[
    ("On-site", &["on-site", "onsite", "on site", "in office", "wfo", "di kantor"]),
    ("Hybrid", &["hybrid"]),
    (
        "Remote",
        &["remote", "work from home", "work-from-home", "wfh", "jarak jauh"],
    ),
];

/// Map arrangement text to a slash-joined set of tags (`Hybrid / Remote`).
/// Text matching no known tag passes through as a categorical label.
pub fn sanitize_work_arrangement(raw: Option<&str>) -> String {
    let Some(value) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return NOT_AVAILABLE.to_string();
    };
    let haystack = value.to_lowercase();

    let tags = WORK_ARRANGEMENT_TAGS
        .iter()
        .filter(|(_, synonyms)| synonyms.iter().any(|s| haystack.contains(s)))
        .map(|(tag, _)| *tag)
        .collect::<Vec<_>>();

    if tags.is_empty() {
        sanitize(Some(value), FieldKind::Categorical)
    } else {
        tags.join(ARRANGEMENT_SEPARATOR)
    }
}
