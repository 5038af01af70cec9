//! Job-age buckets derived from the gap between two canonical timestamps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::datetime::parse_canonical;

/// Freshness class. The lowercase literals are a downstream contract:
/// spreadsheet color rules key on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobAge {
    New,
    Recent,
    Stale,
    Expired,
    Unknown,
}

impl JobAge {
    pub const ALL: [JobAge; 5] = [
        JobAge::New,
        JobAge::Recent,
        JobAge::Stale,
        JobAge::Expired,
        JobAge::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobAge::New => "new",
            JobAge::Recent => "recent",
            JobAge::Stale => "stale",
            JobAge::Expired => "expired",
            JobAge::Unknown => "unknown",
        }
    }

    /// Bucket an elapsed-day count; the sign is ignored.
    pub fn from_days(diff_days: i64) -> Self {
        match diff_days.unsigned_abs() {
            0..=7 => JobAge::New,
            8..=15 => JobAge::Recent,
            16..=30 => JobAge::Stale,
            _ => JobAge::Expired,
        }
    }
}

impl fmt::Display for JobAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job age literal {0:?}")]
pub struct UnknownJobAge(pub String);

impl FromStr for JobAge {
    type Err = UnknownJobAge;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobAge::ALL
            .into_iter()
            .find(|age| age.as_str() == s.trim())
            .ok_or_else(|| UnknownJobAge(s.to_string()))
    }
}

/// Whole days between two canonical timestamps, truncated toward zero.
pub fn days_between(first_seen: &str, last_seen: &str) -> Option<i64> {
    let first = parse_canonical(first_seen)?;
    let last = parse_canonical(last_seen)?;
    Some((last - first).num_days())
}

/// Classify `(first_seen, last_seen)`; `Unknown` when either side is not in
/// canonical form. Symmetric under swap.
pub fn classify_age(first_seen: &str, last_seen: &str) -> JobAge {
    match days_between(first_seen, last_seen) {
        Some(days) => JobAge::from_days(days),
        None => JobAge::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::{format_canonical, normalize_datetime};
    use chrono::{Duration, NaiveDate};

    fn shifted(base: &str, days: i64) -> String {
        let dt = parse_canonical(base).unwrap() + Duration::days(days);
        format_canonical(dt)
    }

    #[test]
    fn same_timestamp_is_new() {
        let first = "2024-03-05 10:00:00";
        assert_eq!(classify_age(first, first), JobAge::New);
    }

    #[test]
    fn bucket_boundaries() {
        let base = "2024-01-01 00:00:00";
        let cases = [
            (7, JobAge::New),
            (8, JobAge::Recent),
            (15, JobAge::Recent),
            (16, JobAge::Stale),
            (30, JobAge::Stale),
            (31, JobAge::Expired),
            (365, JobAge::Expired),
        ];
        for (days, expected) in cases {
            assert_eq!(
                classify_age(base, &shifted(base, days)),
                expected,
                "diff_days={days}"
            );
        }
    }

    #[test]
    fn classification_is_symmetric() {
        let base = "2024-01-01 00:00:00";
        for days in [0, 3, 7, 8, 12, 16, 29, 31, 90] {
            let other = shifted(base, days);
            assert_eq!(classify_age(base, &other), classify_age(&other, base));
        }
        let a = "2024-01-01 23:00:00";
        let b = "2024-01-09 01:00:00";
        assert_eq!(classify_age(a, b), classify_age(b, a));
    }

    #[test]
    fn partial_days_truncate() {
        assert_eq!(
            days_between("2024-01-01 12:00:00", "2024-01-09 11:59:59"),
            Some(7)
        );
        assert_eq!(
            classify_age("2024-01-01 12:00:00", "2024-01-09 11:59:59"),
            JobAge::New
        );
    }

    #[test]
    fn unparsable_inputs_are_unknown() {
        assert_eq!(classify_age("N/A", "2024-01-01 00:00:00"), JobAge::Unknown);
        assert_eq!(classify_age("2024-01-01 00:00:00", ""), JobAge::Unknown);
        assert_eq!(
            classify_age("2024-01-01T00:00:00Z", "2024-01-01 00:00:00"),
            JobAge::Unknown
        );
    }

    #[test]
    fn normalized_iso_inputs_never_classify_unknown() {
        let start = NaiveDate::from_ymd_opt(2023, 11, 20)
            .unwrap()
            .and_hms_opt(8, 15, 0)
            .unwrap();
        for offset in 0..120 {
            let dt = start + Duration::hours(offset * 13);
            let iso = format!("{}Z", dt.format("%Y-%m-%dT%H:%M:%S%.3f"));
            let canonical = normalize_datetime(&iso);
            assert_ne!(
                classify_age(&canonical, "2024-03-05 10:00:00"),
                JobAge::Unknown,
                "{iso}"
            );
        }
    }

    #[test]
    fn literals_round_trip_through_from_str() {
        for age in JobAge::ALL {
            assert_eq!(age.as_str().parse::<JobAge>(), Ok(age));
        }
        assert!("hot".parse::<JobAge>().is_err());
    }

    #[test]
    fn unknown_literal_error_names_the_input() {
        let err = "hot".parse::<JobAge>().unwrap_err();
        assert_eq!(err, UnknownJobAge("hot".to_string()));
        assert_eq!(err.to_string(), "unknown job age literal \"hot\"");
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }
}
