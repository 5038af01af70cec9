//! Merge per-source batches into one fixed-column table.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::freshness::JobAge;
use crate::sanitize::{collapse_whitespace, NOT_SPECIFIED};
use crate::{CanonicalField, CanonicalJobRecord};

/// One exported row keyed by canonical column name. Rows coming from outside
/// the normalizer may lack columns.
pub type Row = BTreeMap<String, String>;

/// Header plus fully-populated, single-line string rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dataset {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new()
    }
}

impl Dataset {
    pub fn new() -> Self {
        Self {
            header: CanonicalField::EXPORT_ORDER
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CanonicalJobRecord>) -> Self {
        let mut dataset = Self::new();
        for record in records {
            dataset.push_row(&record.to_row());
        }
        dataset
    }

    /// Concatenate batches in the order given. Missing cells are filled with
    /// `"Not specified"`; `job_age` cells outside the freshness literals become
    /// `"unknown"`.
    pub fn merge<B, R>(batches: B) -> Self
    where
        B: IntoIterator<Item = R>,
        R: IntoIterator<Item = Row>,
    {
        let mut dataset = Self::new();
        for batch in batches {
            for row in batch {
                dataset.push_row(&row);
            }
        }
        dataset
    }

    pub fn push_row(&mut self, row: &Row) {
        let cells = CanonicalField::EXPORT_ORDER
            .iter()
            .map(|field| {
                let cell = row
                    .get(field.as_str())
                    .map(|v| collapse_whitespace(v))
                    .filter(|v| !v.is_empty());
                match field {
                    CanonicalField::JobAge => cell
                        .and_then(|v| v.parse::<JobAge>().ok())
                        .unwrap_or(JobAge::Unknown)
                        .as_str()
                        .to_string(),
                    _ => cell.unwrap_or_else(|| NOT_SPECIFIED.to_string()),
                }
            })
            .collect();
        self.rows.push(cells);
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, field: CanonicalField) -> impl Iterator<Item = &str> + '_ {
        let index = CanonicalField::EXPORT_ORDER
            .iter()
            .position(|f| *f == field)
            .unwrap_or_default();
        self.rows.iter().map(move |row| row[index].as_str())
    }

    /// Rows keyed by column name again, for JSON export.
    pub fn to_rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|cells| {
                self.header
                    .iter()
                    .cloned()
                    .zip(cells.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Header row followed by data rows.
    pub fn into_table(self) -> Vec<Vec<String>> {
        let mut table = Vec::with_capacity(self.rows.len() + 1);
        table.push(self.header);
        table.extend(self.rows);
        table
    }
}
