//! Tabular normalization of raw rating documents
//!
//! The store hands back schemaless documents. This module turns them into a
//! typed, sorted table and rejects the whole batch on the first record that
//! cannot be cast, naming the record and the column.

use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use vanno_common::events::{
    is_identifier_key, record_video_id, value_as_identifier, DATE_KEY, TIMESTAMP_KEY,
    USERNAME_KEY, VIDEO_ID_KEY,
};
use vanno_common::RawRecord;

use crate::error::AnalysisError;

/// Column name reported when a batch carries no measured variable at all
pub const MEASURED_VARIABLE_COLUMN: &str = "<measured variable>";

/// A measured value that is not the one being analysed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Cell::Missing,
            Some(Value::Number(n)) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Missing),
            Some(Value::String(s)) => Cell::Text(s.clone()),
            Some(other) => Cell::Text(other.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Cell::Missing => 0,
            Cell::Number(_) => 1,
            Cell::Text(_) => 2,
        }
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// One typed rating row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingRow {
    pub video_id: String,
    pub username: String,
    pub timestamp: f64,
    /// One cell per discovered variable, in table variable order
    pub values: Vec<(String, Cell)>,
    pub date: Option<String>,
    /// Position of the record in the batch handed to `normalize`
    pub source_index: usize,
}

impl RatingRow {
    pub fn value(&self, variable: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == variable)
            .and_then(|(_, cell)| cell.as_f64())
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.video_id
            .cmp(&other.video_id)
            .then_with(|| self.username.cmp(&other.username))
            .then_with(|| self.timestamp.total_cmp(&other.timestamp))
            .then_with(|| {
                self.values
                    .iter()
                    .zip(&other.values)
                    .map(|((_, a), (_, b))| a.total_cmp(b))
                    .find(|ord| ord.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| self.date.cmp(&other.date))
    }
}

/// Typed ratings of one video, sorted in canonical column order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingTable {
    pub video_id: String,
    /// Measured variables in first-seen order
    pub variables: Vec<String>,
    /// Variable cast strictly and used for analysis
    pub selected: String,
    pub rows: Vec<RatingRow>,
}

impl RatingTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct usernames, sorted
    pub fn usernames(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rows.iter().map(|r| r.username.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Cast a batch of raw documents for one video into a typed table
pub fn normalize(
    records: &[RawRecord],
    video_id: &str,
    requested_variable: Option<&str>,
) -> Result<RatingTable, AnalysisError> {
    normalize_within(records, video_id, requested_variable, f64::MAX)
}

/// Like [`normalize`], treating rows past `max_timestamp` seconds as malformed
pub fn normalize_within(
    records: &[RawRecord],
    video_id: &str,
    requested_variable: Option<&str>,
    max_timestamp: f64,
) -> Result<RatingTable, AnalysisError> {
    if records.is_empty() {
        return Err(AnalysisError::NoData {
            video_id: video_id.to_string(),
        });
    }

    let variables = discover_variables(records);
    let selected = match requested_variable {
        Some(name) if variables.iter().any(|v| v == name) => name.to_string(),
        _ => variables.first().cloned().ok_or_else(|| {
            AnalysisError::malformed(0, MEASURED_VARIABLE_COLUMN, "no measured variable present")
        })?,
    };

    let mut rows = records
        .iter()
        .enumerate()
        .map(|(index, record)| cast_row(index, record, &variables, &selected, max_timestamp))
        .collect::<Result<Vec<_>, _>>()?;
    rows.sort_by(RatingRow::canonical_cmp);

    Ok(RatingTable {
        video_id: video_id.to_string(),
        variables,
        selected,
        rows,
    })
}

fn discover_variables(records: &[RawRecord]) -> Vec<String> {
    let mut variables: Vec<String> = Vec::new();
    for key in records.iter().flat_map(|record| record.keys()) {
        if !is_identifier_key(key) && !variables.iter().any(|v| v == key) {
            variables.push(key.clone());
        }
    }
    variables
}

fn cast_row(
    index: usize,
    record: &RawRecord,
    variables: &[String],
    selected: &str,
    max_timestamp: f64,
) -> Result<RatingRow, AnalysisError> {
    let video_id = record_video_id(record)
        .ok_or_else(|| AnalysisError::malformed(index, VIDEO_ID_KEY, "missing or not a string"))?;
    let username = record
        .get(USERNAME_KEY)
        .and_then(value_as_identifier)
        .ok_or_else(|| AnalysisError::malformed(index, USERNAME_KEY, "missing or not a string"))?;

    let timestamp = cast_number(index, TIMESTAMP_KEY, record.get(TIMESTAMP_KEY))?;
    if timestamp < 0.0 {
        return Err(AnalysisError::malformed(
            index,
            TIMESTAMP_KEY,
            format!("negative timestamp {}", timestamp),
        ));
    }
    if timestamp > max_timestamp {
        return Err(AnalysisError::malformed(
            index,
            TIMESTAMP_KEY,
            format!("timestamp {} beyond {} seconds", timestamp, max_timestamp),
        ));
    }

    let mut values = Vec::with_capacity(variables.len());
    for name in variables {
        let cell = if name == selected {
            Cell::Number(cast_number(index, name, record.get(name))?)
        } else {
            Cell::from_value(record.get(name))
        };
        values.push((name.clone(), cell));
    }

    let date = match record.get(DATE_KEY) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value_as_identifier(value).ok_or_else(|| {
            AnalysisError::malformed(index, DATE_KEY, "not a string")
        })?),
    };

    Ok(RatingRow {
        video_id,
        username,
        timestamp,
        values,
        date,
        source_index: index,
    })
}

/// Finite number from a JSON number or a numeric string
fn cast_number(index: usize, column: &str, value: Option<&Value>) -> Result<f64, AnalysisError> {
    let parsed = match value {
        None | Some(Value::Null) => return Err(AnalysisError::malformed(index, column, "missing")),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(AnalysisError::malformed(
            index,
            column,
            format!("{} is not a finite number", value.map(Value::to_string).unwrap_or_default()),
        )),
    }
}
