//! Descriptor Module
//! Per-column descriptive statistics over loaded records.

use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

use crate::data::Record;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DescriptorError {
    #[error("Column '{0}' not found in data")]
    ColumnNotFound(String),
    #[error("Column '{0}' is not numeric")]
    NotNumeric(String),
    #[error("Percentile must be a finite number, got {0}")]
    InvalidPercentile(f64),
}

/// Which columns a statistic covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Columns {
    /// Every applicable column of the first record.
    #[default]
    All,
    Named(Vec<String>),
}

impl Columns {
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Columns::Named(names.into_iter().map(Into::into).collect())
    }
}

/// Scalar kind of a record value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Int,
    Float,
    Str,
    Bool,
    Unknown,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => ValueKind::Int,
            Value::Number(_) => ValueKind::Float,
            Value::String(_) => ValueKind::Str,
            Value::Bool(_) => ValueKind::Bool,
            _ => ValueKind::Unknown,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "str",
            ValueKind::Bool => "bool",
            ValueKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Most frequent value of a column and its kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeAndMode {
    pub kind: ValueKind,
    pub mode: Option<Value>,
}

/// Every statistic for one column selection, ordered by column name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub none_ratio: BTreeMap<String, f64>,
    pub average: BTreeMap<String, f64>,
    pub median: BTreeMap<String, f64>,
    pub percentile: f64,
    pub percentile_values: BTreeMap<String, f64>,
    pub type_and_mode: BTreeMap<String, TypeAndMode>,
}

/// Summarises a borrowed set of records. Columns are computed in parallel.
pub struct Descriptor<'a> {
    data: &'a [Record],
}

impl<'a> Descriptor<'a> {
    pub fn new(data: &'a [Record]) -> Self {
        Self { data }
    }

    /// Ratio of null values per column; 0 when there are no rows.
    pub fn none_ratio(&self, columns: &Columns) -> Result<HashMap<String, f64>, DescriptorError> {
        let total = self.data.len();
        let ratios = self
            .resolve(columns, false)?
            .into_par_iter()
            .map(|column| {
                let nulls = self
                    .data
                    .iter()
                    .filter(|row| row.get(&column).map_or(true, Value::is_null))
                    .count();
                let ratio = if total > 0 {
                    nulls as f64 / total as f64
                } else {
                    0.0
                };
                (column, ratio)
            })
            .collect();
        Ok(ratios)
    }

    /// Mean of the non-null values of each numeric column.
    pub fn average(&self, columns: &Columns) -> Result<HashMap<String, f64>, DescriptorError> {
        self.per_numeric_column(columns, |values| {
            values.iter().sum::<f64>() / values.len() as f64
        })
    }

    /// Median of the non-null values of each numeric column.
    pub fn median(&self, columns: &Columns) -> Result<HashMap<String, f64>, DescriptorError> {
        self.per_numeric_column(columns, |values| {
            sort_values(values);
            median_of_sorted(values)
        })
    }

    /// `p`-th percentile (0..=100, clamped) with linear interpolation between ranks.
    /// A NaN or infinite `p` is an error.
    pub fn percentile(
        &self,
        columns: &Columns,
        p: f64,
    ) -> Result<HashMap<String, f64>, DescriptorError> {
        if !p.is_finite() {
            return Err(DescriptorError::InvalidPercentile(p));
        }
        self.per_numeric_column(columns, |values| {
            sort_values(values);
            percentile_of_sorted(values, p)
        })
    }

    /// Kind and most frequent value per column, ignoring nulls.
    ///
    /// Ties go to the value seen first.
    pub fn type_and_mode(
        &self,
        columns: &Columns,
    ) -> Result<HashMap<String, TypeAndMode>, DescriptorError> {
        let modes = self
            .resolve(columns, false)?
            .into_par_iter()
            .map(|column| {
                let values = self
                    .data
                    .iter()
                    .filter_map(|row| row.get(&column))
                    .filter(|value| !value.is_null());
                let summary = match mode_of(values) {
                    Some(mode) => TypeAndMode {
                        kind: ValueKind::of(mode),
                        mode: Some(mode.clone()),
                    },
                    None => TypeAndMode {
                        kind: ValueKind::Unknown,
                        mode: None,
                    },
                };
                (column, summary)
            })
            .collect();
        Ok(modes)
    }

    /// Run every statistic over `columns`.
    pub fn summary(&self, columns: &Columns, percentile: f64) -> Result<Summary, DescriptorError> {
        Ok(Summary {
            none_ratio: self.none_ratio(columns)?.into_iter().collect(),
            average: self.average(columns)?.into_iter().collect(),
            median: self.median(columns)?.into_iter().collect(),
            percentile,
            percentile_values: self.percentile(columns, percentile)?.into_iter().collect(),
            type_and_mode: self.type_and_mode(columns)?.into_iter().collect(),
        })
    }

    fn per_numeric_column<F>(
        &self,
        columns: &Columns,
        summarise: F,
    ) -> Result<HashMap<String, f64>, DescriptorError>
    where
        F: Fn(&mut [f64]) -> f64 + Sync,
    {
        self.resolve(columns, true)?
            .into_par_iter()
            .map(|column| {
                let mut values = self.numeric_values(&column)?;
                let stat = if values.is_empty() {
                    0.0
                } else {
                    summarise(&mut values)
                };
                Ok((column, stat))
            })
            .collect()
    }

    /// Non-null values of `column`, which must all be numbers.
    fn numeric_values(&self, column: &str) -> Result<Vec<f64>, DescriptorError> {
        let mut values = Vec::with_capacity(self.data.len());
        for value in self.data.iter().filter_map(|row| row.get(column)) {
            match value {
                Value::Null => {}
                Value::Number(n) => {
                    if let Some(v) = n.as_f64() {
                        values.push(v);
                    }
                }
                _ => return Err(DescriptorError::NotNumeric(column.to_string())),
            }
        }
        Ok(values)
    }

    /// Expand `All` from the first record; check named columns exist in it.
    fn resolve(&self, columns: &Columns, numeric_only: bool) -> Result<Vec<String>, DescriptorError> {
        let first = self.data.first();
        match columns {
            Columns::All => Ok(first
                .map(|row| {
                    row.iter()
                        .filter(|(_, value)| !numeric_only || value.is_number())
                        .map(|(name, _)| name.clone())
                        .collect()
                })
                .unwrap_or_default()),
            Columns::Named(names) => {
                if let Some(missing) = names
                    .iter()
                    .find(|name| !first.is_some_and(|row| row.contains_key(name.as_str())))
                {
                    return Err(DescriptorError::ColumnNotFound(missing.clone()));
                }
                Ok(names.clone())
            }
        }
    }
}

fn sort_values(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Linear interpolation between closest ranks (NumPy compatible).
fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(n - 1);
    let frac = rank - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Counting key for a value. `1` and `1.0` share a key; strings and numbers never do.
fn mode_key(value: &Value) -> String {
    match value {
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => format!("n:{i}"),
            (_, Some(u), _) => format!("n:{u}"),
            (_, _, Some(f)) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("n:{}", f as i64),
            _ => format!("n:{n}"),
        },
        other => other.to_string(),
    }
}

/// Most frequent value; ties go to the value seen first, which is also the
/// representative returned when `1` and `1.0` are counted together.
fn mode_of<'v>(values: impl Iterator<Item = &'v Value>) -> Option<&'v Value> {
    // Value itself is not hashable.
    let mut counts: HashMap<String, (usize, usize, &'v Value)> = HashMap::new();
    for (index, value) in values.enumerate() {
        counts
            .entry(mode_key(value))
            .or_insert((0, index, value))
            .0 += 1;
    }
    counts
        .into_values()
        .max_by_key(|&(count, first_seen, _)| (count, Reverse(first_seen)))
        .map(|(_, _, value)| value)
}
