//! Data Cleaner Module
//! Normalises column names and missing-value markers in loaded records.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::loader::Record;

/// Marker the source data uses for a missing value.
pub const NA_MARKER: &str = "NA";

static NON_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_]").expect("static pattern"));

/// Snake-case a column name: lowercase, spaces to `_`, drop everything else
/// that is not an ASCII letter, digit or underscore.
pub fn best_practice_name(name: &str) -> String {
    let lowered = name.to_lowercase().replace(' ', "_");
    NON_IDENTIFIER.replace_all(&lowered, "").into_owned()
}

/// Owns a set of records and cleans them in place.
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    data: Vec<Record>,
}

impl Cleaner {
    pub fn new(data: Vec<Record>) -> Self {
        Self { data }
    }

    /// Rename every column with [`best_practice_name`].
    ///
    /// The column list comes from the first record; keys that only appear in
    /// later records are left alone.
    pub fn rename_with_best_practices(&mut self) {
        let Some(first) = self.data.first() else {
            return;
        };

        let renamed: HashMap<String, String> = first
            .keys()
            .map(|name| (name.clone(), best_practice_name(name)))
            .filter(|(old, new)| old != new)
            .collect();
        if renamed.is_empty() {
            return;
        }
        debug!(columns = renamed.len(), "Renaming columns");

        for row in &mut self.data {
            *row = std::mem::take(row)
                .into_iter()
                .map(|(key, value)| match renamed.get(&key) {
                    Some(new_key) => (new_key.clone(), value),
                    None => (key, value),
                })
                .collect();
        }
    }

    /// Replace every `"NA"` string (case-sensitive) with null.
    pub fn na_to_none(&mut self) -> &[Record] {
        for value in self.data.iter_mut().flat_map(|row| row.values_mut()) {
            if value.as_str() == Some(NA_MARKER) {
                *value = Value::Null;
            }
        }
        &self.data
    }

    pub fn records(&self) -> &[Record] {
        &self.data
    }

    pub fn into_records(self) -> Vec<Record> {
        self.data
    }
}
