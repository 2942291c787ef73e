//! Record and row models.
//!
//! Epistemic foundation:
//! - K_i: A page is a list of JSON records, each with an `id`
//! - B_i: The nested attribute shape varies per record → Option everywhere
//! - K_i: A row only carries the fields its record had

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// 1-based page number, bounded by the configured total.
pub type PageIndex = u32;

/// One item from a fetched page, kept as untyped JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Value);

impl RawRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The record id rendered as text, if present and scalar.
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The `attributes` object, if any.
    pub fn attributes(&self) -> Option<&serde_json::Map<String, Value>> {
        self.0.get("attributes")?.as_object()
    }

    /// `(key, value)` pairs from a `[{key, value}, ...]` attribute list.
    ///
    /// Entries without a string key are skipped.
    pub fn metadata_pairs(&self, field: &str) -> Vec<(String, String)> {
        let Some(list) = self.attributes().and_then(|a| a.get(field)).and_then(Value::as_array)
        else {
            return Vec::new();
        };

        list.iter()
            .filter_map(|entry| {
                let key = entry.get("key")?.as_str()?;
                let value = entry.get("value").map(scalar_text).unwrap_or_default();
                Some((key.to_string(), value))
            })
            .collect()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for RawRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Render a JSON value as a table cell.
///
/// Strings are verbatim, null is empty, everything else is its JSON text.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A flat row: column name → cell text. Always has `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: HashMap<String, String>,
}

impl Row {
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), id.into());
        Self { fields }
    }

    pub fn from_fields(fields: HashMap<String, String>) -> Self {
        Self { fields }
    }

    pub fn id(&self) -> &str {
        self.fields.get("id").map(String::as_str).unwrap_or_default()
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(column.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Statistics from a fetch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total_pages: u32,
    pub resumed_from: PageIndex,
    /// Committed pages whose rows were lost because the table was missing on resume
    pub pages_missing: u32,
    pub pages_fetched: u32,
    pub records_written: usize,
    pub total_rows: usize,
    pub retries: u64,
    pub columns: usize,
    pub runtime_secs: f64,
    pub pages_per_hour: f64,
}

impl RunStats {
    /// Calculate derived statistics.
    pub fn finalize(&mut self) {
        if self.runtime_secs > 0.0 {
            self.pages_per_hour = (self.pages_fetched as f64 / self.runtime_secs) * 3600.0;
        }
    }
}
