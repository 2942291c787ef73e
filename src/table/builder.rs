//! Schema-evolving row builder.
//!
//! Epistemic foundation:
//! - K_i: Every row has an `id`; a record without one is a structural fault
//! - B_i: Metadata keys are not known ahead of time → columns are discovered
//! - K_i: Discovery only appends to the column set, in first-seen order

use crate::models::{FlattenMode, PageIndex, RawRecord, Result, Row, StructuralError, scalar_text};
use crate::table::ColumnSet;
use serde_json::Value;
use tracing::debug;

/// Column holding the record id. Flattened keys never overwrite it.
const ID_COLUMN: &str = "id";

/// Columns a normalize-mode table starts with.
pub const NORMALIZE_SEED_COLUMNS: [&str; 3] = ["id", "attributes", "relationships"];

/// Converts raw records into flat rows, growing the shared column set.
#[derive(Debug, Clone)]
pub struct RowBuilder {
    mode: FlattenMode,
    metadata_field: String,
}

impl RowBuilder {
    pub fn new(mode: FlattenMode, metadata_field: impl Into<String>) -> Self {
        Self {
            mode,
            metadata_field: metadata_field.into(),
        }
    }

    /// Metadata-mode builder reading the `sample-metadata` list.
    pub fn metadata() -> Self {
        Self::new(FlattenMode::Metadata, "sample-metadata")
    }

    /// The column set a fresh table starts from.
    pub fn initial_columns(&self) -> ColumnSet {
        match self.mode {
            FlattenMode::Metadata => ColumnSet::new(["id"]),
            FlattenMode::Normalize => ColumnSet::new(NORMALIZE_SEED_COLUMNS),
        }
    }

    /// Flatten one record.
    ///
    /// `page` and `index` only locate the record in the error when it has no id.
    /// The column set is untouched when the record is rejected.
    pub fn build(
        &self,
        page: PageIndex,
        index: usize,
        record: &RawRecord,
        columns: &mut ColumnSet,
    ) -> Result<Row> {
        let id = record
            .id()
            .ok_or(StructuralError::MissingId { page, index })?;

        let mut row = Row::with_id(id);
        match self.mode {
            FlattenMode::Metadata => {
                for (key, value) in record.metadata_pairs(&self.metadata_field) {
                    if key == ID_COLUMN {
                        debug!(page, index, "Ignoring metadata key that shadows the record id");
                        continue;
                    }
                    if columns.insert(key.as_str()) {
                        debug!(column = %key, page, "Discovered column");
                    }
                    row.set(key, value);
                }
            }
            FlattenMode::Normalize => {
                let mut cells = Vec::new();
                if let Value::Object(map) = record.as_value() {
                    for (key, value) in map {
                        if key != ID_COLUMN {
                            flatten_into(key.clone(), value, &mut cells);
                        }
                    }
                }
                for (key, value) in cells {
                    if columns.insert(key.as_str()) {
                        debug!(column = %key, page, "Discovered column");
                    }
                    row.set(key, value);
                }
            }
        }
        Ok(row)
    }

    /// Flatten every record on a page, in order.
    pub fn build_page(
        &self,
        page: PageIndex,
        records: &[RawRecord],
        columns: &mut ColumnSet,
    ) -> Result<Vec<Row>> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| self.build(page, index, record, columns))
            .collect()
    }
}

/// Dotted-path flattening: objects recurse, everything else is a cell.
///
/// Lists are kept whole as JSON text. Empty objects produce no cell.
fn flatten_into(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(format!("{prefix}.{key}"), child, out);
            }
        }
        other => out.push((prefix, scalar_text(other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchError;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        RawRecord::new(value)
    }

    fn meta(id: &str, pairs: &[(&str, &str)]) -> RawRecord {
        let list: Vec<Value> = pairs
            .iter()
            .map(|(k, v)| json!({"key": k, "value": v}))
            .collect();
        record(json!({"id": id, "attributes": {"sample-metadata": list}}))
    }

    #[test]
    fn test_metadata_discovers_columns() {
        let builder = RowBuilder::metadata();
        let mut columns = builder.initial_columns();

        let a = builder.build(1, 0, &meta("A", &[("x", "1")]), &mut columns).unwrap();
        let b = builder
            .build(2, 0, &meta("B", &[("y", "2"), ("x", "3")]), &mut columns)
            .unwrap();

        assert_eq!(columns.as_slice(), ["id", "x", "y"]);
        assert_eq!(a.get("x"), Some("1"));
        assert_eq!(a.get("y"), None);
        assert_eq!(b.get("y"), Some("2"));
        assert_eq!(b.get("x"), Some("3"));
    }

    #[test]
    fn test_record_without_metadata_has_only_id() {
        let builder = RowBuilder::metadata();
        let mut columns = builder.initial_columns();
        let row = builder.build(3, 0, &record(json!({"id": "C"})), &mut columns).unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row.id(), "C");
        assert_eq!(columns.len(), 1);
    }

    #[test]
    fn test_missing_id_is_structural_and_leaves_columns() {
        let builder = RowBuilder::metadata();
        let mut columns = builder.initial_columns();
        let bad = record(json!({"attributes": {"sample-metadata": [{"key": "z", "value": "9"}]}}));

        let err = builder.build(4, 7, &bad, &mut columns).unwrap_err();
        assert!(matches!(
            err,
            FetchError::Structural(StructuralError::MissingId { page: 4, index: 7 })
        ));
        assert_eq!(columns.as_slice(), ["id"]);
    }

    #[test]
    fn test_build_page_stops_at_first_bad_record() {
        let builder = RowBuilder::metadata();
        let mut columns = builder.initial_columns();
        let records = vec![meta("A", &[]), record(json!({"type": "samples"})), meta("C", &[])];
        let err = builder.build_page(9, &records, &mut columns).unwrap_err();
        assert!(matches!(
            err,
            FetchError::Structural(StructuralError::MissingId { page: 9, index: 1 })
        ));
    }

    #[test]
    fn test_metadata_key_cannot_replace_id() {
        let builder = RowBuilder::metadata();
        let mut columns = builder.initial_columns();

        let row = builder
            .build(1, 0, &meta("A", &[("id", ""), ("x", "1")]), &mut columns)
            .unwrap();
        assert_eq!(row.id(), "A");
        assert_eq!(row.get("x"), Some("1"));

        let row = builder.build(1, 1, &meta("B", &[("id", "Z")]), &mut columns).unwrap();
        assert_eq!(row.id(), "B");
        assert_eq!(columns.as_slice(), ["id", "x"]);
    }

    #[test]
    fn test_custom_metadata_field() {
        let builder = RowBuilder::new(FlattenMode::Metadata, "tags");
        let mut columns = builder.initial_columns();
        let r = record(json!({"id": "T", "attributes": {"tags": [{"key": "k", "value": true}]}}));
        let row = builder.build(1, 0, &r, &mut columns).unwrap();
        assert_eq!(row.get("k"), Some("true"));
    }

    #[test]
    fn test_normalize_mode() {
        let builder = RowBuilder::new(FlattenMode::Normalize, "sample-metadata");
        let mut columns = builder.initial_columns();
        assert_eq!(columns.as_slice(), NORMALIZE_SEED_COLUMNS);

        let r = record(json!({
            "id": "ERS1",
            "type": "samples",
            "attributes": {
                "accession": "ERS1",
                "latitude": 51.5,
                "sample-metadata": [{"key": "a", "value": "b"}],
                "empty": {}
            },
            "relationships": {"biome": {"data": {"id": "root:Soil"}}}
        }));
        let row = builder.build(1, 0, &r, &mut columns).unwrap();

        assert_eq!(row.get("attributes.accession"), Some("ERS1"));
        assert_eq!(row.get("attributes.latitude"), Some("51.5"));
        assert_eq!(
            row.get("attributes.sample-metadata"),
            Some(r#"[{"key":"a","value":"b"}]"#)
        );
        assert_eq!(row.get("relationships.biome.data.id"), Some("root:Soil"));
        assert_eq!(row.get("type"), Some("samples"));
        assert_eq!(row.get("attributes.empty"), None);
        assert!(columns.contains("relationships.biome.data.id"));
        assert_eq!(&columns.as_slice()[..3], NORMALIZE_SEED_COLUMNS);
    }
}
