use log::debug;
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::resolver::Record;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read data file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse JSON data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unexpected data shape: {0}")]
    Shape(String),
    #[error("Unsupported data file format: {0:?} (expected .json or .csv)")]
    UnsupportedFormat(String),
}

/// An ordered, immutable sequence of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Loads a dataset, choosing the decoder from the file extension.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let dataset = match ext.as_str() {
            "json" => Self::from_json_str(&std::fs::read_to_string(path)?)?,
            "csv" => Self::from_csv_reader(std::fs::File::open(path)?)?,
            _ => return Err(DatasetError::UnsupportedFormat(ext)),
        };
        debug!("Loaded {} records from {:?}", dataset.len(), path);
        Ok(dataset)
    }

    /// Accepts a top-level array of objects, or an object wrapping exactly one
    /// such array (e.g. `{"rows": [...]}`).
    pub fn from_json_str(content: &str) -> Result<Self, DatasetError> {
        let value: Value = serde_json::from_str(content)?;
        let rows = match value {
            Value::Array(rows) => rows,
            Value::Object(map) => {
                let mut arrays = map.into_iter().filter_map(|(_, v)| match v {
                    Value::Array(rows) => Some(rows),
                    _ => None,
                });
                match (arrays.next(), arrays.next()) {
                    (Some(rows), None) => rows,
                    _ => {
                        return Err(DatasetError::Shape(
                            "object must contain exactly one array of rows".to_string(),
                        ))
                    }
                }
            }
            _ => {
                return Err(DatasetError::Shape(
                    "expected an array of row objects".to_string(),
                ))
            }
        };

        let records = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| match row {
                Value::Object(record) => Ok(record),
                other => Err(DatasetError::Shape(format!(
                    "row {} is not an object: {}",
                    i + 1,
                    other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { records })
    }

    /// Reads CSV with a header row; every cell becomes a string value.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let mut records = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            let mut record = Record::new();
            for (i, header) in headers.iter().enumerate() {
                let cell = row.get(i).unwrap_or("");
                record.insert(header.to_string(), Value::String(cell.to_string()));
            }
            records.push(record);
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Column names, taken from the first record in its key order.
    pub fn columns(&self) -> Vec<String> {
        self.records
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.records
            .first()
            .map(|r| r.contains_key(name))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_json_array() {
        let ds = Dataset::from_json_str(r#"[{"Name": "Alice", "Age": 30}, {"Name": "Bob"}]"#).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.columns(), vec!["Name", "Age"]);
        assert!(ds.has_column("Age"));
        assert_eq!(ds.get(1).unwrap()["Name"], "Bob");
    }

    #[test]
    fn test_from_json_wrapped_array() {
        let ds = Dataset::from_json_str(r#"{"rows": [{"Name": "Alice"}]}"#).unwrap();
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_from_json_rejects_bad_shapes() {
        assert!(matches!(
            Dataset::from_json_str(r#"[1, 2]"#),
            Err(DatasetError::Shape(_))
        ));
        assert!(matches!(
            Dataset::from_json_str(r#"{"a": [], "b": []}"#),
            Err(DatasetError::Shape(_))
        ));
        assert!(matches!(
            Dataset::from_json_str(r#""text""#),
            Err(DatasetError::Shape(_))
        ));
    }

    #[test]
    fn test_from_csv() {
        let data = "Name,Course\nAlice,Rust\nBob\n";
        let ds = Dataset::from_csv_reader(data.as_bytes()).unwrap();
        assert_eq!(ds.columns(), vec!["Name", "Course"]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(0).unwrap()["Course"], "Rust");
        assert_eq!(ds.get(1).unwrap()["Course"], "");
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("names.csv");
        let mut f = std::fs::File::create(&csv_path).unwrap();
        writeln!(f, "Name\nAlice\nBob\nCarol").unwrap();

        let ds = Dataset::load(&csv_path).unwrap();
        assert_eq!(ds.len(), 3);

        let txt_path = dir.path().join("names.txt");
        std::fs::write(&txt_path, "Name").unwrap();
        assert!(matches!(
            Dataset::load(&txt_path),
            Err(DatasetError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_empty_dataset_has_no_columns() {
        let ds = Dataset::default();
        assert!(ds.is_empty());
        assert!(ds.columns().is_empty());
        assert!(!ds.has_column("Name"));
    }
}
