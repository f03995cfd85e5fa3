// Data structures for exported rows and the export document

use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Number, Value};

/// A single cell read from a table, tagged with the kind of value the driver produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    /// Any other driver type, already rendered to its textual form.
    Other(String),
}

impl CellValue {
    /// Maps the cell onto a JSON value. Never fails.
    ///
    /// Exact decimals become the nearest binary float, which loses precision for
    /// values with more significant digits than an `f64` holds. That trade-off is
    /// deliberate: consumers get a JSON number instead of a string.
    /// Anything JSON has no native form for (non-finite floats) becomes a string.
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Integer(i) => Value::Number((*i).into()),
            CellValue::Float(f) => float_or_string(*f),
            CellValue::Decimal(d) => decimal_to_json(d),
            CellValue::Text(s) | CellValue::Other(s) => Value::String(s.clone()),
        }
    }
}

fn float_or_string(f: f64) -> Value {
    match Number::from_f64(f) {
        Some(n) => Value::Number(n),
        None => Value::String(f.to_string()),
    }
}

// Parsing the exact decimal text gives a correctly rounded f64.
fn decimal_to_json(d: &Decimal) -> Value {
    let text = d.to_string();
    match text.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(text),
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// One exported row: column name to value, in the column order of the query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, CellValue)>,
}

impl Record {
    /// Pairs the i-th column name with the i-th value.
    pub fn from_row(columns: &[String], values: Vec<CellValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        let fields = columns.iter().cloned().zip(values).collect();
        Self { fields }
    }
}

#[cfg(test)]
impl Record {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields.iter().find(|(k, _)| k == column).map(|(_, v)| v)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Every row of one table, in fetch order.
#[derive(Debug, Clone, Default)]
pub struct TableData {
    pub name: String,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl TableData {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let records = rows
            .into_iter()
            .map(|values| Record::from_row(&columns, values))
            .collect();
        Self { name: name.into(), columns, records }
    }
}

/// Table name to records, kept in catalog order.
#[derive(Debug, Clone, Default)]
pub struct ExportDocument {
    pub tables: Vec<TableData>,
}

impl ExportDocument {
    #[cfg(test)]
    pub fn table(&self, name: &str) -> Option<&TableData> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.records.len()).sum()
    }
}

impl Serialize for ExportDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.tables.len()))?;
        for table in &self.tables {
            map.serialize_entry(&table.name, &table.records)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn decimal_becomes_float() {
        let d = Decimal::from_str("10.50").unwrap();
        assert_eq!(CellValue::Decimal(d).to_json(), json!(10.5));
        assert_eq!(serde_json::to_string(&CellValue::Decimal(d)).unwrap(), "10.5");
    }

    #[test]
    fn long_decimal_rounds_to_nearest_float() {
        let text = "0.1234567890123456789012345678";
        let d = Decimal::from_str(text).unwrap();
        let expected: f64 = text.parse().unwrap();
        assert_eq!(CellValue::Decimal(d).to_json().as_f64(), Some(expected));

        let big = Decimal::from_str("79228162514264337593543950335").unwrap();
        assert_eq!(CellValue::Decimal(big).to_json().as_f64(), Some(7.922816251426434e28));
    }

    #[test]
    fn non_finite_floats_become_strings() {
        assert_eq!(CellValue::Float(f64::NAN).to_json(), json!("NaN"));
        assert_eq!(CellValue::Float(f64::INFINITY).to_json(), json!("inf"));
        assert_eq!(CellValue::Float(f64::NEG_INFINITY).to_json(), json!("-inf"));
    }

    #[test]
    fn scalars_round_trip_through_json() {
        let cells = vec![
            (CellValue::Null, json!(null)),
            (CellValue::Bool(true), json!(true)),
            (CellValue::Integer(i64::MIN), json!(i64::MIN)),
            (CellValue::Float(0.1), json!(0.1)),
            (CellValue::Float(-1.5e300), json!(-1.5e300)),
            (CellValue::Text("Привет, 世界".into()), json!("Привет, 世界")),
        ];
        for (cell, expected) in cells {
            let text = serde_json::to_string(&cell).unwrap();
            let back: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(back, expected);
        }
    }

    #[test]
    fn record_keys_follow_column_order() {
        let columns = vec!["id".to_string(), "name".to_string(), "balance".to_string()];
        let record = Record::from_row(
            &columns,
            vec![CellValue::Integer(1), CellValue::Text("Ann".into()), CellValue::Float(10.5)],
        );
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["id", "name", "balance"]);
        assert_eq!(record.get("name"), Some(&CellValue::Text("Ann".into())));
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"id":1,"name":"Ann","balance":10.5}"#
        );
    }

    #[test]
    fn document_keeps_empty_tables() {
        let doc = ExportDocument {
            tables: vec![
                TableData::new(
                    "a",
                    vec!["id".into(), "name".into()],
                    vec![vec![CellValue::Integer(1), CellValue::Text("x".into())]],
                ),
                TableData::new("b", vec!["id".into()], vec![]),
            ],
        };
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({"a": [{"id": 1, "name": "x"}], "b": []})
        );
        assert_eq!(doc.total_rows(), 1);
    }
}
