//! Extracted event records.

use std::fmt;

use chrono::NaiveDate;

/// Placeholder written for any field that could not be extracted.
pub const SENTINEL: &str = "N/A";

/// Value of one field in a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Missing,
}

impl FieldValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Missing => f.write_str(SENTINEL),
        }
    }
}

/// One extracted listing entry, fields in configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    /// Build a record from `(name, value)` pairs in column order.
    pub fn new(fields: Vec<(String, FieldValue)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Cells as written to the output table.
    pub fn to_row(&self) -> Vec<String> {
        self.values().map(|v| v.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_display() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 18).unwrap();
        assert_eq!(FieldValue::Date(date).to_string(), "2024-02-18");
        assert_eq!(FieldValue::Missing.to_string(), "N/A");
        assert_eq!(FieldValue::Text("Gig".into()).to_string(), "Gig");
    }

    #[test]
    fn test_record_row_order() {
        let record = Record::new(vec![
            ("Title".into(), FieldValue::Text("A".into())),
            ("Price".into(), FieldValue::Missing),
        ]);
        assert_eq!(record.to_row(), vec!["A", "N/A"]);
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["Title", "Price"]);
        assert_eq!(record.get("Price"), Some(&FieldValue::Missing));
    }
}
