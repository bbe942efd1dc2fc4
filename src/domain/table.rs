//! Columnar typed table.
//!
//! A `Dataset` is an ordered list of named columns. Each column stores one
//! value type (`f64`, `String`, `NaiveDateTime`) with `None` marking a missing
//! cell. Construction enforces equal column lengths and unique names; the
//! analysis code relies on both and never re-checks them.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Number,
    Text,
    Timestamp,
}

impl ColumnKind {
    pub fn label(self) -> &'static str {
        match self {
            ColumnKind::Number => "numeric",
            ColumnKind::Text => "text",
            ColumnKind::Timestamp => "timestamp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "lowercase")]
pub enum ColumnData {
    Number(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Number(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Number(_) => ColumnKind::Number,
            ColumnData::Text(_) => ColumnKind::Text,
            ColumnData::Timestamp(_) => ColumnKind::Timestamp,
        }
    }

    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Number(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Timestamp(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Borrow the cell at `row`. Panics if `row` is out of bounds.
    pub fn value(&self, row: usize) -> Value<'_> {
        match self {
            ColumnData::Number(v) => v[row].map_or(Value::Null, Value::Number),
            ColumnData::Text(v) => v[row].as_deref().map_or(Value::Null, Value::Text),
            ColumnData::Timestamp(v) => v[row].map_or(Value::Null, Value::Timestamp),
        }
    }

    fn select(&self, rows: &[usize]) -> ColumnData {
        match self {
            ColumnData::Number(v) => ColumnData::Number(rows.iter().map(|&i| v[i]).collect()),
            ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&i| v[i].clone()).collect()),
            ColumnData::Timestamp(v) => ColumnData::Timestamp(rows.iter().map(|&i| v[i]).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn number(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(name, ColumnData::Number(values))
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self::new(name, ColumnData::Text(values))
    }

    pub fn timestamp(name: impl Into<String>, values: Vec<Option<NaiveDateTime>>) -> Self {
        Self::new(name, ColumnData::Timestamp(values))
    }

    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fraction of missing cells; 0 for an empty column.
    pub fn null_fraction(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.data.null_count() as f64 / self.len() as f64
    }

    pub fn as_numbers(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Number(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&[Option<String>]> {
        match &self.data {
            ColumnData::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamps(&self) -> Option<&[Option<NaiveDateTime>]> {
        match &self.data {
            ColumnData::Timestamp(v) => Some(v),
            _ => None,
        }
    }

    /// Number of distinct non-null values.
    pub fn distinct_count(&self) -> usize {
        (0..self.len())
            .map(|row| self.data.value(row))
            .filter(|v| !v.is_null())
            .map(|v| v.key())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// A borrowed cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Null,
    Number(f64),
    Text(&'a str),
    Timestamp(NaiveDateTime),
}

impl Value<'_> {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn key(&self) -> CellKey {
        match *self {
            Value::Null => CellKey::Null,
            // -0.0 and 0.0 compare equal, so they must hash equal too.
            Value::Number(v) if v == 0.0 => CellKey::Number(0.0f64.to_bits()),
            Value::Number(v) => CellKey::Number(v.to_bits()),
            Value::Text(s) => CellKey::Text(s.to_string()),
            Value::Timestamp(ts) => CellKey::Timestamp(ts),
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(v) => f.write_str(&format_number(*v)),
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(ts) => f.write_str(&format_timestamp(*ts)),
        }
    }
}

/// Owned, hashable identity of a cell (used for dedup, distinct counts, grouping).
///
/// Ordering: numbers ascending, then timestamps, then text, then nulls last.
/// A single column only ever mixes its own kind with `Null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Number(u64),
    Timestamp(NaiveDateTime),
    Text(String),
    Null,
}

impl CellKey {
    fn rank(&self) -> u8 {
        match self {
            CellKey::Number(_) => 0,
            CellKey::Timestamp(_) => 1,
            CellKey::Text(_) => 2,
            CellKey::Null => 3,
        }
    }

    pub fn as_value(&self) -> Value<'_> {
        match self {
            CellKey::Number(bits) => Value::Number(f64::from_bits(*bits)),
            CellKey::Timestamp(ts) => Value::Timestamp(*ts),
            CellKey::Text(s) => Value::Text(s),
            CellKey::Null => Value::Null,
        }
    }
}

impl Ord for CellKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CellKey::Number(a), CellKey::Number(b)) => f64::from_bits(*a).total_cmp(&f64::from_bits(*b)),
            (CellKey::Timestamp(a), CellKey::Timestamp(b)) => a.cmp(b),
            (CellKey::Text(a), CellKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for CellKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Render a number without a trailing `.0` when it is integral.
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}

/// Render a timestamp as a date when it falls on midnight.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    if ts.time() == NaiveTime::MIN {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Column>", into = "Vec<Column>")]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    /// Build a dataset, rejecting ragged columns and duplicate names.
    pub fn new(columns: Vec<Column>) -> Result<Self, AnalysisError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(AnalysisError::DuplicateColumn(column.name.clone()));
            }
        }
        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(AnalysisError::LengthMismatch {
                    name: bad.name.clone(),
                    expected,
                    found: bad.len(),
                });
            }
        }
        Ok(Self { columns })
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Result<&Column, AnalysisError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))
    }

    pub fn numbers(&self, name: &str) -> Result<&[Option<f64>], AnalysisError> {
        self.column(name)?
            .as_numbers()
            .ok_or_else(|| AnalysisError::WrongColumnType {
                name: name.to_string(),
                expected: "numeric",
            })
    }

    pub fn timestamps(&self, name: &str) -> Result<&[Option<NaiveDateTime>], AnalysisError> {
        self.column(name)?
            .as_timestamps()
            .ok_or_else(|| AnalysisError::WrongColumnType {
                name: name.to_string(),
                expected: "timestamp",
            })
    }

    /// Identity of a whole row, for duplicate detection.
    pub fn row_key(&self, row: usize) -> Vec<CellKey> {
        self.columns.iter().map(|c| c.data.value(row).key()).collect()
    }

    /// Copy the given rows (in the given order) into a new dataset.
    pub fn select_rows(&self, rows: &[usize]) -> Dataset {
        Dataset {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.select(rows)))
                .collect(),
        }
    }

    /// Add a column, replacing any existing column of the same name in place.
    pub fn upsert_column(mut self, column: Column) -> Result<Dataset, AnalysisError> {
        if !self.columns.is_empty() && column.len() != self.row_count() {
            let found = column.len();
            return Err(AnalysisError::LengthMismatch {
                name: column.name,
                expected: self.row_count(),
                found,
            });
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(self)
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }
}

impl TryFrom<Vec<Column>> for Dataset {
    type Error = AnalysisError;

    fn try_from(columns: Vec<Column>) -> Result<Self, Self::Error> {
        Dataset::new(columns)
    }
}

impl From<Dataset> for Vec<Column> {
    fn from(dataset: Dataset) -> Self {
        dataset.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn new_rejects_ragged_and_duplicate_columns() {
        let ragged = Dataset::new(vec![
            Column::number("a", vec![Some(1.0), Some(2.0)]),
            Column::number("b", vec![Some(1.0)]),
        ]);
        assert!(matches!(ragged, Err(AnalysisError::LengthMismatch { .. })));

        let dup = Dataset::new(vec![
            Column::number("a", vec![Some(1.0)]),
            Column::text("a", vec![Some("x".to_string())]),
        ]);
        assert_eq!(dup, Err(AnalysisError::DuplicateColumn("a".to_string())));
    }

    #[test]
    fn typed_accessors_name_the_column() {
        let ds = Dataset::new(vec![Column::text("country", vec![Some("US".to_string())])]).unwrap();
        assert_eq!(
            ds.numbers("country"),
            Err(AnalysisError::WrongColumnType {
                name: "country".to_string(),
                expected: "numeric"
            })
        );
        assert_eq!(ds.numbers("revenue"), Err(AnalysisError::MissingColumn("revenue".to_string())));
    }

    #[test]
    fn distinct_count_ignores_nulls_and_signed_zero() {
        let col = Column::number("x", vec![Some(0.0), Some(-0.0), None, Some(1.5), Some(1.5)]);
        assert_eq!(col.distinct_count(), 2);
    }

    #[test]
    fn cell_keys_order_numbers_numerically() {
        let mut keys = vec![
            Value::Null.key(),
            Value::Number(10.0).key(),
            Value::Number(-2.0).key(),
            Value::Number(2.0).key(),
        ];
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(|k| k.as_value().to_string()).collect();
        assert_eq!(rendered, vec!["-2", "2", "10", ""]);
    }

    #[test]
    fn display_formats_dates_and_integers() {
        assert_eq!(Value::Timestamp(ts(2025, 3, 1)).to_string(), "2025-03-01");
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn json_round_trip_revalidates() {
        let ds = Dataset::new(vec![
            Column::timestamp("date", vec![Some(ts(2025, 1, 1)), None]),
            Column::number("value", vec![Some(1.0), None]),
        ])
        .unwrap();
        let json = serde_json::to_string(&ds).unwrap();
        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ds);

        let ragged = r#"[{"name":"a","data":{"kind":"number","values":[1.0]}},
                        {"name":"b","data":{"kind":"number","values":[]}}]"#;
        assert!(serde_json::from_str::<Dataset>(ragged).is_err());
    }

    #[test]
    fn upsert_replaces_existing_column() {
        let ds = Dataset::new(vec![Column::number("a", vec![Some(1.0)])]).unwrap();
        let ds = ds.upsert_column(Column::number("a", vec![Some(2.0)])).unwrap();
        assert_eq!(ds.column_count(), 1);
        assert_eq!(ds.numbers("a").unwrap(), &[Some(2.0)]);
    }

    #[test]
    fn upsert_rejects_a_column_of_the_wrong_length() {
        let ds = Dataset::new(vec![Column::number("a", vec![Some(1.0), Some(2.0)])]).unwrap();
        let err = ds.upsert_column(Column::number("flag", vec![Some(0.0)])).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::LengthMismatch {
                name: "flag".to_string(),
                expected: 2,
                found: 1,
            }
        );
    }
}
