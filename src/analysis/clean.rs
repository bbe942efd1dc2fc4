//! Dataset cleaning: duplicate removal, date coercion, missing-value imputation.
//!
//! Policy:
//! - exact duplicate rows are dropped (first occurrence kept, order preserved)
//! - text columns whose name hints at a date are parsed into timestamps; a
//!   cell that does not parse becomes null
//! - numeric columns below the null threshold are filled with their median,
//!   text columns with their mode (or `"Unknown"`)
//! - columns at or above the threshold keep their nulls; downstream code has
//!   to tolerate them
//!
//! Imputation can turn two distinct rows into duplicates, and dropping rows
//! can push a column under the null threshold, so dedup + impute repeat until
//! nothing changes. That makes `clean` idempotent.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::domain::{ColumnData, Dataset};
use crate::math::median;

/// Substrings (lower-case) that mark a column as holding dates.
pub const DATE_HINTS: [&str; 5] = ["date", "time", "day", "month", "year"];

/// Placeholder for text columns with no mode.
pub const UNKNOWN_PLACEHOLDER: &str = "Unknown";

/// Clean with the default thresholds.
pub fn clean(dataset: &Dataset) -> Dataset {
    clean_with(dataset, &AnalysisConfig::default())
}

pub fn clean_with(dataset: &Dataset, config: &AnalysisConfig) -> Dataset {
    let mut out = dataset.clone();
    coerce_date_columns(&mut out);

    loop {
        let before_rows = out.row_count();
        out = drop_duplicate_rows(&out);
        let dropped = before_rows - out.row_count();
        let filled = impute_missing(&mut out, config.impute_max_null_fraction);
        debug!(dropped, filled, rows = out.row_count(), "clean pass");
        if dropped == 0 && filled == 0 {
            break;
        }
    }

    out
}

/// True when the column name suggests date content.
pub fn has_date_hint(name: &str) -> bool {
    let lower = name.to_lowercase();
    DATE_HINTS.iter().any(|hint| lower.contains(hint))
}

fn coerce_date_columns(dataset: &mut Dataset) {
    for column in dataset.columns_mut() {
        if !has_date_hint(&column.name) {
            continue;
        }
        let ColumnData::Text(values) = &column.data else {
            continue;
        };
        let parsed: Vec<Option<NaiveDateTime>> = values
            .iter()
            .map(|v| v.as_deref().and_then(parse_timestamp))
            .collect();
        let failed = values
            .iter()
            .zip(&parsed)
            .filter(|(raw, ts)| raw.is_some() && ts.is_none())
            .count();
        debug!(column = %column.name, failed, "coerced column to timestamps");
        column.data = ColumnData::Timestamp(parsed);
    }
}

/// Parse a timestamp in one of the common export formats.
///
/// Bare dates map to midnight. Offsets (RFC 3339) are converted to UTC and
/// dropped.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    const DATETIME_FMTS: [&str; 6] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M",
    ];
    const DATE_FMTS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FMTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    // Year-month, e.g. "2024-03".
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn drop_duplicate_rows(dataset: &Dataset) -> Dataset {
    let mut seen = HashSet::with_capacity(dataset.row_count());
    let keep: Vec<usize> = (0..dataset.row_count())
        .filter(|&row| seen.insert(dataset.row_key(row)))
        .collect();
    if keep.len() == dataset.row_count() {
        return dataset.clone();
    }
    dataset.select_rows(&keep)
}

/// Fill nulls in low-missingness columns; returns the number of cells filled.
fn impute_missing(dataset: &mut Dataset, max_null_fraction: f64) -> usize {
    let mut filled = 0;
    for column in dataset.columns_mut() {
        let nulls = column.data.null_count();
        if nulls == 0 || column.null_fraction() >= max_null_fraction {
            continue;
        }
        let did_fill = match &mut column.data {
            ColumnData::Number(values) => fill_numeric(values),
            ColumnData::Text(values) => {
                fill_text(values);
                true
            }
            ColumnData::Timestamp(_) => false,
        };
        if did_fill {
            debug!(column = %column.name, nulls, "imputed missing values");
            filled += nulls;
        }
    }
    filled
}

fn fill_numeric(values: &mut [Option<f64>]) -> bool {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let Some(fill) = median(&present) else {
        return false;
    };
    for v in values.iter_mut().filter(|v| v.is_none()) {
        *v = Some(fill);
    }
    true
}

fn fill_text(values: &mut [Option<String>]) {
    let fill = mode(values).unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string());
    for v in values.iter_mut().filter(|v| v.is_none()) {
        *v = Some(fill.clone());
    }
}

/// Most frequent value; ties resolve to the lexicographically smallest.
pub fn mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(value, _)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Column;

    fn text_column(name: &str, values: &[Option<&str>]) -> Column {
        Column::text(name, values.iter().map(|v| v.map(str::to_string)).collect())
    }

    fn num(name: &str, values: &[Option<f64>]) -> Column {
        Column::number(name, values.to_vec())
    }

    #[test]
    fn drops_exact_duplicates_keeping_order() {
        let ds = Dataset::new(vec![
            num("a", &[Some(1.0), Some(2.0), Some(1.0), Some(3.0)]),
            text_column("b", &[Some("x"), Some("y"), Some("x"), Some("x")]),
        ])
        .unwrap();
        let out = clean(&ds);
        assert_eq!(out.row_count(), 3);
        assert_eq!(out.numbers("a").unwrap(), &[Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn coerces_hinted_text_columns_with_per_value_fallback() {
        let ds = Dataset::new(vec![
            text_column("Signup Date", &[Some("2025-01-02"), Some("not a date"), Some("01/15/2025")]),
            text_column("country", &[Some("2025-01-02"), Some("US"), Some("DE")]),
        ])
        .unwrap();
        let out = clean_with(
            &ds,
            &AnalysisConfig {
                impute_max_null_fraction: 0.0,
                ..AnalysisConfig::default()
            },
        );
        let dates = out.timestamps("Signup Date").unwrap();
        assert_eq!(dates[0], parse_timestamp("2025-01-02"));
        assert_eq!(dates[1], None);
        assert_eq!(dates[2], parse_timestamp("2025-01-15"));
        assert!(out.column("country").unwrap().as_text().is_some());
    }

    #[test]
    fn numeric_nulls_below_threshold_take_the_median() {
        let mut values: Vec<Option<f64>> = (1..=20).map(|i| Some(i as f64)).collect();
        values[5] = None;
        let ds = Dataset::new(vec![num("value", &values)]).unwrap();
        let out = clean(&ds);
        let filled = out.numbers("value").unwrap();
        assert!(filled.iter().all(Option::is_some));
        // Median of 1..=20 without 6 is 11.
        assert_eq!(filled[5], Some(11.0));
    }

    #[test]
    fn columns_at_or_above_threshold_keep_nulls() {
        let mut values: Vec<Option<f64>> = (1..=10).map(|i| Some(i as f64)).collect();
        values[0] = None;
        let ds = Dataset::new(vec![num("value", &values)]).unwrap();
        let out = clean(&ds);
        assert_eq!(out.numbers("value").unwrap()[0], None);
    }

    #[test]
    fn text_nulls_take_the_mode_or_unknown() {
        // 20 rows, one null; "a" and "b" tie on two occurrences each.
        let mut labels: Vec<Option<String>> = ["b", "a", "b", "a", "c"]
            .iter()
            .map(|v| Some(v.to_string()))
            .collect();
        labels.extend((0..14).map(|i| Some(format!("u{i}"))));
        labels.push(None);
        let ids: Vec<Option<f64>> = (0..labels.len()).map(|i| Some(i as f64)).collect();
        let ds = Dataset::new(vec![Column::text("label", labels), num("id", &ids)]).unwrap();
        let out = clean(&ds);
        let labels = out.column("label").unwrap().as_text().unwrap();
        assert_eq!(labels.last().unwrap().as_deref(), Some("a"));

        assert_eq!(mode(&[None, None]), None);
    }

    #[test]
    fn all_null_text_column_is_left_alone_above_threshold() {
        let ds = Dataset::new(vec![num("id", &[Some(0.0), Some(1.0)]), text_column("note", &[None, None])]).unwrap();
        let out = clean(&ds);
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.column("note").unwrap().as_text().unwrap(), &[None, None]);
    }

    #[test]
    fn compact_digit_dates_are_not_timestamps() {
        assert_eq!(parse_timestamp("20250101"), None);
        assert!(parse_timestamp("2025/01/01").is_some());
        assert!(parse_timestamp("01.02.2025").is_some());
    }

    #[test]
    fn clean_is_idempotent_when_imputation_creates_duplicates() {
        let mut a: Vec<Option<f64>> = (0..20).map(|i| Some(i as f64)).collect();
        let mut b: Vec<Option<f64>> = (0..20).map(|i| Some(100.0 + i as f64)).collect();
        // Row 1 becomes a duplicate of row 0 once its null is filled.
        a[1] = Some(0.0);
        b[0] = Some(110.5);
        b[1] = None;
        let ds = Dataset::new(vec![num("a", &a), num("b", &b)]).unwrap();

        let once = clean(&ds);
        let twice = clean(&once);
        assert_eq!(once, twice);
        assert_eq!(once.row_count(), 19);
    }

    #[test]
    fn empty_dataset_is_returned_unchanged() {
        let ds = Dataset::new(vec![num("a", &[]), text_column("date", &[])]).unwrap();
        let out = clean(&ds);
        assert_eq!(out.row_count(), 0);
        assert!(out.timestamps("date").is_ok());
    }
}
