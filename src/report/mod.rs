//! Reporting utilities: column profiles and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{ColumnData, ColumnKind, ColumnRole, ColumnRoles, Dataset, format_timestamp};
use crate::math::{mean, min_max};

/// One row of the `profile` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    pub role: Option<ColumnRole>,
    pub nulls: usize,
    pub distinct: usize,
    /// Human-readable range: `min..max (mean m)` for numbers, `first..last`
    /// for timestamps, empty for text.
    pub range: String,
}

/// Profile every column in dataset order.
pub fn profile_columns(dataset: &Dataset, roles: &ColumnRoles) -> Vec<ColumnProfile> {
    dataset
        .columns()
        .iter()
        .map(|column| {
            let range = match &column.data {
                ColumnData::Number(values) => {
                    let present: Vec<f64> = values.iter().flatten().copied().collect();
                    match (min_max(&present), mean(&present)) {
                        (Some((lo, hi)), Some(m)) => format!("{lo:.2}..{hi:.2} (mean {m:.2})"),
                        _ => String::new(),
                    }
                }
                ColumnData::Timestamp(values) => {
                    let present = values.iter().flatten();
                    match (present.clone().min(), present.max()) {
                        (Some(lo), Some(hi)) => format!("{}..{}", format_timestamp(*lo), format_timestamp(*hi)),
                        _ => String::new(),
                    }
                }
                ColumnData::Text(_) => String::new(),
            };
            ColumnProfile {
                name: column.name.clone(),
                kind: column.kind(),
                role: roles.role_of(&column.name),
                nulls: column.data.null_count(),
                distinct: column.distinct_count(),
                range,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classify;
    use crate::domain::Column;
    use chrono::NaiveDate;

    #[test]
    fn profile_covers_each_kind() {
        let day = |d| NaiveDate::from_ymd_opt(2025, 3, d).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let ds = Dataset::new(vec![
            Column::timestamp("date", vec![Some(day(2)), Some(day(1)), None]),
            Column::number("revenue", vec![Some(10.0), Some(30.0), None]),
            Column::text("plan", vec![Some("pro".into()), Some("pro".into()), Some("free".into())]),
        ])
        .unwrap();
        let profiles = profile_columns(&ds, &classify(&ds));

        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles[0].range, "2025-03-01..2025-03-02");
        assert_eq!(profiles[0].role, Some(ColumnRole::Time));
        assert_eq!(profiles[1].range, "10.00..30.00 (mean 20.00)");
        assert_eq!(profiles[1].nulls, 1);
        assert_eq!(profiles[2].distinct, 2);
        assert_eq!(profiles[2].range, "");
        assert_eq!(profiles[2].role, Some(ColumnRole::Dimension));
    }
}
