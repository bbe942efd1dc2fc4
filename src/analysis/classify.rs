//! Column role inference.
//!
//! Rules, first match wins:
//! 1. timestamp column → `Time`
//! 2. numeric column with few distinct values (absolute or relative to the
//!    row count) → `Dimension`; otherwise → `Metric`
//! 3. anything else → `Dimension`

use tracing::debug;

use crate::config::AnalysisConfig;
use crate::domain::{Column, ColumnKind, ColumnRole, ColumnRoles, Dataset};

pub fn classify(dataset: &Dataset) -> ColumnRoles {
    classify_with(dataset, &AnalysisConfig::default())
}

pub fn classify_with(dataset: &Dataset, config: &AnalysisConfig) -> ColumnRoles {
    let row_count = dataset.row_count();
    let mut roles = ColumnRoles::default();

    for column in dataset.columns() {
        let role = column_role(column, row_count, config);
        debug!(column = %column.name, role = role.display_name(), "classified column");

        match role {
            ColumnRole::Time => roles.time_columns.push(column.name.clone()),
            ColumnRole::Metric => roles.metrics.push(column.name.clone()),
            ColumnRole::Dimension => roles.dimensions.push(column.name.clone()),
        }
        roles.roles.push((column.name.clone(), role));
    }

    roles
}

fn column_role(column: &Column, row_count: usize, config: &AnalysisConfig) -> ColumnRole {
    match column.kind() {
        ColumnKind::Timestamp => ColumnRole::Time,
        ColumnKind::Number => {
            let distinct = column.distinct_count();
            let ratio = if row_count == 0 {
                0.0
            } else {
                distinct as f64 / row_count as f64
            };
            if distinct < config.dimension_max_distinct || ratio < config.dimension_max_ratio {
                ColumnRole::Dimension
            } else {
                ColumnRole::Metric
            }
        }
        ColumnKind::Text => ColumnRole::Dimension,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn numeric(name: &str, rows: usize, distinct: usize) -> Column {
        Column::number(name, (0..rows).map(|i| Some((i % distinct) as f64)).collect())
    }

    #[test]
    fn low_cardinality_numeric_is_a_dimension() {
        let ds = Dataset::new(vec![numeric("rating", 1000, 3)]).unwrap();
        let roles = classify(&ds);
        assert_eq!(roles.role_of("rating"), Some(ColumnRole::Dimension));
    }

    #[test]
    fn high_cardinality_numeric_is_a_metric() {
        let ds = Dataset::new(vec![numeric("revenue", 1000, 500)]).unwrap();
        let roles = classify(&ds);
        assert_eq!(roles.metrics, vec!["revenue".to_string()]);
    }

    #[test]
    fn low_ratio_numeric_is_a_dimension() {
        // 40 distinct values over 1000 rows: count passes, ratio 0.04 does not.
        let ds = Dataset::new(vec![numeric("store_id", 1000, 40)]).unwrap();
        assert_eq!(classify(&ds).role_of("store_id"), Some(ColumnRole::Dimension));
    }

    #[test]
    fn roles_partition_columns_in_order() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let ds = Dataset::new(vec![
            Column::text("country", vec![Some("US".to_string()); 20]),
            numeric("sessions", 20, 20),
            Column::timestamp("date", vec![Some(day); 20]),
            numeric("tier", 20, 2),
            numeric("revenue", 20, 15),
        ])
        .unwrap();
        let roles = classify(&ds);

        assert_eq!(roles.metrics, vec!["sessions", "revenue"]);
        assert_eq!(roles.dimensions, vec!["country", "tier"]);
        assert_eq!(roles.time_columns, vec!["date"]);

        let total = roles.metrics.len() + roles.dimensions.len() + roles.time_columns.len();
        assert_eq!(total, ds.column_count());
        for name in ds.column_names() {
            assert!(roles.role_of(name).is_some());
        }
    }

    #[test]
    fn empty_dataset_does_not_divide_by_zero() {
        let ds = Dataset::new(vec![
            Column::number("x", vec![]),
            Column::text("y", vec![]),
        ])
        .unwrap();
        let roles = classify(&ds);
        assert_eq!(roles.role_of("x"), Some(ColumnRole::Dimension));
        assert_eq!(roles.role_of("y"), Some(ColumnRole::Dimension));
        assert!(roles.metrics.is_empty());
    }
}
