//! Export analysis results to CSV.
//!
//! Layouts:
//! - trend: one row per time point (`<time>,<metric>,moving_average,trend,seasonal,outlier`);
//!   components that were not computed are left out of the header
//! - segments: one row per segment with its aggregate statistics

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{SegmentResult, TrendResult, format_timestamp};
use crate::error::AnalysisError;

/// Write a trend decomposition to a CSV file.
pub fn write_trend_csv(path: &Path, result: &TrendResult) -> Result<(), AnalysisError> {
    let file = create(path)?;
    write_trend(file, result)
}

pub fn write_trend<W: Write>(writer: W, result: &TrendResult) -> Result<(), AnalysisError> {
    let mut out = csv::Writer::from_writer(writer);

    let mut header = vec![result.time_column.clone(), result.metric.clone()];
    let components: Vec<(&str, &Vec<f64>)> = [
        ("moving_average", result.moving_average.as_ref()),
        ("trend", result.trend_line.as_ref()),
        ("seasonal", result.seasonal.as_ref()),
    ]
    .into_iter()
    .filter_map(|(name, values)| values.map(|v| (name, v)))
    .collect();
    header.extend(components.iter().map(|(name, _)| name.to_string()));
    if result.outliers.is_some() {
        header.push("outlier".to_string());
    }
    out.write_record(&header).map_err(write_error)?;

    for (i, ts) in result.timestamps.iter().enumerate() {
        let mut row = vec![format_timestamp(*ts), format!("{:.4}", result.values[i])];
        row.extend(components.iter().map(|(_, values)| format!("{:.4}", values[i])));
        if let Some(flags) = &result.outliers {
            row.push(u8::from(flags[i]).to_string());
        }
        out.write_record(&row).map_err(write_error)?;
    }

    out.flush()
        .map_err(|e| AnalysisError::Export(format!("failed to flush CSV: {e}")))
}

/// Write per-segment statistics to a CSV file.
pub fn write_segments_csv(path: &Path, result: &SegmentResult) -> Result<(), AnalysisError> {
    let file = create(path)?;
    write_segments(file, result)
}

pub fn write_segments<W: Write>(writer: W, result: &SegmentResult) -> Result<(), AnalysisError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record([
        result.dimension.as_str(),
        "count",
        "valid",
        "mean",
        "median",
        "std",
        "diff_from_avg",
        "diff_pct",
        "outliers",
    ])
    .map_err(write_error)?;

    let num = |v: Option<f64>| v.map(|x| format!("{x:.4}")).unwrap_or_default();
    for s in &result.segments {
        out.write_record([
            s.segment.clone(),
            s.count.to_string(),
            s.valid.to_string(),
            num(s.mean),
            num(s.median),
            num(s.std),
            num(s.diff_from_avg),
            num(s.diff_pct),
            s.outliers.map(|n| n.to_string()).unwrap_or_default(),
        ])
        .map_err(write_error)?;
    }

    out.flush()
        .map_err(|e| AnalysisError::Export(format!("failed to flush CSV: {e}")))
}

fn create(path: &Path) -> Result<File, AnalysisError> {
    File::create(path).map_err(|e| AnalysisError::Export(format!("failed to create '{}': {e}", path.display())))
}

fn write_error(e: csv::Error) -> AnalysisError {
    AnalysisError::Export(format!("failed to write CSV: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, Dataset, SegmentStats};
    use chrono::NaiveDate;

    #[test]
    fn trend_csv_lists_only_computed_components() {
        let day = |d| NaiveDate::from_ymd_opt(2025, 3, d).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let result = TrendResult {
            time_column: "date".to_string(),
            metric: "sessions".to_string(),
            timestamps: vec![day(1), day(2)],
            values: vec![1.0, 2.5],
            moving_average: None,
            trend_line: Some(vec![1.0, 2.5]),
            seasonal: None,
            outliers: Some(vec![false, true]),
        };
        let mut buf = Vec::new();
        write_trend(&mut buf, &result).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,sessions,trend,outlier");
        assert_eq!(lines[2], "2025-03-02,2.5000,2.5000,1");
    }

    #[test]
    fn segment_csv_leaves_missing_stats_blank() {
        let result = SegmentResult {
            dimension: "plan".to_string(),
            metric: "revenue".to_string(),
            global_mean: 4.0,
            segments: vec![SegmentStats {
                segment: "pro".to_string(),
                count: 1,
                valid: 1,
                mean: Some(4.0),
                median: Some(4.0),
                std: None,
                diff_from_avg: None,
                diff_pct: None,
                outliers: None,
            }],
            outlier_flags: None,
            data: Dataset::new(vec![Column::number("revenue", vec![Some(4.0)])]).unwrap(),
        };
        let mut buf = Vec::new();
        write_segments(&mut buf, &result).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().nth(1), Some("pro,1,1,4.0000,4.0000,,,,"));
    }

    #[test]
    fn unwritable_export_path_is_an_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("trend.csv");
        let result = TrendResult {
            time_column: "date".to_string(),
            metric: "sessions".to_string(),
            timestamps: vec![],
            values: vec![],
            moving_average: None,
            trend_line: None,
            seasonal: None,
            outliers: None,
        };

        let err = write_trend_csv(&path, &result).unwrap_err();
        assert!(matches!(err, AnalysisError::Export(_)), "{err:?}");
        assert!(err.to_string().starts_with("Failed to write export: failed to create"));
    }
}
