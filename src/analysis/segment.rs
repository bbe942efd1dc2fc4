//! Group-by analysis of one metric across the values of a dimension.
//!
//! Every row lands in exactly one segment: null dimension values are grouped
//! under [`MISSING_SEGMENT`] (numbered when a real value already uses that
//! label, so labels stay unique). Rows are never reordered; per-row outlier flags
//! are reported in input order.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::config::AnalysisConfig;
use crate::domain::{CellKey, Column, Dataset, Insight, SegmentOption, SegmentResult, SegmentStats};
use crate::error::AnalysisError;
use crate::math::{mean, median, sample_std};

/// Label of the segment holding rows with a null dimension value.
pub const MISSING_SEGMENT: &str = "(missing)";

pub fn segment(
    dataset: &Dataset,
    dimension: &str,
    metric: &str,
    options: &[SegmentOption],
) -> Result<(SegmentResult, Vec<Insight>), AnalysisError> {
    segment_with(dataset, dimension, metric, options, &AnalysisConfig::default())
}

pub fn segment_with(
    dataset: &Dataset,
    dimension: &str,
    metric: &str,
    options: &[SegmentOption],
    config: &AnalysisConfig,
) -> Result<(SegmentResult, Vec<Insight>), AnalysisError> {
    let dim_column = dataset.column(dimension)?;
    let values = dataset.numbers(metric)?;
    if dataset.is_empty() {
        return Err(AnalysisError::EmptyDataset {
            operation: "segmentation",
        });
    }
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let global_mean = mean(&present).ok_or_else(|| AnalysisError::NoValues(metric.to_string()))?;

    let mut groups: BTreeMap<CellKey, Vec<usize>> = BTreeMap::new();
    for row in 0..dataset.row_count() {
        groups.entry(dim_column.data.value(row).key()).or_default().push(row);
    }
    debug!(dimension, metric, segments = groups.len(), "grouped rows");

    let compare = options.contains(&SegmentOption::CompareToAverage);
    let detect = options.contains(&SegmentOption::DetectOutliers);

    let missing = missing_label(groups.keys());
    let mut segments = Vec::with_capacity(groups.len());
    let mut flags = vec![false; dataset.row_count()];
    for (key, rows) in &groups {
        let label = match key {
            CellKey::Null => missing.clone(),
            other => other.as_value().to_string(),
        };
        let seg_values: Vec<f64> = rows.iter().filter_map(|&r| values[r]).collect();
        let seg_mean = mean(&seg_values);
        let seg_std = sample_std(&seg_values);

        let (diff_from_avg, diff_pct) = if compare {
            (
                seg_mean.map(|m| m - global_mean),
                seg_mean.and_then(|m| relative_pct(m, global_mean)),
            )
        } else {
            (None, None)
        };

        let outliers = detect.then(|| {
            flag_segment_outliers(rows, values, seg_mean, seg_std, config, &mut flags)
        });

        segments.push(SegmentStats {
            segment: label,
            count: rows.len(),
            valid: seg_values.len(),
            mean: seg_mean,
            median: median(&seg_values),
            std: seg_std,
            diff_from_avg,
            diff_pct,
            outliers,
        });
    }

    let mut insights = extreme_segment_insights(&segments, metric, global_mean);
    if compare {
        insights.extend(comparison_insights(&segments, metric, config.compare_threshold_pct));
    }

    let (data, outlier_flags) = if detect {
        insights.extend(outlier_insights(&segments, metric, config));
        let column = Column::number(
            format!("{metric}_outlier"),
            flags.iter().map(|&f| Some(if f { 1.0 } else { 0.0 })).collect(),
        );
        (dataset.clone().upsert_column(column)?, Some(flags))
    } else {
        (dataset.clone(), None)
    };

    let result = SegmentResult {
        dimension: dimension.to_string(),
        metric: metric.to_string(),
        global_mean,
        segments,
        outlier_flags,
        data,
    };
    Ok((result, insights))
}

/// Label for the null group that no present value already renders as.
fn missing_label<'a>(keys: impl Iterator<Item = &'a CellKey>) -> String {
    let taken: HashSet<String> = keys
        .filter(|key| !matches!(key, CellKey::Null))
        .map(|key| key.as_value().to_string())
        .collect();
    let mut label = MISSING_SEGMENT.to_string();
    let mut n = 1;
    while taken.contains(&label) {
        n += 1;
        label = format!("{MISSING_SEGMENT} {n}");
    }
    label
}

/// `(value / base - 1) * 100`, or `None` for a zero base.
fn relative_pct(value: f64, base: f64) -> Option<f64> {
    (base != 0.0).then(|| (value / base - 1.0) * 100.0)
}

/// Flag rows of one segment; returns the number flagged.
fn flag_segment_outliers(
    rows: &[usize],
    values: &[Option<f64>],
    seg_mean: Option<f64>,
    seg_std: Option<f64>,
    config: &AnalysisConfig,
    flags: &mut [bool],
) -> usize {
    if rows.len() < config.min_segment_rows {
        return 0;
    }
    let (Some(m), Some(std)) = (seg_mean, seg_std) else {
        return 0;
    };
    let limit = config.segment_outlier_sigma * std;
    let mut flagged = 0;
    for &row in rows {
        if let Some(v) = values[row] {
            if (v - m).abs() > limit {
                flags[row] = true;
                flagged += 1;
            }
        }
    }
    flagged
}

fn extreme_segment_insights(segments: &[SegmentStats], metric: &str, global_mean: f64) -> Vec<Insight> {
    let mut with_mean = segments.iter().filter_map(|s| s.mean.map(|m| (s, m)));
    let Some(first) = with_mean.next() else {
        return Vec::new();
    };
    // Ties keep the earlier segment in key order.
    let (top, bottom) = with_mean.fold((first, first), |(hi, lo), cur| {
        (if cur.1 > hi.1 { cur } else { hi }, if cur.1 < lo.1 { cur } else { lo })
    });

    let pct_suffix = |m: f64, wording: &str| match relative_pct(m, global_mean) {
        Some(pct) => format!(" ({pct:.1}% {wording} overall average)"),
        None => String::new(),
    };
    vec![
        format!(
            "Segment Analysis: {} has the highest average {metric} at {:.2}{}.",
            top.0.segment,
            top.1,
            pct_suffix(top.1, "above")
        ),
        format!(
            "Segment Analysis: {} has the lowest average {metric} at {:.2}{}.",
            bottom.0.segment,
            bottom.1,
            pct_suffix(bottom.1, "compared to")
        ),
    ]
}

fn comparison_insights(segments: &[SegmentStats], metric: &str, threshold_pct: f64) -> Vec<Insight> {
    let mut notable: Vec<(&str, f64)> = segments
        .iter()
        .filter_map(|s| s.diff_pct.map(|pct| (s.segment.as_str(), pct)))
        .filter(|(_, pct)| pct.abs() > threshold_pct)
        .collect();
    notable.sort_by(|a, b| b.1.total_cmp(&a.1));

    notable
        .into_iter()
        .map(|(label, pct)| {
            let direction = if pct > 0.0 { "above" } else { "below" };
            format!(
                "Comparison: {label} is {:.1}% {direction} the overall average for {metric}.",
                pct.abs()
            )
        })
        .collect()
}

fn outlier_insights(segments: &[SegmentStats], metric: &str, config: &AnalysisConfig) -> Vec<Insight> {
    let mut ranked: Vec<(&SegmentStats, f64)> = segments
        .iter()
        .filter_map(|s| s.outlier_fraction().map(|f| (s, f)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    ranked
        .into_iter()
        .take(config.max_outlier_segments)
        .filter(|(_, fraction)| *fraction > config.segment_outlier_fraction)
        .map(|(s, fraction)| {
            format!(
                "Outliers: {} has a high proportion of outliers ({:.1}%, {} points) for {metric}.",
                s.segment,
                fraction * 100.0,
                s.outliers.unwrap_or(0)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(labels: &[Option<&str>], values: &[Option<f64>]) -> Dataset {
        Dataset::new(vec![
            Column::text("plan", labels.iter().map(|v| v.map(str::to_string)).collect()),
            Column::number("revenue", values.to_vec()),
        ])
        .unwrap()
    }

    #[test]
    fn two_segments_compare_symmetrically() {
        let ds = labelled(
            &[[Some("A"), Some("B")]; 50].concat(),
            &[[Some(100.0), Some(50.0)]; 50].concat(),
        );
        let (result, insights) = segment(&ds, "plan", "revenue", &[SegmentOption::CompareToAverage]).unwrap();

        assert_eq!(result.global_mean, 75.0);
        assert_eq!(
            insights[0],
            "Segment Analysis: A has the highest average revenue at 100.00 (33.3% above overall average)."
        );
        assert_eq!(
            insights[1],
            "Segment Analysis: B has the lowest average revenue at 50.00 (-33.3% compared to overall average)."
        );
        assert!(insights.contains(&"Comparison: A is 33.3% above the overall average for revenue.".to_string()));
        assert!(insights.contains(&"Comparison: B is 33.3% below the overall average for revenue.".to_string()));

        let a = result.segment("A").unwrap();
        assert_eq!(a.diff_from_avg, Some(25.0));
        assert!((a.diff_pct.unwrap() - 33.333).abs() < 1e-2);
    }

    #[test]
    fn null_dimension_values_form_their_own_segment() {
        let ds = labelled(
            &[Some("b"), None, Some("a"), Some("b"), None],
            &[Some(1.0), Some(2.0), Some(3.0), None, Some(4.0)],
        );
        let (result, _) = segment(&ds, "plan", "revenue", &[]).unwrap();

        assert_eq!(result.total_count(), ds.row_count());
        let labels: Vec<&str> = result.segments.iter().map(|s| s.segment.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", MISSING_SEGMENT]);

        let b = result.segment("b").unwrap();
        assert_eq!((b.count, b.valid), (2, 1));
        assert_eq!(b.std, None);
        assert_eq!(result.segment(MISSING_SEGMENT).unwrap().mean, Some(3.0));
    }

    #[test]
    fn literal_missing_value_does_not_merge_with_nulls() {
        let ds = labelled(
            &[Some(MISSING_SEGMENT), None, Some(MISSING_SEGMENT)],
            &[Some(1.0), Some(10.0), Some(3.0)],
        );
        let (result, _) = segment(&ds, "plan", "revenue", &[]).unwrap();

        let labels: Vec<&str> = result.segments.iter().map(|s| s.segment.as_str()).collect();
        assert_eq!(labels, vec!["(missing)", "(missing) 2"]);
        assert_eq!(result.segment(MISSING_SEGMENT).unwrap().mean, Some(2.0));
        assert_eq!(result.segment("(missing) 2").unwrap().count, 1);
    }

    #[test]
    fn numeric_dimensions_sort_numerically() {
        let ds = Dataset::new(vec![
            Column::number("rating", vec![Some(10.0), Some(2.0), Some(1.0)]),
            Column::number("score", vec![Some(1.0), Some(2.0), Some(3.0)]),
        ])
        .unwrap();
        let (result, _) = segment(&ds, "rating", "score", &[]).unwrap();
        let labels: Vec<&str> = result.segments.iter().map(|s| s.segment.as_str()).collect();
        assert_eq!(labels, vec!["1", "2", "10"]);
    }

    #[test]
    fn small_segments_are_never_flagged() {
        let ds = labelled(
            &[Some("x"), Some("x"), Some("x"), Some("x")],
            &[Some(1.0), Some(1.0), Some(1.0), Some(1000.0)],
        );
        let (result, insights) = segment(&ds, "plan", "revenue", &[SegmentOption::DetectOutliers]).unwrap();
        assert!(result.outlier_flags.as_ref().unwrap().iter().all(|f| !f));
        assert_eq!(result.segment("x").unwrap().outliers, Some(0));
        assert!(insights.iter().all(|i| !i.starts_with("Outliers")));
    }

    #[test]
    fn outliers_are_flagged_in_row_order() {
        let mut labels = vec![Some("big"); 20];
        let mut values: Vec<Option<f64>> = (0..20).map(|i| Some(100.0 + (i % 2) as f64)).collect();
        values[7] = Some(500.0);
        labels.extend([Some("small"); 3]);
        values.extend([Some(1.0), Some(2.0), Some(3.0)]);
        let ds = labelled(&labels, &values);

        let (result, insights) = segment(&ds, "plan", "revenue", &[SegmentOption::DetectOutliers]).unwrap();
        let flags = result.outlier_flags.as_ref().unwrap();
        assert!(flags[7]);
        assert_eq!(flags.iter().filter(|&&f| f).count(), 1);

        let column = result.data.numbers("revenue_outlier").unwrap();
        assert_eq!(column[7], Some(1.0));
        assert_eq!(column[0], Some(0.0));
        assert_eq!(result.data.numbers("revenue").unwrap(), ds.numbers("revenue").unwrap());

        // 1 of 20 rows is exactly 5%, which does not exceed the threshold.
        assert!(insights.iter().all(|i| !i.starts_with("Outliers")));
    }

    #[test]
    fn outlier_insight_requires_more_than_five_percent() {
        let mut values: Vec<Option<f64>> = vec![Some(10.0); 10];
        values[0] = Some(100.0);
        let ds = labelled(&[Some("z"); 10], &values);
        let (_, insights) = segment(&ds, "plan", "revenue", &[SegmentOption::DetectOutliers]).unwrap();
        assert!(insights.contains(
            &"Outliers: z has a high proportion of outliers (10.0%, 1 points) for revenue.".to_string()
        ));
    }

    #[test]
    fn zero_global_mean_omits_percentages() {
        let ds = labelled(&[Some("up"), Some("down")], &[Some(5.0), Some(-5.0)]);
        let (result, insights) = segment(&ds, "plan", "revenue", &[SegmentOption::CompareToAverage]).unwrap();
        assert_eq!(insights[0], "Segment Analysis: up has the highest average revenue at 5.00.");
        assert_eq!(result.segment("up").unwrap().diff_pct, None);
        assert_eq!(insights.len(), 2);
    }

    #[test]
    fn invalid_input_is_rejected() {
        let ds = labelled(&[Some("a")], &[None]);
        assert_eq!(
            segment(&ds, "plan", "revenue", &[]).unwrap_err(),
            AnalysisError::NoValues("revenue".to_string())
        );
        assert_eq!(
            segment(&ds, "tier", "revenue", &[]).unwrap_err(),
            AnalysisError::MissingColumn("tier".to_string())
        );
        assert!(matches!(
            segment(&ds, "revenue", "plan", &[]),
            Err(AnalysisError::WrongColumnType { .. })
        ));
        let empty = labelled(&[], &[]);
        assert!(matches!(
            segment(&empty, "plan", "revenue", &[]),
            Err(AnalysisError::EmptyDataset { .. })
        ));
    }
}
