//! Time-series decomposition for one metric.
//!
//! Pipeline:
//! sort by time -> collapse equal timestamps (mean) -> interpolate gaps ->
//! moving average / trend line / weekly seasonality / outlier flags
//!
//! Time granularity is the distinct timestamp value: two rows at different
//! times on the same day stay separate points. No calendar bucketing happens
//! here; callers that want daily series should truncate timestamps first.

use chrono::{Datelike, NaiveDateTime};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::domain::{Dataset, Insight, TrendOption, TrendResult};
use crate::error::AnalysisError;
use crate::math::{LinearFit, centered_moving_average, fit_linear_trend, interpolate_linear, mean, pct_change, sample_std};

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Which baseline the outlier residuals were measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutlierBasis {
    MovingAverage,
    TrendLine,
}

pub fn analyze_trend(
    dataset: &Dataset,
    time_column: &str,
    metric: &str,
    options: &[TrendOption],
) -> Result<(TrendResult, Vec<Insight>), AnalysisError> {
    analyze_trend_with(dataset, time_column, metric, options, &AnalysisConfig::default())
}

pub fn analyze_trend_with(
    dataset: &Dataset,
    time_column: &str,
    metric: &str,
    options: &[TrendOption],
    config: &AnalysisConfig,
) -> Result<(TrendResult, Vec<Insight>), AnalysisError> {
    let timestamps = dataset.timestamps(time_column)?;
    let raw_values = dataset.numbers(metric)?;
    if dataset.is_empty() {
        return Err(AnalysisError::EmptyDataset {
            operation: "trend analysis",
        });
    }

    let (times, collapsed) = collapse_by_timestamp(timestamps, raw_values)
        .ok_or_else(|| AnalysisError::NoValues(time_column.to_string()))?;
    let values = interpolate_linear(&collapsed).ok_or_else(|| AnalysisError::NoValues(metric.to_string()))?;
    let n = values.len();
    debug!(rows = dataset.row_count(), points = n, metric, "prepared trend series");

    let wants = |option: TrendOption| options.contains(&option);
    let mut insights = Vec::new();

    let moving_average = if wants(TrendOption::MovingAverage) {
        let window = moving_average_window(n, config.max_moving_average_window);
        let ma = centered_moving_average(&values, window);
        insights.push(moving_average_insight(metric, &ma));
        Some(ma)
    } else {
        None
    };

    // Seasonality always needs the trend; outliers need it when there is no
    // moving average to measure against.
    let needs_trend = wants(TrendOption::TrendLine)
        || wants(TrendOption::Seasonality)
        || (wants(TrendOption::Outliers) && moving_average.is_none());
    let trend_line = needs_trend.then(|| {
        let fit = fit_linear_trend(&values).unwrap_or(LinearFit {
            intercept: mean(&values).unwrap_or(0.0),
            slope: 0.0,
        });
        fit.fitted(n)
    });

    if wants(TrendOption::TrendLine) {
        if let Some(trend) = &trend_line {
            insights.push(trend_line_insight(metric, trend, config.flat_trend_pct));
        }
    }

    let seasonal = match (&trend_line, wants(TrendOption::Seasonality)) {
        (Some(trend), true) => {
            let (component, insight) = weekly_seasonality(metric, &times, &values, trend, config);
            insights.push(insight);
            Some(component)
        }
        _ => None,
    };

    let baseline = moving_average
        .as_ref()
        .map(|ma| (ma, OutlierBasis::MovingAverage, config.moving_average_outlier_sigma))
        .or_else(|| {
            trend_line
                .as_ref()
                .map(|trend| (trend, OutlierBasis::TrendLine, config.trend_outlier_sigma))
        });
    let outliers = match baseline {
        Some((baseline, basis, sigma)) if wants(TrendOption::Outliers) => {
            let (flags, insight) =
                detect_outliers(metric, &times, &values, baseline, basis, sigma, config.near_zero_ratio);
            insights.push(insight);
            Some(flags)
        }
        _ => None,
    };

    let result = TrendResult {
        time_column: time_column.to_string(),
        metric: metric.to_string(),
        timestamps: times,
        values,
        moving_average,
        trend_line,
        seasonal,
        outliers,
    };
    Ok((result, insights))
}

/// Window for the centered moving average: `n / 3`, capped, at least 1.
pub fn moving_average_window(n: usize, max_window: usize) -> usize {
    (n / 3).min(max_window).max(1)
}

/// Classify a fitted percentage change.
pub fn trend_kind(pct: f64, flat_threshold_pct: f64) -> &'static str {
    if pct.abs() < flat_threshold_pct {
        "flat"
    } else if pct > 0.0 {
        "increasing"
    } else {
        "decreasing"
    }
}

/// Sort by time (stable), drop null timestamps, and average rows sharing a
/// timestamp. `None` when no row has a timestamp.
fn collapse_by_timestamp(
    timestamps: &[Option<NaiveDateTime>],
    values: &[Option<f64>],
) -> Option<(Vec<NaiveDateTime>, Vec<Option<f64>>)> {
    let mut rows: Vec<(NaiveDateTime, Option<f64>)> = timestamps
        .iter()
        .zip(values)
        .filter_map(|(ts, v)| ts.map(|t| (t, *v)))
        .collect();
    if rows.is_empty() {
        return None;
    }
    rows.sort_by_key(|(t, _)| *t);

    let mut times = Vec::with_capacity(rows.len());
    let mut out = Vec::with_capacity(rows.len());
    let mut start = 0;
    while start < rows.len() {
        let t = rows[start].0;
        let end = rows[start..]
            .iter()
            .position(|(other, _)| *other != t)
            .map_or(rows.len(), |offset| start + offset);
        let present: Vec<f64> = rows[start..end].iter().filter_map(|(_, v)| *v).collect();
        times.push(t);
        out.push(mean(&present));
        start = end;
    }
    Some((times, out))
}

fn moving_average_insight(metric: &str, ma: &[f64]) -> Insight {
    let (first, last) = (ma[0], ma[ma.len() - 1]);
    match pct_change(first, last) {
        Some(pct) => format!(
            "Moving Average: {metric} has {} by {:.1}% over the period.",
            if pct > 0.0 { "increased" } else { "decreased" },
            pct.abs()
        ),
        None => format!(
            "Moving Average: {metric} starts at zero, so its change over the period ({:.2}) cannot be expressed as a percentage.",
            last - first
        ),
    }
}

fn trend_line_insight(metric: &str, trend: &[f64], flat_threshold_pct: f64) -> Insight {
    let (first, last) = (trend[0], trend[trend.len() - 1]);
    match pct_change(first, last) {
        Some(pct) => format!(
            "Trend: {metric} shows a {} trend with a {:.1}% {} over the time period.",
            trend_kind(pct, flat_threshold_pct),
            pct.abs(),
            if pct < 0.0 { "decline" } else { "gain" }
        ),
        None => format!(
            "Trend: {metric} changes by {:.2} over the time period; the fitted trend starts at zero, so no percentage is reported.",
            last - first
        ),
    }
}

fn weekly_seasonality(
    metric: &str,
    times: &[NaiveDateTime],
    values: &[f64],
    trend: &[f64],
    config: &AnalysisConfig,
) -> (Vec<f64>, Insight) {
    let n = values.len();
    if n < config.min_seasonality_rows {
        return (
            vec![0.0; n],
            format!("Seasonality: Not enough data to detect seasonal patterns in {metric}."),
        );
    }

    let weekdays: Vec<usize> = times
        .iter()
        .map(|t| t.weekday().num_days_from_monday() as usize)
        .collect();

    let mut sums = [0.0f64; 7];
    let mut counts = [0usize; 7];
    for ((&day, v), t) in weekdays.iter().zip(values).zip(trend) {
        sums[day] += v - t;
        counts[day] += 1;
    }
    let weekday_means: Vec<(usize, f64)> = (0..7)
        .filter(|&d| counts[d] > 0)
        .map(|d| (d, sums[d] / counts[d] as f64))
        .collect();

    // First weekday wins ties, in Monday..Sunday order.
    let mut high = weekday_means[0];
    let mut low = weekday_means[0];
    for &(day, m) in &weekday_means[1..] {
        if m > high.1 {
            high = (day, m);
        }
        if m < low.1 {
            low = (day, m);
        }
    }

    let level = mean(values).map_or(0.0, f64::abs);
    let variation_pct = if level > 0.0 {
        (high.1 - low.1) / level * 100.0
    } else {
        0.0
    };
    debug!(metric, variation_pct, "weekly seasonality");

    if variation_pct > config.seasonality_variation_pct {
        let mut by_day = [0.0f64; 7];
        for &(day, m) in &weekday_means {
            by_day[day] = m;
        }
        let component = weekdays.iter().map(|&d| by_day[d]).collect();
        let insight = format!(
            "Seasonality: {metric} tends to be highest on {} and lowest on {}, with a {:.1}% variation.",
            WEEKDAY_NAMES[high.0], WEEKDAY_NAMES[low.0], variation_pct
        );
        (component, insight)
    } else {
        (
            vec![0.0; n],
            format!("Seasonality: No significant weekly patterns detected in {metric}."),
        )
    }
}

fn detect_outliers(
    metric: &str,
    times: &[NaiveDateTime],
    values: &[f64],
    baseline: &[f64],
    basis: OutlierBasis,
    sigma: f64,
    near_zero_ratio: f64,
) -> (Vec<bool>, Insight) {
    let residuals: Vec<f64> = values.iter().zip(baseline).map(|(v, b)| v - b).collect();
    let level = mean(values).unwrap_or(0.0);

    let flags: Vec<bool> = match sample_std(&residuals) {
        Some(std) => residuals
            .iter()
            .zip(values)
            .map(|(r, v)| r.abs() > sigma * std && v.abs() > near_zero_ratio * level)
            .collect(),
        None => vec![false; values.len()],
    };
    let count = flags.iter().filter(|&&f| f).count();
    debug!(metric, count, ?basis, "outlier detection");

    let insight = match (count, basis) {
        (0, _) => format!("Outliers: No significant outliers detected in {metric}."),
        (_, OutlierBasis::MovingAverage) => {
            let worst = residuals
                .iter()
                .enumerate()
                .fold(0usize, |best, (i, r)| if r.abs() > residuals[best].abs() { i } else { best });
            format!(
                "Outliers: Detected {count} outliers in {metric}. Most significant on {} with value {:.2} (expected around {:.2}).",
                times[worst].format("%Y-%m-%d"),
                values[worst],
                baseline[worst]
            )
        }
        (_, OutlierBasis::TrendLine) => {
            format!("Outliers: Detected {count} outliers in {metric} that deviate significantly from the trend.")
        }
    };
    (flags, insight)
}
