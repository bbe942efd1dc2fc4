//! Analysis request options and result types.
//!
//! Results are plain data (serializable) so they can be printed, exported to
//! CSV, or stored alongside a saved analysis.

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::table::Dataset;

/// A natural-language finding.
pub type Insight = String;

/// Role assigned to a column by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Time,
    Metric,
    Dimension,
}

impl ColumnRole {
    pub fn display_name(self) -> &'static str {
        match self {
            ColumnRole::Time => "time",
            ColumnRole::Metric => "metric",
            ColumnRole::Dimension => "dimension",
        }
    }
}

/// Classifier output. The three lists partition the column set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnRoles {
    /// Role per column, in column order.
    pub roles: Vec<(String, ColumnRole)>,
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    pub time_columns: Vec<String>,
}

impl ColumnRoles {
    pub fn role_of(&self, column: &str) -> Option<ColumnRole> {
        self.roles
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, role)| *role)
    }
}

/// Optional trend components.
///
/// Declaration order is also the order insights are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TrendOption {
    MovingAverage,
    TrendLine,
    Seasonality,
    Outliers,
}

impl TrendOption {
    pub const ALL: [TrendOption; 4] = [
        TrendOption::MovingAverage,
        TrendOption::TrendLine,
        TrendOption::Seasonality,
        TrendOption::Outliers,
    ];

    /// Components computed when the caller does not choose any.
    pub const DEFAULT: [TrendOption; 2] = [TrendOption::MovingAverage, TrendOption::TrendLine];
}

/// Optional segmentation steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentOption {
    CompareToAverage,
    DetectOutliers,
}

/// Trend decomposition aligned to the sorted, de-duplicated time axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub time_column: String,
    pub metric: String,
    pub timestamps: Vec<NaiveDateTime>,
    /// Collapsed and interpolated metric values.
    pub values: Vec<f64>,
    pub moving_average: Option<Vec<f64>>,
    pub trend_line: Option<Vec<f64>>,
    pub seasonal: Option<Vec<f64>>,
    pub outliers: Option<Vec<bool>>,
}

impl TrendResult {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn outlier_count(&self) -> usize {
        self.outliers
            .as_ref()
            .map_or(0, |flags| flags.iter().filter(|&&f| f).count())
    }
}

/// Aggregate statistics for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    /// Display label of the dimension value (`(missing)` for nulls).
    pub segment: String,
    /// Rows in the segment.
    pub count: usize,
    /// Rows with a non-null metric value.
    pub valid: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Sample standard deviation; `None` below two values.
    pub std: Option<f64>,
    pub diff_from_avg: Option<f64>,
    /// `(mean / global_mean - 1) * 100`; `None` when the global mean is zero.
    pub diff_pct: Option<f64>,
    /// Flagged rows when outlier detection ran on this segment.
    pub outliers: Option<usize>,
}

impl SegmentStats {
    pub fn outlier_fraction(&self) -> Option<f64> {
        let flagged = self.outliers?;
        if self.count == 0 {
            return None;
        }
        Some(flagged as f64 / self.count as f64)
    }
}

/// Segmentation output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub dimension: String,
    pub metric: String,
    pub global_mean: f64,
    /// Segments in key order.
    pub segments: Vec<SegmentStats>,
    /// Per-row outlier flags in the input row order (outlier detection only).
    pub outlier_flags: Option<Vec<bool>>,
    /// Copy of the input rows; carries a `<metric>_outlier` 0/1 column when
    /// outlier detection ran.
    pub data: Dataset,
}

impl SegmentResult {
    pub fn total_count(&self) -> usize {
        self.segments.iter().map(|s| s.count).sum()
    }

    pub fn segment(&self, label: &str) -> Option<&SegmentStats> {
        self.segments.iter().find(|s| s.segment == label)
    }
}
