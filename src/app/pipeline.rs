//! Shared load → clean → classify workflow and analysis runners.
//!
//! Subcommands only differ in what they do with a [`LoadedData`]; the
//! defaults for unspecified columns (first time column, first metric, first
//! dimension) are resolved here from the inferred roles.

use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::analysis::{analyze_trend_with, classify_with, clean_with, segment_with};
use crate::config::AnalysisConfig;
use crate::data::{SampleConfig, generate_sample};
use crate::domain::{
    ColumnRoles, Dataset, Insight, SegmentOption, SegmentResult, TrendOption, TrendResult,
};
use crate::error::AppError;
use crate::io::{RowError, read_csv};
use crate::store::{DatasetStore, JsonDirStore};

#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Csv(PathBuf),
    /// A dataset held in the store, by name.
    Stored(String),
    Sample(SampleConfig),
}

impl DataSource {
    pub fn label(&self) -> String {
        match self {
            DataSource::Csv(path) => path.display().to_string(),
            DataSource::Stored(name) => format!("stored dataset '{name}'"),
            DataSource::Sample(c) => format!("sample (seed {}, {} rows, {} days to {})", c.seed, c.rows, c.days, c.end_date),
        }
    }
}

/// A dataset ready for analysis.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub source: String,
    pub dataset: Dataset,
    pub roles: ColumnRoles,
    pub row_errors: Vec<RowError>,
    /// Store id when the data came from the store.
    pub dataset_id: Option<u64>,
}

/// Load from `source`, clean (unless `clean` is false) and classify.
pub fn load(
    source: &DataSource,
    store: Option<&JsonDirStore>,
    config: &AnalysisConfig,
    clean: bool,
) -> Result<LoadedData, AppError> {
    let mut row_errors = Vec::new();
    let mut dataset_id = None;

    let raw = match source {
        DataSource::Csv(path) => {
            let ingested = read_csv(path)?;
            if !ingested.row_errors.is_empty() {
                warn!(skipped = ingested.row_errors.len(), "some csv rows were skipped");
            }
            row_errors = ingested.row_errors;
            ingested.dataset
        }
        DataSource::Stored(name) => {
            let store = store.ok_or_else(|| AppError::new(2, "A dataset store is required to load stored data."))?;
            let record = store
                .find_dataset(name)?
                .ok_or_else(|| AppError::new(2, format!("No stored dataset named '{name}'.")))?;
            dataset_id = Some(record.id);
            store.load_dataset(record.id)?
        }
        DataSource::Sample(sample) => generate_sample(sample)?,
    };

    if raw.is_empty() {
        return Err(AppError::new(3, format!("No rows loaded from {}.", source.label())));
    }

    let dataset = if clean { clean_with(&raw, config) } else { raw };
    let roles = classify_with(&dataset, config);
    info!(
        rows = dataset.row_count(),
        metrics = roles.metrics.len(),
        dimensions = roles.dimensions.len(),
        time_columns = roles.time_columns.len(),
        "dataset ready"
    );

    Ok(LoadedData {
        source: source.label(),
        dataset,
        roles,
        row_errors,
        dataset_id,
    })
}

/// Sample source ending at `end_date`.
pub fn sample_source(seed: u64, rows: usize, days: usize, end_date: NaiveDate) -> DataSource {
    DataSource::Sample(SampleConfig {
        seed,
        rows,
        days,
        end_date,
    })
}

pub fn run_trend(
    data: &LoadedData,
    time: Option<&str>,
    metric: Option<&str>,
    options: &[TrendOption],
    config: &AnalysisConfig,
) -> Result<(TrendResult, Vec<Insight>), AppError> {
    let time = pick(time, &data.roles.time_columns, "time column", "--time")?;
    let metric = pick(metric, &data.roles.metrics, "metric", "--metric")?;
    let options: &[TrendOption] = if options.is_empty() { &TrendOption::DEFAULT } else { options };

    info!(time, metric, ?options, "running trend analysis");
    Ok(analyze_trend_with(&data.dataset, time, metric, options, config)?)
}

pub fn run_segment(
    data: &LoadedData,
    dimension: Option<&str>,
    metric: Option<&str>,
    options: &[SegmentOption],
    config: &AnalysisConfig,
) -> Result<(SegmentResult, Vec<Insight>), AppError> {
    let dimension = pick(dimension, &data.roles.dimensions, "dimension", "--by")?;
    let metric = pick(metric, &data.roles.metrics, "metric", "--metric")?;
    let options: &[SegmentOption] = if options.is_empty() {
        &[SegmentOption::CompareToAverage]
    } else {
        options
    };

    info!(dimension, metric, ?options, "running segmentation");
    Ok(segment_with(&data.dataset, dimension, metric, options, config)?)
}

/// The requested column, else the first candidate of the role.
fn pick<'a>(requested: Option<&'a str>, candidates: &'a [String], role: &str, flag: &str) -> Result<&'a str, AppError> {
    if let Some(name) = requested {
        return Ok(name);
    }
    candidates
        .first()
        .map(String::as_str)
        .ok_or_else(|| AppError::new(3, format!("No {role} detected in the data; pass {flag}.")))
}
