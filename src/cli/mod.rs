//! Command-line parsing for the `pulse` product analytics tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! analysis code; dispatch lives in `app`.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{SegmentOption, TrendOption};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pulse", version, about = "Product analytics: column typing, trends, segments and insights")]
pub struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the dataset shape, inferred column roles and per-column statistics.
    Profile(ProfileArgs),
    /// Trend analysis of one metric over a time column.
    Trend(TrendArgs),
    /// Break a metric down by a dimension.
    Segment(SegmentArgs),
    /// Ask a free-text question about the data.
    Ask(AskArgs),
    /// Headline insights about the whole dataset.
    Insights(InsightsArgs),
    /// Store the (cleaned) dataset under a name.
    Save(SaveArgs),
    /// List stored datasets and saved analyses.
    List(ListArgs),
}

/// Where the data comes from, plus shared analysis settings.
///
/// Without `--csv` or `--dataset` the built-in sample is used.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// Load a CSV file.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dataset", "sample"])]
    pub csv: Option<PathBuf>,

    /// Load a dataset previously stored with `pulse save`.
    #[arg(long, value_name = "NAME", conflicts_with = "sample")]
    pub dataset: Option<String>,

    /// Use the built-in synthetic product analytics sample.
    #[arg(long)]
    pub sample: bool,

    /// Random seed for the sample.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Sample size (rows).
    #[arg(long = "sample-rows", default_value_t = 1000)]
    pub sample_rows: usize,

    /// Sample window (days, ending today).
    #[arg(long = "sample-days", default_value_t = 90)]
    pub sample_days: usize,

    /// Directory of the dataset store.
    #[arg(long, value_name = "DIR", default_value = ".pulse")]
    pub store: PathBuf,

    /// JSON file overriding analysis thresholds.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Skip cleaning (deduplication, imputation, date coercion).
    #[arg(long)]
    pub no_clean: bool,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Save the profile insights as a dashboard analysis (needs `--dataset`).
    #[arg(long, value_name = "NAME")]
    pub save_as: Option<String>,
}

#[derive(Debug, Args)]
pub struct TrendArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Time column (default: first time column).
    #[arg(long)]
    pub time: Option<String>,

    /// Metric column (default: first metric).
    #[arg(long)]
    pub metric: Option<String>,

    /// Components to compute; repeat for several (default: moving-average, trend-line).
    #[arg(long = "option", value_enum)]
    pub options: Vec<TrendOption>,

    /// Maximum table rows to print.
    #[arg(long, default_value_t = 20)]
    pub rows: usize,

    /// Export the decomposition to CSV.
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Save the analysis under this name (needs `--dataset`).
    #[arg(long, value_name = "NAME")]
    pub save_as: Option<String>,
}

#[derive(Debug, Args)]
pub struct SegmentArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Dimension to segment by (default: first dimension).
    #[arg(long)]
    pub by: Option<String>,

    /// Metric column (default: first metric).
    #[arg(long)]
    pub metric: Option<String>,

    /// Steps to run; repeat for several (default: compare-to-average).
    #[arg(long = "option", value_enum)]
    pub options: Vec<SegmentOption>,

    /// Export the segment table to CSV.
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Save the analysis under this name (needs `--dataset`).
    #[arg(long, value_name = "NAME")]
    pub save_as: Option<String>,
}

#[derive(Debug, Args)]
pub struct AskArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// The question, e.g. "what is the average session duration?".
    pub query: String,

    /// Never call the language model.
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, Args)]
pub struct InsightsArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Never call the language model.
    #[arg(long)]
    pub offline: bool,

    /// Save the insights as a dashboard analysis (needs `--dataset`).
    #[arg(long, value_name = "NAME")]
    pub save_as: Option<String>,
}

#[derive(Debug, Args)]
pub struct SaveArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Name to store the dataset under; an existing dataset is replaced.
    #[arg(long)]
    pub name: String,

    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Directory of the dataset store.
    #[arg(long, value_name = "DIR", default_value = ".pulse")]
    pub store: PathBuf,

    /// Only show analyses of this dataset.
    #[arg(long, value_name = "NAME")]
    pub dataset: Option<String>,
}
