//! Run configuration.
//!
//! - `AnalysisConfig`: thresholds used by the cleaner, classifier, trend and
//!   segmentation analyzers. Defaults are the documented behavior; a JSON file
//!   may override any subset of fields.
//! - `NarratorConfig`: settings for the optional text-completion service,
//!   read from the environment (and `.env`).

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Columns with a null fraction below this are imputed by the cleaner.
pub const IMPUTE_MAX_NULL_FRACTION: f64 = 0.10;
/// Numeric columns with fewer distinct values are dimensions.
pub const DIMENSION_MAX_DISTINCT: usize = 10;
/// Numeric columns whose distinct/rows ratio is below this are dimensions.
pub const DIMENSION_MAX_RATIO: f64 = 0.05;
pub const MAX_MOVING_AVERAGE_WINDOW: usize = 7;
/// Trend lines changing less than this percentage are reported as flat.
pub const FLAT_TREND_PCT: f64 = 5.0;
pub const MIN_SEASONALITY_ROWS: usize = 14;
/// Weekday variation (percent of the mean) above which a series is seasonal.
pub const SEASONALITY_VARIATION_PCT: f64 = 10.0;
pub const MOVING_AVERAGE_OUTLIER_SIGMA: f64 = 2.0;
pub const TREND_OUTLIER_SIGMA: f64 = 2.5;
/// Values whose magnitude is below this share of the mean are never outliers.
pub const NEAR_ZERO_RATIO: f64 = 0.01;
pub const COMPARE_THRESHOLD_PCT: f64 = 20.0;
pub const SEGMENT_OUTLIER_SIGMA: f64 = 2.0;
pub const MIN_SEGMENT_ROWS: usize = 5;
pub const SEGMENT_OUTLIER_FRACTION: f64 = 0.05;
pub const MAX_OUTLIER_SEGMENTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub impute_max_null_fraction: f64,
    pub dimension_max_distinct: usize,
    pub dimension_max_ratio: f64,
    pub max_moving_average_window: usize,
    pub flat_trend_pct: f64,
    pub min_seasonality_rows: usize,
    pub seasonality_variation_pct: f64,
    pub moving_average_outlier_sigma: f64,
    pub trend_outlier_sigma: f64,
    pub near_zero_ratio: f64,
    pub compare_threshold_pct: f64,
    pub segment_outlier_sigma: f64,
    pub min_segment_rows: usize,
    pub segment_outlier_fraction: f64,
    pub max_outlier_segments: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            impute_max_null_fraction: IMPUTE_MAX_NULL_FRACTION,
            dimension_max_distinct: DIMENSION_MAX_DISTINCT,
            dimension_max_ratio: DIMENSION_MAX_RATIO,
            max_moving_average_window: MAX_MOVING_AVERAGE_WINDOW,
            flat_trend_pct: FLAT_TREND_PCT,
            min_seasonality_rows: MIN_SEASONALITY_ROWS,
            seasonality_variation_pct: SEASONALITY_VARIATION_PCT,
            moving_average_outlier_sigma: MOVING_AVERAGE_OUTLIER_SIGMA,
            trend_outlier_sigma: TREND_OUTLIER_SIGMA,
            near_zero_ratio: NEAR_ZERO_RATIO,
            compare_threshold_pct: COMPARE_THRESHOLD_PCT,
            segment_outlier_sigma: SEGMENT_OUTLIER_SIGMA,
            min_segment_rows: MIN_SEGMENT_ROWS,
            segment_outlier_fraction: SEGMENT_OUTLIER_FRACTION,
            max_outlier_segments: MAX_OUTLIER_SEGMENTS,
        }
    }
}

impl AnalysisConfig {
    /// Load overrides from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::new(2, format!("Failed to open config '{}': {e}", path.display())))?;
        let config: AnalysisConfig = serde_json::from_reader(file)
            .map_err(|e| AppError::new(2, format!("Invalid config JSON '{}': {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let fractions = [
            ("impute_max_null_fraction", self.impute_max_null_fraction),
            ("dimension_max_ratio", self.dimension_max_ratio),
            ("near_zero_ratio", self.near_zero_ratio),
            ("segment_outlier_fraction", self.segment_outlier_fraction),
        ];
        for (name, value) in fractions {
            if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
                return Err(AppError::new(2, format!("`{name}` must be within [0, 1].")));
            }
        }
        let positives = [
            ("flat_trend_pct", self.flat_trend_pct),
            ("seasonality_variation_pct", self.seasonality_variation_pct),
            ("moving_average_outlier_sigma", self.moving_average_outlier_sigma),
            ("trend_outlier_sigma", self.trend_outlier_sigma),
            ("compare_threshold_pct", self.compare_threshold_pct),
            ("segment_outlier_sigma", self.segment_outlier_sigma),
        ];
        for (name, value) in positives {
            if !(value.is_finite() && value >= 0.0) {
                return Err(AppError::new(2, format!("`{name}` must be finite and >= 0.")));
            }
        }
        if self.max_moving_average_window == 0 {
            return Err(AppError::new(2, "`max_moving_average_window` must be > 0."));
        }
        Ok(())
    }
}

pub const DEFAULT_LLM_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_LLM_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;

/// Settings for the optional text-completion collaborator.
///
/// An absent API key means the narrator runs rule-based only.
#[derive(Debug, Clone, PartialEq)]
pub struct NarratorConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_LLM_MODEL.to_string(),
            endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }
}

impl NarratorConfig {
    /// Read `GEMINI_API_KEY`, `PULSE_LLM_MODEL` and `PULSE_LLM_TIMEOUT_SECS`
    /// (after loading `.env` if present).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let model = std::env::var("PULSE_LLM_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());
        let timeout = std::env::var("PULSE_LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .unwrap_or(DEFAULT_LLM_TIMEOUT_SECS);

        Self {
            api_key,
            model,
            timeout: Duration::from_secs(timeout),
            ..Self::default()
        }
    }

    /// Same settings with the completion service switched off.
    pub fn offline(&self) -> Self {
        Self {
            api_key: None,
            ..self.clone()
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"trend_outlier_sigma": 3.0}"#).unwrap();
        assert_eq!(config.trend_outlier_sigma, 3.0);
        assert_eq!(config.min_seasonality_rows, MIN_SEASONALITY_ROWS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_fraction() {
        let config = AnalysisConfig {
            near_zero_ratio: 1.5,
            ..AnalysisConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().exit_code(), 2);
    }

    #[test]
    fn offline_drops_the_key() {
        let config = NarratorConfig {
            api_key: Some("k".to_string()),
            ..NarratorConfig::default()
        };
        assert!(config.has_api_key());
        assert!(!config.offline().has_api_key());
    }
}
