//! Synthetic product analytics sample.
//!
//! One row per session: a random day in the window, user/session ids,
//! device/country/channel labels, engagement metrics, conversion and
//! satisfaction. Session duration and purchase value grow linearly over the
//! window (×0.8 → ×1.2); session duration dips on weekends (Sat ×0.7,
//! Sun ×0.6). Output is fully determined by [`SampleConfig`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, Duration, NaiveDate};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Exp, Gamma, Poisson};
use tracing::debug;

use crate::domain::{Column, Dataset};
use crate::error::AnalysisError;

const DEVICES: [&str; 3] = ["desktop", "mobile", "tablet"];
const DEVICE_WEIGHTS: [f64; 3] = [0.6, 0.3, 0.1];
const COUNTRIES: [&str; 9] = ["US", "UK", "CA", "DE", "FR", "JP", "AU", "BR", "IN"];
const CHANNELS: [&str; 5] = ["organic", "paid_search", "social", "email", "referral"];
const USER_TYPES: [&str; 2] = ["new", "returning"];
const USER_TYPE_WEIGHTS: [f64; 2] = [0.3, 0.7];
const SATISFACTION_WEIGHTS: [f64; 5] = [0.05, 0.1, 0.2, 0.4, 0.25];
const CONVERSION_RATE: f64 = 0.15;

const TREND_START: f64 = 0.8;
const TREND_END: f64 = 1.2;
const SATURDAY_FACTOR: f64 = 0.7;
const SUNDAY_FACTOR: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleConfig {
    pub seed: u64,
    pub rows: usize,
    pub days: usize,
    /// Last day of the window.
    pub end_date: NaiveDate,
}

impl SampleConfig {
    /// 1000 rows over 90 days ending at `end_date`, seed 42.
    pub fn new(end_date: NaiveDate) -> Self {
        Self {
            seed: 42,
            rows: 1000,
            days: 90,
            end_date,
        }
    }
}

pub fn generate_sample(config: &SampleConfig) -> Result<Dataset, AnalysisError> {
    if config.rows == 0 {
        return Err(AnalysisError::InvalidParameter("sample row count must be > 0".to_string()));
    }
    if config.days == 0 {
        return Err(AnalysisError::InvalidParameter("sample window must span at least one day".to_string()));
    }

    let mut rng = StdRng::seed_from_u64(sample_seed(config));
    let dist_error = |e: String| AnalysisError::InvalidParameter(format!("sample distribution: {e}"));

    let duration_dist = Gamma::new(2.0, 180.0).map_err(|e| dist_error(e.to_string()))?;
    let pages_dist = Poisson::new(4.0).map_err(|e| dist_error(e.to_string()))?;
    let features_dist = Poisson::new(2.0).map_err(|e| dist_error(e.to_string()))?;
    let purchase_dist = Exp::new(1.0 / 50.0).map_err(|e| dist_error(e.to_string()))?;
    let device_dist = WeightedIndex::new(DEVICE_WEIGHTS).map_err(|e| dist_error(e.to_string()))?;
    let user_type_dist = WeightedIndex::new(USER_TYPE_WEIGHTS).map_err(|e| dist_error(e.to_string()))?;
    let satisfaction_dist = WeightedIndex::new(SATISFACTION_WEIGHTS).map_err(|e| dist_error(e.to_string()))?;

    let start = config.end_date - Duration::days(config.days as i64 - 1);
    let n = config.rows;

    let mut date = Vec::with_capacity(n);
    let mut user_id = Vec::with_capacity(n);
    let mut session_id = Vec::with_capacity(n);
    let mut device_type = Vec::with_capacity(n);
    let mut country = Vec::with_capacity(n);
    let mut channel = Vec::with_capacity(n);
    let mut session_duration = Vec::with_capacity(n);
    let mut pages_viewed = Vec::with_capacity(n);
    let mut features_used = Vec::with_capacity(n);
    let mut conversion = Vec::with_capacity(n);
    let mut purchase_value = Vec::with_capacity(n);
    let mut satisfaction = Vec::with_capacity(n);
    let mut user_type = Vec::with_capacity(n);

    for _ in 0..n {
        let offset = rng.gen_range(0..config.days);
        let day = start + Duration::days(offset as i64);
        let trend = trend_factor(offset, config.days);
        let weekend = match day.weekday().num_days_from_monday() {
            5 => SATURDAY_FACTOR,
            6 => SUNDAY_FACTOR,
            _ => 1.0,
        };

        date.push(day.and_hms_opt(0, 0, 0));
        user_id.push(Some(f64::from(rng.gen_range(1u32..=200))));
        session_id.push(Some(format!("s-{}", rng.gen_range(1u32..=5000))));
        device_type.push(Some(DEVICES[device_dist.sample(&mut rng)].to_string()));
        country.push(COUNTRIES.choose(&mut rng).map(|c| c.to_string()));
        channel.push(CHANNELS.choose(&mut rng).map(|c| c.to_string()));
        session_duration.push(Some(duration_dist.sample(&mut rng) * trend * weekend));
        pages_viewed.push(Some(pages_dist.sample(&mut rng)));
        features_used.push(Some(features_dist.sample(&mut rng)));

        let converted = rng.r#gen::<f64>() < CONVERSION_RATE;
        conversion.push(Some(if converted { 1.0 } else { 0.0 }));
        // Purchases are drawn independently of conversion.
        let purchased = rng.r#gen::<f64>() < CONVERSION_RATE;
        let amount = purchase_dist.sample(&mut rng);
        purchase_value.push(Some(if purchased { amount * trend } else { 0.0 }));

        satisfaction.push(Some((satisfaction_dist.sample(&mut rng) + 1) as f64));
        user_type.push(Some(USER_TYPES[user_type_dist.sample(&mut rng)].to_string()));
    }

    debug!(rows = n, days = config.days, seed = config.seed, "generated sample dataset");

    Dataset::new(vec![
        Column::timestamp("date", date),
        Column::number("user_id", user_id),
        Column::text("session_id", session_id),
        Column::text("device_type", device_type),
        Column::text("country", country),
        Column::text("acquisition_channel", channel),
        Column::number("session_duration", session_duration),
        Column::number("pages_viewed", pages_viewed),
        Column::number("features_used", features_used),
        Column::number("conversion", conversion),
        Column::number("purchase_value", purchase_value),
        Column::number("satisfaction_score", satisfaction),
        Column::text("user_type", user_type),
    ])
}

/// Linear growth factor for a day offset within the window.
fn trend_factor(offset: usize, days: usize) -> f64 {
    if days <= 1 {
        return TREND_START;
    }
    TREND_START + (TREND_END - TREND_START) * offset as f64 / (days - 1) as f64
}

fn sample_seed(config: &SampleConfig) -> u64 {
    let mut hasher = DefaultHasher::new();
    config.hash(&mut hasher);
    hasher.finish()
}
