//! Language-model narration: prompt building and the Gemini HTTP client.

use std::collections::BTreeMap;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};
use tracing::debug;

use crate::config::NarratorConfig;
use crate::domain::{ColumnData, Dataset, Value, format_timestamp};
use crate::error::AnalysisError;
use crate::math::{mean, min_max};

/// Anything that turns a prompt into text.
pub trait TextCompletion {
    fn complete(&self, prompt: &str) -> Result<String, AnalysisError>;
}

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    url: String,
}

impl GeminiClient {
    pub fn new(config: &NarratorConfig) -> Result<Self, AnalysisError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AnalysisError::Completion("missing GEMINI_API_KEY".to_string()))?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnalysisError::Completion(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            url: format!("{}/{}:generateContent", config.endpoint.trim_end_matches('/'), config.model),
        })
    }
}

impl TextCompletion for GeminiClient {
    fn complete(&self, prompt: &str) -> Result<String, AnalysisError> {
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let resp = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|e| AnalysisError::Completion(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AnalysisError::Completion(format!(
                "request failed with status {}",
                resp.status()
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .map_err(|e| AnalysisError::Completion(format!("failed to parse response: {e}")))?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        debug!(chars = text.len(), "completion received");

        if text.trim().is_empty() {
            return Err(AnalysisError::Completion("empty response".to_string()));
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

/// Compact description of a dataset for prompts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub data_types: BTreeMap<String, &'static str>,
    pub numeric_columns_summary: BTreeMap<String, NumericSummary>,
    pub categorical_columns_unique_values: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub time_range: BTreeMap<String, TimeRange>,
    /// First three non-null values per column.
    pub sample_values: BTreeMap<String, Vec<String>>,
}

impl DatasetSummary {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut summary = Self {
            rows: dataset.row_count(),
            columns: dataset.column_count(),
            column_names: dataset.column_names().iter().map(|n| n.to_string()).collect(),
            data_types: BTreeMap::new(),
            numeric_columns_summary: BTreeMap::new(),
            categorical_columns_unique_values: BTreeMap::new(),
            time_range: BTreeMap::new(),
            sample_values: BTreeMap::new(),
        };

        for column in dataset.columns() {
            let name = column.name.clone();
            summary.data_types.insert(name.clone(), column.kind().label());
            summary.sample_values.insert(
                name.clone(),
                (0..column.len())
                    .map(|row| column.data.value(row))
                    .filter(|v| !v.is_null())
                    .take(3)
                    .map(|v| v.to_string())
                    .collect(),
            );

            match &column.data {
                ColumnData::Number(values) => {
                    let present: Vec<f64> = values.iter().flatten().copied().collect();
                    if let (Some(m), Some((lo, hi))) = (mean(&present), min_max(&present)) {
                        summary
                            .numeric_columns_summary
                            .insert(name, NumericSummary { mean: m, min: lo, max: hi });
                    }
                }
                ColumnData::Text(_) => {
                    summary
                        .categorical_columns_unique_values
                        .insert(name, column.distinct_count());
                }
                ColumnData::Timestamp(values) => {
                    let present = values.iter().flatten();
                    if let (Some(start), Some(end)) = (present.clone().min(), present.max()) {
                        summary.time_range.insert(
                            name,
                            TimeRange {
                                start: start.format("%Y-%m-%d").to_string(),
                                end: end.format("%Y-%m-%d").to_string(),
                            },
                        );
                    }
                }
            }
        }
        summary
    }
}

pub fn query_prompt(query: &str, dataset: &Dataset) -> String {
    let summary = DatasetSummary::from_dataset(dataset);
    let columns: Vec<String> = dataset
        .columns()
        .iter()
        .map(|c| {
            let samples = summary.sample_values.get(&c.name).cloned().unwrap_or_default();
            format!("- {} ({}): Sample values: [{}]", c.name, c.kind().label(), samples.join(", "))
        })
        .collect();
    let summary_json = serde_json::to_string(&summary).unwrap_or_default();

    format!(
        "You are a data analyst assistant for product managers. You help analyze product analytics data.\n\
         \n\
         The user will ask you questions about their data. Respond with clear, concise insights.\n\
         \n\
         Here is information about the data:\n\
         Number of rows: {rows}\n\
         Number of columns: {cols}\n\
         \n\
         Columns:\n\
         {columns}\n\
         \n\
         Data summary: {summary_json}\n\
         \n\
         User query: {query}\n\
         \n\
         When answering:\n\
         1. Interpret what analysis they're looking for\n\
         2. Provide a direct answer based on the data\n\
         3. Add 1-2 additional insights if relevant\n\
         4. When suggesting visualizations, be specific about chart type and variables\n\
         5. For trend analysis, note any patterns or anomalies\n\
         \n\
         Keep responses friendly and clear. Avoid technical jargon unless specifically requested.\n",
        rows = dataset.row_count(),
        cols = dataset.column_count(),
        columns = columns.join("\n"),
    )
}

pub fn insights_prompt(dataset: &Dataset) -> String {
    let summary = DatasetSummary::from_dataset(dataset);
    let summary_json = serde_json::to_string(&summary).unwrap_or_default();
    let sample_json = serde_json::to_string(&head_records(dataset, 5)).unwrap_or_default();

    format!(
        "You are a data analyst assistant for product managers. You help analyze product analytics data.\n\
         \n\
         Based on the following data summary and sample, generate 3-5 key insights.\n\
         \n\
         Data summary: {summary_json}\n\
         \n\
         Sample data: {sample_json}\n\
         \n\
         Focus on:\n\
         1. Patterns in the data that might be relevant to product managers\n\
         2. Potential areas of concern or opportunity\n\
         3. Interesting relationships between variables\n\
         4. Suggestions for further analysis\n\
         \n\
         Format your response as a bulleted list of insights, with each bullet starting with \"- \".\n"
    )
}

/// First `n` rows as JSON objects keyed by column name.
fn head_records(dataset: &Dataset, n: usize) -> Vec<BTreeMap<String, Json>> {
    (0..dataset.row_count().min(n))
        .map(|row| {
            dataset
                .columns()
                .iter()
                .map(|c| {
                    let cell = match c.data.value(row) {
                        Value::Null => Json::Null,
                        Value::Number(v) => Json::from(v),
                        Value::Text(s) => Json::from(s),
                        Value::Timestamp(ts) => Json::from(format_timestamp(ts)),
                    };
                    (c.name.clone(), cell)
                })
                .collect()
        })
        .collect()
}

/// Split a completion into insights: `- ` bullets, else up to five sentences.
pub fn parse_insights(text: &str) -> Vec<String> {
    let bullets: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("- "))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    if !bullets.is_empty() {
        return bullets;
    }
    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(5)
        .map(str::to_string)
        .collect()
}
