//! Persistence for datasets and saved analyses.
//!
//! [`JsonDirStore`] keeps everything under one directory:
//!
//! ```text
//! <root>/index.json        dataset + analysis records, id counter
//! <root>/data_<id>.json    one serialized Dataset per record
//! ```
//!
//! Dataset names are unique; saving under an existing name replaces the data
//! and bumps `last_modified`, keeping the id.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::classify;
use crate::domain::{ColumnRole, Dataset};
use crate::error::AnalysisError;
use crate::io::{read_json, write_json};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub created_at: NaiveDateTime,
    pub last_modified: NaiveDateTime,
    pub rows: usize,
    pub columns: usize,
    /// Column roles at save time.
    pub column_roles: Vec<(String, ColumnRole)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Dashboard,
    Trend,
    Segment,
}

/// A saved analysis: what was asked and what came out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedAnalysis {
    pub id: u64,
    pub dataset_id: u64,
    pub name: String,
    pub description: String,
    pub created_at: NaiveDateTime,
    pub kind: AnalysisKind,
    /// Parameters as given (columns, options), free-form.
    pub configuration: serde_json::Value,
    pub insights: Vec<String>,
}

/// Input for [`DatasetStore::save_analysis`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalysis {
    pub dataset_id: u64,
    pub name: String,
    pub description: String,
    pub kind: AnalysisKind,
    pub configuration: serde_json::Value,
    pub insights: Vec<String>,
}

pub trait DatasetStore {
    /// Insert, or replace the dataset already stored under `name`.
    fn save_dataset(&mut self, dataset: &Dataset, name: &str, description: &str) -> Result<DatasetRecord, AnalysisError>;
    fn list_datasets(&self) -> Result<Vec<DatasetRecord>, AnalysisError>;
    fn find_dataset(&self, name: &str) -> Result<Option<DatasetRecord>, AnalysisError>;
    fn load_dataset(&self, id: u64) -> Result<Dataset, AnalysisError>;
    /// Removes the dataset and its analyses; `false` when the id is unknown.
    fn delete_dataset(&mut self, id: u64) -> Result<bool, AnalysisError>;

    fn save_analysis(&mut self, analysis: NewAnalysis) -> Result<SavedAnalysis, AnalysisError>;
    /// Newest first; all datasets when `dataset_id` is `None`.
    fn list_analyses(&self, dataset_id: Option<u64>) -> Result<Vec<SavedAnalysis>, AnalysisError>;
    fn load_analysis(&self, id: u64) -> Result<SavedAnalysis, AnalysisError>;
    fn delete_analysis(&mut self, id: u64) -> Result<bool, AnalysisError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Index {
    next_id: u64,
    datasets: Vec<DatasetRecord>,
    analyses: Vec<SavedAnalysis>,
}

impl Index {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct JsonDirStore {
    root: PathBuf,
    index: Index,
}

impl JsonDirStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AnalysisError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| AnalysisError::Store(format!("failed to create '{}': {e}", root.display())))?;
        let index_path = root.join("index.json");
        let index = if index_path.exists() {
            read_json(&index_path)?
        } else {
            Index::default()
        };
        debug!(root = %root.display(), datasets = index.datasets.len(), "opened dataset store");
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, id: u64) -> PathBuf {
        self.root.join(format!("data_{id}.json"))
    }

    fn persist(&self) -> Result<(), AnalysisError> {
        self.write_index(&self.index)
    }

    fn write_index(&self, index: &Index) -> Result<(), AnalysisError> {
        write_json(&self.root.join("index.json"), index)
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl DatasetStore for JsonDirStore {
    fn save_dataset(&mut self, dataset: &Dataset, name: &str, description: &str) -> Result<DatasetRecord, AnalysisError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AnalysisError::InvalidParameter("dataset name must not be empty".to_string()));
        }
        let roles = classify(dataset).roles;
        let timestamp = now();

        // Staged; committed once the data file and the index are both written.
        let mut index = self.index.clone();
        let position = index.datasets.iter().position(|r| r.name == name);
        let record = match position {
            Some(i) => {
                let existing = &mut index.datasets[i];
                existing.description = description.to_string();
                existing.last_modified = timestamp;
                existing.rows = dataset.row_count();
                existing.columns = dataset.column_count();
                existing.column_roles = roles;
                existing.clone()
            }
            None => {
                let record = DatasetRecord {
                    id: index.allocate_id(),
                    name: name.to_string(),
                    description: description.to_string(),
                    created_at: timestamp,
                    last_modified: timestamp,
                    rows: dataset.row_count(),
                    columns: dataset.column_count(),
                    column_roles: roles,
                };
                index.datasets.push(record.clone());
                record
            }
        };

        write_json(&self.data_path(record.id), dataset)?;
        self.write_index(&index)?;
        self.index = index;
        info!(id = record.id, name = %record.name, rows = record.rows, "saved dataset");
        Ok(record)
    }

    fn list_datasets(&self) -> Result<Vec<DatasetRecord>, AnalysisError> {
        let mut records = self.index.datasets.clone();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    fn find_dataset(&self, name: &str) -> Result<Option<DatasetRecord>, AnalysisError> {
        Ok(self.index.datasets.iter().find(|r| r.name == name.trim()).cloned())
    }

    fn load_dataset(&self, id: u64) -> Result<Dataset, AnalysisError> {
        if !self.index.datasets.iter().any(|r| r.id == id) {
            return Err(AnalysisError::Store(format!("no dataset with id {id}")));
        }
        read_json(&self.data_path(id))
    }

    fn delete_dataset(&mut self, id: u64) -> Result<bool, AnalysisError> {
        let before = self.index.datasets.len();
        self.index.datasets.retain(|r| r.id != id);
        if self.index.datasets.len() == before {
            return Ok(false);
        }
        self.index.analyses.retain(|a| a.dataset_id != id);

        let path = self.data_path(id);
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| AnalysisError::Store(format!("failed to remove '{}': {e}", path.display())))?;
        }
        self.persist()?;
        Ok(true)
    }

    fn save_analysis(&mut self, analysis: NewAnalysis) -> Result<SavedAnalysis, AnalysisError> {
        if !self.index.datasets.iter().any(|r| r.id == analysis.dataset_id) {
            return Err(AnalysisError::Store(format!("no dataset with id {}", analysis.dataset_id)));
        }
        let saved = SavedAnalysis {
            id: self.index.allocate_id(),
            dataset_id: analysis.dataset_id,
            name: analysis.name,
            description: analysis.description,
            created_at: now(),
            kind: analysis.kind,
            configuration: analysis.configuration,
            insights: analysis.insights,
        };
        self.index.analyses.push(saved.clone());
        self.persist()?;
        info!(id = saved.id, dataset_id = saved.dataset_id, kind = ?saved.kind, "saved analysis");
        Ok(saved)
    }

    fn list_analyses(&self, dataset_id: Option<u64>) -> Result<Vec<SavedAnalysis>, AnalysisError> {
        let mut out: Vec<SavedAnalysis> = self
            .index
            .analyses
            .iter()
            .filter(|a| dataset_id.is_none_or(|id| a.dataset_id == id))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    fn load_analysis(&self, id: u64) -> Result<SavedAnalysis, AnalysisError> {
        self.index
            .analyses
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| AnalysisError::Store(format!("no analysis with id {id}")))
    }

    fn delete_analysis(&mut self, id: u64) -> Result<bool, AnalysisError> {
        let before = self.index.analyses.len();
        self.index.analyses.retain(|a| a.id != id);
        if self.index.analyses.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Column;
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::tempdir;

    fn dataset() -> Dataset {
        let day = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        Dataset::new(vec![
            Column::timestamp("date", vec![Some(day), None]),
            Column::number("revenue", vec![Some(1.5), None]),
            Column::text("plan", vec![Some("pro".to_string()), None]),
        ])
        .unwrap()
    }

    #[test]
    fn datasets_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let record = {
            let mut store = JsonDirStore::open(&root).unwrap();
            store.save_dataset(&dataset(), "march", "first export").unwrap()
        };

        let store = JsonDirStore::open(&root).unwrap();
        assert_eq!(store.list_datasets().unwrap(), vec![record.clone()]);
        assert_eq!(store.load_dataset(record.id).unwrap(), dataset());
        assert_eq!(record.rows, 2);
        assert_eq!(store.find_dataset("march").unwrap().map(|r| r.id), Some(record.id));
    }

    #[test]
    fn saving_under_an_existing_name_replaces_data() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut store = JsonDirStore::open(&root).unwrap();
        let first = store.save_dataset(&dataset(), "events", "").unwrap();

        let smaller = dataset().select_rows(&[0]);
        let second = store.save_dataset(&smaller, "events", "trimmed").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.rows, 1);
        assert_eq!(store.list_datasets().unwrap().len(), 1);
        assert_eq!(store.load_dataset(first.id).unwrap(), smaller);
    }

    #[test]
    fn analyses_are_listed_and_removed_with_their_dataset() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut store = JsonDirStore::open(&root).unwrap();
        let record = store.save_dataset(&dataset(), "events", "").unwrap();

        let saved = store
            .save_analysis(NewAnalysis {
                dataset_id: record.id,
                name: "weekly revenue".to_string(),
                description: String::new(),
                kind: AnalysisKind::Trend,
                configuration: json!({ "time_column": "date", "metric": "revenue" }),
                insights: vec!["Trend: revenue shows a flat trend".to_string()],
            })
            .unwrap();
        assert_eq!(store.list_analyses(Some(record.id)).unwrap(), vec![saved.clone()]);
        assert_eq!(store.load_analysis(saved.id).unwrap().configuration["metric"], "revenue");
        assert!(store.list_analyses(Some(record.id + 100)).unwrap().is_empty());

        assert!(store.delete_dataset(record.id).unwrap());
        assert!(store.list_analyses(None).unwrap().is_empty());
        assert!(store.load_dataset(record.id).is_err());
        assert!(!store.delete_dataset(record.id).unwrap());
    }

    #[test]
    fn analysis_needs_a_known_dataset() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut store = JsonDirStore::open(&root).unwrap();
        let err = store
            .save_analysis(NewAnalysis {
                dataset_id: 9,
                name: "x".to_string(),
                description: String::new(),
                kind: AnalysisKind::Segment,
                configuration: json!({}),
                insights: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Store(_)));
        assert!(store.save_dataset(&dataset(), "  ", "").is_err());
    }

    #[test]
    fn failed_save_leaves_the_index_untouched() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");
        let mut store = JsonDirStore::open(&root).unwrap();
        let kept = store.save_dataset(&dataset(), "kept", "").unwrap();

        fs::remove_dir_all(&root).unwrap();
        assert!(store.save_dataset(&dataset(), "lost", "").is_err());
        assert_eq!(store.list_datasets().unwrap(), vec![kept.clone()]);
        assert!(store.find_dataset("lost").unwrap().is_none());

        fs::create_dir_all(&root).unwrap();
        let next = store.save_dataset(&dataset(), "next", "").unwrap();
        assert_eq!(next.id, kept.id + 1);

        let reopened = JsonDirStore::open(&root).unwrap();
        let names: Vec<String> = reopened.list_datasets().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["kept", "next"]);
        assert!(reopened.load_dataset(next.id).is_ok());
    }
}
