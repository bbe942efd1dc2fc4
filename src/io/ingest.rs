//! CSV ingest.
//!
//! Turns an arbitrary CSV export into a typed [`Dataset`]:
//! - headers are trimmed and BOM-stripped; blank headers become `Unnamed: <i>`
//! - a column is numeric when every non-missing cell parses as a finite
//!   number, otherwise text (date parsing is left to the cleaner)
//! - common missing-value tokens (`NA`, `N/A`, `null`, empty, ...) become nulls
//! - short rows are padded with nulls; malformed or over-long rows are skipped
//!   and reported, never silently merged

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info};

use crate::domain::{Column, Dataset};
use crate::error::AnalysisError;

/// Cell spellings read as missing values.
pub const NA_TOKENS: [&str; 14] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A", "<NA>", "#NA",
];

/// A row skipped during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based line number in the file (header is line 1).
    pub line: usize,
    pub message: String,
}

/// Ingest output: the table plus what happened on the way in.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: Dataset,
    pub rows_read: usize,
    pub row_errors: Vec<RowError>,
}

/// Load a CSV file.
pub fn read_csv(path: &Path) -> Result<IngestedData, AnalysisError> {
    let file = File::open(path)
        .map_err(|e| AnalysisError::Ingest(format!("failed to open '{}': {e}", path.display())))?;
    let data = read_csv_from_reader(file)?;
    info!(
        path = %path.display(),
        rows = data.dataset.row_count(),
        columns = data.dataset.column_count(),
        skipped = data.row_errors.len(),
        "loaded csv"
    );
    Ok(data)
}

pub fn read_csv_from_reader<R: Read>(reader: R) -> Result<IngestedData, AnalysisError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AnalysisError::Ingest(format!("failed to read headers: {e}")))?
        .clone();
    let names = normalize_headers(&headers);
    let width = names.len();

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header line.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        if record.len() > width {
            row_errors.push(RowError {
                line,
                message: format!("row has {} fields, header has {width}", record.len()),
            });
            continue;
        }

        for (col, slot) in cells.iter_mut().enumerate() {
            slot.push(record.get(col).filter(|s| !is_na(s)).map(str::to_string));
        }
    }

    if !row_errors.is_empty() {
        debug!(skipped = row_errors.len(), "skipped malformed rows");
    }

    let columns = names
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| infer_column(name, raw))
        .collect();
    let dataset = Dataset::new(columns)?;

    Ok(IngestedData {
        dataset,
        rows_read,
        row_errors,
    })
}

fn normalize_headers(headers: &StringRecord) -> Vec<String> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            // Spreadsheet exports often prefix the first header with a BOM.
            let name = name.trim().trim_start_matches('\u{feff}').trim();
            if name.is_empty() {
                format!("Unnamed: {idx}")
            } else {
                name.to_string()
            }
        })
        .collect()
}

pub fn is_na(cell: &str) -> bool {
    NA_TOKENS.contains(&cell.trim())
}

/// Numeric when every present cell parses; an all-missing column stays text.
fn infer_column(name: String, raw: Vec<Option<String>>) -> Column {
    let parsed: Option<Vec<Option<f64>>> = raw
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(s) => parse_number(s).map(Some),
        })
        .collect();

    match parsed {
        Some(values) if values.iter().any(Option::is_some) => Column::number(name, values),
        _ => Column::text(name, raw),
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let v = s.trim().parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}
