//! Terminal output for profiles, trend and segment results, and insights.
//!
//! We keep formatting code in one place so:
//! - the analysis code stays free of presentation concerns
//! - output changes are localized

use crate::domain::{ColumnRoles, Dataset, Insight, SegmentResult, TrendResult, format_timestamp};
use crate::io::RowError;
use crate::report::profile_columns;
use crate::store::{DatasetRecord, SavedAnalysis};

/// Dataset shape, column roles and a per-column profile table.
pub fn format_profile(source: &str, dataset: &Dataset, roles: &ColumnRoles) -> String {
    let mut out = String::new();

    out.push_str("=== pulse - Data Profile ===\n");
    out.push_str(&format!("Source: {source}\n"));
    out.push_str(&format!(
        "Shape: {} rows x {} columns\n",
        dataset.row_count(),
        dataset.column_count()
    ));
    out.push_str(&format!("Metrics: {}\n", fmt_names(&roles.metrics)));
    out.push_str(&format!("Dimensions: {}\n", fmt_names(&roles.dimensions)));
    out.push_str(&format!("Time: {}\n", fmt_names(&roles.time_columns)));
    out.push('\n');

    push_row(
        &mut out,
        format!(
            "{:<24} {:<9} {:<9} {:>6} {:>8} {}",
            "column", "type", "role", "nulls", "distinct", "range"
        ),
    );
    push_row(&mut out, format!("{:-<24} {:-<9} {:-<9} {:->6} {:->8} {:-<5}", "", "", "", "", "", ""));
    for p in profile_columns(dataset, roles) {
        push_row(
            &mut out,
            format!(
                "{:<24} {:<9} {:<9} {:>6} {:>8} {}",
                truncate(&p.name, 24),
                p.kind.label(),
                p.role.map_or("", |r| r.display_name()),
                p.nulls,
                p.distinct,
                p.range,
            ),
        );
    }

    out
}

/// Rows the CSV reader had to skip.
pub fn format_row_errors(errors: &[RowError]) -> String {
    let mut out = String::new();
    if errors.is_empty() {
        return out;
    }
    out.push_str(&format!("Skipped {} malformed row(s):\n", errors.len()));
    for e in errors.iter().take(5) {
        out.push_str(&format!("- line {}: {}\n", e.line, e.message));
    }
    if errors.len() > 5 {
        out.push_str(&format!("- ... and {} more\n", errors.len() - 5));
    }
    out
}

/// Trend table (at most `max_rows` points, head and tail) followed by insights.
pub fn format_trend(result: &TrendResult, insights: &[Insight], max_rows: usize) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== {} over {} ===\n", result.metric, result.time_column));
    out.push_str(&format!(
        "Points: n={} | outliers={}\n\n",
        result.len(),
        result.outlier_count()
    ));

    let mut header = format!("{:<19} {:>12}", "time", "value");
    if result.moving_average.is_some() {
        header.push_str(&format!(" {:>12}", "moving_avg"));
    }
    if result.trend_line.is_some() {
        header.push_str(&format!(" {:>12}", "trend"));
    }
    if result.seasonal.is_some() {
        header.push_str(&format!(" {:>12}", "seasonal"));
    }
    let rule = "-".repeat(header.len());
    push_row(&mut out, header);
    push_row(&mut out, rule);

    let n = result.len();
    let (head, tail) = if n > max_rows {
        let head = max_rows.div_ceil(2);
        (head, max_rows - head)
    } else {
        (n, 0)
    };

    let row = |i: usize| {
        let mut line = format!(
            "{:<19} {:>12.2}",
            format_timestamp(result.timestamps[i]),
            result.values[i]
        );
        for component in [&result.moving_average, &result.trend_line, &result.seasonal]
            .into_iter()
            .flatten()
        {
            line.push_str(&format!(" {:>12.2}", component[i]));
        }
        if result.outliers.as_ref().is_some_and(|flags| flags[i]) {
            line.push_str("  *");
        }
        line
    };

    for i in 0..head {
        push_row(&mut out, row(i));
    }
    if tail > 0 {
        push_row(&mut out, format!("... ({} rows omitted)", n - head - tail));
        for i in n - tail..n {
            push_row(&mut out, row(i));
        }
    }

    out.push('\n');
    out.push_str(&format_insights("Insights", insights));
    out
}

/// Segment statistics table followed by insights.
pub fn format_segments(result: &SegmentResult, insights: &[Insight]) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== {} by {} ===\n", result.metric, result.dimension));
    out.push_str(&format!(
        "Segments: n={} | rows={} | overall mean={:.2}\n\n",
        result.segments.len(),
        result.total_count(),
        result.global_mean
    ));

    push_row(
        &mut out,
        format!(
            "{:<20} {:>7} {:>12} {:>12} {:>12} {:>9} {:>8}",
            "segment", "count", "mean", "median", "std", "vs avg", "outliers"
        ),
    );
    push_row(
        &mut out,
        format!(
            "{:-<20} {:->7} {:->12} {:->12} {:->12} {:->9} {:->8}",
            "", "", "", "", "", "", ""
        ),
    );
    for s in &result.segments {
        push_row(
            &mut out,
            format!(
                "{:<20} {:>7} {:>12} {:>12} {:>12} {:>9} {:>8}",
                truncate(&s.segment, 20),
                s.count,
                fmt_opt(s.mean, 2),
                fmt_opt(s.median, 2),
                fmt_opt(s.std, 2),
                s.diff_pct.map(|p| format!("{p:+.1}%")).unwrap_or_default(),
                s.outliers.map(|c| c.to_string()).unwrap_or_default(),
            ),
        );
    }

    out.push('\n');
    out.push_str(&format_insights("Insights", insights));
    out
}

/// Bulleted list under a heading; says so when there is nothing to report.
pub fn format_insights(title: &str, insights: &[String]) -> String {
    let mut out = format!("{title}:\n");
    if insights.is_empty() {
        out.push_str("- (none)\n");
    }
    for insight in insights {
        out.push_str(&format!("- {insight}\n"));
    }
    out
}

pub fn format_dataset_list(records: &[DatasetRecord]) -> String {
    let mut out = String::new();
    out.push_str("Datasets:\n");
    if records.is_empty() {
        out.push_str("(none saved)\n");
        return out;
    }
    push_row(
        &mut out,
        format!("{:>4} {:<24} {:>7} {:>7} {:<19} {}", "id", "name", "rows", "cols", "modified", "description"),
    );
    for r in records {
        push_row(
            &mut out,
            format!(
                "{:>4} {:<24} {:>7} {:>7} {:<19} {}",
                r.id,
                truncate(&r.name, 24),
                r.rows,
                r.columns,
                r.last_modified.format("%Y-%m-%d %H:%M:%S"),
                r.description,
            ),
        );
    }
    out
}

pub fn format_analysis_list(analyses: &[SavedAnalysis]) -> String {
    let mut out = String::new();
    out.push_str("Saved analyses:\n");
    if analyses.is_empty() {
        out.push_str("(none saved)\n");
        return out;
    }
    for a in analyses {
        out.push_str(&format!(
            "- #{} {} [{:?}] dataset={} created={} ({} insight(s))\n",
            a.id,
            a.name,
            a.kind,
            a.dataset_id,
            a.created_at.format("%Y-%m-%d %H:%M:%S"),
            a.insights.len(),
        ));
    }
    out
}

fn push_row(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn fmt_names(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    v.map(|x| format!("{x:.decimals$}")).unwrap_or_default()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
