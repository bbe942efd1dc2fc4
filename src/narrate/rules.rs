//! Rule-based narration.
//!
//! A query is matched against [`RULES`] in order; every rule whose keywords
//! appear contributes one section to the answer. Single-word keywords match
//! whole words only ("top" does not match "stop"); multi-word keywords match
//! as substrings. When nothing matches, the answer is the generic summary
//! from [`fallback_insights`].
//!
//! Handlers cover the numeric columns named in the query, or all metrics
//! when the query names none.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::analysis::{analyze_trend, classify};
use crate::domain::{ColumnKind, ColumnRoles, Dataset, TrendOption};
use crate::math::{mean, median, min_max, pearson, sample_std};

/// |r| at or above which a correlation is "moderate".
pub const MODERATE_CORRELATION: f64 = 0.3;
/// |r| at or above which a correlation is "strong".
pub const STRONG_CORRELATION: f64 = 0.7;
/// Secondary pairs above this |r| are listed after the strongest pair.
pub const NOTABLE_CORRELATION: f64 = 0.2;

/// One keyword-triggered section of an answer.
pub struct Rule {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    handler: fn(&QueryContext<'_>) -> String,
}

impl Rule {
    pub fn matches(&self, query: &str) -> bool {
        let lower = query.to_lowercase();
        let words = words(&lower);
        self.keywords.iter().any(|kw| mentions(&lower, &words, kw))
    }
}

fn words(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .collect()
}

/// Whole-word match for single terms, substring match for phrases.
fn mentions(lower: &str, words: &[&str], term: &str) -> bool {
    if term.contains(' ') {
        lower.contains(term)
    } else {
        words.contains(&term)
    }
}

pub static RULES: &[Rule] = &[
    Rule {
        name: "average",
        keywords: &["average", "mean", "avg"],
        handler: average_section,
    },
    Rule {
        name: "maximum",
        keywords: &["maximum", "max", "highest", "top", "best"],
        handler: maximum_section,
    },
    Rule {
        name: "minimum",
        keywords: &["minimum", "min", "lowest", "bottom", "worst"],
        handler: minimum_section,
    },
    Rule {
        name: "correlation",
        keywords: &["correlation", "correlate", "relationship", "related"],
        handler: correlation_section,
    },
    Rule {
        name: "trend",
        keywords: &["trend", "pattern", "over time", "growth"],
        handler: trend_section,
    },
    Rule {
        name: "distribution",
        keywords: &["distribution", "histogram", "spread", "range"],
        handler: distribution_section,
    },
    Rule {
        name: "size",
        keywords: &["how many", "count", "rows", "size"],
        handler: size_section,
    },
];

struct QueryContext<'a> {
    dataset: &'a Dataset,
    roles: ColumnRoles,
    /// Columns (any kind) the query mentions, in column order.
    named: Vec<&'a str>,
    /// Metrics, or every numeric column when there are none.
    metrics: Vec<&'a str>,
    /// Numeric columns the numeric handlers cover.
    targets: Vec<&'a str>,
}

impl<'a> QueryContext<'a> {
    fn new(query: &str, dataset: &'a Dataset) -> Self {
        let roles = classify(dataset);
        let lower = query.to_lowercase();
        let query_words = words(&lower);
        let named: Vec<&str> = dataset
            .column_names()
            .into_iter()
            .filter(|name| {
                let name = name.to_lowercase();
                mentions(&lower, &query_words, &name) || mentions(&lower, &query_words, &name.replace('_', " "))
            })
            .collect();

        let is_numeric = |name: &str| {
            dataset
                .column(name)
                .is_ok_and(|c| c.kind() == ColumnKind::Number)
        };
        let mut metrics: Vec<&str> = dataset
            .column_names()
            .into_iter()
            .filter(|n| roles.metrics.iter().any(|m| m == n))
            .collect();
        if metrics.is_empty() {
            metrics = dataset.column_names().into_iter().filter(|n| is_numeric(n)).collect();
        }
        let mut targets: Vec<&str> = named.iter().copied().filter(|n| is_numeric(n)).collect();
        if targets.is_empty() {
            targets = metrics.clone();
        }

        Self {
            dataset,
            roles,
            named,
            metrics,
            targets,
        }
    }

    fn present(&self, column: &str) -> Vec<f64> {
        self.dataset
            .numbers(column)
            .map(|values| values.iter().flatten().copied().collect())
            .unwrap_or_default()
    }
}

/// Answer a free-text question without a language model.
pub fn narrate_fallback(query: &str, dataset: &Dataset) -> String {
    let ctx = QueryContext::new(query, dataset);
    let sections: Vec<String> = RULES
        .iter()
        .filter(|rule| rule.matches(query))
        .map(|rule| (rule.handler)(&ctx))
        .collect();

    if sections.is_empty() {
        let insights = fallback_insights(dataset);
        let mut out = String::from("Here is an overview of your data:\n");
        for insight in insights {
            out.push_str("\n- ");
            out.push_str(&insight);
        }
        return out;
    }
    sections.join("\n\n")
}

fn numeric_section(ctx: &QueryContext<'_>, title: &str, stat: fn(&[f64]) -> Option<f64>) -> String {
    let mut out = format!("{title}:");
    let mut any = false;
    for column in &ctx.targets {
        if let Some(v) = stat(&ctx.present(column)) {
            out.push_str(&format!("\n- {column}: {v:.2}"));
            any = true;
        }
    }
    if !any {
        out.push_str("\n- No numeric values available.");
    }
    out
}

fn average_section(ctx: &QueryContext<'_>) -> String {
    numeric_section(ctx, "Average values", mean)
}

fn maximum_section(ctx: &QueryContext<'_>) -> String {
    numeric_section(ctx, "Maximum values", |v| min_max(v).map(|(_, hi)| hi))
}

fn minimum_section(ctx: &QueryContext<'_>) -> String {
    numeric_section(ctx, "Minimum values", |v| min_max(v).map(|(lo, _)| lo))
}

/// weak / moderate / strong by |r|.
pub fn correlation_strength(r: f64) -> &'static str {
    let r = r.abs();
    if r < MODERATE_CORRELATION {
        "weak"
    } else if r < STRONG_CORRELATION {
        "moderate"
    } else {
        "strong"
    }
}

fn correlation_section(ctx: &QueryContext<'_>) -> String {
    let columns = if ctx.targets.len() >= 2 { &ctx.targets } else { &ctx.metrics };
    let mut pairs = Vec::new();
    for (i, a) in columns.iter().enumerate() {
        for b in &columns[i + 1..] {
            let (Ok(xs), Ok(ys)) = (ctx.dataset.numbers(a), ctx.dataset.numbers(b)) else {
                continue;
            };
            if let Some(r) = pearson(xs, ys) {
                pairs.push((*a, *b, r));
            }
        }
    }
    // Stable: equal |r| keeps column order.
    pairs.sort_by(|x, y| y.2.abs().total_cmp(&x.2.abs()));

    let Some(&(a, b, r)) = pairs.first() else {
        return "Correlation: Not enough numeric data to compute correlations.".to_string();
    };
    let direction = if r >= 0.0 { "positive" } else { "negative" };
    let mut out = format!(
        "Correlation: The strongest relationship is between {a} and {b} (r = {r:.2}, a {} {direction} correlation).",
        correlation_strength(r)
    );
    let others: Vec<_> = pairs[1..]
        .iter()
        .filter(|(_, _, r)| r.abs() > NOTABLE_CORRELATION)
        .collect();
    if !others.is_empty() {
        out.push_str("\nOther notable relationships:");
        for (a, b, r) in others {
            out.push_str(&format!("\n- {a} and {b}: r = {r:.2} ({})", correlation_strength(*r)));
        }
    }
    out
}

fn trend_section(ctx: &QueryContext<'_>) -> String {
    let Some(time_column) = ctx.roles.time_columns.first() else {
        return "Trend: No time column was found, so trends over time cannot be computed.".to_string();
    };
    let lines: Vec<String> = ctx
        .targets
        .iter()
        .filter_map(|metric| analyze_trend(ctx.dataset, time_column, metric, &[TrendOption::TrendLine]).ok())
        .flat_map(|(_, insights)| insights)
        .collect();
    if lines.is_empty() {
        return format!("Trend: No metric could be tracked over {time_column}.");
    }
    lines.join("\n")
}

fn distribution_section(ctx: &QueryContext<'_>) -> String {
    let mut out = String::from("Distribution:");
    for column in &ctx.targets {
        let values = ctx.present(column);
        let (Some((lo, hi)), Some(mid)) = (min_max(&values), median(&values)) else {
            continue;
        };
        let spread = sample_std(&values).map_or_else(|| "n/a".to_string(), |s| format!("{s:.2}"));
        out.push_str(&format!(
            "\n- {column}: ranges from {lo:.2} to {hi:.2} (median {mid:.2}, std {spread})"
        ));
    }
    out
}

fn size_section(ctx: &QueryContext<'_>) -> String {
    let mut out = format!(
        "The dataset has {} rows and {} columns.",
        ctx.dataset.row_count(),
        ctx.dataset.column_count()
    );
    for name in &ctx.named {
        if let Ok(column) = ctx.dataset.column(name) {
            out.push_str(&format!("\n- {name}: {} distinct values", column.distinct_count()));
        }
    }
    out
}

/// Column-name keywords and the remark they trigger.
const DOMAIN_HINTS: [(&[&str], &str); 5] = [
    (
        &["conversion", "convert"],
        "Conversion data is present: breaking conversion down by acquisition channel or device can reveal where the funnel leaks.",
    ),
    (
        &["retention", "churn"],
        "Retention data is present: cohort analysis by signup period usually shows whether product changes improved stickiness.",
    ),
    (
        &["revenue", "purchase", "price"],
        "Revenue data is present: comparing average purchase value across segments highlights the most valuable customers.",
    ),
    (
        &["session", "duration", "engagement"],
        "Engagement data is present: tracking session metrics over time shows whether users are finding ongoing value.",
    ),
    (
        &["satisfaction", "nps", "rating", "feedback"],
        "Satisfaction data is present: correlating it with usage metrics can show which experiences drive happier users.",
    ),
];

const CLOSING_REMARKS: [&str; 4] = [
    "Try asking about trends over time or comparing segments to dig deeper.",
    "Segmenting your key metrics by the main dimensions is a good next step.",
    "Look for outliers in your key metrics; they often point to bugs or standout users.",
    "Comparing metrics before and after recent releases can show the impact of product changes.",
];

/// Five generic observations about a dataset.
pub fn fallback_insights(dataset: &Dataset) -> Vec<String> {
    let roles = classify(dataset);
    vec![
        shape_insight(dataset, &roles),
        metric_range_insight(dataset, &roles),
        top_category_insight(dataset, &roles),
        domain_hint(dataset),
        closing_remark(dataset).to_string(),
    ]
}

fn shape_insight(dataset: &Dataset, roles: &ColumnRoles) -> String {
    format!(
        "The dataset contains {} rows and {} columns: {} metrics, {} dimensions and {} time columns.",
        dataset.row_count(),
        dataset.column_count(),
        roles.metrics.len(),
        roles.dimensions.len(),
        roles.time_columns.len()
    )
}

fn metric_range_insight(dataset: &Dataset, roles: &ColumnRoles) -> String {
    let ranges: Vec<String> = roles
        .metrics
        .iter()
        .filter_map(|m| {
            let values: Vec<f64> = dataset.numbers(m).ok()?.iter().flatten().copied().collect();
            let (lo, hi) = min_max(&values)?;
            Some(format!("{m} from {lo:.2} to {hi:.2}"))
        })
        .take(3)
        .collect();
    if ranges.is_empty() {
        "No numeric metrics were detected; counts per category are the best starting point.".to_string()
    } else {
        format!("Key metric ranges: {}.", ranges.join("; "))
    }
}

fn top_category_insight(dataset: &Dataset, roles: &ColumnRoles) -> String {
    let text_dimension = roles.dimensions.iter().find(|d| {
        dataset
            .column(d)
            .is_ok_and(|c| c.kind() == ColumnKind::Text && c.distinct_count() > 0)
    });
    let Some(name) = text_dimension else {
        return "No categorical columns were detected.".to_string();
    };
    let Some(values) = dataset.column(name).ok().and_then(|c| c.as_text()) else {
        return "No categorical columns were detected.".to_string();
    };
    let Some(top) = crate::analysis::mode(values) else {
        return "No categorical columns were detected.".to_string();
    };
    let count = values.iter().flatten().filter(|v| **v == top).count();
    let pct = count as f64 / dataset.row_count().max(1) as f64 * 100.0;
    format!("The most common {name} is {top} ({count} of {} rows, {pct:.1}%).", dataset.row_count())
}

fn domain_hint(dataset: &Dataset) -> String {
    let names: Vec<String> = dataset.column_names().iter().map(|n| n.to_lowercase()).collect();
    DOMAIN_HINTS
        .iter()
        .find(|(keywords, _)| names.iter().any(|n| keywords.iter().any(|kw| n.contains(kw))))
        .map_or(
            "Adding event or outcome columns (conversion, revenue, retention) would enable richer product insights.",
            |(_, hint)| hint,
        )
        .to_string()
}

/// One of [`CLOSING_REMARKS`], fixed for a given column set and row count.
fn closing_remark(dataset: &Dataset) -> &'static str {
    let mut hasher = DefaultHasher::new();
    dataset.column_names().hash(&mut hasher);
    dataset.row_count().hash(&mut hasher);
    CLOSING_REMARKS[(hasher.finish() % CLOSING_REMARKS.len() as u64) as usize]
}
