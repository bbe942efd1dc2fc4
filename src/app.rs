use chrono::Local;
use clap::Parser;
use serde_json::json;
use tracing::info;

use crate::cli::{AskArgs, Command, DataArgs, InsightsArgs, ListArgs, ProfileArgs, SaveArgs, SegmentArgs, TrendArgs};
use crate::config::{AnalysisConfig, NarratorConfig};
use crate::error::AppError;
use crate::narrate::{Narrator, fallback_insights};
use crate::store::{AnalysisKind, DatasetStore, JsonDirStore, NewAnalysis};

use self::pipeline::{DataSource, LoadedData};

pub mod pipeline;

/// Entry point for the `pulse` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    crate::telemetry::init(crate::telemetry::level_for(cli.verbose));

    match cli.command {
        Command::Profile(args) => handle_profile(args),
        Command::Trend(args) => handle_trend(args),
        Command::Segment(args) => handle_segment(args),
        Command::Ask(args) => handle_ask(args),
        Command::Insights(args) => handle_insights(args),
        Command::Save(args) => handle_save(args),
        Command::List(args) => handle_list(args),
    }
}

/// Everything a data-backed command needs.
struct Session {
    config: AnalysisConfig,
    store: Option<JsonDirStore>,
    data: LoadedData,
}

fn open_session(args: &DataArgs) -> Result<Session, AppError> {
    let config = match &args.config {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };
    let source = data_source(args);
    let store = match source {
        DataSource::Stored(_) => Some(JsonDirStore::open(&args.store)?),
        _ => None,
    };
    let data = pipeline::load(&source, store.as_ref(), &config, !args.no_clean)?;

    let warnings = crate::report::format_row_errors(&data.row_errors);
    if !warnings.is_empty() {
        eprint!("{warnings}");
    }

    Ok(Session { config, store, data })
}

fn data_source(args: &DataArgs) -> DataSource {
    if let Some(path) = &args.csv {
        DataSource::Csv(path.clone())
    } else if let Some(name) = &args.dataset {
        DataSource::Stored(name.clone())
    } else {
        pipeline::sample_source(args.seed, args.sample_rows, args.sample_days, Local::now().date_naive())
    }
}

fn handle_profile(args: ProfileArgs) -> Result<(), AppError> {
    let mut session = open_session(&args.data)?;
    let data = &session.data;
    println!("{}", crate::report::format_profile(&data.source, &data.dataset, &data.roles));

    if let Some(name) = &args.save_as {
        let insights = fallback_insights(&data.dataset);
        let configuration = json!({
            "metrics": data.roles.metrics,
            "dimensions": data.roles.dimensions,
            "time_columns": data.roles.time_columns,
        });
        save_analysis(&mut session, name, AnalysisKind::Dashboard, configuration, insights)?;
    }
    Ok(())
}

fn handle_trend(args: TrendArgs) -> Result<(), AppError> {
    let mut session = open_session(&args.data)?;
    let (result, insights) = pipeline::run_trend(
        &session.data,
        args.time.as_deref(),
        args.metric.as_deref(),
        &args.options,
        &session.config,
    )?;

    println!("{}", crate::report::format_trend(&result, &insights, args.rows));

    if let Some(path) = &args.export {
        crate::io::write_trend_csv(path, &result)?;
        info!(path = %path.display(), "exported trend");
    }
    if let Some(name) = &args.save_as {
        let configuration = json!({
            "time_column": result.time_column,
            "metric": result.metric,
            "options": args.options,
        });
        save_analysis(&mut session, name, AnalysisKind::Trend, configuration, insights)?;
    }
    Ok(())
}

fn handle_segment(args: SegmentArgs) -> Result<(), AppError> {
    let mut session = open_session(&args.data)?;
    let (result, insights) = pipeline::run_segment(
        &session.data,
        args.by.as_deref(),
        args.metric.as_deref(),
        &args.options,
        &session.config,
    )?;

    println!("{}", crate::report::format_segments(&result, &insights));

    if let Some(path) = &args.export {
        crate::io::write_segments_csv(path, &result)?;
        info!(path = %path.display(), "exported segments");
    }
    if let Some(name) = &args.save_as {
        let configuration = json!({
            "dimension": result.dimension,
            "metric": result.metric,
            "options": args.options,
        });
        save_analysis(&mut session, name, AnalysisKind::Segment, configuration, insights)?;
    }
    Ok(())
}

fn handle_ask(args: AskArgs) -> Result<(), AppError> {
    let session = open_session(&args.data)?;
    let narrator = Narrator::new(narrator_config(args.offline));
    println!("{}", narrator.answer(&args.query, &session.data.dataset));
    Ok(())
}

fn handle_insights(args: InsightsArgs) -> Result<(), AppError> {
    let mut session = open_session(&args.data)?;
    let narrator = Narrator::new(narrator_config(args.offline));
    let insights = narrator.insights(&session.data.dataset);

    println!("{}", crate::report::format_insights("Key insights", &insights));

    if let Some(name) = &args.save_as {
        let configuration = json!({ "llm_enabled": narrator.has_llm() });
        save_analysis(&mut session, name, AnalysisKind::Dashboard, configuration, insights)?;
    }
    Ok(())
}

fn handle_save(args: SaveArgs) -> Result<(), AppError> {
    let session = open_session(&args.data)?;
    let mut store = match session.store {
        Some(store) => store,
        None => JsonDirStore::open(&args.data.store)?,
    };
    let record = store.save_dataset(&session.data.dataset, &args.name, &args.description)?;
    println!(
        "Saved '{}' (id {}, {} rows x {} columns) to {}",
        record.name,
        record.id,
        record.rows,
        record.columns,
        store.root().display()
    );
    Ok(())
}

fn handle_list(args: ListArgs) -> Result<(), AppError> {
    let store = JsonDirStore::open(&args.store)?;
    let dataset_id = match &args.dataset {
        Some(name) => Some(
            store
                .find_dataset(name)?
                .ok_or_else(|| AppError::new(2, format!("No stored dataset named '{name}'.")))?
                .id,
        ),
        None => None,
    };

    if dataset_id.is_none() {
        println!("{}", crate::report::format_dataset_list(&store.list_datasets()?));
    }
    print!("{}", crate::report::format_analysis_list(&store.list_analyses(dataset_id)?));
    Ok(())
}

fn narrator_config(offline: bool) -> NarratorConfig {
    let config = NarratorConfig::from_env();
    if offline { config.offline() } else { config }
}

/// Attach an analysis to the stored dataset the session was loaded from.
fn save_analysis(
    session: &mut Session,
    name: &str,
    kind: AnalysisKind,
    configuration: serde_json::Value,
    insights: Vec<String>,
) -> Result<(), AppError> {
    let (Some(store), Some(dataset_id)) = (session.store.as_mut(), session.data.dataset_id) else {
        return Err(AppError::new(2, "`--save-as` needs a stored dataset; load it with `--dataset NAME`."));
    };
    let saved = store.save_analysis(NewAnalysis {
        dataset_id,
        name: name.to_string(),
        description: String::new(),
        kind,
        configuration,
        insights,
    })?;
    println!("Saved analysis '{}' (id {}).", saved.name, saved.id);
    Ok(())
}
