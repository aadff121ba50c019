//! Mobilita CLI - batch export and range-filtered reporting
//!
//! Commands:
//! - daily: export per-calendar-day mobility metrics for every user under an uploads directory
//! - weekly: export per-ISO-week mobility metrics
//! - report: fuse a weekly export with user metadata (and optional survey/feedback
//!   tables) and print KPIs, time series, composition and correlations

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mobilita::coerce;
use mobilita::error::AnalysisError;
use mobilita::export;
use mobilita::fuse::MultiSourceJoiner;
use mobilita::pipeline::BatchProcessor;
use mobilita::query::{
    CompositionRow, CorrelationMatrix, Kpis, Metric, PeriodWindow, RangeQueryEngine, SeriesPoint,
};
use mobilita::segments::TimeWindow;
use mobilita::types::{
    ActivityKind, FeedbackResponse, Granularity, KindDistances, MobilityMetricRow, PeriodKey,
    SurveyResponse, UserRecord,
};
use mobilita::ENGINE_VERSION;

/// Timeline file names accepted inside each user directory, in priority order
const TIMELINE_FILES: [&str; 2] = ["location-history.json", "Spostamenti.json"];

/// Mobilita - sustainable-mobility metrics from raw location timelines
#[derive(Parser)]
#[command(name = "mobilita")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Aggregate raw location timelines into mobility metrics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export per-day mobility metrics to CSV
    Daily {
        /// Directory with one sub-directory per user
        #[arg(long, default_value = "uploads")]
        uploads: PathBuf,

        /// Output CSV path
        #[arg(long, default_value = "mobilita.csv")]
        output: PathBuf,

        /// First day of the analysis window (inclusive)
        #[arg(long, default_value = "2025-04-01")]
        start: String,

        /// Last day of the analysis window (inclusive); defaults to today
        #[arg(long)]
        end: Option<String>,
    },

    /// Export per-ISO-week mobility metrics to CSV
    Weekly {
        /// Directory with one sub-directory per user
        #[arg(long, default_value = "uploads")]
        uploads: PathBuf,

        /// Output CSV path
        #[arg(long, default_value = "mobilita_settimanale.csv")]
        output: PathBuf,

        /// First day of the analysis window (inclusive)
        #[arg(long, default_value = "2025-04-01")]
        start: String,

        /// Last day of the analysis window (inclusive); defaults to today
        #[arg(long)]
        end: Option<String>,
    },

    /// Fuse a weekly export with the auxiliary tables and print aggregates
    Report {
        /// Weekly mobility CSV produced by the weekly command
        #[arg(long, default_value = "mobilita_settimanale.csv")]
        mobility: PathBuf,

        /// User metadata CSV (user_id, telegram_user_id, language, state, group)
        #[arg(long, default_value = "users.csv")]
        users: PathBuf,

        /// Optional survey CSV (user_id, response_date, answers...)
        #[arg(long)]
        survey: Option<PathBuf>,

        /// Optional feedback CSV (user_id, week, answers...)
        #[arg(long)]
        feedback: Option<PathBuf>,

        /// Index of the first period in the window (into the sorted domain)
        #[arg(long, default_value = "0")]
        from: usize,

        /// Index of the last period in the window; defaults to the latest
        #[arg(long)]
        to: Option<usize>,

        /// Metric for the time series (percent_sustainable, total,
        /// sustainable, or an activity label like "walking")
        #[arg(long, default_value = "percent_sustainable")]
        metric: String,

        /// Emit the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {}", error);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AnalysisError> {
    match cli.command {
        Commands::Daily {
            uploads,
            output,
            start,
            end,
        } => cmd_export(&uploads, &output, &start, end.as_deref(), Granularity::Daily),

        Commands::Weekly {
            uploads,
            output,
            start,
            end,
        } => cmd_export(&uploads, &output, &start, end.as_deref(), Granularity::Weekly),

        Commands::Report {
            mobility,
            users,
            survey,
            feedback,
            from,
            to,
            metric,
            json,
        } => cmd_report(
            &mobility,
            &users,
            survey.as_deref(),
            feedback.as_deref(),
            from,
            to,
            &metric,
            json,
        ),
    }
}

fn cmd_export(
    uploads: &Path,
    output: &Path,
    start: &str,
    end: Option<&str>,
    granularity: Granularity,
) -> Result<(), AnalysisError> {
    let window = TimeWindow::new(parse_day_start(start)?, match end {
        Some(end) => parse_day_end(end)?,
        None => Utc::now(),
    });

    let mut user_dirs: Vec<PathBuf> = fs::read_dir(uploads)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    user_dirs.sort();

    let mut batch = BatchProcessor::new(window, granularity);
    for user_dir in &user_dirs {
        let user_id = match user_dir.file_name().and_then(|name| name.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let Some(timeline_path) = find_timeline(user_dir) else {
            warn!(%user_id, "no timeline file, skipping user");
            continue;
        };
        let raw_json = fs::read_to_string(&timeline_path)?;
        batch.ingest_user(&user_id, &raw_json);
    }

    info!(
        processed = batch.processed_users(),
        failed = batch.failed_users(),
        "batch complete"
    );

    let rows = batch.finish();
    let file = fs::File::create(output)?;
    export::write_csv(file, granularity, &rows)?;
    info!(output = %output.display(), rows = rows.len(), "export written");
    Ok(())
}

fn find_timeline(user_dir: &Path) -> Option<PathBuf> {
    TIMELINE_FILES
        .iter()
        .map(|name| user_dir.join(name))
        .find(|candidate| candidate.exists())
}

fn parse_day_start(raw: &str) -> Result<DateTime<Utc>, AnalysisError> {
    let date = parse_date(raw)?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now))
}

fn parse_day_end(raw: &str) -> Result<DateTime<Utc>, AnalysisError> {
    let date = parse_date(raw)?;
    Ok(date
        .and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now))
}

fn parse_date(raw: &str) -> Result<NaiveDate, AnalysisError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AnalysisError::DateParseError(format!("expected YYYY-MM-DD, got {}", raw)))
}

#[derive(Serialize)]
struct Report {
    window: PeriodWindow,
    kpis: Kpis,
    time_series: Vec<SeriesPoint>,
    composition: Vec<CompositionRow>,
    correlation: CorrelationMatrix,
}

fn cmd_report(
    mobility: &Path,
    users: &Path,
    survey: Option<&Path>,
    feedback: Option<&Path>,
    from: usize,
    to: Option<usize>,
    metric: &str,
    json: bool,
) -> Result<(), AnalysisError> {
    let rows = load_mobility(mobility)?;
    let user_records = load_users(users)?;

    let mut joiner = MultiSourceJoiner::new(Granularity::Weekly).users(&user_records);
    // Missing auxiliary tables degrade: the dependent projections stay
    // empty and the rest of the report still renders.
    if let Some(path) = survey {
        match load_survey(path) {
            Ok(responses) => joiner = joiner.survey(&responses),
            Err(error) => warn!(path = %path.display(), %error, "survey table unavailable"),
        }
    }
    if let Some(path) = feedback {
        match load_feedback(path) {
            Ok(responses) => joiner = joiner.feedback(&responses),
            Err(error) => warn!(path = %path.display(), %error, "feedback table unavailable"),
        }
    }

    let dataset = joiner.build(&rows);
    let engine = RangeQueryEngine::new(&dataset);
    let Some(window) = engine.resolve_window(from, to.unwrap_or(usize::MAX)) else {
        println!("no data: the fused dataset is empty");
        return Ok(());
    };

    let report = Report {
        window,
        kpis: engine.kpis(&window),
        time_series: engine.time_series(&window, parse_metric(metric)?),
        composition: engine.composition(&window),
        correlation: engine.correlation(&window),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, metric);
    }
    Ok(())
}

fn parse_metric(raw: &str) -> Result<Metric, AnalysisError> {
    let metric = match raw {
        "percent_sustainable" => Metric::PercentSustainable,
        "total" => Metric::TotalKm,
        "sustainable" => Metric::SustainableKm,
        label => match ActivityKind::from_raw(label) {
            ActivityKind::Unknown => {
                return Err(AnalysisError::UnrecognizedFormat(format!(
                    "unknown metric: {}",
                    label
                )))
            }
            kind => Metric::Kind(kind),
        },
    };
    Ok(metric)
}

fn print_report(report: &Report, metric: &str) {
    println!(
        "Window: {} .. {} ({} rows)",
        report.window.start, report.window.end, report.kpis.rows
    );
    println!();
    println!("KPIs");
    println!(
        "  mean sustainability: {:.2}%",
        report.kpis.mean_percent_sustainable
    );
    println!(
        "  total distance: {:.1} km ({:.1} sustainable, {:.1} not)",
        report.kpis.total_km, report.kpis.sustainable_km, report.kpis.non_sustainable_km
    );
    match &report.kpis.best_group {
        Some(best) => println!(
            "  best group: {} ({:.2}%)",
            best.group, best.mean_percent_sustainable
        ),
        None => println!("  best group: no data"),
    }

    println!();
    println!("Time series ({})", metric);
    for point in &report.time_series {
        println!("  {} {} {:.2}", point.period, point.group, point.mean);
    }

    println!();
    println!("Composition (mean km per row)");
    for row in &report.composition {
        println!("  {} {} {:.3}", row.group, row.kind.label(), row.mean_km);
    }

    println!();
    println!("Correlation ({})", report.correlation.columns.join(", "));
    for row in &report.correlation.values {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                Some(value) => format!("{:6.3}", value),
                None => "     -".to_string(),
            })
            .collect();
        println!("  {}", cells.join(" "));
    }
}

// Table loaders for the fused inputs. Column layouts follow §6 of the
// data contract; the weekly mobility layout matches the weekly export.

fn load_users(path: &Path) -> Result<Vec<UserRecord>, AnalysisError> {
    if !path.exists() {
        return Err(AnalysisError::MissingSource(path.display().to_string()));
    }
    // Column meanings are positional; the header row may carry any labels
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.len() < 5 {
            continue;
        }
        let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();
        records.push(UserRecord {
            user_id: field(0),
            display_code: field(1),
            language: field(2),
            state: field(3),
            group: field(4),
        });
    }
    Ok(records)
}

fn load_mobility(path: &Path) -> Result<Vec<MobilityMetricRow>, AnalysisError> {
    if !path.exists() {
        return Err(AnalysisError::MissingSource(path.display().to_string()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|header| header == name);

    let user_idx = column("user_id");
    let week_idx = column("week_number");
    let start_idx = column("week_start");
    let end_idx = column("week_end");
    let kind_idx: Vec<Option<usize>> = ActivityKind::TRACKED
        .iter()
        .map(|kind| column(kind.label()))
        .collect();
    let total_idx = column("total");
    let sustainable_idx = column("sustainable");
    let percent_idx = column("percent_sustainable");

    let (Some(user_idx), Some(week_idx)) = (user_idx, week_idx) else {
        return Err(AnalysisError::UnrecognizedFormat(
            "mobility CSV lacks user_id/week_number columns".to_string(),
        ));
    };

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");
        let number = |idx: Option<usize>| field(idx).trim().parse::<f64>().unwrap_or(0.0);

        let Some(period) = coerce::canonical_period(field(Some(week_idx)), Granularity::Weekly)
        else {
            // Unparsable period spelling: the row cannot be keyed
            continue;
        };
        let period_start = NaiveDate::parse_from_str(field(start_idx), "%Y-%m-%d")
            .ok()
            .unwrap_or_else(|| fallback_week_start(&period));
        let period_end = NaiveDate::parse_from_str(field(end_idx), "%Y-%m-%d").ok();

        let mut distances = KindDistances::default();
        for (kind, idx) in ActivityKind::TRACKED.iter().zip(&kind_idx) {
            distances.add(*kind, number(*idx));
        }

        rows.push(MobilityMetricRow {
            user_id: record.get(user_idx).unwrap_or("").to_string(),
            period,
            period_start,
            period_end,
            distances,
            total_km: number(total_idx),
            sustainable_km: number(sustainable_idx),
            percent_sustainable: number(percent_idx),
        });
    }
    Ok(rows)
}

fn fallback_week_start(period: &PeriodKey) -> NaiveDate {
    match period {
        PeriodKey::Day(date) => *date,
        PeriodKey::Week { iso_year, iso_week } => {
            NaiveDate::from_isoywd_opt(*iso_year, *iso_week, chrono::Weekday::Mon)
                .unwrap_or_default()
        }
    }
}

fn load_survey(path: &Path) -> Result<Vec<SurveyResponse>, AnalysisError> {
    if !path.exists() {
        return Err(AnalysisError::MissingSource(path.display().to_string()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut responses = Vec::new();
    for result in reader.records() {
        let record = result?;
        let (Some(user_id), Some(date_field)) = (record.get(0), record.get(1)) else {
            continue;
        };
        let Ok(response_date) = NaiveDate::parse_from_str(date_field.trim(), "%Y-%m-%d") else {
            continue;
        };
        responses.push(SurveyResponse {
            user_id: user_id.to_string(),
            response_date,
            answers: record.iter().skip(2).map(str::to_string).collect(),
        });
    }
    Ok(responses)
}

fn load_feedback(path: &Path) -> Result<Vec<FeedbackResponse>, AnalysisError> {
    if !path.exists() {
        return Err(AnalysisError::MissingSource(path.display().to_string()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut responses = Vec::new();
    for result in reader.records() {
        let record = result?;
        let (Some(user_id), Some(week)) = (record.get(0), record.get(1)) else {
            continue;
        };
        responses.push(FeedbackResponse {
            user_id: user_id.to_string(),
            week: week.to_string(),
            answers: record.iter().skip(2).map(str::to_string).collect(),
        });
    }
    Ok(responses)
}
