use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use chart_journal::analysis::AnalysisSummary;
use chart_journal::annotation::Annotation;
use chart_journal::bundle::IndicatorSuite;
use chart_journal::config::{self, AppConfig};
use chart_journal::error::{OutputError, SourceError};
use chart_journal::interaction::ResizeStrategy;
use chart_journal::model::{ActiveIndicators, BarDate, IndicatorKind, Timeframe};
use chart_journal::render::svg::to_svg;
use chart_journal::render::{CanvasSize, Point};
use chart_journal::session::{ChartSession, LoadOutcome};
use chart_journal::snapshot::ChartSnapshot;
use chart_journal::source::BarSource;
use chart_journal::source::file::FileSource;
use chart_journal::source::fmp::FmpSource;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("invalid argument")]
    Argument,
    #[display("chart data unavailable")]
    Source,
    #[display("snapshot error")]
    Snapshot,
    #[display("output error")]
    Output,
}

#[derive(Parser)]
#[command(name = "chart-journal", about = "Stock charts with indicators, annotations and shipped snapshots")]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a chart to an SVG file
    Render {
        #[command(flatten)]
        chart: ChartArgs,
        /// Annotation as START:END dates, repeatable
        #[arg(long = "annotate", value_name = "START:END")]
        annotations: Vec<String>,
        /// Pointer x position (CSS pixels) to draw the hover marker at
        #[arg(long)]
        hover: Option<f64>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Capture a snapshot record and print or write it as JSON
    Ship {
        #[command(flatten)]
        chart: ChartArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Recompute a stored snapshot and report mismatching values
    Verify {
        #[arg(long)]
        snapshot: PathBuf,
        /// Write a compact SVG preview of the snapshot
        #[arg(long)]
        preview: Option<PathBuf>,
    },
    /// Print the analysis summary line
    Summary {
        #[command(flatten)]
        chart: ChartArgs,
    },
}

#[derive(Args)]
struct ChartArgs {
    #[arg(long)]
    symbol: String,
    /// One of 1D, 1W, 1M, 3M, 6M, 1Y, YTD, 5Y
    #[arg(long, default_value = "1M")]
    timeframe: String,
    /// Comma-separated indicator names, e.g. MA,RSI,BB
    #[arg(long, value_delimiter = ',')]
    indicators: Vec<String>,
}

const PREVIEW_SIZE: CanvasSize = CanvasSize {
    width: 300.0,
    height: 150.0,
    device_pixel_ratio: 1.0,
};

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load_or_default(cli.config.as_deref()).change_context(AppError::Config)?;

    init_tracing(&config);
    debug!(
        resize = ?ResizeStrategy::select(config.chart.resize_strategy(), false),
        "headless run, no container to observe"
    );

    match cli.command {
        Command::Render {
            chart,
            annotations,
            hover,
            out,
        } => {
            let mut session = open_session(&config, &chart).await?;
            for spec in &annotations {
                session.add_annotation(parse_annotation(spec)?);
            }
            if let Some(x) = hover {
                let y = config.chart.height / 2.0;
                match session.pointer_move(Point::new(x, y)) {
                    Some(info) => info!(date = %info.date_label, price = %info.price_label(), "hover"),
                    None => warn!(x, "hover position has no data"),
                }
            }
            write_output(&out, &to_svg(session.frame())).await?;
            info!(path = %out.display(), "chart written");
        }
        Command::Ship { chart, out } => {
            let session = open_session(&config, &chart).await?;
            let snapshot = ChartSnapshot::capture(&session)
                .ok_or_else(|| Report::new(AppError::Snapshot))
                .attach("no bars loaded")?;
            let json = snapshot.to_json().change_context(AppError::Output)?;
            match out {
                Some(path) => {
                    write_output(&path, &json).await?;
                    info!(id = %snapshot.id, path = %path.display(), "snapshot shipped");
                }
                None => println!("{json}"),
            }
        }
        Command::Verify { snapshot, preview } => {
            let content = tokio::fs::read_to_string(&snapshot)
                .await
                .change_context(AppError::Snapshot)
                .attach_with(|| format!("path: {}", snapshot.display()))?;
            let record: ChartSnapshot = serde_json::from_str(&content)
                .change_context(AppError::Snapshot)
                .attach_with(|| format!("path: {}", snapshot.display()))?;

            let verification = record.verify().change_context(AppError::Snapshot)?;
            if verification.is_match() {
                println!("{} {} {}: values match", record.id, record.symbol, record.timeframe);
            } else {
                println!(
                    "{} {} {}: mismatched {}",
                    record.id,
                    record.symbol,
                    record.timeframe,
                    verification.mismatched.join(", ")
                );
            }

            if let Some(path) = preview {
                let output = record.preview(PREVIEW_SIZE).change_context(AppError::Snapshot)?;
                write_output(&path, &to_svg(&output.frame)).await?;
                info!(path = %path.display(), "preview written");
            }
        }
        Command::Summary { chart } => {
            let session = open_session(&config, &chart).await?;
            println!("{}", AnalysisSummary::build(session.bars(), session.bundle()));
        }
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

fn build_source(config: &AppConfig) -> Box<dyn BarSource> {
    let source = &config.source;
    match source.kind.as_str() {
        "fmp" => Box::new(FmpSource::new(
            source.base_url.clone(),
            source.api_key.clone().unwrap_or_default(),
            source.requests_per_second,
        )),
        _ => Box::new(FileSource::new(&source.data_dir)),
    }
}

async fn open_session(config: &AppConfig, args: &ChartArgs) -> Result<ChartSession, Report<AppError>> {
    let timeframe = Timeframe::from_str(&args.timeframe)
        .ok_or_else(|| Report::new(AppError::Argument))
        .attach_with(|| format!("unknown timeframe: {}", args.timeframe))
        .attach_with(|| format!("expected one of: {}", Timeframe::choices()))?;
    let active = parse_indicators(&args.indicators)?;

    // Validated with the rest of the config.
    let suite = IndicatorSuite::new(config.indicators).change_context(AppError::Config)?;
    let mut session = ChartSession::new(&args.symbol, config.chart.size(), suite);
    session.set_active(active);

    let source = build_source(config);
    info!(provider = source.name(), symbol = %session.symbol(), %timeframe, "loading chart");
    match session.load(source.as_ref(), timeframe).await {
        LoadOutcome::Applied { .. } => Ok(session),
        LoadOutcome::Stale | LoadOutcome::Failed => Err(Report::new(SourceError::Read {
            provider: source.name().to_owned(),
        })
        .change_context(AppError::Source)
        .attach(format!("symbol: {}, timeframe: {timeframe}", session.symbol()))),
    }
}

fn parse_indicators(names: &[String]) -> Result<ActiveIndicators, Report<AppError>> {
    names
        .iter()
        .map(|name| {
            IndicatorKind::from_str(name.trim())
                .ok_or_else(|| Report::new(AppError::Argument))
                .attach_with(|| format!("unknown indicator: {name}"))
                .attach_with(|| format!("expected one of: {}", IndicatorKind::choices()))
        })
        .collect()
}

/// Dates may carry a time (`2024-01-05 09:30`), so every `:` is tried as the split.
fn parse_annotation(spec: &str) -> Result<Annotation, Report<AppError>> {
    spec.match_indices(':')
        .find_map(|(at, _)| {
            let start = BarDate::parse(&spec[..at])?;
            let end = BarDate::parse(&spec[at + 1..])?;
            Some(Annotation::new(start, end))
        })
        .ok_or_else(|| Report::new(AppError::Argument))
        .attach_with(|| format!("expected START:END dates, got {spec}"))
}

async fn write_output(path: &Path, content: &str) -> Result<(), Report<AppError>> {
    tokio::fs::write(path, content)
        .await
        .change_context(OutputError::Write)
        .attach_with(|| format!("path: {}", path.display()))
        .change_context(AppError::Output)
}
