mod cli;
mod filter;
mod input;
mod model;
mod pipeline;
mod report;
mod session;

use clap::Parser;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ScoreArgs, parse_column_specs};
use crate::input::IngestError;
use crate::pipeline::stage4_scores::run_stage4;
use crate::pipeline::stage5_bootstrap::{StepOutcome, SystemInterval};
use crate::pipeline::stage6_report::{ReportError, build_summary, write_reports};
use crate::session::Session;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("{0}")]
    BadFilterFlag(String),
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Score(args) => score(args),
    }
}

fn score(args: ScoreArgs) -> Result<(), AppError> {
    let column_specs = parse_column_specs(&args.filters).map_err(AppError::BadFilterFlag)?;

    let (rows, ingest) = input::load_ratings(&args.input)?;
    let mut session = Session::new(rows);
    session.set_filters(&column_specs, args.filter_expr.as_deref());
    let selected = session.select();
    info!(selected = selected.len(), "rows pass current filters");

    let scores = run_stage4(&session.data().rows, &selected);

    let mut run = session.start_bootstrap(&selected, args.samples, args.batch, args.seed);
    let intervals: Vec<SystemInterval> = match run.run_to_completion() {
        StepOutcome::Complete => run.intervals(),
        // A single-shot run is only cancelled by a filter change, which
        // cannot happen here; report without intervals regardless.
        _ => Vec::new(),
    };

    let summary = build_summary(
        &args.input,
        &ingest,
        session.data().segments.len(),
        selected.len(),
        session.filter_error().map(str::to_string),
        &scores,
        &intervals,
    );
    write_reports(&summary, args.out.as_deref(), args.mode)?;
    Ok(())
}
