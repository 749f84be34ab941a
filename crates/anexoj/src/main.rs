//! anexoj - build a capital-gains annex from a broker statement.
//!
//! Reads a statement export (stdin or `--file`), matches every sell
//! against prior buys with FIFO lot accounting, and prints the resulting
//! disposal lines as the annex table with summed totals.

mod table;

use anexoj_core::{build_report, Aggregator, FeePolicy};
use anexoj_figi::OpenFigi;
use anexoj_importer::Trading212Source;
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::table::Language;

/// Build a capital-gains annex from a broker statement.
#[derive(Parser, Debug)]
#[command(name = "anexoj", version, about)]
struct Args {
    /// Statement file to read; stdin when omitted.
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Platform that produced the statement.
    #[arg(short, long, default_value = "trading212")]
    platform: String,

    /// Language of the table headers.
    #[arg(short, long, value_enum, default_value_t = Language::Pt)]
    language: Language,

    /// How to attribute fees and taxes when a sell splits across lots.
    #[arg(long, value_enum, default_value_t = FeeMode::Duplicate)]
    fees: FeeMode,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FeeMode {
    /// Count the whole fee on every partial match (historical behavior).
    Duplicate,
    /// Split fees proportionally to the matched quantity.
    Apportion,
}

impl From<FeeMode> for FeePolicy {
    fn from(mode: FeeMode) -> Self {
        match mode {
            FeeMode::Duplicate => Self::DuplicatePerMatch,
            FeeMode::Apportion => Self::ApportionByQuantity,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping");
                token.cancel();
            }
        }
    });

    let reader: Box<dyn Read + Send> = match &args.file {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("open statement: {}", path.display()))?,
        ),
        None => Box::new(io::stdin()),
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("build http client")?;
    let figi = Arc::new(OpenFigi::new(client));

    let mut source = match args.platform.as_str() {
        "trading212" => {
            Trading212Source::new(reader, figi).context("open trading212 statement")?
        }
        other => bail!("unsupported platform: {other}"),
    };

    let aggregator = Aggregator::new();
    build_report(&token, &mut source, &aggregator, args.fees.into()).await?;

    table::render(io::stdout().lock(), &aggregator, args.language)
        .context("render report table")?;

    info!("finished processing statement");
    Ok(())
}
