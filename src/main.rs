//! CLI entry point for the distribution-cost export.
//!
//! Connects to Snowflake, pulls `DM_DCST_SHOP_PRDT_M` rows per brand and
//! season, and writes one workbook per brand with raw and summary sheets.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use dcst_export::catalog::{BRANDS, Brand, Season, default_seasons, find_brand, unique_seasons};
use dcst_export::config::{ENV_FILES, WarehouseConfig, load_env_files};
use dcst_export::export::{ExportPlan, run_export_and_close};
use dcst_export::fetch::BasicClient;
use dcst_export::query::QueryMode;
use dcst_export::warehouse::SnowflakeSession;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "dcst_export")]
#[command(
    about = "Export distribution-cost rows from Snowflake into per-brand workbooks",
    long_about = None
)]
struct Cli {
    /// Brand code to export; repeat for several (default: all brands)
    #[arg(short, long = "brand", value_name = "CODE")]
    brands: Vec<String>,

    /// Season to export, e.g. 24S; repeat for several (default: 23S, 24S, 25S)
    #[arg(short, long = "season", value_name = "SEASON")]
    seasons: Vec<Season>,

    /// Directory the workbooks are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Directory searched for .env.local, then .env
    #[arg(long, default_value = ".")]
    env_dir: PathBuf,

    /// Query variant: with product classification, or table columns only
    #[arg(long, value_enum, default_value_t = QueryMode::ItemStd)]
    mode: QueryMode,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env_file = load_env_files(&cli.env_dir);
    let _file_guard = init_tracing();

    match &env_file {
        Some(path) => info!(path = %path.display(), "Environment file loaded"),
        None => warn!(
            dir = %cli.env_dir.display(),
            "None of {} found, using process environment only",
            ENV_FILES.join(", ")
        ),
    }

    if let Err(e) = run(cli).await {
        error!(error = %e, "Export failed");
        error!("{e:?}");
        return Err(e);
    }
    Ok(())
}

/// Logging setup: colored stderr + JSON rolling log file.
fn init_tracing() -> WorkerGuard {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/dcst_export.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("dcst_export.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(LevelFilter::INFO.into()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive(LevelFilter::DEBUG.into()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

async fn run(cli: Cli) -> Result<()> {
    let plan = ExportPlan {
        brands: resolve_brands(&cli.brands)?,
        seasons: if cli.seasons.is_empty() {
            default_seasons()
        } else {
            unique_seasons(&cli.seasons)
        },
        mode: cli.mode,
        output_dir: cli.output_dir,
        timestamp: Local::now().format("%Y%m%d_%H%M%S").to_string(),
    };
    info!(
        brands = ?plan.brands.iter().map(|b| b.code).collect::<Vec<_>>(),
        seasons = ?plan.seasons.iter().map(|s| s.code.as_str()).collect::<Vec<_>>(),
        mode = ?plan.mode,
        output_dir = %plan.output_dir.display(),
        "Starting DM_DCST_SHOP_PRDT_M export"
    );

    let config = WarehouseConfig::from_env().context("Invalid Snowflake configuration")?;
    let http = BasicClient::new(config.request_timeout)?;
    let session = SnowflakeSession::connect(http, &config)
        .await
        .context("Cannot connect to Snowflake")?;

    let reports = run_export_and_close(session, &plan).await?;
    let written = reports.iter().filter(|r| r.path.is_some()).count();
    for report in &reports {
        if let Some(path) = &report.path {
            info!(brand = report.brand.code, path = %path.display(), "Output file");
        }
    }
    info!(written, brands = reports.len(), "Export complete");
    Ok(())
}

fn resolve_brands(codes: &[String]) -> Result<Vec<Brand>> {
    if codes.is_empty() {
        return Ok(BRANDS.to_vec());
    }
    let mut brands = Vec::with_capacity(codes.len());
    for code in codes {
        let brand = find_brand(code)?;
        if !brands.contains(&brand) {
            brands.push(brand);
        }
    }
    Ok(brands)
}
