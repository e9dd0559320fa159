use analytics::ImpactEngine;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use core_types::AnalysisPayload;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// The main entry point for the uplift reporting tool.
fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => handle_analyze(args),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Computes launch-impact metrics for marketing initiatives from KPI payloads.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the metrics engine on a payload fixture and write the report JSON.
    Analyze(AnalyzeArgs),
}

#[derive(Parser)]
struct AnalyzeArgs {
    /// Path to the payload JSON fixture.
    #[arg(long)]
    payload: PathBuf,

    /// Explicit output path. Defaults to a timestamped file under the
    /// configured results directory.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Pretty-print the report JSON.
    #[arg(long)]
    pretty: bool,
}

// ==============================================================================
// Analyze Command Logic
// ==============================================================================

fn handle_analyze(args: AnalyzeArgs) -> Result<()> {
    let settings = configuration::load_settings().context("Failed to load settings")?;

    let raw = fs::read_to_string(&args.payload)
        .with_context(|| format!("Failed to read payload fixture {}", args.payload.display()))?;
    let payload: AnalysisPayload = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed payload in {}", args.payload.display()))?;

    info!(
        fixture = %args.payload.display(),
        initiatives = payload.initiatives.len(),
        reference_rows = payload.reference_metrics.len(),
        current_rows = payload.current_metrics.len(),
        "loaded payload"
    );

    let engine = ImpactEngine::with_sigma(settings.analysis.sigma);
    let report = engine.analyze(&payload).context("Analysis failed")?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };

    let out_path = match args.out {
        Some(path) => path,
        None => {
            // Timestamp goes into the filename only; the report itself is
            // deterministic for a given payload.
            fs::create_dir_all(&settings.output.results_dir).with_context(|| {
                format!("Failed to create {}", settings.output.results_dir.display())
            })?;
            let stem = args
                .payload
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "payload".to_string());
            let timestamp = Utc::now().format("%Y%m%dT%H%M%SZ");
            settings
                .output
                .results_dir
                .join(format!("final_report_{stem}_{timestamp}.json"))
        }
    };

    fs::write(&out_path, &json)
        .with_context(|| format!("Failed to write report to {}", out_path.display()))?;
    info!(report = %out_path.display(), "report written");

    // Human-readable summary of what the narrative stage will receive.
    for (initiative_id, slice) in report.iter() {
        let name = slice.initiative_name.as_deref().unwrap_or("(no initiative in window)");
        println!("{initiative_id} — {name}");
        for (code, record) in &slice.overall.metrics {
            println!(
                "  {code}: avg {} ({}), overall_sig={}{}",
                record.current_avg,
                record.change_percent(),
                record.overall_sig,
                match record.initiative_sig {
                    Some(sig) => format!(", initiative_sig={sig}"),
                    None => String::new(),
                }
            );
        }
    }

    Ok(())
}
