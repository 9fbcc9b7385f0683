use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use iot_guardian::ingest::reader::read_table_from_path;
use iot_guardian::report::format::{format_alert, format_details, format_summary};
use iot_guardian::{DenseAutoencoder, Detector, GuardianConfig, PipelineError, ScanRecord};

#[derive(Parser)]
#[command(
    name = "iot-guardian",
    about = "Reconstruction-error anomaly detection for home IoT network flows",
    version,
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to $GUARDIAN_CONFIG, then ./guardian.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a CSV flow export for anomalous sequences
    Scan {
        /// CSV file with a header row
        #[arg(long)]
        input: PathBuf,

        /// Model weights file (overrides [model].path)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Print the scan record as JSON
        #[arg(long, conflicts_with = "alert")]
        json: bool,

        /// Print the alert notification body
        #[arg(long)]
        alert: bool,

        /// Number of anomalies listed in the alert body
        #[arg(long, default_value = "5")]
        top: usize,

        /// Also write the JSON scan record to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration and model, then print a status summary
    CheckConfig {
        /// Model weights file (overrides [model].path)
        #[arg(long)]
        model: Option<PathBuf>,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<GuardianConfig> {
    match path {
        Some(p) => GuardianConfig::load(p),
        None => GuardianConfig::load_or_default(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(pe) = e.downcast_ref::<PipelineError>() {
                eprintln!("Error: {}", pe);
                eprintln!("{}", pe.remediation());
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Scan {
            input,
            model,
            json,
            alert,
            top,
            output,
        } => {
            let model_path = model.unwrap_or_else(|| config.model.path.clone());
            let autoencoder = DenseAutoencoder::load(&model_path).map_err(PipelineError::from)?;
            let detector = Detector::new(config.pipeline.clone(), &autoencoder)?;

            tracing::info!(input = %input.display(), "Scanning flow export");
            let table = read_table_from_path(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let report = detector.scan(&table)?;
            let record = ScanRecord::new(input.display().to_string(), report);

            if let Some(path) = &output {
                let body = serde_json::to_string_pretty(&record)?;
                std::fs::write(path, body)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), "Wrote scan record");
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else if alert {
                print!("{}", format_alert(&record.report, top));
            } else {
                println!("\nHome IoT Guardian Scan");
                println!("Scan ID: {}", record.id);
                println!("{}", format_summary(&record.report));
                if record.report.has_anomalies() {
                    println!();
                    print!("{}", format_details(&record.report));
                }
                println!();
            }
        }
        Commands::CheckConfig { model } => {
            let model_path = model.unwrap_or_else(|| config.model.path.clone());
            let autoencoder = DenseAutoencoder::load(&model_path).map_err(PipelineError::from)?;
            let detector = Detector::new(config.pipeline.clone(), &autoencoder)?;

            println!("\nHome IoT Guardian Status");
            println!("{:<16} : {}", "Model", model_path.display());
            println!("{:<16} : {:.6}", "Threshold", config.pipeline.threshold);
            println!("{:<16} : {}", "Sequence length", config.pipeline.seq_length);
            println!(
                "{:<16} : {}",
                "Features",
                detector.normalizer().column_names().join(", ")
            );
            let bands = config.pipeline.severity;
            println!(
                "{:<16} : Low <= {}x, Medium <= {}x, High <= {}x, Critical above",
                "Severity bands", bands.low, bands.medium, bands.high
            );
            println!("Status           : OK");
            println!();
        }
    }

    Ok(())
}
