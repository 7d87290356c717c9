//! Plant Diagnosis CLI
//!
//! Diagnose a leaf photograph, inspect its feature vector, look up advisory
//! records and check which model tiers are installed.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use plant_diagnosis::backend::backend_name;
use plant_diagnosis::features::{self, feature_names};
use plant_diagnosis::preprocess::{normalize_raw, RawImage};
use plant_diagnosis::utils::format_percent;
use plant_diagnosis::utils::logging::{init_logging, LogConfig, LogLevel};
use plant_diagnosis::{
    AdvisoryTable, DiagnosisConfig, DiagnosisEngine, DiagnosisError, DiagnosisResponse,
    ErrorCategory, Severity, LIGHTWEIGHT_INPUT_SIZE,
};

/// Plant disease diagnosis from a leaf photograph
#[derive(Parser, Debug)]
#[command(name = "plant_diagnosis")]
#[command(author = "Warre Snaet")]
#[command(version)]
#[command(about = "Diagnose plant disease from a single image", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false", global = true)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error); overrides --verbose
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory holding the deep/ and lightweight/ artifacts
    #[arg(short, long, default_value = "models", global = true)]
    models_dir: PathBuf,

    /// JSON configuration file (overrides --models-dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Diagnose a single image
    Diagnose {
        /// Path to the image
        image: PathBuf,

        /// Print the response as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Print the lightweight-tier feature vector of an image
    Features {
        /// Path to the image
        image: PathBuf,
    },

    /// Show the advisory record for a label
    Advisory {
        /// Disease label, e.g. leaf_blight
        label: String,
    },

    /// Report which classifier tiers are installed
    Check,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = match (&cli.log_level, cli.verbose) {
        (Some(level), _) => LogConfig::with_level(LogLevel::parse(level)),
        (None, true) => LogConfig::verbose(),
        (None, false) => LogConfig::quiet(),
    };
    let _ = init_logging(&log_config);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// 2 for bad input, 3 when no model is installed, 1 otherwise
fn exit_code(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<DiagnosisError>().map(|e| e.category()) {
        Some(ErrorCategory::Client) => 2,
        Some(ErrorCategory::Unavailable) => 3,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Diagnose { image, json } => cmd_diagnose(&config, &image, json),
        Commands::Features { image } => cmd_features(&image),
        Commands::Advisory { label } => cmd_advisory(&config, &label),
        Commands::Check => cmd_check(&config),
    }
}

fn load_config(cli: &Cli) -> Result<DiagnosisConfig> {
    match &cli.config {
        Some(path) => {
            let config = DiagnosisConfig::load(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Ok(config)
        }
        None => Ok(DiagnosisConfig::from_models_dir(&cli.models_dir)),
    }
}

fn read_image(path: &Path) -> Result<RawImage> {
    RawImage::from_path(path).with_context(|| format!("reading {}", path.display()))
}

fn cmd_diagnose(config: &DiagnosisConfig, image: &Path, json: bool) -> Result<()> {
    info!("Diagnosing {}", image.display());

    let raw = read_image(image)?;
    let engine = DiagnosisEngine::from_config(config)?;
    let response = engine.diagnose(&raw)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

fn print_response(response: &DiagnosisResponse) {
    let severity = match response.severity {
        Severity::High => response.severity.to_string().red().bold(),
        Severity::Medium => response.severity.to_string().yellow().bold(),
        Severity::Low => response.severity.to_string().green().bold(),
    };

    println!("{}", "Diagnosis:".cyan().bold());
    println!("  Disease:    {}", response.disease.bold());
    println!("  Confidence: {}", format_percent(response.confidence));
    println!("  Severity:   {}", severity);
    println!("  Model:      {} tier", response.model);
    println!();
    print_advisory(&response.advisory, response.advisory_matched);
}

fn print_advisory(record: &plant_diagnosis::AdvisoryRecord, matched: bool) {
    println!("{}", "Advisory:".cyan().bold());
    if !matched {
        println!("  {}", "(no specific record for this label)".dimmed());
    }
    println!("  Treatment:     {}", record.treatment);
    println!("  Affected part: {}", record.affected_part);
    println!("  Symptoms:");
    for symptom in &record.symptoms {
        println!("    - {}", symptom);
    }
    println!("  Prevention:");
    for measure in &record.preventive_measures {
        println!("    - {}", measure);
    }
    println!("  Economic impact: {}", record.economic_impact);
}

fn cmd_features(image: &Path) -> Result<()> {
    let raw = read_image(image)?;
    let normalized = normalize_raw(&raw, LIGHTWEIGHT_INPUT_SIZE, LIGHTWEIGHT_INPUT_SIZE)?;
    let vector = features::extract(&normalized);

    println!(
        "{} ({} values)",
        "Feature vector:".cyan().bold(),
        vector.len()
    );
    for (i, (name, value)) in feature_names().iter().zip(vector.as_slice()).enumerate() {
        println!("  {:>3} {:<18} {:.6}", i, name, value);
    }
    Ok(())
}

fn cmd_advisory(config: &DiagnosisConfig, label: &str) -> Result<()> {
    let table = match &config.advisory_path {
        Some(path) => AdvisoryTable::load(path)?,
        None => AdvisoryTable::builtin(),
    };

    let found = table.lookup(label);
    println!("{} {}", "Label:".cyan().bold(), label);
    print_advisory(found.record(), found.is_known());

    if !found.is_known() {
        println!();
        println!("Known labels: {}", table.labels().join(", "));
    }
    Ok(())
}

fn cmd_check(config: &DiagnosisConfig) -> Result<()> {
    let engine = DiagnosisEngine::from_config(config)?;

    println!("{}", "Model Check:".cyan().bold());
    println!("  Backend: {}", backend_name());
    println!("  Deep weights:        {}", config.deep.paths.weights.display());
    println!("  Lightweight forest:  {}", config.lightweight.paths.weights.display());
    println!();

    let statuses = engine.availability();
    for status in &statuses {
        let mark = if status.available {
            "available".green()
        } else {
            "missing".red()
        };
        println!(
            "  {:<12} {:>3}x{:<3} {}",
            status.tier.to_string(),
            status.input_size,
            status.input_size,
            mark
        );
    }

    if statuses.iter().any(|s| s.available) {
        println!();
        println!("{}", "Ready to diagnose.".green().bold());
        Ok(())
    } else {
        Err(DiagnosisError::ModelUnavailable("no classifier artifacts found".into()).into())
    }
}
