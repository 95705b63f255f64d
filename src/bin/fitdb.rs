//! fitdb CLI - Command-line interface for fitdb
//!
//! Commands:
//! - init: Create the data directory and activity store
//! - import: Decode every FIT file below the data directory and store activities
//! - inspect: Decode a single FIT file and print the result
//! - doctor: Diagnose configuration and storage health

use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use walkdir::WalkDir;

use fitdb::logging::{LogFormat, LoggingConfig};
use fitdb::pipeline::{decode_file, decode_file_with_records, is_fit_file, FitProcessor};
use fitdb::types::{IngestReport, RecordDetail};
use fitdb::{Config, IngestError, MemoryStore, NdjsonStore, FITDB_VERSION, PRODUCER_NAME};

/// fitdb - Ingest FIT activity files into a local activity store
#[derive(Parser)]
#[command(name = "fitdb")]
#[command(version = FITDB_VERSION)]
#[command(about = "Ingest FIT activity files into a local activity store", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format: pretty, compact or json
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and an empty activity store
    Init,

    /// Decode every FIT file below the data directory and store the activities
    Import {
        /// Root directory to scan (overrides config)
        #[arg(long)]
        data_path: Option<PathBuf>,

        /// Activity store file (overrides config)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Decode without writing to the store
        #[arg(long)]
        dry_run: bool,

        /// Output report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a single FIT file and print header and summary
    Inspect {
        /// FIT file to decode
        file: PathBuf,

        /// Include every decoded record
        #[arg(long)]
        records: bool,
    },

    /// Diagnose configuration and storage health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), FitdbCliError> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());
    let format = match cli.log_format.as_deref().or(config.log_format.as_deref()) {
        Some(name) => name.parse()?,
        None => LogFormat::detect(),
    };
    LoggingConfig::new(level, format).init()?;

    match cli.command {
        Commands::Init => cmd_init(&config),
        Commands::Import {
            data_path,
            store,
            dry_run,
            json,
        } => {
            let data_path = data_path.unwrap_or_else(|| config.data_path.clone());
            let store_path = store.unwrap_or_else(|| config.store_path.clone());
            cmd_import(&data_path, &store_path, dry_run, json)
        }
        Commands::Inspect { file, records } => cmd_inspect(&file, records),
        Commands::Doctor { json } => cmd_doctor(&config, cli.config.as_deref(), json),
    }
}

fn cmd_init(config: &Config) -> Result<(), FitdbCliError> {
    config.ensure_data_dir()?;
    let store = NdjsonStore::open(&config.store_path)?;

    println!("Data directory: {}", config.data_path.display());
    println!("Activity store: {}", store.path().display());
    println!("Initialized successfully");
    Ok(())
}

fn cmd_import(
    data_path: &Path,
    store_path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<(), FitdbCliError> {
    let report = if dry_run {
        FitProcessor::new(MemoryStore::new()).process_tree(data_path)?
    } else {
        FitProcessor::new(NdjsonStore::open(store_path)?).process_tree(data_path)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, dry_run);
    }

    Ok(())
}

fn print_report(report: &IngestReport, dry_run: bool) {
    println!("Import Report{}", if dry_run { " (dry run)" } else { "" });
    println!("=============");
    println!("FIT files:          {}", report.files_seen);
    println!("Processed:          {}", report.processed);
    println!("Failed:             {}", report.failed);
    println!("Skipped (non-FIT):  {}", report.skipped);
    println!("Early terminations: {}", report.early_terminations);

    if !report.failures.is_empty() {
        println!("\nFailures:");
        for failure in &report.failures {
            println!(
                "  - {} [{}]: {}",
                failure.path.display(),
                failure.kind.as_str(),
                failure.message
            );
        }
    }
}

fn cmd_inspect(file: &Path, records: bool) -> Result<(), FitdbCliError> {
    let output = if records {
        let (decoded, records) = decode_file_with_records(file)?;
        let details: Vec<RecordDetail> = records.iter().map(RecordDetail::from).collect();
        let mut output = serde_json::to_value(&decoded)?;
        output["records"] = serde_json::to_value(details)?;
        output
    } else {
        serde_json::to_value(decode_file(file)?)?
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn cmd_doctor(
    config: &Config,
    config_path: Option<&Path>,
    json: bool,
) -> Result<(), FitdbCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "fitdb_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("fitdb version {}", FITDB_VERSION),
    });

    checks.push(match config_path {
        Some(path) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!("Loaded {}", path.display()),
        },
        None => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "No config file given, using defaults".to_string(),
        },
    });

    checks.push(if config.data_path.is_dir() {
        let fit_files = count_fit_files(&config.data_path);
        DoctorCheck {
            name: "data_path".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "{} exists ({} FIT files)",
                config.data_path.display(),
                fit_files
            ),
        }
    } else {
        DoctorCheck {
            name: "data_path".to_string(),
            status: CheckStatus::Error,
            message: format!(
                "{} is not a directory (run 'fitdb init')",
                config.data_path.display()
            ),
        }
    });

    // Open without create so the check leaves no file behind
    let store_check = if config.store_path.exists() {
        match OpenOptions::new().append(true).open(&config.store_path) {
            Ok(_) => DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Ok,
                message: format!("{} is writable", config.store_path.display()),
            },
            Err(e) => DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot write {}: {}", config.store_path.display(), e),
            },
        }
    } else {
        DoctorCheck {
            name: "store".to_string(),
            status: CheckStatus::Warning,
            message: format!(
                "{} does not exist yet (created on first import)",
                config.store_path.display()
            ),
        }
    };
    checks.push(store_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FITDB_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("fitdb Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(FitdbCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn count_fit_files(root: &Path) -> usize {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_fit_file(e.path()))
        .count()
}

// Error types

#[derive(Debug)]
enum FitdbCliError {
    Ingest(IngestError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<IngestError> for FitdbCliError {
    fn from(e: IngestError) -> Self {
        FitdbCliError::Ingest(e)
    }
}

impl From<serde_json::Error> for FitdbCliError {
    fn from(e: serde_json::Error) -> Self {
        FitdbCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FitdbCliError> for CliError {
    fn from(e: FitdbCliError) -> Self {
        match e {
            FitdbCliError::Ingest(e) => {
                let (code, hint) = match &e {
                    IngestError::RootUnreadable { .. } => {
                        ("ROOT_UNREADABLE", "Check the data path or run 'fitdb init'")
                    }
                    IngestError::Config(_) => ("CONFIG_ERROR", "Check the configuration file"),
                    IngestError::Storage(_) => ("STORAGE_ERROR", "Check the activity store path"),
                    IngestError::InvalidMagic { .. } | IngestError::TruncatedInput { .. } => {
                        ("DECODE_ERROR", "The file is not a valid FIT file")
                    }
                    IngestError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    _ => ("INGEST_ERROR", "Run 'fitdb doctor' for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            FitdbCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            FitdbCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
