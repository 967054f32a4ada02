//! hsnap - Command-line interface for Health Snapshot
//!
//! Commands:
//! - fetch: Run the permission handshake and one fetch cycle against a fixture
//! - validate: Check a fixture document and report record counts
//! - doctor: Diagnose configuration and provider health
//! - scopes: Print the requested permission set

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use health_snapshot::calendar::{parse_date, DaySelection};
use health_snapshot::types::MetricKind;
use health_snapshot::{
    AggregatorConfig, AuthorizationState, ComputeError, FixtureGateway, HealthDataOrchestrator,
    HealthGateway, HEALTH_PERMISSIONS, PRODUCER_NAME, VERSION,
};
use tracing_subscriber::EnvFilter;

/// hsnap - Aggregate one day of health records into a snapshot
#[derive(Parser)]
#[command(name = "hsnap")]
#[command(author = "Synheart AI Inc")]
#[command(version = VERSION)]
#[command(about = "Aggregate a day of health records into a snapshot", long_about = None)]
struct Cli {
    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a snapshot for one day from a fixture provider
    Fetch {
        /// Fixture document (JSON)
        #[arg(short, long)]
        fixture: PathBuf,

        /// Day to fetch (YYYY-MM-DD), defaults to today at the configured offset
        #[arg(long)]
        date: Option<String>,

        /// Days to move from the selected date (negative for the past)
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        offset_days: i64,

        /// Aggregator configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Validate a fixture document
    Validate {
        /// Fixture document (JSON)
        #[arg(short, long)]
        fixture: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and provider health
    Doctor {
        /// Fixture document used as the provider
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Aggregator configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the permission scopes requested at activation
    Scopes {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Single-line JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), HsnapCliError> {
    match cli.command {
        Commands::Fetch {
            fixture,
            date,
            offset_days,
            config,
            output_format,
        } => {
            cmd_fetch(
                &fixture,
                date.as_deref(),
                offset_days,
                config.as_deref(),
                output_format,
            )
            .await
        }

        Commands::Validate { fixture, json } => cmd_validate(&fixture, json),

        Commands::Doctor {
            fixture,
            config,
            json,
        } => cmd_doctor(fixture.as_deref(), config.as_deref(), json).await,

        Commands::Scopes { json } => cmd_scopes(json),
    }
}

fn load_config(path: Option<&Path>) -> Result<AggregatorConfig, ComputeError> {
    match path {
        Some(path) => AggregatorConfig::from_file(path),
        None => Ok(AggregatorConfig::default()),
    }
}

async fn cmd_fetch(
    fixture: &Path,
    date: Option<&str>,
    offset_days: i64,
    config: Option<&Path>,
    output_format: OutputFormat,
) -> Result<(), HsnapCliError> {
    let config = load_config(config)?;
    let gateway = Arc::new(FixtureGateway::from_file(fixture)?);

    let selection = match date {
        Some(raw) => DaySelection::new(parse_date(raw)?),
        None => DaySelection::today(config.utc_offset()?),
    };
    let target = selection.shift(offset_days)?;

    let orchestrator = HealthDataOrchestrator::new(gateway, config, target.date())?;
    let state = orchestrator.activate().await;

    let snapshot = orchestrator.snapshot();
    let output = match output_format {
        OutputFormat::Json => serde_json::to_string(&*snapshot)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&*snapshot)?,
    };
    println!("{}", output);

    if state == AuthorizationState::Authorized {
        Ok(())
    } else {
        Err(HsnapCliError::NotAuthorized)
    }
}

fn cmd_validate(fixture: &Path, json: bool) -> Result<(), HsnapCliError> {
    let gateway = FixtureGateway::from_file(fixture)?;
    let document = gateway.document();
    let records = document.record_counts();

    let mut injected_failures: Vec<MetricKind> = document.failures.keys().copied().collect();
    injected_failures.sort();

    let report = ValidationReport {
        fixture: fixture.display().to_string(),
        available: document.available,
        authorized: document.authorized,
        total_records: records.values().sum(),
        injected_failures,
        records,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Fixture Report");
        println!("==============");
        println!("Fixture:    {}", report.fixture);
        println!("Available:  {}", report.available);
        println!("Authorized: {}", report.authorized);
        println!("Records:    {}", report.total_records);
        println!();
        for (kind, count) in &report.records {
            println!("  {:<16} {}", kind.as_str(), count);
        }
        if !report.injected_failures.is_empty() {
            println!("\nInjected failures:");
            for kind in &report.injected_failures {
                println!("  - {}", kind);
            }
        }
    }

    Ok(())
}

async fn cmd_doctor(
    fixture: Option<&Path>,
    config: Option<&Path>,
    json: bool,
) -> Result<(), HsnapCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck::ok("version", format!("hsnap version {}", VERSION)));

    let config_check = match load_config(config) {
        Ok(loaded) => DoctorCheck::ok(
            "config",
            format!(
                "utc offset {}, clock format {:?}",
                loaded.utc_offset, loaded.clock_format
            ),
        ),
        Err(e) => DoctorCheck::error("config", format!("Invalid configuration: {}", e)),
    };
    checks.push(config_check);

    if let Some(path) = fixture {
        match FixtureGateway::from_file(path) {
            Ok(gateway) => {
                checks.push(DoctorCheck::ok(
                    "fixture",
                    format!(
                        "Fixture valid ({} records)",
                        gateway.document().record_counts().values().sum::<usize>()
                    ),
                ));
                checks.extend(provider_checks(&gateway).await);
            }
            Err(e) => checks.push(DoctorCheck::error(
                "fixture",
                format!("Cannot load fixture: {}", e),
            )),
        }
    } else {
        checks.push(DoctorCheck::warning(
            "fixture",
            "No fixture given, provider checks skipped".to_string(),
        ));
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck::ok("stdin", "stdin is a TTY (interactive mode)".to_string())
    } else {
        DoctorCheck::ok("stdin", "stdin is a pipe".to_string())
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("hsnap Doctor Report");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(HsnapCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

async fn provider_checks<G: HealthGateway>(gateway: &G) -> Vec<DoctorCheck> {
    let availability = match gateway.is_available().await {
        Ok(true) => DoctorCheck::ok("availability", "Provider available".to_string()),
        Ok(false) => DoctorCheck::error("availability", "Provider not available".to_string()),
        Err(e) => DoctorCheck::error("availability", format!("Availability check failed: {}", e)),
    };

    let authorization = match gateway.request_authorization(&HEALTH_PERMISSIONS).await {
        Ok(()) => DoctorCheck::ok(
            "authorization",
            format!("{} read scopes granted", HEALTH_PERMISSIONS.read.len()),
        ),
        Err(e) => DoctorCheck::error("authorization", e.to_string()),
    };

    vec![availability, authorization]
}

fn cmd_scopes(json: bool) -> Result<(), HsnapCliError> {
    let read: Vec<&str> = HEALTH_PERMISSIONS.read.iter().map(|p| p.as_str()).collect();
    let write: Vec<&str> = HEALTH_PERMISSIONS.write.iter().map(|p| p.as_str()).collect();

    if json {
        let scopes = serde_json::json!({ "read": read, "write": write });
        println!("{}", serde_json::to_string_pretty(&scopes)?);
    } else {
        println!("Read scopes:");
        for scope in &read {
            println!("  - {}", scope);
        }
        println!("Write scopes: {}", if write.is_empty() { "none".to_string() } else { write.join(", ") });
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum HsnapCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NotAuthorized,
    DoctorFailed,
}

impl From<io::Error> for HsnapCliError {
    fn from(e: io::Error) -> Self {
        HsnapCliError::Io(e)
    }
}

impl From<ComputeError> for HsnapCliError {
    fn from(e: ComputeError) -> Self {
        match e {
            ComputeError::Io(e) => HsnapCliError::Io(e),
            other => HsnapCliError::Compute(other),
        }
    }
}

impl From<serde_json::Error> for HsnapCliError {
    fn from(e: serde_json::Error) -> Self {
        HsnapCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<HsnapCliError> for CliError {
    fn from(e: HsnapCliError) -> Self {
        match e {
            HsnapCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            HsnapCliError::Compute(e) => {
                let hint = match &e {
                    ComputeError::JsonError(_) => "Ensure the fixture matches the fixture document format",
                    ComputeError::ConfigError(_)
                    | ComputeError::InvalidUtcOffset(_)
                    | ComputeError::InvalidClockFormat(_) => "Run 'hsnap doctor --config <file>' for details",
                    _ => "Dates use the YYYY-MM-DD format",
                };
                CliError {
                    code: "INPUT_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            HsnapCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            HsnapCliError::NotAuthorized => CliError {
                code: "NOT_AUTHORIZED".to_string(),
                message: "Health data access was not granted; the snapshot is empty".to_string(),
                hint: Some("Check the fixture's available and authorized flags".to_string()),
            },
            HsnapCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    fixture: String,
    available: bool,
    authorized: bool,
    total_records: usize,
    records: BTreeMap<MetricKind, usize>,
    injected_failures: Vec<MetricKind>,
}

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

impl DoctorCheck {
    fn ok(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message,
        }
    }

    fn warning(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message,
        }
    }

    fn error(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message,
        }
    }
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
