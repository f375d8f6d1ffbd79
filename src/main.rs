//! StepLedger CLI Entry Point
//!
//! Runs a scenario suite with every step timed, prints the timing report
//! and exits with the suite's status.
//!
//! # Usage
//!
//! ```bash
//! # Run a suite, persisting timings to step_timings.db
//! stepledger suite.yaml
//!
//! # Keep timings in memory only
//! stepledger suite.yaml --in-memory
//!
//! # Custom database, JSON report, 8 scenarios at a time
//! stepledger suite.yaml --db /tmp/timings.db --format json --parallel 8
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info};

use stepledger::hooks::TimingHooks;
use stepledger::ledger::TimingLedger;
use stepledger::runner::{load_suite, SuiteRunner};
use stepledger::store::SqliteStore;
use stepledger::{APP_NAME, VERSION};

/// Default timing database file.
const DEFAULT_DB_PATH: &str = "step_timings.db";

/// How the final report is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Text,
    Json,
}

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    suite_path: Option<String>,
    db_path: PathBuf,
    in_memory: bool,
    working_dir: Option<PathBuf>,
    max_parallel: Option<usize>,
    format: ReportFormat,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            suite_path: None,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            in_memory: false,
            working_dir: None,
            max_parallel: None,
            format: ReportFormat::Text,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: stepledger [OPTIONS] <SUITE_FILE>");
    println!();
    println!("Arguments:");
    println!("  <SUITE_FILE>        Path to scenario suite YAML file");
    println!();
    println!("Options:");
    println!("  --db PATH           Timing database (default: {})", DEFAULT_DB_PATH);
    println!("  --in-memory         Do not persist timings");
    println!("  --working-dir PATH  Working directory for step commands");
    println!("  --parallel N        Maximum concurrent scenarios (default: CPU count)");
    println!("  --format FORMAT     Report format: text or json (default: text)");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--in-memory" => {
                config.in_memory = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--db" => {
                config.db_path = PathBuf::from(next_value(args, &mut i, "--db")?);
            }
            "--working-dir" => {
                config.working_dir = Some(PathBuf::from(next_value(args, &mut i, "--working-dir")?));
            }
            "--parallel" => {
                let value = next_value(args, &mut i, "--parallel")?;
                let n: usize = value
                    .parse()
                    .map_err(|_| format!("Invalid parallel value: {}", value))?;
                config.max_parallel = Some(n);
            }
            "--format" => {
                config.format = match next_value(args, &mut i, "--format")? {
                    "text" => ReportFormat::Text,
                    "json" => ReportFormat::Json,
                    other => return Err(format!("Unknown report format: {}", other)),
                };
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.suite_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.suite_path = Some(arg.clone());
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Advances past an option and returns its value.
fn next_value<'a>(args: &'a [String], i: &mut usize, option: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", option))
}

/// Builds the ledger. Failing to open the store is fatal: nothing runs
/// with a half-initialized ledger.
fn build_ledger(config: &Config) -> Result<TimingLedger, Box<dyn std::error::Error>> {
    if config.in_memory {
        info!("Timings kept in memory only");
        return Ok(TimingLedger::in_memory());
    }

    let store = SqliteStore::open(&config.db_path)?;
    Ok(TimingLedger::with_store(store))
}

/// Main application flow. Returns the suite's exit status.
fn run() -> Result<u8, Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);

    let suite_path = config
        .suite_path
        .clone()
        .ok_or("No suite file given")?;

    let suite = load_suite(&suite_path)?;
    let ledger = Arc::new(build_ledger(&config)?);

    let mut runner = SuiteRunner::new(suite, Arc::new(TimingHooks::new(Arc::clone(&ledger))));
    if let Some(n) = config.max_parallel {
        runner.set_max_parallel(n);
    }
    if let Some(dir) = &config.working_dir {
        runner.set_working_dir(dir.clone());
    }

    let summary = runner.run();

    let report = ledger.report();
    match config.format {
        ReportFormat::Text => print!("{}", report),
        ReportFormat::Json => match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to render report: {}", e),
        },
    }

    // A close failure must not mask the suite's own status.
    if let Err(e) = ledger.close() {
        error!("Failed to close timing store: {}", e);
    }

    Ok(summary.exit_status())
}

fn main() -> ExitCode {
    match run() {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("stepledger")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = parse_arguments(&args(&["suite.yaml"])).unwrap();
        assert_eq!(config.suite_path.as_deref(), Some("suite.yaml"));
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert!(!config.in_memory);
        assert_eq!(config.format, ReportFormat::Text);
        assert!(config.max_parallel.is_none());
    }

    #[test]
    fn test_all_options() {
        let config = parse_arguments(&args(&[
            "suite.yaml",
            "--db",
            "/tmp/t.db",
            "--parallel",
            "8",
            "--format",
            "json",
            "--working-dir",
            "/tmp",
            "--verbose",
            "--in-memory",
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/t.db"));
        assert_eq!(config.max_parallel, Some(8));
        assert_eq!(config.format, ReportFormat::Json);
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp")));
        assert!(config.verbose);
        assert!(config.in_memory);
    }

    #[test]
    fn test_missing_option_value() {
        let err = parse_arguments(&args(&["--db"])).unwrap_err();
        assert!(err.contains("--db requires a value"));
    }

    #[test]
    fn test_bad_parallel() {
        assert!(parse_arguments(&args(&["--parallel", "many"])).is_err());
    }

    #[test]
    fn test_unknown_format() {
        assert!(parse_arguments(&args(&["--format", "xml"])).is_err());
    }

    #[test]
    fn test_second_positional_rejected() {
        assert!(parse_arguments(&args(&["a.yaml", "b.yaml"])).is_err());
    }

    #[test]
    fn test_unopenable_store_is_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: temp_dir.path().join("missing/dir/t.db"),
            ..Config::default()
        };
        assert!(build_ledger(&config).is_err());
    }

    #[test]
    fn test_in_memory_ledger() {
        let config = Config {
            in_memory: true,
            ..Config::default()
        };
        assert!(!build_ledger(&config).unwrap().is_persistent());
    }
}
