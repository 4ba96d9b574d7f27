//! Nebula CLI - run bytecode scripts
//!
//! Loads every script given on the command line into one interpreter, runs
//! the auto-exec functions to completion and exits with the error code of
//! the first fatal error (0 on success).

use std::io::BufRead;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use nebula_api::error::EXIT_DATA_ERROR;
use nebula_api::{
    init_config, prepare, ErrorReport, InterpreterState, LoadedScript, NebulaError, RunConfig,
};
use nebula_config::LogLevel;
use tracing::{debug, info};

mod config;
mod logging;

use crate::config::CliConfig;
use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "nebula", about = "Nebula bytecode VM", version)]
struct Cli {
    /// Script files; namespaces must be unique across them
    #[arg(value_name = "SCRIPTS", required = true)]
    scripts: Vec<PathBuf>,

    /// JSON configuration file (vm, log, debug_symbols)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Start paused; execution begins when Enter is pressed
    #[arg(long)]
    paused: bool,

    /// Round-robin time slice per logical thread, in milliseconds
    #[arg(long, value_name = "MS")]
    time_slice: Option<u64>,

    /// `.ndbg` debug symbol file for source lines in error reports (repeatable)
    #[arg(long, value_name = "FILE")]
    debug_symbols: Vec<PathBuf>,

    /// Default log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", value_parser = parse_log_level)]
    log_level: Option<LogLevel>,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Also append logs to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Print errors as JSON reports on stderr
    #[arg(long)]
    json_errors: bool,
}

fn parse_log_level(text: &str) -> Result<LogLevel, String> {
    LogLevel::parse(text).ok_or_else(|| format!("unknown log level '{text}'"))
}

fn main() {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => match CliConfig::read(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(EXIT_DATA_ERROR);
            }
        },
        None => CliConfig::default(),
    };
    let run_config = build_run_config(&cli, file_config);

    if let Err(e) = logging::init_with_file(&run_config.log, cli.log_format, cli.log_file.as_deref())
    {
        eprintln!("Error: cannot initialise logging: {e}");
        process::exit(EXIT_DATA_ERROR);
    }
    init_config(run_config.clone());

    process::exit(run(&cli, &run_config));
}

/// Flags override the config file
fn build_run_config(cli: &Cli, file: CliConfig) -> RunConfig {
    let mut config = RunConfig {
        vm: file.vm,
        capture_stdout: false,
        debug_symbols: file.debug_symbols,
        log: file.log,
    };
    if cli.paused {
        config.vm.start_paused = true;
    }
    if let Some(ms) = cli.time_slice {
        config.vm.time_slice_ms = ms;
    }
    config.debug_symbols.extend(cli.debug_symbols.iter().cloned());
    if let Some(level) = cli.log_level {
        config.log.global = level;
    }
    config
}

/// Returns the process exit code
fn run(cli: &Cli, config: &RunConfig) -> i32 {
    let scripts = match load_scripts(&cli.scripts) {
        Ok(scripts) => scripts,
        Err(e) => return report_error(&e, cli.json_errors),
    };

    let session = match prepare(scripts, config) {
        Ok(session) => session,
        Err(e) => return report_error(&e, cli.json_errors),
    };

    if config.vm.start_paused {
        eprintln!("nebula: paused, press Enter to start");
        let control = session.control();
        std::thread::spawn(move || {
            let mut line = String::new();
            let _ = std::io::stdin().lock().read_line(&mut line);
            control.resume();
        });
    }

    let output = session.run();
    match (&output.exit_state, &output.error) {
        (InterpreterState::Abort, Some(stack)) => {
            if cli.json_errors {
                let report = NebulaError::Runtime(stack.clone()).to_report();
                eprintln!("{}", report.to_json());
            } else {
                eprint!("{}", stack.as_text());
            }
        }
        _ => info!(target: "nebula::cli", "all threads finished"),
    }
    output.exit_code()
}

fn load_scripts(paths: &[PathBuf]) -> Result<Vec<LoadedScript>, NebulaError> {
    paths
        .iter()
        .map(|path| {
            let loaded = nebula_api::load_file(path)?;
            for warning in &loaded.report.warnings {
                eprintln!("{}: {}", path.display(), warning);
            }
            debug!(target: "nebula::cli", path = %path.display(), "script loaded");
            Ok(loaded)
        })
        .collect()
}

fn report_error(error: &NebulaError, json: bool) -> i32 {
    let report: ErrorReport = error.to_report();
    if json {
        eprintln!("{}", report.to_json());
    } else {
        eprintln!("{report}");
    }
    error.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_config::VmConfig;

    #[test]
    fn test_cli_flags_override_config_file() {
        let cli = Cli::parse_from([
            "nebula",
            "--time-slice",
            "0",
            "--paused",
            "--log-level",
            "DEBUG",
            "--debug-symbols",
            "b.ndbg",
            "main.nbl",
        ]);
        let file = CliConfig {
            vm: VmConfig {
                time_slice_ms: 50,
                ..VmConfig::default()
            },
            debug_symbols: vec![PathBuf::from("a.ndbg")],
            ..CliConfig::default()
        };

        let config = build_run_config(&cli, file);
        assert_eq!(config.vm.time_slice_ms, 0);
        assert!(config.vm.start_paused);
        assert_eq!(config.log.global, LogLevel::Debug);
        assert_eq!(
            config.debug_symbols,
            vec![PathBuf::from("a.ndbg"), PathBuf::from("b.ndbg")]
        );
        assert_eq!(cli.scripts, vec![PathBuf::from("main.nbl")]);
    }

    #[test]
    fn test_config_file_used_without_flags() {
        let cli = Cli::parse_from(["nebula", "a.nbl", "b.nbl"]);
        let file = CliConfig {
            vm: VmConfig {
                time_slice_ms: 3,
                ..VmConfig::default()
            },
            ..CliConfig::default()
        };
        let config = build_run_config(&cli, file);
        assert_eq!(config.vm.time_slice_ms, 3);
        assert!(!config.vm.start_paused);
        assert_eq!(cli.log_format, LogFormat::Compact);
        assert_eq!(cli.scripts.len(), 2);
    }

    #[test]
    fn test_bad_log_level_rejected() {
        assert!(Cli::try_parse_from(["nebula", "--log-level", "loud", "a.nbl"]).is_err());
        assert!(Cli::try_parse_from(["nebula"]).is_err());
    }

    #[test]
    fn test_run_reports_error_code() {
        logging::init_test_logger();
        let dir = std::env::temp_dir().join(format!("nebula-cli-run-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let script = dir.join("div.nbl");
        std::fs::write(
            &script,
            ".namespace \"Main\"\n.func void Main ( ) ;autoexec\n{\n0000 Ldc_i4 1\n0001 Ldc_i4_0\n0002 Div\n0003 Ret\n}\n",
        )
        .unwrap();

        let cli = Cli::parse_from([std::ffi::OsStr::new("nebula"), script.as_os_str()]);
        let config = build_run_config(&cli, CliConfig::default());
        assert_eq!(run(&cli, &config), 6);

        let missing = Cli::parse_from(["nebula", "/nonexistent/x.nbl"]);
        assert_eq!(
            run(&missing, &config),
            nebula_api::error::EXIT_NO_INPUT
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
