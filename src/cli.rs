//! Command-line interface for tabshell.
//!
//! This module handles CLI argument parsing and the small subcommands that
//! finish without running a scenario.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use tabshell_config::Config;

use crate::scenario::Scenario;

/// tabshell - drive simulated browser windows through their close lifecycle
#[derive(Parser)]
#[command(name = "tabshell")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Scenario file to run
    #[arg(value_name = "SCENARIO")]
    pub scenario: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Do not wait on the wall clock; jump from deadline to deadline
    #[arg(long)]
    pub fast: bool,

    /// Set debug log level (overrides config and RUST_LOG)
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevelArg>,
}

/// Log level argument for CLI
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevelArg {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevelArg {
    /// Convert to `log::LevelFilter`
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevelArg::Off => log::LevelFilter::Off,
            LogLevelArg::Error => log::LevelFilter::Error,
            LogLevelArg::Warn => log::LevelFilter::Warn,
            LogLevelArg::Info => log::LevelFilter::Info,
            LogLevelArg::Debug => log::LevelFilter::Debug,
            LogLevelArg::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the default config file
    InitConfig {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Parse and validate a scenario without running it
    CheckScenario {
        /// Scenario file to check
        path: PathBuf,
    },
}

/// Runtime options passed from CLI to the application
#[derive(Clone, Debug, Default)]
pub struct RuntimeOptions {
    /// Scenario to run
    pub scenario: PathBuf,
    /// Config file override
    pub config: Option<PathBuf>,
    /// Run on virtual time only
    pub fast: bool,
    /// Log level override from CLI
    pub log_level: Option<log::LevelFilter>,
}

/// Result of CLI processing
pub enum CliResult {
    /// Continue with a scenario run
    Continue(RuntimeOptions),
    /// Exit with the given code (subcommand completed)
    Exit(i32),
}

/// Process CLI arguments and handle subcommands
pub fn process_cli() -> CliResult {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::InitConfig { force }) => {
            let path = cli.config.unwrap_or_else(Config::config_path);
            exit_code(init_config(&path, force).map(|()| {
                println!("Wrote default config to {}", path.display());
            }))
        }
        Some(Commands::CheckScenario { path }) => exit_code(Scenario::load(&path).map(|scenario| {
            println!(
                "{}: {} window(s), {} step(s)",
                path.display(),
                scenario.windows.len(),
                scenario.steps.len()
            );
        })),
        None => {
            let Some(scenario) = cli.scenario else {
                eprintln!("tabshell: error: a scenario file is required (see --help)");
                return CliResult::Exit(2);
            };
            CliResult::Continue(RuntimeOptions {
                scenario,
                config: cli.config,
                fast: cli.fast,
                log_level: cli.log_level.map(|l| l.to_level_filter()),
            })
        }
    }
}

fn exit_code(result: anyhow::Result<()>) -> CliResult {
    match result {
        Ok(()) => CliResult::Exit(0),
        Err(e) => {
            eprintln!("tabshell: error: {e:#}");
            CliResult::Exit(1)
        }
    }
}

/// Write the default config to `path`, refusing to overwrite unless `force`.
pub fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default().save_to(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scenario_with_flags_parses() {
        let cli = Cli::try_parse_from(["tabshell", "demo.yaml", "--fast", "--log-level", "debug"])
            .unwrap();
        assert_eq!(cli.scenario, Some(PathBuf::from("demo.yaml")));
        assert!(cli.fast);
        assert_eq!(
            cli.log_level.map(LogLevelArg::to_level_filter),
            Some(log::LevelFilter::Debug)
        );
    }

    #[test]
    fn test_init_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        init_config(&path, false).unwrap();
        assert!(init_config(&path, false).is_err());
        init_config(&path, true).unwrap();
    }
}
