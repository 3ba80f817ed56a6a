//! Command-line interface.
//!
//! `generate` runs one batch against the generation backend and writes the
//! exports, `serve` runs the HTTP API, `formats` lists the report formats.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::config::{self, AppConfig, ConfigError};
use crate::export::ExportError;
use crate::orchestrator::OrchestratorError;
use crate::report::{ReportFormat, StoreError};
use crate::stream::BackendError;

pub mod formats;
pub mod generate;
pub mod serve;

#[derive(Parser)]
#[command(
    name = "incident-summariser",
    version = env!("CARGO_PKG_VERSION"),
    about = "Turn incident-chat notes into executive summaries, timelines and post-mortems",
    long_about = "Streams one generation job per report format from the generation backend, \
                  tracks each format's progress independently, and exports the finished \
                  reports as one paginated PDF."
)]
pub struct Cli {
    /// Base URL of the generation backend
    #[arg(long, global = true, env = config::ENV_BACKEND_URL)]
    pub backend_url: Option<String>,

    /// Seconds without data before a stream is abandoned
    #[arg(long, global = true, value_name = "SECS")]
    pub stall_timeout_secs: Option<u64>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate reports from a notes file and export them
    Generate(generate::GenerateArgs),
    /// Run the HTTP API
    Serve(serve::ServeArgs),
    /// List the available report formats
    Formats,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot read {path}: {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown report format: {0}")]
    UnknownFormat(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("{} of {} reports failed: {}", .failed.len(), .total, join(.failed))]
    Incomplete {
        failed: Vec<ReportFormat>,
        total: usize,
    },

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Server(#[from] crate::api::ServerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// 2 for bad invocations, 1 for everything that failed at runtime.
    pub fn exit_status(&self) -> u8 {
        match self {
            CliError::Config(_)
            | CliError::Input { .. }
            | CliError::UnknownFormat(_)
            | CliError::Orchestrator(OrchestratorError::BlankInput | OrchestratorError::NoFormats) => 2,
            _ => 1,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}

fn join(formats: &[ReportFormat]) -> String {
    formats
        .iter()
        .map(ReportFormat::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Cli {
    pub async fn run(self) -> Result<(), CliError> {
        setup_logging(self.verbose, self.quiet);
        let config = self.app_config()?;

        match self.command {
            Commands::Generate(args) => generate::execute(args, &config, self.quiet).await,
            Commands::Serve(args) => serve::execute(args, &config).await,
            Commands::Formats => {
                formats::execute();
                Ok(())
            }
        }
    }

    /// Environment settings with global flags layered on top.
    fn app_config(&self) -> Result<AppConfig, CliError> {
        let mut config = AppConfig::from_env()?;
        if let Some(url) = &self.backend_url {
            config = config.with_backend_url(url)?;
        }
        if let Some(secs) = self.stall_timeout_secs {
            config = config.with_stall_timeout_secs(secs)?;
        }
        Ok(config)
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            return tracing_subscriber::EnvFilter::new("error");
        }
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("incident_summariser=warn"),
            1 => tracing_subscriber::EnvFilter::new(config::default_log_filter()),
            2 => tracing_subscriber::EnvFilter::new("incident_summariser=debug,tower_http=debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    // Logs go to stderr; stdout carries command output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_generate_with_repeated_formats() {
        let cli = Cli::try_parse_from([
            "incident-summariser",
            "generate",
            "--input",
            "notes.txt",
            "--format",
            "executive_summary",
            "--format",
            "resolution,action_items",
            "--markdown",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.input, "notes.txt");
                assert_eq!(args.formats.len(), 3);
                assert!(args.markdown);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "incident-summariser",
            "serve",
            "--bind",
            "0.0.0.0:9000",
            "--backend-url",
            "http://gen:5000",
            "--stall-timeout-secs",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.backend_url.as_deref(), Some("http://gen:5000"));
        assert_eq!(cli.stall_timeout_secs, Some(30));
        let config = cli.app_config().unwrap();
        assert_eq!(config.backend_url, "http://gen:5000");
        assert_eq!(config.stall_timeout.as_secs(), 30);
    }

    #[test]
    fn zero_stall_timeout_is_a_usage_error() {
        let cli = Cli::try_parse_from(["incident-summariser", "formats", "--stall-timeout-secs", "0"])
            .unwrap();
        let err = cli.app_config().unwrap_err();
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn incomplete_batch_message_lists_formats() {
        let err = CliError::Incomplete {
            failed: vec![ReportFormat::Resolution, ReportFormat::ActionItems],
            total: 8,
        };
        assert_eq!(err.to_string(), "2 of 8 reports failed: resolution, action_items");
        assert_eq!(err.exit_status(), 1);
    }
}
