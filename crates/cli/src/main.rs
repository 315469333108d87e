// impactlens CLI - change-impact spreadsheet summaries

mod analyze;
mod exit_codes;
mod render;
mod util;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use impactlens_analysis::{AnalysisConfig, AnalysisError};

use analyze::{AnalyzeArgs, InputArgs};
use exit_codes::{analysis_exit_code, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "impactlens")]
#[command(about = "Summarise a change-impact assessment spreadsheet by stakeholder group")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Log debug details (sheet selection, column matching) to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a change-impact register: charts, insights, optional Excel report
    #[command(after_help = "\
Examples:
  impactlens analyze impacts.xlsx
  impactlens analyze impacts.xlsx --report summary.xlsx
  impactlens analyze impacts.xlsx --json > analysis.json
  impactlens analyze impacts.csv --keep-duplicates --top 5
  impactlens analyze impacts.xlsx --sheet 'Draft v2' --header-row 3
  cat impacts.xlsx | impactlens analyze - --format xlsx")]
    Analyze(AnalyzeArgs),

    /// Show the selected sheet and how its headers map to column roles
    #[command(after_help = "\
Examples:
  impactlens columns impacts.xlsx
  impactlens columns impacts.xlsx --json
  impactlens columns impacts.ods --config impactlens.toml")]
    Columns {
        #[command(flatten)]
        input: InputArgs,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration as TOML
    #[command(after_help = "\
Examples:
  impactlens config > impactlens.toml
  impactlens analyze impacts.xlsx --config impactlens.toml")]
    Config,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("IMPACTLENS_COMMIT"), ")",
        "\ntarget:  ", env!("IMPACTLENS_TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            // No subcommand = show usage
            eprintln!("Usage: impactlens <command> [options]");
            eprintln!("       impactlens --help for more information");
            Ok(())
        }
        Some(Commands::Analyze(args)) => analyze::cmd_analyze(args),
        Some(Commands::Columns { input, json }) => analyze::cmd_columns(input, json),
        Some(Commands::Config) => cmd_config(),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// `RUST_LOG` wins when set. Otherwise errors only, or debug with `--verbose`.
/// Analysis warnings are part of the report itself, so they are not logged twice.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "error" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn cmd_config() -> Result<(), CliError> {
    let text = AnalysisConfig::default().to_toml()?;
    print!("{}", text);
    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<AnalysisError> for CliError {
    fn from(err: AnalysisError) -> Self {
        let hint = match &err {
            AnalysisError::SheetNotFound { .. } => Some("pass --sheet NAME to pick the worksheet explicitly"),
            AnalysisError::RequiredColumnMissing { .. } => {
                Some("run `impactlens columns FILE` to see how headers were matched")
            }
            AnalysisError::NoValidData { .. } => Some("check --header-row; data is read below the header line"),
            AnalysisError::ConfigParse(_) | AnalysisError::ConfigValidation(_) => {
                Some("`impactlens config` prints a valid default configuration")
            }
            AnalysisError::Parse(_) | AnalysisError::Io(_) => None,
        };
        Self {
            code: analysis_exit_code(&err),
            message: err.to_string(),
            hint: hint.map(String::from),
        }
    }
}
