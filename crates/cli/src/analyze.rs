//! `impactlens analyze` and `impactlens columns`.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use serde::Serialize;

use impactlens_analysis::config::{AnalysisConfig, Orientation};
use impactlens_analysis::model::{ColumnRoleMap, Role};
use impactlens_analysis::resolve::resolve_columns;
use impactlens_analysis::{analyze, LoadedSheet, SheetSelection};
use impactlens_io::{write_report, SourceFormat};

use crate::exit_codes::{exit_code_name, ErrorOutput};
use crate::render;
use crate::CliError;

/// Display name used for uploads piped through stdin.
const STDIN_SOURCE: &str = "<stdin>";

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum InputFormat {
    Xlsx,
    Xlsm,
    Xls,
    Xlsb,
    Ods,
    Csv,
}

impl From<InputFormat> for SourceFormat {
    fn from(f: InputFormat) -> Self {
        match f {
            InputFormat::Xlsx => SourceFormat::Xlsx,
            InputFormat::Xlsm => SourceFormat::Xlsm,
            InputFormat::Xls => SourceFormat::Xls,
            InputFormat::Xlsb => SourceFormat::Xlsb,
            InputFormat::Ods => SourceFormat::Ods,
            InputFormat::Csv => SourceFormat::Csv,
        }
    }
}

/// Where the spreadsheet comes from and how to read it.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Spreadsheet to analyse (.xlsx, .xlsm, .xls, .xlsb, .ods, .csv), or - for stdin
    pub file: PathBuf,

    /// Input format (required when reading from stdin)
    #[arg(long, short = 'f')]
    pub format: Option<InputFormat>,

    /// Worksheet to use, bypassing sheet auto-detection
    #[arg(long)]
    pub sheet: Option<String>,

    /// Header row number, 1-based (default: auto-detect within the first rows)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub header_row: Option<u32>,

    /// TOML configuration file (see `impactlens config`)
    #[arg(long, short = 'c', env = "IMPACTLENS_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output the full analysis as JSON instead of the text report
    #[arg(long)]
    pub json: bool,

    /// Also write an Excel report with native charts
    #[arg(long, value_name = "OUT.xlsx")]
    pub report: Option<PathBuf>,

    /// Number of stakeholder groups named in the top-N insight
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Negative-perception share (0-1] that counts as a concentration
    #[arg(long, value_name = "X")]
    pub negative_threshold: Option<f64>,

    /// Count a stakeholder listed twice in one row twice
    #[arg(long)]
    pub keep_duplicates: bool,

    /// Draw charts as vertical columns instead of horizontal bars
    #[arg(long)]
    pub vertical: bool,

    /// Suppress notes on stderr
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub fn cmd_analyze(args: AnalyzeArgs) -> Result<(), CliError> {
    let json = args.json;
    run_analyze(args).map_err(|e| emit_json_error(e, json))
}

fn run_analyze(args: AnalyzeArgs) -> Result<(), CliError> {
    let mut config = load_config(&args.input)?;
    if let Some(n) = args.top {
        config.insights.top_n = n;
    }
    if let Some(x) = args.negative_threshold {
        config.insights.negative_share_threshold = x;
    }
    if args.keep_duplicates {
        config.normalize.dedupe_stakeholders = false;
    }
    if args.vertical {
        config.chart.orientation = Orientation::Vertical;
    }
    config.validate()?;

    let (sheet, source) = load_sheet(&args.input, &config)?;
    let analysis = analyze(&sheet, &config)?;

    if args.json {
        println!("{}", analysis.to_json_pretty()?);
    } else {
        print!("{}", render::render_analysis(&analysis, &source));
    }

    if let Some(path) = &args.report {
        let result = write_report(&analysis, &source, path)?;
        if !args.quiet {
            eprintln!("wrote {} ({} chart sheet(s))", path.display(), result.charts);
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct ColumnsOutput<'a> {
    source: &'a str,
    sheet: &'a str,
    selection: SheetSelection,
    /// 1-based, as shown in spreadsheet applications.
    header_row: usize,
    headers: &'a [String],
    columns: &'a ColumnRoleMap,
    missing_required: &'a [Role],
    missing_expected: &'a [Role],
}

/// Show which sheet and header row were picked and how headers map to roles.
/// Exits non-zero when a required role is missing, after printing the map.
pub fn cmd_columns(input: InputArgs, json: bool) -> Result<(), CliError> {
    run_columns(input, json).map_err(|e| emit_json_error(e, json))
}

fn run_columns(input: InputArgs, json: bool) -> Result<(), CliError> {
    let config = load_config(&input)?;
    config.validate()?;
    let (sheet, source) = load_sheet(&input, &config)?;

    let headers = sheet.table.headers();
    let roles = resolve_columns(headers, &config.columns.rules);
    let missing = |wanted: &[Role]| -> Vec<Role> {
        wanted.iter().copied().filter(|r| !roles.contains(*r)).collect()
    };
    let missing_required = missing(config.columns.required.as_slice());
    let missing_expected = missing(config.columns.expected.as_slice());

    if json {
        let output = ColumnsOutput {
            source: &source,
            sheet: &sheet.name,
            selection: sheet.selection,
            header_row: sheet.header_row + 1,
            headers,
            columns: &roles,
            missing_required: &missing_required,
            missing_expected: &missing_expected,
        };
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{text}");
    } else {
        print!(
            "{}",
            render::render_columns(&sheet, &source, &roles, &missing_required, &missing_expected)
        );
    }

    if missing_required.is_empty() {
        Ok(())
    } else {
        Err(impactlens_analysis::AnalysisError::RequiredColumnMissing {
            roles: missing_required,
            headers: headers.to_vec(),
        }
        .into())
    }
}

// ---------------------------------------------------------------------------
// Shared input handling
// ---------------------------------------------------------------------------

/// Config file (if any) plus the input flags that map onto config.
fn load_config(input: &InputArgs) -> Result<AnalysisConfig, CliError> {
    let mut config = match &input.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
            AnalysisConfig::from_toml(&text)?
        }
        None => AnalysisConfig::default(),
    };
    if let Some(row) = input.header_row {
        config.loader.header_row = Some(row as usize - 1);
    }
    Ok(config)
}

fn load_sheet(input: &InputArgs, config: &AnalysisConfig) -> Result<(LoadedSheet, String), CliError> {
    let (bytes, format, source) = read_input(input)?;
    log::debug!("{}: reading as {}", source, format);
    let sheet = impactlens_io::load(&bytes, format, config, input.sheet.as_deref())?;
    Ok((sheet, source))
}

fn read_input(input: &InputArgs) -> Result<(Vec<u8>, SourceFormat, String), CliError> {
    if input.file.as_os_str() == "-" {
        let format = input.format.ok_or_else(|| {
            CliError::usage("reading from stdin requires --format")
                .with_hint("e.g. cat impacts.xlsx | impactlens analyze - --format xlsx")
        })?;
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .map_err(|e| CliError::io(format!("cannot read stdin: {e}")))?;
        return Ok((bytes, format.into(), STDIN_SOURCE.to_string()));
    }

    let path: &Path = &input.file;
    let format = match input.format {
        Some(f) => f.into(),
        None => SourceFormat::from_path(path).ok_or_else(|| {
            CliError::usage(format!("cannot tell the file format of {}", path.display()))
                .with_hint("pass --format xlsx|xlsm|xls|xlsb|ods|csv")
        })?,
    };
    let bytes = std::fs::read(path)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))?;
    Ok((bytes, format, path.display().to_string()))
}

/// Under `--json`, errors are also reported as a JSON object on stdout.
fn emit_json_error(err: CliError, json: bool) -> CliError {
    if json {
        let output = ErrorOutput {
            error: exit_code_name(err.code).to_string(),
            message: err.message.clone(),
            hint: err.hint.clone(),
            exit_code: err.code,
        };
        if let Ok(text) = serde_json::to_string_pretty(&output) {
            println!("{text}");
        }
    }
    err
}
