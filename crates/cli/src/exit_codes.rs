//! CLI Exit Code Registry
//!
//! Single source of truth for every exit code `impactlens` returns.
//! Scripts rely on these; never renumber an existing code.
//!
//! # Exit Codes
//!
//! | Code | Meaning                                               |
//! |------|-------------------------------------------------------|
//! | 0    | Success                                               |
//! | 1    | General error (unspecified)                           |
//! | 2    | Usage error (bad args, missing --format for stdin)    |
//! | 3    | I/O error (cannot read input, cannot write report)    |
//! | 4    | Unreadable or corrupt spreadsheet                     |
//! | 5    | No worksheet matched the selection policy             |
//! | 6    | Required column (stakeholder or impact) not found     |
//! | 7    | Every row was missing a stakeholder or impact value   |
//! | 8    | Invalid configuration file                            |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in `analysis_exit_code` if it comes from the analysis core

use impactlens_analysis::AnalysisError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Input could not be read or the report could not be written.
pub const EXIT_IO: u8 = 3;

/// Workbook bytes unreadable (not a spreadsheet, truncated, encrypted).
pub const EXIT_PARSE: u8 = 4;

/// No worksheet matched by name, structure, or fallback.
pub const EXIT_SHEET_NOT_FOUND: u8 = 5;

/// Stakeholder or impact column missing from the header row.
pub const EXIT_MISSING_COLUMN: u8 = 6;

/// All rows dropped during normalization.
pub const EXIT_NO_VALID_DATA: u8 = 7;

/// Config file failed to parse or validate.
pub const EXIT_CONFIG: u8 = 8;

/// Map an analysis error to its exit code.
pub fn analysis_exit_code(err: &AnalysisError) -> u8 {
    match err {
        AnalysisError::SheetNotFound { .. } => EXIT_SHEET_NOT_FOUND,
        AnalysisError::Parse(_) => EXIT_PARSE,
        AnalysisError::RequiredColumnMissing { .. } => EXIT_MISSING_COLUMN,
        AnalysisError::NoValidData { .. } => EXIT_NO_VALID_DATA,
        AnalysisError::ConfigParse(_) | AnalysisError::ConfigValidation(_) => EXIT_CONFIG,
        AnalysisError::Io(_) => EXIT_IO,
    }
}

/// Stable name for an exit code, used as the `error` field of JSON errors.
pub fn exit_code_name(code: u8) -> &'static str {
    match code {
        EXIT_SUCCESS => "success",
        EXIT_USAGE => "usage_error",
        EXIT_IO => "io_error",
        EXIT_PARSE => "parse_error",
        EXIT_SHEET_NOT_FOUND => "sheet_not_found",
        EXIT_MISSING_COLUMN => "required_column_missing",
        EXIT_NO_VALID_DATA => "no_valid_data",
        EXIT_CONFIG => "config_error",
        _ => "error",
    }
}

/// Structured error printed to stdout under `--json`.
#[derive(Debug, serde::Serialize)]
pub struct ErrorOutput {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub exit_code: u8,
}
