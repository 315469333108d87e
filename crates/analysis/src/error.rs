use std::fmt;

use crate::model::Role;

#[derive(Debug)]
pub enum AnalysisError {
    /// No worksheet matched the name/structure heuristics.
    SheetNotFound {
        /// Names tried by the named-match policy (or the explicit override).
        wanted: Vec<String>,
        /// Worksheet names present in the workbook.
        available: Vec<String>,
    },
    /// Workbook bytes unreadable or corrupt.
    Parse(String),
    /// Hard-required roles could not be matched to any header.
    RequiredColumnMissing { roles: Vec<Role>, headers: Vec<String> },
    /// Every row was dropped by normalization.
    NoValidData { rows_read: usize },
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad threshold, empty ordering, etc.).
    ConfigValidation(String),
    /// IO error (file read, report write, etc.).
    Io(String),
}

impl AnalysisError {
    /// Stable machine-readable identifier, used in JSON error output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SheetNotFound { .. } => "sheet_not_found",
            Self::Parse(_) => "parse_error",
            Self::RequiredColumnMissing { .. } => "required_column_missing",
            Self::NoValidData { .. } => "no_valid_data",
            Self::ConfigParse(_) => "config_parse",
            Self::ConfigValidation(_) => "config_validation",
            Self::Io(_) => "io_error",
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SheetNotFound { wanted, available } => {
                if available.is_empty() {
                    write!(f, "no usable worksheet found: workbook has no non-empty sheets")
                } else if wanted.is_empty() {
                    write!(
                        f,
                        "no worksheet matches the expected change-impact layout (sheets: {})",
                        available.join(", ")
                    )
                } else {
                    write!(
                        f,
                        "no worksheet named {} or matching the expected change-impact layout (sheets: {})",
                        wanted.iter().map(|w| format!("'{w}'")).collect::<Vec<_>>().join(" / "),
                        available.join(", ")
                    )
                }
            }
            Self::Parse(msg) => write!(f, "cannot read spreadsheet: {msg}"),
            Self::RequiredColumnMissing { roles, headers } => {
                let names: Vec<String> = roles.iter().map(|r| r.label().to_string()).collect();
                write!(f, "required column(s) not found: {}", names.join(", "))?;
                if !headers.is_empty() {
                    write!(f, " (headers: {})", headers.join(", "))?;
                }
                Ok(())
            }
            Self::NoValidData { rows_read } => write!(
                f,
                "no valid data: all {rows_read} row(s) were missing a stakeholder group or impact level"
            ),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for AnalysisError {}
