//! Workbook loading and worksheet selection.
//!
//! Turns an uploaded byte stream into a [`LoadedSheet`]: every worksheet is
//! materialized as an absolute cell grid, then one sheet is picked by name,
//! by structure, or by falling back to the first non-empty sheet.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use impactlens_analysis::config::{AnalysisConfig, LoaderConfig, RoleRule};
use impactlens_analysis::resolve::{has_expected_structure, resolve_columns};
use impactlens_analysis::{AnalysisError, CellValue, LoadedSheet, RawTable, Role, SheetSelection};

/// Sheet name given to the single grid of a CSV upload.
pub const CSV_SHEET_NAME: &str = "Sheet1";

/// Roles that identify a header row.
const HEADER_ROLES: [Role; 3] = [Role::Stakeholder, Role::Impact, Role::Perception];

// ---------------------------------------------------------------------------
// Source format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xlsx,
    Xlsm,
    Xls,
    Xlsb,
    Ods,
    Csv,
}

impl SourceFormat {
    /// Guess from the file extension. `None` for unknown extensions.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }

    pub fn is_spreadsheet(self) -> bool {
        !matches!(self, Self::Csv)
    }
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" => Ok(Self::Xlsx),
            "xlsm" => Ok(Self::Xlsm),
            "xls" => Ok(Self::Xls),
            "xlsb" => Ok(Self::Xlsb),
            "ods" => Ok(Self::Ods),
            "csv" | "tsv" | "txt" => Ok(Self::Csv),
            other => Err(format!(
                "unsupported format '{}' (expected xlsx, xlsm, xls, xlsb, ods or csv)",
                other
            )),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Xlsx => "xlsx",
            Self::Xlsm => "xlsm",
            Self::Xls => "xls",
            Self::Xlsb => "xlsb",
            Self::Ods => "ods",
            Self::Csv => "csv",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Workbook
// ---------------------------------------------------------------------------

/// One worksheet as an absolute, row-major grid (row 0 is sheet row 1).
#[derive(Debug, Clone, PartialEq)]
pub struct SheetGrid {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetGrid {
    pub fn is_blank(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(|c| c.is_blank()))
    }

    /// Header names as they would read if `row` were the header line.
    fn header_names(&self, row: usize) -> Vec<String> {
        self.rows
            .get(row)
            .map(|cells| cells.iter().filter_map(|c| c.as_text()).collect())
            .unwrap_or_default()
    }

    fn has_structure_at(&self, row: usize, rules: &[RoleRule]) -> bool {
        has_expected_structure(&self.header_names(row), rules)
    }

    /// How many of the stakeholder, impact and perception roles `row` carries.
    fn header_score(&self, row: usize, rules: &[RoleRule]) -> usize {
        let roles = resolve_columns(&self.header_names(row), rules);
        HEADER_ROLES.iter().filter(|r| roles.contains(**r)).count()
    }

    /// Header offset: configured row as-is, else the row within the preamble
    /// window matching the most header roles (earliest on ties), else row 0.
    fn header_row(&self, loader: &LoaderConfig, rules: &[RoleRule]) -> usize {
        if let Some(row) = loader.header_row {
            return row;
        }
        let mut best = (0, 0);
        for row in 0..=loader.max_preamble_rows {
            let score = self.header_score(row, rules);
            if score > best.0 {
                best = (score, row);
            }
        }
        best.1
    }

    fn structure_row(&self, loader: &LoaderConfig, rules: &[RoleRule]) -> Option<usize> {
        match loader.header_row {
            Some(row) => self.has_structure_at(row, rules).then_some(row),
            None => (0..=loader.max_preamble_rows).find(|&row| self.has_structure_at(row, rules)),
        }
    }

    fn to_loaded(&self, header_row: usize, selection: SheetSelection) -> LoadedSheet {
        log::debug!(
            "selected sheet '{}' ({}), header row {}",
            self.name,
            selection,
            header_row + 1
        );
        LoadedSheet {
            name: self.name.clone(),
            header_row,
            selection,
            table: RawTable::from_grid(&self.rows, header_row),
        }
    }
}

/// Every worksheet of one upload, in workbook order.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<SheetGrid>,
}

impl Workbook {
    pub fn from_bytes(bytes: &[u8], format: SourceFormat) -> Result<Self, AnalysisError> {
        let sheets = if format.is_spreadsheet() {
            crate::xlsx::read_sheets(bytes)?
        } else {
            vec![SheetGrid {
                name: CSV_SHEET_NAME.to_string(),
                rows: crate::csv::read_grid(bytes)?,
            }]
        };
        Ok(Self { sheets })
    }

    pub fn from_path(path: &Path, format: Option<SourceFormat>) -> Result<Self, AnalysisError> {
        let format = match format.or_else(|| SourceFormat::from_path(path)) {
            Some(f) => f,
            None => {
                return Err(AnalysisError::Parse(format!(
                    "cannot tell the file format of {} (use a .xlsx/.xls/.ods/.csv file or pass a format)",
                    path.display()
                )))
            }
        };
        let bytes = std::fs::read(path)
            .map_err(|e| AnalysisError::Io(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_bytes(&bytes, format)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn non_blank_names(&self) -> Vec<String> {
        self.sheets
            .iter()
            .filter(|s| !s.is_blank())
            .map(|s| s.name.clone())
            .collect()
    }

    /// Pick the change-impact worksheet. First match wins:
    /// configured name, expected header structure, first non-empty sheet.
    pub fn select(&self, loader: &LoaderConfig, rules: &[RoleRule]) -> Result<LoadedSheet, AnalysisError> {
        let candidates = || self.sheets.iter().filter(|s| !s.is_blank());

        let named = candidates().find(|sheet| {
            loader
                .sheet_names
                .iter()
                .any(|wanted| names_match(wanted, &sheet.name))
        });
        if let Some(sheet) = named {
            return Ok(sheet.to_loaded(sheet.header_row(loader, rules), SheetSelection::NamedMatch));
        }

        for sheet in candidates() {
            if let Some(row) = sheet.structure_row(loader, rules) {
                return Ok(sheet.to_loaded(row, SheetSelection::StructureMatch));
            }
        }

        if loader.fallback_to_first {
            if let Some(sheet) = candidates().next() {
                log::warn!(
                    "no sheet named {:?} or with the expected headers; using first sheet '{}'",
                    loader.sheet_names,
                    sheet.name
                );
                return Ok(sheet.to_loaded(
                    sheet.header_row(loader, rules),
                    SheetSelection::FirstSheetFallback,
                ));
            }
        }

        Err(AnalysisError::SheetNotFound {
            wanted: loader.sheet_names.clone(),
            available: self.non_blank_names(),
        })
    }

    /// Select a sheet by explicit name (trimmed, case-insensitive).
    pub fn select_named(
        &self,
        name: &str,
        loader: &LoaderConfig,
        rules: &[RoleRule],
    ) -> Result<LoadedSheet, AnalysisError> {
        match self.sheets.iter().find(|s| names_match(name, &s.name)) {
            Some(sheet) => Ok(sheet.to_loaded(sheet.header_row(loader, rules), SheetSelection::Requested)),
            None => Err(AnalysisError::SheetNotFound {
                wanted: vec![name.to_string()],
                available: self.sheet_names(),
            }),
        }
    }
}

fn names_match(wanted: &str, actual: &str) -> bool {
    wanted.trim().eq_ignore_ascii_case(actual.trim())
}

/// Load an upload and select its change-impact sheet in one step.
/// `sheet` overrides the selection policy.
pub fn load(
    bytes: &[u8],
    format: SourceFormat,
    config: &AnalysisConfig,
    sheet: Option<&str>,
) -> Result<LoadedSheet, AnalysisError> {
    let workbook = Workbook::from_bytes(bytes, format)?;
    log::debug!("{} workbook with sheets {:?}", format, workbook.sheet_names());
    match sheet {
        Some(name) => workbook.select_named(name, &config.loader, &config.columns.rules),
        None => workbook.select(&config.loader, &config.columns.rules),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impactlens_analysis::config::default_rules;

    fn grid(name: &str, rows: &[&[&str]]) -> SheetGrid {
        SheetGrid {
            name: name.to_string(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| CellValue::from(*c)).collect())
                .collect(),
        }
    }

    const LAYOUT: &[&str] = &["Stakeholder Group(s)", "Level of Impact", "Perception of Change"];

    #[test]
    fn test_source_format_parsing() {
        assert_eq!("XLSX".parse::<SourceFormat>().unwrap(), SourceFormat::Xlsx);
        assert_eq!("csv".parse::<SourceFormat>().unwrap(), SourceFormat::Csv);
        assert!("pdf".parse::<SourceFormat>().is_err());
        assert_eq!(SourceFormat::from_path(Path::new("impacts.ODS")), Some(SourceFormat::Ods));
        assert_eq!(SourceFormat::from_path(Path::new("impacts")), None);
    }

    #[test]
    fn test_named_match_is_case_insensitive() {
        let wb = Workbook {
            sheets: vec![
                grid("Cover", &[&["Change pack"]]),
                grid("  known change IMPACTS ", &[LAYOUT, &["HR", "Low", "Positive"]]),
            ],
        };
        let sheet = wb.select(&LoaderConfig::default(), &default_rules()).unwrap();
        assert_eq!(sheet.selection, SheetSelection::NamedMatch);
        assert_eq!(sheet.name, "  known change IMPACTS ");
        assert_eq!(sheet.table.row_count(), 1);
    }

    #[test]
    fn test_structure_match_skips_unrelated_sheets() {
        let wb = Workbook {
            sheets: vec![
                grid("Cover", &[&["Change pack"], &["Version 3"]]),
                grid("Register", &[&["Change register"], &[], LAYOUT, &["HR", "Low", "Positive"]]),
            ],
        };
        let sheet = wb.select(&LoaderConfig::default(), &default_rules()).unwrap();
        assert_eq!(sheet.selection, SheetSelection::StructureMatch);
        assert_eq!(sheet.name, "Register");
        assert_eq!(sheet.header_row, 2);
        assert_eq!(sheet.table.headers()[0], "Stakeholder Group(s)");
    }

    #[test]
    fn test_header_detection_stops_at_preamble_window() {
        let wb = Workbook {
            sheets: vec![grid(
                "Known Change Impacts",
                &[&["a"], &["b"], &["c"], LAYOUT, &["HR", "Low", "Positive"]],
            )],
        };
        // Header at row 3 is outside the default window of 0..=2
        let sheet = wb.select(&LoaderConfig::default(), &default_rules()).unwrap();
        assert_eq!(sheet.header_row, 0);

        let loader = LoaderConfig { max_preamble_rows: 3, ..Default::default() };
        let sheet = wb.select(&loader, &default_rules()).unwrap();
        assert_eq!(sheet.header_row, 3);
    }

    #[test]
    fn test_header_detection_without_perception() {
        let wb = Workbook {
            sheets: vec![grid(
                "Known Change Impacts",
                &[&["Change register"], &[], &["Stakeholder Group(s)", "Level of Impact"], &["HR", "Low"]],
            )],
        };
        let sheet = wb.select(&LoaderConfig::default(), &default_rules()).unwrap();
        assert_eq!(sheet.selection, SheetSelection::NamedMatch);
        assert_eq!(sheet.header_row, 2);
    }

    #[test]
    fn test_explicit_header_row_is_used_as_is() {
        let wb = Workbook {
            sheets: vec![grid("Known Change Impacts", &[LAYOUT, LAYOUT, &["HR", "Low", "Positive"]])],
        };
        let loader = LoaderConfig { header_row: Some(1), ..Default::default() };
        let sheet = wb.select(&loader, &default_rules()).unwrap();
        assert_eq!(sheet.header_row, 1);
        assert_eq!(sheet.table.row_count(), 1);
    }

    #[test]
    fn test_first_sheet_fallback() {
        let wb = Workbook {
            sheets: vec![
                grid("Blank", &[&["", ""]]),
                grid("Data", &[&["Who", "What"], &["HR", "x"]]),
            ],
        };
        let sheet = wb.select(&LoaderConfig::default(), &default_rules()).unwrap();
        assert_eq!(sheet.selection, SheetSelection::FirstSheetFallback);
        assert_eq!(sheet.name, "Data");
    }

    #[test]
    fn test_no_match_without_fallback_is_sheet_not_found() {
        let wb = Workbook {
            sheets: vec![grid("Data", &[&["Who", "What"], &["HR", "x"]])],
        };
        let loader = LoaderConfig { fallback_to_first: false, ..Default::default() };
        match wb.select(&loader, &default_rules()) {
            Err(AnalysisError::SheetNotFound { wanted, available }) => {
                assert_eq!(wanted, vec!["Known Change Impacts"]);
                assert_eq!(available, vec!["Data"]);
            }
            other => panic!("expected SheetNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_all_blank_workbook_is_sheet_not_found() {
        let wb = Workbook { sheets: vec![grid("Sheet1", &[]), grid("Sheet2", &[&[""]])] };
        let err = wb.select(&LoaderConfig::default(), &default_rules()).unwrap_err();
        assert_eq!(err.kind(), "sheet_not_found");
        assert!(err.to_string().contains("no non-empty sheets"));
    }

    #[test]
    fn test_select_named_override() {
        let wb = Workbook {
            sheets: vec![
                grid("Known Change Impacts", &[LAYOUT]),
                grid("Draft", &[LAYOUT, &["IT", "High", "Negative"]]),
            ],
        };
        let sheet = wb
            .select_named("draft", &LoaderConfig::default(), &default_rules())
            .unwrap();
        assert_eq!(sheet.selection, SheetSelection::Requested);
        assert_eq!(sheet.name, "Draft");

        let err = wb
            .select_named("Missing", &LoaderConfig::default(), &default_rules())
            .unwrap_err();
        assert!(err.to_string().contains("'Missing'"));
    }

    #[test]
    fn test_load_csv() {
        let bytes = b"Stakeholder Group(s);Level of Impact;Perception of Change\n\"Finance, IT\";High;Negative\n";
        let sheet = load(bytes, SourceFormat::Csv, &AnalysisConfig::default(), None).unwrap();
        assert_eq!(sheet.name, CSV_SHEET_NAME);
        assert_eq!(sheet.selection, SheetSelection::StructureMatch);
        assert_eq!(sheet.table.cell(0, 0), &CellValue::Text("Finance, IT".into()));
    }
}
