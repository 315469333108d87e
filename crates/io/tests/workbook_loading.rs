//! Loading real xlsx bytes and writing the chart report.
//! Fixtures are built in memory with rust_xlsxwriter.

use rust_xlsxwriter::Workbook as XlsxWorkbook;

use impactlens_analysis::config::AnalysisConfig;
use impactlens_analysis::model::InsightRule;
use impactlens_analysis::{analyze, AnalysisError, CellValue, SheetSelection};
use impactlens_io::report::SUMMARY_SHEET;
use impactlens_io::{load, report_bytes, write_report, SourceFormat, Workbook};

const HEADERS: &[&str] = &[
    "Workstream / Process",
    "Stakeholder Group(s)",
    "Level of Impact",
    "Perception of Change",
];

const ROWS: &[&[&str]] = &[
    &["Process A", "Finance, IT", "High", "Negative"],
    &["Process B", "HR", "Low", "Positive"],
    &["Process C", "Finance", "High", "Negative"],
];

/// Build an xlsx with the given sheets; each sheet is (name, first row, rows).
fn xlsx(sheets: &[(&str, u32, &[&[&str]])]) -> Vec<u8> {
    let mut workbook = XlsxWorkbook::new();
    for (name, start_row, rows) in sheets {
        let ws = workbook.add_worksheet();
        ws.set_name(*name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    ws.write_string(start_row + r as u32, c as u16, *value).unwrap();
                }
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// Header row followed by the three scenario rows.
fn register() -> Vec<&'static [&'static str]> {
    let mut rows: Vec<&[&str]> = Vec::with_capacity(ROWS.len() + 1);
    rows.push(HEADERS);
    rows.extend_from_slice(ROWS);
    rows
}

// -------------------------------------------------------------------------
// Sheet selection on real workbooks
// -------------------------------------------------------------------------

#[test]
fn named_sheet_with_preamble_rows() {
    let mut rows: Vec<&[&str]> = Vec::new();
    rows.push(&["Change Impact Assessment"]);
    rows.push(&[""]);
    rows.extend(register());
    let bytes = xlsx(&[("Cover", 0, &[&["Read me"]]), ("Known Change Impacts", 0, rows.as_slice())]);

    let sheet = load(&bytes, SourceFormat::Xlsx, &AnalysisConfig::default(), None).unwrap();
    assert_eq!(sheet.name, "Known Change Impacts");
    assert_eq!(sheet.selection, SheetSelection::NamedMatch);
    assert_eq!(sheet.header_row, 2);
    assert_eq!(sheet.table.headers(), HEADERS);
    assert_eq!(sheet.table.row_count(), 3);
}

#[test]
fn leading_blank_rows_keep_absolute_offsets() {
    // Data written from row 2 only; calamine's used range starts there
    let rows = register();
    let bytes = xlsx(&[("Impacts", 2, rows.as_slice())]);

    let sheet = load(&bytes, SourceFormat::Xlsx, &AnalysisConfig::default(), None).unwrap();
    assert_eq!(sheet.selection, SheetSelection::StructureMatch);
    assert_eq!(sheet.header_row, 2);
    assert_eq!(sheet.table.cell(0, 1), &CellValue::Text("Finance, IT".into()));
}

#[test]
fn workbook_without_matching_sheet_is_sheet_not_found() {
    let bytes = xlsx(&[("Notes", 0, &[&["Nothing", "to"], &["see", "here"]])]);
    let mut config = AnalysisConfig::default();
    config.loader.fallback_to_first = false;

    match load(&bytes, SourceFormat::Xlsx, &config, None) {
        Err(AnalysisError::SheetNotFound { available, .. }) => assert_eq!(available, vec!["Notes"]),
        other => panic!("expected SheetNotFound, got {:?}", other.map(|s| s.name)),
    }
}

#[test]
fn empty_workbook_is_sheet_not_found_even_with_fallback() {
    let bytes = xlsx(&[("Sheet1", 0, &[])]);
    let err = load(&bytes, SourceFormat::Xlsx, &AnalysisConfig::default(), None).unwrap_err();
    assert_eq!(err.kind(), "sheet_not_found");
}

#[test]
fn explicit_sheet_override() {
    let rows = register();
    let bytes = xlsx(&[("Known Change Impacts", 0, rows.as_slice()), ("Draft", 0, rows.as_slice())]);
    let sheet = load(&bytes, SourceFormat::Xlsx, &AnalysisConfig::default(), Some("Draft")).unwrap();
    assert_eq!(sheet.name, "Draft");
    assert_eq!(sheet.selection, SheetSelection::Requested);
}

#[test]
fn corrupt_bytes_are_parse_errors() {
    let err = Workbook::from_bytes(b"PK\x03\x04 truncated", SourceFormat::Xlsx).unwrap_err();
    assert_eq!(err.kind(), "parse_error");
}

// -------------------------------------------------------------------------
// End to end through the analysis core
// -------------------------------------------------------------------------

#[test]
fn xlsx_upload_analyzes_like_scenario_sheet() {
    let rows = register();
    let bytes = xlsx(&[("Known Change Impacts", 0, rows.as_slice())]);
    let sheet = load(&bytes, SourceFormat::Xlsx, &AnalysisConfig::default(), None).unwrap();
    let analysis = analyze(&sheet, &AnalysisConfig::default()).unwrap();

    let impact = analysis.chart("impact_by_stakeholder").unwrap();
    assert_eq!(impact.table.count("Finance", "High"), 2);
    assert_eq!(impact.table.count("IT", "High"), 1);
    assert_eq!(impact.table.count("HR", "Low"), 1);
    assert!(analysis.insight(InsightRule::RepeatHighImpact).is_some());
}

// -------------------------------------------------------------------------
// Report
// -------------------------------------------------------------------------

#[test]
fn report_has_summary_and_one_sheet_per_chart() {
    let rows = register();
    let bytes = xlsx(&[("Known Change Impacts", 0, rows.as_slice())]);
    let sheet = load(&bytes, SourceFormat::Xlsx, &AnalysisConfig::default(), None).unwrap();
    let analysis = analyze(&sheet, &AnalysisConfig::default()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.xlsx");
    let result = write_report(&analysis, "impacts.xlsx", &path).unwrap();
    assert_eq!(result.sheets, vec![SUMMARY_SHEET, "Impact", "Perception"]);
    assert_eq!(result.charts, analysis.charts.len());

    // Read the report back and check the data tables
    let written = Workbook::from_path(&path, None).unwrap();
    assert_eq!(written.sheet_names(), result.sheets);

    let summary = &written.sheets[0];
    assert_eq!(summary.rows[0][0], CellValue::Text(analysis.meta.banner.clone()));

    let impact = &written.sheets[1];
    assert_eq!(impact.rows[2][1], CellValue::Text("Low".into()));
    assert_eq!(impact.rows[3][0], CellValue::Text("Finance".into()));
    assert_eq!(impact.rows[3][3], CellValue::Number(2.0));
}

#[test]
fn report_lists_warnings_when_perception_missing() {
    let rows: &[&[&str]] = &[
        &["Stakeholder Group(s)", "Level of Impact"],
        &["Finance", "High"],
    ];
    let bytes = xlsx(&[("Known Change Impacts", 0, rows)]);
    let sheet = load(&bytes, SourceFormat::Xlsx, &AnalysisConfig::default(), None).unwrap();
    let analysis = analyze(&sheet, &AnalysisConfig::default()).unwrap();

    let report = report_bytes(&analysis, "upload").unwrap();
    let written = Workbook::from_bytes(&report, SourceFormat::Xlsx).unwrap();
    assert_eq!(written.sheet_names(), vec![SUMMARY_SHEET, "Impact"]);

    let texts: Vec<String> = written.sheets[0]
        .rows
        .iter()
        .flatten()
        .filter_map(|c| c.as_text())
        .collect();
    assert!(texts.iter().any(|t| t == "Warnings"));
    assert!(texts.iter().any(|t| t.contains("perception chart")));
}
