//! Excel report writer.
//!
//! One `Summary` worksheet (banner, source, insights, warnings) followed by
//! one worksheet per chart: the count table plus a native stacked bar chart
//! drawn in the fixed category colors.

use std::path::Path;

use rust_xlsxwriter::{
    Chart, ChartDataLabel, ChartFormat, ChartLegendPosition, ChartSolidFill, ChartType, Color,
    Format, Workbook as XlsxWorkbook, Worksheet, XlsxError,
};

use impactlens_analysis::chart::{hex_to_rgb, FALLBACK_COLOR};
use impactlens_analysis::config::Orientation;
use impactlens_analysis::model::{Dimension, GroupBy};
use impactlens_analysis::{Analysis, AnalysisError, ChartSpec};

pub const SUMMARY_SHEET: &str = "Summary";

/// Chart height in pixels: a fixed frame plus a band per group.
const CHART_BASE_HEIGHT: u32 = 160;
const CHART_ROW_HEIGHT: u32 = 28;
const CHART_MAX_HEIGHT: u32 = 1200;
const CHART_WIDTH: u32 = 720;

/// Zero-count segments get no label.
const SEGMENT_LABEL_FORMAT: &str = "0;-0;;@";

/// What ended up in the report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportResult {
    /// Worksheet names in workbook order, `Summary` first.
    pub sheets: Vec<String>,
    pub charts: usize,
}

/// Write the report to `path`. `source` is a display name for the upload.
pub fn write_report(analysis: &Analysis, source: &str, path: &Path) -> Result<ReportResult, AnalysisError> {
    let (mut workbook, result) = build(analysis, source).map_err(report_error)?;
    workbook
        .save(path)
        .map_err(|e| AnalysisError::Io(format!("failed to write {}: {}", path.display(), e)))?;
    log::debug!("report written to {} ({} chart(s))", path.display(), result.charts);
    Ok(result)
}

/// Render the report into memory, e.g. to stream it back to a caller.
pub fn report_bytes(analysis: &Analysis, source: &str) -> Result<Vec<u8>, AnalysisError> {
    let (mut workbook, _) = build(analysis, source).map_err(report_error)?;
    workbook.save_to_buffer().map_err(report_error)
}

fn report_error(e: XlsxError) -> AnalysisError {
    AnalysisError::Io(format!("failed to build report: {}", e))
}

fn build(analysis: &Analysis, source: &str) -> Result<(XlsxWorkbook, ReportResult), XlsxError> {
    let mut workbook = XlsxWorkbook::new();
    let mut result = ReportResult::default();

    let summary = workbook.add_worksheet();
    summary.set_name(SUMMARY_SHEET)?;
    write_summary(summary, analysis, source)?;
    result.sheets.push(SUMMARY_SHEET.to_string());

    for spec in &analysis.charts {
        let name = sheet_name(spec);
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&name)?;
        write_chart_sheet(worksheet, &name, spec)?;
        result.sheets.push(name);
        result.charts += 1;
    }

    Ok((workbook, result))
}

/// Worksheet name for a chart; short enough for Excel's 31-character limit.
fn sheet_name(spec: &ChartSpec) -> String {
    let dim = match spec.table.dimension {
        Dimension::Impact => "Impact",
        Dimension::Perception => "Perception",
        Dimension::Mitigation => "Mitigation",
    };
    match spec.table.group_by {
        GroupBy::Stakeholder => dim.to_string(),
        GroupBy::Workstream => format!("{} by Workstream", dim),
    }
}

// ---------------------------------------------------------------------------
// Summary sheet
// ---------------------------------------------------------------------------

fn write_summary(ws: &mut Worksheet, analysis: &Analysis, source: &str) -> Result<(), XlsxError> {
    let title = Format::new().set_bold().set_font_size(14);
    let bold = Format::new().set_bold();
    let meta = &analysis.meta;
    let summary = &analysis.summary;

    ws.set_column_width(0, 28)?;
    ws.set_column_width(1, 90)?;

    ws.write_string_with_format(0, 0, &meta.banner, &title)?;
    let facts = [
        ("Source", source.to_string()),
        ("Worksheet", format!("{} ({})", meta.sheet, meta.selection)),
        ("Header row", (meta.header_row + 1).to_string()),
        ("Generated", meta.run_at.clone()),
        ("Rows read", summary.rows_read.to_string()),
        ("Rows dropped", summary.rows_dropped.to_string()),
        ("Changes", summary.changes.to_string()),
        ("Stakeholder groups", summary.stakeholders.to_string()),
    ];

    let mut row = 2;
    for (label, value) in &facts {
        ws.write_string_with_format(row, 0, *label, &bold)?;
        ws.write_string(row, 1, value.as_str())?;
        row += 1;
    }

    row += 1;
    ws.write_string_with_format(row, 0, "Key Insights", &bold)?;
    row += 1;
    if analysis.insights.is_empty() {
        ws.write_string(row, 0, "No insights for this data.")?;
        row += 1;
    }
    for insight in &analysis.insights {
        ws.write_string(row, 0, &format!("• {}", insight.message))?;
        row += 1;
    }

    if !analysis.warnings.is_empty() {
        row += 1;
        ws.write_string_with_format(row, 0, "Warnings", &bold)?;
        row += 1;
        for warning in &analysis.warnings {
            ws.write_string(row, 0, warning.as_str())?;
            row += 1;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Chart sheets
// ---------------------------------------------------------------------------

/// Layout: heading in row 0, table header in row 2 (group axis label,
/// one column per category, "Total"), one row per group below it.
/// The chart sits to the right of the table.
fn write_chart_sheet(ws: &mut Worksheet, name: &str, spec: &ChartSpec) -> Result<(), XlsxError> {
    const HEADER_ROW: u32 = 2;

    let bold = Format::new().set_bold();
    let table = &spec.table;
    let total_col = table.categories.len() as u16 + 1;

    ws.write_string_with_format(0, 0, &spec.heading, &Format::new().set_bold().set_font_size(14))?;
    ws.set_column_width(0, 24)?;

    ws.write_string_with_format(HEADER_ROW, 0, &spec.group_axis, &bold)?;
    for (i, category) in table.categories.iter().enumerate() {
        ws.write_string_with_format(HEADER_ROW, i as u16 + 1, category.as_str(), &bold)?;
    }
    ws.write_string_with_format(HEADER_ROW, total_col, "Total", &bold)?;

    for (r, row) in table.rows.iter().enumerate() {
        let sheet_row = HEADER_ROW + 1 + r as u32;
        ws.write_string(sheet_row, 0, row.group.as_str())?;
        for (c, count) in row.counts.iter().enumerate() {
            ws.write_number(sheet_row, c as u16 + 1, *count as f64)?;
        }
        ws.write_number(sheet_row, total_col, row.total as f64)?;
    }

    if table.is_empty() || table.categories.is_empty() {
        return Ok(());
    }

    let first = HEADER_ROW + 1;
    let last = HEADER_ROW + table.rows.len() as u32;

    let chart_type = match spec.orientation {
        Orientation::Horizontal => ChartType::BarStacked,
        Orientation::Vertical => ChartType::ColumnStacked,
    };
    let mut chart = Chart::new(chart_type);

    for (i, color) in spec.colors.iter().enumerate() {
        let col = i as u16 + 1;
        let rgb = hex_to_rgb(color)
            .or_else(|| hex_to_rgb(FALLBACK_COLOR))
            .unwrap_or(0x808080);

        let series = chart
            .add_series()
            .set_name((name, HEADER_ROW, col))
            .set_categories((name, first, 0, last, 0))
            .set_values((name, first, col, last, col))
            .set_format(ChartFormat::new().set_solid_fill(ChartSolidFill::new().set_color(Color::RGB(rgb))));
        if spec.segment_labels {
            series.set_data_label(ChartDataLabel::new().show_value().set_num_format(SEGMENT_LABEL_FORMAT));
        }
    }

    chart.title().set_name(spec.title.as_str());
    chart.x_axis().set_name(spec.group_axis.as_str());
    chart.y_axis().set_name(spec.value_axis.as_str());
    chart.legend().set_position(ChartLegendPosition::Right);

    let height = (CHART_BASE_HEIGHT + CHART_ROW_HEIGHT * table.rows.len() as u32).min(CHART_MAX_HEIGHT);
    chart.set_width(CHART_WIDTH).set_height(height);

    ws.insert_chart(HEADER_ROW, total_col + 2, &chart)?;
    Ok(())
}
