// Spreadsheet import via calamine (xlsx, xlsm, xls, xlsb, ods)

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};

use impactlens_analysis::{AnalysisError, CellValue};

use crate::workbook::SheetGrid;

/// Read every worksheet from in-memory spreadsheet bytes. Container format is
/// detected from the bytes themselves.
pub fn read_sheets(bytes: &[u8]) -> Result<Vec<SheetGrid>, AnalysisError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| AnalysisError::Parse(format!("failed to open workbook: {}", e)))?;

    let names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());

    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| AnalysisError::Parse(format!("failed to read sheet '{}': {}", name, e)))?;
        let rows = grid_from_range(&range);
        log::debug!("sheet '{}': {} row(s)", name, rows.len());
        sheets.push(SheetGrid { name, rows });
    }

    Ok(sheets)
}

/// calamine trims leading blank rows and columns from the used range.
/// Pad them back so row and column indices are absolute sheet positions.
fn grid_from_range(range: &Range<Data>) -> Vec<Vec<CellValue>> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };

    let mut grid: Vec<Vec<CellValue>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; start_col as usize];
        cells.extend(row.iter().map(convert_cell));
        grid.push(cells);
    }
    grid
}

fn convert_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::from(s.as_str()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
