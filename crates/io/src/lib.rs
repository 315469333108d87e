// File I/O operations

pub mod csv;
pub mod report;
pub mod workbook;
pub mod xlsx;

pub use report::{report_bytes, write_report, ReportResult};
pub use workbook::{load, SheetGrid, SourceFormat, Workbook};
