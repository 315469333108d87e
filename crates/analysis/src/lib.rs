//! `impactlens-analysis` - change-impact spreadsheet analysis core.
//!
//! Pure engine crate: receives an already-loaded worksheet, returns charts
//! specs, count tables and insights. No CLI or file IO dependencies.

pub mod aggregate;
pub mod chart;
pub mod config;
pub mod engine;
pub mod error;
pub mod insight;
pub mod model;
pub mod normalize;
pub mod resolve;

pub use chart::ChartSpec;
pub use config::AnalysisConfig;
pub use engine::analyze;
pub use error::AnalysisError;
pub use model::{Analysis, CellValue, LoadedSheet, RawTable, Role, SheetSelection, BANNER};
