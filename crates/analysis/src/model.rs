use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

/// Banner shown at the top of every rendered report.
pub const BANNER: &str = concat!("Change Impact Analysis Summary Tool (v", env!("CARGO_PKG_VERSION"), ")");

// ---------------------------------------------------------------------------
// Raw table
// ---------------------------------------------------------------------------

/// A single spreadsheet cell as handed over by the loader.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    /// Blank strings and NaN count as blank, like an empty cell.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(n) => n.is_nan(),
            Self::Bool(_) => false,
        }
    }

    /// Trimmed textual form, `None` when blank. Integral numbers drop the `.0`.
    pub fn as_text(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        match self {
            Self::Empty => None,
            Self::Text(s) => Some(s.trim().to_string()),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(n.to_string())
                }
            }
            Self::Bool(b) => Some(if *b { "TRUE".into() } else { "FALSE".into() }),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// Header names plus row-major cells. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table from an absolute cell grid, taking `header_row` as the
    /// header line. Rows above it are preamble; fully blank rows below it are skipped.
    pub fn from_grid(grid: &[Vec<CellValue>], header_row: usize) -> Self {
        let width = grid.iter().map(|r| r.len()).max().unwrap_or(0);
        let header_cells = grid.get(header_row).map(|r| r.as_slice()).unwrap_or(&[]);

        let headers = (0..width)
            .map(|col| {
                header_cells
                    .get(col)
                    .and_then(|c| c.as_text())
                    .unwrap_or_else(|| format!("Column {}", column_letter(col)))
            })
            .collect();

        let rows = grid
            .iter()
            .skip(header_row + 1)
            .filter(|row| row.iter().any(|c| !c.is_blank()))
            .cloned()
            .collect();

        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Out-of-range cells read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}

/// Convert column index to letter (0 -> A, 1 -> B, 26 -> AA, etc.)
pub fn column_letter(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

// ---------------------------------------------------------------------------
// Sheet provenance
// ---------------------------------------------------------------------------

/// Which selection policy picked the worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetSelection {
    /// Explicitly requested by the caller.
    Requested,
    /// Name matched one of the configured sheet names.
    NamedMatch,
    /// Header row carried stakeholder, impact and perception columns.
    StructureMatch,
    /// First non-empty sheet, used as a last resort.
    FirstSheetFallback,
}

impl fmt::Display for SheetSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::NamedMatch => write!(f, "name match"),
            Self::StructureMatch => write!(f, "structure match"),
            Self::FirstSheetFallback => write!(f, "first-sheet fallback"),
        }
    }
}

/// A worksheet chosen by the loader, ready for analysis.
#[derive(Debug, Clone)]
pub struct LoadedSheet {
    pub name: String,
    /// Zero-based sheet row holding the headers.
    pub header_row: usize,
    pub selection: SheetSelection,
    pub table: RawTable,
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MitigationKind {
    Comms,
    Training,
    Hr,
    Other,
}

impl MitigationKind {
    pub const ALL: [MitigationKind; 4] = [Self::Comms, Self::Training, Self::Hr, Self::Other];

    pub fn label(self) -> &'static str {
        match self {
            Self::Comms => "Comms",
            Self::Training => "Training",
            Self::Hr => "HR",
            Self::Other => "Other",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Comms => "comms",
            Self::Training => "training",
            Self::Hr => "hr",
            Self::Other => "other",
        }
    }
}

/// Semantic role a spreadsheet column can play.
///
/// Serialized as a flat string (`"stakeholder"`, `"mitigation:comms"`), which
/// is also how roles are written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Identifier,
    Stakeholder,
    Impact,
    Perception,
    Mitigation(MitigationKind),
    Readiness,
}

impl Role {
    pub fn key(&self) -> String {
        match self {
            Self::Identifier => "identifier".into(),
            Self::Stakeholder => "stakeholder".into(),
            Self::Impact => "impact".into(),
            Self::Perception => "perception".into(),
            Self::Mitigation(kind) => format!("mitigation:{}", kind.key()),
            Self::Readiness => "readiness".into(),
        }
    }

    /// Human-readable name used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Identifier => "Workstream/Process",
            Self::Stakeholder => "Stakeholder Group",
            Self::Impact => "Impact Level",
            Self::Perception => "Perception of Change",
            Self::Mitigation(MitigationKind::Comms) => "Comms Mitigation",
            Self::Mitigation(MitigationKind::Training) => "Training Mitigation",
            Self::Mitigation(MitigationKind::Hr) => "HR Mitigation",
            Self::Mitigation(MitigationKind::Other) => "Other Mitigation",
            Self::Readiness => "Readiness",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        match key.as_str() {
            "identifier" => Ok(Self::Identifier),
            "stakeholder" => Ok(Self::Stakeholder),
            "impact" => Ok(Self::Impact),
            "perception" => Ok(Self::Perception),
            "readiness" => Ok(Self::Readiness),
            other => {
                let kind = other
                    .strip_prefix("mitigation:")
                    .and_then(|k| MitigationKind::ALL.into_iter().find(|m| m.key() == k));
                kind.map(Self::Mitigation)
                    .ok_or_else(|| format!("unknown column role: \"{s}\""))
            }
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.key()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColumn {
    pub index: usize,
    pub name: String,
}

/// Role → matched column. Absent roles simply have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColumnRoleMap {
    columns: BTreeMap<Role, ResolvedColumn>,
}

impl ColumnRoleMap {
    pub fn get(&self, role: Role) -> Option<&ResolvedColumn> {
        self.columns.get(&role)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.columns.contains_key(&role)
    }

    pub(crate) fn insert(&mut self, role: Role, column: ResolvedColumn) {
        self.columns.insert(role, column);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &ResolvedColumn)> {
        self.columns.iter().map(|(r, c)| (*r, c))
    }

    pub fn mitigation_columns(&self) -> impl Iterator<Item = (MitigationKind, &ResolvedColumn)> {
        self.columns.iter().filter_map(|(role, col)| match role {
            Role::Mitigation(kind) => Some((*kind, col)),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Categorical levels
// ---------------------------------------------------------------------------

/// A fixed categorical enumeration with canonical title-case labels.
pub trait Level: Copy + Eq + 'static {
    const ALL: &'static [Self];

    fn label(self) -> &'static str;

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.label() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl Level for ImpactLevel {
    const ALL: &'static [Self] = &[Self::Low, Self::Medium, Self::High];

    fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Perception {
    Positive,
    Neutral,
    Negative,
}

impl Level for Perception {
    const ALL: &'static [Self] = &[Self::Positive, Self::Neutral, Self::Negative];

    fn label(self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
        }
    }
}

/// Canonicalized categorical value: inside the fixed enumeration or not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category<T> {
    Known(T),
    /// Title-cased label that is not part of the enumeration.
    Other(String),
}

impl<T: Level> Category<T> {
    pub fn label(&self) -> &str {
        match self {
            Self::Known(level) => level.label(),
            Self::Other(label) => label,
        }
    }

    pub fn is(&self, level: T) -> bool {
        matches!(self, Self::Known(l) if *l == level)
    }

    pub fn is_other(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

impl<T: Level> Serialize for Category<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MitigationFlags {
    pub comms: bool,
    pub training: bool,
    pub hr: bool,
    pub other: bool,
}

impl MitigationFlags {
    pub fn get(&self, kind: MitigationKind) -> bool {
        match kind {
            MitigationKind::Comms => self.comms,
            MitigationKind::Training => self.training,
            MitigationKind::Hr => self.hr,
            MitigationKind::Other => self.other,
        }
    }

    pub fn set(&mut self, kind: MitigationKind, value: bool) {
        match kind {
            MitigationKind::Comms => self.comms = value,
            MitigationKind::Training => self.training = value,
            MitigationKind::Hr => self.hr = value,
            MitigationKind::Other => self.other = value,
        }
    }
}

/// One semantic row of the change-impact sheet.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    /// Zero-based index into the raw table rows.
    pub source_row: usize,
    pub identifier: Option<String>,
    /// Never empty.
    pub stakeholders: Vec<String>,
    pub impact: Category<ImpactLevel>,
    pub perception: Option<Category<Perception>>,
    pub mitigation: MitigationFlags,
    pub readiness: Option<f64>,
}

/// A change record specialized to exactly one stakeholder.
#[derive(Debug, Clone, Serialize)]
pub struct ExpandedRecord {
    /// Index of the originating record in `Normalized::records`.
    pub change_index: usize,
    pub stakeholder: String,
    pub identifier: Option<String>,
    pub impact: Category<ImpactLevel>,
    pub perception: Option<Category<Perception>>,
    pub mitigation: MitigationFlags,
    pub readiness: Option<f64>,
}

impl ExpandedRecord {
    pub fn from_change(change_index: usize, record: &ChangeRecord, stakeholder: &str) -> Self {
        Self {
            change_index,
            stakeholder: stakeholder.to_string(),
            identifier: record.identifier.clone(),
            impact: record.impact.clone(),
            perception: record.perception.clone(),
            mitigation: record.mitigation,
            readiness: record.readiness,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Categorical column a count table is built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Impact,
    Perception,
    Mitigation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Stakeholder,
    Workstream,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountRow {
    pub group: String,
    /// Aligned with `CountTable::categories`.
    pub counts: Vec<usize>,
    pub total: usize,
}

/// Cross-tabulation of (group, category) → count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountTable {
    pub dimension: Dimension,
    pub group_by: GroupBy,
    pub categories: Vec<String>,
    pub rows: Vec<CountRow>,
}

impl CountTable {
    pub fn row(&self, group: &str) -> Option<&CountRow> {
        self.rows.iter().find(|r| r.group == group)
    }

    /// Zero for unknown groups or categories.
    pub fn count(&self, group: &str, category: &str) -> usize {
        let Some(col) = self.categories.iter().position(|c| c == category) else {
            return 0;
        };
        self.row(group).map(|r| r.counts[col]).unwrap_or(0)
    }

    pub fn grand_total(&self) -> usize {
        self.rows.iter().map(|r| r.total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Insights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightRule {
    VolumeSummary,
    TopStakeholders,
    NegativeConcentration,
    HighNegativeOverlap,
    RepeatHighImpact,
    WorkstreamClustering,
    ReadinessGap,
    MitigationDemand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub rule: InsightRule,
    pub message: String,
    /// Stakeholders / workstreams the statement is about, in message order.
    pub subjects: Vec<String>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMeta {
    pub banner: String,
    pub engine_version: String,
    pub run_at: String,
    pub sheet: String,
    pub header_row: usize,
    pub selection: SheetSelection,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub changes: usize,
    pub expanded_records: usize,
    pub stakeholders: usize,
    /// Impact values outside Low/Medium/High (kept in totals).
    pub other_impact_values: usize,
    /// Perception values outside Positive/Neutral/Negative.
    pub other_perception_values: usize,
    /// Whether out-of-enumeration values appear as an "Other" chart column.
    pub other_bucketed: bool,
    pub stakeholders_deduplicated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub meta: AnalysisMeta,
    pub columns: ColumnRoleMap,
    pub summary: AnalysisSummary,
    pub charts: Vec<crate::chart::ChartSpec>,
    pub insights: Vec<Insight>,
    pub warnings: Vec<String>,
}

impl Analysis {
    pub fn chart(&self, id: &str) -> Option<&crate::chart::ChartSpec> {
        self.charts.iter().find(|c| c.id == id)
    }

    pub fn insight(&self, rule: InsightRule) -> Option<&Insight> {
        self.insights.iter().find(|i| i.rule == rule)
    }

    pub fn to_json_pretty(&self) -> Result<String, crate::error::AnalysisError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::AnalysisError::Io(format!("JSON serialization error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_keys_round_trip_through_from_str() {
        let roles = [
            Role::Identifier,
            Role::Stakeholder,
            Role::Impact,
            Role::Perception,
            Role::Mitigation(MitigationKind::Hr),
            Role::Readiness,
        ];
        for role in roles {
            assert_eq!(role.key().parse::<Role>().unwrap(), role);
        }
        assert!("mitigation:legal".parse::<Role>().is_err());
        assert_eq!(" Stakeholder ".parse::<Role>().unwrap(), Role::Stakeholder);
    }

    #[test]
    fn role_map_serializes_with_string_keys() {
        let mut map = ColumnRoleMap::default();
        map.insert(Role::Mitigation(MitigationKind::Comms), ResolvedColumn { index: 4, name: "Comms".into() });
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["mitigation:comms"]["index"], 4);
    }

    #[test]
    fn from_grid_names_blank_headers_by_letter() {
        let grid = vec![
            vec![CellValue::from("Preamble")],
            vec![CellValue::from("Process"), CellValue::Empty, CellValue::from("Impact")],
            vec![CellValue::from("A"), CellValue::from("x"), CellValue::from("High")],
            vec![CellValue::Empty, CellValue::from("  "), CellValue::Empty],
        ];
        let table = RawTable::from_grid(&grid, 1);
        assert_eq!(table.headers(), &["Process", "Column B", "Impact"]);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.cell(0, 2), &CellValue::from("High"));
        assert_eq!(table.cell(5, 9), &CellValue::Empty);
    }

    #[test]
    fn numeric_cells_render_without_fraction() {
        assert_eq!(CellValue::Number(3.0).as_text().as_deref(), Some("3"));
        assert_eq!(CellValue::Number(2.5).as_text().as_deref(), Some("2.5"));
        assert_eq!(CellValue::Number(f64::NAN).as_text(), None);
        assert_eq!(CellValue::from("  x ").as_text().as_deref(), Some("x"));
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(701), "ZZ");
    }

    #[test]
    fn count_table_lookup() {
        let table = CountTable {
            dimension: Dimension::Impact,
            group_by: GroupBy::Stakeholder,
            categories: vec!["Low".into(), "High".into()],
            rows: vec![CountRow { group: "IT".into(), counts: vec![1, 2], total: 3 }],
        };
        assert_eq!(table.count("IT", "High"), 2);
        assert_eq!(table.count("IT", "Medium"), 0);
        assert_eq!(table.count("HR", "Low"), 0);
        assert_eq!(table.grand_total(), 3);
    }
}
