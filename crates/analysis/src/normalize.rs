//! Row normalization: drop incomplete rows, canonicalize categorical text,
//! and fan each change out into one record per stakeholder.

use std::collections::HashMap;

use log::debug;

use crate::config::NormalizeConfig;
use crate::error::AnalysisError;
use crate::model::{
    Category, CellValue, ChangeRecord, ColumnRoleMap, ExpandedRecord, ImpactLevel, Level,
    MitigationFlags, Perception, RawTable, Role,
};

/// Output of [`normalize_rows`].
#[derive(Debug, Clone)]
pub struct Normalized {
    pub records: Vec<ChangeRecord>,
    pub expanded: Vec<ExpandedRecord>,
    pub rows_read: usize,
    pub rows_dropped: usize,
    /// Records whose impact fell outside Low/Medium/High.
    pub other_impact: usize,
    /// Records whose perception fell outside Positive/Neutral/Negative.
    pub other_perception: usize,
}

impl Normalized {
    /// Distinct stakeholders in first-seen order.
    pub fn stakeholders(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for rec in &self.expanded {
            if !seen.contains(&rec.stakeholder.as_str()) {
                seen.push(&rec.stakeholder);
            }
        }
        seen
    }

    pub fn has_perception(&self) -> bool {
        self.records.iter().any(|r| r.perception.is_some())
    }
}

/// Trim, collapse inner whitespace, and title-case each word: `" HIGH "` → `"High"`.
pub fn canonicalize(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Canonicalize a categorical cell; `None` when blank.
pub fn parse_category<T: Level>(cell: &CellValue) -> Option<Category<T>> {
    let label = canonicalize(&cell.as_text()?);
    if label.is_empty() {
        return None;
    }
    Some(match T::from_label(&label) {
        Some(level) => Category::Known(level),
        None => Category::Other(label),
    })
}

/// Split a stakeholder list on any delimiter character, trimming tokens and
/// dropping empties. With `dedupe`, repeats (ignoring case) keep their first
/// position only.
pub fn split_stakeholders(raw: &str, delimiters: &str, dedupe: bool) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in raw.split(|c: char| delimiters.contains(c)) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if dedupe && out.iter().any(|s| s.to_lowercase() == token.to_lowercase()) {
            continue;
        }
        out.push(token.to_string());
    }
    out
}

/// Lenient numeric parse: numbers, numeric text, and trailing `%`.
pub fn parse_readiness(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Text(s) => {
            let s = s.trim();
            let s = s.strip_suffix('%').map(str::trim_end).unwrap_or(s);
            s.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

const FALSY: &[&str] = &["no", "n", "false", "0", "none", "n/a", "na", "-"];

/// Mitigation columns flag a need unless blank or an explicit "no".
pub fn is_flagged(cell: &CellValue) -> bool {
    match cell {
        CellValue::Empty => false,
        CellValue::Bool(b) => *b,
        CellValue::Number(n) => !n.is_nan() && *n != 0.0,
        CellValue::Text(s) => {
            let s = s.trim().to_lowercase();
            !s.is_empty() && !FALSY.contains(&s.as_str())
        }
    }
}

/// Turn raw rows into change records and their per-stakeholder expansion.
pub fn normalize_rows(
    table: &RawTable,
    roles: &ColumnRoleMap,
    config: &NormalizeConfig,
) -> Result<Normalized, AnalysisError> {
    let (Some(stakeholder_col), Some(impact_col)) = (roles.get(Role::Stakeholder), roles.get(Role::Impact))
    else {
        let roles_missing = [Role::Stakeholder, Role::Impact]
            .into_iter()
            .filter(|r| !roles.contains(*r))
            .collect();
        return Err(AnalysisError::RequiredColumnMissing {
            roles: roles_missing,
            headers: table.headers().to_vec(),
        });
    };
    let identifier_col = roles.get(Role::Identifier).map(|c| c.index);
    let perception_col = roles.get(Role::Perception).map(|c| c.index);
    let readiness_col = roles.get(Role::Readiness).map(|c| c.index);
    let mitigation_cols: Vec<_> = roles.mitigation_columns().map(|(k, c)| (k, c.index)).collect();

    let mut records = Vec::new();
    let mut expanded = Vec::new();
    let mut rows_dropped = 0;
    let mut other_impact = 0;
    let mut other_perception = 0;
    // Lowercased name -> first spelling seen, so "finance" groups with "Finance"
    let mut spellings: HashMap<String, String> = HashMap::new();

    for row in 0..table.row_count() {
        let stakeholders: Vec<String> = table
            .cell(row, stakeholder_col.index)
            .as_text()
            .map(|raw| split_stakeholders(&raw, &config.delimiters, config.dedupe_stakeholders))
            .unwrap_or_default()
            .into_iter()
            .map(|name| spellings.entry(name.to_lowercase()).or_insert(name).clone())
            .collect();
        let impact = parse_category::<ImpactLevel>(table.cell(row, impact_col.index));

        let Some(impact) = impact.filter(|_| !stakeholders.is_empty()) else {
            debug!("row {}: dropped (missing stakeholder or impact)", row + 1);
            rows_dropped += 1;
            continue;
        };

        let perception =
            perception_col.and_then(|col| parse_category::<Perception>(table.cell(row, col)));

        if impact.is_other() {
            other_impact += 1;
        }
        if perception.as_ref().is_some_and(|p| p.is_other()) {
            other_perception += 1;
        }

        let mut mitigation = MitigationFlags::default();
        for (kind, col) in &mitigation_cols {
            mitigation.set(*kind, is_flagged(table.cell(row, *col)));
        }

        let record = ChangeRecord {
            source_row: row,
            identifier: identifier_col.and_then(|col| table.cell(row, col).as_text()),
            stakeholders,
            impact,
            perception,
            mitigation,
            readiness: readiness_col.and_then(|col| parse_readiness(table.cell(row, col))),
        };

        let change_index = records.len();
        for stakeholder in &record.stakeholders {
            expanded.push(ExpandedRecord::from_change(change_index, &record, stakeholder));
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(AnalysisError::NoValidData { rows_read: table.row_count() });
    }

    Ok(Normalized {
        records,
        expanded,
        rows_read: table.row_count(),
        rows_dropped,
        other_impact,
        other_perception,
    })
}
