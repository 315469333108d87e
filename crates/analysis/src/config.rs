use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::model::{ImpactLevel, MitigationKind, Perception, Role};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything tunable about one analysis run. Every section is optional in
/// TOML; omitted sections take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub loader: LoaderConfig,
    pub columns: ColumnsConfig,
    pub normalize: NormalizeConfig,
    pub aggregate: AggregateConfig,
    pub insights: InsightConfig,
    pub chart: ChartConfig,
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Worksheet names tried first (trimmed, case-insensitive).
    pub sheet_names: Vec<String>,
    /// Zero-based header row. `None` auto-detects within the preamble window.
    pub header_row: Option<usize>,
    /// Preamble rows searched when auto-detecting the header row.
    pub max_preamble_rows: usize,
    /// Fall back to the first non-empty sheet when nothing else matches.
    pub fallback_to_first: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            sheet_names: vec!["Known Change Impacts".into()],
            header_row: None,
            max_preamble_rows: 2,
            fallback_to_first: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Column roles
// ---------------------------------------------------------------------------

/// One keyword predicate for a role. A header matches when its normalized
/// name contains every `all_of` keyword and none of the `none_of` keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleRule {
    pub role: Role,
    pub all_of: Vec<String>,
    #[serde(default)]
    pub none_of: Vec<String>,
}

impl RoleRule {
    pub fn new(role: Role, all_of: &[&str], none_of: &[&str]) -> Self {
        Self {
            role,
            all_of: all_of.iter().map(|s| s.to_string()).collect(),
            none_of: none_of.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnsConfig {
    /// Roles whose absence aborts the run.
    pub required: Vec<Role>,
    /// Roles whose absence produces a warning and skips dependent output.
    pub expected: Vec<Role>,
    pub rules: Vec<RoleRule>,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            required: vec![Role::Stakeholder, Role::Impact],
            expected: vec![Role::Perception],
            rules: default_rules(),
        }
    }
}

pub fn default_rules() -> Vec<RoleRule> {
    use MitigationKind::*;
    vec![
        RoleRule::new(Role::Identifier, &["workstream"], &[]),
        RoleRule::new(Role::Identifier, &["process"], &[]),
        RoleRule::new(Role::Stakeholder, &["stakeholder"], &[]),
        RoleRule::new(Role::Impact, &["impact"], &["mitigation", "perception", "stakeholder"]),
        RoleRule::new(Role::Perception, &["perception"], &[]),
        RoleRule::new(Role::Mitigation(Comms), &["communication"], &[]),
        RoleRule::new(Role::Mitigation(Comms), &["mitigation", "comm"], &[]),
        RoleRule::new(Role::Mitigation(Training), &["training"], &[]),
        RoleRule::new(Role::Mitigation(Hr), &["human resources"], &[]),
        RoleRule::new(Role::Mitigation(Hr), &["mitigation", "hr"], &[]),
        RoleRule::new(Role::Mitigation(Other), &["mitigation", "other"], &[]),
        RoleRule::new(Role::Readiness, &["readiness"], &[]),
    ]
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeConfig {
    /// Every character is a stakeholder delimiter.
    pub delimiters: String,
    /// Collapse repeated stakeholders within one row before fan-out.
    pub dedupe_stakeholders: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            delimiters: ",".into(),
            dedupe_stakeholders: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOrder {
    /// Largest total first.
    Descending,
    Ascending,
    FirstSeen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregateConfig {
    pub impact_order: Vec<ImpactLevel>,
    pub perception_order: Vec<Perception>,
    pub row_order: RowOrder,
    /// Count out-of-enumeration values under an "Other" column.
    pub bucket_other: bool,
    /// Also chart impact by workstream when an identifier column exists.
    pub workstream_chart: bool,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            impact_order: vec![ImpactLevel::Low, ImpactLevel::Medium, ImpactLevel::High],
            perception_order: vec![Perception::Positive, Perception::Neutral, Perception::Negative],
            row_order: RowOrder::Descending,
            bucket_other: true,
            workstream_chart: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Insights
// ---------------------------------------------------------------------------

/// Minimum-support thresholds for each insight rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InsightConfig {
    /// Stakeholders listed by the top-volume rule.
    pub top_n: usize,
    /// Share of negative perception that flags a stakeholder (0, 1].
    pub negative_share_threshold: f64,
    /// Perception-rated records a stakeholder needs before its share counts.
    pub negative_min_records: usize,
    /// High + Negative records needed for the overlap rule.
    pub overlap_min_records: usize,
    /// High-impact records needed to count as repeat high impact.
    pub repeat_high_min: usize,
    /// Distinct high-impact changes needed to flag a workstream.
    pub workstream_high_min: usize,
    /// Mean readiness at or below this flags a stakeholder.
    pub readiness_threshold: f64,
    pub readiness_min_records: usize,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            top_n: 3,
            negative_share_threshold: 0.6,
            negative_min_records: 1,
            overlap_min_records: 1,
            repeat_high_min: 2,
            workstream_high_min: 2,
            readiness_threshold: 2.5,
            readiness_min_records: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartConfig {
    pub orientation: Orientation,
    /// Print the count inside every bar segment.
    pub segment_labels: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            orientation: Orientation::Horizontal,
            segment_labels: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl AnalysisConfig {
    pub fn from_toml(input: &str) -> Result<Self, AnalysisError> {
        let config: AnalysisConfig =
            toml::from_str(input).map_err(|e| AnalysisError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, AnalysisError> {
        toml::to_string_pretty(self).map_err(|e| AnalysisError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |msg: String| Err(AnalysisError::ConfigValidation(msg));

        if !self.columns.required.contains(&Role::Stakeholder) {
            return invalid("columns.required must include \"stakeholder\"".into());
        }
        for role in self.columns.required.iter().chain(&self.columns.expected) {
            if !self.columns.rules.iter().any(|r| r.role == *role) {
                return invalid(format!("no column rule defined for role \"{role}\""));
            }
        }
        for rule in &self.columns.rules {
            if rule.all_of.iter().all(|k| k.trim().is_empty()) {
                return invalid(format!("rule for role \"{}\" has no keywords", rule.role));
            }
        }

        if self.normalize.delimiters.is_empty() {
            return invalid("normalize.delimiters must not be empty".into());
        }

        if self.aggregate.impact_order.is_empty() {
            return invalid("aggregate.impact_order must not be empty".into());
        }
        if self.aggregate.perception_order.is_empty() {
            return invalid("aggregate.perception_order must not be empty".into());
        }
        if has_duplicates(&self.aggregate.impact_order) {
            return invalid("aggregate.impact_order contains duplicates".into());
        }
        if has_duplicates(&self.aggregate.perception_order) {
            return invalid("aggregate.perception_order contains duplicates".into());
        }

        let ins = &self.insights;
        if ins.top_n == 0 {
            return invalid("insights.top_n must be at least 1".into());
        }
        if !(ins.negative_share_threshold > 0.0 && ins.negative_share_threshold <= 1.0) {
            return invalid(format!(
                "insights.negative_share_threshold must be in (0, 1], got {}",
                ins.negative_share_threshold
            ));
        }
        if ins.negative_min_records == 0
            || ins.overlap_min_records == 0
            || ins.repeat_high_min == 0
            || ins.workstream_high_min == 0
            || ins.readiness_min_records == 0
        {
            return invalid("insight minimum-support thresholds must be at least 1".into());
        }
        if !ins.readiness_threshold.is_finite() {
            return invalid("insights.readiness_threshold must be a finite number".into());
        }

        Ok(())
    }
}

fn has_duplicates<T: std::hash::Hash + Eq>(items: &[T]) -> bool {
    let mut seen = HashSet::new();
    items.iter().any(|item| !seen.insert(item))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
