//! Presentational chart descriptions. Rendering itself happens elsewhere
//! (xlsx report, terminal); this module only fixes titles, labels and colors.

use serde::Serialize;

use crate::aggregate::OTHER_CATEGORY;
use crate::config::{ChartConfig, Orientation};
use crate::model::{CountTable, Dimension, GroupBy};

/// Color for a category that has no fixed mapping.
pub const FALLBACK_COLOR: &str = "#808080";

/// Fixed category → color mapping (hex RGB).
pub fn category_color(dimension: Dimension, category: &str) -> &'static str {
    match (dimension, category) {
        (Dimension::Impact, "Low") => "#2CA02C",
        (Dimension::Impact, "Medium") => "#FF8C00",
        (Dimension::Impact, "High") => "#D62728",
        (Dimension::Perception, "Positive") => "#2CA02C",
        (Dimension::Perception, "Neutral") => "#1F77B4",
        (Dimension::Perception, "Negative") => "#D62728",
        (Dimension::Mitigation, "Comms") => "#1F77B4",
        (Dimension::Mitigation, "Training") => "#FF7F0E",
        (Dimension::Mitigation, "HR") => "#9467BD",
        (Dimension::Mitigation, OTHER_CATEGORY) => "#8C564B",
        _ => FALLBACK_COLOR,
    }
}

/// Parse `#RRGGBB` into a packed `0xRRGGBB`.
pub fn hex_to_rgb(hex: &str) -> Option<u32> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    /// Stable identifier, e.g. `impact_by_stakeholder`.
    pub id: String,
    /// Section heading shown above the chart.
    pub heading: String,
    pub title: String,
    /// Label of the count axis.
    pub value_axis: String,
    /// Label of the group axis.
    pub group_axis: String,
    pub legend_title: String,
    pub orientation: Orientation,
    pub segment_labels: bool,
    /// One color per `table.categories` entry.
    pub colors: Vec<String>,
    pub table: CountTable,
}

impl ChartSpec {
    pub fn new(table: CountTable, config: &ChartConfig) -> Self {
        let (group_axis, group_word) = match table.group_by {
            GroupBy::Stakeholder => ("Stakeholder Group", "Stakeholder"),
            GroupBy::Workstream => ("Workstream", "Workstream"),
        };
        let (id_dim, heading, title, legend_title) = match table.dimension {
            Dimension::Impact => (
                "impact",
                format!("Change Impacts by {group_axis}"),
                format!("Distribution of Change Impact Levels by {group_word}"),
                "Level of Impact",
            ),
            Dimension::Perception => (
                "perception",
                format!("Perception of Change by {group_word}"),
                format!("Distribution of Change Perception Levels by {group_word}"),
                "Perception of Change",
            ),
            Dimension::Mitigation => (
                "mitigation",
                format!("Mitigation Needs by {group_axis}"),
                format!("Mitigation Categories Flagged by {group_word}"),
                "Mitigation",
            ),
        };
        let id_group = match table.group_by {
            GroupBy::Stakeholder => "stakeholder",
            GroupBy::Workstream => "workstream",
        };
        let colors = table
            .categories
            .iter()
            .map(|c| category_color(table.dimension, c).to_string())
            .collect();

        Self {
            id: format!("{id_dim}_by_{id_group}"),
            heading,
            title,
            value_axis: "Number of Changes".into(),
            group_axis: group_axis.into(),
            legend_title: legend_title.into(),
            orientation: config.orientation,
            segment_labels: config.segment_labels,
            colors,
            table,
        }
    }
}
