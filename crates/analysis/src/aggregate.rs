use std::collections::{HashMap, HashSet};

use crate::config::{AggregateConfig, RowOrder};
use crate::model::{CountRow, CountTable, Dimension, ExpandedRecord, GroupBy, Level, MitigationKind};

pub const OTHER_CATEGORY: &str = "Other";

/// Canonical column order for a dimension, before any "Other" bucket.
pub fn category_order(dimension: Dimension, config: &AggregateConfig) -> Vec<String> {
    match dimension {
        Dimension::Impact => config.impact_order.iter().map(|l| l.label().to_string()).collect(),
        Dimension::Perception => config.perception_order.iter().map(|l| l.label().to_string()).collect(),
        Dimension::Mitigation => MitigationKind::ALL.iter().map(|k| k.label().to_string()).collect(),
    }
}

/// Category labels one record contributes to a dimension.
fn record_categories(rec: &ExpandedRecord, dimension: Dimension) -> Vec<String> {
    match dimension {
        Dimension::Impact => vec![rec.impact.label().to_string()],
        Dimension::Perception => rec.perception.iter().map(|p| p.label().to_string()).collect(),
        Dimension::Mitigation => MitigationKind::ALL
            .iter()
            .filter(|k| rec.mitigation.get(**k))
            .map(|k| k.label().to_string())
            .collect(),
    }
}

/// Cross-tabulate `(group, category)` counts.
///
/// Stakeholder grouping counts every expanded record. Workstream grouping
/// counts each originating change once, and skips changes with no workstream.
/// Labels outside the canonical order land in a trailing "Other" column when
/// `bucket_other` is set and are left out otherwise.
pub fn count_table(
    expanded: &[ExpandedRecord],
    dimension: Dimension,
    group_by: GroupBy,
    config: &AggregateConfig,
) -> CountTable {
    let mut categories = category_order(dimension, config);
    let known = categories.len();
    let use_other = config.bucket_other && dimension != Dimension::Mitigation;

    let mut rows: Vec<CountRow> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut seen_changes: HashSet<usize> = HashSet::new();

    for rec in expanded {
        let group = match group_by {
            GroupBy::Stakeholder => rec.stakeholder.clone(),
            GroupBy::Workstream => match &rec.identifier {
                Some(id) if seen_changes.insert(rec.change_index) => id.clone(),
                _ => continue,
            },
        };

        for label in record_categories(rec, dimension) {
            let col = match categories[..known].iter().position(|c| *c == label) {
                Some(col) => col,
                None if use_other => {
                    if categories.len() == known {
                        categories.push(OTHER_CATEGORY.to_string());
                    }
                    known
                }
                None => continue,
            };

            let row_idx = *index.entry(group.clone()).or_insert_with(|| {
                rows.push(CountRow { group: group.clone(), counts: Vec::new(), total: 0 });
                rows.len() - 1
            });
            let row = &mut rows[row_idx];
            if row.counts.len() <= col {
                row.counts.resize(col + 1, 0);
            }
            row.counts[col] += 1;
            row.total += 1;
        }
    }

    for row in &mut rows {
        row.counts.resize(categories.len(), 0);
    }

    // Stable sorts keep first-seen order among equal totals.
    match config.row_order {
        RowOrder::Descending => rows.sort_by(|a, b| b.total.cmp(&a.total)),
        RowOrder::Ascending => rows.sort_by(|a, b| a.total.cmp(&b.total)),
        RowOrder::FirstSeen => {}
    }

    CountTable { dimension, group_by, categories, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, ImpactLevel, MitigationFlags, Perception};

    fn rec(change: usize, stakeholder: &str, impact: &str, perception: Option<&str>) -> ExpandedRecord {
        let impact = match ImpactLevel::from_label(impact) {
            Some(l) => Category::Known(l),
            None => Category::Other(impact.to_string()),
        };
        let perception = perception.map(|p| match Perception::from_label(p) {
            Some(l) => Category::Known(l),
            None => Category::Other(p.to_string()),
        });
        ExpandedRecord {
            change_index: change,
            stakeholder: stakeholder.into(),
            identifier: Some(format!("P{change}")),
            impact,
            perception,
            mitigation: MitigationFlags::default(),
            readiness: None,
        }
    }

    #[test]
    fn impact_counts_follow_canonical_order() {
        let records = vec![
            rec(0, "Finance", "High", Some("Negative")),
            rec(0, "IT", "High", Some("Negative")),
            rec(1, "HR", "Low", Some("Positive")),
            rec(2, "Finance", "High", Some("Negative")),
        ];
        let table = count_table(&records, Dimension::Impact, GroupBy::Stakeholder, &AggregateConfig::default());
        assert_eq!(table.categories, vec!["Low", "Medium", "High"]);
        assert_eq!(table.rows[0].group, "Finance");
        assert_eq!(table.rows[0].counts, vec![0, 0, 2]);
        assert_eq!(table.count("IT", "High"), 1);
        assert_eq!(table.count("HR", "Low"), 1);
        assert_eq!(table.grand_total(), 4);
    }

    #[test]
    fn perception_order_is_configurable() {
        let records = vec![rec(0, "A", "Low", Some("Positive")), rec(1, "A", "Low", Some("Negative"))];
        let config = AggregateConfig {
            perception_order: vec![Perception::Negative, Perception::Neutral, Perception::Positive],
            ..Default::default()
        };
        let table = count_table(&records, Dimension::Perception, GroupBy::Stakeholder, &config);
        assert_eq!(table.categories, vec!["Negative", "Neutral", "Positive"]);
        assert_eq!(table.rows[0].counts, vec![1, 0, 1]);
    }

    #[test]
    fn unrated_records_do_not_create_perception_rows() {
        let records = vec![rec(0, "A", "Low", None), rec(1, "B", "Low", Some("Neutral"))];
        let table = count_table(&records, Dimension::Perception, GroupBy::Stakeholder, &AggregateConfig::default());
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].group, "B");
    }

    #[test]
    fn other_values_bucketed_or_excluded() {
        let records = vec![rec(0, "A", "Critical", None), rec(1, "A", "High", None)];

        let bucketed = count_table(&records, Dimension::Impact, GroupBy::Stakeholder, &AggregateConfig::default());
        assert_eq!(bucketed.categories, vec!["Low", "Medium", "High", "Other"]);
        assert_eq!(bucketed.rows[0].counts, vec![0, 0, 1, 1]);
        assert_eq!(bucketed.rows[0].total, 2);

        let config = AggregateConfig { bucket_other: false, ..Default::default() };
        let excluded = count_table(&records, Dimension::Impact, GroupBy::Stakeholder, &config);
        assert_eq!(excluded.categories, vec!["Low", "Medium", "High"]);
        assert_eq!(excluded.rows[0].total, 1);
    }

    #[test]
    fn row_ordering_options() {
        let records = vec![
            rec(0, "A", "Low", None),
            rec(1, "B", "Low", None),
            rec(2, "B", "Low", None),
            rec(3, "C", "Low", None),
        ];
        let order = |row_order| {
            let config = AggregateConfig { row_order, ..Default::default() };
            count_table(&records, Dimension::Impact, GroupBy::Stakeholder, &config)
                .rows
                .into_iter()
                .map(|r| r.group)
                .collect::<Vec<_>>()
        };
        assert_eq!(order(RowOrder::Descending), vec!["B", "A", "C"]);
        assert_eq!(order(RowOrder::Ascending), vec!["A", "C", "B"]);
        assert_eq!(order(RowOrder::FirstSeen), vec!["A", "B", "C"]);
    }

    #[test]
    fn workstream_grouping_counts_each_change_once() {
        let records = vec![
            rec(0, "Finance", "High", None),
            rec(0, "IT", "High", None),
            rec(1, "HR", "High", None),
        ];
        let table = count_table(&records, Dimension::Impact, GroupBy::Workstream, &AggregateConfig::default());
        assert_eq!(table.count("P0", "High"), 1);
        assert_eq!(table.count("P1", "High"), 1);
        assert_eq!(table.grand_total(), 2);
    }

    #[test]
    fn mitigation_counts_each_flag() {
        let mut a = rec(0, "Ops", "Low", None);
        a.mitigation.comms = true;
        a.mitigation.training = true;
        let table = count_table(&[a], Dimension::Mitigation, GroupBy::Stakeholder, &AggregateConfig::default());
        assert_eq!(table.categories, vec!["Comms", "Training", "HR", "Other"]);
        assert_eq!(table.rows[0].counts, vec![1, 1, 0, 0]);
    }
}
