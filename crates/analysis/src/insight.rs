//! Rule-based textual insights.
//!
//! Each rule is independent: it checks its own precondition and minimum
//! support from [`InsightConfig`] and contributes at most one statement.
//! A rule that cannot apply is skipped, never an error.

use std::collections::HashMap;

use crate::config::InsightConfig;
use crate::model::{
    ColumnRoleMap, ImpactLevel, Insight, InsightRule, Level, MitigationKind, Perception, Role,
};
use crate::normalize::Normalized;

/// Per-stakeholder tallies over expanded records, in first-seen order.
#[derive(Debug, Default, Clone)]
struct StakeholderStats {
    name: String,
    total: usize,
    high: usize,
    rated: usize,
    negative: usize,
    high_negative: usize,
    readiness_sum: f64,
    readiness_n: usize,
}

fn stakeholder_stats(data: &Normalized) -> Vec<StakeholderStats> {
    let mut stats: Vec<StakeholderStats> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for rec in &data.expanded {
        let i = *index.entry(rec.stakeholder.as_str()).or_insert_with(|| {
            stats.push(StakeholderStats { name: rec.stakeholder.clone(), ..Default::default() });
            stats.len() - 1
        });
        let s = &mut stats[i];
        let high = rec.impact.is(ImpactLevel::High);
        s.total += 1;
        if high {
            s.high += 1;
        }
        if let Some(p) = &rec.perception {
            s.rated += 1;
            if p.is(Perception::Negative) {
                s.negative += 1;
                if high {
                    s.high_negative += 1;
                }
            }
        }
        if let Some(r) = rec.readiness {
            s.readiness_sum += r;
            s.readiness_n += 1;
        }
    }
    stats
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

/// Sort descending by `key`, stable so first-seen order breaks ties.
fn ranked<'a, K: PartialOrd>(
    stats: impl Iterator<Item = &'a StakeholderStats>,
    key: impl Fn(&StakeholderStats) -> K,
) -> Vec<&'a StakeholderStats> {
    let mut v: Vec<&StakeholderStats> = stats.collect();
    v.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(std::cmp::Ordering::Equal));
    v
}

fn insight(rule: InsightRule, message: String, subjects: Vec<String>) -> Option<Insight> {
    Some(Insight { rule, message, subjects })
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Levels are listed in reverse of the configured impact order, so the
/// default Low, Medium, High reads "High, Medium, Low".
fn volume_summary(
    data: &Normalized,
    stats: &[StakeholderStats],
    impact_order: &[ImpactLevel],
) -> Option<Insight> {
    if data.records.is_empty() {
        return None;
    }
    let mut parts: Vec<String> = impact_order
        .iter()
        .rev()
        .map(|level| {
            let n = data.records.iter().filter(|r| r.impact.is(*level)).count();
            format!("{n} {}", level.label())
        })
        .collect();
    let other = data.records.iter().filter(|r| r.impact.is_other()).count();
    if other > 0 {
        parts.push(format!("{other} Other"));
    }
    insight(
        InsightRule::VolumeSummary,
        format!(
            "{} analysed across {}: {} impact.",
            plural(data.records.len(), "change", "changes"),
            plural(stats.len(), "stakeholder group", "stakeholder groups"),
            parts.join(", ")
        ),
        Vec::new(),
    )
}

fn top_stakeholders(stats: &[StakeholderStats], config: &InsightConfig) -> Option<Insight> {
    let top: Vec<&StakeholderStats> =
        ranked(stats.iter(), |s| s.total).into_iter().take(config.top_n).collect();
    if top.is_empty() {
        return None;
    }
    let listed: Vec<String> = top.iter().map(|s| format!("{} ({})", s.name, s.total)).collect();
    insight(
        InsightRule::TopStakeholders,
        format!("Most affected stakeholder groups: {}.", listed.join(", ")),
        top.iter().map(|s| s.name.clone()).collect(),
    )
}

fn negative_concentration(stats: &[StakeholderStats], config: &InsightConfig) -> Option<Insight> {
    // Share of all the stakeholder's records, rated or not.
    let share = |s: &StakeholderStats| s.negative as f64 / s.total as f64;
    let flagged = ranked(
        stats.iter().filter(|s| {
            s.rated >= config.negative_min_records
                && s.negative > 0
                && share(s) >= config.negative_share_threshold
        }),
        share,
    );
    if flagged.is_empty() {
        return None;
    }
    let listed: Vec<String> = flagged
        .iter()
        .map(|s| format!("{} ({:.0}% of {})", s.name, share(s) * 100.0, s.total))
        .collect();
    insight(
        InsightRule::NegativeConcentration,
        format!(
            "Negative perception concentrated (≥{:.0}%) in: {}.",
            config.negative_share_threshold * 100.0,
            listed.join(", ")
        ),
        flagged.iter().map(|s| s.name.clone()).collect(),
    )
}

fn high_negative_overlap(stats: &[StakeholderStats], config: &InsightConfig) -> Option<Insight> {
    let flagged = ranked(
        stats.iter().filter(|s| s.high_negative >= config.overlap_min_records),
        |s| s.high_negative,
    );
    if flagged.is_empty() {
        return None;
    }
    let listed: Vec<String> = flagged.iter().map(|s| format!("{} ({})", s.name, s.high_negative)).collect();
    insight(
        InsightRule::HighNegativeOverlap,
        format!("High-impact changes perceived negatively by: {}.", listed.join(", ")),
        flagged.iter().map(|s| s.name.clone()).collect(),
    )
}

fn repeat_high_impact(stats: &[StakeholderStats], config: &InsightConfig) -> Option<Insight> {
    let flagged = ranked(stats.iter().filter(|s| s.high >= config.repeat_high_min), |s| s.high);
    if flagged.is_empty() {
        return None;
    }
    let listed: Vec<String> = flagged.iter().map(|s| format!("{} ({})", s.name, s.high)).collect();
    insight(
        InsightRule::RepeatHighImpact,
        format!("Stakeholder groups facing repeated high-impact changes: {}.", listed.join(", ")),
        flagged.iter().map(|s| s.name.clone()).collect(),
    )
}

fn workstream_clustering(data: &Normalized, config: &InsightConfig) -> Option<Insight> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for rec in data.records.iter().filter(|r| r.impact.is(ImpactLevel::High)) {
        let Some(id) = rec.identifier.as_deref() else { continue };
        match counts.iter_mut().find(|(w, _)| *w == id) {
            Some((_, n)) => *n += 1,
            None => counts.push((id, 1)),
        }
    }
    counts.retain(|(_, n)| *n >= config.workstream_high_min);
    if counts.is_empty() {
        return None;
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let listed: Vec<String> = counts.iter().map(|(w, n)| format!("{w} ({n})")).collect();
    insight(
        InsightRule::WorkstreamClustering,
        format!("Workstreams with clustered high-impact changes: {}.", listed.join(", ")),
        counts.iter().map(|(w, _)| w.to_string()).collect(),
    )
}

fn readiness_gap(stats: &[StakeholderStats], config: &InsightConfig) -> Option<Insight> {
    let mean = |s: &StakeholderStats| s.readiness_sum / s.readiness_n as f64;
    let mut flagged: Vec<&StakeholderStats> = stats
        .iter()
        .filter(|s| s.readiness_n >= config.readiness_min_records && mean(s) <= config.readiness_threshold)
        .collect();
    if flagged.is_empty() {
        return None;
    }
    // Lowest readiness first.
    flagged.sort_by(|a, b| mean(a).partial_cmp(&mean(b)).unwrap_or(std::cmp::Ordering::Equal));
    let listed: Vec<String> = flagged
        .iter()
        .map(|s| format!("{} (avg {:.1} over {})", s.name, mean(s), s.readiness_n))
        .collect();
    insight(
        InsightRule::ReadinessGap,
        format!(
            "Low change readiness (≤{}) in: {}.",
            config.readiness_threshold,
            listed.join(", ")
        ),
        flagged.iter().map(|s| s.name.clone()).collect(),
    )
}

fn mitigation_demand(data: &Normalized, roles: &ColumnRoleMap) -> Option<Insight> {
    let kinds: Vec<MitigationKind> = roles.mitigation_columns().map(|(k, _)| k).collect();
    let mut best: Option<(MitigationKind, usize)> = None;
    for kind in kinds {
        let n = data.records.iter().filter(|r| r.mitigation.get(kind)).count();
        if n > 0 && best.map_or(true, |(_, m)| n > m) {
            best = Some((kind, n));
        }
    }
    let (kind, n) = best?;
    insight(
        InsightRule::MitigationDemand,
        format!(
            "Most requested mitigation: {} ({} of {}).",
            kind.label(),
            n,
            plural(data.records.len(), "change", "changes")
        ),
        vec![kind.label().to_string()],
    )
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Evaluate every rule in order and keep the ones that produced a statement.
pub fn generate_insights(
    data: &Normalized,
    roles: &ColumnRoleMap,
    config: &InsightConfig,
    impact_order: &[ImpactLevel],
) -> Vec<Insight> {
    let stats = stakeholder_stats(data);
    let has_perception = roles.contains(Role::Perception) && data.has_perception();
    let has_readiness = roles.contains(Role::Readiness);

    [
        volume_summary(data, &stats, impact_order),
        top_stakeholders(&stats, config),
        has_perception.then(|| negative_concentration(&stats, config)).flatten(),
        has_perception.then(|| high_negative_overlap(&stats, config)).flatten(),
        repeat_high_impact(&stats, config),
        roles
            .contains(Role::Identifier)
            .then(|| workstream_clustering(data, config))
            .flatten(),
        has_readiness.then(|| readiness_gap(&stats, config)).flatten(),
        mitigation_demand(data, roles),
    ]
    .into_iter()
    .flatten()
    .collect()
}
