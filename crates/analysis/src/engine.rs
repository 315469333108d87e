use log::{debug, warn};

use crate::aggregate::count_table;
use crate::chart::ChartSpec;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::insight::generate_insights;
use crate::model::{
    Analysis, AnalysisMeta, AnalysisSummary, Dimension, GroupBy, LoadedSheet, Role, BANNER,
};
use crate::normalize::normalize_rows;
use crate::resolve::{require_roles, resolve_columns};

/// Run the full pipeline over one loaded worksheet.
///
/// Resolver → Normalizer → Aggregator → {charts, insights}. Missing optional
/// columns degrade the output with warnings; only hard failures are errors.
pub fn analyze(sheet: &LoadedSheet, config: &AnalysisConfig) -> Result<Analysis, AnalysisError> {
    let headers = sheet.table.headers();
    let roles = resolve_columns(headers, &config.columns.rules);
    require_roles(&roles, &config.columns.required, headers)?;

    let mut warnings: Vec<String> = Vec::new();
    for role in &config.columns.expected {
        if !roles.contains(*role) {
            warnings.push(missing_role_warning(*role));
        }
    }

    let data = normalize_rows(&sheet.table, &roles, &config.normalize)?;
    debug!(
        "sheet '{}': {} rows read, {} dropped, {} changes, {} stakeholder records",
        sheet.name,
        data.rows_read,
        data.rows_dropped,
        data.records.len(),
        data.expanded.len()
    );

    if data.rows_dropped > 0 {
        warnings.push(format!(
            "{} of {} rows skipped: missing stakeholder group or impact level",
            data.rows_dropped, data.rows_read
        ));
    }
    let other_note = if config.aggregate.bucket_other {
        "charted as \"Other\""
    } else {
        "left out of the chart"
    };
    if data.other_impact > 0 {
        warnings.push(format!(
            "{} change(s) have an impact level outside Low/Medium/High ({other_note}; still counted in totals)",
            data.other_impact
        ));
    }
    if data.other_perception > 0 {
        warnings.push(format!(
            "{} change(s) have a perception outside Positive/Neutral/Negative ({other_note})",
            data.other_perception
        ));
    }

    let mut charts = vec![ChartSpec::new(
        count_table(&data.expanded, Dimension::Impact, GroupBy::Stakeholder, &config.aggregate),
        &config.chart,
    )];

    if roles.contains(Role::Perception) {
        let table = count_table(&data.expanded, Dimension::Perception, GroupBy::Stakeholder, &config.aggregate);
        if table.is_empty() {
            warnings.push("Perception column is empty: perception chart skipped".into());
        } else {
            charts.push(ChartSpec::new(table, &config.chart));
        }
    }

    if roles.mitigation_columns().next().is_some() {
        let table = count_table(&data.expanded, Dimension::Mitigation, GroupBy::Stakeholder, &config.aggregate);
        if !table.is_empty() {
            charts.push(ChartSpec::new(table, &config.chart));
        }
    }

    if config.aggregate.workstream_chart {
        if roles.contains(Role::Identifier) {
            let table = count_table(&data.expanded, Dimension::Impact, GroupBy::Workstream, &config.aggregate);
            if !table.is_empty() {
                charts.push(ChartSpec::new(table, &config.chart));
            }
        } else {
            warnings.push("No workstream/process column found: workstream chart skipped".into());
        }
    }

    for w in &warnings {
        warn!("{w}");
    }

    let insights = generate_insights(&data, &roles, &config.insights, &config.aggregate.impact_order);

    let summary = AnalysisSummary {
        rows_read: data.rows_read,
        rows_dropped: data.rows_dropped,
        changes: data.records.len(),
        expanded_records: data.expanded.len(),
        stakeholders: data.stakeholders().len(),
        other_impact_values: data.other_impact,
        other_perception_values: data.other_perception,
        other_bucketed: config.aggregate.bucket_other,
        stakeholders_deduplicated: config.normalize.dedupe_stakeholders,
    };

    Ok(Analysis {
        meta: AnalysisMeta {
            banner: BANNER.to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            sheet: sheet.name.clone(),
            header_row: sheet.header_row,
            selection: sheet.selection,
        },
        columns: roles,
        summary,
        charts,
        insights,
        warnings,
    })
}

fn missing_role_warning(role: Role) -> String {
    match role {
        Role::Perception => {
            "No Perception of Change column found: perception chart and perception insights skipped".into()
        }
        Role::Identifier => {
            "No Workstream/Process column found: workstream insights skipped".into()
        }
        other => format!("No {} column found", other.label()),
    }
}
