//! Plain-text rendering for the terminal: banner, stacked bar charts,
//! insights and warnings.

use impactlens_analysis::config::Orientation;
use impactlens_analysis::model::{column_letter, ColumnRoleMap, Role};
use impactlens_analysis::{Analysis, ChartSpec, LoadedSheet};

use crate::util::{align_right, display_width, fit};

/// Columns used by the longest horizontal bar.
const BAR_WIDTH: usize = 40;
/// Rows used by the tallest vertical column.
const COLUMN_HEIGHT: usize = 12;
const MAX_LABEL_WIDTH: usize = 24;
/// Fill per category position; wraps after the fifth category.
const GLYPHS: &[char] = &['░', '▒', '▓', '█', '▚'];

fn glyph(index: usize) -> char {
    GLYPHS[index % GLYPHS.len()]
}

/// Full human-readable report.
pub(crate) fn render_analysis(analysis: &Analysis, source: &str) -> String {
    let mut lines = Vec::new();
    let meta = &analysis.meta;
    let summary = &analysis.summary;

    lines.push(meta.banner.clone());
    lines.push("=".repeat(display_width(&meta.banner)));
    lines.push(format!(
        "Source: {}, sheet '{}' ({}, header row {})",
        source,
        meta.sheet,
        meta.selection,
        meta.header_row + 1
    ));
    let mut counts = format!(
        "{} change(s) across {} stakeholder group(s), {} listing(s)",
        summary.changes, summary.stakeholders, summary.expanded_records
    );
    if summary.rows_dropped > 0 {
        counts.push_str(&format!(", {} row(s) dropped", summary.rows_dropped));
    }
    lines.push(counts);

    for spec in &analysis.charts {
        lines.push(String::new());
        lines.extend(render_chart(spec));
    }

    lines.push(String::new());
    lines.push("Key Insights".into());
    lines.push("------------".into());
    if analysis.insights.is_empty() {
        lines.push("No insights for this data.".into());
    }
    for insight in &analysis.insights {
        lines.push(format!("• {}", insight.message));
    }

    if !analysis.warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings".into());
        lines.push("--------".into());
        for warning in &analysis.warnings {
            lines.push(format!("! {}", warning));
        }
    }

    lines.push(String::new());
    lines.join("\n")
}

/// One chart: heading, title, bars, legend.
pub(crate) fn render_chart(spec: &ChartSpec) -> Vec<String> {
    let mut lines = vec![spec.heading.clone(), "-".repeat(display_width(&spec.heading))];
    lines.push(format!("{} ({} vs {})", spec.title, spec.value_axis, spec.group_axis));

    if spec.table.is_empty() {
        lines.push("(no data)".into());
        return lines;
    }

    match spec.orientation {
        Orientation::Horizontal => lines.extend(horizontal_bars(spec)),
        Orientation::Vertical => lines.extend(vertical_columns(spec)),
    }

    let legend: Vec<String> = spec
        .table
        .categories
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} {}", glyph(i), c))
        .collect();
    lines.push(format!("{}: {}", spec.legend_title, legend.join("  ")));
    lines
}

/// Nonzero segments as "High 2, Low 1".
fn segment_breakdown(spec: &ChartSpec, counts: &[usize]) -> String {
    spec.table
        .categories
        .iter()
        .zip(counts)
        .filter(|(_, &n)| n > 0)
        .map(|(c, n)| format!("{} {}", c, n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn horizontal_bars(spec: &ChartSpec) -> Vec<String> {
    let table = &spec.table;
    let max_total = table.rows.iter().map(|r| r.total).max().unwrap_or(0).max(1);
    let label_width = table
        .rows
        .iter()
        .map(|r| display_width(&r.group))
        .max()
        .unwrap_or(0)
        .min(MAX_LABEL_WIDTH);
    let total_width = max_total.to_string().len();

    table
        .rows
        .iter()
        .map(|row| {
            let mut bar = String::new();
            for (i, len) in segment_lengths(&row.counts, max_total, BAR_WIDTH).into_iter().enumerate() {
                bar.extend(std::iter::repeat(glyph(i)).take(len));
            }
            let mut line = format!(
                "  {} │{} {}",
                fit(&row.group, label_width),
                fit(&bar, BAR_WIDTH + 1),
                align_right(&row.total.to_string(), total_width)
            );
            if spec.segment_labels {
                line.push_str(&format!("  ({})", segment_breakdown(spec, &row.counts)));
            }
            line.trim_end().to_string()
        })
        .collect()
}

/// Groups are numbered along the x axis; the key below maps numbers to names.
fn vertical_columns(spec: &ChartSpec) -> Vec<String> {
    const CELL: usize = 4;

    let table = &spec.table;
    let max_total = table.rows.iter().map(|r| r.total).max().unwrap_or(0).max(1);
    let stacks: Vec<Vec<char>> = table
        .rows
        .iter()
        .map(|row| {
            segment_lengths(&row.counts, max_total, COLUMN_HEIGHT)
                .into_iter()
                .enumerate()
                .flat_map(|(i, len)| std::iter::repeat(glyph(i)).take(len))
                .collect()
        })
        .collect();
    let height = stacks.iter().map(|s| s.len()).max().unwrap_or(0);

    let mut lines = Vec::new();
    for level in (0..height).rev() {
        let mut line = String::from("  │");
        for stack in &stacks {
            let ch = stack.get(level).copied().unwrap_or(' ');
            line.push(' ');
            line.extend(std::iter::repeat(ch).take(CELL - 2));
            line.push(' ');
        }
        lines.push(line.trim_end().to_string());
    }
    lines.push(format!("  └{}", "─".repeat(CELL * stacks.len())));

    let mut axis = String::from("   ");
    for i in 0..stacks.len() {
        axis.push_str(&fit(&align_right(&(i + 1).to_string(), CELL - 1), CELL));
    }
    lines.push(axis.trim_end().to_string());

    for (i, row) in table.rows.iter().enumerate() {
        let mut line = format!("  {:>2}. {} ({})", i + 1, row.group, row.total);
        if spec.segment_labels {
            line.push_str(&format!(": {}", segment_breakdown(spec, &row.counts)));
        }
        lines.push(line);
    }
    lines
}

/// Scale a stack of counts to `width` cells. Segment ends are rounded on the
/// cumulative sum so the stack length tracks the total. A nonzero count that
/// rounds to nothing borrows a cell from the largest segment, so the stack
/// never grows past its scaled length.
pub(crate) fn segment_lengths(counts: &[usize], max_total: usize, width: usize) -> Vec<usize> {
    let max_total = max_total.max(1);
    let mut lengths = Vec::with_capacity(counts.len());
    let mut cumulative = 0;
    let mut drawn = 0;
    for &count in counts {
        cumulative += count;
        let end = (cumulative * width + max_total / 2) / max_total;
        let len = end.saturating_sub(drawn);
        drawn += len;
        lengths.push(len);
    }

    // A row with any count shows at least one cell
    if drawn == 0 && width > 0 {
        if let Some(i) = counts.iter().position(|&c| c > 0) {
            lengths[i] = 1;
        }
    }

    for i in 0..counts.len() {
        if counts[i] == 0 || lengths[i] > 0 {
            continue;
        }
        let donor = (0..lengths.len())
            .filter(|&j| lengths[j] > 1)
            .max_by_key(|&j| (lengths[j], std::cmp::Reverse(j)));
        if let Some(j) = donor {
            lengths[j] -= 1;
            lengths[i] = 1;
        }
    }
    lengths
}

/// Output of `impactlens columns`.
pub(crate) fn render_columns(
    sheet: &LoadedSheet,
    source: &str,
    roles: &ColumnRoleMap,
    missing_required: &[Role],
    missing_expected: &[Role],
) -> String {
    let mut lines = vec![
        format!("Source: {}", source),
        format!(
            "Sheet:  '{}' ({}, header row {}, {} data row(s))",
            sheet.name,
            sheet.selection,
            sheet.header_row + 1,
            sheet.table.row_count()
        ),
        String::new(),
    ];

    let role_width = roles
        .iter()
        .map(|(role, _)| display_width(role.label()))
        .chain(std::iter::once(display_width("Role")))
        .max()
        .unwrap_or(0);

    lines.push(format!("{}  Col  Header", fit("Role", role_width)));
    for (role, column) in roles.iter() {
        lines.push(format!(
            "{}  {}  {}",
            fit(role.label(), role_width),
            fit(&column_letter(column.index), 3),
            column.name
        ));
    }

    for role in missing_required {
        lines.push(format!("{}  --   missing (required)", fit(role.label(), role_width)));
    }
    for role in missing_expected {
        lines.push(format!("{}  --   missing (expected)", fit(role.label(), role_width)));
    }

    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use impactlens_analysis::config::ChartConfig;
    use impactlens_analysis::model::{CountRow, CountTable, Dimension, GroupBy};

    fn impact_spec(orientation: Orientation) -> ChartSpec {
        let config = ChartConfig { orientation, ..Default::default() };
        ChartSpec::new(
            CountTable {
                dimension: Dimension::Impact,
                group_by: GroupBy::Stakeholder,
                categories: vec!["Low".into(), "Medium".into(), "High".into()],
                rows: vec![
                    CountRow { group: "Finance".into(), counts: vec![0, 0, 2], total: 2 },
                    CountRow { group: "HR".into(), counts: vec![1, 0, 0], total: 1 },
                ],
            },
            &config,
        )
    }

    #[test]
    fn segment_lengths_scale_to_width() {
        assert_eq!(segment_lengths(&[0, 0, 2], 2, 40), vec![0, 0, 40]);
        assert_eq!(segment_lengths(&[1, 0, 0], 2, 40), vec![20, 0, 0]);
        assert_eq!(segment_lengths(&[1, 1], 2, 40), vec![20, 20]);
    }

    #[test]
    fn tiny_segments_stay_visible() {
        assert_eq!(segment_lengths(&[1, 0, 100], 101, 10), vec![1, 0, 9]);
        assert_eq!(segment_lengths(&[1], 1000, 40), vec![1]);
    }

    #[test]
    fn tiny_segments_never_overflow_the_bar() {
        let lengths = segment_lengths(&[100, 1], 101, 40);
        assert_eq!(lengths, vec![39, 1]);
        assert_eq!(lengths.iter().sum::<usize>(), 40);

        let lengths = segment_lengths(&[1, 200, 1, 1], 203, 20);
        assert!(lengths.iter().all(|&l| l >= 1));
        assert_eq!(lengths.iter().sum::<usize>(), 20);
    }

    #[test]
    fn horizontal_chart_lines() {
        let lines = render_chart(&impact_spec(Orientation::Horizontal));
        assert_eq!(lines[0], "Change Impacts by Stakeholder Group");
        let finance = lines.iter().find(|l| l.contains("Finance")).unwrap();
        assert!(finance.contains(&"█".repeat(40)));
        assert!(finance.ends_with("(High 2)"));
        let hr = lines.iter().find(|l| l.contains("HR")).unwrap();
        assert!(hr.contains(&"░".repeat(20)));
        assert!(lines.last().unwrap().starts_with("Level of Impact: ░ Low"));
    }

    #[test]
    fn vertical_chart_numbers_groups() {
        let lines = render_chart(&impact_spec(Orientation::Vertical));
        assert!(lines.iter().any(|l| l.contains(" 1. Finance (2): High 2")));
        assert!(lines.iter().any(|l| l.contains(" 2. HR (1): Low 1")));
        // Tallest column spans the full height
        let bar_rows = lines.iter().filter(|l| l.starts_with("  │")).count();
        assert_eq!(bar_rows, COLUMN_HEIGHT);
    }
}
