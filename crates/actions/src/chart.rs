//! Chart type vocabulary and placement.

use gridpilot_core::Region;
use gridpilot_engine::objects::{ChartKind, LegendPosition};

/// Columns and rows between a chart's top-left and bottom-right anchors.
pub const CHART_SPAN_COLS: usize = 8;
pub const CHART_SPAN_ROWS: usize = 15;

/// Map a free-form chart type name to a chart kind.
///
/// Case-insensitive substring match: "stacked" with "bar" is a stacked bar,
/// other "stacked" names a stacked column; then line, pie, doughnut/donut,
/// bar, area, scatter and radar. Anything else is a clustered column.
pub fn resolve_chart_kind(name: &str) -> ChartKind {
    let name = name.to_lowercase();
    if name.contains("stacked") {
        if name.contains("bar") {
            ChartKind::BarStacked
        } else {
            ChartKind::ColumnStacked
        }
    } else if name.contains("line") {
        ChartKind::Line
    } else if name.contains("pie") {
        ChartKind::Pie
    } else if name.contains("doughnut") || name.contains("donut") {
        ChartKind::Doughnut
    } else if name.contains("bar") {
        ChartKind::BarClustered
    } else if name.contains("area") {
        ChartKind::Area
    } else if name.contains("scatter") {
        ChartKind::XyScatter
    } else if name.contains("radar") {
        ChartKind::Radar
    } else {
        ChartKind::ColumnClustered
    }
}

/// Circular charts keep the legend at the right, the rest at the bottom.
pub fn legend_for(kind: ChartKind) -> LegendPosition {
    if kind.is_circular() {
        LegendPosition::Right
    } else {
        LegendPosition::Bottom
    }
}

/// Top-left and bottom-right anchor cells for a chart placed at `anchor`.
pub fn placement(anchor: &Region) -> (Region, Region) {
    let top_left = anchor.first_cell();
    let span = top_left.resized(CHART_SPAN_ROWS + 1, CHART_SPAN_COLS + 1);
    let bottom_right = Region::cell(span.end_row, span.end_col).with_sheet(anchor.sheet.clone());
    (top_left, bottom_right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_chart_kind() {
        assert_eq!(resolve_chart_kind("stacked bar"), ChartKind::BarStacked);
        assert_eq!(resolve_chart_kind("BarStacked"), ChartKind::BarStacked);
        assert_eq!(resolve_chart_kind("stackedColumn"), ChartKind::ColumnStacked);
        assert_eq!(resolve_chart_kind("Line"), ChartKind::Line);
        assert_eq!(resolve_chart_kind("lineMarkers"), ChartKind::Line);
        assert_eq!(resolve_chart_kind("PIE"), ChartKind::Pie);
        assert_eq!(resolve_chart_kind("donut"), ChartKind::Doughnut);
        assert_eq!(resolve_chart_kind("doughnut"), ChartKind::Doughnut);
        assert_eq!(resolve_chart_kind("bar"), ChartKind::BarClustered);
        assert_eq!(resolve_chart_kind("area"), ChartKind::Area);
        assert_eq!(resolve_chart_kind("xyScatter"), ChartKind::XyScatter);
        assert_eq!(resolve_chart_kind("radar"), ChartKind::Radar);
        assert_eq!(resolve_chart_kind("column"), ChartKind::ColumnClustered);
        assert_eq!(resolve_chart_kind("waterfall"), ChartKind::ColumnClustered);
        assert_eq!(resolve_chart_kind(""), ChartKind::ColumnClustered);
    }

    #[test]
    fn test_legend_position() {
        assert_eq!(legend_for(ChartKind::Pie), LegendPosition::Right);
        assert_eq!(legend_for(ChartKind::Doughnut), LegendPosition::Right);
        assert_eq!(legend_for(ChartKind::Line), LegendPosition::Bottom);
    }

    #[test]
    fn test_placement_spans_from_anchor() {
        let (tl, br) = placement(&Region::parse("Sheet1!H2").unwrap());
        assert_eq!(tl.to_string(), "Sheet1!H2");
        assert_eq!(br.to_string(), "Sheet1!P17");

        // Clamped at the grid edge
        let (_, br) = placement(&Region::parse("XFA1048570").unwrap());
        assert_eq!(br.a1(), "XFD1048576");
    }
}
