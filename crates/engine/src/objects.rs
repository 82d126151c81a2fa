//! Sheet-level objects: charts, tables, pivots, named ranges, conditional
//! formats and auto-filters.

use serde::{Deserialize, Serialize};

use gridpilot_core::{parse_cell_ref, Region};

use crate::cell::{format_number, CellValue, StylePatch};
use crate::validation::{eval_numeric_constraint, ComparisonOperator};

// ============================================================================
// Charts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartKind {
    ColumnClustered,
    ColumnStacked,
    BarClustered,
    BarStacked,
    Line,
    Pie,
    Doughnut,
    Area,
    XyScatter,
    Radar,
}

impl ChartKind {
    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::ColumnClustered => "clustered column",
            ChartKind::ColumnStacked => "stacked column",
            ChartKind::BarClustered => "clustered bar",
            ChartKind::BarStacked => "stacked bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Doughnut => "doughnut",
            ChartKind::Area => "area",
            ChartKind::XyScatter => "scatter",
            ChartKind::Radar => "radar",
        }
    }

    pub fn is_circular(&self) -> bool {
        matches!(self, ChartKind::Pie | ChartKind::Doughnut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegendPosition {
    Right,
    Bottom,
    Top,
    Left,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub kind: ChartKind,
    /// Data the chart plots.
    pub source: Region,
    pub title: Option<String>,
    /// Top-left anchor cell.
    pub top_left: Region,
    /// Bottom-right anchor cell.
    pub bottom_right: Region,
    /// `None` hides the legend.
    pub legend: Option<LegendPosition>,
}

// ============================================================================
// Tables
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub region: Region,
    pub has_headers: bool,
    pub style: Option<String>,
}

// ============================================================================
// Pivots
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    #[default]
    Sum,
    Count,
    Average,
}

impl Aggregate {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" | "total" => Some(Aggregate::Sum),
            "count" => Some(Aggregate::Count),
            "average" | "avg" | "mean" => Some(Aggregate::Average),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Aggregate::Sum => "Sum",
            Aggregate::Count => "Count",
            Aggregate::Average => "Average",
        }
    }
}

/// Field selection for a pivot. Fields are matched against the source
/// header row, case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PivotSpec {
    /// Grouping field; defaults to the first column.
    pub row_field: Option<String>,
    /// Aggregated field; defaults to the last column.
    pub value_field: Option<String>,
    pub aggregate: Aggregate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub name: String,
    pub source: Region,
    /// Region the summary grid occupies.
    pub destination: Region,
    pub spec: PivotSpec,
}

/// Group `rows` (header first) by the row field and aggregate the value field.
///
/// Output: a header row, one row per group in first-seen order, and a
/// grand total row.
pub fn summarize(rows: &[Vec<CellValue>], spec: &PivotSpec) -> Result<Vec<Vec<CellValue>>, String> {
    let (header, body) = rows
        .split_first()
        .ok_or_else(|| "pivot source is empty".to_string())?;
    if header.is_empty() {
        return Err("pivot source has no columns".into());
    }

    let find = |field: &Option<String>, fallback: usize| -> Result<usize, String> {
        match field {
            None => Ok(fallback),
            Some(name) => header
                .iter()
                .position(|h| h.raw().trim().eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| format!("pivot field {:?} not found in header", name)),
        }
    };
    let row_idx = find(&spec.row_field, 0)?;
    let value_idx = find(&spec.value_field, header.len() - 1)?;

    // (key, sum, count) in first-seen order
    let mut groups: Vec<(String, f64, usize)> = Vec::new();
    for row in body {
        let key = row.get(row_idx).map(|v| v.raw()).unwrap_or_default();
        if key.trim().is_empty() {
            continue;
        }
        let value = row.get(value_idx).and_then(|v| v.as_number());
        let slot = match groups.iter().position(|(k, _, _)| *k == key) {
            Some(i) => i,
            None => {
                groups.push((key, 0.0, 0));
                groups.len() - 1
            }
        };
        let entry = &mut groups[slot];
        match spec.aggregate {
            Aggregate::Count => {
                if row.get(value_idx).is_some_and(|v| !v.is_empty()) {
                    entry.2 += 1;
                }
            }
            _ => {
                if let Some(n) = value {
                    entry.1 += n;
                    entry.2 += 1;
                }
            }
        }
    }

    let result = |sum: f64, count: usize| -> CellValue {
        match spec.aggregate {
            Aggregate::Sum => CellValue::Number(sum),
            Aggregate::Count => CellValue::Number(count as f64),
            Aggregate::Average if count == 0 => CellValue::Text("#DIV/0!".into()),
            Aggregate::Average => CellValue::Number(sum / count as f64),
        }
    };

    let mut out = Vec::with_capacity(groups.len() + 2);
    out.push(vec![
        header[row_idx].clone(),
        CellValue::Text(format!("{} of {}", spec.aggregate.label(), header[value_idx].raw())),
    ]);
    let (mut total_sum, mut total_count) = (0.0, 0);
    for (key, sum, count) in &groups {
        total_sum += sum;
        total_count += count;
        out.push(vec![CellValue::from_input(key), result(*sum, *count)]);
    }
    out.push(vec![CellValue::Text("Grand Total".into()), result(total_sum, total_count)]);
    Ok(out)
}

// ============================================================================
// Named ranges
// ============================================================================

/// Validate a defined name.
///
/// Must start with a letter or underscore, contain only letters, digits,
/// underscores and dots, and must not read as a cell reference or boolean.
pub fn is_valid_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    let Some(first) = name.chars().next() else {
        return Err("Name cannot be empty".into());
    };
    if !first.is_alphabetic() && first != '_' {
        return Err("Name must start with a letter or underscore".into());
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return Err("Name can only contain letters, numbers, underscores, and dots".into());
    }
    if parse_cell_ref(name).is_some() {
        return Err(format!("'{}' looks like a cell reference. Choose a different name.", name));
    }
    let upper = name.to_uppercase();
    if upper == "TRUE" || upper == "FALSE" {
        return Err(format!("'{}' is a reserved boolean value. Choose a different name.", name));
    }
    Ok(())
}

// ============================================================================
// Conditional formats
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConditionalRule {
    /// Highlight cells whose numeric value satisfies the comparison.
    CellValue {
        operator: ComparisonOperator,
        value1: f64,
        value2: Option<f64>,
        style: StylePatch,
    },
    /// Highlight text cells containing a substring (case-insensitive).
    TextContains { text: String, style: StylePatch },
    ColorScale {
        min_color: String,
        mid_color: Option<String>,
        max_color: String,
    },
    DataBar { color: String },
    IconSet { style: String },
}

impl ConditionalRule {
    /// Whether a highlight rule fires for this value. Scales, bars and icon
    /// sets apply to every numeric cell.
    pub fn applies_to(&self, value: &CellValue) -> bool {
        match self {
            ConditionalRule::CellValue { operator, value1, value2, .. } => value
                .as_number()
                .is_some_and(|x| eval_numeric_constraint(x, *operator, *value1, *value2)),
            ConditionalRule::TextContains { text, .. } => {
                let haystack = match value {
                    CellValue::Number(n) => format_number(*n),
                    other => other.raw(),
                };
                haystack.to_lowercase().contains(&text.to_lowercase())
            }
            ConditionalRule::ColorScale { .. }
            | ConditionalRule::DataBar { .. }
            | ConditionalRule::IconSet { .. } => value.as_number().is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalFormat {
    pub region: Region,
    pub rule: ConditionalRule,
}

// ============================================================================
// Auto-filter
// ============================================================================

/// Keep only rows whose value in `column` (absolute, 0-indexed) is listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub column: usize,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoFilter {
    pub region: Region,
    pub criteria: Option<FilterCriteria>,
}
