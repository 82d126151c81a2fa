//! Keyword classification of a free-text instruction into a task type.
//!
//! The task type only selects which guidance paragraph goes into the model
//! prompt; nothing downstream depends on it being right.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Chart,
    Pivot,
    Validation,
    ConditionalFormatting,
    Cleanup,
    SortFilter,
    Formula,
    Formatting,
    Analysis,
    General,
}

/// Scan order. The first type with a keyword match wins. A trailing `*`
/// marks a stem that may run on ("chart*" matches "charts").
const PRIORITY: [(TaskType, &[&str]); 9] = [
    (
        TaskType::Chart,
        &["chart*", "graph*", "plot*", "visuali*", "histogram*", "pie", "scatter", "trend line*", "sparkline*"],
    ),
    (TaskType::Pivot, &["pivot*", "summarize by", "summarise by", "group by", "crosstab*", "breakdown by"]),
    (
        TaskType::Validation,
        &["dropdown*", "drop-down*", "drop down*", "validat*", "restrict*", "allowed values", "pick list*"],
    ),
    (
        TaskType::ConditionalFormatting,
        &["conditional*", "highlight*", "color scale*", "colour scale*", "data bar*", "icon set*", "heatmap*", "heat map*"],
    ),
    (
        TaskType::Cleanup,
        &[
            "clean*", "trim*", "duplicate*", "dedup*", "whitespace", "blank*", "normali*", "split*", "proper case",
            "uppercase", "lowercase", "replace*",
        ],
    ),
    (TaskType::SortFilter, &["sort*", "filter*", "order by", "ascending", "descending", "alphabetical*"]),
    (
        TaskType::Formula,
        &[
            "formula*", "sum", "average*", "total*", "count*", "vlookup", "xlookup", "index", "match", "calculat*",
            "comput*", "percent*", "growth",
        ],
    ),
    (
        TaskType::Formatting,
        &[
            "format*", "bold", "italic*", "underline*", "color*", "colour*", "font*", "border*", "align*",
            "currency", "width", "height", "wrap*", "freeze", "merge*",
        ],
    ),
    (
        TaskType::Analysis,
        &["analy*", "insight*", "compare*", "forecast*", "correlat*", "statistic*", "outlier*", "variance", "explain*"],
    ),
];

static RULES: Lazy<Vec<(TaskType, Regex)>> = Lazy::new(|| {
    PRIORITY
        .iter()
        .map(|(task, words)| {
            let alternation = words
                .iter()
                .map(|w| match w.strip_suffix('*') {
                    Some(stem) => regex::escape(stem),
                    None => format!(r"{}\b", regex::escape(w)),
                })
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"(?i)\b(?:{alternation})");
            (*task, Regex::new(&pattern).expect("keyword pattern"))
        })
        .collect()
});

/// Label `text` with the first task type (in priority order) whose keywords
/// appear in it. [`TaskType::General`] when nothing matches.
pub fn classify(text: &str) -> TaskType {
    RULES
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(task, _)| *task)
        .unwrap_or(TaskType::General)
}

impl TaskType {
    pub fn all() -> [TaskType; 10] {
        [
            TaskType::Chart,
            TaskType::Pivot,
            TaskType::Validation,
            TaskType::ConditionalFormatting,
            TaskType::Cleanup,
            TaskType::SortFilter,
            TaskType::Formula,
            TaskType::Formatting,
            TaskType::Analysis,
            TaskType::General,
        ]
    }

    pub fn tag(&self) -> &'static str {
        match self {
            TaskType::Chart => "chart",
            TaskType::Pivot => "pivot",
            TaskType::Validation => "validation",
            TaskType::ConditionalFormatting => "conditional_formatting",
            TaskType::Cleanup => "cleanup",
            TaskType::SortFilter => "sort_filter",
            TaskType::Formula => "formula",
            TaskType::Formatting => "formatting",
            TaskType::Analysis => "analysis",
            TaskType::General => "general",
        }
    }

    /// Guidance paragraph for the model prompt.
    pub fn guidance(&self) -> &'static str {
        match self {
            TaskType::Chart => {
                "Create one chart action whose target is the full data range including the header row. \
                 Set chartType (column, bar, line, pie, doughnut, area, scatter, radar, or a stacked variant) \
                 and a short title. Use position only when the user names a location."
            }
            TaskType::Pivot => {
                "Use a pivot action targeting the source table with its header row. Put the grouping column in \
                 data.rows, the measured column in data.values and the aggregate (sum, count, average) in \
                 data.aggregate. Use position for the output cell if the user gives one."
            }
            TaskType::Validation => {
                "Use validation for dropdown lists, with the options as a JSON array in data or a source range. \
                 Use numberValidation with type, min and max for numeric limits. Target only the input cells, \
                 not the header."
            }
            TaskType::ConditionalFormatting => {
                "Use conditionalFormat with {operator, value, format} for threshold highlights, {text, format} \
                 for text matches, and colorScale, dataBar or iconSet for gradients. Target the data cells \
                 without headers."
            }
            TaskType::Cleanup => {
                "Prefer the dedicated cleanup actions: trim, properCase, upperCase, lowerCase, removeDuplicates, \
                 splitText and findReplace. Target only the affected column. Do not rewrite values by hand when \
                 an action exists."
            }
            TaskType::SortFilter => {
                "Use sort with {column, ascending, hasHeader} over the whole table so rows stay together. Use \
                 filter with {column, values} to show matching rows. Columns are letters or 0-based offsets \
                 into the target."
            }
            TaskType::Formula => {
                "Write formulas with a formula action. Give the formula for the first cell of the target; it is \
                 filled down the rest of the target with relative row references adjusted (across, for a \
                 single-row target). Use absolute references ($B$1) for fixed inputs."
            }
            TaskType::Formatting => {
                "Use format with a JSON object of properties, or the specific actions (bold, fillColor, \
                 numberFormat, border, align, columnWidth, freezePanes). Apply each style to the smallest range \
                 that needs it."
            }
            TaskType::Analysis => {
                "Answer in the explanation first. Add actions only when they help: summary formulas in empty \
                 cells next to the data, a chart, or highlights. Never overwrite the source data."
            }
            TaskType::General => {
                "Translate the request into the smallest list of actions that achieves it. Use exact A1 ranges \
                 from the sheet preview and explain briefly what will change."
            }
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
