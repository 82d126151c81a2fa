//! Queued document mutations.
//!
//! Every region is sheet-qualified by the time it lands here; a region
//! without a sheet applies to the active sheet.

use serde::{Deserialize, Serialize};

use gridpilot_core::Region;

use crate::cell::{CellFormat, StylePatch};
use crate::objects::{Chart, ConditionalFormat, FilterCriteria, PivotSpec};
use crate::validation::ValidationRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearScope {
    Contents,
    Formats,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Rows,
    Columns,
}

/// A single document mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Write entry-bar input per cell. The grid must match the region.
    SetFormulas { region: Region, formulas: Vec<Vec<String>> },
    /// Write typed JSON values per cell. The grid must match the region.
    SetValues { region: Region, values: Vec<Vec<serde_json::Value>> },
    ApplyStyle { region: Region, patch: StylePatch },
    /// Replace formats wholesale. The grid must match the region.
    RestoreFormats { region: Region, formats: Vec<Vec<CellFormat>> },
    Clear { region: Region, scope: ClearScope },
    /// Sort rows of `region` by one absolute key column.
    Sort { region: Region, key_col: usize, ascending: bool, has_header: bool },
    /// Extend `source` into `destination`, which must contain it.
    AutoFill { source: Region, destination: Region },
    AddChart(Chart),
    AddValidation { region: Region, rule: ValidationRule },
    ClearValidation { region: Region },
    AddConditionalFormat(ConditionalFormat),
    ClearConditionalFormats { region: Region },
    AddTable { region: Region, name: Option<String>, has_headers: bool, style: Option<String> },
    AddPivot { source: Region, destination: Region, spec: PivotSpec },
    DefineName { name: String, region: Region },
    SetComment { cell: Region, text: Option<String> },
    SetHyperlink { cell: Region, url: String, text: Option<String> },
    SetProtection { sheet: Option<String>, protected: bool },
    SetTabColor { sheet: Option<String>, color: Option<String> },
    /// Freeze the rows above and columns left of the given counts; `0, 0` unfreezes.
    FreezePanes { sheet: Option<String>, rows: usize, cols: usize },
    Merge { region: Region },
    Unmerge { region: Region },
    /// Insert `region.rows()` rows (or columns) at the region's top (or left).
    Insert { region: Region, axis: Axis },
    Delete { region: Region, axis: Axis },
    SetHidden { region: Region, axis: Axis, hidden: bool },
    SetSize { region: Region, axis: Axis, size: f64 },
    AutoFit { region: Region },
    SetAutoFilter { region: Region, criteria: Option<FilterCriteria> },
    ClearAutoFilter { sheet: Option<String> },
}

impl Mutation {
    /// Short operation name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::SetFormulas { .. } => "set_formulas",
            Mutation::SetValues { .. } => "set_values",
            Mutation::ApplyStyle { .. } => "apply_style",
            Mutation::RestoreFormats { .. } => "restore_formats",
            Mutation::Clear { .. } => "clear",
            Mutation::Sort { .. } => "sort",
            Mutation::AutoFill { .. } => "autofill",
            Mutation::AddChart(_) => "add_chart",
            Mutation::AddValidation { .. } => "add_validation",
            Mutation::ClearValidation { .. } => "clear_validation",
            Mutation::AddConditionalFormat(_) => "add_conditional_format",
            Mutation::ClearConditionalFormats { .. } => "clear_conditional_formats",
            Mutation::AddTable { .. } => "add_table",
            Mutation::AddPivot { .. } => "add_pivot",
            Mutation::DefineName { .. } => "define_name",
            Mutation::SetComment { .. } => "set_comment",
            Mutation::SetHyperlink { .. } => "set_hyperlink",
            Mutation::SetProtection { .. } => "set_protection",
            Mutation::SetTabColor { .. } => "set_tab_color",
            Mutation::FreezePanes { .. } => "freeze_panes",
            Mutation::Merge { .. } => "merge",
            Mutation::Unmerge { .. } => "unmerge",
            Mutation::Insert { .. } => "insert",
            Mutation::Delete { .. } => "delete",
            Mutation::SetHidden { .. } => "set_hidden",
            Mutation::SetSize { .. } => "set_size",
            Mutation::AutoFit { .. } => "auto_fit",
            Mutation::SetAutoFilter { .. } => "set_auto_filter",
            Mutation::ClearAutoFilter { .. } => "clear_auto_filter",
        }
    }
}
