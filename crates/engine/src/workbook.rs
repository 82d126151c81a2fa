use log::{debug, warn};

use gridpilot_core::Region;

use crate::cell::{CellFormat, CellValue};
use crate::fill::autofill;
use crate::host::{Document, HostError, RangeData};
use crate::mutation::{Axis, ClearScope, Mutation};
use crate::objects::{is_valid_name, summarize, AutoFilter, Chart, Pivot, Table};
use crate::sheet::Sheet;

/// Largest region `load` will materialize.
pub const MAX_LOAD_CELLS: u64 = 5_000_000;

/// Style patches on regions larger than this only touch populated cells.
const STYLE_MATERIALIZE_LIMIT: u64 = 1_000_000;

/// An in-memory workbook implementing [`Document`].
///
/// Formulas are stored and read back as text; nothing is evaluated.
#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    active_sheet: usize,
    charts: Vec<Chart>,
    tables: Vec<Table>,
    pivots: Vec<Pivot>,
    named_ranges: Vec<(String, Region)>,
    pending: Vec<Mutation>,
    sync_count: u64,
    validation_failures: usize,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    /// Create a new workbook with one default sheet
    pub fn new() -> Self {
        Self::from_sheets(vec![Sheet::new("Sheet1")])
    }

    pub fn with_sheets(names: &[&str]) -> Result<Self, HostError> {
        let mut wb = Self::from_sheets(Vec::new());
        for name in names {
            wb.add_sheet(name)?;
        }
        if wb.sheets.is_empty() {
            wb.sheets.push(Sheet::new("Sheet1"));
        }
        Ok(wb)
    }

    fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Self {
            sheets,
            active_sheet: 0,
            charts: Vec::new(),
            tables: Vec::new(),
            pivots: Vec::new(),
            named_ranges: Vec::new(),
            pending: Vec::new(),
            sync_count: 0,
            validation_failures: 0,
        }
    }

    /// Append a sheet. Names are unique, case-insensitively.
    pub fn add_sheet(&mut self, name: &str) -> Result<usize, HostError> {
        let name = name.trim();
        if name.is_empty() || name.len() > 31 || name.contains(['[', ']', ':', '*', '?', '/', '\\']) {
            return Err(HostError::Rejected(format!("invalid sheet name {:?}", name)));
        }
        if self.sheet_index(name).is_some() {
            return Err(HostError::Rejected(format!("sheet {:?} already exists", name)));
        }
        self.sheets.push(Sheet::new(name));
        Ok(self.sheets.len() - 1)
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheet_index(name).map(|i| &self.sheets[i])
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn active_sheet(&self) -> &Sheet {
        &self.sheets[self.active_sheet]
    }

    pub fn active_sheet_index(&self) -> usize {
        self.active_sheet
    }

    pub fn set_active_sheet(&mut self, index: usize) -> bool {
        if index < self.sheets.len() {
            self.active_sheet = index;
            true
        } else {
            false
        }
    }

    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn pivots(&self) -> &[Pivot] {
        &self.pivots
    }

    pub fn named_range(&self, name: &str) -> Option<&Region> {
        self.named_ranges
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name.trim()))
            .map(|(_, r)| r)
    }

    pub fn named_ranges(&self) -> impl Iterator<Item = (&str, &Region)> {
        self.named_ranges.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// Number of completed `sync` calls.
    pub fn sync_count(&self) -> u64 {
        self.sync_count
    }

    /// Cells written so far whose content breaks a validation rule.
    pub fn validation_failures(&self) -> usize {
        self.validation_failures
    }

    // =========================================================================
    // Direct access (bypasses the queue)
    // =========================================================================

    /// Write the same input into every cell of `address`.
    pub fn set_cell(&mut self, address: &str, input: &str) -> Result<(), HostError> {
        let region = self.resolve(address)?;
        let sheet = self.writable(region.sheet.as_deref())?;
        for (r, c) in region.cells() {
            sheet.set_value(r, c, input);
        }
        Ok(())
    }

    /// Write a block of inputs anchored at `anchor`.
    pub fn set_grid(&mut self, anchor: &str, rows: &[&[&str]]) -> Result<(), HostError> {
        let region = self.resolve(anchor)?;
        let sheet = self.writable(region.sheet.as_deref())?;
        for (i, row) in rows.iter().enumerate() {
            for (j, input) in row.iter().enumerate() {
                sheet.set_value(region.start_row + i, region.start_col + j, input);
            }
        }
        Ok(())
    }

    /// Source text of the first cell of `address`; empty if it does not resolve.
    pub fn cell_text(&self, address: &str) -> String {
        self.locate(address)
            .map(|(idx, r, c)| self.sheets[idx].get_raw(r, c))
            .unwrap_or_default()
    }

    pub fn cell_value(&self, address: &str) -> CellValue {
        self.locate(address)
            .map(|(idx, r, c)| self.sheets[idx].get_value(r, c))
            .unwrap_or_default()
    }

    pub fn cell_format(&self, address: &str) -> CellFormat {
        self.locate(address)
            .map(|(idx, r, c)| self.sheets[idx].get_format(r, c))
            .unwrap_or_default()
    }

    fn locate(&self, address: &str) -> Option<(usize, usize, usize)> {
        let region = self.resolve(address).ok()?;
        let idx = self.sheet_index(region.sheet.as_deref()?)?;
        Some((idx, region.start_row, region.start_col))
    }

    // =========================================================================
    // Mutation application
    // =========================================================================

    fn index_for(&self, sheet: Option<&str>) -> Result<usize, HostError> {
        match sheet {
            None => Ok(self.active_sheet),
            Some(name) => self
                .sheet_index(name)
                .ok_or_else(|| HostError::UnknownSheet(name.to_string())),
        }
    }

    fn writable(&mut self, sheet: Option<&str>) -> Result<&mut Sheet, HostError> {
        let idx = self.index_for(sheet)?;
        let sheet = &mut self.sheets[idx];
        if sheet.protected {
            return Err(HostError::Protected(sheet.name.clone()));
        }
        Ok(sheet)
    }

    fn apply(&mut self, mutation: Mutation) -> Result<(), HostError> {
        debug!("applying {}", mutation.name());
        match mutation {
            Mutation::SetFormulas { region, formulas } => {
                check_grid(&region, formulas.len(), formulas.iter().map(|r| r.len()))?;
                let sheet = self.writable(region.sheet.as_deref())?;
                for (i, row) in formulas.iter().enumerate() {
                    for (j, input) in row.iter().enumerate() {
                        sheet.set_value(region.start_row + i, region.start_col + j, input);
                    }
                }
                self.check_validation(&region);
            }
            Mutation::SetValues { region, values } => {
                check_grid(&region, values.len(), values.iter().map(|r| r.len()))?;
                let sheet = self.writable(region.sheet.as_deref())?;
                for (i, row) in values.iter().enumerate() {
                    for (j, value) in row.iter().enumerate() {
                        sheet.set_cell_value(region.start_row + i, region.start_col + j, CellValue::from_json(value));
                    }
                }
                self.check_validation(&region);
            }
            Mutation::ApplyStyle { region, patch } => {
                let sheet = self.writable(region.sheet.as_deref())?;
                let cells: Vec<(usize, usize)> = if region.cell_count() > STYLE_MATERIALIZE_LIMIT {
                    sheet.cells_in_range(&region)
                } else {
                    region.cells().collect()
                };
                for (r, c) in cells {
                    sheet.update_format(r, c, |f| patch.apply(f));
                }
            }
            Mutation::RestoreFormats { region, formats } => {
                check_grid(&region, formats.len(), formats.iter().map(|r| r.len()))?;
                let sheet = self.writable(region.sheet.as_deref())?;
                for (i, row) in formats.into_iter().enumerate() {
                    for (j, format) in row.into_iter().enumerate() {
                        sheet.set_format(region.start_row + i, region.start_col + j, format);
                    }
                }
            }
            Mutation::Clear { region, scope } => {
                let sheet = self.writable(region.sheet.as_deref())?;
                for (r, c) in sheet.cells_in_range(&region) {
                    match scope {
                        ClearScope::Contents => sheet.clear_contents(r, c),
                        ClearScope::Formats => sheet.clear_format(r, c),
                        ClearScope::All => sheet.clear_cell(r, c),
                    }
                }
            }
            Mutation::Sort { region, key_col, ascending, has_header } => {
                if key_col < region.start_col || key_col > region.end_col {
                    return Err(HostError::Rejected(format!(
                        "sort key column is outside {}",
                        region.a1()
                    )));
                }
                let sheet = self.writable(region.sheet.as_deref())?;
                sheet.sort_region(&region, key_col, ascending, has_header);
            }
            Mutation::AutoFill { source, destination } => {
                let src_idx = self.index_for(source.sheet.as_deref())?;
                let dst_idx = self.index_for(destination.sheet.as_deref())?;
                if src_idx != dst_idx {
                    return Err(HostError::Rejected("autofill source and destination must be on the same sheet".into()));
                }
                let sheet = self.writable(destination.sheet.as_deref())?;
                let written = autofill(sheet, &source, &destination).map_err(HostError::Rejected)?;
                debug!("autofill wrote {} cells", written);
                self.check_validation(&destination);
            }
            Mutation::AddChart(chart) => {
                self.writable(chart.top_left.sheet.as_deref())?;
                self.index_for(chart.source.sheet.as_deref())?;
                self.charts.push(chart);
            }
            Mutation::AddValidation { region, rule } => {
                let sheet = self.writable(region.sheet.as_deref())?;
                sheet.validations.set(region, rule);
            }
            Mutation::ClearValidation { region } => {
                let sheet = self.writable(region.sheet.as_deref())?;
                sheet.validations.clear_range(&region);
            }
            Mutation::AddConditionalFormat(cf) => {
                let sheet = self.writable(cf.region.sheet.as_deref())?;
                sheet.conditional_formats.push(cf);
            }
            Mutation::ClearConditionalFormats { region } => {
                let sheet = self.writable(region.sheet.as_deref())?;
                sheet.conditional_formats.retain(|cf| !cf.region.overlaps(&region));
            }
            Mutation::AddTable { region, name, has_headers, style } => {
                self.add_table(region, name, has_headers, style)?;
            }
            Mutation::AddPivot { source, destination, spec } => {
                let src_idx = self.index_for(source.sheet.as_deref())?;
                let src_sheet = &self.sheets[src_idx];
                let rows: Vec<Vec<CellValue>> = (source.start_row..=source.end_row)
                    .map(|r| (source.start_col..=source.end_col).map(|c| src_sheet.get_value(r, c)).collect())
                    .collect();
                let grid = summarize(&rows, &spec).map_err(HostError::Rejected)?;

                let placed = destination.resized(grid.len(), 2);
                let sheet = self.writable(destination.sheet.as_deref())?;
                for (i, row) in grid.into_iter().enumerate() {
                    for (j, value) in row.into_iter().enumerate() {
                        sheet.set_cell_value(placed.start_row + i, placed.start_col + j, value);
                    }
                }
                let name = format!("PivotTable{}", self.pivots.len() + 1);
                self.pivots.push(Pivot { name, source, destination: placed, spec });
            }
            Mutation::DefineName { name, region } => {
                is_valid_name(&name).map_err(HostError::Rejected)?;
                self.index_for(region.sheet.as_deref())?;
                let name = name.trim().to_string();
                self.named_ranges.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
                self.named_ranges.push((name, region));
            }
            Mutation::SetComment { cell, text } => {
                let sheet = self.writable(cell.sheet.as_deref())?;
                sheet.set_comment(cell.start_row, cell.start_col, text);
            }
            Mutation::SetHyperlink { cell, url, text } => {
                let sheet = self.writable(cell.sheet.as_deref())?;
                let (r, c) = (cell.start_row, cell.start_col);
                match text {
                    Some(text) => sheet.set_value(r, c, &text),
                    None if sheet.get_value(r, c).is_empty() => sheet.set_value(r, c, &url),
                    None => {}
                }
                sheet.set_hyperlink(r, c, Some(url));
            }
            Mutation::SetProtection { sheet, protected } => {
                let idx = self.index_for(sheet.as_deref())?;
                self.sheets[idx].protected = protected;
            }
            Mutation::SetTabColor { sheet, color } => {
                self.writable(sheet.as_deref())?.tab_color = color;
            }
            Mutation::FreezePanes { sheet, rows, cols } => {
                let frozen = (rows > 0 || cols > 0).then_some((rows, cols));
                self.writable(sheet.as_deref())?.frozen = frozen;
            }
            Mutation::Merge { region } => {
                self.writable(region.sheet.as_deref())?.merge(&region);
            }
            Mutation::Unmerge { region } => {
                self.writable(region.sheet.as_deref())?.unmerge(&region);
            }
            Mutation::Insert { region, axis } => {
                let sheet = self.writable(region.sheet.as_deref())?;
                match axis {
                    Axis::Rows => sheet.insert_rows(region.start_row, region.rows()),
                    Axis::Columns => sheet.insert_cols(region.start_col, region.cols()),
                }
            }
            Mutation::Delete { region, axis } => {
                let sheet = self.writable(region.sheet.as_deref())?;
                match axis {
                    Axis::Rows => sheet.delete_rows(region.start_row, region.rows()),
                    Axis::Columns => sheet.delete_cols(region.start_col, region.cols()),
                }
            }
            Mutation::SetHidden { region, axis, hidden } => {
                let sheet = self.writable(region.sheet.as_deref())?;
                match axis {
                    Axis::Rows => (region.start_row..=region.end_row).for_each(|r| sheet.set_row_hidden(r, hidden)),
                    Axis::Columns => (region.start_col..=region.end_col).for_each(|c| sheet.set_col_hidden(c, hidden)),
                }
            }
            Mutation::SetSize { region, axis, size } => {
                if !size.is_finite() || size <= 0.0 || size > 409.0 {
                    return Err(HostError::Rejected(format!("size {} is out of range (0, 409]", size)));
                }
                let sheet = self.writable(region.sheet.as_deref())?;
                match axis {
                    Axis::Rows => (region.start_row..=region.end_row).for_each(|r| sheet.set_row_height(r, size)),
                    Axis::Columns => (region.start_col..=region.end_col).for_each(|c| sheet.set_col_width(c, size)),
                }
            }
            Mutation::AutoFit { region } => {
                self.writable(region.sheet.as_deref())?.auto_fit(&region);
            }
            Mutation::SetAutoFilter { region, criteria } => {
                if let Some(c) = &criteria {
                    if c.column < region.start_col || c.column > region.end_col {
                        return Err(HostError::Rejected(format!(
                            "filter column is outside {}",
                            region.a1()
                        )));
                    }
                }
                let sheet = self.writable(region.sheet.as_deref())?;
                sheet.clear_filter();
                let filter = AutoFilter { region, criteria };
                sheet.apply_filter(&filter);
                sheet.auto_filter = Some(filter);
            }
            Mutation::ClearAutoFilter { sheet } => {
                self.writable(sheet.as_deref())?.clear_filter();
            }
        }
        Ok(())
    }

    fn add_table(
        &mut self,
        region: Region,
        name: Option<String>,
        has_headers: bool,
        style: Option<String>,
    ) -> Result<(), HostError> {
        let sheet_name = self.writable(region.sheet.as_deref())?.name.clone();
        let on_same_sheet = |t: &Table| {
            t.region
                .sheet
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(&sheet_name))
        };
        if let Some(existing) = self.tables.iter().find(|t| on_same_sheet(t) && t.region.overlaps(&region)) {
            return Err(HostError::Rejected(format!(
                "table would overlap existing table {}",
                existing.name
            )));
        }

        let name = match name {
            Some(n) => n.trim().to_string(),
            None => format!("Table{}", self.tables.len() + 1),
        };
        is_valid_name(&name).map_err(HostError::Rejected)?;
        if self.tables.iter().any(|t| t.name.eq_ignore_ascii_case(&name)) {
            return Err(HostError::Rejected(format!("a table named {} already exists", name)));
        }

        self.tables.push(Table {
            name,
            region: region.on_sheet(sheet_name),
            has_headers,
            style,
        });
        Ok(())
    }

    fn check_validation(&mut self, region: &Region) {
        let Ok(idx) = self.index_for(region.sheet.as_deref()) else {
            return;
        };
        let sheet = &self.sheets[idx];
        if sheet.validations.is_empty() {
            return;
        }
        let failures = sheet
            .cells_in_range(region)
            .into_iter()
            .filter(|&(r, c)| {
                sheet
                    .validations
                    .get(r, c)
                    .is_some_and(|rule| !rule.validate(&sheet.get_raw(r, c)).is_valid())
            })
            .count();
        if failures > 0 {
            warn!(
                "{} of {} cells in {} fail validation",
                failures,
                region.cell_count(),
                region
            );
            self.validation_failures += failures;
        }
    }
}

fn check_grid(region: &Region, rows: usize, mut widths: impl Iterator<Item = usize>) -> Result<(), HostError> {
    let cols = region.cols();
    if rows != region.rows() || !widths.all(|w| w == cols) {
        return Err(HostError::Rejected(format!(
            "grid shape does not match {} ({}x{})",
            region.a1(),
            region.rows(),
            cols
        )));
    }
    Ok(())
}

impl Document for Workbook {
    fn resolve(&self, address: &str) -> Result<Region, HostError> {
        let trimmed = address.trim();
        let region = match Region::parse(trimmed) {
            Ok(region) => region,
            Err(err) => {
                return self
                    .named_range(trimmed)
                    .cloned()
                    .ok_or_else(|| HostError::invalid_address(trimmed, &err));
            }
        };
        let idx = self.index_for(region.sheet.as_deref())?;
        Ok(region.on_sheet(self.sheets[idx].name.clone()))
    }

    fn load(&mut self, region: &Region) -> Result<RangeData, HostError> {
        self.sync()?;
        let idx = self.index_for(region.sheet.as_deref())?;
        if region.cell_count() > MAX_LOAD_CELLS {
            return Err(HostError::Rejected(format!(
                "region {} is too large to load ({} cells)",
                region,
                region.cell_count()
            )));
        }

        let sheet = &self.sheets[idx];
        let mut values = Vec::with_capacity(region.rows());
        let mut formulas = Vec::with_capacity(region.rows());
        let mut formats = Vec::with_capacity(region.rows());
        for r in region.start_row..=region.end_row {
            let mut value_row = Vec::with_capacity(region.cols());
            let mut formula_row = Vec::with_capacity(region.cols());
            let mut format_row = Vec::with_capacity(region.cols());
            for c in region.start_col..=region.end_col {
                let cell = sheet.get_cell(r, c);
                value_row.push(cell.map(|c| c.value.to_json()).unwrap_or_else(|| CellValue::Empty.to_json()));
                formula_row.push(cell.map(|c| c.value.raw()).unwrap_or_default());
                format_row.push(cell.map(|c| c.format.clone()).unwrap_or_default());
            }
            values.push(value_row);
            formulas.push(formula_row);
            formats.push(format_row);
        }

        Ok(RangeData {
            address: region.clone().on_sheet(sheet.name.clone()).to_string(),
            values,
            formulas,
            formats,
        })
    }

    fn used_range(&mut self, sheet: Option<&str>) -> Result<Option<Region>, HostError> {
        self.sync()?;
        let idx = self.index_for(sheet)?;
        Ok(self.sheets[idx].used_range())
    }

    fn enqueue(&mut self, mutation: Mutation) {
        self.pending.push(mutation);
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }

    fn sync(&mut self) -> Result<(), HostError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let queue = std::mem::take(&mut self.pending);
        let total = queue.len();
        for (i, mutation) in queue.into_iter().enumerate() {
            let name = mutation.name();
            if let Err(err) = self.apply(mutation) {
                warn!(
                    "sync failed at mutation {} of {} ({}): {}; discarding {} queued",
                    i + 1,
                    total,
                    name,
                    err,
                    total - i - 1
                );
                return Err(err);
            }
        }
        self.sync_count += 1;
        debug!("synced {} mutations", total);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::StylePatch;
    use crate::objects::{ChartKind, LegendPosition, PivotSpec};
    use crate::validation::ValidationRule;

    fn region(s: &str) -> Region {
        Region::parse(s).unwrap().on_sheet("Sheet1")
    }

    #[test]
    fn test_new_workbook() {
        let wb = Workbook::new();
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.active_sheet().name, "Sheet1");
    }

    #[test]
    fn test_add_sheet_rejects_duplicates() {
        let mut wb = Workbook::new();
        assert_eq!(wb.add_sheet("Data").unwrap(), 1);
        assert!(wb.add_sheet("data").is_err());
        assert!(wb.add_sheet("bad:name").is_err());
    }

    #[test]
    fn test_resolve_qualifies_sheet() {
        let mut wb = Workbook::new();
        wb.add_sheet("Q1 Plan").unwrap();
        assert_eq!(wb.resolve("A1:B2").unwrap().to_string(), "Sheet1!A1:B2");
        assert_eq!(wb.resolve("'q1 plan'!C3").unwrap().to_string(), "'Q1 Plan'!C3");
        assert!(matches!(wb.resolve("Nope!A1"), Err(HostError::UnknownSheet(_))));
        assert!(matches!(wb.resolve("not an address"), Err(HostError::InvalidAddress { .. })));
    }

    #[test]
    fn test_resolve_named_range() {
        let mut wb = Workbook::new();
        wb.enqueue(Mutation::DefineName { name: "Sales".into(), region: region("B2:B9") });
        wb.sync().unwrap();
        assert_eq!(wb.resolve("Sales").unwrap().to_string(), "Sheet1!B2:B9");
    }

    #[test]
    fn test_enqueue_applies_only_on_sync() {
        let mut wb = Workbook::new();
        wb.enqueue(Mutation::SetFormulas {
            region: region("A1:B1"),
            formulas: vec![vec!["x".into(), "=A1".into()]],
        });
        assert_eq!(wb.pending(), 1);
        assert_eq!(wb.cell_text("A1"), "");
        wb.sync().unwrap();
        assert_eq!(wb.pending(), 0);
        assert_eq!(wb.cell_text("B1"), "=A1");
        assert_eq!(wb.sync_count(), 1);
    }

    #[test]
    fn test_load_is_a_sync_point() {
        let mut wb = Workbook::new();
        wb.enqueue(Mutation::SetValues {
            region: region("A1:A2"),
            values: vec![vec![serde_json::json!(1)], vec![serde_json::json!(null)]],
        });
        let data = wb.load(&region("A1:A2")).unwrap();
        assert_eq!(data.address, "Sheet1!A1:A2");
        assert_eq!(data.values, vec![vec![serde_json::json!(1.0)], vec![serde_json::json!("")]]);
        assert_eq!(data.formulas, vec![vec!["1".to_string()], vec![String::new()]]);
    }

    #[test]
    fn test_sync_discards_rest_after_failure() {
        let mut wb = Workbook::new();
        wb.enqueue(Mutation::SetFormulas { region: region("A1"), formulas: vec![vec!["first".into()]] });
        // Wrong shape
        wb.enqueue(Mutation::SetFormulas { region: region("A2:A3"), formulas: vec![vec!["bad".into()]] });
        wb.enqueue(Mutation::SetFormulas { region: region("A4"), formulas: vec![vec!["never".into()]] });

        assert!(matches!(wb.sync(), Err(HostError::Rejected(_))));
        assert_eq!(wb.cell_text("A1"), "first");
        assert_eq!(wb.cell_text("A4"), "");
        assert_eq!(wb.pending(), 0);
    }

    #[test]
    fn test_protected_sheet_rejects_writes() {
        let mut wb = Workbook::new();
        wb.enqueue(Mutation::SetProtection { sheet: None, protected: true });
        wb.enqueue(Mutation::ApplyStyle {
            region: region("A1"),
            patch: StylePatch { bold: Some(true), ..Default::default() },
        });
        assert_eq!(wb.sync(), Err(HostError::Protected("Sheet1".into())));

        wb.enqueue(Mutation::SetProtection { sheet: Some("Sheet1".into()), protected: false });
        wb.sync().unwrap();
        assert!(!wb.active_sheet().protected);
    }

    #[test]
    fn test_style_patch_over_whole_columns_touches_populated_cells() {
        let mut wb = Workbook::new();
        wb.set_cell("A5", "x").unwrap();
        wb.enqueue(Mutation::ApplyStyle {
            region: region("A:C"),
            patch: StylePatch { italic: Some(true), ..Default::default() },
        });
        wb.sync().unwrap();
        assert!(wb.cell_format("A5").italic);
        assert!(!wb.cell_format("B1").italic);
    }

    #[test]
    fn test_clear_scopes() {
        let mut wb = Workbook::new();
        wb.set_cell("A1:A2", "v").unwrap();
        wb.enqueue(Mutation::ApplyStyle {
            region: region("A1:A2"),
            patch: StylePatch { bold: Some(true), ..Default::default() },
        });
        wb.enqueue(Mutation::Clear { region: region("A1"), scope: ClearScope::Contents });
        wb.enqueue(Mutation::Clear { region: region("A2"), scope: ClearScope::Formats });
        wb.sync().unwrap();
        assert_eq!(wb.cell_text("A1"), "");
        assert!(wb.cell_format("A1").bold);
        assert_eq!(wb.cell_text("A2"), "v");
        assert!(!wb.cell_format("A2").bold);
    }

    #[test]
    fn test_pivot_writes_summary() {
        let mut wb = Workbook::new();
        wb.set_grid("A1", &[&["Region", "Sales"], &["East", "10"], &["West", "4"], &["East", "1"]])
            .unwrap();
        wb.enqueue(Mutation::AddPivot {
            source: region("A1:B4"),
            destination: region("E1"),
            spec: PivotSpec::default(),
        });
        wb.sync().unwrap();
        assert_eq!(wb.cell_text("E2"), "East");
        assert_eq!(wb.cell_text("F2"), "11");
        assert_eq!(wb.cell_text("E4"), "Grand Total");
        assert_eq!(wb.pivots()[0].destination.a1(), "E1:F4");
    }

    #[test]
    fn test_tables_cannot_overlap() {
        let mut wb = Workbook::new();
        wb.enqueue(Mutation::AddTable { region: region("A1:C5"), name: None, has_headers: true, style: None });
        wb.sync().unwrap();
        assert_eq!(wb.tables()[0].name, "Table1");
        wb.enqueue(Mutation::AddTable { region: region("B2:D9"), name: None, has_headers: true, style: None });
        assert!(wb.sync().is_err());
    }

    #[test]
    fn test_chart_registered() {
        let mut wb = Workbook::new();
        wb.enqueue(Mutation::AddChart(Chart {
            kind: ChartKind::Line,
            source: region("A1:B5"),
            title: None,
            top_left: region("H2"),
            bottom_right: region("P17"),
            legend: Some(LegendPosition::Bottom),
        }));
        wb.sync().unwrap();
        assert_eq!(wb.charts().len(), 1);
    }

    #[test]
    fn test_validation_failures_counted() {
        let mut wb = Workbook::new();
        wb.enqueue(Mutation::AddValidation {
            region: region("A1:A3"),
            rule: ValidationRule::list_inline(vec!["Yes".into(), "No".into()]),
        });
        wb.enqueue(Mutation::SetFormulas {
            region: region("A1:A2"),
            formulas: vec![vec!["Yes".into()], vec!["Maybe".into()]],
        });
        wb.sync().unwrap();
        assert_eq!(wb.validation_failures(), 1);
    }

    #[test]
    fn test_filter_hides_rows_and_clear_restores() {
        let mut wb = Workbook::new();
        wb.set_grid("A1", &[&["Status"], &["open"], &["closed"], &["open"]]).unwrap();
        wb.enqueue(Mutation::SetAutoFilter {
            region: region("A1:A4"),
            criteria: Some(crate::objects::FilterCriteria { column: 0, values: vec!["open".into()] }),
        });
        wb.sync().unwrap();
        assert!(wb.active_sheet().is_row_hidden(2));
        assert!(!wb.active_sheet().is_row_hidden(1));

        wb.enqueue(Mutation::ClearAutoFilter { sheet: None });
        wb.sync().unwrap();
        assert!(!wb.active_sheet().is_row_hidden(2));
    }
}
