use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use gridpilot_core::{Region, MAX_COLS, MAX_ROWS};

use super::cell::{Cell, CellFormat, CellValue};
use super::objects::{AutoFilter, ConditionalFormat};
use super::validation::ValidationStore;

/// Default column width in character units.
pub const DEFAULT_COL_WIDTH: f64 = 8.43;
/// Default row height in points.
pub const DEFAULT_ROW_HEIGHT: f64 = 15.0;

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    cells: FxHashMap<(usize, usize), Cell>,
    pub protected: bool,
    pub tab_color: Option<String>,
    /// Frozen (rows, cols); `None` when nothing is frozen.
    pub frozen: Option<(usize, usize)>,
    pub merges: Vec<Region>,
    hidden_rows: BTreeSet<usize>,
    hidden_cols: BTreeSet<usize>,
    row_heights: BTreeMap<usize, f64>,
    col_widths: BTreeMap<usize, f64>,
    pub validations: ValidationStore,
    pub conditional_formats: Vec<ConditionalFormat>,
    pub auto_filter: Option<AutoFilter>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: FxHashMap::default(),
            protected: false,
            tab_color: None,
            frozen: None,
            merges: Vec::new(),
            hidden_rows: BTreeSet::new(),
            hidden_cols: BTreeSet::new(),
            row_heights: BTreeMap::new(),
            col_widths: BTreeMap::new(),
            validations: ValidationStore::new(),
            conditional_formats: Vec::new(),
            auto_filter: None,
        }
    }

    // =========================================================================
    // Cells
    // =========================================================================

    pub fn get_cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub fn get_value(&self, row: usize, col: usize) -> CellValue {
        self.cells
            .get(&(row, col))
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    /// Formula text for formula cells, the literal otherwise.
    pub fn get_raw(&self, row: usize, col: usize) -> String {
        self.cells
            .get(&(row, col))
            .map(|c| c.value.raw())
            .unwrap_or_default()
    }

    pub fn get_format(&self, row: usize, col: usize) -> CellFormat {
        self.cells
            .get(&(row, col))
            .map(|c| c.format.clone())
            .unwrap_or_default()
    }

    pub fn set_value(&mut self, row: usize, col: usize, input: &str) {
        self.set_cell_value(row, col, CellValue::from_input(input));
    }

    pub fn set_cell_value(&mut self, row: usize, col: usize, value: CellValue) {
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        cell.value = value;
        self.prune(row, col);
    }

    pub fn set_format(&mut self, row: usize, col: usize, format: CellFormat) {
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        cell.format = format;
        self.prune(row, col);
    }

    pub fn update_format(&mut self, row: usize, col: usize, f: impl FnOnce(&mut CellFormat)) {
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        f(&mut cell.format);
        self.prune(row, col);
    }

    pub fn set_comment(&mut self, row: usize, col: usize, text: Option<String>) {
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        cell.comment = text;
        self.prune(row, col);
    }

    pub fn set_hyperlink(&mut self, row: usize, col: usize, url: Option<String>) {
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        cell.hyperlink = url;
        self.prune(row, col);
    }

    /// Clear a cell completely (remove from the map)
    pub fn clear_cell(&mut self, row: usize, col: usize) {
        self.cells.remove(&(row, col));
    }

    pub fn clear_contents(&mut self, row: usize, col: usize) {
        if let Some(cell) = self.cells.get_mut(&(row, col)) {
            cell.value = CellValue::Empty;
            cell.hyperlink = None;
        }
        self.prune(row, col);
    }

    pub fn clear_format(&mut self, row: usize, col: usize) {
        if let Some(cell) = self.cells.get_mut(&(row, col)) {
            cell.format = CellFormat::default();
        }
        self.prune(row, col);
    }

    fn prune(&mut self, row: usize, col: usize) {
        if self.cells.get(&(row, col)).is_some_and(|c| c.is_blank()) {
            self.cells.remove(&(row, col));
        }
    }

    /// Iterate over all populated cells
    pub fn cells_iter(&self) -> impl Iterator<Item = (&(usize, usize), &Cell)> {
        self.cells.iter()
    }

    /// Coordinates of populated cells within a region, row-major.
    pub fn cells_in_range(&self, region: &Region) -> Vec<(usize, usize)> {
        let mut coords: Vec<(usize, usize)> = self
            .cells
            .keys()
            .filter(|(r, c)| region.contains(*r, *c))
            .copied()
            .collect();
        coords.sort_unstable();
        coords
    }

    /// Bounding box of cells holding a value or a non-default format.
    pub fn used_range(&self) -> Option<Region> {
        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for (&(r, c), cell) in &self.cells {
            if cell.value.is_empty() && cell.format.is_default() {
                continue;
            }
            bounds = Some(match bounds {
                None => (r, c, r, c),
                Some((r1, c1, r2, c2)) => (r1.min(r), c1.min(c), r2.max(r), c2.max(c)),
            });
        }
        bounds.map(|(r1, c1, r2, c2)| Region::new(r1, c1, r2, c2).on_sheet(self.name.clone()))
    }

    // =========================================================================
    // Rows / columns
    // =========================================================================

    /// Insert rows at the specified position, shifting existing rows down
    pub fn insert_rows(&mut self, at_row: usize, count: usize) {
        self.shift_cells(|(r, c)| {
            if r < at_row {
                Some((r, c))
            } else if r + count < MAX_ROWS {
                Some((r + count, c))
            } else {
                None
            }
        });
        self.hidden_rows = shift_set(&self.hidden_rows, at_row, count as isize, MAX_ROWS);
        self.row_heights = shift_map(&self.row_heights, at_row, count as isize, MAX_ROWS);
    }

    /// Delete rows at the specified position, shifting remaining rows up
    pub fn delete_rows(&mut self, start_row: usize, count: usize) {
        let end = start_row + count;
        self.shift_cells(|(r, c)| {
            if r < start_row {
                Some((r, c))
            } else if r < end {
                None
            } else {
                Some((r - count, c))
            }
        });
        self.hidden_rows.retain(|r| *r < start_row || *r >= end);
        self.hidden_rows = shift_set(&self.hidden_rows, end, -(count as isize), MAX_ROWS);
        self.row_heights.retain(|r, _| *r < start_row || *r >= end);
        self.row_heights = shift_map(&self.row_heights, end, -(count as isize), MAX_ROWS);
    }

    /// Insert columns at the specified position, shifting existing columns right
    pub fn insert_cols(&mut self, at_col: usize, count: usize) {
        self.shift_cells(|(r, c)| {
            if c < at_col {
                Some((r, c))
            } else if c + count < MAX_COLS {
                Some((r, c + count))
            } else {
                None
            }
        });
        self.hidden_cols = shift_set(&self.hidden_cols, at_col, count as isize, MAX_COLS);
        self.col_widths = shift_map(&self.col_widths, at_col, count as isize, MAX_COLS);
    }

    /// Delete columns at the specified position, shifting remaining columns left
    pub fn delete_cols(&mut self, start_col: usize, count: usize) {
        let end = start_col + count;
        self.shift_cells(|(r, c)| {
            if c < start_col {
                Some((r, c))
            } else if c < end {
                None
            } else {
                Some((r, c - count))
            }
        });
        self.hidden_cols.retain(|c| *c < start_col || *c >= end);
        self.hidden_cols = shift_set(&self.hidden_cols, end, -(count as isize), MAX_COLS);
        self.col_widths.retain(|c, _| *c < start_col || *c >= end);
        self.col_widths = shift_map(&self.col_widths, end, -(count as isize), MAX_COLS);
    }

    fn shift_cells(&mut self, map: impl Fn((usize, usize)) -> Option<(usize, usize)>) {
        let old = std::mem::take(&mut self.cells);
        for (pos, cell) in old {
            if let Some(new_pos) = map(pos) {
                self.cells.insert(new_pos, cell);
            }
        }
    }

    pub fn set_row_hidden(&mut self, row: usize, hidden: bool) {
        if hidden {
            self.hidden_rows.insert(row);
        } else {
            self.hidden_rows.remove(&row);
        }
    }

    pub fn set_col_hidden(&mut self, col: usize, hidden: bool) {
        if hidden {
            self.hidden_cols.insert(col);
        } else {
            self.hidden_cols.remove(&col);
        }
    }

    pub fn is_row_hidden(&self, row: usize) -> bool {
        self.hidden_rows.contains(&row)
    }

    pub fn is_col_hidden(&self, col: usize) -> bool {
        self.hidden_cols.contains(&col)
    }

    pub fn set_row_height(&mut self, row: usize, height: f64) {
        self.row_heights.insert(row, height);
    }

    pub fn set_col_width(&mut self, col: usize, width: f64) {
        self.col_widths.insert(col, width);
    }

    pub fn row_height(&self, row: usize) -> f64 {
        self.row_heights.get(&row).copied().unwrap_or(DEFAULT_ROW_HEIGHT)
    }

    pub fn col_width(&self, col: usize) -> f64 {
        self.col_widths.get(&col).copied().unwrap_or(DEFAULT_COL_WIDTH)
    }

    /// Size each column in the region to its longest populated entry.
    pub fn auto_fit(&mut self, region: &Region) {
        let mut longest: BTreeMap<usize, usize> = BTreeMap::new();
        for (r, c) in self.cells_in_range(region) {
            let len = self.get_raw(r, c).chars().count();
            let slot = longest.entry(c).or_insert(0);
            *slot = (*slot).max(len);
        }
        for (col, len) in longest {
            self.col_widths.insert(col, (len as f64 + 2.0).max(DEFAULT_COL_WIDTH));
        }
    }

    // =========================================================================
    // Merges
    // =========================================================================

    /// Merge a region. Overlapping merges are replaced; only the top-left
    /// value survives.
    pub fn merge(&mut self, region: &Region) {
        self.merges.retain(|m| !m.overlaps(region));
        for (r, c) in self.cells_in_range(region) {
            if (r, c) != (region.start_row, region.start_col) {
                self.clear_contents(r, c);
            }
        }
        self.merges.push(region.clone().on_sheet(self.name.clone()));
    }

    pub fn unmerge(&mut self, region: &Region) -> usize {
        let before = self.merges.len();
        self.merges.retain(|m| !m.overlaps(region));
        before - self.merges.len()
    }

    // =========================================================================
    // Sort / filter
    // =========================================================================

    /// Reorder the rows of `region` by the value in `key_col` (absolute).
    ///
    /// Numbers sort before text (case-insensitive) before booleans; blanks
    /// are always last regardless of direction. The sort is stable.
    pub fn sort_region(&mut self, region: &Region, key_col: usize, ascending: bool, has_header: bool) {
        let first = region.start_row + usize::from(has_header);
        if first > region.end_row {
            return;
        }

        let mut rows: Vec<Vec<Option<Cell>>> = (first..=region.end_row)
            .map(|r| {
                (region.start_col..=region.end_col)
                    .map(|c| self.cells.remove(&(r, c)))
                    .collect()
            })
            .collect();

        let key_idx = key_col.saturating_sub(region.start_col);
        rows.sort_by(|a, b| {
            let ka = sort_key(a.get(key_idx).and_then(|c| c.as_ref()));
            let kb = sort_key(b.get(key_idx).and_then(|c| c.as_ref()));
            compare_keys(&ka, &kb, ascending)
        });

        for (i, row) in rows.into_iter().enumerate() {
            for (j, cell) in row.into_iter().enumerate() {
                if let Some(cell) = cell {
                    self.cells.insert((first + i, region.start_col + j), cell);
                }
            }
        }
    }

    /// Hide body rows of the filter region that do not match the criteria.
    pub fn apply_filter(&mut self, filter: &AutoFilter) {
        let Some(criteria) = &filter.criteria else {
            return;
        };
        for row in (filter.region.start_row + 1)..=filter.region.end_row {
            let raw = self.get_raw(row, criteria.column);
            let keep = criteria.values.iter().any(|v| v.eq_ignore_ascii_case(raw.trim()));
            self.set_row_hidden(row, !keep);
        }
    }

    /// Unhide rows hidden by the current filter and drop it.
    pub fn clear_filter(&mut self) -> bool {
        match self.auto_filter.take() {
            Some(filter) => {
                if filter.criteria.is_some() {
                    for row in (filter.region.start_row + 1)..=filter.region.end_row {
                        self.set_row_hidden(row, false);
                    }
                }
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, PartialEq)]
enum SortKey {
    Number(OrderedFloat<f64>),
    Text(String),
    Boolean(bool),
    Blank,
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Number(_) => 0,
            SortKey::Text(_) => 1,
            SortKey::Boolean(_) => 2,
            SortKey::Blank => 3,
        }
    }
}

fn sort_key(cell: Option<&Cell>) -> SortKey {
    match cell.map(|c| &c.value) {
        None | Some(CellValue::Empty) => SortKey::Blank,
        Some(CellValue::Number(n)) => SortKey::Number(OrderedFloat(*n)),
        Some(CellValue::Boolean(b)) => SortKey::Boolean(*b),
        Some(CellValue::Text(s)) | Some(CellValue::Formula(s)) => SortKey::Text(s.to_lowercase()),
    }
}

fn compare_keys(a: &SortKey, b: &SortKey, ascending: bool) -> Ordering {
    match (a, b) {
        (SortKey::Blank, SortKey::Blank) => return Ordering::Equal,
        (SortKey::Blank, _) => return Ordering::Greater,
        (_, SortKey::Blank) => return Ordering::Less,
        _ => {}
    }
    let ord = match (a, b) {
        (SortKey::Number(x), SortKey::Number(y)) => x.cmp(y),
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
        (SortKey::Boolean(x), SortKey::Boolean(y)) => x.cmp(y),
        _ => a.rank().cmp(&b.rank()),
    };
    if ascending {
        ord
    } else {
        ord.reverse()
    }
}

fn shift_set(set: &BTreeSet<usize>, from: usize, delta: isize, max: usize) -> BTreeSet<usize> {
    set.iter()
        .filter_map(|&i| shift_index(i, from, delta, max))
        .collect()
}

fn shift_map(map: &BTreeMap<usize, f64>, from: usize, delta: isize, max: usize) -> BTreeMap<usize, f64> {
    map.iter()
        .filter_map(|(&i, &v)| shift_index(i, from, delta, max).map(|j| (j, v)))
        .collect()
}

fn shift_index(i: usize, from: usize, delta: isize, max: usize) -> Option<usize> {
    if i < from {
        return Some(i);
    }
    let j = i as isize + delta;
    (j >= 0 && (j as usize) < max).then_some(j as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(sheet: &Sheet, col: usize, rows: std::ops::RangeInclusive<usize>) -> Vec<String> {
        rows.map(|r| sheet.get_raw(r, col)).collect()
    }

    #[test]
    fn test_blank_cells_are_pruned() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(0, 0, "x");
        sheet.set_value(0, 0, "");
        assert!(sheet.get_cell(0, 0).is_none());

        sheet.update_format(1, 1, |f| f.bold = true);
        assert!(sheet.get_cell(1, 1).is_some());
        sheet.clear_format(1, 1);
        assert!(sheet.get_cell(1, 1).is_none());
    }

    #[test]
    fn test_format_persists_with_value() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.update_format(0, 0, |f| f.italic = true);
        sheet.set_value(0, 0, "Hello");
        assert!(sheet.get_format(0, 0).italic);
        sheet.clear_contents(0, 0);
        assert!(sheet.get_format(0, 0).italic);
        assert_eq!(sheet.get_raw(0, 0), "");
    }

    #[test]
    fn test_used_range() {
        let mut sheet = Sheet::new("Data");
        assert!(sheet.used_range().is_none());
        sheet.set_value(2, 1, "a");
        sheet.set_value(5, 3, "b");
        assert_eq!(sheet.used_range().unwrap().to_string(), "Data!B3:D6");
    }

    #[test]
    fn test_insert_and_delete_rows() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(0, 0, "a");
        sheet.set_value(1, 0, "b");
        sheet.set_row_hidden(1, true);
        sheet.insert_rows(1, 2);
        assert_eq!(column(&sheet, 0, 0..=3), vec!["a", "", "", "b"]);
        assert!(sheet.is_row_hidden(3));

        sheet.delete_rows(1, 2);
        assert_eq!(column(&sheet, 0, 0..=1), vec!["a", "b"]);
        assert!(sheet.is_row_hidden(1));
    }

    #[test]
    fn test_insert_and_delete_cols() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(0, 0, "a");
        sheet.set_value(0, 1, "b");
        sheet.insert_cols(0, 1);
        assert_eq!(sheet.get_raw(0, 1), "a");
        assert_eq!(sheet.get_raw(0, 2), "b");
        sheet.delete_cols(0, 2);
        assert_eq!(sheet.get_raw(0, 0), "b");
    }

    #[test]
    fn test_sort_mixed_types_blanks_last() {
        let mut sheet = Sheet::new("Sheet1");
        for (r, v) in ["Name", "pear", "", "10", "Apple", "TRUE", "2"].iter().enumerate() {
            sheet.set_value(r, 0, v);
            sheet.set_value(r, 1, &r.to_string());
        }
        let region = Region::new(0, 0, 6, 1);
        sheet.sort_region(&region, 0, true, true);
        assert_eq!(column(&sheet, 0, 0..=6), vec!["Name", "2", "10", "Apple", "pear", "TRUE", ""]);
        // Rows move as a unit
        assert_eq!(sheet.get_raw(1, 1), "6");

        sheet.sort_region(&region, 0, false, true);
        assert_eq!(column(&sheet, 0, 0..=6), vec!["Name", "TRUE", "pear", "Apple", "10", "2", ""]);
    }

    #[test]
    fn test_merge_keeps_top_left() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(0, 0, "keep");
        sheet.set_value(0, 1, "drop");
        let region = Region::parse("A1:B1").unwrap();
        sheet.merge(&region);
        assert_eq!(sheet.get_raw(0, 0), "keep");
        assert_eq!(sheet.get_raw(0, 1), "");
        assert_eq!(sheet.unmerge(&region), 1);
    }

    #[test]
    fn test_auto_fit() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(0, 0, "a much longer entry");
        sheet.set_value(0, 1, "x");
        sheet.auto_fit(&Region::parse("A1:B1").unwrap());
        assert_eq!(sheet.col_width(0), 21.0);
        assert_eq!(sheet.col_width(1), DEFAULT_COL_WIDTH);
    }
}
