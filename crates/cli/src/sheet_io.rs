// CSV in and out of the in-memory workbook, and the sheet preview sent to
// the model.

use std::io::{self, Read, Write};
use std::path::Path;

use gridpilot_core::{col_to_letters, Region};
use gridpilot_engine::Workbook;

use crate::CliError;

/// Rows and columns of the used range shown to the model.
pub const PREVIEW_ROWS: usize = 30;
pub const PREVIEW_COLS: usize = 12;

/// Load a CSV file (or stdin for `-`) into a fresh single-sheet workbook.
/// Cells are read as typed input: numbers, `=` formulas and text.
pub fn read_csv(path: &Path) -> Result<Workbook, CliError> {
    let content = if path.as_os_str() == "-" {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .map_err(|e| CliError::io(e.to_string()))?;
        input
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| CliError::io(format!("cannot read {}: {}", path.display(), e)))?
    };
    parse_csv(&content)
}

pub fn parse_csv(content: &str) -> Result<Workbook, CliError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut workbook = Workbook::new();
    let sheet = workbook
        .sheet_mut(0)
        .ok_or_else(|| CliError::eval("workbook has no sheets"))?;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| CliError::parse(format!("line {}: {}", row_idx + 1, e)))?;
        for (col_idx, field) in record.iter().enumerate() {
            if !field.is_empty() {
                sheet.set_value(row_idx, col_idx, field);
            }
        }
    }

    Ok(workbook)
}

/// Serialize the active sheet from A1 to the end of its used range.
/// Formulas are written as their text.
pub fn to_csv(workbook: &Workbook) -> Result<Vec<u8>, CliError> {
    let sheet = workbook.active_sheet();
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());

    if let Some(used) = sheet.used_range() {
        for row in 0..=used.end_row {
            let record: Vec<String> = (0..=used.end_col).map(|col| sheet.get_raw(row, col)).collect();
            writer.write_record(&record).map_err(|e| CliError::io(e.to_string()))?;
        }
    }

    writer.into_inner().map_err(|e| CliError::io(e.to_string()))
}

/// Write the active sheet as CSV to `path`, or stdout for `-`.
pub fn write_csv(workbook: &Workbook, path: &Path) -> Result<(), CliError> {
    let bytes = to_csv(workbook)?;
    if path.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(&bytes).map_err(|e| CliError::io(e.to_string()))?;
        handle.flush().map_err(|e| CliError::io(e.to_string()))
    } else {
        std::fs::write(path, bytes).map_err(|e| CliError::io(format!("cannot write {}: {}", path.display(), e)))
    }
}

/// Plain-text view of the active sheet's used range, truncated to
/// [`PREVIEW_ROWS`] x [`PREVIEW_COLS`].
pub fn preview(workbook: &Workbook) -> String {
    let sheet = workbook.active_sheet();
    let Some(used) = sheet.used_range() else {
        return format!("Sheet \"{}\" is empty.", sheet.name);
    };

    let shown = Region::new(
        used.start_row,
        used.start_col,
        used.end_row.min(used.start_row + PREVIEW_ROWS - 1),
        used.end_col.min(used.start_col + PREVIEW_COLS - 1),
    );

    let mut out = format!("Sheet \"{}\", used range {}\n", sheet.name, used.a1());
    let letters: Vec<String> = (shown.start_col..=shown.end_col).map(col_to_letters).collect();
    out.push_str(&format!("{:>5} | {}\n", "", letters.join(" | ")));
    for row in shown.start_row..=shown.end_row {
        let cells: Vec<String> = (shown.start_col..=shown.end_col)
            .map(|col| sheet.get_raw(row, col))
            .collect();
        out.push_str(&format!("{:>5} | {}\n", row + 1, cells.join(" | ")));
    }
    if shown.rows() < used.rows() || shown.cols() < used.cols() {
        out.push_str(&format!(
            "(showing {} of {} rows, {} of {} columns)\n",
            shown.rows(),
            used.rows(),
            shown.cols(),
            used.cols()
        ));
    }
    out
}
