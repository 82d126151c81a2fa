//! Default autofill: extend a seed block into a larger destination.

use once_cell::sync::Lazy;
use regex::Regex;

use gridpilot_core::{shift_formula, Region};

use crate::cell::{CellFormat, CellValue};
use crate::sheet::Sheet;

// Text ending in an integer: "Item 7", "Q3", "Week-012"
static TRAILING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*?)(\d+)$").expect("trailing number pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Vertical,
    Horizontal,
}

/// Fill `destination` from the `source` block it contains.
///
/// Each lane (column for vertical fills, row for horizontal) extends
/// independently: two or more numeric seeds continue as a linear series,
/// text ending in a number increments, anything else repeats the seed
/// pattern with formula references shifted by the copy offset. Formats
/// repeat with the pattern. Returns the number of cells written.
pub fn autofill(sheet: &mut Sheet, source: &Region, destination: &Region) -> Result<usize, String> {
    if !destination.contains_region(source) {
        return Err(format!(
            "fill destination {} must contain the source {}",
            destination.a1(),
            source.a1()
        ));
    }

    let same_cols = destination.start_col == source.start_col && destination.end_col == source.end_col;
    let same_rows = destination.start_row == source.start_row && destination.end_row == source.end_row;
    let direction = match (same_rows, same_cols) {
        (true, true) => return Ok(0),
        (false, true) => Direction::Vertical,
        (true, false) => Direction::Horizontal,
        (false, false) => {
            return Err("fill destination must extend the source along one axis".to_string())
        }
    };

    let (lanes, seed_start, seed_len, dest_start, dest_end) = match direction {
        Direction::Vertical => (
            source.start_col..=source.end_col,
            source.start_row,
            source.rows(),
            destination.start_row,
            destination.end_row,
        ),
        Direction::Horizontal => (
            source.start_row..=source.end_row,
            source.start_col,
            source.cols(),
            destination.start_col,
            destination.end_col,
        ),
    };

    let at = |lane: usize, pos: usize| match direction {
        Direction::Vertical => (pos, lane),
        Direction::Horizontal => (lane, pos),
    };

    let mut written = 0;
    for lane in lanes {
        let seeds: Vec<(CellValue, CellFormat)> = (0..seed_len)
            .map(|i| {
                let (r, c) = at(lane, seed_start + i);
                (sheet.get_value(r, c), sheet.get_format(r, c))
            })
            .collect();
        let values: Vec<CellValue> = seeds.iter().map(|(v, _)| v.clone()).collect();
        let series = Series::detect(&values);

        for pos in dest_start..=dest_end {
            let k = pos as i64 - seed_start as i64;
            if (0..seed_len as i64).contains(&k) {
                continue;
            }
            let seed_idx = k.rem_euclid(seed_len as i64) as usize;
            let value = series.value_at(&values, k, seed_idx, direction);
            let (r, c) = at(lane, pos);
            sheet.set_cell_value(r, c, value);
            sheet.set_format(r, c, seeds[seed_idx].1.clone());
            written += 1;
        }
    }

    Ok(written)
}

#[derive(Debug, Clone, PartialEq)]
enum Series {
    Linear { first: f64, step: f64 },
    Numbered { prefix: String, first: i64, step: i64, width: usize },
    Repeat,
}

impl Series {
    fn detect(seeds: &[CellValue]) -> Series {
        if seeds.len() >= 2 {
            let numbers: Option<Vec<f64>> = seeds.iter().map(|v| v.as_number()).collect();
            if let Some(nums) = numbers {
                let first = nums[0];
                let step = (nums[nums.len() - 1] - first) / (nums.len() - 1) as f64;
                return Series::Linear { first, step };
            }
        }

        let parts: Option<Vec<(String, i64, usize)>> = seeds
            .iter()
            .map(|v| match v {
                CellValue::Text(s) => TRAILING_NUMBER.captures(s).and_then(|caps| {
                    let digits = &caps[2];
                    Some((caps[1].to_string(), digits.parse().ok()?, digits.len()))
                }),
                _ => None,
            })
            .collect();
        if let Some(parts) = parts {
            if !parts.is_empty() && parts.iter().all(|(p, _, _)| *p == parts[0].0) {
                let (prefix, first, width) = parts[0].clone();
                let step = if parts.len() == 1 {
                    1
                } else {
                    (parts[parts.len() - 1].1 - first) / (parts.len() - 1) as i64
                };
                return Series::Numbered { prefix, first, step, width };
            }
        }

        Series::Repeat
    }

    fn value_at(&self, seeds: &[CellValue], k: i64, seed_idx: usize, direction: Direction) -> CellValue {
        match self {
            Series::Linear { first, step } => CellValue::Number(first + step * k as f64),
            Series::Numbered { prefix, first, step, width } => {
                let n = first + step * k;
                let digits = if n < 0 {
                    format!("-{:0width$}", n.unsigned_abs(), width = *width)
                } else {
                    format!("{:0width$}", n, width = *width)
                };
                CellValue::Text(format!("{}{}", prefix, digits))
            }
            Series::Repeat => {
                let seed = &seeds[seed_idx];
                let offset = k - seed_idx as i64;
                match seed {
                    CellValue::Formula(src) => {
                        let shifted = match direction {
                            Direction::Vertical => shift_formula(src, offset, 0),
                            Direction::Horizontal => shift_formula(src, 0, offset),
                        };
                        CellValue::Formula(shifted)
                    }
                    other => other.clone(),
                }
            }
        }
    }
}
