//! Relative-reference shifting in formula text.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::address::{col_to_letters, letters_to_col, MAX_COLS, MAX_ROWS};

// Optional $ before col, col letters, optional $ before row, row digits.
static CELL_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)([A-Za-z]{1,3})(\$?)([0-9]+)").expect("cell reference pattern"));

/// Shift every relative A1 reference in `formula` by the given offsets.
///
/// `$`-fixed parts are left alone. Text inside string literals (`"..."`) and
/// quoted sheet names (`'...'`) is copied verbatim. A reference pushed off the
/// grid becomes `#REF!`.
pub fn shift_formula(formula: &str, delta_row: i64, delta_col: i64) -> String {
    if delta_row == 0 && delta_col == 0 {
        return formula.to_string();
    }

    let mut out = String::with_capacity(formula.len() + 8);
    let mut rest = formula;

    while !rest.is_empty() {
        match rest.find(['"', '\'']) {
            Some(open) => {
                out.push_str(&shift_segment(&rest[..open], delta_row, delta_col));
                let quote = rest.as_bytes()[open] as char;
                let after = &rest[open + 1..];
                let close = after.find(quote).map(|i| open + 1 + i + 1).unwrap_or(rest.len());
                out.push_str(&rest[open..close]);
                rest = &rest[close..];
            }
            None => {
                out.push_str(&shift_segment(rest, delta_row, delta_col));
                break;
            }
        }
    }

    out
}

fn shift_segment(text: &str, delta_row: i64, delta_col: i64) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in CELL_REF.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if !is_standalone(text, whole.start(), whole.end()) {
            continue;
        }
        let Some(shifted) = shift_ref(&caps, delta_row, delta_col) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&shifted);
        last = whole.end();
    }

    out.push_str(&text[last..]);
    out
}

/// A match counts as a reference only when it is not glued to an identifier
/// on the left and is not a function name or sheet name on the right.
fn is_standalone(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    if matches!(before, Some(c) if c.is_alphanumeric() || c == '_' || c == '.') {
        return false;
    }
    let after = text[end..].chars().next();
    !matches!(after, Some(c) if c.is_alphanumeric() || c == '(' || c == '_' || c == '!')
}

fn shift_ref(caps: &Captures, delta_row: i64, delta_col: i64) -> Option<String> {
    let col_absolute = &caps[1] == "$";
    let row_absolute = &caps[3] == "$";
    let col = letters_to_col(&caps[2])? as i64;
    let row: i64 = caps[4].parse().ok()?;
    if row < 1 || row > MAX_ROWS as i64 {
        return None;
    }

    let new_col = if col_absolute { col } else { col + delta_col };
    let new_row = if row_absolute { row } else { row + delta_row };

    if new_col < 0 || new_col >= MAX_COLS as i64 || new_row < 1 || new_row > MAX_ROWS as i64 {
        return Some("#REF!".to_string());
    }

    Some(format!(
        "{}{}{}{}",
        if col_absolute { "$" } else { "" },
        col_to_letters(new_col as usize),
        if row_absolute { "$" } else { "" },
        new_row
    ))
}
