//! A1 addressing.
//!
//! Accepted forms: `A1`, `A1:B2`, `$A$1:$B$2`, `A:C`, `3:5`, and any of those
//! behind a sheet prefix (`Sheet2!A1`, `'Q1 Plan'!B2:C9`). Rows and columns
//! are 0-indexed internally, 1-indexed / lettered on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of addressable rows (`1048576`).
pub const MAX_ROWS: usize = 1_048_576;
/// Number of addressable columns (`XFD`).
pub const MAX_COLS: usize = 16_384;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Address string was empty or whitespace.
    Empty,
    /// Address is not valid A1 syntax.
    Invalid(String),
    /// Address is syntactically fine but outside the grid.
    OutOfBounds(String),
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty address"),
            Self::Invalid(s) => write!(f, "invalid address {:?}", s),
            Self::OutOfBounds(s) => write!(f, "address {:?} is outside the sheet", s),
        }
    }
}

impl std::error::Error for AddressError {}

/// Convert a 0-indexed column to letters (0 → `A`, 26 → `AA`).
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert column letters to a 0-indexed column. Case-insensitive.
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut col: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    let col = col - 1;
    (col < MAX_COLS).then_some(col)
}

/// Parse a single cell reference like `B5` (or `$B$5`) into `(row, col)`.
pub fn parse_cell_ref(s: &str) -> Option<(usize, usize)> {
    match parse_part(s)? {
        Part::Cell(row, col) => Some((row, col)),
        _ => None,
    }
}

/// A rectangular, inclusive block of cells, optionally bound to a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub sheet: Option<String>,
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Part {
    Cell(usize, usize),
    Col(usize),
    Row(usize),
}

fn parse_part(s: &str) -> Option<Part> {
    let cleaned: String = s.trim().chars().filter(|c| *c != '$').collect();
    if cleaned.is_empty() {
        return None;
    }

    let split = cleaned
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(cleaned.len());
    let (letters, digits) = cleaned.split_at(split);

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let row = if digits.is_empty() {
        None
    } else {
        let n: usize = digits.parse().ok()?;
        if n == 0 || n > MAX_ROWS {
            return None;
        }
        Some(n - 1)
    };

    let col = if letters.is_empty() {
        None
    } else {
        Some(letters_to_col(letters)?)
    };

    match (row, col) {
        (Some(r), Some(c)) => Some(Part::Cell(r, c)),
        (None, Some(c)) => Some(Part::Col(c)),
        (Some(r), None) => Some(Part::Row(r)),
        (None, None) => None,
    }
}

/// Split `Sheet!A1` into its sheet name (unquoted) and reference part.
fn split_sheet(s: &str) -> Result<(Option<String>, &str), AddressError> {
    if let Some(rest) = s.strip_prefix('\'') {
        // Quoted sheet name; '' is an escaped quote.
        let mut name = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if let Some((_, '\'')) = chars.peek() {
                    name.push('\'');
                    chars.next();
                    continue;
                }
                let after = &rest[i + 1..];
                let reference = after
                    .strip_prefix('!')
                    .ok_or_else(|| AddressError::Invalid(s.to_string()))?;
                if name.is_empty() {
                    return Err(AddressError::Invalid(s.to_string()));
                }
                return Ok((Some(name), reference));
            }
            name.push(c);
        }
        return Err(AddressError::Invalid(s.to_string()));
    }

    match s.rfind('!') {
        Some(bang) => {
            let sheet = s[..bang].trim();
            if sheet.is_empty() {
                return Err(AddressError::Invalid(s.to_string()));
            }
            Ok((Some(sheet.to_string()), &s[bang + 1..]))
        }
        None => Ok((None, s)),
    }
}

impl Region {
    /// Create a region, normalizing so start <= end.
    pub fn new(r1: usize, c1: usize, r2: usize, c2: usize) -> Self {
        Self {
            sheet: None,
            start_row: r1.min(r2),
            start_col: c1.min(c2),
            end_row: r1.max(r2),
            end_col: c1.max(c2),
        }
    }

    /// Single-cell region.
    pub fn cell(row: usize, col: usize) -> Self {
        Self::new(row, col, row, col)
    }

    /// Parse an A1 address.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }

        let (sheet, reference) = split_sheet(trimmed)?;
        let invalid = || AddressError::Invalid(trimmed.to_string());

        let mut pieces = reference.split(':');
        let first = pieces.next().ok_or_else(invalid)?;
        let second = pieces.next();
        if pieces.next().is_some() {
            return Err(invalid());
        }

        let start = parse_part(first).ok_or_else(|| classify_failure(first, trimmed))?;
        let region = match second {
            None => match start {
                Part::Cell(r, c) => Region::cell(r, c),
                _ => return Err(invalid()),
            },
            Some(second) => {
                let end = parse_part(second).ok_or_else(|| classify_failure(second, trimmed))?;
                match (start, end) {
                    (Part::Cell(r1, c1), Part::Cell(r2, c2)) => Region::new(r1, c1, r2, c2),
                    (Part::Col(c1), Part::Col(c2)) => Region::new(0, c1, MAX_ROWS - 1, c2),
                    (Part::Row(r1), Part::Row(r2)) => Region::new(r1, 0, r2, MAX_COLS - 1),
                    _ => return Err(invalid()),
                }
            }
        };

        Ok(region.with_sheet(sheet))
    }

    /// Replace the sheet binding.
    pub fn with_sheet(mut self, sheet: Option<String>) -> Self {
        self.sheet = sheet;
        self
    }

    /// Bind to a named sheet.
    pub fn on_sheet(self, sheet: impl Into<String>) -> Self {
        self.with_sheet(Some(sheet.into()))
    }

    pub fn rows(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    pub fn cols(&self) -> usize {
        self.end_col - self.start_col + 1
    }

    /// Number of cells (u64 so whole-sheet regions never overflow).
    pub fn cell_count(&self) -> u64 {
        self.rows() as u64 * self.cols() as u64
    }

    pub fn is_single_cell(&self) -> bool {
        self.start_row == self.end_row && self.start_col == self.end_col
    }

    pub fn is_whole_columns(&self) -> bool {
        self.start_row == 0 && self.end_row == MAX_ROWS - 1
    }

    pub fn is_whole_rows(&self) -> bool {
        self.start_col == 0 && self.end_col == MAX_COLS - 1
    }

    /// The top-left cell, keeping the sheet binding.
    pub fn first_cell(&self) -> Region {
        Region::cell(self.start_row, self.start_col).with_sheet(self.sheet.clone())
    }

    /// Same anchor, new size. Clamped to the grid.
    pub fn resized(&self, rows: usize, cols: usize) -> Region {
        let end_row = (self.start_row + rows.max(1) - 1).min(MAX_ROWS - 1);
        let end_col = (self.start_col + cols.max(1) - 1).min(MAX_COLS - 1);
        Region::new(self.start_row, self.start_col, end_row, end_col).with_sheet(self.sheet.clone())
    }

    /// Shift by a row/column offset; `None` if the result leaves the grid.
    pub fn offset(&self, rows: isize, cols: isize) -> Option<Region> {
        let shift = |v: usize, d: isize, max: usize| -> Option<usize> {
            let n = v as isize + d;
            (n >= 0 && (n as usize) < max).then_some(n as usize)
        };
        Some(
            Region::new(
                shift(self.start_row, rows, MAX_ROWS)?,
                shift(self.start_col, cols, MAX_COLS)?,
                shift(self.end_row, rows, MAX_ROWS)?,
                shift(self.end_col, cols, MAX_COLS)?,
            )
            .with_sheet(self.sheet.clone()),
        )
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.start_row && row <= self.end_row && col >= self.start_col && col <= self.end_col
    }

    /// True if `other` lies entirely inside this region (sheet binding ignored).
    pub fn contains_region(&self, other: &Region) -> bool {
        self.contains(other.start_row, other.start_col) && self.contains(other.end_row, other.end_col)
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.start_row <= other.end_row
            && other.start_row <= self.end_row
            && self.start_col <= other.end_col
            && other.start_col <= self.end_col
    }

    /// Overlap of two regions, keeping this region's sheet binding.
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        if !self.overlaps(other) {
            return None;
        }
        Some(
            Region::new(
                self.start_row.max(other.start_row),
                self.start_col.max(other.start_col),
                self.end_row.min(other.end_row),
                self.end_col.min(other.end_col),
            )
            .with_sheet(self.sheet.clone()),
        )
    }

    /// Iterate over all cells (row-major).
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let (start_row, end_row, start_col, end_col) = (self.start_row, self.end_row, self.start_col, self.end_col);
        (start_row..=end_row).flat_map(move |r| (start_col..=end_col).map(move |c| (r, c)))
    }

    /// A1 text without the sheet prefix.
    pub fn a1(&self) -> String {
        if self.is_whole_columns() && !self.is_whole_rows() {
            return format!("{}:{}", col_to_letters(self.start_col), col_to_letters(self.end_col));
        }
        if self.is_whole_rows() {
            return format!("{}:{}", self.start_row + 1, self.end_row + 1);
        }
        let start = format!("{}{}", col_to_letters(self.start_col), self.start_row + 1);
        if self.is_single_cell() {
            start
        } else {
            format!("{}:{}{}", start, col_to_letters(self.end_col), self.end_row + 1)
        }
    }
}

fn classify_failure(part: &str, whole: &str) -> AddressError {
    // Distinguish "ZZZZ1" / "A0" style out-of-grid refs from plain garbage.
    let cleaned: String = part.trim().chars().filter(|c| *c != '$').collect();
    let looks_like_ref = !cleaned.is_empty()
        && cleaned.chars().all(|c| c.is_ascii_alphanumeric())
        && cleaned
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .chars()
            .all(|c| c.is_ascii_digit());
    if looks_like_ref {
        AddressError::OutOfBounds(whole.to_string())
    } else {
        AddressError::Invalid(whole.to_string())
    }
}

fn needs_quotes(sheet: &str) -> bool {
    sheet.is_empty()
        || sheet.starts_with(|c: char| c.is_ascii_digit())
        || !sheet.chars().all(|c| c.is_alphanumeric() || c == '_')
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet {
            Some(sheet) if needs_quotes(sheet) => {
                write!(f, "'{}'!{}", sheet.replace('\'', "''"), self.a1())
            }
            Some(sheet) => write!(f, "{}!{}", sheet, self.a1()),
            None => write!(f, "{}", self.a1()),
        }
    }
}

impl std::str::FromStr for Region {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::parse(s)
    }
}
