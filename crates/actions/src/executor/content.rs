//! Cell content handlers: formulas, values, fills and text cleanup.

use std::collections::HashSet;

use log::debug;
use regex::{NoExpand, RegexBuilder};
use serde_json::Value;

use gridpilot_core::{shift_formula, Region};
use gridpilot_engine::{Axis, Mutation};

use super::{Ctx, Staged};
use crate::error::ActionError;
use crate::payload::{self, field};

/// Largest block a content handler will write in one Action.
const MAX_WRITE_CELLS: u64 = 1_000_000;

/// Expand a formula over a `rows` × `cols` block anchored at its top-left
/// cell. With more than one row only relative row references move, so every
/// cell in a row carries the same text. A single row shifts relative columns
/// by the column offset instead.
pub fn fan_out(template: &str, rows: usize, cols: usize) -> Vec<Vec<String>> {
    if rows > 1 {
        return (0..rows)
            .map(|i| vec![shift_formula(template, i as i64, 0); cols])
            .collect();
    }
    vec![(0..cols).map(|j| shift_formula(template, 0, j as i64)).collect(); rows]
}

fn check_size(ctx: &Ctx<'_>, region: &Region) -> Result<(), ActionError> {
    if region.cell_count() > MAX_WRITE_CELLS {
        return Err(ActionError::Execution(format!(
            "{} covers {} cells; {} writes at most {}",
            region,
            region.cell_count(),
            ctx.tag(),
            MAX_WRITE_CELLS
        )));
    }
    Ok(())
}

pub(super) fn formula(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let template = ctx.data().trim();
    if template.is_empty() {
        return Err(ctx.payload_error("empty formula"));
    }
    let template = if template.starts_with('=') {
        template.to_string()
    } else {
        format!("={template}")
    };

    let Some(region) = ctx.target_footprint()? else {
        debug!("formula target {} has no populated cells", ctx.target);
        return Ok(Staged::noop());
    };
    check_size(ctx, &region)?;
    let formulas = fan_out(&template, region.rows(), region.cols());
    Ok(Staged::write(region.clone(), vec![Mutation::SetFormulas { region, formulas }]))
}

pub(super) fn values(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let grid = payload::decode_values(ctx.data(), &ctx.target, ctx.config.strict_payloads)?;
    let cols = grid.first().map(Vec::len).unwrap_or(0);
    let region = ctx.anchored(grid.len(), cols)?;
    check_size(ctx, &region)?;
    Ok(Staged::write(region.clone(), vec![Mutation::SetValues { region, values: grid }]))
}

/// Unknown kinds: write `data` as one literal into the first cell.
pub(super) fn literal(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    if ctx.data().trim().is_empty() {
        debug!("unknown action type {:?} with no data; nothing to do", ctx.action.action_type);
        return Ok(Staged::noop());
    }
    let cell = ctx.target.first_cell();
    let formulas = vec![vec![ctx.data().to_string()]];
    Ok(Staged::write(cell.clone(), vec![Mutation::SetFormulas { region: cell, formulas }]))
}

/// Copy the first row (or column) of the target across the rest of it,
/// shifting formula references by the copy offset.
pub(super) fn fill_copy(ctx: &mut Ctx<'_>, axis: Axis) -> Result<Staged, ActionError> {
    let Some(region) = ctx.target_footprint()? else {
        return Ok(Staged::noop());
    };
    check_size(ctx, &region)?;
    let seed = match axis {
        Axis::Rows => region.resized(1, region.cols()),
        Axis::Columns => region.resized(region.rows(), 1),
    };
    if seed == region {
        return Ok(Staged::noop());
    }
    let data = ctx.load(&seed)?;

    let mut formulas = Vec::with_capacity(region.rows());
    let mut formats = Vec::with_capacity(region.rows());
    for i in 0..region.rows() {
        let mut formula_row = Vec::with_capacity(region.cols());
        let mut format_row = Vec::with_capacity(region.cols());
        for j in 0..region.cols() {
            let (si, sj, dr, dc) = match axis {
                Axis::Rows => (0, j, i as i64, 0),
                Axis::Columns => (i, 0, 0, j as i64),
            };
            let src = &data.formulas[si][sj];
            formula_row.push(if src.starts_with('=') {
                shift_formula(src, dr, dc)
            } else {
                src.clone()
            });
            format_row.push(data.formats[si][sj].clone());
        }
        formulas.push(formula_row);
        formats.push(format_row);
    }

    Ok(Staged::write(
        region.clone(),
        vec![
            Mutation::SetFormulas { region: region.clone(), formulas },
            Mutation::RestoreFormats { region, formats },
        ],
    ))
}

pub(super) fn autofill(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let source = ctx.source()?;
    let destination = ctx.target.clone();
    Ok(Staged::write(
        destination.clone(),
        vec![Mutation::AutoFill { source, destination }],
    ))
}

/// Linear number series down each column (or across a single row).
pub(super) fn fill_series(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let Some(region) = ctx.target_footprint()? else {
        return Ok(Staged::noop());
    };
    check_size(ctx, &region)?;

    let (mut start, mut step) = (None, 1.0);
    match payload::loose(ctx.data()) {
        Value::Object(map) => {
            if let Some(v) = field(&map, &["start", "from", "first"]) {
                start = Some(payload::as_number(v).ok_or_else(|| ctx.payload_error("start is not a number"))?);
            }
            if let Some(v) = field(&map, &["step", "by", "increment"]) {
                step = payload::as_number(v).ok_or_else(|| ctx.payload_error("step is not a number"))?;
            }
        }
        Value::String(s) if s.is_empty() => {}
        other => {
            step = payload::as_number(&other).ok_or_else(|| ctx.payload_error("expected a step or {start, step}"))?;
        }
    }
    let start = match start {
        Some(start) => start,
        None => ctx.load(&region.first_cell())?.values[0][0].as_f64().unwrap_or(1.0),
    };

    let vertical = region.rows() > 1;
    let values = (0..region.rows())
        .map(|i| {
            (0..region.cols())
                .map(|j| {
                    let k = if vertical { i } else { j };
                    serde_json::json!(start + step * k as f64)
                })
                .collect()
        })
        .collect();
    Ok(Staged::write(region.clone(), vec![Mutation::SetValues { region, values }]))
}

pub(super) fn transpose(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let source = ctx.source()?;
    let Some(source) = ctx.footprint(&source)? else {
        return Ok(Staged::noop());
    };
    let data = ctx.load(&source)?;
    let region = ctx.anchored(source.cols(), source.rows())?;
    check_size(ctx, &region)?;
    let formulas = (0..source.cols())
        .map(|j| (0..source.rows()).map(|i| data.formulas[i][j].clone()).collect())
        .collect();
    Ok(Staged::write(region.clone(), vec![Mutation::SetFormulas { region, formulas }]))
}

/// Rewrite the literal cells of the target's populated area through `f`.
/// Formula cells and numbers are left alone.
fn rewrite_text(ctx: &mut Ctx<'_>, mut f: impl FnMut(&str) -> String) -> Result<Staged, ActionError> {
    let Some(region) = ctx.target_footprint()? else {
        return Ok(Staged::noop());
    };
    let data = ctx.load(&region)?;
    let mut changed = 0;
    let mut formulas = data.formulas;
    for (i, row) in formulas.iter_mut().enumerate() {
        for (j, raw) in row.iter_mut().enumerate() {
            let is_text = matches!(data.values[i][j], Value::String(_)) && !raw.is_empty() && !raw.starts_with('=');
            if !is_text {
                continue;
            }
            let next = f(raw);
            if next != *raw {
                *raw = next;
                changed += 1;
            }
        }
    }
    debug!("{} rewrites {} cell(s) in {}", ctx.tag(), changed, region);
    if changed == 0 {
        return Ok(Staged::noop());
    }
    Ok(Staged::write(region.clone(), vec![Mutation::SetFormulas { region, formulas }]))
}

pub(super) fn transform_text(ctx: &mut Ctx<'_>, f: fn(&str) -> String) -> Result<Staged, ActionError> {
    rewrite_text(ctx, f)
}

/// Trim both ends and collapse inner runs of whitespace to one space.
pub(super) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Capitalize the first letter of every word, lowercase the rest.
pub(super) fn proper_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = c == '\'';
        }
    }
    out
}

pub(super) fn find_replace(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let map = payload::object(ctx.tag(), ctx.data())?.ok_or_else(|| ctx.payload_error("expected {find, replace}"))?;
    let find = field(&map, &["find", "search", "from"])
        .and_then(payload::scalar_text)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ctx.payload_error("find text is required"))?;
    let replace = field(&map, &["replace", "replacewith", "with", "to"])
        .and_then(payload::scalar_text)
        .unwrap_or_default();
    let match_case = field(&map, &["matchcase", "casesensitive"]).and_then(payload::as_bool).unwrap_or(false);
    let whole_cell = field(&map, &["wholecell", "matchentirecell", "entirecell"])
        .and_then(payload::as_bool)
        .unwrap_or(false);

    let pattern = if whole_cell {
        format!("^{}$", regex::escape(&find))
    } else {
        regex::escape(&find)
    };
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(!match_case)
        .build()
        .map_err(|err| ctx.payload_error(err.to_string()))?;

    rewrite_text(ctx, |raw| re.replace_all(raw, NoExpand(&replace)).into_owned())
}

pub(super) fn remove_duplicates(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let Some(region) = ctx.target_footprint()? else {
        return Ok(Staged::noop());
    };
    let map = payload::object(ctx.tag(), ctx.data())?.unwrap_or_default();
    let has_header = field(&map, &["hasheader", "header", "hasheaders"])
        .and_then(payload::as_bool)
        .unwrap_or(false);
    let key_cols: Vec<usize> = match field(&map, &["columns", "keys", "column"]) {
        Some(Value::Array(cols)) => cols
            .iter()
            .map(|c| payload::column_key(ctx.tag(), c, &region).map(|abs| abs - region.start_col))
            .collect::<Result<_, _>>()?,
        Some(single) => vec![payload::column_key(ctx.tag(), single, &region)? - region.start_col],
        None => (0..region.cols()).collect(),
    };

    let data = ctx.load(&region)?;
    let header_rows = usize::from(has_header).min(data.rows());
    let mut seen = HashSet::new();
    let mut kept: Vec<Vec<String>> = data.formulas[..header_rows].to_vec();
    for row in &data.formulas[header_rows..] {
        let key: Vec<String> = key_cols.iter().map(|&c| row[c].to_lowercase()).collect();
        if seen.insert(key) {
            kept.push(row.clone());
        }
    }
    let removed = data.rows() - kept.len();
    debug!("removeDuplicates drops {} row(s) from {}", removed, region);
    if removed == 0 {
        return Ok(Staged::noop());
    }
    kept.resize(data.rows(), vec![String::new(); region.cols()]);
    Ok(Staged::write(region.clone(), vec![Mutation::SetFormulas { region, formulas: kept }]))
}

/// Split the first column of the target on a delimiter into the columns to
/// its right.
pub(super) fn split_text(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let delimiter = match payload::loose(ctx.data()) {
        Value::Object(map) => field(&map, &["delimiter", "separator", "sep"])
            .and_then(payload::scalar_text)
            .unwrap_or_else(|| ",".to_string()),
        Value::String(s) => s,
        other => payload::scalar_text(&other).unwrap_or_default(),
    };
    let delimiter = match delimiter.to_ascii_lowercase().as_str() {
        "" | "comma" => ",".to_string(),
        "space" => " ".to_string(),
        "tab" => "\t".to_string(),
        "semicolon" => ";".to_string(),
        "pipe" => "|".to_string(),
        _ => delimiter,
    };

    let Some(region) = ctx.target_footprint()? else {
        return Ok(Staged::noop());
    };
    let column = region.resized(region.rows(), 1);
    let data = ctx.load(&column)?;
    let parts: Vec<Vec<String>> = data
        .formulas
        .iter()
        .map(|row| {
            let raw = &row[0];
            if raw.starts_with('=') {
                vec![raw.clone()]
            } else {
                raw.split(delimiter.as_str()).map(|p| p.trim().to_string()).collect()
            }
        })
        .collect();
    let width = parts.iter().map(Vec::len).max().unwrap_or(1);
    if width <= 1 {
        return Ok(Staged::noop());
    }
    let written = column.resized(column.rows(), width);
    if written.cols() != width {
        return Err(ctx.payload_error(format!("{width} columns do not fit right of {}", column.a1())));
    }
    let formulas = parts
        .into_iter()
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();
    Ok(Staged::write(written.clone(), vec![Mutation::SetFormulas { region: written, formulas }]))
}

pub(super) fn hyperlink(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let (url, text) = match payload::loose(ctx.data()) {
        Value::Object(map) => (
            field(&map, &["url", "address", "link", "href"]).and_then(payload::scalar_text),
            field(&map, &["text", "display", "texttodisplay", "label"]).and_then(payload::scalar_text),
        ),
        other => (payload::scalar_text(&other), None),
    };
    let url = url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ctx.payload_error("a URL is required"))?;
    let cell = ctx.target.first_cell();
    Ok(Staged::write(cell.clone(), vec![Mutation::SetHyperlink { cell, url, text }]))
}

pub(super) fn sort(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let Some(region) = ctx.target_footprint()? else {
        return Ok(Staged::noop());
    };
    let mut key_col = region.start_col;
    let mut ascending = true;
    let mut has_header = false;

    match payload::loose(ctx.data()) {
        Value::Object(map) => {
            if let Some(key) = field(&map, &["column", "key", "by", "sortby", "keycolumn"]) {
                key_col = payload::column_key(ctx.tag(), key, &region)?;
            }
            if let Some(order) = field(&map, &["ascending", "asc"]) {
                ascending = payload::as_bool(order).ok_or_else(|| ctx.payload_error("ascending must be true or false"))?;
            }
            if let Some(order) = field(&map, &["order", "direction", "sortorder"]).and_then(Value::as_str) {
                ascending = !order.trim().to_ascii_lowercase().starts_with("desc");
            }
            if let Some(desc) = field(&map, &["descending", "desc"]).and_then(payload::as_bool) {
                ascending = !desc;
            }
            if let Some(header) = field(&map, &["hasheader", "header", "hasheaders"]) {
                has_header = payload::as_bool(header).ok_or_else(|| ctx.payload_error("hasHeader must be true or false"))?;
            }
        }
        Value::String(s) if s.is_empty() => {}
        Value::String(s) if matches!(s.to_ascii_lowercase().as_str(), "asc" | "ascending" | "desc" | "descending") => {
            ascending = !s.to_ascii_lowercase().starts_with("desc");
        }
        other => key_col = payload::column_key(ctx.tag(), &other, &region)?,
    }

    Ok(Staged::write(
        region.clone(),
        vec![Mutation::Sort { region, key_col, ascending, has_header }],
    ))
}
