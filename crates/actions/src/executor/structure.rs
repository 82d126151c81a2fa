//! Row/column structure, panes and sheet-level settings.

use serde_json::Value;

use gridpilot_engine::{Axis, Mutation};

use super::{Ctx, Staged};
use crate::error::ActionError;
use crate::payload::{self, field};

const MAX_SIZE: f64 = 409.0;

pub(super) fn insert(ctx: &mut Ctx<'_>, axis: Axis) -> Result<Staged, ActionError> {
    let region = ctx.target.clone();
    Ok(Staged::effect(vec![Mutation::Insert { region, axis }]))
}

pub(super) fn delete(ctx: &mut Ctx<'_>, axis: Axis) -> Result<Staged, ActionError> {
    let region = ctx.target.clone();
    Ok(Staged::effect(vec![Mutation::Delete { region, axis }]))
}

pub(super) fn hidden(ctx: &mut Ctx<'_>, axis: Axis, hidden: bool) -> Result<Staged, ActionError> {
    let region = ctx.target.clone();
    Ok(Staged::effect(vec![Mutation::SetHidden { region, axis, hidden }]))
}

/// Column width or row height in points.
pub(super) fn size(ctx: &mut Ctx<'_>, axis: Axis) -> Result<Staged, ActionError> {
    let size = payload::number(ctx.tag(), ctx.data())?;
    if size <= 0.0 || size > MAX_SIZE {
        return Err(ctx.payload_error(format!("size {size} is out of range (0, {MAX_SIZE}]")));
    }
    let region = ctx.target.clone();
    Ok(Staged::effect(vec![Mutation::SetSize { region, axis, size }]))
}

pub(super) fn auto_fit(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let region = ctx.target.clone();
    Ok(Staged::effect(vec![Mutation::AutoFit { region }]))
}

pub(super) fn merge(ctx: &mut Ctx<'_>, merge: bool) -> Result<Staged, ActionError> {
    if merge && ctx.target.is_single_cell() {
        return Ok(Staged::noop());
    }
    let region = ctx.target.clone();
    let mutation = if merge { Mutation::Merge { region } } else { Mutation::Unmerge { region } };
    Ok(Staged::effect(vec![mutation]))
}

/// Freeze above and left of the target. Whole rows freeze through their
/// last row, whole columns through their last column. `{rows, columns}`
/// gives the counts directly.
pub(super) fn freeze(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let target = &ctx.target;
    let (rows, cols) = match payload::loose(ctx.data()) {
        Value::Object(map) => {
            let count = |names: &[&str]| -> Result<usize, ActionError> {
                match field(&map, names) {
                    None => Ok(0),
                    Some(v) => payload::as_number(v)
                        .filter(|n| *n >= 0.0 && n.fract() == 0.0)
                        .map(|n| n as usize)
                        .ok_or_else(|| ActionError::payload("freezePanes", format!("{v} is not a count"))),
                }
            };
            (count(&["rows", "row"])?, count(&["columns", "cols", "column"])?)
        }
        _ if target.is_whole_rows() => (target.end_row + 1, 0),
        _ if target.is_whole_columns() => (0, target.end_col + 1),
        _ => (target.start_row, target.start_col),
    };
    if rows == 0 && cols == 0 {
        return Err(ctx.payload_error(format!("nothing to freeze at {}", ctx.target.a1())));
    }
    let sheet = ctx.target.sheet.clone();
    Ok(Staged::effect(vec![Mutation::FreezePanes { sheet, rows, cols }]))
}

pub(super) fn unfreeze(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let sheet = ctx.target.sheet.clone();
    Ok(Staged::effect(vec![Mutation::FreezePanes { sheet, rows: 0, cols: 0 }]))
}

pub(super) fn protect(ctx: &mut Ctx<'_>, protected: bool) -> Result<Staged, ActionError> {
    let sheet = ctx.target.sheet.clone();
    Ok(Staged::effect(vec![Mutation::SetProtection { sheet, protected }]))
}

/// Tab color of the target's sheet; `none` removes it.
pub(super) fn tab_color(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let raw = match payload::loose(ctx.data()) {
        Value::Object(map) => field(&map, &["color", "tabcolor"]).and_then(payload::scalar_text),
        Value::Null => Some("none".to_string()),
        other => payload::scalar_text(&other),
    }
    .unwrap_or_default();
    let raw = raw.trim();

    let color = if raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("clear") {
        None
    } else if raw.is_empty() {
        return Err(ctx.payload_error("a color is required"));
    } else {
        Some(payload::parse_color(raw).ok_or_else(|| ctx.payload_error(format!("invalid color {raw:?}")))?)
    };
    let sheet = ctx.target.sheet.clone();
    Ok(Staged::effect(vec![Mutation::SetTabColor { sheet, color }]))
}
