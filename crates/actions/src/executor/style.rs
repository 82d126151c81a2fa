//! Formatting handlers.

use serde_json::Value;

use gridpilot_core::shift_formula;
use gridpilot_engine::{Alignment, ClearScope, Mutation, StylePatch, VerticalAlignment};

use super::{Ctx, Staged};
use crate::catalog::ActionKind;
use crate::error::ActionError;
use crate::payload::{self, field};

/// Apply `patch` to the target. The captured region is the target narrowed
/// to its populated area when it is very large.
fn styled(ctx: &mut Ctx<'_>, patch: StylePatch) -> Result<Staged, ActionError> {
    let region = ctx.target.clone();
    let written = ctx.footprint(&region)?;
    Ok(Staged {
        mutations: vec![Mutation::ApplyStyle { region, patch }],
        written,
    })
}

pub(super) fn format(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let patch = payload::decode_style(ctx.tag(), ctx.data())?;
    styled(ctx, patch)
}

/// bold / italic / underline / strikethrough / wrapText. Empty data turns
/// the attribute on.
pub(super) fn toggle(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let on = Some(payload::flag(ctx.tag(), ctx.data(), true)?);
    let mut patch = StylePatch::default();
    match ctx.kind {
        ActionKind::Bold => patch.bold = on,
        ActionKind::Italic => patch.italic = on,
        ActionKind::Underline => patch.underline = on,
        ActionKind::Strikethrough => patch.strikethrough = on,
        _ => patch.wrap_text = on,
    }
    styled(ctx, patch)
}

pub(super) fn color(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let raw = match payload::loose(ctx.data()) {
        Value::Object(map) => field(&map, &["color", "value"]).and_then(payload::scalar_text).unwrap_or_default(),
        other => payload::scalar_text(&other).unwrap_or_default(),
    };
    let color = payload::parse_color(&raw).ok_or_else(|| ctx.payload_error(format!("{raw:?} is not a color")))?;
    let mut patch = StylePatch::default();
    if *ctx.kind == ActionKind::FillColor {
        patch.fill_color = Some(color);
    } else {
        patch.font_color = Some(color);
    }
    styled(ctx, patch)
}

pub(super) fn font_size(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let size = payload::number(ctx.tag(), ctx.data())?;
    if size <= 0.0 || size > 409.0 {
        return Err(ctx.payload_error(format!("font size {size} is out of range")));
    }
    styled(ctx, StylePatch { font_size: Some(size), ..Default::default() })
}

pub(super) fn font_name(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let name = match payload::loose(ctx.data()) {
        Value::Object(map) => field(&map, &["name", "font", "fontname"]).and_then(payload::scalar_text).unwrap_or_default(),
        _ => payload::text(ctx.data()),
    };
    if name.trim().is_empty() {
        return Err(ctx.payload_error("a font name is required"));
    }
    styled(ctx, StylePatch { font_name: Some(name.trim().to_string()), ..Default::default() })
}

/// Number format codes. The currency, percent and date kinds have defaults
/// and accept shorthand (a symbol, a decimal count).
pub(super) fn number_format(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let raw = match payload::loose(ctx.data()) {
        Value::Object(map) => field(&map, &["format", "numberformat", "code", "symbol", "decimals"])
            .and_then(payload::scalar_text)
            .unwrap_or_default(),
        _ => payload::text(ctx.data()),
    };
    let raw = raw.trim();
    let is_code = raw.contains(['#', '0']) && !raw.chars().all(|c| c.is_ascii_digit());
    let code = match ctx.kind {
        ActionKind::CurrencyFormat => match raw {
            "" => "$#,##0.00".to_string(),
            code if is_code => code.to_string(),
            symbol => format!("{symbol}#,##0.00"),
        },
        ActionKind::PercentFormat => match raw.parse::<usize>() {
            Ok(0) => "0%".to_string(),
            Ok(decimals) if decimals <= 10 => format!("0.{}%", "0".repeat(decimals)),
            _ if raw.is_empty() => "0%".to_string(),
            _ if raw.ends_with('%') => raw.to_string(),
            _ => return Err(ctx.payload_error(format!("{raw:?} is not a percent format"))),
        },
        ActionKind::DateFormat if raw.is_empty() => "yyyy-mm-dd".to_string(),
        _ if raw.is_empty() => return Err(ctx.payload_error("a number format is required")),
        _ => raw.to_string(),
    };
    styled(ctx, StylePatch { number_format: Some(code), ..Default::default() })
}

pub(super) fn border(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let value = if ctx.data().trim().is_empty() {
        Value::Bool(true)
    } else {
        payload::loose(ctx.data())
    };
    match payload::border_value(&value).map_err(|reason| ctx.payload_error(reason))? {
        Some(border) => styled(ctx, StylePatch { border: Some(border), ..Default::default() }),
        None => Ok(Staged::noop()),
    }
}

pub(super) fn align(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let raw = match payload::loose(ctx.data()) {
        Value::Object(map) => field(&map, &["align", "alignment", "horizontal", "vertical", "value"])
            .and_then(payload::scalar_text)
            .unwrap_or_default(),
        _ => payload::text(ctx.data()),
    };
    let bad = || ctx.payload_error(format!("{raw:?} is not an alignment"));
    let patch = if *ctx.kind == ActionKind::VerticalAlign {
        StylePatch { vertical_alignment: Some(VerticalAlignment::parse(&raw).ok_or_else(bad)?), ..Default::default() }
    } else {
        StylePatch { alignment: Some(Alignment::parse(&raw).ok_or_else(bad)?), ..Default::default() }
    };
    styled(ctx, patch)
}

pub(super) fn clear(ctx: &mut Ctx<'_>, scope: ClearScope) -> Result<Staged, ActionError> {
    let region = ctx.target.clone();
    let written = ctx.footprint(&region)?;
    Ok(Staged {
        mutations: vec![Mutation::Clear { region, scope }],
        written,
    })
}

/// Paste `source` (contents and formats) at the target's first cell.
/// Relative formula references move with the paste offset.
pub(super) fn copy(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let source = ctx.source()?;
    let Some(source) = ctx.footprint(&source)? else {
        return Ok(Staged::noop());
    };
    let data = ctx.load(&source)?;
    let region = ctx.anchored(source.rows(), source.cols())?;
    let dr = region.start_row as i64 - source.start_row as i64;
    let dc = region.start_col as i64 - source.start_col as i64;

    let formulas = data
        .formulas
        .iter()
        .map(|row| {
            row.iter()
                .map(|raw| if raw.starts_with('=') { shift_formula(raw, dr, dc) } else { raw.clone() })
                .collect()
        })
        .collect();
    Ok(Staged::write(
        region.clone(),
        vec![
            Mutation::SetFormulas { region: region.clone(), formulas },
            Mutation::RestoreFormats { region, formats: data.formats },
        ],
    ))
}
