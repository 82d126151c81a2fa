//! Handlers that attach objects to a sheet: conditional formats, charts,
//! tables, pivots, names, validation, filters and comments.

use log::debug;
use serde_json::Value;

use gridpilot_core::Region;
use gridpilot_engine::objects::{Aggregate, Chart, ConditionalFormat, ConditionalRule, FilterCriteria, PivotSpec};
use gridpilot_engine::validation::{ComparisonOperator, NumericConstraint, ValidationRule};
use gridpilot_engine::{Mutation, StylePatch};

use super::{Ctx, Staged};
use crate::chart::{legend_for, placement, resolve_chart_kind};
use crate::error::ActionError;
use crate::payload::{self, field, Object};

const HIGHLIGHT_FILL: &str = "#FFC7CE";
const HIGHLIGHT_FONT: &str = "#9C0006";

const SCALE_MIN: &str = "#F8696B";
const SCALE_MID: &str = "#FFEB84";
const SCALE_MAX: &str = "#63BE7B";
const DATA_BAR: &str = "#638EC6";
const ICON_SET: &str = "3Arrows";

// ============================================================================
// Conditional formats
// ============================================================================

fn conditional(ctx: &mut Ctx<'_>, rule: ConditionalRule) -> Result<Staged, ActionError> {
    let region = ctx.target.clone();
    Ok(Staged::effect(vec![Mutation::AddConditionalFormat(ConditionalFormat { region, rule })]))
}

/// `{operator, value, value2, format}` or `{text, format}`. Without an
/// operator, `min` and `max` mean between and either alone a bound.
pub(super) fn conditional_format(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let map = payload::object(ctx.tag(), ctx.data())?
        .ok_or_else(|| ctx.payload_error("a condition is required"))?;

    let style = match field(&map, &["format", "style", "highlight"]) {
        Some(Value::Object(nested)) => payload::style_from_object(ctx.tag(), nested)?,
        _ => payload::style_from_object(ctx.tag(), &map)?,
    };
    let style = if style.is_empty() { default_highlight() } else { style };

    if let Some(text) = field(&map, &["text", "contains", "textcontains"]) {
        let text = payload::scalar_text(text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ctx.payload_error("text condition must not be empty"))?;
        return conditional(ctx, ConditionalRule::TextContains { text, style });
    }

    let num = |names: &[&str]| -> Result<Option<f64>, ActionError> {
        match field(&map, names) {
            None => Ok(None),
            Some(v) => payload::as_number(v)
                .map(Some)
                .ok_or_else(|| ActionError::payload("conditionalFormat", format!("{v} is not a number"))),
        }
    };
    let first = num(&["value", "value1", "threshold"])?;
    let second = num(&["value2"])?;
    let min = num(&["min", "minimum"])?;
    let max = num(&["max", "maximum"])?;

    let operator = match field(&map, &["operator", "condition", "comparison"]) {
        Some(op) => Some(
            op.as_str()
                .and_then(ComparisonOperator::parse)
                .ok_or_else(|| ctx.payload_error(format!("unknown operator {op}")))?,
        ),
        None => None,
    };

    let (operator, value1, value2) = match (operator, first.or(min), second.or(max)) {
        (Some(op @ (ComparisonOperator::Between | ComparisonOperator::NotBetween)), Some(a), Some(b)) => {
            (op, a.min(b), Some(a.max(b)))
        }
        (Some(ComparisonOperator::Between | ComparisonOperator::NotBetween), _, _) => {
            return Err(ctx.payload_error("between needs two values"));
        }
        (Some(op), Some(a), _) => (op, a, None),
        (Some(_), None, _) => return Err(ctx.payload_error("a comparison value is required")),
        (None, _, _) => match (first, min, max) {
            (Some(a), _, _) => (ComparisonOperator::EqualTo, a, None),
            (None, Some(lo), Some(hi)) => (ComparisonOperator::Between, lo.min(hi), Some(lo.max(hi))),
            (None, Some(lo), None) => (ComparisonOperator::GreaterThanOrEqual, lo, None),
            (None, None, Some(hi)) => (ComparisonOperator::LessThanOrEqual, hi, None),
            (None, None, None) => return Err(ctx.payload_error("an operator and a value are required")),
        },
    };

    conditional(ctx, ConditionalRule::CellValue { operator, value1, value2, style })
}

fn default_highlight() -> StylePatch {
    StylePatch {
        fill_color: Some(HIGHLIGHT_FILL.to_string()),
        font_color: Some(HIGHLIGHT_FONT.to_string()),
        ..StylePatch::default()
    }
}

fn color_field(ctx: &Ctx<'_>, map: &Object, names: &[&str]) -> Result<Option<String>, ActionError> {
    match field(map, names) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .and_then(payload::parse_color)
            .map(Some)
            .ok_or_else(|| ctx.payload_error(format!("invalid color {v}"))),
    }
}

/// Two- or three-color scale. A bare payload gets red, yellow, green.
pub(super) fn color_scale(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let rule = match payload::object(ctx.tag(), ctx.data())? {
        None => ConditionalRule::ColorScale {
            min_color: SCALE_MIN.to_string(),
            mid_color: Some(SCALE_MID.to_string()),
            max_color: SCALE_MAX.to_string(),
        },
        Some(map) => ConditionalRule::ColorScale {
            min_color: color_field(ctx, &map, &["mincolor", "min", "low"])?.unwrap_or_else(|| SCALE_MIN.to_string()),
            mid_color: color_field(ctx, &map, &["midcolor", "mid", "middle"])?,
            max_color: color_field(ctx, &map, &["maxcolor", "max", "high"])?.unwrap_or_else(|| SCALE_MAX.to_string()),
        },
    };
    conditional(ctx, rule)
}

pub(super) fn data_bar(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let color = match payload::loose(ctx.data()) {
        Value::Object(map) => color_field(ctx, &map, &["color", "barcolor", "fill"])?,
        Value::String(s) if s.is_empty() => None,
        other => Some(
            payload::scalar_text(&other)
                .as_deref()
                .and_then(payload::parse_color)
                .ok_or_else(|| ctx.payload_error(format!("invalid color {other}")))?,
        ),
    };
    let color = color.unwrap_or_else(|| DATA_BAR.to_string());
    conditional(ctx, ConditionalRule::DataBar { color })
}

pub(super) fn icon_set(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let style = match payload::loose(ctx.data()) {
        Value::Object(map) => field(&map, &["style", "iconset", "icons"]).and_then(payload::scalar_text),
        other => payload::scalar_text(&other),
    };
    let style = style
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ICON_SET.to_string());
    conditional(ctx, ConditionalRule::IconSet { style })
}

pub(super) fn clear_conditional_formats(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let region = ctx.target.clone();
    Ok(Staged::effect(vec![Mutation::ClearConditionalFormats { region }]))
}

// ============================================================================
// Charts, tables, pivots, names
// ============================================================================

/// Chart of the target's data. The type comes from `chartType`, falling
/// back to the data text; the anchor from `position` or the configured
/// default.
pub(super) fn chart(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let type_name = ctx
        .action
        .chart_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| payload::text(ctx.data()));
    let kind = resolve_chart_kind(&type_name);

    let anchor_text = ctx
        .action
        .position
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(&ctx.config.chart_anchor)
        .to_string();
    let anchor = ctx.resolve_near_target(&anchor_text)?;
    let (top_left, bottom_right) = placement(&anchor);

    let source = ctx
        .target_footprint()?
        .ok_or_else(|| ctx.payload_error("the chart range holds no data"))?;
    let title = ctx
        .action
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    debug!("chart {} of {} at {}", kind.label(), source, top_left);
    Ok(Staged::effect(vec![Mutation::AddChart(Chart {
        kind,
        source,
        title,
        top_left,
        bottom_right,
        legend: Some(legend_for(kind)),
    })]))
}

/// `{name, hasHeaders, style}` or a bare table name.
pub(super) fn table(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let (name, has_headers, style) = match payload::loose(ctx.data()) {
        Value::Object(map) => {
            let has_headers = match field(&map, &["hasheaders", "headers", "header"]) {
                Some(v) => payload::as_bool(v).ok_or_else(|| ctx.payload_error(format!("hasHeaders: {v}")))?,
                None => true,
            };
            (
                field(&map, &["name", "tablename"]).and_then(payload::scalar_text),
                has_headers,
                field(&map, &["style", "tablestyle"]).and_then(payload::scalar_text),
            )
        }
        other => (payload::scalar_text(&other), true, None),
    };
    let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    let style = style.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    let region = ctx.target.clone();
    Ok(Staged::effect(vec![Mutation::AddTable { region, name, has_headers, style }]))
}

/// Summarize the target into a two-column pivot. The destination is
/// `position`, or two columns right of the target.
pub(super) fn pivot(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let map = payload::object(ctx.tag(), ctx.data())?.unwrap_or_default();

    let destination_text = ctx
        .action
        .position
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .or_else(|| field(&map, &["destination", "position", "output"]).and_then(payload::scalar_text));
    let destination = match destination_text {
        Some(address) => ctx.resolve_near_target(&address)?.first_cell(),
        None => {
            let target = &ctx.target;
            Region::cell(target.start_row, target.end_col + 2).with_sheet(target.sheet.clone())
        }
    };

    let text_field = |names: &[&str]| {
        field(&map, names)
            .and_then(payload::scalar_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let aggregate = match text_field(&["aggregate", "function", "summarizeby"]) {
        Some(name) => Aggregate::parse(&name).ok_or_else(|| ctx.payload_error(format!("unknown aggregate {name:?}")))?,
        None => Aggregate::default(),
    };
    let spec = PivotSpec {
        row_field: text_field(&["rows", "rowfield", "groupby"]),
        value_field: text_field(&["values", "valuefield", "value"]),
        aggregate,
    };

    let source = ctx
        .target_footprint()?
        .ok_or_else(|| ctx.payload_error("the pivot source holds no data"))?;
    Ok(Staged::effect(vec![Mutation::AddPivot { source, destination, spec }]))
}

pub(super) fn named_range(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let name = match payload::loose(ctx.data()) {
        Value::Object(map) => field(&map, &["name"]).and_then(payload::scalar_text),
        other => payload::scalar_text(&other),
    };
    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ctx.payload_error("a name is required"))?;
    let region = ctx.target.clone();
    Ok(Staged::effect(vec![Mutation::DefineName { name, region }]))
}

// ============================================================================
// Validation
// ============================================================================

/// Dropdown list. Options come from the first column of `source` (unique,
/// non-empty, in order) or from the data.
pub(super) fn list_validation(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let items = match ctx.optional_source()? {
        Some(source) => {
            let column = Region::new(source.start_row, source.start_col, source.end_row, source.start_col)
                .with_sheet(source.sheet.clone());
            let column = ctx.footprint(&column)?;
            let mut items: Vec<String> = Vec::new();
            if let Some(column) = column {
                let data = ctx.load(&column)?;
                for row in &data.values {
                    let text = row.first().and_then(payload::scalar_text).unwrap_or_default();
                    let text = text.trim();
                    if !text.is_empty() && !items.iter().any(|i| i == text) {
                        items.push(text.to_string());
                    }
                }
            }
            items
        }
        None => payload::list_items(ctx.data()),
    };
    if items.is_empty() {
        return Err(ctx.payload_error("the list has no options"));
    }
    let region = ctx.target.clone();
    let rule = ValidationRule::list_inline(items);
    Ok(Staged::effect(vec![Mutation::AddValidation { region, rule }]))
}

/// `{type: whole|decimal|textLength, operator, min, max, value, message}`.
pub(super) fn number_validation(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let map = payload::object(ctx.tag(), ctx.data())?
        .ok_or_else(|| ctx.payload_error("a constraint is required"))?;

    let num = |names: &[&str]| -> Result<Option<f64>, ActionError> {
        match field(&map, names) {
            None => Ok(None),
            Some(v) => payload::as_number(v)
                .map(Some)
                .ok_or_else(|| ActionError::payload("numberValidation", format!("{v} is not a number"))),
        }
    };
    let min = num(&["min", "minimum", "value1"])?;
    let max = num(&["max", "maximum", "value2"])?;
    let value = num(&["value"])?;

    let operator = match field(&map, &["operator", "condition"]) {
        Some(op) => Some(
            op.as_str()
                .and_then(ComparisonOperator::parse)
                .ok_or_else(|| ctx.payload_error(format!("unknown operator {op}")))?,
        ),
        None => None,
    };
    let constraint = match (operator, min, max, value) {
        (Some(op @ (ComparisonOperator::Between | ComparisonOperator::NotBetween)), Some(lo), Some(hi), _) => {
            NumericConstraint { operator: op, value1: lo.min(hi), value2: Some(lo.max(hi)) }
        }
        (Some(ComparisonOperator::Between | ComparisonOperator::NotBetween), _, _, _) => {
            return Err(ctx.payload_error("between needs min and max"));
        }
        (Some(op), lo, hi, v) => match v.or(lo).or(hi) {
            Some(v) => NumericConstraint::single(op, v),
            None => return Err(ctx.payload_error("a comparison value is required")),
        },
        (None, Some(lo), Some(hi), _) => NumericConstraint::between(lo.min(hi), lo.max(hi)),
        (None, Some(lo), None, _) => NumericConstraint::single(ComparisonOperator::GreaterThanOrEqual, lo),
        (None, None, Some(hi), _) => NumericConstraint::single(ComparisonOperator::LessThanOrEqual, hi),
        (None, None, None, Some(v)) => NumericConstraint::single(ComparisonOperator::EqualTo, v),
        (None, None, None, None) => return Err(ctx.payload_error("min, max or value is required")),
    };

    let kind = field(&map, &["type", "kind", "validationtype"])
        .and_then(Value::as_str)
        .map(payload::norm_key)
        .unwrap_or_else(|| "decimal".to_string());
    let mut rule = match kind.as_str() {
        "whole" | "wholenumber" | "integer" => ValidationRule::whole_number(constraint),
        "decimal" | "number" => ValidationRule::decimal(constraint),
        "textlength" | "length" => ValidationRule::text_length(constraint),
        other => return Err(ctx.payload_error(format!("unknown validation type {other:?}"))),
    };
    if let Some(message) = field(&map, &["message", "errormessage", "error"]).and_then(payload::scalar_text) {
        if !message.trim().is_empty() {
            rule = rule.with_error_message(message);
        }
    }

    let region = ctx.target.clone();
    Ok(Staged::effect(vec![Mutation::AddValidation { region, rule }]))
}

pub(super) fn clear_validation(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let region = ctx.target.clone();
    Ok(Staged::effect(vec![Mutation::ClearValidation { region }]))
}

// ============================================================================
// Filters and comments
// ============================================================================

/// Auto-filter over the target, optionally with `{column, values}`.
pub(super) fn filter(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let region = ctx
        .target_footprint()?
        .ok_or_else(|| ctx.payload_error("the filter range holds no data"))?;

    let criteria = match payload::object(ctx.tag(), ctx.data())? {
        None => None,
        Some(map) => match field(&map, &["column", "col", "field"]) {
            None => None,
            Some(column) => {
                let column = payload::column_key(ctx.tag(), column, &region)?;
                let values = match field(&map, &["values", "value", "criteria", "equals"]) {
                    Some(Value::Array(items)) => items.iter().filter_map(payload::scalar_text).collect(),
                    Some(other) => payload::scalar_text(other).into_iter().collect(),
                    None => Vec::new(),
                };
                if values.is_empty() {
                    return Err(ctx.payload_error("a filter column needs values to keep"));
                }
                Some(FilterCriteria { column, values })
            }
        },
    };
    Ok(Staged::effect(vec![Mutation::SetAutoFilter { region, criteria }]))
}

pub(super) fn clear_filter(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let sheet = ctx.target.sheet.clone();
    Ok(Staged::effect(vec![Mutation::ClearAutoFilter { sheet }]))
}

/// Note on the target's first cell. Empty text removes it.
pub(super) fn comment(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    let text = match payload::loose(ctx.data()) {
        Value::Object(map) => field(&map, &["text", "comment", "note"]).and_then(payload::scalar_text),
        Value::Null => None,
        other => payload::scalar_text(&other),
    };
    let text = text.filter(|t| !t.trim().is_empty());
    let cell = ctx.target.first_cell();
    Ok(Staged::effect(vec![Mutation::SetComment { cell, text }]))
}
