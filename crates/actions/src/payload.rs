//! Decoding of the string `data` field into typed payloads.
//!
//! Models are inconsistent about shapes: the same property arrives as a JSON
//! string, a bare word, a number or an object. Helpers here accept the common
//! spellings and reject everything else with a `PayloadDecode` error.

use log::debug;
use serde_json::{Map, Value};

use gridpilot_core::{letters_to_col, Region};
use gridpilot_engine::cell::format_number;
use gridpilot_engine::{Alignment, Border, BorderStyle, StylePatch, VerticalAlignment};

use crate::error::ActionError;

pub(crate) type Object = Map<String, Value>;

/// Lowercase and drop `_`, `-` and spaces, for key matching.
pub(crate) fn norm_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Look up the first key whose normalized spelling is one of `names`.
pub(crate) fn field<'a>(map: &'a Object, names: &[&str]) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| names.contains(&norm_key(k).as_str()))
        .map(|(_, v)| v)
}

/// `data` as a JSON object; `None` when `data` is empty.
pub(crate) fn object(kind: &str, data: &str) -> Result<Option<Object>, ActionError> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(other) => Err(ActionError::payload(kind, format!("expected an object, found {}", type_name(&other)))),
        Err(err) => Err(ActionError::payload(kind, format!("malformed JSON: {err}"))),
    }
}

/// `data` as a JSON value if it parses, the bare text as a string otherwise.
pub(crate) fn loose(data: &str) -> Value {
    let trimmed = data.trim();
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

/// Plain text: a JSON string is unquoted, anything else is trimmed as is.
pub(crate) fn text(data: &str) -> String {
    match serde_json::from_str::<Value>(data.trim()) {
        Ok(Value::String(s)) => s,
        _ => data.trim().to_string(),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Cell text for a JSON scalar.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.as_f64().map(format_number).unwrap_or_else(|| n.to_string())),
        Value::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        _ => None,
    }
}

pub(crate) fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    let n: f64 = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches("pt").trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// A flag payload: empty means `default`.
pub(crate) fn flag(kind: &str, data: &str, default: bool) -> Result<bool, ActionError> {
    if data.trim().is_empty() {
        return Ok(default);
    }
    as_bool(&loose(data)).ok_or_else(|| ActionError::payload(kind, format!("expected true or false, found {:?}", data.trim())))
}

pub(crate) fn number(kind: &str, data: &str) -> Result<f64, ActionError> {
    let value = match loose(data) {
        Value::Object(map) => field(&map, &["value", "size", "width", "height"]).cloned().unwrap_or(Value::Null),
        other => other,
    };
    as_number(&value).ok_or_else(|| ActionError::payload(kind, format!("expected a number, found {:?}", data.trim())))
}

/// Items of a list payload: a JSON array of scalars or a comma separated string.
pub(crate) fn list_items(data: &str) -> Vec<String> {
    let items: Vec<String> = match loose(data) {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::Object(map) => match field(&map, &["values", "items", "list", "options"]) {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        },
        other => scalar_text(&other)
            .map(|s| s.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Resolve a column key against `region`: a number is a 0-based offset into
/// the region, a letter is an absolute column that must lie inside it.
pub(crate) fn column_key(kind: &str, value: &Value, region: &Region) -> Result<usize, ActionError> {
    let absolute = match value {
        Value::Number(n) => n
            .as_u64()
            .map(|offset| region.start_col + offset as usize)
            .ok_or_else(|| ActionError::payload(kind, format!("column index {n} is not a non-negative integer")))?,
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<usize>() {
                Ok(offset) => region.start_col + offset,
                Err(_) => letters_to_col(s)
                    .ok_or_else(|| ActionError::payload(kind, format!("{s:?} is not a column")))?,
            }
        }
        other => return Err(ActionError::payload(kind, format!("expected a column, found {}", type_name(other)))),
    };
    if absolute < region.start_col || absolute > region.end_col {
        return Err(ActionError::payload(kind, format!("column is outside {}", region.a1())));
    }
    Ok(absolute)
}

// ============================================================================
// Values
// ============================================================================

/// Decode a `values` payload into a rectangular grid.
///
/// Malformed JSON is written as one literal in lenient mode and rejected in
/// strict mode; well-formed JSON of the wrong shape is always rejected.
pub fn decode_values(data: &str, target: &Region, strict: bool) -> Result<Vec<Vec<Value>>, ActionError> {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return Err(ActionError::payload("values", "no data"));
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => normalize_values(value, target).map_err(|reason| ActionError::payload("values", reason)),
        Err(err) if strict => Err(ActionError::payload("values", format!("malformed JSON: {err}"))),
        Err(err) => {
            debug!("values payload is not JSON ({}); writing it as one literal", err);
            Ok(vec![vec![Value::String(data.to_string())]])
        }
    }
}

/// Scalar → 1×1; 1D array → one row, or one column when the target is a
/// single column of exactly that many rows; 2D array → padded rectangle.
pub fn normalize_values(value: Value, target: &Region) -> Result<Vec<Vec<Value>>, String> {
    match value {
        Value::Array(items) if items.is_empty() => Err("empty array".to_string()),
        Value::Array(items) if items.iter().any(Value::is_array) => {
            let mut rows: Vec<Vec<Value>> = items
                .into_iter()
                .map(|item| match item {
                    Value::Array(row) => row,
                    other => vec![other],
                })
                .collect();
            let width = rows.iter().map(Vec::len).max().unwrap_or(0);
            if width == 0 {
                return Err("every row is empty".to_string());
            }
            for row in &mut rows {
                row.resize(width, Value::String(String::new()));
            }
            Ok(rows)
        }
        Value::Array(items) => {
            if target.cols() == 1 && items.len() > 1 && target.rows() == items.len() {
                Ok(items.into_iter().map(|v| vec![v]).collect())
            } else {
                Ok(vec![items])
            }
        }
        Value::Object(_) => Err("expected an array or a scalar, found an object".to_string()),
        scalar => Ok(vec![vec![scalar]]),
    }
}

// ============================================================================
// Styles
// ============================================================================

/// Decode a `format` payload. At least one recognized property is required.
pub fn decode_style(kind: &str, data: &str) -> Result<StylePatch, ActionError> {
    let map = object(kind, data)?.ok_or_else(|| ActionError::payload(kind, "no format properties"))?;
    let patch = style_from_object(kind, &map)?;
    if patch.is_empty() {
        return Err(ActionError::payload(kind, "no recognized format properties"));
    }
    Ok(patch)
}

/// Collect the recognized style keys of `map`; unknown keys are ignored.
pub(crate) fn style_from_object(kind: &str, map: &Object) -> Result<StylePatch, ActionError> {
    let bad = |key: &str, value: &Value| ActionError::payload(kind, format!("{key}: unexpected {}", type_name(value)));
    let mut patch = StylePatch::default();

    for (key, value) in map {
        match norm_key(key).as_str() {
            "bold" => patch.bold = Some(as_bool(value).ok_or_else(|| bad(key, value))?),
            "italic" => patch.italic = Some(as_bool(value).ok_or_else(|| bad(key, value))?),
            "underline" => patch.underline = Some(as_bool(value).ok_or_else(|| bad(key, value))?),
            "strikethrough" | "strike" => {
                patch.strikethrough = Some(as_bool(value).ok_or_else(|| bad(key, value))?)
            }
            "fillcolor" | "fill" | "backgroundcolor" | "background" | "bgcolor" => {
                patch.fill_color = Some(color_value(value).ok_or_else(|| bad(key, value))?)
            }
            "fontcolor" | "color" | "textcolor" => {
                patch.font_color = Some(color_value(value).ok_or_else(|| bad(key, value))?)
            }
            "fontsize" | "size" => {
                let size = as_number(value).filter(|s| *s > 0.0 && *s <= 409.0).ok_or_else(|| bad(key, value))?;
                patch.font_size = Some(size);
            }
            "fontname" | "font" | "fontfamily" => {
                patch.font_name = Some(non_empty_text(value).ok_or_else(|| bad(key, value))?)
            }
            "numberformat" | "numfmt" | "format" => {
                patch.number_format = Some(non_empty_text(value).ok_or_else(|| bad(key, value))?)
            }
            "horizontalalignment" | "alignment" | "align" | "horizontal" => {
                let align = value.as_str().and_then(Alignment::parse).ok_or_else(|| bad(key, value))?;
                patch.alignment = Some(align);
            }
            "verticalalignment" | "valign" | "vertical" => {
                let align = value.as_str().and_then(VerticalAlignment::parse).ok_or_else(|| bad(key, value))?;
                patch.vertical_alignment = Some(align);
            }
            "wraptext" | "wrap" => patch.wrap_text = Some(as_bool(value).ok_or_else(|| bad(key, value))?),
            "border" | "borders" => {
                if let Some(border) = border_value(value).map_err(|reason| ActionError::payload(kind, reason))? {
                    patch.border = Some(border);
                }
            }
            _ => {}
        }
    }
    Ok(patch)
}

fn non_empty_text(value: &Value) -> Option<String> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn color_value(value: &Value) -> Option<String> {
    value.as_str().and_then(parse_color)
}

/// Normalize a color: `#rgb`, `#rrggbb` or bare hex become `#RRGGBB`;
/// names are kept lowercase.
pub fn parse_color(input: &str) -> Option<String> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.chars().all(|c| c.is_ascii_hexdigit()) {
        match hex.len() {
            6 => return Some(format!("#{}", hex.to_ascii_uppercase())),
            3 => {
                let doubled: String = hex.chars().flat_map(|c| [c, c]).collect();
                return Some(format!("#{}", doubled.to_ascii_uppercase()));
            }
            _ if s.starts_with('#') => return None,
            _ => {}
        }
    }
    if s.starts_with('#') || !s.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(s.to_ascii_lowercase())
}

/// `true`, a style name, a color, or `{style, color}`. `false` means no change.
pub(crate) fn border_value(value: &Value) -> Result<Option<Border>, String> {
    let thin_black = || Border { style: BorderStyle::Thin, color: "#000000".to_string() };
    match value {
        Value::Bool(true) => Ok(Some(thin_black())),
        Value::Bool(false) | Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() || s.eq_ignore_ascii_case("all") || s.eq_ignore_ascii_case("true") => {
            Ok(Some(thin_black()))
        }
        Value::String(s) => {
            if let Some(style) = BorderStyle::parse(s) {
                Ok(Some(Border { style, ..thin_black() }))
            } else if let Some(color) = parse_color(s) {
                Ok(Some(Border { color, ..thin_black() }))
            } else {
                Err(format!("border: {s:?} is neither a style nor a color"))
            }
        }
        Value::Object(map) => {
            let mut border = thin_black();
            if let Some(style) = field(map, &["style", "weight", "linestyle"]) {
                border.style = style
                    .as_str()
                    .and_then(BorderStyle::parse)
                    .ok_or_else(|| format!("border: unknown style {style}"))?;
            }
            if let Some(color) = field(map, &["color"]) {
                border.color = color_value(color).ok_or_else(|| format!("border: invalid color {color}"))?;
            }
            Ok(Some(border))
        }
        other => Err(format!("border: unexpected {}", type_name(other))),
    }
}
