use serde::{Deserialize, Serialize};

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    General,
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Some(Alignment::General),
            "left" => Some(Alignment::Left),
            "center" | "centre" | "middle" => Some(Alignment::Center),
            "right" => Some(Alignment::Right),
            "justify" | "justified" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlignment {
    Top,
    Middle,
    #[default]
    Bottom,
}

impl VerticalAlignment {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Some(VerticalAlignment::Top),
            "middle" | "center" | "centre" => Some(VerticalAlignment::Middle),
            "bottom" => Some(VerticalAlignment::Bottom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    #[default]
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
}

impl BorderStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thin" | "continuous" | "solid" => Some(BorderStyle::Thin),
            "medium" => Some(BorderStyle::Medium),
            "thick" => Some(BorderStyle::Thick),
            "dashed" | "dash" => Some(BorderStyle::Dashed),
            "dotted" | "dot" => Some(BorderStyle::Dotted),
            "double" => Some(BorderStyle::Double),
            _ => None,
        }
    }
}

/// Uniform four-edge border
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Border {
    pub style: BorderStyle,
    pub color: String,
}

/// Cell formatting options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CellFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub font_name: Option<String>, // None = workbook default
    pub font_size: Option<f64>,
    pub font_color: Option<String>,
    pub fill_color: Option<String>,
    pub number_format: String,
    pub alignment: Alignment,
    pub vertical_alignment: VerticalAlignment,
    pub wrap_text: bool,
    pub border: Option<Border>,
}

impl Default for CellFormat {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
            font_name: None,
            font_size: None,
            font_color: None,
            fill_color: None,
            number_format: "General".to_string(),
            alignment: Alignment::General,
            vertical_alignment: VerticalAlignment::Bottom,
            wrap_text: false,
            border: None,
        }
    }
}

impl CellFormat {
    pub fn is_default(&self) -> bool {
        *self == CellFormat::default()
    }

    /// Stable text form used for fingerprinting.
    pub fn signature(&self) -> String {
        format!(
            "{}{}{}{}|{}|{}|{}|{}|{}|{:?}|{:?}|{}|{}",
            self.bold as u8,
            self.italic as u8,
            self.underline as u8,
            self.strikethrough as u8,
            self.font_name.as_deref().unwrap_or(""),
            self.font_size.map(|s| s.to_string()).unwrap_or_default(),
            self.font_color.as_deref().unwrap_or(""),
            self.fill_color.as_deref().unwrap_or(""),
            self.number_format,
            self.alignment,
            self.vertical_alignment,
            self.wrap_text as u8,
            self.border
                .as_ref()
                .map(|b| format!("{:?}:{}", b.style, b.color))
                .unwrap_or_default(),
        )
    }
}

/// Sparse style update. `None` fields leave the current value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StylePatch {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strikethrough: Option<bool>,
    pub font_name: Option<String>,
    pub font_size: Option<f64>,
    pub font_color: Option<String>,
    pub fill_color: Option<String>,
    pub number_format: Option<String>,
    pub alignment: Option<Alignment>,
    pub vertical_alignment: Option<VerticalAlignment>,
    pub wrap_text: Option<bool>,
    pub border: Option<Border>,
}

impl StylePatch {
    pub fn is_empty(&self) -> bool {
        *self == StylePatch::default()
    }

    pub fn apply(&self, format: &mut CellFormat) {
        if let Some(v) = self.bold {
            format.bold = v;
        }
        if let Some(v) = self.italic {
            format.italic = v;
        }
        if let Some(v) = self.underline {
            format.underline = v;
        }
        if let Some(v) = self.strikethrough {
            format.strikethrough = v;
        }
        if let Some(v) = &self.font_name {
            format.font_name = Some(v.clone());
        }
        if let Some(v) = self.font_size {
            format.font_size = Some(v);
        }
        if let Some(v) = &self.font_color {
            format.font_color = Some(v.clone());
        }
        if let Some(v) = &self.fill_color {
            format.fill_color = Some(v.clone());
        }
        if let Some(v) = &self.number_format {
            format.number_format = v.clone();
        }
        if let Some(v) = self.alignment {
            format.alignment = v;
        }
        if let Some(v) = self.vertical_alignment {
            format.vertical_alignment = v;
        }
        if let Some(v) = self.wrap_text {
            format.wrap_text = v;
        }
        if let Some(v) = &self.border {
            format.border = Some(v.clone());
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    /// Formula source text, including the leading `=`. Not evaluated.
    Formula(String),
}

impl CellValue {
    /// Interpret typed input the way a spreadsheet entry bar does.
    ///
    /// Text keeps its exact spelling so a captured cell restores byte for byte.
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        if trimmed.starts_with('=') && trimmed.len() > 1 {
            return CellValue::Formula(trimmed.to_string());
        }

        if trimmed.eq_ignore_ascii_case("true") {
            return CellValue::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CellValue::Boolean(false);
        }

        if let Ok(num) = trimmed.parse::<f64>() {
            if num.is_finite() && input == trimmed {
                return CellValue::Number(num);
            }
        }

        CellValue::Text(input.to_string())
    }

    /// Build from a JSON scalar. Arrays and objects are written as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Empty,
            serde_json::Value::Bool(b) => CellValue::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => CellValue::Number(f),
                None => CellValue::Text(n.to_string()),
            },
            serde_json::Value::String(s) => CellValue::from_input(s),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// Source text: formula text for formulas, literal text otherwise.
    pub fn raw(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Formula(source) => source.clone(),
        }
    }

    /// JSON form reported by range reads. Empty cells read as `""`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Empty => serde_json::Value::String(String::new()),
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(format_number(*n))),
            CellValue::Boolean(b) => serde_json::Value::Bool(*b),
            CellValue::Formula(source) => serde_json::Value::String(source.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, CellValue::Formula(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Render a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub format: CellFormat,
    pub comment: Option<String>,
    pub hyperlink: Option<String>,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, input: &str) {
        self.value = CellValue::from_input(input);
    }

    /// True when nothing about the cell differs from a fresh one.
    pub fn is_blank(&self) -> bool {
        self.value.is_empty() && self.format.is_default() && self.comment.is_none() && self.hyperlink.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_input_types() {
        assert_eq!(CellValue::from_input(""), CellValue::Empty);
        assert_eq!(CellValue::from_input("  "), CellValue::Empty);
        assert_eq!(CellValue::from_input("42"), CellValue::Number(42.0));
        assert_eq!(CellValue::from_input("-1.5"), CellValue::Number(-1.5));
        assert_eq!(CellValue::from_input("true"), CellValue::Boolean(true));
        assert_eq!(CellValue::from_input("FALSE"), CellValue::Boolean(false));
        assert_eq!(CellValue::from_input("=A1+1"), CellValue::Formula("=A1+1".into()));
        assert_eq!(CellValue::from_input("hello"), CellValue::Text("hello".into()));
        assert_eq!(CellValue::from_input("inf"), CellValue::Text("inf".into()));
    }

    #[test]
    fn test_text_keeps_exact_spelling() {
        assert_eq!(CellValue::from_input(" padded ").raw(), " padded ");
        // A padded number stays text so it reads back unchanged
        assert_eq!(CellValue::from_input(" 7").raw(), " 7");
        assert_eq!(CellValue::from_input("=").raw(), "=");
    }

    #[test]
    fn test_raw_roundtrip() {
        for input in ["1", "2.5", "TRUE", "=SUM(A1:A3)", "text", ""] {
            assert_eq!(CellValue::from_input(input).raw(), input);
        }
    }

    #[test]
    fn test_json_forms() {
        assert_eq!(CellValue::Empty.to_json(), serde_json::json!(""));
        assert_eq!(CellValue::Number(3.0).to_json(), serde_json::json!(3.0));
        assert_eq!(CellValue::from_json(&serde_json::json!(null)), CellValue::Empty);
        assert_eq!(CellValue::from_json(&serde_json::json!(true)), CellValue::Boolean(true));
        assert_eq!(CellValue::from_json(&serde_json::json!("=A1")), CellValue::Formula("=A1".into()));
    }

    #[test]
    fn test_style_patch_is_sparse() {
        let mut format = CellFormat {
            italic: true,
            fill_color: Some("#FFFF00".into()),
            ..Default::default()
        };
        let patch = StylePatch {
            bold: Some(true),
            font_size: Some(14.0),
            ..Default::default()
        };
        patch.apply(&mut format);
        assert!(format.bold);
        assert!(format.italic);
        assert_eq!(format.font_size, Some(14.0));
        assert_eq!(format.fill_color.as_deref(), Some("#FFFF00"));
    }

    #[test]
    fn test_cell_format_defaults() {
        let format = CellFormat::default();
        assert!(!format.bold);
        assert_eq!(format.number_format, "General");
        assert_eq!(format.alignment, Alignment::General);
        assert_eq!(format.vertical_alignment, VerticalAlignment::Bottom);
        assert!(format.is_default());
    }

    #[test]
    fn test_alignment_parse() {
        assert_eq!(Alignment::parse("Center"), Some(Alignment::Center));
        assert_eq!(VerticalAlignment::parse("middle"), Some(VerticalAlignment::Middle));
        assert_eq!(BorderStyle::parse("dashed"), Some(BorderStyle::Dashed));
        assert_eq!(Alignment::parse("sideways"), None);
    }
}
