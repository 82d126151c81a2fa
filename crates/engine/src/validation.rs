//! Data validation rules attached to cell regions.
//!
//! List matching is case-sensitive: "Yes" != "yes".

use serde::{Deserialize, Serialize};

use gridpilot_core::Region;

/// A validation rule that constrains cell input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub rule_type: ValidationType,
    /// If true, empty/blank values are always valid.
    pub ignore_blank: bool,
    /// For List type: show dropdown arrow in cell.
    pub show_dropdown: bool,
    pub error_message: Option<String>,
}

impl ValidationRule {
    pub fn new(rule_type: ValidationType) -> Self {
        let show_dropdown = matches!(rule_type, ValidationType::List(_));
        Self {
            rule_type,
            ignore_blank: true,
            show_dropdown,
            error_message: None,
        }
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Single-select list of literal options.
    pub fn list_inline(values: Vec<String>) -> Self {
        Self::new(ValidationType::List(values))
    }

    pub fn whole_number(constraint: NumericConstraint) -> Self {
        Self::new(ValidationType::WholeNumber(constraint))
    }

    pub fn decimal(constraint: NumericConstraint) -> Self {
        Self::new(ValidationType::Decimal(constraint))
    }

    pub fn text_length(constraint: NumericConstraint) -> Self {
        Self::new(ValidationType::TextLength(constraint))
    }

    /// The options of a list rule joined with `,` (the form hosts store).
    pub fn list_literal(&self) -> Option<String> {
        match &self.rule_type {
            ValidationType::List(items) => Some(items.join(",")),
            _ => None,
        }
    }

    /// Check a raw cell input against this rule.
    pub fn validate(&self, input: &str) -> ValidationResult {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return if self.ignore_blank {
                ValidationResult::Valid
            } else {
                self.invalid("Value is required")
            };
        }

        match &self.rule_type {
            ValidationType::AnyValue => ValidationResult::Valid,
            ValidationType::List(items) => {
                if items.iter().any(|i| i == trimmed) {
                    ValidationResult::Valid
                } else {
                    self.invalid("Value is not in the list")
                }
            }
            ValidationType::WholeNumber(c) => self.check_numeric(parse_numeric_input(trimmed, false), c),
            ValidationType::Decimal(c) => self.check_numeric(parse_numeric_input(trimmed, true), c),
            ValidationType::TextLength(c) => {
                self.check_numeric(Ok(trimmed.chars().count() as f64), c)
            }
            // Formulas are not evaluated here
            ValidationType::Custom(_) => ValidationResult::Valid,
        }
    }

    fn check_numeric(&self, parsed: Result<f64, NumericParseError>, c: &NumericConstraint) -> ValidationResult {
        match parsed {
            Ok(x) if eval_numeric_constraint(x, c.operator, c.value1, c.value2) => ValidationResult::Valid,
            Ok(_) => self.invalid("Value is outside the allowed range"),
            Err(e) => self.invalid(&e.to_string()),
        }
    }

    fn invalid(&self, reason: &str) -> ValidationResult {
        ValidationResult::Invalid {
            reason: self.error_message.clone().unwrap_or_else(|| reason.to_string()),
        }
    }
}

/// The type of validation to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationType {
    AnyValue,
    WholeNumber(NumericConstraint),
    Decimal(NumericConstraint),
    /// Literal options captured at install time (not a live reference).
    List(Vec<String>),
    TextLength(NumericConstraint),
    /// Custom formula that must return TRUE.
    Custom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericConstraint {
    pub operator: ComparisonOperator,
    pub value1: f64,
    /// Second value (required for Between/NotBetween).
    pub value2: Option<f64>,
}

impl NumericConstraint {
    pub fn between(min: f64, max: f64) -> Self {
        Self { operator: ComparisonOperator::Between, value1: min, value2: Some(max) }
    }

    pub fn single(operator: ComparisonOperator, value: f64) -> Self {
        Self { operator, value1: value, value2: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    Between,
    NotBetween,
    EqualTo,
    NotEqualTo,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl ComparisonOperator {
    /// Accepts names (`between`, `greaterThan`) and symbols (`>`, `<=`).
    pub fn parse(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "between" => Some(Self::Between),
            "notbetween" => Some(Self::NotBetween),
            "equal" | "equalto" | "=" | "==" | "eq" => Some(Self::EqualTo),
            "notequal" | "notequalto" | "<>" | "!=" | "ne" => Some(Self::NotEqualTo),
            "greaterthan" | ">" | "gt" => Some(Self::GreaterThan),
            "lessthan" | "<" | "lt" => Some(Self::LessThan),
            "greaterthanorequal" | "greaterthanorequalto" | ">=" | "gte" => Some(Self::GreaterThanOrEqual),
            "lessthanorequal" | "lessthanorequalto" | "<=" | "lte" => Some(Self::LessThanOrEqual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NumericParseError {
    Empty,
    InvalidFormat,
    /// Input has a fractional part but WholeNumber validation requires integer.
    FractionalNotAllowed,
}

impl std::fmt::Display for NumericParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericParseError::Empty => write!(f, "Value is empty"),
            NumericParseError::InvalidFormat => write!(f, "Value is not a valid number"),
            NumericParseError::FractionalNotAllowed => write!(f, "Whole number required (no decimals)"),
        }
    }
}

/// Parse user input as a number for validation.
///
/// Whitespace is trimmed and a leading `+` is allowed. For whole numbers any
/// decimal point is rejected, including `3.0`.
pub fn parse_numeric_input(value: &str, allow_decimal: bool) -> Result<f64, NumericParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(NumericParseError::Empty);
    }
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if !allow_decimal && unsigned.contains('.') {
        return Err(NumericParseError::FractionalNotAllowed);
    }
    match unsigned.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(NumericParseError::InvalidFormat),
    }
}

/// `Between(a, b)` is inclusive; `NotBetween(a, b)` is `x < a || x > b`.
pub fn eval_numeric_constraint(x: f64, operator: ComparisonOperator, a: f64, b: Option<f64>) -> bool {
    match operator {
        ComparisonOperator::Between => {
            let max = b.unwrap_or(a);
            x >= a && x <= max
        }
        ComparisonOperator::NotBetween => {
            let max = b.unwrap_or(a);
            x < a || x > max
        }
        ComparisonOperator::EqualTo => (x - a).abs() < f64::EPSILON,
        ComparisonOperator::NotEqualTo => (x - a).abs() >= f64::EPSILON,
        ComparisonOperator::GreaterThan => x > a,
        ComparisonOperator::LessThan => x < a,
        ComparisonOperator::GreaterThanOrEqual => x >= a,
        ComparisonOperator::LessThanOrEqual => x <= a,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Valid,
    Invalid { reason: String },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// Validation rules for one sheet. Later rules win over earlier ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationStore {
    rules: Vec<(Region, ValidationRule)>,
}

impl ValidationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a rule. A rule for the exact same region is replaced.
    pub fn set(&mut self, region: Region, rule: ValidationRule) {
        self.rules.retain(|(r, _)| !same_bounds(r, &region));
        self.rules.push((region, rule));
    }

    /// Remove every rule that overlaps the region.
    pub fn clear_range(&mut self, region: &Region) -> usize {
        let before = self.rules.len();
        self.rules.retain(|(r, _)| !r.overlaps(region));
        before - self.rules.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&ValidationRule> {
        self.rules
            .iter()
            .rev()
            .find(|(r, _)| r.contains(row, col))
            .map(|(_, rule)| rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Region, &ValidationRule)> {
        self.rules.iter().map(|(r, rule)| (r, rule))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn same_bounds(a: &Region, b: &Region) -> bool {
    (a.start_row, a.start_col, a.end_row, a.end_col) == (b.start_row, b.start_col, b.end_row, b.end_col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_rule_case_sensitive() {
        let rule = ValidationRule::list_inline(vec!["Yes".into(), "No".into()]);
        assert!(rule.show_dropdown);
        assert!(rule.validate("Yes").is_valid());
        assert!(!rule.validate("yes").is_valid());
        assert!(rule.validate("").is_valid());
        assert_eq!(rule.list_literal().as_deref(), Some("Yes,No"));
    }

    #[test]
    fn test_whole_number_rejects_fraction() {
        let rule = ValidationRule::whole_number(NumericConstraint::between(1.0, 10.0));
        assert!(rule.validate("5").is_valid());
        assert!(!rule.validate("3.0").is_valid());
        assert!(!rule.validate("11").is_valid());
        assert!(!rule.validate("abc").is_valid());
    }

    #[test]
    fn test_custom_error_message() {
        let rule = ValidationRule::decimal(NumericConstraint::single(ComparisonOperator::GreaterThan, 0.0))
            .with_error_message("Must be positive");
        assert_eq!(
            rule.validate("-1"),
            ValidationResult::Invalid { reason: "Must be positive".into() }
        );
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!(ComparisonOperator::parse("greaterThan"), Some(ComparisonOperator::GreaterThan));
        assert_eq!(ComparisonOperator::parse(">="), Some(ComparisonOperator::GreaterThanOrEqual));
        assert_eq!(ComparisonOperator::parse("not_between"), Some(ComparisonOperator::NotBetween));
        assert_eq!(ComparisonOperator::parse("around"), None);
    }

    #[test]
    fn test_store_replace_and_clear() {
        let mut store = ValidationStore::new();
        let a = Region::parse("A1:A10").unwrap();
        store.set(a.clone(), ValidationRule::list_inline(vec!["x".into()]));
        store.set(a.clone(), ValidationRule::list_inline(vec!["y".into()]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(4, 0).and_then(|r| r.list_literal()).as_deref(), Some("y"));
        assert!(store.get(4, 1).is_none());

        assert_eq!(store.clear_range(&Region::parse("A5").unwrap()), 1);
        assert!(store.is_empty());
    }
}
