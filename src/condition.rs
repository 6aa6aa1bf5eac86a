//! Single-predicate conditions evaluated against a [`FileInfo`].
//!
//! A condition names a field by dot-path, an [`Operator`], and the operand(s)
//! the operator needs. The operand slots mirror the persisted rule format:
//! `pattern` for text/regex, `value` for comparisons, and `start_date` /
//! `end_date` for ranges.

use crate::error::ConditionError;
use crate::file_info::FileInfo;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

/// Comparison performed by a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Exact, type-sensitive equality.
    Equals,
    /// Substring test on strings, membership test on lists.
    Contains,
    /// Regular-expression search on strings.
    Regex,
    GreaterThan,
    LessThan,
    /// Inclusive range; missing bounds are open.
    Between,
    /// Field is present.
    Exists,
    /// Any operator name this crate does not know. Never matches.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::Contains => "contains",
            Operator::Regex => "regex",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::Between => "between",
            Operator::Exists => "exists",
            Operator::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field path, an operator and its operands.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(
        default,
        rename = "start_date",
        alias = "start_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub start: Option<Value>,
    #[serde(
        default,
        rename = "end_date",
        alias = "end_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub end: Option<Value>,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator) -> Self {
        Self {
            field: field.into(),
            operator,
            ..Default::default()
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_range(mut self, start: Option<Value>, end: Option<Value>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Evaluates the condition.
    ///
    /// An absent field never matches, `Exists` included. `Err` is reserved for
    /// a misconfigured condition (bad regex, uncomparable operand); a field
    /// whose runtime type does not suit the operator is simply `Ok(false)`.
    pub fn evaluate(&self, info: &FileInfo) -> Result<bool, ConditionError> {
        let Some(field_value) = info.get_field(&self.field) else {
            return Ok(false);
        };
        let field_value = field_value.as_ref();

        match self.operator {
            Operator::Exists => Ok(true),
            Operator::Equals => Ok(self
                .text_or_value()
                .is_some_and(|operand| loosely_equal(field_value, &operand))),
            Operator::Contains => Ok(self.contains(field_value)),
            Operator::Regex => self.regex_search(field_value),
            Operator::GreaterThan | Operator::LessThan => {
                let Some(actual) = field_value.as_f64() else {
                    return Ok(false);
                };
                let operand = self.value.as_ref().ok_or(ConditionError::MissingOperand {
                    operator: self.operator.as_str(),
                    operand: "value",
                })?;
                let expected = require_comparable(operand)?;
                Ok(if self.operator == Operator::GreaterThan {
                    actual > expected
                } else {
                    actual < expected
                })
            }
            Operator::Between => {
                let Some(actual) = field_value.as_f64() else {
                    return Ok(false);
                };
                let start = match &self.start {
                    Some(bound) => require_comparable(bound)?,
                    None => f64::NEG_INFINITY,
                };
                let end = match &self.end {
                    Some(bound) => require_comparable(bound)?,
                    None => f64::INFINITY,
                };
                Ok(start <= actual && actual <= end)
            }
            Operator::Unknown => Ok(false),
        }
    }

    /// `value`, or `pattern` as a string when no value is set.
    fn text_or_value(&self) -> Option<Cow<'_, Value>> {
        match (&self.value, &self.pattern) {
            (Some(value), _) => Some(Cow::Borrowed(value)),
            (None, Some(pattern)) => Some(Cow::Owned(Value::String(pattern.clone()))),
            (None, None) => None,
        }
    }

    fn contains(&self, field_value: &Value) -> bool {
        let Some(operand) = self.text_or_value() else {
            return false;
        };
        match (field_value, operand.as_ref()) {
            (Value::String(haystack), Value::String(needle)) => {
                if self.case_sensitive {
                    haystack.contains(needle.as_str())
                } else {
                    haystack.to_lowercase().contains(&needle.to_lowercase())
                }
            }
            // List membership is always exact.
            (Value::Array(items), needle) => items.iter().any(|item| loosely_equal(item, needle)),
            _ => false,
        }
    }

    fn regex_search(&self, field_value: &Value) -> Result<bool, ConditionError> {
        let Value::String(haystack) = field_value else {
            return Ok(false);
        };
        let pattern = self
            .pattern
            .as_deref()
            .or_else(|| self.value.as_ref().and_then(Value::as_str))
            .ok_or(ConditionError::MissingOperand {
                operator: "regex",
                operand: "pattern",
            })?;
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!self.case_sensitive)
            .build()
            .map_err(|source| ConditionError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(regex.is_match(haystack))
    }
}

/// Equality that treats `1` and `1.0` as the same number.
fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

/// Operand side of a comparison: numbers as-is, date strings as Unix seconds.
/// Field values are only ever compared when they are numbers.
fn comparable(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

fn require_comparable(value: &Value) -> Result<f64, ConditionError> {
    comparable(value).ok_or_else(|| ConditionError::NotComparable {
        operand: value.to_string(),
    })
}

/// Parses RFC 3339, naive ISO date-times and plain dates. Naive values are
/// interpreted in local time.
pub fn parse_timestamp(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis() as f64 / 1000.0);
    }
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
}
