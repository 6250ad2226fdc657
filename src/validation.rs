//! Declarative field validation over raw JSON payloads.
//!
//! A [`RuleSet`] maps field names to the rules they must satisfy. [`validate`]
//! evaluates every rule of every field and collects all violations, so a client
//! sees the complete list of problems in a single response.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

/// Field name → human readable messages, ordered by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Field name paired with the rules it is checked against.
pub type RuleSet = &'static [(&'static str, &'static [Rule])];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Present, not null, not a blank string and not an empty collection.
    Required,
    Email,
    String,
    /// Minimum number of characters.
    MinLength(usize),
    /// Maximum number of characters.
    MaxLength(usize),
    /// JSON integer, or a string holding one.
    Integer,
    NumericMin(i64),
    /// `true`, `false`, `0`, `1`, `"0"` or `"1"`.
    Boolean,
    /// Must equal the value of the named field.
    Same(&'static str),
}

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Checks `payload` against `rules`, returning every violation found.
pub fn validate(rules: RuleSet, payload: &Map<String, Value>) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    for (field, field_rules) in rules {
        let value = payload.get(*field).filter(|v| !v.is_null());
        let messages: Vec<String> = field_rules
            .iter()
            .filter_map(|rule| check(field, *rule, value, payload))
            .collect();
        if !messages.is_empty() {
            errors.insert((*field).to_string(), messages);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check(
    field: &str,
    rule: Rule,
    value: Option<&Value>,
    payload: &Map<String, Value>,
) -> Option<String> {
    let label = display_name(field);

    let Some(value) = value else {
        return (rule == Rule::Required).then(|| format!("The {label} field is required."));
    };

    let ok = match rule {
        Rule::Required => !is_blank(value),
        Rule::Email => value.as_str().is_some_and(is_valid_email),
        Rule::String => value.is_string(),
        Rule::MinLength(min) => value.as_str().map_or(true, |s| s.chars().count() >= min),
        Rule::MaxLength(max) => value.as_str().map_or(true, |s| s.chars().count() <= max),
        Rule::Integer => as_integer(value).is_some(),
        Rule::NumericMin(min) => as_number(value).map_or(true, |n| n >= min as f64),
        Rule::Boolean => as_boolean(value).is_some(),
        Rule::Same(other) => payload.get(other) == Some(value),
    };
    if ok {
        return None;
    }

    Some(match rule {
        Rule::Required => format!("The {label} field is required."),
        Rule::Email => format!("The {label} must be a valid email address."),
        Rule::String => format!("The {label} must be a string."),
        Rule::MinLength(min) => format!("The {label} must be at least {min} characters."),
        Rule::MaxLength(max) => format!("The {label} may not be greater than {max} characters."),
        Rule::Integer => format!("The {label} must be an integer."),
        Rule::NumericMin(min) => format!("The {label} must be at least {min}."),
        Rule::Boolean => format!("The {label} field must be true or false."),
        Rule::Same(other) => format!("The {label} and {} must match.", display_name(other)),
    })
}

fn display_name(field: &str) -> String {
    field.replace('_', " ")
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Reads a value accepted by [`Rule::Integer`].
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Reads a value accepted by [`Rule::Boolean`].
pub fn as_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.as_str() {
            "0" => Some(false),
            "1" => Some(true),
            _ => None,
        },
        _ => None,
    }
}
