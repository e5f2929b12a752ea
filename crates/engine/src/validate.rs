//! Validation and coercion of raw input against a parameter list.
//!
//! Parameters are checked in declaration order. Each field reports at most
//! one error, but every failing field is reported. Output only ever contains
//! declared parameters.

use indexmap::IndexMap;
use omnicmd_types::{FieldError, ParamType, Parameter, ValidationResult};
use regex::Regex;
use serde_json::{Map, Value};

/// Validates `input` against `parameters`.
///
/// Missing optional fields with a default receive the default; missing
/// optional fields without one are omitted. `null` counts as missing.
pub fn validate(parameters: &[Parameter], input: &Map<String, Value>) -> ValidationResult {
    let mut data = IndexMap::new();
    let mut errors = Vec::new();

    for param in parameters {
        let provided = input.get(&param.name).filter(|value| !value.is_null());
        let Some(value) = provided else {
            if param.required {
                errors.push(FieldError::new(&param.name, format!("Parameter '{}' is required", param.name)));
            } else if let Some(default) = &param.default {
                data.insert(param.name.clone(), default.clone());
            }
            continue;
        };

        match check_value(param, value) {
            Ok(()) => {
                data.insert(param.name.clone(), value.clone());
            }
            Err(message) => errors.push(FieldError::new(&param.name, message)),
        }
    }

    ValidationResult::from_parts(data, errors)
}

/// Runs the type, enum, bound and pattern checks for one present value.
pub fn check_value(param: &Parameter, value: &Value) -> Result<(), String> {
    if !param.r#type.accepts(value) {
        return Err(format!("Must be a {}", param.r#type));
    }

    if !param.enum_values.is_empty() && !param.enum_values.iter().any(|allowed| values_equal(allowed, value)) {
        let allowed: Vec<String> = param.enum_values.iter().map(display_value).collect();
        return Err(format!("Value must be one of: {}", allowed.join(", ")));
    }

    if param.r#type == ParamType::Number
        && let Some(number) = value.as_f64()
    {
        if let Some(min) = param.min
            && number < min
        {
            return Err(format!("Value must be >= {min}"));
        }
        if let Some(max) = param.max
            && number > max
        {
            return Err(format!("Value must be <= {max}"));
        }
    }

    if param.r#type == ParamType::String
        && let (Some(pattern), Some(text)) = (&param.pattern, value.as_str())
    {
        let matches = Regex::new(pattern).map(|regex| regex.is_match(text)).unwrap_or(false);
        if !matches {
            return Err(format!("Value does not match pattern: {pattern}"));
        }
    }

    Ok(())
}

/// Value equality where numbers compare numerically, so `10` equals `10.0`.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
