//! Projection of parameter lists into JSON Schema, and the inverse step of
//! pulling raw parameter values out of an HTTP request.

use omnicmd_types::{ApiRequest, CommandSchema, HttpMethod, ParamType, Parameter};
use serde_json::{Map, Number, Value};

/// Prefix for derived agent tool names.
pub const TOOL_NAMESPACE: &str = "omnicmd";

/// Largest integer magnitude an f64 represents exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Builds the `{type: "object", properties, required}` schema for a
/// parameter list. `required` is omitted when no parameter is required.
pub fn to_json_schema(parameters: &[Parameter]) -> Map<String, Value> {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in parameters {
        properties.insert(param.name.clone(), parameter_schema(param));
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }
    schema
}

fn parameter_schema(param: &Parameter) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String(param.r#type.as_str().into()));
    if !param.description.is_empty() {
        schema.insert("description".into(), Value::String(param.description.clone()));
    }
    if let Some(default) = &param.default {
        schema.insert("default".into(), default.clone());
    }
    if !param.enum_values.is_empty() {
        schema.insert("enum".into(), Value::Array(param.enum_values.clone()));
    }

    match param.r#type {
        ParamType::Number => {
            if let Some(min) = param.min {
                schema.insert("minimum".into(), number_value(min));
            }
            if let Some(max) = param.max {
                schema.insert("maximum".into(), number_value(max));
            }
        }
        ParamType::String => {
            if let Some(pattern) = &param.pattern {
                schema.insert("pattern".into(), Value::String(pattern.clone()));
            }
        }
        ParamType::Array => {
            if let Some(items) = &param.items {
                schema.insert("items".into(), parameter_schema(items));
            }
        }
        ParamType::Object => {
            if let Some(properties) = &param.properties {
                let nested: Vec<Parameter> = properties
                    .iter()
                    .map(|(name, property)| Parameter {
                        name: name.clone(),
                        ..property.clone()
                    })
                    .collect();
                let nested_schema = to_json_schema(&nested);
                if let Some(nested_properties) = nested_schema.get("properties") {
                    schema.insert("properties".into(), nested_properties.clone());
                }
                if let Some(nested_required) = nested_schema.get("required") {
                    schema.insert("required".into(), nested_required.clone());
                }
            }
        }
        ParamType::Boolean => {}
    }

    Value::Object(schema)
}

/// Collects raw input for a command from an HTTP request.
///
/// GET requests read declared parameters from the query string and coerce
/// them by declared type, since query strings carry no types. Other methods
/// merge the JSON body as-is. Route parameters are applied last and win.
pub fn extract_from_request(request: &ApiRequest, parameters: &[Parameter]) -> Map<String, Value> {
    let mut input = Map::new();

    if request.method == HttpMethod::Get {
        for param in parameters {
            if let Some(raw) = request.query_param(&param.name) {
                input.insert(param.name.clone(), coerce_str(param, raw));
            }
        }
    } else if let Some(Value::Object(body)) = &request.body {
        for (key, value) in body {
            input.insert(key.clone(), value.clone());
        }
    }

    for (key, raw) in &request.path_params {
        let value = match parameters.iter().find(|param| &param.name == key) {
            Some(param) => coerce_str(param, raw),
            None => Value::String(raw.clone()),
        };
        input.insert(key.clone(), value);
    }

    input
}

/// Converts a string from a query string or command line into the value
/// shape of `param`.
///
/// Booleans accept `true` and `1`; anything else is false. Unparseable
/// numbers and objects stay strings so validation reports the type error.
pub fn coerce_str(param: &Parameter, raw: &str) -> Value {
    match param.r#type {
        ParamType::Boolean => Value::Bool(raw == "true" || raw == "1"),
        ParamType::Number => match raw.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => number_value(number),
            _ => Value::String(raw.to_string()),
        },
        ParamType::Array => Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| match &param.items {
                    Some(items) => coerce_str(items, item),
                    None => Value::String(item.to_string()),
                })
                .collect(),
        ),
        ParamType::Object => match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => value,
            _ => Value::String(raw.to_string()),
        },
        ParamType::String => Value::String(raw.to_string()),
    }
}

/// Whole numbers become JSON integers, everything else a float.
pub fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < MAX_EXACT_INTEGER {
        Value::Number(Number::from(number as i64))
    } else {
        Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Tool name for the agent surface: the explicit override, or
/// `omnicmd_<component>_<component>` lowercased.
pub fn agent_tool_name(schema: &CommandSchema) -> String {
    if let Some(name) = schema.mcp.tool_name.as_deref().filter(|name| !name.trim().is_empty()) {
        return name.to_string();
    }
    let components: Vec<String> = schema
        .name
        .split_whitespace()
        .map(|component| {
            component
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c.to_ascii_lowercase() } else { '_' })
                .collect()
        })
        .collect();
    format!("{}_{}", TOOL_NAMESPACE, components.join("_"))
}

/// HTTP route for a command: the explicit override, or the hierarchical
/// name with spaces replaced by `/`.
pub fn api_path(schema: &CommandSchema) -> String {
    if let Some(path) = schema.api.path.as_deref().filter(|path| !path.trim().is_empty()) {
        return if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
    }
    let components: Vec<&str> = schema.name.split_whitespace().collect();
    format!("/{}", components.join("/"))
}
