use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The value type accepted by a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Returns true when `value` has the primitive shape of this type.
    ///
    /// Numbers must be finite. `null` never matches any type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.as_f64().is_some_and(f64::is_finite),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declares one input field of a command.
///
/// A parameter is either positional (consumed by argument order on the CLI)
/// or a flag (`--name`). Only positional parameters may be variadic. The
/// `items` and `properties` fields describe nested shapes for array and
/// object parameters; nested parameters may leave `name` empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    /// Field name, unique within a command.
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub r#type: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    /// Value used when the input omits this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Allowed values, compared by value.
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Regular expression a string value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub positional: bool,
    /// Ordering key among positional parameters; absent sorts last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default)]
    pub variadic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Parameter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Parameter>>,
    /// Alternate flag names. Single characters become short flags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, r#type: ParamType) -> Self {
        Self {
            name: name.into(),
            r#type,
            ..Default::default()
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Boolean)
    }

    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Array)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Object)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_enum<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn positional(mut self) -> Self {
        self.positional = true;
        self
    }

    pub fn at_position(mut self, position: u32) -> Self {
        self.positional = true;
        self.position = Some(position);
        self
    }

    /// Marks the parameter as a positional that absorbs all remaining arguments.
    pub fn variadic(mut self) -> Self {
        self.positional = true;
        self.variadic = true;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_items(mut self, items: Parameter) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    pub fn with_property(mut self, property: Parameter) -> Self {
        self.properties
            .get_or_insert_with(IndexMap::new)
            .insert(property.name.clone(), property);
        self
    }

    pub fn is_flag(&self) -> bool {
        !self.positional
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn param_type_accepts_only_matching_primitives() {
        assert!(ParamType::String.accepts(&json!("x")));
        assert!(!ParamType::String.accepts(&json!(1)));
        assert!(ParamType::Number.accepts(&json!(1.5)));
        assert!(!ParamType::Number.accepts(&json!("1")));
        assert!(ParamType::Boolean.accepts(&json!(false)));
        assert!(!ParamType::Boolean.accepts(&json!(0)));
        assert!(ParamType::Array.accepts(&json!([1, "a"])));
        assert!(ParamType::Object.accepts(&json!({})));
        assert!(!ParamType::Object.accepts(&json!([])));
        assert!(!ParamType::Object.accepts(&Value::Null));
    }

    #[test]
    fn parameter_deserializes_from_yaml_with_defaults() {
        let yaml = r#"
name: limit
type: number
default: 10
min: 1
max: 100
"#;
        let param: Parameter = serde_yaml::from_str(yaml).expect("deserialize Parameter");
        assert_eq!(param.name, "limit");
        assert_eq!(param.r#type, ParamType::Number);
        assert_eq!(param.default, Some(json!(10)));
        assert_eq!(param.min, Some(1.0));
        assert_eq!(param.max, Some(100.0));
        assert!(!param.required);
        assert!(param.is_flag());
        assert!(param.aliases.is_empty());
    }

    #[test]
    fn builder_marks_variadic_as_positional() {
        let param = Parameter::array("files").variadic().with_items(Parameter::string(""));
        assert!(param.positional);
        assert!(param.variadic);
        assert_eq!(param.items.as_deref().map(|items| items.r#type), Some(ParamType::String));
    }
}
