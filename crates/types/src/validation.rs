use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::CommandError;

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Name of the offending parameter.
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Arguments that passed validation, keyed only by declared parameter names.
///
/// Built only by the validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedArgs(IndexMap<String, Value>);

impl ValidatedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_map(values: IndexMap<String, Value>) -> Self {
        Self(values)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn array(&self, name: &str) -> Option<&Vec<Value>> {
        self.get(name).and_then(Value::as_array)
    }

    pub fn object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.get(name).and_then(Value::as_object)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.iter().map(|(key, value)| (key.clone(), value.clone())).collect())
    }
}

/// Outcome of validating raw input against a parameter list.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Valid(ValidatedArgs),
    Invalid(Vec<FieldError>),
}

impl ValidationResult {
    /// Builds a result from accumulated output and errors. Output is
    /// discarded whenever any error is present.
    pub fn from_parts(data: IndexMap<String, Value>, errors: Vec<FieldError>) -> Self {
        if errors.is_empty() {
            Self::Valid(ValidatedArgs::from_map(data))
        } else {
            Self::Invalid(errors)
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn errors(&self) -> &[FieldError] {
        match self {
            Self::Valid(_) => &[],
            Self::Invalid(errors) => errors,
        }
    }

    pub fn data(&self) -> Option<&ValidatedArgs> {
        match self {
            Self::Valid(args) => Some(args),
            Self::Invalid(_) => None,
        }
    }

    /// Converts into the uniform error type used by `execute`.
    pub fn into_result(self) -> Result<ValidatedArgs, CommandError> {
        match self {
            Self::Valid(args) => Ok(args),
            Self::Invalid(errors) => Err(CommandError::validation(errors)),
        }
    }
}
