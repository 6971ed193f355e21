//! Conversion of raw JSON arguments into typed values.
//!
//! Arguments are checked against the tool's [`ParameterMap`] before the tool
//! runs. The first offending parameter (in name order) is reported.

use crate::error::ToolError;
use crate::schema::{ParameterMap, ParameterType, ToolParameter};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Array(Vec<Value>),
    Object(Map<String, Value>),
}

/// Validated arguments for one tool call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    values: BTreeMap<String, ParamValue>,
}

impl ToolArgs {
    pub fn validate(parameters: &ParameterMap, input: &Value) -> Result<Self, ToolError> {
        let empty = Map::new();
        let object = match input {
            Value::Object(object) => object,
            Value::Null => &empty,
            other => {
                return Err(ToolError::Validation(format!(
                    "Arguments must be a JSON object, got {}",
                    json_kind(other)
                )))
            }
        };

        let mut values = BTreeMap::new();
        for (name, parameter) in parameters {
            match object.get(name) {
                None | Some(Value::Null) if parameter.required => {
                    return Err(ToolError::Validation(format!(
                        "Missing required parameter '{}'",
                        name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(raw) => {
                    let value = convert(name, parameter, raw)?;
                    values.insert(name.clone(), value);
                }
            }
        }

        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        self.opt_str(name).ok_or_else(|| missing(name))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, ToolError> {
        self.opt_int(name).ok_or_else(|| missing(name))
    }

    pub fn opt_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ParamValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, ToolError> {
        self.opt_bool(name).ok_or_else(|| missing(name))
    }

    pub fn opt_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ParamValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn array(&self, name: &str) -> Result<&[Value], ToolError> {
        match self.values.get(name) {
            Some(ParamValue::Array(items)) => Ok(items.as_slice()),
            _ => Err(missing(name)),
        }
    }

    pub fn object(&self, name: &str) -> Result<&Map<String, Value>, ToolError> {
        match self.values.get(name) {
            Some(ParamValue::Object(map)) => Ok(map),
            _ => Err(missing(name)),
        }
    }

    /// Optional non-negative integer, rejected when negative.
    pub fn opt_usize(&self, name: &str) -> Result<Option<usize>, ToolError> {
        match self.opt_int(name) {
            None => Ok(None),
            Some(n) => usize::try_from(n).map(Some).map_err(|_| {
                ToolError::Validation(format!("Parameter '{}' must not be negative", name))
            }),
        }
    }
}

fn convert(name: &str, parameter: &ToolParameter, raw: &Value) -> Result<ParamValue, ToolError> {
    let value = match (parameter.kind, raw) {
        (ParameterType::String, Value::String(s)) => ParamValue::String(s.clone()),
        (ParameterType::Integer, Value::Number(n)) if n.is_i64() => {
            ParamValue::Integer(n.as_i64().unwrap_or_default())
        }
        (ParameterType::Boolean, Value::Bool(b)) => ParamValue::Boolean(*b),
        (ParameterType::Array, Value::Array(items)) => ParamValue::Array(items.clone()),
        (ParameterType::Object, Value::Object(map)) => ParamValue::Object(map.clone()),
        (expected, other) => {
            return Err(ToolError::Validation(format!(
                "Parameter '{}' must be of type {}, got {}",
                name,
                expected.as_str(),
                json_kind(other)
            )))
        }
    };

    if let (Some(allowed), ParamValue::String(s)) = (&parameter.enum_values, &value) {
        if !allowed.iter().any(|a| a == s) {
            return Err(ToolError::Validation(format!(
                "Parameter '{}' must be one of: {} (got '{}')",
                name,
                allowed.join(", "),
                s
            )));
        }
    }

    Ok(value)
}

fn missing(name: &str) -> ToolError {
    ToolError::Validation(format!("Missing parameter '{}'", name))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
