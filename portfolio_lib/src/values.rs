use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::SynthError;

/// A string property that may be either a literal or a CloudFormation
/// intrinsic such as `{ "Ref": "..." }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrVal {
    String(String),
    Val(Value),
}

impl Default for StrVal {
    fn default() -> Self {
        StrVal::String(String::new())
    }
}

impl StrVal {
    /// the literal value, if this is not an intrinsic.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            StrVal::String(s) => Some(s),
            StrVal::Val(Value::String(s)) => Some(s),
            StrVal::Val(_) => None,
        }
    }
}

impl From<&str> for StrVal {
    fn from(value: &str) -> Self {
        StrVal::String(value.to_string())
    }
}

impl From<String> for StrVal {
    fn from(value: String) -> Self {
        StrVal::String(value)
    }
}

impl From<Value> for StrVal {
    fn from(value: Value) -> Self {
        StrVal::Val(value)
    }
}

fn single_key(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// `{ "Ref": logical_id }`
pub fn get_ref(logical_id: &str) -> Value {
    single_key("Ref", Value::String(logical_id.to_string()))
}

/// `{ "Fn::GetAtt": [logical_id, attribute] }`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    single_key(
        "Fn::GetAtt",
        Value::Array(vec![
            Value::String(logical_id.to_string()),
            Value::String(attribute.to_string()),
        ]),
    )
}

/// `{ "Fn::Sub": template }`. Use `${LogicalId}` or `${AWS::AccountId}` inside.
pub fn sub(template: &str) -> Value {
    single_key("Fn::Sub", Value::String(template.to_string()))
}

/// `site_bucket` -> `SiteBucket`. Non alphanumeric characters act as word
/// separators and are dropped.
pub fn pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = true;
    for c in s.chars() {
        if !c.is_ascii_alphanumeric() {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

pub fn verify_logical_id(resource_name: &str) -> Result<(), SynthError> {
    let reason = if resource_name.len() > 255 {
        "must be less than 255 characters"
    } else if resource_name.is_empty() {
        "Must contain at least 1 character"
    } else if !resource_name.chars().all(|c| c.is_ascii_alphanumeric()) {
        "Must contain only alphanumeric characters [A-Za-z0-9]"
    } else {
        return Ok(());
    };
    Err(SynthError::InvalidLogicalId {
        name: resource_name.to_string(),
        reason: reason.to_string(),
    })
}
