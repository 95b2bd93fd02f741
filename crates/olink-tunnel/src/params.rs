//! Tunnel Request Payload
//!
//! The sealed body carries the real request as JSON:
//!
//! ```json
//! {"method":"POST","url":"/api/mobile/node/list","param":{"page":1,"type":"ios"}}
//! ```
//!
//! `param` is omitted when the request has no parameters.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Request parameters, keyed by name
pub type Params = BTreeMap<String, ParamValue>;

/// A request parameter value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Array(Vec<ParamValue>),
    Object(BTreeMap<String, ParamValue>),
}

impl From<serde_json::Value> for ParamValue {
    /// `null` becomes the empty string; unsigned values beyond `i64`
    /// fall back to floats.
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => ParamValue::String(String::new()),
            Value::Bool(b) => ParamValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ParamValue::Int(i),
                None => ParamValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => ParamValue::String(s),
            Value::Array(items) => ParamValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                ParamValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Into::into)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<i32> for ParamValue {
    fn from(i: i32) -> Self {
        ParamValue::Int(i64::from(i))
    }
}

impl From<u32> for ParamValue {
    fn from(i: u32) -> Self {
        ParamValue::Int(i64::from(i))
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Float(f)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        ParamValue::Array(items.into_iter().map(Into::into).collect())
    }
}

/// The request carried inside the tunnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunnelPayload {
    /// Upper-case HTTP method of the logical request
    pub method: String,
    /// API path of the logical request
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<Params>,
}

impl TunnelPayload {
    /// Build a payload; an empty parameter map is dropped
    pub fn new(method: &str, url: &str, params: Option<Params>) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            param: params.filter(|p| !p.is_empty()),
        }
    }

    /// Canonical JSON encoding
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
