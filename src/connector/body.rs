//! Body encoding for outbound requests.

use reqwest::Method;
use serde_json::{Map, Value};

use crate::connector::request::{HeaderValue, Headers};

/// Encoded request body handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

impl OutboundBody {
    /// Pick the body encoding for a request.
    ///
    /// `content-type: application/json` (exact match) selects a JSON body,
    /// anything else form parameters. GET and HEAD never carry a body.
    pub fn select(method: &Method, headers: &Headers, data: &Map<String, Value>) -> Self {
        if *method == Method::GET || *method == Method::HEAD || data.is_empty() {
            return OutboundBody::Empty;
        }

        let is_json = matches!(
            headers.get("content-type"),
            Some(HeaderValue::Single(value)) if value == "application/json"
        );

        if is_json {
            OutboundBody::Json(Value::Object(data.clone()))
        } else {
            OutboundBody::Form(encode_form(data))
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, OutboundBody::Empty)
    }
}

/// Flatten a payload into form pairs.
///
/// Nested objects and arrays use bracket keys (`user[name]`, `tags[0]`),
/// booleans become `1`/`0` and nulls are skipped.
pub fn encode_form(data: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in data {
        flatten(key.clone(), value, &mut pairs);
    }
    pairs
}

fn flatten(key: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(flag) => pairs.push((key, if *flag { "1" } else { "0" }.to_string())),
        Value::Number(number) => pairs.push((key, number.to_string())),
        Value::String(text) => pairs.push((key, text.clone())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten(format!("{key}[{index}]"), item, pairs);
            }
        }
        Value::Object(map) => {
            for (child, item) in map {
                flatten(format!("{key}[{child}]"), item, pairs);
            }
        }
    }
}
