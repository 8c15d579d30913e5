//! Wire envelopes for the stream protocol
//!
//! Each direction carries newline-terminated JSON objects. A frame with an
//! `id` is a request or a reply; a frame without one is a notification.
//! Integral floating-point ids are normalised to integers on parse.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ScopeError};

/// Error codes used on the stream wire
pub mod error_codes {
    /// Unparseable JSON
    pub const PARSE_ERROR: i64 = -32700;
    /// Parseable JSON that is not a valid request envelope
    pub const INVALID_REQUEST: i64 = -32600;
    /// No handler registered for the method
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Missing or ill-typed parameter
    pub const INVALID_PARAMS: i64 = -32602;
    /// Any other server-side failure
    pub const SERVER_ERROR: i64 = -32000;
}

/// Request envelope sent by an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }
}

/// Error body of a reply envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyError {
    pub code: i64,
    pub message: String,
}

/// Reply envelope written by the editor server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyError>,
}

impl Reply {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(ReplyError {
                code,
                message: message.into(),
            }),
        }
    }

    /// True when the result carries the deferred-completion marker
    pub fn is_pending(&self) -> bool {
        self.result
            .as_ref()
            .and_then(|r| r.get("pending"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Id-less frame pushed by the editor server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

/// Kind of a captured output record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Print,
    Warning,
    Error,
    Stack,
}

/// Payload of an `output` notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    #[serde(rename = "type")]
    pub kind: OutputKind,
    pub message: String,
    pub timestamp: f64,
}

impl OutputRecord {
    pub const METHOD: &'static str = "output";
}

/// A classified incoming frame on the adapter side
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Reply(Reply),
    Notification(Notification),
}

/// Normalise a JSON id value to an integer.
///
/// Accepts non-negative integers and floats with no fractional part; anything
/// else is treated as absent.
pub fn normalize_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => {
            if let Some(id) = n.as_u64() {
                Some(id)
            } else {
                match n.as_f64() {
                    Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                        Some(f as u64)
                    }
                    _ => None,
                }
            }
        }
        _ => None,
    }
}

/// Classify one incoming line as a reply or a notification
pub fn parse_frame(line: &str) -> Result<Frame> {
    let value: Value = serde_json::from_str(line)?;
    if !value.is_object() {
        return Err(ScopeError::Protocol("frame is not a JSON object".into()));
    }

    match value.get("id").and_then(normalize_id) {
        Some(id) => {
            let result = value.get("result").cloned();
            let error = match value.get("error") {
                Some(e) => Some(serde_json::from_value::<ReplyError>(e.clone())?),
                None => None,
            };
            Ok(Frame::Reply(Reply { id, result, error }))
        }
        None => {
            let method = value
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let params = value.get("params").cloned().unwrap_or(Value::Null);
            Ok(Frame::Notification(Notification { method, params }))
        }
    }
}
