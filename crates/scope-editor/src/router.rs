//! Request envelope parsing
//!
//! Turns one wire line into a routed request, or into a ready-to-send error
//! reply. Params are re-serialised to a bare JSON string so that dispatch
//! stays independent of every method's parameter schema; each handler
//! parses exactly what it needs.

use serde_json::Value;

use scope_core::envelope::{error_codes, normalize_id, Reply};

/// A parsed request ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedRequest {
    pub id: u64,
    pub method: String,
    /// Method params as a JSON object string, `{}` when absent
    pub params: String,
}

/// Parse one line into a request, or produce the error reply for it
pub fn parse_request(line: &str) -> Result<RoutedRequest, Reply> {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(_) => return Err(Reply::failure(0, error_codes::PARSE_ERROR, "Parse error")),
    };

    let id = value.get("id").and_then(normalize_id).unwrap_or(0);

    if !value.is_object() {
        return Err(Reply::failure(
            id,
            error_codes::INVALID_REQUEST,
            "Invalid request: not an object",
        ));
    }

    let method = match value.get("method").and_then(Value::as_str) {
        Some(m) => m.to_string(),
        None => {
            return Err(Reply::failure(
                id,
                error_codes::INVALID_REQUEST,
                "Invalid request: missing method",
            ));
        }
    };

    let params = match value.get("params") {
        Some(p) if p.is_object() => p.to_string(),
        _ => "{}".to_string(),
    };

    Ok(RoutedRequest { id, method, params })
}
