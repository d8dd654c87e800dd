//! Response validation for every Horde network call.
//!
//! [`validate_response`] decides whether an HTTP status and its parsed JSON
//! body constitute success and, if not, formats the user-facing message
//! from the body's `message` and `errors` fields.

use serde_json::Value;

/// A response that did not match the expected status or had no usable body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ResponseFailure {
    /// HTTP status code that was received.
    pub status: u16,
    /// Fully formatted message, prefixed with the caller's context.
    pub message: String,
}

/// Validate a response against the expected status code(s).
///
/// Succeeds iff `status` is one of `expected` AND `body` is present and
/// truthy (not `null`, `false`, `0` or `""`). On failure the message is:
///
/// - `"{context}: Got response code {status}"` when the body has no `message`
/// - `"{context}: {message}"` when it has a `message` but no `errors`
/// - `"{context}: {message} (k1 - v1 | k2 - v2)"` otherwise
pub fn validate_response(
    status: u16,
    body: Option<&Value>,
    expected: &[u16],
    context: &str,
) -> Result<(), ResponseFailure> {
    let body_ok = body.is_some_and(is_truthy);
    if expected.contains(&status) && body_ok {
        return Ok(());
    }

    Err(ResponseFailure {
        status,
        message: failure_message(status, body, context),
    })
}

/// Build the failure message for a rejected response.
pub fn failure_message(status: u16, body: Option<&Value>, context: &str) -> String {
    let message = body.and_then(|b| b.get("message"));
    let Some(message) = message else {
        return format!("{context}: Got response code {status}");
    };
    let message = display_value(message);

    match body.and_then(|b| b.get("errors")) {
        None => format!("{context}: {message}"),
        Some(errors) => {
            let joined = join_errors(errors);
            format!("{context}: {message} ({joined})")
        }
    }
}

/// Format an `errors` object as `key - value` entries joined by ` | `.
fn join_errors(errors: &Value) -> String {
    match errors {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{key} - {}", display_value(value)))
            .collect::<Vec<_>>()
            .join(" | "),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(idx, value)| format!("{idx} - {}", display_value(value)))
            .collect::<Vec<_>>()
            .join(" | "),
        other => display_value(other),
    }
}

/// Strings render without quotes; everything else as compact JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JavaScript-style truthiness, which is what the Horde API contract assumes.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
