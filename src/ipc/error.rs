use crate::error::CoreError;
use serde_json::json;
use tracing::{debug, error};

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Maps a core failure onto the wire envelope. Problem lists and publish
/// validation results travel in `details`.
pub fn core_err(id: &str, e: &CoreError) -> serde_json::Value {
    let details = match e {
        CoreError::BadRequest { problems, .. } if !problems.is_empty() => {
            Some(json!({ "problems": problems }))
        }
        CoreError::ValidationFailure(validation) => Some(json!({ "validation": validation })),
        _ => None,
    };
    match e {
        CoreError::Store(inner) => error!(error = %inner, "store failure"),
        other => debug!(code = other.code(), message = %other, "request rejected"),
    }
    err(id, e.code(), e.to_string(), details)
}
