use crate::error::CoreResult;
use crate::ipc::error::{core_err, err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be string or null", key), None)),
    }
}

pub fn optional_i64(req: &Request, key: &str) -> Result<Option<i64>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be integer or null", key), None)),
    }
}

pub fn optional_f64(req: &Request, key: &str) -> Result<Option<f64>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be number or null", key), None)),
    }
}

/// Deserializes `params[key]` into a typed payload; a missing key is read as
/// an empty object so all-optional payloads can be omitted.
pub fn payload<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, serde_json::Value> {
    let raw = match req.params.get(key) {
        None => json!({}),
        Some(v) if v.is_null() => json!({}),
        Some(v) => v.clone(),
    };
    serde_json::from_value(raw)
        .map_err(|e| err(&req.id, "bad_params", format!("invalid {}: {}", key, e), None))
}

/// Wraps a core result: `Some(key)` nests the value under that key, `None`
/// returns the value as the whole result object.
pub fn reply<T: Serialize>(req: &Request, key: Option<&str>, result: CoreResult<T>) -> serde_json::Value {
    let value = match result {
        Ok(v) => v,
        Err(e) => return core_err(&req.id, &e),
    };
    let value = match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "serialize_failed", e.to_string(), None),
    };
    match key {
        Some(k) => ok(&req.id, json!({ k: value })),
        None => ok(&req.id, value),
    }
}
