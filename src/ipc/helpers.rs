use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Host ids arrive as JSON numbers, or as digit strings from some callers.
pub fn required_id(req: &Request, key: &str) -> Result<i64, Value> {
    let v = req.params.get(key);
    let parsed = match v {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match (v, parsed) {
        (None, _) | (Some(Value::Null), _) => {
            Err(err(&req.id, "bad_params", format!("missing {}", key), None))
        }
        (Some(raw), None) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must be an integer id", key),
            Some(json!({ "field": key, "value": raw })),
        )),
        (_, Some(id)) => Ok(id),
    }
}

pub fn optional_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
