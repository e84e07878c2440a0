use crate::grade::{classify_grade_level, GradeLevel};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

// A missing or null label is classified like an empty one.
fn handle_classify(req: &Request) -> Value {
    let label = match req.params.get("label") {
        None | Some(Value::Null) => "",
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return err(&req.id, "bad_params", "label must be a string", None),
    };
    ok(
        &req.id,
        json!({
            "label": label,
            "gradeLevel": classify_grade_level(label),
        }),
    )
}

fn handle_classify_many(req: &Request) -> Value {
    let Some(labels) = req.params.get("labels").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "labels must be an array", None);
    };
    let results: Vec<Value> = labels
        .iter()
        .map(|v| {
            let label = v.as_str().unwrap_or("");
            json!({
                "label": label,
                "gradeLevel": classify_grade_level(label),
            })
        })
        .collect();
    ok(&req.id, json!({ "results": results }))
}

fn handle_levels(req: &Request) -> Value {
    let levels: Vec<&str> = GradeLevel::ALL.iter().map(|g| g.label()).collect();
    ok(&req.id, json!({ "levels": levels }))
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "grade.classify" => Some(handle_classify(req)),
        "grade.classifyMany" => Some(handle_classify_many(req)),
        "grade.levels" => Some(handle_levels(req)),
        _ => None,
    }
}
