use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::normalize;
use crate::notes;
use serde_json::json;

fn handle_behavior_grouped(req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("notes").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "notes must be an array", None);
    };

    let norm = normalize::normalize_behavior_notes(raw);
    let groups = notes::group_behavior_notes(&norm.records);
    ok(
        &req.id,
        json!({
            "groups": groups,
            "skipped": norm.skipped,
            "warnings": norm.warnings
        }),
    )
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "behavior.grouped" => Some(handle_behavior_grouped(req)),
        _ => None,
    }
}
