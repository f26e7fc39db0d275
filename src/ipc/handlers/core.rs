use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "loaded": state.data.is_some()
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let bundle = match store::load_bundle(&path) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "fixture_load_failed", format!("{e:#}"), None),
    };
    let (data, report) = store::from_raw(&bundle);
    info!(path = %path.display(), "selected fixture bundle");
    state.workspace = Some(path.clone());
    state.data = Some(data);
    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "report": report
        }),
    )
}

fn handle_workspace_load_inline(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !req.params.is_object() {
        return err(&req.id, "bad_params", "params must carry the section arrays", None);
    }
    let (data, report) = store::from_raw(&req.params);
    state.workspace = None;
    state.data = Some(data);
    ok(&req.id, json!({ "report": report }))
}

fn handle_workspace_load_demo(state: &mut AppState, req: &Request) -> serde_json::Value {
    let data = store::demo_dataset();
    let counts = json!({
        "students": data.students.len(),
        "subjects": data.subjects.len(),
        "scores": data.scores.len(),
        "behaviorNotes": data.behavior_notes.len(),
        "assessments": data.assessments.len(),
        "announcements": data.announcements.len()
    });
    state.workspace = None;
    state.data = Some(data);
    ok(&req.id, json!({ "counts": counts }))
}

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, state.policies.to_json())
}

fn handle_config_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    if let Err(msg) = state.policies.apply_patch(patch) {
        return err(&req.id, "bad_params", msg, None);
    }
    ok(&req.id, state.policies.to_json())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "workspace.loadInline" => Some(handle_workspace_load_inline(state, req)),
        "workspace.loadDemo" => Some(handle_workspace_load_demo(state, req)),
        "config.get" => Some(handle_config_get(state, req)),
        "config.update" => Some(handle_config_update(state, req)),
        _ => None,
    }
}
