use crate::calc::{self, OverallPolicy};
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::Subject;
use crate::normalize;
use serde_json::json;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn records_array<'a>(
    req: &'a Request,
    key: &str,
) -> Result<&'a Vec<serde_json::Value>, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be an array", key), None))
}

fn handle_scores_normalize(req: &Request) -> serde_json::Value {
    let raw = match records_array(req, "records") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let norm = normalize::normalize_scores(raw);
    ok(
        &req.id,
        json!({
            "records": norm.records,
            "skipped": norm.skipped,
            "warnings": norm.warnings
        }),
    )
}

fn handle_subject_average(req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let raw = match records_array(req, "records") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let norm = normalize::normalize_scores(raw);
    let avg = match calc::subject_average(&student_id, &subject_id, &norm.records) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    ok(
        &req.id,
        json!({
            "subjectAverage": avg,
            "report": { "skipped": norm.skipped, "warnings": norm.warnings }
        }),
    )
}

fn parse_policy(state: &AppState, req: &Request) -> Result<OverallPolicy, serde_json::Value> {
    match req.params.get("policy") {
        None => Ok(state.policies.overall_average_policy),
        Some(v) if v.is_null() => Ok(state.policies.overall_average_policy),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(err(&req.id, "bad_params", "policy must be a string", None));
            };
            OverallPolicy::parse(s).ok_or_else(|| {
                err(
                    &req.id,
                    "bad_params",
                    "policy must be one of: equalSubjects, creditWeighted",
                    None,
                )
            })
        }
    }
}

fn handle_student_summary(state: &AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let raw = match records_array(req, "records") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let policy = match parse_policy(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    // Subject metadata is optional; without it the credit-weighted policy
    // falls back to weight 1.0 per subject.
    let (subjects, subject_issues): (Vec<Subject>, Vec<normalize::RecordIssue>) =
        match req.params.get("subjects").and_then(|v| v.as_array()) {
            Some(raw_subjects) => {
                let norm = normalize::normalize_subjects(raw_subjects);
                (norm.records, norm.skipped)
            }
            None => (Vec::new(), Vec::new()),
        };

    let norm = normalize::normalize_scores(raw);
    let summary = match calc::student_summary(&student_id, &norm.records, &subjects, policy) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    ok(
        &req.id,
        json!({
            "summary": summary,
            "policy": policy.as_str(),
            "report": {
                "skipped": norm.skipped,
                "warnings": norm.warnings,
                "skippedSubjects": subject_issues
            }
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scores.normalize" => Some(handle_scores_normalize(req)),
        "calc.subjectAverage" => Some(handle_subject_average(req)),
        "calc.studentSummary" => Some(handle_student_summary(state, req)),
        _ => None,
    }
}
