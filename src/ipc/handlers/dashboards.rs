use crate::calc::{self, EngineError, StudentSummary};
use crate::dashboard;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{Announcement, Assessment, GroupedBehaviorNote, ScoreRecord, Student};
use crate::notes;
use crate::store::DataSet;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashSet;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn dataset<'a>(state: &'a AppState, req: &Request) -> Result<&'a DataSet, serde_json::Value> {
    state
        .data
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "load a data set first", None))
}

/// The composer never reads a clock; `now` defaults to the wall clock only
/// here, at the boundary.
fn parse_now(req: &Request) -> Result<DateTime<Utc>, serde_json::Value> {
    match req.params.get("now") {
        None => Ok(Utc::now()),
        Some(v) if v.is_null() => Ok(Utc::now()),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(err(&req.id, "bad_params", "now must be an RFC 3339 string", None));
            };
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| err(&req.id, "bad_params", format!("bad now timestamp: {}", e), None))
        }
    }
}

fn bool_param(req: &Request, key: &str) -> bool {
    req.params.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn find_student<'a>(
    data: &'a DataSet,
    req: &Request,
    student_id: &str,
) -> Result<&'a Student, serde_json::Value> {
    data.students.iter().find(|s| s.id == student_id).ok_or_else(|| {
        err(
            &req.id,
            "not_found",
            "student not found",
            Some(json!({ "studentId": student_id })),
        )
    })
}

fn student_scores(data: &DataSet, student_id: &str, subject_id: Option<&str>) -> Vec<ScoreRecord> {
    data.scores
        .iter()
        .filter(|r| r.student_id == student_id)
        .filter(|r| subject_id.map(|s| r.subject_id == s).unwrap_or(true))
        .cloned()
        .collect()
}

fn summary_for(
    state: &AppState,
    data: &DataSet,
    student_id: &str,
    subject_id: Option<&str>,
) -> Result<StudentSummary, EngineError> {
    let records = student_scores(data, student_id, subject_id);
    calc::student_summary(
        student_id,
        &records,
        &data.subjects,
        state.policies.overall_average_policy,
    )
}

fn group_for_student(data: &DataSet, student_id: &str) -> Option<GroupedBehaviorNote> {
    let mine: Vec<_> = data
        .behavior_notes
        .iter()
        .filter(|n| n.student_id == student_id)
        .cloned()
        .collect();
    notes::group_behavior_notes(&mine).into_iter().next()
}

fn assessments_for_class(data: &DataSet, class_id: &str) -> Vec<Assessment> {
    data.assessments
        .iter()
        .filter(|a| a.class_id == class_id)
        .cloned()
        .collect()
}

/// Global announcements plus the ones scoped to any of the given classes.
fn announcements_for_classes(data: &DataSet, class_ids: &HashSet<&str>) -> Vec<Announcement> {
    data.announcements
        .iter()
        .filter(|a| match a.class_id.as_deref() {
            None => true,
            Some(c) => class_ids.contains(c),
        })
        .cloned()
        .collect()
}

fn handle_dashboard_student(state: &AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let now = match parse_now(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let data = match dataset(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student = match find_student(data, req, &student_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let summary = match summary_for(state, data, &student_id, None) {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    let group = group_for_student(data, &student_id);
    let class_ids: HashSet<&str> = HashSet::from([student.class_id.as_str()]);
    let view = dashboard::student_dashboard(
        student,
        &summary,
        &data.subjects,
        group.as_ref(),
        &assessments_for_class(data, &student.class_id),
        &announcements_for_classes(data, &class_ids),
        now,
        &state.policies,
    );
    ok(&req.id, json!({ "dashboard": view }))
}

fn parse_child_ids(req: &Request) -> Result<Vec<String>, serde_json::Value> {
    let Some(raw) = req.params.get("childIds").and_then(|v| v.as_array()) else {
        return Err(err(&req.id, "bad_params", "missing childIds", None));
    };
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for v in raw {
        let Some(id) = v.as_str() else {
            return Err(err(
                &req.id,
                "bad_params",
                "childIds must contain only strings",
                None,
            ));
        };
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(err(
                &req.id,
                "bad_params",
                "childIds must not contain empty ids",
                None,
            ));
        }
        let owned = trimmed.to_string();
        if seen.insert(owned.clone()) {
            out.push(owned);
        }
    }
    if out.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            "childIds must contain at least one student id",
            None,
        ));
    }
    Ok(out)
}

fn handle_parent_overview(state: &AppState, req: &Request) -> serde_json::Value {
    let child_ids = match parse_child_ids(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let urgent_only = bool_param(req, "urgentOnly");
    let data = match dataset(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut children = Vec::with_capacity(child_ids.len());
    let mut class_ids: HashSet<&str> = HashSet::new();
    for child_id in &child_ids {
        let student = match find_student(data, req, child_id) {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        let summary = match summary_for(state, data, child_id, None) {
            Ok(v) => v,
            Err(e) => return engine_err(&req.id, e),
        };
        let group = group_for_student(data, child_id);
        children.push(dashboard::child_overview(
            student,
            &summary,
            group.as_ref(),
            &state.policies,
        ));
        class_ids.insert(student.class_id.as_str());
    }

    let announcements = dashboard::recent_announcements(
        &announcements_for_classes(data, &class_ids),
        urgent_only,
        state.policies.announcement_limit,
    );
    let view = dashboard::ParentOverview {
        children,
        recent_announcements: announcements,
    };
    ok(&req.id, json!({ "overview": view }))
}

fn handle_teacher_class(state: &AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject_id = req
        .params
        .get("subjectId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let now = match parse_now(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let data = match dataset(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let roster: Vec<&Student> = data
        .students
        .iter()
        .filter(|s| s.class_id == class_id)
        .collect();

    let mut students: Vec<(Student, StudentSummary)> = Vec::with_capacity(roster.len());
    for student in &roster {
        let summary = match summary_for(state, data, &student.id, subject_id.as_deref()) {
            Ok(v) => v,
            Err(e) => return engine_err(&req.id, e),
        };
        students.push(((*student).clone(), summary));
    }

    // Class behavior is scoped by roster membership, not the notes' own
    // class tag, which some endpoints omit.
    let roster_ids: HashSet<&str> = roster.iter().map(|s| s.id.as_str()).collect();
    let class_notes: Vec<_> = data
        .behavior_notes
        .iter()
        .filter(|n| roster_ids.contains(n.student_id.as_str()))
        .cloned()
        .collect();
    let behavior_groups = notes::group_behavior_notes(&class_notes);

    let class_ids: HashSet<&str> = HashSet::from([class_id.as_str()]);
    let view = dashboard::teacher_class_view(
        &class_id,
        &students,
        &data.subjects,
        behavior_groups,
        &assessments_for_class(data, &class_id),
        &announcements_for_classes(data, &class_ids),
        now,
        &state.policies,
    );
    ok(&req.id, json!({ "view": view }))
}

fn handle_roster_list(state: &AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let data = match dataset(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut rows: Vec<serde_json::Value> = data
        .students
        .iter()
        .filter(|s| s.class_id == class_id)
        .map(|s| {
            json!({
                "studentId": s.id,
                "displayName": s.display_name(),
                "active": s.active
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        let an = a.get("displayName").and_then(|v| v.as_str()).unwrap_or("");
        let bn = b.get("displayName").and_then(|v| v.as_str()).unwrap_or("");
        an.cmp(bn)
    });
    ok(&req.id, json!({ "students": rows }))
}

fn handle_announcements_recent(state: &AppState, req: &Request) -> serde_json::Value {
    let urgent_only = bool_param(req, "urgentOnly");
    let limit = match req.params.get("limit") {
        None => state.policies.announcement_limit,
        Some(v) if v.is_null() => state.policies.announcement_limit,
        Some(v) => match v.as_i64() {
            Some(n) if (1..=100).contains(&n) => n as usize,
            _ => return err(&req.id, "bad_params", "limit must be in 1..=100", None),
        },
    };
    let data = match dataset(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let announcements = dashboard::recent_announcements(&data.announcements, urgent_only, limit);
    ok(&req.id, json!({ "announcements": announcements }))
}

fn handle_assessments_upcoming(state: &AppState, req: &Request) -> serde_json::Value {
    let now = match parse_now(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let data = match dataset(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let class_filter = if let Some(student_id) = req.params.get("studentId").and_then(|v| v.as_str())
    {
        let student = match find_student(data, req, student_id) {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        Some(student.class_id.clone())
    } else {
        req.params
            .get("classId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    let pool: Vec<Assessment> = match class_filter.as_deref() {
        Some(class_id) => assessments_for_class(data, class_id),
        None => data.assessments.clone(),
    };
    let upcoming = dashboard::upcoming_assessments(&pool, now);
    ok(&req.id, json!({ "assessments": upcoming }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.student" => Some(handle_dashboard_student(state, req)),
        "dashboard.parentOverview" => Some(handle_parent_overview(state, req)),
        "dashboard.teacherClass" => Some(handle_teacher_class(state, req)),
        "roster.list" => Some(handle_roster_list(state, req)),
        "announcements.recent" => Some(handle_announcements_recent(state, req)),
        "assessments.upcoming" => Some(handle_assessments_upcoming(state, req)),
        _ => None,
    }
}
