use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::model::{
    Announcement, Assessment, AssessmentKind, BehaviorLevel, BehaviorNote, ScoreRecord, Student,
    Subject,
};

/// Subject bucket for score records that arrive without a subject id.
pub const UNASSIGNED_SUBJECT: &str = "unassigned";

/// One rejected or repaired input record. `index` is the position in the raw
/// input array so the caller can line issues back up with its payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordIssue {
    pub index: usize,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Normalization result: accepted records plus the partial-failure report.
/// A malformed record lands in `skipped`; a tolerated data-quality repair
/// (defaulted weight, generated id) lands in `warnings`. One bad record never
/// aborts the batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub skipped: Vec<RecordIssue>,
    pub warnings: Vec<RecordIssue>,
}

impl<T> Default for Normalized<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl<T> Normalized<T> {
    fn skip(&mut self, what: &str, index: usize, code: &str, message: String, field: Option<&str>) {
        warn!(index, code, "skipped {} record: {}", what, message);
        self.skipped.push(RecordIssue {
            index,
            code: code.to_string(),
            message,
            field: field.map(|f| f.to_string()),
        });
    }

    fn repair(&mut self, what: &str, index: usize, code: &str, message: String, field: Option<&str>) {
        warn!(index, code, "repaired {} record: {}", what, message);
        self.warnings.push(RecordIssue {
            index,
            code: code.to_string(),
            message,
            field: field.map(|f| f.to_string()),
        });
    }
}

/// First matching field among the accepted spellings. Endpoints disagree on
/// casing, so every lookup carries its known aliases.
fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| obj.get(*n))
}

fn str_field(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    let v = field(obj, names)?;
    let s = v.as_str()?.trim();
    if s.is_empty() {
        return None;
    }
    Some(s.to_string())
}

fn f64_field(obj: &Map<String, Value>, names: &[&str]) -> Option<f64> {
    field(obj, names).and_then(|v| v.as_f64())
}

fn bool_field(obj: &Map<String, Value>, names: &[&str]) -> Option<bool> {
    field(obj, names).and_then(|v| v.as_bool())
}

/// RFC 3339 strings and epoch milliseconds are both tolerated on input.
/// `Ok(None)` means the field is absent; `Err` means present but unparseable.
fn timestamp_field(
    obj: &Map<String, Value>,
    names: &[&str],
) -> Result<Option<DateTime<Utc>>, String> {
    let Some(v) = field(obj, names) else {
        return Ok(None);
    };
    if let Some(s) = v.as_str() {
        return DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| format!("bad timestamp '{}': {}", s, e));
    }
    if let Some(ms) = v.as_i64() {
        return Utc
            .timestamp_millis_opt(ms)
            .single()
            .map(Some)
            .ok_or_else(|| format!("bad epoch-millis timestamp {}", ms));
    }
    Err("timestamp must be an RFC 3339 string or epoch milliseconds".to_string())
}

fn as_record_object<'a, T>(
    out: &mut Normalized<T>,
    what: &str,
    index: usize,
    raw: &'a Value,
) -> Option<&'a Map<String, Value>> {
    match raw.as_object() {
        Some(obj) => Some(obj),
        None => {
            out.skip(what, index, "not_an_object", "record is not a JSON object".into(), None);
            None
        }
    }
}

/// Score payloads vary across endpoints (`score` vs `score1`,
/// `gradeComponentId` vs `grade_component_id`). Output records satisfy the
/// canonical invariants; everything else is reported and dropped.
pub fn normalize_scores(raw: &[Value]) -> Normalized<ScoreRecord> {
    let mut out = Normalized::default();

    for (i, v) in raw.iter().enumerate() {
        let Some(obj) = as_record_object(&mut out, "score", i, v) else {
            continue;
        };

        let Some(student_id) = str_field(obj, &["studentId", "student_id"]) else {
            out.skip("score", i, "missing_student_id", "missing studentId".into(), Some("studentId"));
            continue;
        };
        let Some(grade_component_id) = str_field(
            obj,
            &["gradeComponentId", "grade_component_id", "componentId", "component_id"],
        ) else {
            out.skip(
                "score",
                i,
                "missing_grade_component_id",
                "missing gradeComponentId".into(),
                Some("gradeComponentId"),
            );
            continue;
        };

        let is_absent = bool_field(obj, &["isAbsent", "is_absent", "absent"]).unwrap_or(false);

        let Some(max_score) = f64_field(obj, &["maxScore", "max_score", "outOf", "out_of"]) else {
            out.skip("score", i, "missing_max_score", "missing or non-numeric maxScore".into(), Some("maxScore"));
            continue;
        };
        if max_score <= 0.0 {
            out.skip(
                "score",
                i,
                "bad_max_score",
                format!("maxScore must be > 0, got {}", max_score),
                Some("maxScore"),
            );
            continue;
        }

        let score_value = f64_field(obj, &["score", "score1", "rawScore", "raw_score"]);
        let score = match (score_value, is_absent) {
            (Some(s), _) => {
                if !(0.0..=max_score).contains(&s) {
                    out.skip(
                        "score",
                        i,
                        "score_out_of_range",
                        format!("score {} outside 0..={}", s, max_score),
                        Some("score"),
                    );
                    continue;
                }
                s
            }
            (None, true) => 0.0,
            (None, false) => {
                out.skip(
                    "score",
                    i,
                    "missing_score",
                    "missing or non-numeric score on a non-absent record".into(),
                    Some("score"),
                );
                continue;
            }
        };

        let weight = match field(obj, &["weight"]) {
            Some(v) => match v.as_f64() {
                Some(w) if w > 0.0 => w,
                Some(w) => {
                    out.skip(
                        "score",
                        i,
                        "bad_weight",
                        format!("weight must be > 0, got {}", w),
                        Some("weight"),
                    );
                    continue;
                }
                None => {
                    out.skip("score", i, "bad_weight", "weight must be a number".into(), Some("weight"));
                    continue;
                }
            },
            None => {
                // Fallback only; a defaulted weight is a data-quality issue,
                // never something to grade on silently.
                out.repair(
                    "score",
                    i,
                    "weight_defaulted",
                    "missing weight defaulted to 1.0".into(),
                    Some("weight"),
                );
                1.0
            }
        };

        let subject_id = match str_field(obj, &["subjectId", "subject_id"]) {
            Some(s) => s,
            None => {
                out.repair(
                    "score",
                    i,
                    "subject_unassigned",
                    format!("missing subjectId grouped under '{}'", UNASSIGNED_SUBJECT),
                    Some("subjectId"),
                );
                UNASSIGNED_SUBJECT.to_string()
            }
        };

        let kind = match str_field(obj, &["kind", "type"]) {
            Some(k) => match AssessmentKind::parse(&k) {
                Some(kind) => kind,
                None => {
                    out.repair(
                        "score",
                        i,
                        "kind_defaulted",
                        format!("unrecognized kind '{}' treated as other", k),
                        Some("kind"),
                    );
                    AssessmentKind::Other
                }
            },
            None => AssessmentKind::Other,
        };

        let created_at = match timestamp_field(obj, &["createdAt", "created_at", "date"]) {
            Ok(ts) => ts,
            Err(msg) => {
                out.repair("score", i, "bad_created_at", msg, Some("createdAt"));
                None
            }
        };

        out.records.push(ScoreRecord {
            student_id,
            subject_id,
            grade_component_id,
            component_name: str_field(obj, &["componentName", "component_name", "name", "title"])
                .unwrap_or_default(),
            kind,
            weight,
            max_score,
            score,
            is_absent,
            comment: str_field(obj, &["comment"]).unwrap_or_default(),
            created_at,
        });
    }

    out
}

/// Behavior notes must carry a student id, a recognizable level, and a
/// parseable timestamp; anything less desynchronizes tallies downstream, so
/// the record is rejected here rather than silently dropped from a bucket.
pub fn normalize_behavior_notes(raw: &[Value]) -> Normalized<BehaviorNote> {
    let mut out = Normalized::default();

    for (i, v) in raw.iter().enumerate() {
        let Some(obj) = as_record_object(&mut out, "behavior note", i, v) else {
            continue;
        };

        let Some(student_id) = str_field(obj, &["studentId", "student_id"]) else {
            out.skip("behavior note", i, "missing_student_id", "missing studentId".into(), Some("studentId"));
            continue;
        };

        let Some(level_raw) = str_field(obj, &["level", "behaviorLevel", "behavior_level"]) else {
            out.skip("behavior note", i, "missing_level", "missing level".into(), Some("level"));
            continue;
        };
        let Some(level) = BehaviorLevel::parse(&level_raw) else {
            out.skip(
                "behavior note",
                i,
                "bad_level",
                format!("unrecognized level '{}'", level_raw),
                Some("level"),
            );
            continue;
        };

        let created_at = match timestamp_field(obj, &["createdAt", "created_at", "date"]) {
            Ok(Some(ts)) => ts,
            Ok(None) => {
                out.skip("behavior note", i, "missing_created_at", "missing createdAt".into(), Some("createdAt"));
                continue;
            }
            Err(msg) => {
                out.skip("behavior note", i, "bad_created_at", msg, Some("createdAt"));
                continue;
            }
        };

        let id = match str_field(obj, &["id", "noteId", "note_id"]) {
            Some(id) => id,
            None => {
                let generated = Uuid::new_v4().to_string();
                out.repair(
                    "behavior note",
                    i,
                    "id_generated",
                    "missing id replaced with a generated one".into(),
                    Some("id"),
                );
                generated
            }
        };

        // Some endpoints nest the display name under `student.name`.
        let student_name = str_field(obj, &["studentName", "student_name"])
            .or_else(|| {
                obj.get("student")
                    .and_then(|s| s.get("name"))
                    .and_then(|n| n.as_str())
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
            })
            .unwrap_or_default();

        out.records.push(BehaviorNote {
            id,
            student_id,
            student_name,
            class_id: str_field(obj, &["classId", "class_id"]).unwrap_or_default(),
            term_id: str_field(obj, &["termId", "term_id"]).unwrap_or_default(),
            note: str_field(obj, &["note", "text", "body"]).unwrap_or_default(),
            level,
            created_by: str_field(obj, &["createdBy", "created_by", "teacherId", "teacher_id"])
                .unwrap_or_default(),
            created_at,
        });
    }

    out
}

pub fn normalize_announcements(raw: &[Value]) -> Normalized<Announcement> {
    let mut out = Normalized::default();

    for (i, v) in raw.iter().enumerate() {
        let Some(obj) = as_record_object(&mut out, "announcement", i, v) else {
            continue;
        };

        let created_at = match timestamp_field(obj, &["createdAt", "created_at", "date"]) {
            Ok(Some(ts)) => ts,
            Ok(None) => {
                out.skip("announcement", i, "missing_created_at", "missing createdAt".into(), Some("createdAt"));
                continue;
            }
            Err(msg) => {
                out.skip("announcement", i, "bad_created_at", msg, Some("createdAt"));
                continue;
            }
        };

        let id = match str_field(obj, &["id", "announcementId", "announcement_id"]) {
            Some(id) => id,
            None => {
                let generated = Uuid::new_v4().to_string();
                out.repair(
                    "announcement",
                    i,
                    "id_generated",
                    "missing id replaced with a generated one".into(),
                    Some("id"),
                );
                generated
            }
        };

        out.records.push(Announcement {
            id,
            title: str_field(obj, &["title"]).unwrap_or_default(),
            body: str_field(obj, &["body", "content", "text"]).unwrap_or_default(),
            is_urgent: bool_field(obj, &["isUrgent", "is_urgent", "urgent"]).unwrap_or(false),
            class_id: str_field(obj, &["classId", "class_id"]),
            created_at,
        });
    }

    out
}

pub fn normalize_assessments(raw: &[Value]) -> Normalized<Assessment> {
    let mut out = Normalized::default();

    for (i, v) in raw.iter().enumerate() {
        let Some(obj) = as_record_object(&mut out, "assessment", i, v) else {
            continue;
        };

        let due_date = match timestamp_field(obj, &["dueDate", "due_date", "date"]) {
            Ok(Some(ts)) => ts,
            Ok(None) => {
                out.skip("assessment", i, "missing_due_date", "missing dueDate".into(), Some("dueDate"));
                continue;
            }
            Err(msg) => {
                out.skip("assessment", i, "bad_due_date", msg, Some("dueDate"));
                continue;
            }
        };

        let id = match str_field(obj, &["id", "assessmentId", "assessment_id"]) {
            Some(id) => id,
            None => {
                let generated = Uuid::new_v4().to_string();
                out.repair(
                    "assessment",
                    i,
                    "id_generated",
                    "missing id replaced with a generated one".into(),
                    Some("id"),
                );
                generated
            }
        };

        let kind = match str_field(obj, &["kind", "type"]) {
            Some(k) => match AssessmentKind::parse(&k) {
                Some(kind) => kind,
                None => {
                    out.repair(
                        "assessment",
                        i,
                        "kind_defaulted",
                        format!("unrecognized kind '{}' treated as other", k),
                        Some("kind"),
                    );
                    AssessmentKind::Other
                }
            },
            None => AssessmentKind::Other,
        };

        out.records.push(Assessment {
            id,
            class_id: str_field(obj, &["classId", "class_id"]).unwrap_or_default(),
            subject_id: str_field(obj, &["subjectId", "subject_id"]).unwrap_or_default(),
            title: str_field(obj, &["title", "name"]).unwrap_or_default(),
            kind,
            due_date,
            weight: f64_field(obj, &["weight"]),
            max_score: f64_field(obj, &["maxScore", "max_score", "outOf", "out_of"]),
        });
    }

    out
}

pub fn normalize_students(raw: &[Value]) -> Normalized<Student> {
    let mut out = Normalized::default();

    for (i, v) in raw.iter().enumerate() {
        let Some(obj) = as_record_object(&mut out, "student", i, v) else {
            continue;
        };

        let Some(id) = str_field(obj, &["id", "studentId", "student_id"]) else {
            out.skip("student", i, "missing_student_id", "missing id".into(), Some("id"));
            continue;
        };

        out.records.push(Student {
            id,
            class_id: str_field(obj, &["classId", "class_id"]).unwrap_or_default(),
            last_name: str_field(obj, &["lastName", "last_name"]).unwrap_or_default(),
            first_name: str_field(obj, &["firstName", "first_name"]).unwrap_or_default(),
            active: bool_field(obj, &["active", "isActive", "is_active"]).unwrap_or(true),
        });
    }

    out
}

pub fn normalize_subjects(raw: &[Value]) -> Normalized<Subject> {
    let mut out = Normalized::default();

    for (i, v) in raw.iter().enumerate() {
        let Some(obj) = as_record_object(&mut out, "subject", i, v) else {
            continue;
        };

        let Some(id) = str_field(obj, &["id", "subjectId", "subject_id"]) else {
            out.skip("subject", i, "missing_subject_id", "missing id".into(), Some("id"));
            continue;
        };

        let credit_hours = match f64_field(obj, &["creditHours", "credit_hours", "credits"]) {
            Some(c) if c > 0.0 => c,
            Some(c) => {
                out.skip(
                    "subject",
                    i,
                    "bad_credit_hours",
                    format!("creditHours must be > 0, got {}", c),
                    Some("creditHours"),
                );
                continue;
            }
            None => 1.0,
        };

        out.records.push(Subject {
            id,
            name: str_field(obj, &["name", "title"]).unwrap_or_default(),
            credit_hours,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn one_malformed_score_does_not_abort_the_batch() {
        let raw = vec![
            json!({
                "studentId": "s1",
                "subjectId": "math",
                "gradeComponentId": "q1",
                "componentName": "Quiz 1",
                "kind": "quiz",
                "weight": 1.0,
                "maxScore": 10.0,
                "score": 8.0,
                "isAbsent": false
            }),
            json!({ "subjectId": "math", "gradeComponentId": "q2", "maxScore": 10.0, "score": 5.0 }),
            json!({
                "student_id": "s1",
                "subject_id": "math",
                "grade_component_id": "t1",
                "score1": 6.0,
                "max_score": 10.0,
                "weight": 2.0
            }),
        ];

        let norm = normalize_scores(&raw);
        assert_eq!(norm.records.len(), 2);
        assert_eq!(norm.skipped.len(), 1);
        assert_eq!(norm.skipped[0].index, 1);
        assert_eq!(norm.skipped[0].code, "missing_student_id");

        // Snake-case aliases land in the same canonical shape.
        let second = &norm.records[1];
        assert_eq!(second.grade_component_id, "t1");
        assert_eq!(second.score, 6.0);
        assert_eq!(second.weight, 2.0);
    }

    #[test]
    fn missing_weight_defaults_with_a_warning() {
        let raw = vec![json!({
            "studentId": "s1",
            "subjectId": "math",
            "gradeComponentId": "q1",
            "maxScore": 10.0,
            "score": 7.0
        })];
        let norm = normalize_scores(&raw);
        assert_eq!(norm.records.len(), 1);
        assert_eq!(norm.records[0].weight, 1.0);
        assert!(norm.warnings.iter().any(|w| w.code == "weight_defaulted"));
    }

    #[test]
    fn nonpositive_weight_and_max_score_are_rejected() {
        let raw = vec![
            json!({
                "studentId": "s1",
                "subjectId": "math",
                "gradeComponentId": "q1",
                "maxScore": 0.0,
                "score": 0.0
            }),
            json!({
                "studentId": "s1",
                "subjectId": "math",
                "gradeComponentId": "q2",
                "maxScore": 10.0,
                "score": 5.0,
                "weight": -1.0
            }),
        ];
        let norm = normalize_scores(&raw);
        assert!(norm.records.is_empty());
        let codes: Vec<&str> = norm.skipped.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["bad_max_score", "bad_weight"]);
    }

    #[test]
    fn absent_score_without_a_value_is_accepted() {
        let raw = vec![json!({
            "studentId": "s1",
            "subjectId": "math",
            "gradeComponentId": "q1",
            "maxScore": 10.0,
            "isAbsent": true,
            "weight": 1.0
        })];
        let norm = normalize_scores(&raw);
        assert_eq!(norm.records.len(), 1);
        assert!(norm.records[0].is_absent);
        assert!(norm.skipped.is_empty());
    }

    #[test]
    fn score_out_of_range_is_rejected() {
        let raw = vec![json!({
            "studentId": "s1",
            "subjectId": "math",
            "gradeComponentId": "q1",
            "maxScore": 10.0,
            "score": 11.0,
            "weight": 1.0
        })];
        let norm = normalize_scores(&raw);
        assert!(norm.records.is_empty());
        assert_eq!(norm.skipped[0].code, "score_out_of_range");
    }

    #[test]
    fn missing_subject_goes_to_the_unassigned_bucket() {
        let raw = vec![json!({
            "studentId": "s1",
            "gradeComponentId": "q1",
            "maxScore": 10.0,
            "score": 5.0,
            "weight": 1.0
        })];
        let norm = normalize_scores(&raw);
        assert_eq!(norm.records[0].subject_id, UNASSIGNED_SUBJECT);
        assert!(norm.warnings.iter().any(|w| w.code == "subject_unassigned"));
    }

    #[test]
    fn note_levels_canonicalize_or_reject() {
        let raw = vec![
            json!({
                "studentId": "s1",
                "level": "needs improvement",
                "createdAt": "2026-01-05T09:00:00Z",
                "id": "n1"
            }),
            json!({
                "studentId": "s1",
                "level": "Sideways",
                "createdAt": "2026-01-06T09:00:00Z",
                "id": "n2"
            }),
        ];
        let norm = normalize_behavior_notes(&raw);
        assert_eq!(norm.records.len(), 1);
        assert_eq!(norm.records[0].level, BehaviorLevel::NeedsImprovement);
        assert_eq!(norm.skipped.len(), 1);
        assert_eq!(norm.skipped[0].code, "bad_level");
    }

    #[test]
    fn note_without_id_gets_a_generated_one() {
        let raw = vec![json!({
            "studentId": "s1",
            "level": "Good",
            "createdAt": "2026-01-05T09:00:00Z"
        })];
        let norm = normalize_behavior_notes(&raw);
        assert_eq!(norm.records.len(), 1);
        assert!(!norm.records[0].id.is_empty());
        assert!(norm.warnings.iter().any(|w| w.code == "id_generated"));
    }

    #[test]
    fn epoch_millis_timestamps_are_tolerated() {
        let raw = vec![json!({
            "studentId": "s1",
            "level": "Fair",
            "id": "n1",
            "createdAt": 1_767_600_000_000_i64
        })];
        let norm = normalize_behavior_notes(&raw);
        assert_eq!(norm.records.len(), 1);
        assert_eq!(norm.records[0].created_at.timestamp_millis(), 1_767_600_000_000);
    }

    #[test]
    fn nested_student_name_is_picked_up() {
        let raw = vec![json!({
            "studentId": "s1",
            "student": { "name": "Nguyen, An" },
            "level": "Good",
            "id": "n1",
            "createdAt": "2026-01-05T09:00:00Z"
        })];
        let norm = normalize_behavior_notes(&raw);
        assert_eq!(norm.records[0].student_name, "Nguyen, An");
    }

    #[test]
    fn announcement_requires_created_at() {
        let raw = vec![
            json!({ "id": "a1", "title": "Open house" }),
            json!({ "id": "a2", "title": "Exam week", "isUrgent": true, "createdAt": "2026-02-01T08:00:00Z" }),
        ];
        let norm = normalize_announcements(&raw);
        assert_eq!(norm.records.len(), 1);
        assert!(norm.records[0].is_urgent);
        assert_eq!(norm.skipped[0].code, "missing_created_at");
    }

    #[test]
    fn assessment_requires_due_date() {
        let raw = vec![json!({ "id": "x1", "title": "Final", "kind": "final" })];
        let norm = normalize_assessments(&raw);
        assert!(norm.records.is_empty());
        assert_eq!(norm.skipped[0].code, "missing_due_date");
    }

    #[test]
    fn empty_input_is_valid_and_empty() {
        let norm = normalize_scores(&[]);
        assert!(norm.records.is_empty());
        assert!(norm.skipped.is_empty());
        assert!(norm.warnings.is_empty());
    }
}
