use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::model::{
    Announcement, Assessment, AssessmentKind, BehaviorLevel, BehaviorNote, ScoreRecord, Student,
    Subject,
};
use crate::normalize::{self, RecordIssue};

/// The injected data provider. The original portal faked its backend with
/// module-level mock arrays; here the rendering layer (or a test) explicitly
/// hands over whatever fixture it wants aggregated. Pure functions receive
/// borrowed slices from this set, never the set itself.
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    pub students: Vec<Student>,
    pub subjects: Vec<Subject>,
    pub scores: Vec<ScoreRecord>,
    pub behavior_notes: Vec<BehaviorNote>,
    pub assessments: Vec<Assessment>,
    pub announcements: Vec<Announcement>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionReport {
    pub loaded: usize,
    pub skipped: Vec<RecordIssue>,
    pub warnings: Vec<RecordIssue>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub students: SectionReport,
    pub subjects: SectionReport,
    pub scores: SectionReport,
    pub behavior_notes: SectionReport,
    pub assessments: SectionReport,
    pub announcements: SectionReport,
}

fn section_array<'a>(bundle: &'a Value, names: &[&str]) -> Vec<Value> {
    names
        .iter()
        .find_map(|n| bundle.get(*n))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

/// Builds a data set from a raw bundle: every section is an optional array of
/// API-shaped records, run through the normalizer. Missing sections load as
/// empty; malformed records are reported, never fatal.
pub fn from_raw(bundle: &Value) -> (DataSet, LoadReport) {
    let students = normalize::normalize_students(&section_array(bundle, &["students", "roster"]));
    let subjects = normalize::normalize_subjects(&section_array(bundle, &["subjects"]));
    let scores = normalize::normalize_scores(&section_array(bundle, &["scores", "grades"]));
    let behavior_notes =
        normalize::normalize_behavior_notes(&section_array(bundle, &["behaviorNotes", "behavior_notes", "notes"]));
    let assessments =
        normalize::normalize_assessments(&section_array(bundle, &["assessments", "upcomingAssessments"]));
    let announcements =
        normalize::normalize_announcements(&section_array(bundle, &["announcements"]));

    info!(
        students = students.records.len(),
        subjects = subjects.records.len(),
        scores = scores.records.len(),
        behavior_notes = behavior_notes.records.len(),
        assessments = assessments.records.len(),
        announcements = announcements.records.len(),
        "loaded data set"
    );

    let report = LoadReport {
        students: SectionReport {
            loaded: students.records.len(),
            skipped: students.skipped.clone(),
            warnings: students.warnings.clone(),
        },
        subjects: SectionReport {
            loaded: subjects.records.len(),
            skipped: subjects.skipped.clone(),
            warnings: subjects.warnings.clone(),
        },
        scores: SectionReport {
            loaded: scores.records.len(),
            skipped: scores.skipped.clone(),
            warnings: scores.warnings.clone(),
        },
        behavior_notes: SectionReport {
            loaded: behavior_notes.records.len(),
            skipped: behavior_notes.skipped.clone(),
            warnings: behavior_notes.warnings.clone(),
        },
        assessments: SectionReport {
            loaded: assessments.records.len(),
            skipped: assessments.skipped.clone(),
            warnings: assessments.warnings.clone(),
        },
        announcements: SectionReport {
            loaded: announcements.records.len(),
            skipped: announcements.skipped.clone(),
            warnings: announcements.warnings.clone(),
        },
    };

    let data = DataSet {
        students: students.records,
        subjects: subjects.records,
        scores: scores.records,
        behavior_notes: behavior_notes.records,
        assessments: assessments.records,
        announcements: announcements.records,
    };

    (data, report)
}

/// Reads and parses a fixture bundle file (one JSON object with the section
/// arrays).
pub fn load_bundle(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture bundle {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing fixture bundle {}", path.display()))?;
    Ok(value)
}

fn demo_ts(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, month, day, hour, 0, 0)
        .single()
        .expect("valid demo timestamp")
}

fn demo_student(id: &str, class_id: &str, last: &str, first: &str, active: bool) -> Student {
    Student {
        id: id.to_string(),
        class_id: class_id.to_string(),
        last_name: last.to_string(),
        first_name: first.to_string(),
        active,
    }
}

#[allow(clippy::too_many_arguments)]
fn demo_score(
    student: &str,
    subject: &str,
    component: &str,
    name: &str,
    kind: AssessmentKind,
    weight: f64,
    max: f64,
    score: f64,
    absent: bool,
) -> ScoreRecord {
    ScoreRecord {
        student_id: student.to_string(),
        subject_id: subject.to_string(),
        grade_component_id: component.to_string(),
        component_name: name.to_string(),
        kind,
        weight,
        max_score: max,
        score,
        is_absent: absent,
        comment: String::new(),
        created_at: Some(demo_ts(2, 10, 12)),
    }
}

fn demo_note(
    id: &str,
    student: &str,
    name: &str,
    level: BehaviorLevel,
    text: &str,
    month: u32,
    day: u32,
) -> BehaviorNote {
    BehaviorNote {
        id: id.to_string(),
        student_id: student.to_string(),
        student_name: name.to_string(),
        class_id: if student < "s6" { "c1" } else { "c2" }.to_string(),
        term_id: "2026-spring".to_string(),
        note: text.to_string(),
        level,
        created_by: "t1".to_string(),
        created_at: demo_ts(month, day, 9),
    }
}

/// Deterministic demo roster: the mock arrays the original portal kept as
/// module globals, now produced on request. Two classes, eight students,
/// scores, notes, announcements and assessments, all with fixed timestamps.
pub fn demo_dataset() -> DataSet {
    let students = vec![
        demo_student("s1", "c1", "Nguyen", "An", true),
        demo_student("s2", "c1", "Tran", "Binh", true),
        demo_student("s3", "c1", "Le", "Chi", true),
        demo_student("s4", "c1", "Pham", "Dung", true),
        demo_student("s5", "c1", "Hoang", "Em", false),
        demo_student("s6", "c2", "Vu", "Giang", true),
        demo_student("s7", "c2", "Dang", "Ha", true),
        demo_student("s8", "c2", "Bui", "Khanh", true),
    ];

    let subjects = vec![
        Subject {
            id: "math".to_string(),
            name: "Mathematics".to_string(),
            credit_hours: 4.0,
        },
        Subject {
            id: "eng".to_string(),
            name: "English".to_string(),
            credit_hours: 3.0,
        },
        Subject {
            id: "sci".to_string(),
            name: "Science".to_string(),
            credit_hours: 3.0,
        },
    ];

    let scores = vec![
        demo_score("s1", "math", "m-q1", "Quiz 1", AssessmentKind::Quiz, 1.0, 10.0, 8.0, false),
        demo_score("s1", "math", "m-t1", "Term test", AssessmentKind::Test, 2.0, 10.0, 6.0, false),
        demo_score("s1", "eng", "e-q1", "Reading quiz", AssessmentKind::Quiz, 1.0, 10.0, 9.0, false),
        demo_score("s1", "sci", "sc-p1", "Lab project", AssessmentKind::Project, 2.0, 20.0, 17.0, false),
        demo_score("s2", "math", "m-q1", "Quiz 1", AssessmentKind::Quiz, 1.0, 10.0, 4.0, false),
        demo_score("s2", "math", "m-t1", "Term test", AssessmentKind::Test, 2.0, 10.0, 3.5, false),
        demo_score("s2", "eng", "e-q1", "Reading quiz", AssessmentKind::Quiz, 1.0, 10.0, 5.0, false),
        demo_score("s2", "sci", "sc-p1", "Lab project", AssessmentKind::Project, 2.0, 20.0, 0.0, true),
        demo_score("s3", "math", "m-q1", "Quiz 1", AssessmentKind::Quiz, 1.0, 10.0, 10.0, false),
        demo_score("s3", "eng", "e-q1", "Reading quiz", AssessmentKind::Quiz, 1.0, 10.0, 8.5, false),
        demo_score("s4", "math", "m-q1", "Quiz 1", AssessmentKind::Quiz, 1.0, 10.0, 7.0, false),
        demo_score("s6", "math", "m2-q1", "Quiz 1", AssessmentKind::Quiz, 1.0, 10.0, 6.5, false),
        demo_score("s7", "math", "m2-q1", "Quiz 1", AssessmentKind::Quiz, 1.0, 10.0, 9.0, false),
    ];

    let behavior_notes = vec![
        demo_note("n1", "s1", "Nguyen, An", BehaviorLevel::Good, "Helped a classmate", 1, 1),
        demo_note("n2", "s1", "Nguyen, An", BehaviorLevel::Excellent, "Led group work", 1, 3),
        demo_note("n3", "s1", "Nguyen, An", BehaviorLevel::Poor, "Disrupted the lesson", 1, 5),
        demo_note("n4", "s2", "Tran, Binh", BehaviorLevel::NeedsImprovement, "Late twice", 1, 4),
        demo_note("n5", "s3", "Le, Chi", BehaviorLevel::Excellent, "Great presentation", 1, 8),
        demo_note("n6", "s6", "Vu, Giang", BehaviorLevel::Fair, "Quiet participation", 1, 6),
    ];

    let assessments = vec![
        Assessment {
            id: "as1".to_string(),
            class_id: "c1".to_string(),
            subject_id: "math".to_string(),
            title: "Midterm exam".to_string(),
            kind: AssessmentKind::Midterm,
            due_date: demo_ts(4, 15, 8),
            weight: Some(3.0),
            max_score: Some(100.0),
        },
        Assessment {
            id: "as2".to_string(),
            class_id: "c1".to_string(),
            subject_id: "eng".to_string(),
            title: "Essay draft".to_string(),
            kind: AssessmentKind::Project,
            due_date: demo_ts(4, 2, 17),
            weight: Some(1.0),
            max_score: Some(10.0),
        },
        Assessment {
            id: "as3".to_string(),
            class_id: "c2".to_string(),
            subject_id: "math".to_string(),
            title: "Fractions quiz".to_string(),
            kind: AssessmentKind::Quiz,
            due_date: demo_ts(4, 7, 9),
            weight: Some(1.0),
            max_score: Some(10.0),
        },
    ];

    let announcements = vec![
        Announcement {
            id: "a1".to_string(),
            title: "School closed Friday".to_string(),
            body: "Staff development day.".to_string(),
            is_urgent: true,
            class_id: None,
            created_at: demo_ts(3, 20, 7),
        },
        Announcement {
            id: "a2".to_string(),
            title: "Field trip forms due".to_string(),
            body: "Return signed forms by next week.".to_string(),
            is_urgent: false,
            class_id: Some("c1".to_string()),
            created_at: demo_ts(3, 18, 7),
        },
        Announcement {
            id: "a3".to_string(),
            title: "Science fair signup".to_string(),
            body: "Teams of two.".to_string(),
            is_urgent: false,
            class_id: Some("c2".to_string()),
            created_at: demo_ts(3, 22, 7),
        },
    ];

    DataSet {
        students,
        subjects,
        scores,
        behavior_notes,
        assessments,
        announcements,
    }
}
