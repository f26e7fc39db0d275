use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::calc::{round1, StudentSummary};
use crate::config::Policies;
use crate::model::{
    Announcement, Assessment, BehaviorLevel, BehaviorNote, GroupedBehaviorNote, LevelCounts,
    Student, Subject, SubjectAverage,
};

/// Per-subject row in a dashboard, display-rounded to one decimal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverageRow {
    pub subject_id: String,
    pub subject_name: String,
    pub average: f64,
    pub component_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorSummary {
    pub counts: LevelCounts,
    pub note_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<BehaviorNote>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDashboard {
    pub student_id: String,
    pub display_name: String,
    pub subjects: Vec<SubjectAverageRow>,
    pub overall_average: f64,
    pub behavior: BehaviorSummary,
    pub upcoming_assessments: Vec<Assessment>,
    pub recent_announcements: Vec<Announcement>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildOverview {
    pub student_id: String,
    pub display_name: String,
    pub overall_average: f64,
    pub behavior: BehaviorSummary,
    pub alert: bool,
    pub alert_reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentOverview {
    pub children: Vec<ChildOverview>,
    pub recent_announcements: Vec<Announcement>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    pub student_id: String,
    pub display_name: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_average: Option<f64>,
    pub subjects: Vec<SubjectAverageRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherClassView {
    pub class_id: String,
    pub rows: Vec<RosterRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_average: Option<f64>,
    pub behavior_groups: Vec<GroupedBehaviorNote>,
    pub upcoming_assessments: Vec<Assessment>,
    pub recent_announcements: Vec<Announcement>,
}

/// Assessments strictly after `now`, ascending by due date. One due exactly
/// at `now` is no longer upcoming.
pub fn upcoming_assessments(assessments: &[Assessment], now: DateTime<Utc>) -> Vec<Assessment> {
    let mut out: Vec<Assessment> = assessments
        .iter()
        .filter(|a| a.due_date > now)
        .cloned()
        .collect();
    out.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
    out
}

/// Newest-first announcement slice, optionally urgent-only, capped at `limit`.
pub fn recent_announcements(
    announcements: &[Announcement],
    urgent_only: bool,
    limit: usize,
) -> Vec<Announcement> {
    let mut out: Vec<Announcement> = announcements
        .iter()
        .filter(|a| !urgent_only || a.is_urgent)
        .cloned()
        .collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    out.truncate(limit);
    out
}

pub fn behavior_summary(group: Option<&GroupedBehaviorNote>) -> BehaviorSummary {
    match group {
        Some(g) => BehaviorSummary {
            counts: g.counts,
            note_count: g.note_count,
            latest: Some(g.latest.clone()),
        },
        None => BehaviorSummary {
            counts: LevelCounts::default(),
            note_count: 0,
            latest: None,
        },
    }
}

fn subject_rows(subjects: &[SubjectAverage], metadata: &[Subject]) -> Vec<SubjectAverageRow> {
    subjects
        .iter()
        .map(|avg| SubjectAverageRow {
            subject_id: avg.subject_id.clone(),
            subject_name: metadata
                .iter()
                .find(|s| s.id == avg.subject_id)
                .map(|s| s.name.clone())
                .unwrap_or_default(),
            average: round1(avg.average),
            component_count: avg.component_breakdown.len(),
        })
        .collect()
}

/// Urgent-alert rule evaluated on the unrounded overall average. The average
/// prong only applies to children with at least one graded subject; no marks
/// at all is missing data, not a failing grade.
pub fn alert_reasons(summary: &StudentSummary, latest: Option<&BehaviorNote>, policies: &Policies) -> Vec<String> {
    let mut reasons = Vec::new();
    if policies.alert_poor_latest_note {
        if let Some(note) = latest {
            if note.level == BehaviorLevel::Poor {
                reasons.push("latest behavior note is Poor".to_string());
            }
        }
    }
    if summary.has_marks() && summary.overall_average < policies.alert_average_below {
        reasons.push(format!(
            "overall average {} below alert threshold {}",
            round1(summary.overall_average),
            policies.alert_average_below
        ));
    }
    reasons
}

pub fn student_dashboard(
    student: &Student,
    summary: &StudentSummary,
    subjects: &[Subject],
    group: Option<&GroupedBehaviorNote>,
    assessments: &[Assessment],
    announcements: &[Announcement],
    now: DateTime<Utc>,
    policies: &Policies,
) -> StudentDashboard {
    StudentDashboard {
        student_id: student.id.clone(),
        display_name: student.display_name(),
        subjects: subject_rows(&summary.subjects, subjects),
        overall_average: round1(summary.overall_average),
        behavior: behavior_summary(group),
        upcoming_assessments: upcoming_assessments(assessments, now),
        recent_announcements: recent_announcements(
            announcements,
            false,
            policies.announcement_limit,
        ),
    }
}

pub fn child_overview(
    student: &Student,
    summary: &StudentSummary,
    group: Option<&GroupedBehaviorNote>,
    policies: &Policies,
) -> ChildOverview {
    let behavior = behavior_summary(group);
    let reasons = alert_reasons(summary, behavior.latest.as_ref(), policies);
    ChildOverview {
        student_id: student.id.clone(),
        display_name: student.display_name(),
        overall_average: round1(summary.overall_average),
        behavior,
        alert: !reasons.is_empty(),
        alert_reasons: reasons,
    }
}

/// Class view for a teacher: one roster row per student (inactive students
/// keep their row but are excluded from the class average), class-level
/// behavior groups, and the shared upcoming/announcement lists.
pub fn teacher_class_view(
    class_id: &str,
    students: &[(Student, StudentSummary)],
    subjects: &[Subject],
    behavior_groups: Vec<GroupedBehaviorNote>,
    assessments: &[Assessment],
    announcements: &[Announcement],
    now: DateTime<Utc>,
    policies: &Policies,
) -> TeacherClassView {
    let mut rows: Vec<RosterRow> = Vec::with_capacity(students.len());
    let mut sum = 0.0_f64;
    let mut counted = 0_usize;

    for (student, summary) in students {
        let overall = summary.has_marks().then(|| round1(summary.overall_average));
        if student.active && summary.has_marks() {
            sum += summary.overall_average;
            counted += 1;
        }
        rows.push(RosterRow {
            student_id: student.id.clone(),
            display_name: student.display_name(),
            active: student.active,
            overall_average: overall,
            subjects: subject_rows(&summary.subjects, subjects),
        });
    }
    rows.sort_by(|a, b| a.display_name.cmp(&b.display_name).then_with(|| a.student_id.cmp(&b.student_id)));

    let class_average = (counted > 0).then(|| round1(sum / counted as f64));

    TeacherClassView {
        class_id: class_id.to_string(),
        rows,
        class_average,
        behavior_groups,
        upcoming_assessments: upcoming_assessments(assessments, now),
        recent_announcements: recent_announcements(
            announcements,
            false,
            policies.announcement_limit,
        ),
    }
}
