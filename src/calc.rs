use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::model::{ComponentContribution, ScoreRecord, Subject, SubjectAverage};
use crate::normalize::UNASSIGNED_SUBJECT;

/// 1-decimal display rounding: `floor(10x + 0.5) / 10`. Applied only in the
/// dashboard view models; the core keeps full precision.
pub fn round1(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Structured, serializable engine error. `bad_params` marks a caller bug
/// (inconsistent parameters), never a data-quality problem — malformed
/// records are reported and skipped upstream, not surfaced here.
#[derive(Debug, Clone, Serialize)]
pub struct EngineError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl EngineError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Policy for combining subject averages into one overall figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallPolicy {
    /// Unweighted mean of subject averages (observed portal behavior).
    EqualSubjects,
    /// Mean weighted by each subject's credit hours; subjects without
    /// metadata weigh 1.0.
    CreditWeighted,
}

impl OverallPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "equalSubjects" => Some(Self::EqualSubjects),
            "creditWeighted" => Some(Self::CreditWeighted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EqualSubjects => "equalSubjects",
            Self::CreditWeighted => "creditWeighted",
        }
    }
}

/// Weighted average over one (student, subject) pair on the canonical percent
/// scale. Absent records are excluded from numerator and denominator; a
/// student absent for everything gets `average = 0` and an empty breakdown,
/// not a zero grade.
pub fn subject_average(
    student_id: &str,
    subject_id: &str,
    records: &[ScoreRecord],
) -> Result<SubjectAverage, EngineError> {
    if !records.is_empty() {
        if student_id.trim().is_empty() {
            return Err(EngineError::new(
                "bad_params",
                "empty studentId with a non-empty score list",
            ));
        }
        if subject_id.trim().is_empty() {
            return Err(EngineError::new(
                "bad_params",
                "empty subjectId with a non-empty score list",
            ));
        }
    }
    for r in records {
        if r.student_id != student_id {
            return Err(EngineError::new(
                "bad_params",
                "score list contains a record for another student",
            )
            .with_details(json!({ "studentId": r.student_id })));
        }
        if r.subject_id != subject_id {
            return Err(EngineError::new(
                "bad_params",
                "score list contains a record for another subject",
            )
            .with_details(json!({ "subjectId": r.subject_id })));
        }
    }

    let mut weighted_sum = 0.0_f64;
    let mut total_weight = 0.0_f64;
    let mut breakdown: Vec<ComponentContribution> = Vec::new();

    for r in records {
        if r.is_absent {
            continue;
        }
        // Normalized records satisfy max_score > 0, but directly constructed
        // ones may not; treat such rows as malformed and skip them.
        if r.max_score <= 0.0 {
            warn!(
                grade_component_id = %r.grade_component_id,
                "excluded score with non-positive maxScore from average"
            );
            continue;
        }

        let percent = 100.0 * r.score / r.max_score;
        weighted_sum += percent * r.weight;
        total_weight += r.weight;
        breakdown.push(ComponentContribution {
            grade_component_id: r.grade_component_id.clone(),
            component_name: r.component_name.clone(),
            kind: r.kind,
            weight: r.weight,
            percent,
            weighted_percent: percent * r.weight,
        });
    }

    let average = if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    };

    Ok(SubjectAverage {
        subject_id: subject_id.to_string(),
        student_id: student_id.to_string(),
        average,
        component_breakdown: breakdown,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_id: String,
    pub subjects: Vec<SubjectAverage>,
    pub overall_average: f64,
    /// Subjects with at least one contributing component. Zero means the
    /// student has no computable average at all.
    pub graded_subject_count: usize,
}

impl StudentSummary {
    pub fn has_marks(&self) -> bool {
        self.graded_subject_count > 0
    }
}

/// Partitions one student's records by subject, computes per-subject
/// averages, and combines them under the given policy. Subjects whose every
/// record was excluded (all absent) do not pull the overall figure down.
pub fn student_summary(
    student_id: &str,
    records: &[ScoreRecord],
    subjects: &[Subject],
    policy: OverallPolicy,
) -> Result<StudentSummary, EngineError> {
    if student_id.trim().is_empty() && !records.is_empty() {
        return Err(EngineError::new(
            "bad_params",
            "empty studentId with a non-empty score list",
        ));
    }
    for r in records {
        if r.student_id != student_id {
            return Err(EngineError::new(
                "bad_params",
                "score list contains a record for another student",
            )
            .with_details(json!({ "studentId": r.student_id })));
        }
    }

    // BTreeMap keeps subject output order deterministic.
    let mut by_subject: BTreeMap<String, Vec<ScoreRecord>> = BTreeMap::new();
    for r in records {
        let key = if r.subject_id.trim().is_empty() {
            UNASSIGNED_SUBJECT.to_string()
        } else {
            r.subject_id.clone()
        };
        let mut record = r.clone();
        record.subject_id = key.clone();
        by_subject.entry(key).or_default().push(record);
    }

    let mut per_subject: Vec<SubjectAverage> = Vec::new();
    for (subject_id, group) in &by_subject {
        per_subject.push(subject_average(student_id, subject_id, group)?);
    }

    let mut sum = 0.0_f64;
    let mut denom = 0.0_f64;
    let mut graded = 0_usize;
    for avg in &per_subject {
        if avg.component_breakdown.is_empty() {
            continue;
        }
        graded += 1;
        let weight = match policy {
            OverallPolicy::EqualSubjects => 1.0,
            OverallPolicy::CreditWeighted => subjects
                .iter()
                .find(|s| s.id == avg.subject_id)
                .map(|s| s.credit_hours)
                .unwrap_or(1.0),
        };
        sum += avg.average * weight;
        denom += weight;
    }
    let overall_average = if denom > 0.0 { sum / denom } else { 0.0 };

    Ok(StudentSummary {
        student_id: student_id.to_string(),
        subjects: per_subject,
        overall_average,
        graded_subject_count: graded,
    })
}
