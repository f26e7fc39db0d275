use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Five-level ordinal behavior rating. The ordering is by desirability and is
/// used for display only, never for sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorLevel {
    Excellent,
    Good,
    Fair,
    #[serde(rename = "Needs-improvement")]
    NeedsImprovement,
    Poor,
}

impl BehaviorLevel {
    /// Case- and separator-insensitive parse: "needs improvement",
    /// "Needs-Improvement" and "NEEDS_IMPROVEMENT" all canonicalize.
    /// Anything else is a malformed record, rejected at the boundary.
    pub fn parse(s: &str) -> Option<Self> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "excellent" => Some(Self::Excellent),
            "good" => Some(Self::Good),
            "fair" => Some(Self::Fair),
            "needsimprovement" => Some(Self::NeedsImprovement),
            "poor" => Some(Self::Poor),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::NeedsImprovement => "Needs-improvement",
            Self::Poor => "Poor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentKind {
    Quiz,
    Test,
    Midterm,
    Final,
    Project,
    Oral,
    Attendance,
    Other,
}

impl AssessmentKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiz" => Some(Self::Quiz),
            "test" => Some(Self::Test),
            "midterm" => Some(Self::Midterm),
            "final" => Some(Self::Final),
            "project" => Some(Self::Project),
            "oral" => Some(Self::Oral),
            "attendance" => Some(Self::Attendance),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Canonical score shape every endpoint payload is normalized into.
/// Invariants hold after normalization: `weight > 0`, `max_score > 0`,
/// `0 <= score <= max_score` when not absent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub student_id: String,
    pub subject_id: String,
    pub grade_component_id: String,
    pub component_name: String,
    pub kind: AssessmentKind,
    pub weight: f64,
    pub max_score: f64,
    pub score: f64,
    pub is_absent: bool,
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A teacher's conduct observation. Immutable once aggregated; newer notes
/// supersede older ones only for the "latest" computation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorNote {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub class_id: String,
    pub term_id: String,
    pub note: String,
    pub level: BehaviorLevel,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub body: String,
    pub is_urgent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    pub class_id: String,
    pub subject_id: String,
    pub title: String,
    pub kind: AssessmentKind,
    pub due_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub class_id: String,
    pub last_name: String,
    pub first_name: String,
    pub active: bool,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub credit_hours: f64,
}

/// One component's weighted contribution inside a subject average.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentContribution {
    pub grade_component_id: String,
    pub component_name: String,
    pub kind: AssessmentKind,
    pub weight: f64,
    pub percent: f64,
    pub weighted_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject_id: String,
    pub student_id: String,
    pub average: f64,
    pub component_breakdown: Vec<ComponentContribution>,
}

/// Per-level tally for a grouped student. The five counters always sum to the
/// group's note count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelCounts {
    pub excellent: usize,
    pub good: usize,
    pub fair: usize,
    pub needs_improvement: usize,
    pub poor: usize,
}

impl LevelCounts {
    pub fn bump(&mut self, level: BehaviorLevel) {
        match level {
            BehaviorLevel::Excellent => self.excellent += 1,
            BehaviorLevel::Good => self.good += 1,
            BehaviorLevel::Fair => self.fair += 1,
            BehaviorLevel::NeedsImprovement => self.needs_improvement += 1,
            BehaviorLevel::Poor => self.poor += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.excellent + self.good + self.fair + self.needs_improvement + self.poor
    }
}

/// Derived, ephemeral: recomputed on every grouping call, never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedBehaviorNote {
    pub student_id: String,
    pub student_name: String,
    pub notes: Vec<BehaviorNote>,
    pub latest: BehaviorNote,
    pub counts: LevelCounts,
    pub note_count: usize,
}
