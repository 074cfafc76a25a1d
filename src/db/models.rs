use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column value that does not map onto one of our enums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $value:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Code,
    GithubLink,
}

string_enum!(SubmissionKind, "submission kind", {
    Code => "code",
    GithubLink => "github_link",
});

/// Lifecycle of a submission. The review pipeline only ever moves
/// `Pending` to `AiReviewed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    AiReviewed,
    TeacherReviewed,
    Resubmitted,
    Accepted,
}

string_enum!(SubmissionStatus, "submission status", {
    Pending => "pending",
    AiReviewed => "ai_reviewed",
    TeacherReviewed => "teacher_reviewed",
    Resubmitted => "resubmitted",
    Accepted => "accepted",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
    NeedsImprovement,
}

string_enum!(Verdict, "verdict", {
    Passed => "passed",
    Failed => "failed",
    NeedsImprovement => "needs_improvement",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    CriticalError,
    LogicError,
    StyleIssue,
    Performance,
    SecurityRisk,
    Improvement,
}

string_enum!(FeedbackCategory, "feedback category", {
    CriticalError => "critical_error",
    LogicError => "logic_error",
    StyleIssue => "style_issue",
    Performance => "performance",
    SecurityRisk => "security_risk",
    Improvement => "improvement",
});

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: i32,
    pub student_id: i32,
    pub task_id: i32,
    pub kind: SubmissionKind,
    pub code: Option<String>,
    pub github_url: Option<String>,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: i32,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub id: i32,
    pub task_id: i32,
    pub name: String,
    pub description: String,
    pub is_mandatory: bool,
    pub weight: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub id: i32,
    pub submission_id: i32,
    pub ai_model: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub execution_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub submission_id: i32,
    pub ai_model: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub execution_time_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub id: i32,
    pub review_id: i32,
    pub category: FeedbackCategory,
    pub file_path: Option<String>,
    pub line_start: i32,
    pub line_end: Option<i32>,
    pub code_snippet: String,
    pub suggested_fix: Option<String>,
    pub description: String,
    pub severity: i16,
    pub is_resolved: bool,
    pub teacher_comment: Option<String>,
    pub teacher_approved: Option<bool>,
    pub created_at: DateTime<Utc>,
}

/// Feedback as written by the pipeline; teacher fields stay empty.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeedback {
    pub review_id: i32,
    pub category: FeedbackCategory,
    pub file_path: Option<String>,
    pub line_start: i32,
    pub line_end: Option<i32>,
    pub code_snippet: String,
    pub suggested_fix: Option<String>,
    pub description: String,
    pub severity: i16,
}
