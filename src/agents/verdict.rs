use serde::Deserialize;

use super::{AiError, FeedbackDraft, ReviewVerdict};
use crate::db::{FeedbackCategory, Verdict};

#[derive(Debug, Deserialize)]
struct RawReview {
    overall_status: Verdict,
    confidence: f64,
    #[serde(default)]
    feedbacks: Vec<RawFeedback>,
}

#[derive(Debug, Deserialize)]
struct RawFeedback {
    #[serde(rename = "type")]
    category: FeedbackCategory,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    line_start: i32,
    #[serde(default)]
    line_end: Option<i32>,
    #[serde(default)]
    code_snippet: Option<String>,
    #[serde(default)]
    suggested_fix: Option<String>,
    description: String,
    severity: i16,
}

/// Models like to wrap JSON in a Markdown fence even when told not to.
fn strip_code_fence(content: &str) -> &str {
    let content = content.trim();
    let content = content
        .strip_prefix("```json")
        .or_else(|| content.strip_prefix("```"))
        .unwrap_or(content);
    content.strip_suffix("```").unwrap_or(content).trim()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parses and validates the reviewer's JSON answer.
///
/// `multi_file` requires every feedback item to name the file it refers to.
pub fn parse_review(content: &str, multi_file: bool) -> Result<ReviewVerdict, AiError> {
    let raw: RawReview = serde_json::from_str(strip_code_fence(content))?;

    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
        return Err(AiError::Invalid(format!(
            "confidence {} is outside [0, 1]",
            raw.confidence
        )));
    }

    let mut feedback = Vec::with_capacity(raw.feedbacks.len());
    for (index, item) in raw.feedbacks.into_iter().enumerate() {
        if !(1..=5).contains(&item.severity) {
            return Err(AiError::Invalid(format!(
                "feedback #{} has severity {} outside [1, 5]",
                index, item.severity
            )));
        }
        if item.line_start < 0 {
            return Err(AiError::Invalid(format!(
                "feedback #{} has negative line_start {}",
                index, item.line_start
            )));
        }
        if let Some(end) = item.line_end {
            if end < item.line_start {
                return Err(AiError::Invalid(format!(
                    "feedback #{} ends at line {} before it starts at {}",
                    index, end, item.line_start
                )));
            }
        }

        let file_path = non_empty(item.file_path);
        if multi_file && file_path.is_none() {
            return Err(AiError::Invalid(format!(
                "feedback #{} is missing file_path for a multi-file project",
                index
            )));
        }

        feedback.push(FeedbackDraft {
            category: item.category,
            file_path,
            line_start: item.line_start,
            line_end: item.line_end,
            code_snippet: item.code_snippet.unwrap_or_default(),
            suggested_fix: non_empty(item.suggested_fix),
            description: item.description,
            severity: item.severity,
        });
    }

    Ok(ReviewVerdict {
        verdict: raw.overall_status,
        confidence: raw.confidence,
        feedback,
    })
}
