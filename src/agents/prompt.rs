use std::fmt::Write;

use super::{ReviewRequest, SourcePayload};
use crate::db::Criterion;

pub const SNIPPET_SYSTEM_PROMPT: &str = "You are an expert Flutter/Dart code reviewer. \
Analyze code and provide structured feedback in JSON format.";

pub const PROJECT_SYSTEM_PROMPT: &str = "You are an expert Flutter/Dart code reviewer. \
Analyze Flutter/Dart projects and provide structured feedback in JSON format.";

const RESPONSE_FORMAT: &str = r#"Provide your response in the following JSON format:
{
  "overall_status": "passed|failed|needs_improvement",
  "confidence": 0.95,
  "feedbacks": [
    {
      "type": "critical_error|logic_error|style_issue|performance|security_risk|improvement",
      "file_path": "lib/main.dart",
      "line_start": 10,
      "line_end": 15,
      "code_snippet": "problematic code here",
      "suggested_fix": "corrected code here",
      "description": "detailed explanation of the issue",
      "severity": 1-5
    }
  ]
}"#;

const REVIEW_GUIDE: &str = r#"Review criteria:
1. **Critical Errors**: Syntax errors, null safety violations, type mismatches
2. **Logic Errors**: Incorrect business logic, potential runtime errors
3. **Style Issues**: Code formatting, naming conventions, Flutter best practices
4. **Performance**: Inefficient algorithms, unnecessary rebuilds, memory leaks
5. **Security**: Exposed sensitive data, insecure API calls
6. **Improvements**: Better patterns, code organization, widget composition"#;

const SCORING_GUIDE: &str = r#"Severity levels:
- 5: Critical (blocks functionality)
- 4: Major (significant impact)
- 3: Moderate (noticeable issue)
- 2: Minor (cosmetic or style)
- 1: Suggestion (optional improvement)

Overall status:
- "passed": Code is production-ready with minor or no issues
- "needs_improvement": Code works but has moderate issues
- "failed": Code has critical errors or major problems

Provide confidence as a decimal between 0 and 1.
Respond with the JSON object only."#;

pub fn system_prompt(source: &SourcePayload) -> &'static str {
    match source {
        SourcePayload::Snippet(_) => SNIPPET_SYSTEM_PROMPT,
        SourcePayload::Project(_) => PROJECT_SYSTEM_PROMPT,
    }
}

/// Criteria are listed in the order the task defines them.
fn criteria_section(criteria: &[Criterion]) -> String {
    if criteria.is_empty() {
        return String::new();
    }

    let mut section = String::from("\n\nTask-specific criteria to check:\n");
    for (i, c) in criteria.iter().enumerate() {
        let mandatory = if c.is_mandatory { "Mandatory" } else { "Optional" };
        let _ = writeln!(
            section,
            "{}. [{}, Weight: {}] {}: {}",
            i + 1,
            mandatory,
            c.weight,
            c.name,
            c.description
        );
    }
    section
}

pub fn user_prompt(request: &ReviewRequest<'_>) -> String {
    let task_section = request
        .task_description
        .map(|d| format!("\n\nTask description:\n{}\n", d))
        .unwrap_or_default();
    let criteria = criteria_section(request.criteria);

    let mut prompt = String::new();
    match request.source {
        SourcePayload::Snippet(code) => {
            let _ = write!(
                prompt,
                "Analyze the following Flutter/Dart code and provide a detailed code review.\n\
                 {}{}\nCode to review:\n{}\n\n",
                task_section, criteria, code
            );
        }
        SourcePayload::Project(files) => {
            let _ = write!(
                prompt,
                "Analyze the following Flutter/Dart project and provide a detailed code review.\n\
                 {}{}\nFlutter/Dart project files:\n\n",
                task_section, criteria
            );
            for (path, content) in files {
                let _ = write!(prompt, "=== File: {} ===\n{}\n\n", path, content);
            }
        }
    }

    prompt.push_str(RESPONSE_FORMAT);
    prompt.push_str("\n\n");
    prompt.push_str(REVIEW_GUIDE);
    if matches!(request.source, SourcePayload::Project(_)) {
        prompt.push_str("\n7. **Project Structure**: Proper file organization, separation of concerns");
    }
    prompt.push_str("\n\n");
    prompt.push_str(SCORING_GUIDE);

    if matches!(request.source, SourcePayload::Project(_)) {
        prompt.push_str(
            "\nIMPORTANT: Always include \"file_path\" field in each feedback item to indicate which file the issue is in.",
        );
    }
    if !request.criteria.is_empty() {
        prompt.push_str(
            "\nIMPORTANT: Pay special attention to the task-specific criteria listed above. \
             Check if the submission meets these requirements and include them in your feedback if they are not satisfied.",
        );
    }

    prompt
}
