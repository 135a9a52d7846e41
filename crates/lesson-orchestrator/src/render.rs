//! Text produced by the workflow: the model prompt, notification bodies and
//! the commit message for the progress file.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::progress::GeneratedLesson;

/// Matches any markup tag. Entities are left alone.
#[allow(clippy::expect_used)]
static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag pattern"));

/// Builds the generation prompt.
///
/// The prompt asks for exactly one passage of 1–5 verses that is not in
/// `completed`, and for a reply that is only a JSON object with `reference`
/// and `lesson_html`.
///
/// # Examples
///
/// ```
/// use lesson_orchestrator::render::build_prompt;
///
/// let prompt = build_prompt(&["John 3:16-18".to_string(), "Psalm 23:1-3".to_string()]);
/// assert!(prompt.contains("NEVER repeat: John 3:16-18, Psalm 23:1-3"));
///
/// let first = build_prompt(&[]);
/// assert!(first.contains("NEVER repeat: none"));
/// ```
#[must_use]
pub fn build_prompt(completed: &[String]) -> String {
    let completed_list = if completed.is_empty() {
        "none".to_string()
    } else {
        completed.join(", ")
    };

    format!(
        "You are generating a daily Bible lesson from the NIV.
Rules:
- Select ONE insightful passage (1–5 verses) from ANY book.
- NEVER repeat: {completed_list}
- Return JSON only:
{{
  \"reference\": \"Book Chapter:Start-End\",
  \"lesson_html\": \"<h2>...</h2>...\"
}}
"
    )
}

/// Subject line of the lesson email.
#[must_use]
pub fn email_subject(reference: &str) -> String {
    format!("Daily Insight: {reference}")
}

/// Removes every `<...>` tag from `html`.
///
/// This is tag stripping, not HTML-to-text conversion: entities such as
/// `&amp;` pass through untouched.
#[must_use]
pub fn strip_tags(html: &str) -> String {
    TAG_PATTERN.replace_all(html, "").into_owned()
}

/// Markdown body of the chat message: a bold title followed by the lesson
/// with its markup removed.
#[must_use]
pub fn chat_text(lesson: &GeneratedLesson) -> String {
    format!(
        "*Daily Insight: {}*\n\n{}",
        lesson.reference,
        strip_tags(&lesson.lesson_html)
    )
}

/// Commit message used when writing the progress file.
#[must_use]
pub fn commit_message(reference: &str) -> String {
    format!("Lesson: {reference}")
}
