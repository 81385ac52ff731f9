//! Scripted agent answers for deterministic testing.

use nk_core::agents::MockAgent;
use serde_json::json;

/// Architect answer creating `target` with `content`.
#[allow(dead_code)]
pub fn create_answer(target: &str, content: &str) -> String {
    json!({
        "target_file": target,
        "full_content": content,
        "create_if_missing": true,
        "commit_message": format!("create {target}"),
    })
    .to_string()
}

/// Architect answer editing `target` with `(search, replace)` pairs.
#[allow(dead_code)]
pub fn edit_answer(target: &str, edits: &[(&str, &str)], message: &str) -> String {
    let edits: Vec<_> = edits
        .iter()
        .map(|(search, replace)| json!({ "search": search, "replace": replace }))
        .collect();
    json!({
        "target_file": target,
        "edits": edits,
        "commit_message": message,
    })
    .to_string()
}

/// Planner answer with `(target, action)` entries.
#[allow(dead_code)]
pub fn plan_answer(entries: &[(&str, &str)], message: &str) -> String {
    let plans: Vec<_> = entries
        .iter()
        .map(|(target, action)| json!({ "target_file": target, "action": action, "description": "" }))
        .collect();
    json!({
        "file_plans": plans,
        "reasoning": "test plan",
        "commit_message": message,
    })
    .to_string()
}

/// An architect that answers with the given texts in order, the last one
/// repeating. Wrapped in a fenced block the way models often answer.
#[allow(dead_code)]
pub fn fenced_architect(answers: Vec<String>) -> MockAgent {
    MockAgent::responding(
        answers
            .into_iter()
            .map(|a| format!("Here is the update:\n```json\n{a}\n```"))
            .collect(),
    )
}
