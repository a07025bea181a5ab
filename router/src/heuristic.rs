//! Template-based parsers for natural command forms.
//!
//! Unlike the fast-path, a recognized-but-invalid command here is a
//! `Reject`: the router surfaces it immediately with code 2 rather than
//! silently reinterpreting a well-formed command at a later stage.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;

use steward_types::ToolCallRequest;

use super::ParseOutcome;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("heuristic pattern compiles")
}

static CREATE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)^(?:create|make)\s+a\s+file\s+(?:called|named)\s+(\S+)(?:\s+(?:with|containing)\s+(?:content\s+)?(.+))?$")
});
static SHOW_FILE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^(?:show|open)\s+(?:me\s+)?(?:the\s+)?(?:contents?\s+of\s+)?(\S+)$"));
static WHAT_FILES: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^what\s+files\s+(?:are|do\s+i\s+have)\b.*$"));

/// Heuristic file-op parser: natural create/show/list phrasings.
#[must_use]
pub fn parse_file_op(input: &str) -> ParseOutcome {
    let input = input.trim();

    if let Some(caps) = CREATE_FILE.captures(input) {
        let path = caps[1].trim_end_matches(':').to_string();
        if let Some(reason) = invalid_path(&path) {
            return ParseOutcome::reject(reason);
        }
        let content = caps.get(2).map_or("", |m| m.as_str()).to_string();
        return ParseOutcome::Match(ToolCallRequest::new(
            "write_file",
            json!({"path": path, "content": content}),
        ));
    }

    if WHAT_FILES.is_match(input) {
        return ParseOutcome::Match(ToolCallRequest::new("list_files", json!({})));
    }

    if let Some(caps) = SHOW_FILE.captures(input) {
        let path = caps[1].to_string();
        // Only treat it as a file op when it looks like a filename;
        // "show me something fun" belongs to the LLM.
        if !path.contains('.') {
            return ParseOutcome::Skip;
        }
        if let Some(reason) = invalid_path(&path) {
            return ParseOutcome::reject(reason);
        }
        return ParseOutcome::Match(ToolCallRequest::new("read_file", json!({"path": path})));
    }

    ParseOutcome::Skip
}

fn invalid_path(path: &str) -> Option<String> {
    if std::path::Path::new(path).is_absolute() {
        return Some(format!("absolute paths are not allowed: {path}"));
    }
    if path.contains("..") {
        return Some(format!("path may not contain '..': {path}"));
    }
    None
}

static ADD_TASK: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^add\s+(?:a\s+)?task:?\s*(.*?)(?:\s+due\s+(\S.*))?$"));
static DONE_TASK: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^(?:complete|done|finish)\s+task\s+(\S+)$"));
static LIST_TASKS: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^(?:list|show)\s+(?:my\s+)?tasks(?:\s+--status\s+(\w+))?$"));
static REMIND_IN: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^remind\s+me\s+in\s+(\S+)\s+minutes?\s+to\s+(.*)$"));
static REMIND_TO: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^remind\s+me\s+to\s+(.*?)\s+in\s+(\S+)\s+minutes?$"));

/// Task-command parser: add/complete/list tasks and reminders.
#[must_use]
pub fn parse_task(input: &str) -> ParseOutcome {
    let input = input.trim();

    if let Some(caps) = ADD_TASK.captures(input) {
        let text = caps[1].trim().to_string();
        if text.is_empty() {
            return ParseOutcome::reject("task text must not be empty");
        }
        let mut args = json!({"text": text});
        if let Some(due) = caps.get(2) {
            args["due"] = json!(due.as_str().trim());
        }
        return ParseOutcome::Match(ToolCallRequest::new("task_add", args));
    }

    if let Some(caps) = DONE_TASK.captures(input) {
        let Ok(id) = caps[1].parse::<u64>() else {
            return ParseOutcome::reject(format!("'{}' is not a task id", &caps[1]));
        };
        return ParseOutcome::Match(ToolCallRequest::new("task_done", json!({"id": id})));
    }

    if let Some(caps) = LIST_TASKS.captures(input) {
        let mut args = json!({});
        if let Some(status) = caps.get(1) {
            let status = status.as_str().to_lowercase();
            if !matches!(status.as_str(), "open" | "done" | "all") {
                return ParseOutcome::reject(format!("unknown task status '{status}'"));
            }
            args["status"] = json!(status);
        }
        return ParseOutcome::Match(ToolCallRequest::new("task_list", args));
    }

    for (caps, minutes_idx, text_idx) in [
        (REMIND_IN.captures(input), 1, 2),
        (REMIND_TO.captures(input), 2, 1),
    ]
    .into_iter()
    .filter_map(|(c, m, t)| c.map(|c| (c, m, t)))
    {
        let Ok(minutes) = caps[minutes_idx].parse::<i64>() else {
            return ParseOutcome::reject(format!(
                "'{}' is not a number of minutes",
                &caps[minutes_idx]
            ));
        };
        if minutes < 1 {
            return ParseOutcome::reject("minutes must be at least 1");
        }
        let text = caps[text_idx].trim().to_string();
        if text.is_empty() {
            return ParseOutcome::reject("reminder text must not be empty");
        }
        return ParseOutcome::Match(ToolCallRequest::new(
            "remind",
            json!({"text": text, "in_minutes": minutes}),
        ));
    }

    ParseOutcome::Skip
}

static REMEMBER_THAT: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^remember\s+that\s+(.*)$"));
static RECALL_ABOUT: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)^what\s+do\s+you\s+(?:remember|know)\s+about\s+(.*?)\??$")
});

/// Memory-command parser: natural remember/recall phrasings.
#[must_use]
pub fn parse_memory(input: &str) -> ParseOutcome {
    let input = input.trim();

    if let Some(caps) = REMEMBER_THAT.captures(input) {
        let text = caps[1].trim().to_string();
        if text.is_empty() {
            return ParseOutcome::reject("nothing to remember");
        }
        return ParseOutcome::Match(ToolCallRequest::new("remember", json!({"text": text})));
    }

    if let Some(caps) = RECALL_ABOUT.captures(input) {
        let query = caps[1].trim().to_string();
        if query.is_empty() {
            return ParseOutcome::reject("nothing to recall");
        }
        return ParseOutcome::Match(ToolCallRequest::new("recall", json!({"query": query})));
    }

    ParseOutcome::Skip
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ParseOutcome, parse_file_op, parse_memory, parse_task};

    fn expect_match(outcome: ParseOutcome) -> steward_types::ToolCallRequest {
        match outcome {
            ParseOutcome::Match(call) => call,
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn create_file_with_content() {
        let call = expect_match(parse_file_op(
            "create a file called notes.md with content hello world",
        ));
        assert_eq!(call.tool_name, "write_file");
        assert_eq!(call.args["path"], json!("notes.md"));
        assert_eq!(call.args["content"], json!("hello world"));
    }

    #[test]
    fn create_file_with_bad_path_rejects() {
        let outcome = parse_file_op("create a file called /etc/cron.d/x with content y");
        assert!(matches!(outcome, ParseOutcome::Reject { .. }));
    }

    #[test]
    fn show_file_only_fires_on_filenames() {
        let call = expect_match(parse_file_op("show me notes.md"));
        assert_eq!(call.tool_name, "read_file");
        assert_eq!(parse_file_op("show me something fun"), ParseOutcome::Skip);
    }

    #[test]
    fn add_task_with_due_date() {
        let call = expect_match(parse_task("add task buy milk due tomorrow"));
        assert_eq!(call.tool_name, "task_add");
        assert_eq!(call.args["text"], json!("buy milk"));
        assert_eq!(call.args["due"], json!("tomorrow"));
    }

    #[test]
    fn empty_task_text_rejects_instead_of_falling_through() {
        assert!(matches!(
            parse_task("add task"),
            ParseOutcome::Reject { .. }
        ));
    }

    #[test]
    fn done_task_requires_a_numeric_id() {
        let call = expect_match(parse_task("done task 3"));
        assert_eq!(call.args, json!({"id": 3}));
        assert!(matches!(
            parse_task("done task three"),
            ParseOutcome::Reject { .. }
        ));
    }

    #[test]
    fn remind_me_in_minutes_both_orders() {
        let call = expect_match(parse_task("remind me in 15 minutes to check the oven"));
        assert_eq!(call.tool_name, "remind");
        assert_eq!(call.args["in_minutes"], json!(15));
        assert_eq!(call.args["text"], json!("check the oven"));

        let call = expect_match(parse_task("remind me to stretch in 45 minutes"));
        assert_eq!(call.args["in_minutes"], json!(45));
        assert_eq!(call.args["text"], json!("stretch"));
    }

    #[test]
    fn non_numeric_minutes_reject() {
        assert!(matches!(
            parse_task("remind me in soon minutes to hydrate"),
            ParseOutcome::Reject { .. }
        ));
    }

    #[test]
    fn list_tasks_with_status_filter() {
        let call = expect_match(parse_task("list tasks --status open"));
        assert_eq!(call.args["status"], json!("open"));
        assert!(matches!(
            parse_task("list tasks --status urgent"),
            ParseOutcome::Reject { .. }
        ));
    }

    #[test]
    fn remember_that_and_recall_about() {
        let call = expect_match(parse_memory("remember that the wifi password is hunter2"));
        assert_eq!(call.tool_name, "remember");
        assert_eq!(call.args["text"], json!("the wifi password is hunter2"));

        let call = expect_match(parse_memory("what do you remember about the wifi?"));
        assert_eq!(call.tool_name, "recall");
        assert_eq!(call.args["query"], json!("the wifi"));
    }

    #[test]
    fn unrelated_input_skips_everywhere() {
        for input in ["hello there", "what's the capital of France?"] {
            assert_eq!(parse_file_op(input), ParseOutcome::Skip);
            assert_eq!(parse_task(input), ParseOutcome::Skip);
            assert_eq!(parse_memory(input), ParseOutcome::Skip);
        }
    }
}
