//! Regex fast-path: a static, ordered table of pre-compiled patterns for
//! terse command forms.
//!
//! Order matters because prefixes overlap: weather before delegation
//! before the write forms. A matched candidate whose captured path is
//! absolute, contains `..`, or (for the shell-verb form) contains `/` is
//! dropped back to `Skip` so the LLM stage can handle or refuse it,
//! instead of the fast-path forging a call the executor will deny.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::json;

use steward_types::ToolCallRequest;

use super::ParseOutcome;

/// File extensions that disambiguate `read notes.md` (a file) from
/// `read github.com` (a URL).
const FILE_EXTENSIONS: &[&str] = &[
    "txt", "md", "js", "ts", "json", "py", "rb", "go", "rs", "c", "h", "cpp", "java", "xml",
    "yml", "yaml", "sh",
];

/// Languages that trigger implicit code delegation.
const CODE_LANGUAGES: &str = "typescript|javascript|python|rust|go|ruby|bash|shell";

type Extractor = fn(&Captures) -> Option<ToolCallRequest>;

struct FastPathRule {
    pattern: Regex,
    extract: Extractor,
}

fn rule(pattern: &str, extract: Extractor) -> FastPathRule {
    FastPathRule {
        pattern: Regex::new(pattern).expect("fast-path pattern compiles"),
        extract,
    }
}

static RULES: LazyLock<Vec<FastPathRule>> = LazyLock::new(|| {
    vec![
        rule(r"(?i)^remember:\s*(.+)$", |caps| {
            Some(ToolCallRequest::new(
                "remember",
                json!({"text": caps[1].trim()}),
            ))
        }),
        rule(r"(?i)^recall:?\s+(.+)$", |caps| {
            Some(ToolCallRequest::new(
                "recall",
                json!({"query": caps[1].trim()}),
            ))
        }),
        rule(r"(?i)^time$", |_| {
            Some(ToolCallRequest::new("get_time", json!({})))
        }),
        rule(r"(?i)^calculate:?\s+(.+)$", |caps| {
            Some(ToolCallRequest::new(
                "calculate",
                json!({"expression": caps[1].trim()}),
            ))
        }),
        // Weather precedes delegation: "weather in Paris" must never be
        // parsed as a delegation to "in".
        rule(r"(?i)^weather\s+(?:in\s+)?(.+)$", |caps| {
            Some(ToolCallRequest::new(
                "get_weather",
                json!({"location": caps[1].trim()}),
            ))
        }),
        rule(r"(?i)^delegate\s+(?:to\s+)?(\w+)\s+(.+)$", |caps| {
            let target = caps[1].to_lowercase();
            Some(ToolCallRequest::new(
                format!("delegate_to_{target}"),
                json!({"task": caps[2].trim()}),
            ))
        }),
        // Implicit code delegation, before the write-file form: "write a
        // typescript script ..." is a coding task, not a file named "a".
        rule(
            &format!(r"(?i)^write\s+(?:me\s+)?an?\s+(?:{CODE_LANGUAGES})\s+script\b(.*)$"),
            |caps| {
                Some(ToolCallRequest::new(
                    "delegate_to_coder",
                    json!({"task": caps[0].trim()}),
                ))
            },
        ),
        rule(r"(?i)^write\s+(\S+?):?\s+(.+)$", |caps| {
            let path = caps[1].to_string();
            if !is_safe_rel_path(&path) {
                return None;
            }
            Some(ToolCallRequest::new(
                "write_file",
                json!({"path": path, "content": caps[2].to_string()}),
            ))
        }),
        rule(r"(?i)^read\s+(\S+)$", |caps| extract_read(&caps[1])),
        rule(r"(?i)^list(?:\s+files)?$", |_| {
            Some(ToolCallRequest::new("list_files", json!({})))
        }),
        rule(r"(?i)^git\s+(status|diff|log)(?:\s+(.*))?$", |caps| {
            extract_git(&caps[1].to_lowercase(), caps.get(2).map(|m| m.as_str()))
        }),
        rule(r"(?i)^(ls|pwd|cat|du)(?:\s+(.*))?$", |caps| {
            extract_shell_verb(&caps[1].to_lowercase(), caps.get(2).map(|m| m.as_str()))
        }),
    ]
});

/// Try the fast-path table against one input line.
#[must_use]
pub fn parse(input: &str) -> ParseOutcome {
    let input = input.trim();
    for rule in RULES.iter() {
        if let Some(caps) = rule.pattern.captures(input) {
            return match (rule.extract)(&caps) {
                Some(call) => ParseOutcome::Match(call),
                // Security filter dropped the candidate.
                None => ParseOutcome::Skip,
            };
        }
    }
    ParseOutcome::Skip
}

fn is_safe_rel_path(path: &str) -> bool {
    !std::path::Path::new(path).is_absolute() && !path.contains("..")
}

fn extract_read(target: &str) -> Option<ToolCallRequest> {
    if target.starts_with("http://") || target.starts_with("https://") {
        return Some(ToolCallRequest::new("read_url", json!({"url": target})));
    }
    // Bare-domain rule: a dotted token that does not end in a known file
    // extension reads as a URL.
    if let Some((_, ext)) = target.rsplit_once('.')
        && !target.contains('/')
        && !FILE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    {
        return Some(ToolCallRequest::new(
            "read_url",
            json!({"url": format!("https://{target}")}),
        ));
    }
    if !is_safe_rel_path(target) {
        return None;
    }
    Some(ToolCallRequest::new("read_file", json!({"path": target})))
}

fn extract_git(subcommand: &str, rest: Option<&str>) -> Option<ToolCallRequest> {
    let extra: Vec<&str> = rest.unwrap_or("").split_whitespace().collect();
    match subcommand {
        "status" => Some(ToolCallRequest::new("git_status", json!({}))),
        "diff" => {
            let paths: Vec<&str> = extra
                .iter()
                .filter(|a| !a.starts_with('-'))
                .copied()
                .collect();
            if paths.iter().any(|p| !is_safe_rel_path(p)) {
                return None;
            }
            if paths.is_empty() {
                Some(ToolCallRequest::new("git_diff", json!({})))
            } else {
                Some(ToolCallRequest::new("git_diff", json!({"paths": paths})))
            }
        }
        "log" => {
            let limit = extra.iter().find_map(|a| a.parse::<u32>().ok());
            match limit {
                Some(n) => Some(ToolCallRequest::new("git_log", json!({"limit": n}))),
                None => Some(ToolCallRequest::new("git_log", json!({}))),
            }
        }
        _ => None,
    }
}

fn extract_shell_verb(verb: &str, rest: Option<&str>) -> Option<ToolCallRequest> {
    let mut argv = vec![verb.to_string()];
    for arg in rest.unwrap_or("").split_whitespace() {
        // The shell-verb form refuses any path-like argument; the LLM
        // stage can propose a proper run_command instead.
        if arg.contains('/') || arg.contains("..") {
            return None;
        }
        argv.push(arg.to_string());
    }
    Some(ToolCallRequest::new("run_command", json!({"argv": argv})))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ParseOutcome, parse};

    fn expect_match(input: &str) -> steward_types::ToolCallRequest {
        match parse(input) {
            ParseOutcome::Match(call) => call,
            other => panic!("expected match for {input:?}, got {other:?}"),
        }
    }

    #[test]
    fn remember_and_recall_forms() {
        let call = expect_match("remember: I parked on level 3");
        assert_eq!(call.tool_name, "remember");
        assert_eq!(call.args, json!({"text": "I parked on level 3"}));

        let call = expect_match("recall parked");
        assert_eq!(call.tool_name, "recall");
        assert_eq!(call.args, json!({"query": "parked"}));
    }

    #[test]
    fn time_and_calculate_forms() {
        assert_eq!(expect_match("time").tool_name, "get_time");
        let call = expect_match("calculate: 2 * (3 + 4)");
        assert_eq!(call.tool_name, "calculate");
        assert_eq!(call.args["expression"], json!("2 * (3 + 4)"));
    }

    #[test]
    fn weather_beats_delegation() {
        let call = expect_match("weather in Paris");
        assert_eq!(call.tool_name, "get_weather");
        assert_eq!(call.args, json!({"location": "Paris"}));
    }

    #[test]
    fn delegation_forms() {
        let call = expect_match("delegate to coder implement pagination");
        assert_eq!(call.tool_name, "delegate_to_coder");
        assert_eq!(call.args, json!({"task": "implement pagination"}));

        let call = expect_match("delegate researcher find benchmarks");
        assert_eq!(call.tool_name, "delegate_to_researcher");
    }

    #[test]
    fn code_script_request_is_implicit_delegation() {
        let call = expect_match("write a typescript script that sorts a csv");
        assert_eq!(call.tool_name, "delegate_to_coder");
        assert!(call.args["task"].as_str().unwrap().contains("typescript"));
    }

    #[test]
    fn write_file_forms() {
        let call = expect_match("write foo.txt: hi");
        assert_eq!(call.tool_name, "write_file");
        assert_eq!(call.args, json!({"path": "foo.txt", "content": "hi"}));

        let call = expect_match("write notes/today.md remember the milk");
        assert_eq!(call.args["path"], json!("notes/today.md"));
    }

    #[test]
    fn absolute_write_paths_are_dropped_not_errored() {
        assert_eq!(parse("write /etc/passwd pwned"), ParseOutcome::Skip);
        assert_eq!(parse("write ../up.txt content"), ParseOutcome::Skip);
    }

    #[test]
    fn read_file_vs_url_disambiguation() {
        assert_eq!(expect_match("read notes.md").tool_name, "read_file");
        let call = expect_match("read github.com");
        assert_eq!(call.tool_name, "read_url");
        assert_eq!(call.args["url"], json!("https://github.com"));
        let call = expect_match("read https://example.com/page");
        assert_eq!(call.tool_name, "read_url");
    }

    #[test]
    fn read_of_absolute_path_is_dropped() {
        assert_eq!(parse("read /etc/passwd"), ParseOutcome::Skip);
    }

    #[test]
    fn list_forms() {
        assert_eq!(expect_match("list").tool_name, "list_files");
        assert_eq!(expect_match("list files").tool_name, "list_files");
    }

    #[test]
    fn git_forms() {
        assert_eq!(expect_match("git status").tool_name, "git_status");
        let call = expect_match("git log 5");
        assert_eq!(call.tool_name, "git_log");
        assert_eq!(call.args["limit"], json!(5));
        let call = expect_match("git diff src/lib.rs");
        assert_eq!(call.args["paths"], json!(["src/lib.rs"]));
    }

    #[test]
    fn shell_verbs_build_argv() {
        let call = expect_match("ls -la");
        assert_eq!(call.tool_name, "run_command");
        assert_eq!(call.args["argv"], json!(["ls", "-la"]));
        assert_eq!(expect_match("pwd").args["argv"], json!(["pwd"]));
    }

    #[test]
    fn shell_verb_with_slash_argument_is_dropped() {
        // "run rm -rf /" does not even reach here (rm is no fast-path verb),
        // but a slash in a verb argument must drop the candidate.
        assert_eq!(parse("ls /etc"), ParseOutcome::Skip);
        assert_eq!(parse("cat ../secret"), ParseOutcome::Skip);
        assert_eq!(parse("du /"), ParseOutcome::Skip);
    }

    #[test]
    fn unrecognized_input_skips() {
        assert_eq!(parse("please summarize my week"), ParseOutcome::Skip);
        assert_eq!(parse("rm -rf /"), ParseOutcome::Skip);
    }
}
