//! Output rendering: machine (one JSON object per invocation) and human
//! (one-line status plus body), both generated from the same result.

use serde_json::json;

use steward_types::{ErrorKind, RouteResult, ToolResult};

/// Print a tool result and return nothing; callers take the exit code
/// from the result itself.
pub fn print_tool_result(tool: &str, result: &ToolResult, machine: bool) {
    if machine {
        println!(
            "{}",
            serde_json::to_string(result).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        return;
    }

    if result.ok {
        println!("ok {tool} ({} ms)", result.debug.duration_ms);
        if let Some(value) = &result.result {
            println!(
                "{}",
                serde_json::to_string_pretty(value).unwrap_or_default()
            );
        }
    } else if let Some(error) = &result.error {
        println!("error {}: {}", error.code, error.message);
    }
}

/// Print a route result and return the process exit code for it.
pub fn print_route_result(route: &RouteResult, machine: bool) -> i32 {
    match route {
        RouteResult::ToolCall {
            tool_call, debug, ..
        } => {
            if machine {
                println!(
                    "{}",
                    json!({"ok": true, "result": {"tool_call": tool_call}, "_debug": debug})
                );
            } else {
                println!("route {} via {:?}", tool_call.tool_name, debug.path);
                println!(
                    "{}",
                    serde_json::to_string_pretty(&tool_call.args).unwrap_or_default()
                );
            }
            0
        }
        RouteResult::Reply {
            content, debug, ..
        } => {
            if machine {
                println!(
                    "{}",
                    json!({"ok": true, "result": {"reply": content}, "_debug": debug})
                );
            } else {
                println!("{content}");
            }
            0
        }
        RouteResult::Error { message, code } => {
            if machine {
                println!(
                    "{}",
                    json!({"ok": false, "error": {"code": "ROUTE_ERROR", "message": message, "route_code": code.as_u8()}})
                );
            } else {
                println!("error ROUTE_ERROR: {message}");
            }
            i32::from(code.as_u8())
        }
    }
}

pub fn print_parse_error(message: &str, machine: bool) {
    if machine {
        println!(
            "{}",
            json!({"ok": false, "error": {"code": ErrorKind::ParseError, "message": message}})
        );
    } else {
        println!("error {}: {message}", ErrorKind::ParseError);
    }
}
