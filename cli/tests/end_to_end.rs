//! End-to-end scenarios: route an input, execute the resulting call, and
//! check what landed on disk.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Value, json};

use steward_config::{ExecLimits, StoragePaths};
use steward_router::{RouteOptions, Router};
use steward_storage::PathLocks;
use steward_tools::builtins::register_builtins;
use steward_tools::{
    AuditLog, CommandCapability, ExecuteOptions, Executor, PathCapability, ToolRegistry,
};
use steward_types::{
    Agent, ErrorKind, Intent, PermissionSet, RouteErrorCode, RouteResult, ToolResult,
};

struct Harness {
    router: Router,
    executor: Executor,
    storage: StoragePaths,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = dir.path().to_path_buf();
    let storage = StoragePaths {
        memory: base.join("memory.json"),
        tasks: base.join("tasks.jsonl"),
        reminders: base.join("reminders.jsonl"),
        audit: base.join("audit.jsonl"),
        command_log: base.join("command_log.jsonl"),
    };
    let permissions = PermissionSet::default();

    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry).expect("builtins");
    let registry = Arc::new(registry);

    let executor = Executor::new(
        registry.clone(),
        Arc::new(PathCapability::new(&base, &permissions.allow_paths).expect("paths")),
        Arc::new(CommandCapability::new(
            permissions.allow_commands.clone(),
            1024 * 1024,
        )),
        storage.clone(),
        Arc::new(PathLocks::new()),
        ExecLimits::default(),
        Arc::new(permissions),
        Arc::new(AuditLog::new(storage.audit.clone())),
    );
    let router = Router::new(registry, 10);

    Harness {
        router,
        executor,
        storage,
        _dir: dir,
    }
}

fn system_agent() -> Arc<Agent> {
    Arc::new(Agent::system("system", "", "You are steward.", []))
}

fn assistant_agent() -> Arc<Agent> {
    Arc::new(Agent::user(
        "assistant",
        "no file-write tools",
        "You are a careful assistant.",
        ["recall", "get_time", "task_list"].map(String::from),
    ))
}

async fn route(h: &Harness, input: &str, intent: Intent, agent: Option<&Arc<Agent>>) -> RouteResult {
    h.router
        .route(input, intent, &[], agent, None, &RouteOptions::default())
        .await
}

async fn execute(h: &Harness, route: &RouteResult, agent: Option<Arc<Agent>>) -> ToolResult {
    let RouteResult::ToolCall { tool_call, .. } = route else {
        panic!("expected a tool call route, got {route:?}");
    };
    h.executor
        .execute(
            &tool_call.tool_name,
            tool_call.args.clone(),
            agent,
            ExecuteOptions::default(),
        )
        .await
}

fn read_json_file(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).expect("read")).expect("parse")
}

#[tokio::test]
async fn remember_then_recall_round_trips_through_disk() {
    let h = harness();
    let agent = system_agent();

    let r = route(&h, "remember: I parked on level 3", Intent::Chat, Some(&agent)).await;
    let result = execute(&h, &r, Some(agent.clone())).await;
    assert!(result.ok, "{result:?}");
    assert_eq!(result.result.as_ref().expect("result")["count"], json!(1));

    let memory = read_json_file(&h.storage.memory);
    assert_eq!(memory["version"], json!(1));
    assert_eq!(memory["entries"][0]["text"], json!("I parked on level 3"));

    let r = route(&h, "recall parked", Intent::Chat, Some(&agent)).await;
    let result = execute(&h, &r, Some(agent)).await;
    assert!(result.ok);
    let entries = &result.result.expect("result")["entries"];
    assert_eq!(
        entries[0]["text"],
        json!("I parked on level 3"),
        "stored entry must rank first"
    );
}

#[tokio::test]
async fn task_round_trip_with_done_filter() {
    let h = harness();
    let agent = system_agent();

    let r = route(&h, "add task water the plants", Intent::Chat, Some(&agent)).await;
    let added = execute(&h, &r, Some(agent.clone())).await;
    let id = added.result.expect("result")["id"].as_u64().expect("id");

    let r = route(&h, "list tasks", Intent::Chat, Some(&agent)).await;
    let listed = execute(&h, &r, Some(agent.clone())).await;
    let tasks = listed.result.expect("result")["tasks"].clone();
    assert!(
        tasks.as_array().expect("tasks").iter().any(|t| t["id"] == json!(id)),
        "fresh task must appear in the list"
    );

    let r = route(&h, &format!("done task {id}"), Intent::Chat, Some(&agent)).await;
    assert!(execute(&h, &r, Some(agent.clone())).await.ok);

    let r = route(&h, "list tasks --status open", Intent::Chat, Some(&agent)).await;
    let open = execute(&h, &r, Some(agent)).await;
    let tasks = open.result.expect("result")["tasks"].clone();
    assert!(
        tasks.as_array().expect("tasks").iter().all(|t| t["id"] != json!(id)),
        "done task must leave the open view"
    );
}

#[tokio::test]
async fn absolute_read_never_reaches_the_executor() {
    let h = harness();
    let agent = system_agent();

    // The fast-path drops the candidate; with no provider and spike
    // intent the router reports nothing routable.
    let r = route(&h, "read /etc/passwd", Intent::Spike, Some(&agent)).await;
    assert_eq!(
        r,
        RouteResult::error("no tool found", RouteErrorCode::NotRoutable)
    );

    // Forced through directly, the capability still denies it: args with
    // an absolute path fail resolution, not the allowlist.
    let forced = h
        .executor
        .execute(
            "read_file",
            json!({"path": "/etc/passwd"}),
            Some(agent),
            ExecuteOptions::default(),
        )
        .await;
    assert_eq!(
        forced.error.expect("error").code,
        ErrorKind::DeniedPathTraversal
    );
}

#[tokio::test]
async fn rm_rf_is_not_routable_without_a_provider() {
    let h = harness();
    let r = route(&h, "run rm -rf /", Intent::Spike, Some(&system_agent())).await;
    assert_eq!(
        r,
        RouteResult::error("no tool found", RouteErrorCode::NotRoutable)
    );
}

#[tokio::test]
async fn assistant_agent_cannot_be_routed_to_write_file() {
    let h = harness();
    let agent = assistant_agent();
    let r = route(&h, "write foo.txt: hi", Intent::Chat, Some(&agent)).await;
    // The fast-path match is skipped (not in allowlist); no provider, so
    // the router echoes conversationally rather than proposing the tool.
    assert!(matches!(r, RouteResult::Reply { .. }), "{r:?}");
}

#[tokio::test]
async fn routed_calls_always_pass_executor_agent_authorization() {
    let h = harness();
    let inputs = [
        "remember: alignment check",
        "recall alignment",
        "time",
        "calculate: 1 + 1",
        "list files",
        "write out.txt alignment",
        "add task check the mail",
        "list tasks",
        "git status",
    ];
    let agents: [Option<Arc<Agent>>; 3] =
        [Some(system_agent()), Some(assistant_agent()), None];

    for agent in &agents {
        for input in inputs {
            let r = route(&h, input, Intent::Chat, agent.as_ref()).await;
            if let RouteResult::ToolCall { tool_call, .. } = r {
                let result = h
                    .executor
                    .execute(
                        &tool_call.tool_name,
                        tool_call.args.clone(),
                        agent.clone(),
                        ExecuteOptions::default(),
                    )
                    .await;
                if let Some(error) = &result.error {
                    assert!(
                        error.code != ErrorKind::DeniedAgentTool
                            && error.code != ErrorKind::DeniedNoAgent,
                        "router proposed {} which the executor refused on agent grounds for {agent:?}",
                        tool_call.tool_name
                    );
                }
            }
        }
    }
}

#[tokio::test]
async fn every_executed_call_lands_in_the_audit_log() {
    let h = harness();
    let agent = system_agent();

    for input in ["remember: one", "remember: two", "recall one"] {
        let r = route(&h, input, Intent::Chat, Some(&agent)).await;
        execute(&h, &r, Some(agent.clone())).await;
    }

    let audit = std::fs::read_to_string(&h.storage.audit).expect("audit");
    let lines: Vec<Value> = audit
        .lines()
        .map(|l| serde_json::from_str(l).expect("audit line"))
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["tool"], json!("remember"));
    assert_eq!(lines[2]["tool"], json!("recall"));
    assert!(lines.iter().all(|l| l["ok"] == json!(true)));
}
