use std::path::PathBuf;

use serde_json::{Map, Value, json};
use toolchat_audit::AuditLog;
use toolchat_config::CommandSpec;
use toolchat_primitives::ErrorCategory;
use toolchat_session::{SessionError, SessionManager};
use toolchat_tools::{BackendDescriptor, BackendRegistry};

const INIT: &str = r#"{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}"#;
const TOOLS: &str = r#"{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"shout","description":"Upper-cases text"}]}}"#;

/// Fake provider: handshake, then answers the call with `reply` and runs `tail`.
fn provider(pid_file: &PathBuf, reply: &str, tail: &str) -> CommandSpec {
    let script = format!(
        "echo $$ > '{}'; read l; echo '{INIT}'; read l; read l; echo '{TOOLS}'; read l; echo '{reply}'; {tail}",
        pid_file.display()
    );
    CommandSpec::new("sh", ["-c", script.as_str()])
}

fn pid_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("toolchat-{name}-{}.pid", std::process::id()))
}

fn assert_reaped(pid_file: &PathBuf) {
    let pid = std::fs::read_to_string(pid_file).expect("pid written");
    let _ = std::fs::remove_file(pid_file);
    if cfg!(target_os = "linux") {
        let proc_dir = PathBuf::from(format!("/proc/{}", pid.trim()));
        assert!(!proc_dir.exists(), "provider {} still running", pid.trim());
    }
}

fn manager(descriptors: Vec<BackendDescriptor>) -> (SessionManager, AuditLog) {
    let mut registry = BackendRegistry::new();
    for descriptor in descriptors {
        registry.register(descriptor).unwrap();
    }
    let audit = AuditLog::new();
    (SessionManager::new(registry, audit.clone()), audit)
}

fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[tokio::test]
async fn call_once_logs_one_entry_and_reaps_provider() {
    let pids = pid_file("success");
    let reply = r#"{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"HELLO"}]}}"#;
    let (manager, audit) = manager(vec![
        BackendDescriptor::local("echo", vec![provider(&pids, reply, "read l")]).unwrap(),
    ]);

    let outcome = manager
        .call_once("echo", "shout", args(json!({"text": "hello"})))
        .await;
    assert_eq!(outcome.text(), "HELLO");
    assert!(!outcome.is_error());

    let entries = audit.dump();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].backend(), "echo");
    assert_eq!(entries[0].request(), r#"shout {"text":"hello"}"#);
    assert_reaped(&pids);
}

#[tokio::test]
async fn tool_error_still_closes_hanging_provider() {
    let pids = pid_file("tool-error");
    let reply = r#"{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"image not found"}],"isError":true}}"#;
    // `exec sleep` keeps the same pid and ignores stdin, forcing the kill path.
    let (manager, audit) = manager(vec![
        BackendDescriptor::local("qr", vec![provider(&pids, reply, "exec sleep 30")]).unwrap(),
    ]);

    let outcome = manager
        .call_once("qr", "read_qr", args(json!({"image_path": "/nope.png"})))
        .await;
    assert!(outcome.is_error());
    assert_eq!(outcome.category(), Some(ErrorCategory::Tool));
    assert!(outcome.text().contains("image not found"));
    assert_eq!(audit.failures().len(), 1);
    assert_reaped(&pids);
}

#[tokio::test]
async fn falls_back_to_next_candidate() {
    let pids = pid_file("fallback");
    let reply = r#"{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"clean"}]}}"#;
    let (manager, _audit) = manager(vec![
        BackendDescriptor::local(
            "git",
            vec![
                CommandSpec::new("toolchat-missing-uvx", ["mcp-server-git"]),
                provider(&pids, reply, "read l"),
            ],
        )
        .unwrap(),
    ]);

    let outcome = manager.call_once("git", "git_status", Map::new()).await;
    assert_eq!(outcome.text(), "clean");
    assert_reaped(&pids);
}

#[tokio::test]
async fn connection_error_lists_every_attempt_with_hint() {
    let (manager, audit) = manager(vec![
        BackendDescriptor::local(
            "fs",
            vec![
                CommandSpec::new("toolchat-missing-npx", ["-y", "server"]),
                CommandSpec::new("sh", ["-c", "read l; exit 3"]),
            ],
        )
        .unwrap(),
    ]);

    let err = match manager.open("fs").await {
        Ok(_) => panic!("no candidate can connect"),
        Err(err) => err,
    };
    let SessionError::Connection {
        label,
        attempts,
        hint,
    } = &err
    else {
        panic!("expected connection error, got {err}");
    };
    assert_eq!(label, "fs");
    assert_eq!(attempts.len(), 2);
    assert!(attempts[0].contains("toolchat-missing-npx"));
    assert!(attempts[1].contains("closed its output"));
    assert!(hint.contains("toolchat-missing-npx"));
    assert!(hint.contains("`sh`"));
    assert_eq!(err.category(), ErrorCategory::Connection);

    let outcome = manager.call_once("fs", "list_directory", Map::new()).await;
    assert!(outcome.text().starts_with("Error: could not connect to backend `fs`"));
    assert_eq!(audit.failures().len(), 1);
}

#[tokio::test]
async fn unknown_backend_is_reported_not_substituted() {
    let (manager, audit) = manager(Vec::new());
    let outcome = manager.call_once("UNCONFIGURED", "anything", Map::new()).await;

    assert!(outcome.is_error());
    assert_eq!(outcome.category(), Some(ErrorCategory::Configuration));
    assert!(outcome.text().contains("UNCONFIGURED"));

    let entries = audit.dump();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_error());
    assert_eq!(entries[0].backend(), "UNCONFIGURED");
}

#[tokio::test]
async fn list_tools_reports_handshake_tools() {
    let pids = pid_file("list");
    let (manager, audit) = manager(vec![
        BackendDescriptor::local("weather", vec![provider(&pids, "", "")]).unwrap(),
    ]);

    let outcome = manager.list_tools("weather").await;
    assert_eq!(
        outcome.text(),
        "Tools available on `weather`:\n- shout: Upper-cases text"
    );
    assert_eq!(audit.len(), 1);
    assert_reaped(&pids);
}
