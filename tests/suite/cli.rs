//! Black-box tests of the `accord` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};

use crate::common::pipeline_context;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
        }
    }

    fn state(&self) -> std::path::PathBuf {
        self.dir.path().join("protocols.json")
    }

    fn write(&self, name: &str, value: &Value) -> std::path::PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, serde_json::to_vec(value).unwrap()).unwrap();
        path
    }

    /// Run the binary with HOME pointed into the temp dir so config and logs
    /// stay out of the real home directory.
    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_accord"))
            .args(args)
            .arg("--state")
            .arg(self.state())
            .env("HOME", self.dir.path())
            .env_remove("ACCORD_STATE_PATH")
            .env_remove("RUST_LOG")
            .current_dir(self.dir.path())
            .output()
            .unwrap()
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "accord {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    fn draft_pipeline(&self) {
        let context = self.write("context.json", &pipeline_context());
        self.json(&["draft", path_str(&context)]);
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn draft_persists_between_invocations() {
    let ws = Workspace::new();
    let context = ws.write("context.json", &pipeline_context());

    let drafted = ws.json(&["draft", path_str(&context)]);
    assert_eq!(drafted["protocol"]["name"], "data-pipeline");
    assert_eq!(drafted["registered"], true);
    assert!(ws.state().exists());

    let revised = ws.json(&["revise", "data-pipeline", "--scope", "pilot", "--author", "ana"]);
    assert_eq!(revised["previous_version"], "1.0.0");
    assert_eq!(revised["new_version"], "1.0.1");

    let saved: Value = serde_json::from_slice(&fs::read(ws.state()).unwrap()).unwrap();
    assert_eq!(saved["protocols"]["data-pipeline"]["scope"], "pilot");
}

#[test]
fn fork_merge_and_evolution_diagram() {
    let ws = Workspace::new();
    ws.draft_pipeline();

    let forked = ws.json(&["fork", "data-pipeline", "exp", "--by", "bo"]);
    let branch_id = forked["branch_id"].as_str().unwrap().to_string();

    let merged = ws.json(&["merge", &branch_id, "data-pipeline", "--strategy", "ours"]);
    assert_eq!(merged["merge_strategy"], "ours");
    assert_eq!(merged["new_version"], "1.0.1");

    let output = ws.run(&["evolution", "data-pipeline"]);
    assert!(output.status.success());
    let diagram = String::from_utf8(output.stdout).unwrap();
    assert!(diagram.starts_with("data-pipeline v1.0.1"));
    assert!(diagram.contains("exp -> data-pipeline_exp [merged]"));

    let again = ws.run(&["merge", &branch_id, "data-pipeline"]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("already been merged"));
}

#[test]
fn call_dispatches_by_operation_name() {
    let ws = Workspace::new();
    ws.draft_pipeline();

    let args = ws.write(
        "args.json",
        &json!({"protocol_name": "data-pipeline", "changes": {"purpose": "Move data"}}),
    );
    let revised = ws.json(&["call", "revision", path_str(&args)]);
    assert_eq!(revised["changes_applied"], json!(["purpose"]));

    let log = ws.json(&["call", "get_decision_log"]);
    let actions: Vec<&str> = log
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|entry| entry["action"].as_str())
        .collect();
    assert_eq!(actions.last(), Some(&"protocol_revised"));

    let unknown = ws.run(&["call", "launch_rockets"]);
    assert!(!unknown.status.success());
    assert!(String::from_utf8_lossy(&unknown.stderr).contains("unknown operation"));
}

#[test]
fn failed_command_reports_error_and_keeps_state() {
    let ws = Workspace::new();
    ws.draft_pipeline();
    let before = fs::read(ws.state()).unwrap();

    let output = ws.run(&["revise", "ghost"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("protocol 'ghost' not found"));

    let output = ws.run(&["revise", "data-pipeline", "--scope", "galactic"]);
    assert!(!output.status.success());
    assert_eq!(fs::read(ws.state()).unwrap(), before);
}

#[test]
fn corrupt_records_surface_as_warnings() {
    let ws = Workspace::new();
    ws.draft_pipeline();

    let mut document: Value = serde_json::from_slice(&fs::read(ws.state()).unwrap()).unwrap();
    document["participants"]["ana"]["role"] = json!("wizard");
    fs::write(ws.state(), serde_json::to_vec(&document).unwrap()).unwrap();

    let output = ws.run(&["log", "data-pipeline"]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("warning: skipped participants[ana]"));
    assert!(stderr.contains("dropped on the next save"));

    // A mutating command rewrites the document without the skipped record.
    let output = ws.run(&["revise", "data-pipeline"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("save the state without it"));
    let saved: Value = serde_json::from_slice(&fs::read(ws.state()).unwrap()).unwrap();
    assert!(saved["participants"].get("ana").is_none());
    assert!(saved["participants"].get("bo").is_some());
}
