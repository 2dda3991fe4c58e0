//! CLI integration tests: run the `plcsync` binary against a project file in
//! a temporary directory and inspect its JSON output.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde_json::Value;
use tempfile::TempDir;

use plcsync::flow::{FlowGraph, Node, Rung};
use plcsync::project::{BodyLanguage, Pou, PouKind, Project};
use plcsync::types::{BaseType, Variable, VariableClass, VariableType};

// ============================================================================
// Helpers
// ============================================================================

fn fixture() -> (TempDir, PathBuf) {
    let start = Variable::local("Start", BaseType::Bool);
    let lamp = Variable::local("Lamp", BaseType::Bool);
    let mut project = Project::new("plant");
    project.pous.push(
        Pou::new("Main", PouKind::Program, BodyLanguage::Ld)
            .with_variables(vec![start.clone(), lamp.clone()]),
    );
    project.global_variables.push(Variable::new(
        "Alarm",
        VariableType::base(BaseType::Bool),
        VariableClass::Global,
    ));
    project.flows.push(FlowGraph::ladder(
        "Main",
        vec![Rung::new(
            "r1",
            vec![Node::contact("n1", start), Node::coil("n2", lamp)],
        )],
    ));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.json");
    fs::write(&path, serde_json::to_string_pretty(&project).unwrap()).unwrap();
    (dir, path)
}

fn plcsync(project: &Path, args: &[&str], stdin: Option<&str>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_plcsync"))
        .arg("--project")
        .arg(project)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("PLCSYNC_RENAME_MATCHER")
        .env_remove("PLCSYNC_PROPAGATE")
        .env_remove("PLCSYNC_TREE_MAX_DEPTH")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    {
        let mut input = child.stdin.take().unwrap();
        if let Some(text) = stdin {
            input.write_all(text.as_bytes()).unwrap();
        }
    }
    child.wait_with_output().unwrap()
}

fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

fn reload(path: &Path) -> Project {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

// ============================================================================
// Commands
// ============================================================================

#[test]
fn tree_lists_program_variables() {
    let (_dir, path) = fixture();
    let output = plcsync(&path, &["tree"], None);
    assert!(output.status.success());
    let value = json(&output);
    assert_eq!(value["status"], "ok");
    assert_eq!(value["roots"][0]["id"], "pou-Main");
    assert_eq!(value["roots"][0]["children"][0]["id"], "Main-Start");
    assert_eq!(value["roots"][1]["id"], "global-variables");
}

#[test]
fn commit_with_yes_relinks_and_saves() {
    let (_dir, path) = fixture();
    let decls = r#"[{"name": "Run", "type": "BOOL"}, {"name": "Lamp", "type": "BOOL"}]"#;
    let output = plcsync(&path, &["commit", "--pou", "Main", "--yes"], Some(decls));
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stdout));
    let value = json(&output);
    assert_eq!(value["propagated"], true);
    assert_eq!(value["renames"][0]["oldName"], "Start");

    let project = reload(&path);
    let (_, n1) = project.flows[0].find_node("n1").unwrap();
    assert_eq!(n1.binding.name(), Some("Run"));
    assert!(n1.binding.is_bound());
}

#[test]
fn piped_commit_uses_non_interactive_default() {
    let (dir, path) = fixture();
    fs::write(
        dir.path().join("plcsync.json"),
        r#"{"propagateWhenNonInteractive": false}"#,
    )
    .unwrap();
    let decls = r#"[{"name": "Run", "type": "BOOL"}, {"name": "Lamp", "type": "BOOL"}]"#;
    let output = plcsync(&path, &["commit", "--pou", "Main"], Some(decls));
    assert!(output.status.success());
    assert_eq!(json(&output)["propagated"], false);

    let project = reload(&path);
    let (_, n1) = project.flows[0].find_node("n1").unwrap();
    assert!(n1.binding.is_broken());
    assert_eq!(n1.binding.name(), Some("Start"));
}

#[test]
fn dry_run_leaves_file_untouched() {
    let (_dir, path) = fixture();
    let before = fs::read_to_string(&path).unwrap();
    let output = plcsync(
        &path,
        &["rename", "--pou", "Main", "--from", "Lamp", "--to", "Light", "--yes", "--dry-run"],
        None,
    );
    assert!(output.status.success());
    assert_eq!(json(&output)["dryRun"], true);
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn check_type_reports_incompatible_coil() {
    let (_dir, path) = fixture();
    let output = plcsync(
        &path,
        &["check-type", "--pou", "Main", "--var", "Lamp", "--type", "INT"],
        None,
    );
    assert!(output.status.success());
    let value = json(&output);
    assert_eq!(value["report"]["incompatibleCount"], 1);
    assert_eq!(value["report"]["canChange"], true);
}

#[test]
fn refs_counts_graphical_uses() {
    let (_dir, path) = fixture();
    let output = plcsync(&path, &["refs", "--pou", "Main", "--var", "start"], None);
    assert!(output.status.success());
    assert_eq!(json(&output)["totalReferences"], 1);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn syntax_error_exits_with_code_5() {
    let (_dir, path) = fixture();
    let before = fs::read_to_string(&path).unwrap();
    let output = plcsync(&path, &["commit", "--pou", "Main", "--yes"], Some("[{"));
    assert_eq!(output.status.code(), Some(5));
    let value = json(&output);
    assert_eq!(value["status"], "error");
    assert_eq!(value["error"]["code"], 5);
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn rejected_commit_exits_with_code_4() {
    let (_dir, path) = fixture();
    let decls = r#"[{"name": "A", "type": "BOOL"}, {"name": "a", "type": "INT"}]"#;
    let output = plcsync(&path, &["commit", "--pou", "Main", "--no"], Some(decls));
    assert_eq!(output.status.code(), Some(4));
    assert_eq!(json(&output)["error"]["code"], 4);
}

#[test]
fn unknown_pou_exits_with_code_3() {
    let (_dir, path) = fixture();
    let output = plcsync(&path, &["sync", "--pou", "Ghost"], None);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn missing_scope_is_invalid_arguments() {
    let (_dir, path) = fixture();
    let output = plcsync(&path, &["refs", "--var", "Start"], None);
    assert_eq!(output.status.code(), Some(2));
}
