use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn context_cmd() -> Command {
    let mut cmd = Command::cargo_bin("context").expect("binary");
    cmd.arg("--quiet");
    cmd
}

fn run_json(root: &Path, args: &[&str]) -> Value {
    let output = context_cmd()
        .current_dir(root)
        .args(args)
        .arg("--json")
        .output()
        .expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn setup_repo() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("node_modules/dep")).unwrap();
    fs::write(
        root.join("src/app.ts"),
        "import { login } from './auth';\n\nexport function main() {\n  login();\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("src/auth.ts"),
        "export function login() {\n  return true;\n}\n",
    )
    .unwrap();
    fs::write(root.join("src/util.ts"), "export const answer = 42;\n").unwrap();
    fs::write(root.join("node_modules/dep/index.js"), "module.exports = 1;\n").unwrap();
    fs::write(root.join("README.md"), "# demo\n").unwrap();
    temp
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|item| item.as_str().expect("string").to_string())
        .collect()
}

#[test]
fn scan_lists_candidates_and_skips_excluded_dirs() {
    let temp = setup_repo();
    let body = run_json(temp.path(), &["scan", "."]);
    assert_eq!(
        string_list(&body["files"]),
        vec!["README.md", "src/app.ts", "src/auth.ts", "src/util.ts"]
    );
    assert_eq!(body["stats"]["files"], 4);
}

#[test]
fn rank_puts_active_file_and_its_imports_first() {
    let temp = setup_repo();
    let body = run_json(
        temp.path(),
        &["rank", ".", "--active", "src/app.ts", "--query", "login"],
    );
    let ranked: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .map(|scored| scored["path"].as_str().expect("path"))
        .collect();
    assert_eq!(&ranked[..2], &["src/app.ts", "src/auth.ts"]);
}

#[test]
fn commands_lists_the_allow_list() {
    context_cmd()
        .arg("commands")
        .assert()
        .success()
        .stdout(predicate::str::contains("grep"))
        .stdout(predicate::str::contains("rm").not());
}

#[test]
fn exec_denies_destructive_commands() {
    let temp = setup_repo();
    context_cmd()
        .current_dir(temp.path())
        .args(["exec", "--", "rm", "-rf", "/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Command denied"));
    assert!(temp.path().join("src/app.ts").exists());
}

#[test]
fn exec_dry_run_shows_rewritten_grep() {
    let temp = setup_repo();
    context_cmd()
        .current_dir(temp.path())
        .args(["exec", "--dry-run", "--", "grep", "-r", "TODO", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("--exclude-dir=node_modules"));
}

#[cfg(unix)]
#[test]
fn exec_runs_read_only_pipelines() {
    let temp = setup_repo();
    context_cmd()
        .current_dir(temp.path())
        .args(["exec", "--", "grep", "-rl", "login", "src", "|", "sort"])
        .assert()
        .success()
        .stdout(predicate::str::contains("src/app.ts\nsrc/auth.ts"));
}

#[cfg(unix)]
#[test]
fn pack_follows_a_scripted_agent() {
    let temp = setup_repo();
    let root = temp.path();
    let script = json!({
        "supports_tools": true,
        "responses": [
            {"type": "tool_call", "name": "investigate", "arguments": {"command": "grep -rl login src"}},
            {"type": "tool_call", "name": "finish", "arguments": {"files": ["src/auth.ts:1-2"]}}
        ]
    });
    fs::write(root.join("script.json"), script.to_string()).unwrap();

    let body = run_json(
        root,
        &[
            "pack",
            ".",
            "--query",
            "how does login work",
            "--active",
            "src/app.ts",
            "--model-script",
            "script.json",
        ],
    );
    assert_eq!(body["selection_source"], "agent");
    assert_eq!(body["turns_used"], 2);
    assert_eq!(
        string_list(&body["included_paths"]),
        vec!["src/app.ts", "src/auth.ts"]
    );
    let prompt = body["prompt"].as_str().unwrap();
    assert!(prompt.contains("### src/auth.ts (lines 1-2)"));
    assert!(prompt.contains("## Existing paths"));
}

#[test]
fn pack_without_model_uses_heuristics_under_budget() {
    let temp = setup_repo();
    let body = run_json(
        temp.path(),
        &["pack", ".", "--active", "src/app.ts", "--max-chars", "400"],
    );
    assert_eq!(body["selection_source"], "fallback");
    let prompt = body["prompt"].as_str().unwrap();
    assert!(prompt.chars().count() <= 400);
    assert!(body["metrics"]["candidate_count"].as_u64().unwrap() >= 4);
}

#[test]
fn pack_reads_config_from_workspace() {
    let temp = setup_repo();
    let root = temp.path();
    fs::create_dir_all(root.join(".context")).unwrap();
    fs::write(
        root.join(".context/config.toml"),
        "[agent]\nenabled = false\n\n[relevance]\nmax_candidates = 1\n",
    )
    .unwrap();
    let script = json!({"responses": [
        {"type": "tool_call", "name": "finish", "arguments": {"files": ["src/util.ts"]}}
    ]});
    fs::write(root.join("script.json"), script.to_string()).unwrap();

    let body = run_json(
        root,
        &["pack", ".", "--active", "src/app.ts", "--model-script", "script.json"],
    );
    assert_eq!(body["selection_source"], "fallback");
    assert_eq!(string_list(&body["included_paths"]), vec!["src/app.ts"]);
}

#[test]
fn pack_without_workspace_prints_sentinel() {
    let temp = tempdir().unwrap();
    context_cmd()
        .current_dir(temp.path())
        .args(["pack", "does-not-exist"])
        .assert()
        .success()
        .stdout(predicate::str::diff("No workspace folder is open.\n"));
}
