use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::{Value, json};

const TREE: &str = r#"{
    "kind": "group",
    "children": [
        { "name": "app-name", "kind": "text", "default": "demo" },
        {
            "name": "capability",
            "kind": "single_select",
            "options": ["tab", "bot"],
            "default": "bot",
            "children": [
                {
                    "name": "bot-id",
                    "kind": "text",
                    "default": "$parent",
                    "condition": { "string": { "equals": "bot" } }
                },
                {
                    "name": "tab-url",
                    "kind": "text",
                    "condition": { "string": { "equals": "tab" } }
                }
            ]
        },
        { "name": "region", "kind": "single_select", "options": ["westus"], "skip_single_option": true }
    ]
}"#;

fn stepwise(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("stepwise").unwrap();
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn check_counts_questions() {
    let dir = TempDir::new().unwrap();
    dir.child("tree.json").write_str(TREE).unwrap();

    stepwise(&dir)
        .args(["check", "--tree", "tree.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5 question(s)"));
}

#[test]
fn check_rejects_duplicate_names() {
    let dir = TempDir::new().unwrap();
    dir.child("tree.json")
        .write_str(r#"{ "kind": "group", "children": [
            { "name": "dup", "kind": "text" },
            { "name": "dup", "kind": "number" }
        ] }"#)
        .unwrap();

    stepwise(&dir)
        .args(["check", "--tree", "tree.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("'dup' is used more than once"));
}

#[test]
fn answer_with_defaults_prints_answers() {
    let dir = TempDir::new().unwrap();
    dir.child("tree.json").write_str(TREE).unwrap();

    let output = stepwise(&dir)
        .args(["answer", "--tree", "tree.json", "--accept-defaults"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let answers: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        answers,
        json!({
            "app-name": "demo",
            "capability": "bot",
            "bot-id": "bot",
            "region": "westus"
        })
    );
}

#[test]
fn preseeded_answers_are_kept_and_written_to_out() {
    let dir = TempDir::new().unwrap();
    dir.child("tree.json").write_str(TREE).unwrap();
    dir.child("seed.json")
        .write_str(r#"{ "capability": "tab", "tab-url": "https://contoso.example" }"#)
        .unwrap();

    stepwise(&dir)
        .args([
            "answer",
            "--tree",
            "tree.json",
            "--answers",
            "seed.json",
            "--out",
            "out/answers.json",
            "--accept-defaults",
            "--pretty",
        ])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written = std::fs::read_to_string(dir.child("out/answers.json").path()).unwrap();
    assert!(written.contains('\n'));
    let answers: Value = serde_json::from_str(&written).unwrap();
    assert_eq!(answers["capability"], json!("tab"));
    assert_eq!(answers["tab-url"], json!("https://contoso.example"));
    assert_eq!(answers["app-name"], json!("demo"));
    assert!(answers.get("bot-id").is_none());
}

#[test]
fn answer_without_defaults_needs_interaction() {
    let dir = TempDir::new().unwrap();
    dir.child("tree.json").write_str(TREE).unwrap();

    stepwise(&dir)
        .args(["answer", "--tree", "tree.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("question 'app-name' needs interactive input"));
}

#[test]
fn config_file_enables_defaults() {
    let dir = TempDir::new().unwrap();
    dir.child("tree.json").write_str(TREE).unwrap();
    dir.child("stepwise.toml")
        .write_str("accept_defaults = true\nlog_filter = \"warn\"\n")
        .unwrap();

    stepwise(&dir)
        .args(["answer", "--tree", "tree.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""region":"westus""#));
}

#[test]
fn answers_must_be_an_object() {
    let dir = TempDir::new().unwrap();
    dir.child("tree.json").write_str(TREE).unwrap();
    dir.child("seed.json").write_str("[1, 2]").unwrap();

    stepwise(&dir)
        .args(["answer", "--tree", "tree.json", "--answers", "seed.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("answers must be a JSON object"));
}

#[test]
fn remote_functions_need_preseeded_answers() {
    let dir = TempDir::new().unwrap();
    dir.child("tree.json")
        .write_str(r#"{ "name": "resource-id", "kind": "remote_func", "method": "provision" }"#)
        .unwrap();

    stepwise(&dir)
        .args(["answer", "--tree", "tree.json", "--accept-defaults"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("needs a remote function executor"));

    dir.child("seed.json")
        .write_str(r#"{ "resource-id": "r-1" }"#)
        .unwrap();
    stepwise(&dir)
        .args(["answer", "--tree", "tree.json", "--answers", "seed.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""resource-id":"r-1""#));
}
