// Integration tests for the gpilot binary: exit codes, CSV in/out and the
// --json contract.
//
// Run with: cargo test -p gridpilot-cli --test cli_tests

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use httpmock::prelude::*;

fn gpilot() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_gpilot"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    // Keep a real key or log filter from leaking into tests
    cmd.env_remove("GRIDPILOT_OPENAI_KEY");
    cmd.env_remove("GRIDPILOT_LOG");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// An explicit settings file so the user's own settings never apply.
fn settings(dir: &Path, json: &str) -> PathBuf {
    write(dir, "settings.json", json)
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("failed to run gpilot")
}

fn assert_code(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "expected exit {}, got {:?}\nstdout: {}\nstderr: {}",
        code,
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// ===========================================================================
// gpilot apply
// ===========================================================================

#[test]
fn apply_values_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), "{}");
    let input = write(dir.path(), "in.csv", "a,b\nc,d\n");
    let actions = write(
        dir.path(),
        "actions.json",
        r#"[{"type":"values","target":"A1:B2","data":[["x",1],["y",2]]}]"#,
    );
    let out = dir.path().join("out.csv");

    let output = run(gpilot()
        .args(["apply", "--config"])
        .arg(&cfg)
        .arg(&actions)
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&out));

    assert_code(&output, 0);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "x,1\ny,2\n");
    assert!(stdout(&output).contains("Applied 1 of 1 action"), "stdout: {}", stdout(&output));
}

#[test]
fn apply_markup_with_selection_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), "{}");
    let input = write(dir.path(), "in.csv", "1,2\n");
    let reply = write(
        dir.path(),
        "reply.txt",
        "Two steps.\n<action type=\"formula\" target=\"C1\">=A1+B1</action>\n<action type=\"values\" target=\"D1\">oops</action>",
    );

    let output = run(gpilot()
        .args(["apply", "--config"])
        .arg(&cfg)
        .arg(&reply)
        .arg("--input")
        .arg(&input)
        .args(["--output", "-", "--select", "0"]));

    assert_code(&output, 0);
    // The sheet owns stdout; the report goes to stderr
    assert_eq!(stdout(&output), "1,2,=A1+B1\n");
    assert!(stderr(&output).contains("Applied 1 of 1 action"));
}

#[test]
fn apply_failure_exits_5_and_keeps_successes() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), "{}");
    let input = write(dir.path(), "in.csv", "a\nb\n");
    let actions = write(
        dir.path(),
        "actions.json",
        r#"[{"type":"upperCase","target":"A1:A2"},{"type":"fontSize","target":"A1","data":"huge"}]"#,
    );
    let out = dir.path().join("out.csv");

    let output = run(gpilot()
        .args(["apply", "--config"])
        .arg(&cfg)
        .arg(&actions)
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&out));

    assert_code(&output, 5);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "A\nB\n");
    assert!(stderr(&output).contains("Applied 1 of 2 actions (1 failed)"));
}

#[test]
fn apply_atomic_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), "{}");
    let input = write(dir.path(), "in.csv", "a\nb\n");
    let actions = write(
        dir.path(),
        "actions.json",
        r#"[{"type":"upperCase","target":"A1:A2"},{"type":"transpose","target":"C1"}]"#,
    );
    let out = dir.path().join("out.csv");

    let output = run(gpilot()
        .args(["apply", "--config"])
        .arg(&cfg)
        .arg(&actions)
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .args(["--policy", "atomic"]));

    assert_code(&output, 5);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "a\nb\n");
    assert!(stdout(&output).contains("rolled back"));
}

#[test]
fn apply_policy_from_settings() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), r#"{ "batch.policy": "stop" }"#);
    let actions = write(
        dir.path(),
        "actions.json",
        r#"[{"type":"transpose","target":"C1"},{"type":"values","target":"A1","data":"1"}]"#,
    );
    let out = dir.path().join("out.csv");

    let output = run(gpilot()
        .args(["apply", "--config"])
        .arg(&cfg)
        .arg(&actions)
        .arg("--output")
        .arg(&out));

    assert_code(&output, 5);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "");
    assert!(stdout(&output).contains("1 skipped"));
}

#[test]
fn apply_then_undo_restores_input() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), "{}");
    let input = write(dir.path(), "in.csv", "a,b\n");
    let actions = write(dir.path(), "actions.json", r#"[{"type":"values","target":"A1","data":"z"}]"#);
    let out = dir.path().join("out.csv");

    let output = run(gpilot()
        .args(["apply", "--config"])
        .arg(&cfg)
        .arg(&actions)
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .args(["--undo", "1"]));

    assert_code(&output, 0);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "a,b\n");
    assert!(stdout(&output).contains("undone"));
}

#[test]
fn apply_json_is_one_value() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), "{}");
    let actions = write(
        dir.path(),
        "actions.json",
        r#"{"type":"values","target":"A1","data":"7"}"#,
    );

    let output = run(gpilot().args(["apply", "--config"]).arg(&cfg).arg(&actions).arg("--json"));

    assert_code(&output, 0);
    let val: serde_json::Value = serde_json::from_str(stdout(&output).trim()).expect("stdout must be JSON");
    assert_eq!(val["summary"], "Applied 1 of 1 action");
    assert_eq!(val["policy"], "continue");
    assert_eq!(val["results"][0]["outcome"], "applied");
    assert!(val["results"][0]["historyId"].is_string());
    assert_eq!(val["history"].as_array().unwrap().len(), 1);
    assert_eq!(val["history"][0]["type"], "values");
}

#[test]
fn apply_usage_parse_and_io_errors() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), "{}");

    let bad_json = write(dir.path(), "bad.json", r#"[{"target":"A1"}]"#);
    let output = run(gpilot().args(["apply", "--config"]).arg(&cfg).arg(&bad_json));
    assert_code(&output, 4);

    let no_actions = write(dir.path(), "empty.txt", "Just words, no tags.");
    let output = run(gpilot().args(["apply", "--config"]).arg(&cfg).arg(&no_actions));
    assert_code(&output, 4);

    let output = run(gpilot().args(["apply", "--config"]).arg(&cfg).arg(dir.path().join("missing.json")));
    assert_code(&output, 3);

    let one = write(dir.path(), "one.json", r#"[{"type":"bold","target":"A1"}]"#);
    let output = run(gpilot().args(["apply", "--config"]).arg(&cfg).arg(&one).args(["--select", "3"]));
    assert_code(&output, 2);
    assert!(stderr(&output).contains("out of range"));
}

#[test]
fn bad_settings_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write(dir.path(), "settings.toml", "history.capacity = [");
    let output = run(gpilot().args(["catalog", "--config"]).arg(&cfg));
    // catalog does not read settings
    assert_code(&output, 0);

    let actions = write(dir.path(), "a.json", r#"[{"type":"bold","target":"A1"}]"#);
    let output = run(gpilot().args(["apply", "--config"]).arg(&cfg).arg(&actions));
    assert_code(&output, 4);
}

// ===========================================================================
// gpilot parse / catalog / classify
// ===========================================================================

#[test]
fn parse_stdin_json() {
    let mut child = gpilot()
        .args(["parse", "-", "--json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"Hi.\n<action type=\"chart\" target=\"A1:B5\" chartType=\"pie\"/><action target=\"A1\"/>")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert_code(&output, 0);
    let val: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(val["explanation"], "Hi.");
    assert_eq!(val["skipped"], 1);
    assert_eq!(val["actions"][0]["type"], "chart");
    assert_eq!(val["actions"][0]["chartType"], "pie");
}

#[test]
fn catalog_json_lists_kinds() {
    let output = run(gpilot().args(["catalog", "--json"]));
    assert_code(&output, 0);
    let val: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    let kinds = val.as_array().unwrap();
    assert!(kinds.len() > 50);
    assert!(kinds.iter().any(|k| k["tag"] == "chart" && k["undo"] == "none"));
}

#[test]
fn classify_prints_task() {
    let output = run(gpilot().args(["classify", "make", "a", "bar", "chart"]));
    assert_code(&output, 0);
    assert!(stdout(&output).starts_with("chart"));

    let output = run(gpilot().args(["classify", "sort by date", "--json"]));
    let val: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(val["task"], "sort_filter");
}

// ===========================================================================
// gpilot ask
// ===========================================================================

#[test]
fn ask_disabled_exits_10() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), "{}");
    let output = run(gpilot().args(["ask", "bold the header", "--config"]).arg(&cfg));
    assert_code(&output, 10);
    assert!(stderr(&output).contains("AI not configured"));
}

#[test]
fn ask_missing_key_exits_11() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), r#"{ "ai": { "provider": "openai" } }"#);
    let output = run(gpilot().args(["ask", "bold the header", "--config"]).arg(&cfg));
    assert_code(&output, 11);
    assert!(stderr(&output).contains("GRIDPILOT_OPENAI_KEY"));
}

#[test]
fn ask_applies_reply_with_yes() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-test")
            .body_includes("used range A1:B2");
        then.status(200).json_body(serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Adding a label.\n<action type=\"values\" target=\"C1\">\"total\"</action>"
                },
                "finish_reason": "stop"
            }]
        }));
    });

    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), r#"{ "ai": { "provider": "openai", "model": "test-model" } }"#);
    let input = write(dir.path(), "in.csv", "a,b\n1,2\n");
    let out = dir.path().join("out.csv");

    let output = run(gpilot()
        .args(["ask", "label column C", "--yes", "--config"])
        .arg(&cfg)
        .arg("--endpoint")
        .arg(server.url("/v1"))
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .env("GRIDPILOT_OPENAI_KEY", "sk-test"));

    mock.assert();
    assert_code(&output, 0);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "a,b,total\n1,2,\n");
    assert!(stdout(&output).contains("Adding a label."));
}

#[test]
fn ask_without_yes_only_previews() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(serde_json::json!({
            "choices": [{ "message": { "content": "<action type=\"bold\" target=\"A1\"></action>" } }]
        }));
    });

    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), r#"{ "ai": { "provider": "local" } }"#);
    let out = dir.path().join("out.csv");

    let output = run(gpilot()
        .args(["ask", "bold A1", "--json", "--config"])
        .arg(&cfg)
        .arg("--endpoint")
        .arg(server.base_url())
        .arg("--output")
        .arg(&out));

    assert_code(&output, 0);
    assert!(!out.exists());
    let val: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(val["task"], "formatting");
    assert_eq!(val["actions"][0]["type"], "bold");
    assert!(val.get("report").is_none());
}

#[test]
fn ask_api_error_exits_12() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(500).body("upstream exploded");
    });

    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), r#"{ "ai": { "provider": "local" } }"#);
    let output = run(gpilot()
        .args(["ask", "anything", "--config"])
        .arg(&cfg)
        .arg("--endpoint")
        .arg(server.base_url()));

    assert_code(&output, 12);
    assert!(stderr(&output).contains("API error (500): upstream exploded"));
}

// ===========================================================================
// gpilot config
// ===========================================================================

#[test]
fn config_set_provider_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("fresh").join("settings.json");

    let output = run(gpilot()
        .args(["config", "set-provider", "local", "--model", "qwen2.5", "--endpoint", "http://127.0.0.1:9/v1/"])
        .arg("--config")
        .arg(&cfg));
    assert_code(&output, 0);
    assert!(stdout(&output).contains("ai.provider = local"));

    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&cfg).unwrap()).unwrap();
    assert_eq!(saved["ai"]["provider"], "local");
    assert_eq!(saved["ai"]["model"], "qwen2.5");
    assert_eq!(saved["history.capacity"], 20);

    let output = run(gpilot().args(["config", "show", "--json", "--config"]).arg(&cfg));
    assert_code(&output, 0);
    let val: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(val["status"], "ready");
    assert_eq!(val["provider"], "local");
    assert_eq!(val["model"], "qwen2.5");
    assert_eq!(val["endpoint"], "http://127.0.0.1:9/v1");
    assert_eq!(val["key_source"], "none");
}

#[test]
fn config_set_provider_keeps_other_settings() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = settings(dir.path(), r#"{ "history.capacity": 7, "batch.policy": "atomic" }"#);

    let output = run(gpilot().args(["config", "set-provider", "OpenAI", "--config"]).arg(&cfg));
    assert_code(&output, 0);

    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&cfg).unwrap()).unwrap();
    assert_eq!(saved["ai"]["provider"], "openai");
    assert_eq!(saved["history.capacity"], 7);
    assert_eq!(saved["batch.policy"], "atomic");
}

#[test]
fn config_set_provider_rejects_unknown_and_toml() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("settings.json");
    let output = run(gpilot().args(["config", "set-provider", "gemini", "--config"]).arg(&cfg));
    assert_code(&output, 2);
    assert!(!cfg.exists());

    let toml = write(dir.path(), "settings.toml", "\"history.capacity\" = 4\n");
    let output = run(gpilot().args(["config", "set-provider", "local", "--config"]).arg(&toml));
    assert_code(&output, 2);
    assert_eq!(std::fs::read_to_string(&toml).unwrap(), "\"history.capacity\" = 4\n");
}

#[test]
fn config_show_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let disabled = settings(dir.path(), "{}");
    let output = run(gpilot().args(["config", "show", "--config"]).arg(&disabled));
    assert_code(&output, 10);
    assert!(stdout(&output).contains("provider:   none"));

    let openai = write(dir.path(), "openai.json", r#"{ "ai": { "provider": "openai" } }"#);
    let output = run(gpilot().args(["config", "show", "--json", "--config"]).arg(&openai));
    assert_code(&output, 11);
    let val: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(val["key"], "missing");
    assert!(stderr(&output).contains("GRIDPILOT_OPENAI_KEY"));

    let output = run(gpilot()
        .args(["config", "show", "--json", "--config"])
        .arg(&openai)
        .env("GRIDPILOT_OPENAI_KEY", "sk-test"));
    assert_code(&output, 0);
    let val: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(val["key"], "present");
    assert_eq!(val["key_source"], "environment");
}

#[test]
fn config_path_echoes_explicit_file() {
    let output = run(gpilot().args(["config", "path", "--config", "/tmp/elsewhere.json"]));
    assert_code(&output, 0);
    assert_eq!(stdout(&output).trim(), "/tmp/elsewhere.json");

    let output = run(gpilot().args(["config", "path"]));
    assert_code(&output, 0);
    assert!(stdout(&output).trim().ends_with("settings.json"));
}

#[cfg(not(feature = "keychain"))]
#[test]
fn config_set_key_without_keychain_points_at_env() {
    let mut child = gpilot()
        .args(["config", "set-key", "openai"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"sk-test\n").unwrap();
    let output = child.wait_with_output().unwrap();

    assert_code(&output, 1);
    assert!(stderr(&output).contains("Keychain support not enabled"));
    assert!(stderr(&output).contains("GRIDPILOT_OPENAI_KEY"));
}

#[test]
fn config_set_key_rejects_keyless_provider() {
    let output = run(gpilot().args(["config", "set-key", "local"]).stdin(Stdio::null()));
    assert_code(&output, 2);
    assert!(stderr(&output).contains("local takes no API key"));
}
