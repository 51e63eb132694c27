#![forbid(unsafe_code)]

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

const TRACE: &str = r#"# two short sessions
{"type":"navigation","from":"/","to":"/docs","timestamp":0}
{"type":"navigation","from":"/docs","to":"/docs/intro","timestamp":1000}
{"type":"interaction","route":"/docs/intro","timestamp":1500}
{"type":"navigation","from":"/docs/intro","to":"/docs","timestamp":2000}

{"type":"navigation","from":"/docs","to":"/docs/intro","timestamp":3000}
"#;

fn run(state: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_prefetch-rs"))
        .arg("--state")
        .arg(state)
        .args(args)
        .env("PREFETCH_LOG", "off")
        .output()
        .expect("failed to run prefetch-rs")
}

fn json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not json")
}

#[test]
fn replayed_state_is_visible_to_later_commands() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.db");
    let trace = dir.path().join("trace.jsonl");
    std::fs::File::create(&trace)
        .unwrap()
        .write_all(TRACE.as_bytes())
        .unwrap();

    let summary = json(&run(&state, &["replay", trace.to_str().unwrap(), "--json"]));
    assert_eq!(summary["events"], 5);
    assert_eq!(summary["navigations"], 4);
    assert_eq!(summary["edges"], 3);
    assert_eq!(summary["finished"], true);

    let stats = json(&run(&state, &["stats", "--top", "1", "--json"]));
    assert_eq!(stats["edges"], 3);
    assert_eq!(stats["strongest"][0]["from"], "/docs");
    assert_eq!(stats["strongest"][0]["to"], "/docs/intro");

    let prediction = json(&run(&state, &["predict", "/docs", "--json"]));
    assert_eq!(prediction["candidates"][0]["url"], "/docs/intro");
}

#[test]
fn malformed_trace_is_reported_with_its_line() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("broken.jsonl");
    std::fs::write(&trace, "{\"type\":\"navigation\",\"from\":\"/\",\"to\":\"/a\",\"timestamp\":0}\n{oops\n").unwrap();

    let output = run(&dir.path().join("state.db"), &["replay", trace.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 2"));
}
