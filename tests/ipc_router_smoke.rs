use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_classportald");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classportald");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(
        health
            .get("result")
            .and_then(|r| r.get("loaded"))
            .and_then(|v| v.as_bool()),
        Some(false)
    );

    let _ = request(&mut stdin, &mut reader, "2", "workspace.loadDemo", json!({}));
    let _ = request(&mut stdin, &mut reader, "3", "config.get", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "4",
        "config.update",
        json!({ "patch": { "announcementLimit": 10 } }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "5",
        "scores.normalize",
        json!({ "records": [] }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "6",
        "calc.subjectAverage",
        json!({ "studentId": "s1", "subjectId": "math", "records": [] }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "calc.studentSummary",
        json!({ "studentId": "s1", "records": [] }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "behavior.grouped",
        json!({ "notes": [] }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "roster.list",
        json!({ "classId": "c1" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "announcements.recent",
        json!({}),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "assessments.upcoming",
        json!({ "classId": "c1", "now": "2026-03-01T00:00:00Z" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "12",
        "dashboard.student",
        json!({ "studentId": "s1", "now": "2026-03-01T00:00:00Z" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "13",
        "dashboard.parentOverview",
        json!({ "childIds": ["s1", "s2"] }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "14",
        "dashboard.teacherClass",
        json!({ "classId": "c1", "now": "2026-03-01T00:00:00Z" }),
    );

    // Unknown methods fall through to the router's not_implemented answer.
    let payload = json!({ "id": "15", "method": "workspace.not.a.method", "params": {} });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let unknown: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response");
    assert_eq!(unknown.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        unknown
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    drop(stdin);
    let _ = child.wait();
}
