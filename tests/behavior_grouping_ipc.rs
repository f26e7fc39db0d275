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

fn request_ok(
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
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn note(id: &str, student: &str, level: &str, created_at: &str) -> serde_json::Value {
    json!({
        "id": id,
        "studentId": student,
        "level": level,
        "note": "observed",
        "createdAt": created_at
    })
}

#[test]
fn latest_note_and_level_tally_for_one_student() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // Jan 1 Good, Jan 5 Poor, Jan 3 Excellent: latest is the Poor note.
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "behavior.grouped",
        json!({
            "notes": [
                note("n1", "S1", "Good", "2026-01-01T09:00:00Z"),
                note("n2", "S1", "Poor", "2026-01-05T09:00:00Z"),
                note("n3", "S1", "Excellent", "2026-01-03T09:00:00Z")
            ]
        }),
    );
    let groups = result.get("groups").and_then(|v| v.as_array()).expect("groups");
    assert_eq!(groups.len(), 1);
    let g = &groups[0];
    assert_eq!(g.get("noteCount").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(
        g.get("latest")
            .and_then(|l| l.get("level"))
            .and_then(|v| v.as_str()),
        Some("Poor")
    );
    let counts = g.get("counts").expect("counts");
    assert_eq!(counts.get("good").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(counts.get("poor").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(counts.get("excellent").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(counts.get("fair").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(counts.get("needsImprovement").and_then(|v| v.as_u64()), Some(0));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn empty_note_list_returns_an_empty_group_list() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "behavior.grouped",
        json!({ "notes": [] }),
    );
    let groups = result.get("groups").and_then(|v| v.as_array()).expect("groups");
    assert!(groups.is_empty());

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_levels_are_reported_and_kept_out_of_the_tally() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "behavior.grouped",
        json!({
            "notes": [
                note("n1", "S1", "Good", "2026-01-01T09:00:00Z"),
                note("n2", "S1", "Legendary", "2026-01-02T09:00:00Z"),
                note("n3", "S1", "needs improvement", "2026-01-03T09:00:00Z")
            ]
        }),
    );
    let groups = result.get("groups").and_then(|v| v.as_array()).expect("groups");
    assert_eq!(groups.len(), 1);
    let g = &groups[0];
    // Tally, notes list and noteCount stay mutually consistent.
    assert_eq!(g.get("noteCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(
        g.get("notes").and_then(|v| v.as_array()).map(|v| v.len()),
        Some(2)
    );
    let counts = g.get("counts").expect("counts");
    let sum = ["excellent", "good", "fair", "needsImprovement", "poor"]
        .iter()
        .map(|k| counts.get(*k).and_then(|v| v.as_u64()).unwrap_or(0))
        .sum::<u64>();
    assert_eq!(sum, 2);

    let skipped = result.get("skipped").and_then(|v| v.as_array()).expect("skipped");
    assert_eq!(skipped.len(), 1);
    assert_eq!(
        skipped[0].get("code").and_then(|v| v.as_str()),
        Some("bad_level")
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn exact_timestamp_tie_keeps_the_first_encountered_note() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "behavior.grouped",
        json!({
            "notes": [
                note("n1", "S1", "Good", "2026-01-04T09:00:00Z"),
                note("n2", "S1", "Poor", "2026-01-04T09:00:00Z")
            ]
        }),
    );
    let groups = result.get("groups").and_then(|v| v.as_array()).expect("groups");
    assert_eq!(
        groups[0]
            .get("latest")
            .and_then(|l| l.get("id"))
            .and_then(|v| v.as_str()),
        Some("n1")
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn groups_order_by_most_recent_note_first() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "behavior.grouped",
        json!({
            "notes": [
                note("n1", "S1", "Good", "2026-01-02T09:00:00Z"),
                note("n2", "S2", "Fair", "2026-01-08T09:00:00Z"),
                note("n3", "S3", "Poor", "2026-01-05T09:00:00Z")
            ]
        }),
    );
    let groups = result.get("groups").and_then(|v| v.as_array()).expect("groups");
    let ids: Vec<&str> = groups
        .iter()
        .filter_map(|g| g.get("studentId").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(ids, vec!["S2", "S3", "S1"]);

    drop(stdin);
    let _ = child.wait();
}
