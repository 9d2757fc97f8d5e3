use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendd");
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
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn create_mints_sequential_ids_and_resorts_roster() {
    let workspace = temp_dir("attendd-students-create");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let listed = request_ok(&mut stdin, &mut reader, "2", "students.list", json!({}));
    let seed = listed
        .get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("students array");
    assert_eq!(seed.len(), 10);
    assert_eq!(seed[0].get("id").and_then(|v| v.as_str()), Some("S001"));
    assert_eq!(
        seed[0].get("name").and_then(|v| v.as_str()),
        Some("Aarav Sharma")
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "name": "Zara Khan", "enrollmentId": "E24011", "division": "A" }),
    );
    let student = created.get("student").cloned().expect("created student");
    assert_eq!(student.get("id").and_then(|v| v.as_str()), Some("S011"));
    assert_eq!(
        student.get("name").and_then(|v| v.as_str()),
        Some("Zara Khan")
    );
    assert_eq!(
        student.get("enrollmentId").and_then(|v| v.as_str()),
        Some("E24011")
    );
    assert_eq!(student.get("division").and_then(|v| v.as_str()), Some("A"));

    // Counter keeps climbing off the highest S-suffix, not the list length.
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "name": "Om Verma", "enrollmentId": "E24012", "division": "B" }),
    );
    assert_eq!(
        second
            .get("student")
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_str()),
        Some("S012")
    );

    let after = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({}));
    let roster = after
        .get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("students array");
    assert_eq!(roster.len(), 12);
    let names: Vec<&str> = roster
        .iter()
        .filter_map(|s| s.get("name").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(names.len(), 12);
    assert!(
        names.windows(2).all(|w| w[0] <= w[1]),
        "roster should list alphabetically after a create: {:?}",
        names
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn create_rejects_bad_input_and_duplicate_enrollment() {
    let workspace = temp_dir("attendd-students-validate");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let short_name = request(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "Z", "enrollmentId": "E24050", "division": "A" }),
    );
    assert_eq!(short_name.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&short_name), "bad_params");

    // Whitespace padding does not rescue a one-character name.
    let padded = request(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "name": "  Z  ", "enrollmentId": "E24050", "division": "A" }),
    );
    assert_eq!(error_code(&padded), "bad_params");

    let missing_enrollment = request(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "name": "Zara Khan", "division": "A" }),
    );
    assert_eq!(error_code(&missing_enrollment), "bad_params");

    let blank_division = request(
        &mut stdin,
        &mut reader,
        "5",
        "students.create",
        json!({ "name": "Zara Khan", "enrollmentId": "E24050", "division": "   " }),
    );
    assert_eq!(error_code(&blank_division), "bad_params");

    // Seed roster already holds E24001; the clash check ignores case.
    let duplicate = request(
        &mut stdin,
        &mut reader,
        "6",
        "students.create",
        json!({ "name": "Another Kid", "enrollmentId": "e24001", "division": "B" }),
    );
    assert_eq!(duplicate.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(error_code(&duplicate), "already_exists");
    assert_eq!(
        duplicate
            .get("error")
            .and_then(|e| e.get("details"))
            .and_then(|d| d.get("enrollmentId"))
            .and_then(|v| v.as_str()),
        Some("e24001")
    );

    // Nothing above should have touched the roster.
    let listed = request_ok(&mut stdin, &mut reader, "7", "students.list", json!({}));
    assert_eq!(
        listed
            .get("students")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(10)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
