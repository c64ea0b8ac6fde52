#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
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

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_tabformatd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn tabformatd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
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
    let value: Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: Value,
) -> Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(Value::Null)
}

pub fn error_code(value: &Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

pub fn editor_session() -> Value {
    json!({ "userId": 7, "canUpdateCourse": true })
}

pub fn student_session() -> Value {
    json!({ "userId": 8, "canUpdateCourse": false })
}

/// Opens a fresh workspace and creates a course with sections `0..=sections`.
/// Returns the course id and the section ids indexed by section number.
pub fn setup_course(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
    sections: u32,
) -> (PathBuf, i64, Vec<i64>) {
    let workspace = temp_dir(prefix);
    request_ok(
        stdin,
        reader,
        "setup-ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let created = request_ok(
        stdin,
        reader,
        "setup-course",
        "courses.create",
        json!({ "name": "Biology 11", "sections": sections }),
    );
    let course_id = created["courseId"].as_i64().expect("courseId");
    let ids = section_ids(stdin, reader, course_id);
    (workspace, course_id, ids)
}

pub fn section_ids(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    course_id: i64,
) -> Vec<i64> {
    let listed = request_ok(
        stdin,
        reader,
        "list-sections",
        "sections.list",
        json!({ "courseId": course_id }),
    );
    listed["sections"]
        .as_array()
        .expect("sections array")
        .iter()
        .map(|s| s["id"].as_i64().expect("section id"))
        .collect()
}

pub fn view(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    course_id: i64,
) -> Value {
    request_ok(
        stdin,
        reader,
        "view",
        "tabs.view",
        json!({ "courseId": course_id }),
    )["view"]
        .clone()
}

/// The view entry for tab `index`, wherever it sits in the display order.
pub fn tab(view: &Value, index: u64) -> Value {
    view["tabs"]
        .as_array()
        .expect("tabs array")
        .iter()
        .find(|t| t["index"].as_u64() == Some(index))
        .cloned()
        .expect("tab present in view")
}

pub fn ids_of(tab: &Value) -> Vec<i64> {
    tab["sectionIds"]
        .as_array()
        .expect("sectionIds")
        .iter()
        .map(|v| v.as_i64().expect("id"))
        .collect()
}
