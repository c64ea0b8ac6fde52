mod test_support;

use serde_json::json;
use test_support::{editor_session, error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("tabformat-router-smoke");
    let bundle_out = workspace.join("smoke-course.zip");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["workspacePath"].is_null());

    let no_ws = request(&mut stdin, &mut reader, "2", "tabs.view", json!({ "courseId": 1 }));
    assert_eq!(error_code(&no_ws), Some("no_workspace"));

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let cfg = request_ok(&mut stdin, &mut reader, "4", "config.get", json!({}));
    assert_eq!(cfg["config"]["defaultMaxTabs"], 5);

    let course = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "courses.create",
        json!({ "name": "Smoke", "sections": 2 }),
    )["courseId"]
        .as_i64()
        .expect("courseId");

    let session = editor_session();
    let calls = vec![
        ("sections.list", json!({ "courseId": course })),
        ("sections.add", json!({ "courseId": course, "session": session })),
        (
            "sections.update",
            json!({ "courseId": course, "number": 1, "name": "Cells", "session": session }),
        ),
        ("tabs.view", json!({ "courseId": course })),
        (
            "tabs.rename",
            json!({ "courseId": course, "tabIndex": 1, "title": "Week 1", "session": session }),
        ),
        (
            "tabs.reorder",
            json!({ "courseId": course, "sequence": "tab1,tab0", "session": session }),
        ),
        (
            "tabs.swap",
            json!({ "courseId": course, "moved": "tab1", "target": "tab2", "session": session }),
        ),
        (
            "tabs.moveSection",
            json!({ "courseId": course, "tabIndex": 1, "sectionNumber": 2, "session": session }),
        ),
        (
            "tabs.assign",
            json!({ "courseId": course, "tabId": "tab3", "sections": "", "sectionNums": "", "session": session }),
        ),
        (
            "tabs.removeSection",
            json!({ "courseId": course, "sectionNumber": 2, "session": session }),
        ),
        ("tabs.section0", json!({ "courseId": course, "onTop": true, "session": session })),
        ("toggles.set", json!({ "courseId": course, "toggleState": "{}", "session": session })),
        ("toggles.get", json!({ "courseId": course, "session": session })),
        ("sections.delete", json!({ "courseId": course, "number": 3, "session": session })),
        ("config.update", json!({ "patch": { "tabTitlePrefix": "Block" } })),
        ("courses.backup", json!({ "courseId": course, "outPath": bundle_out.to_string_lossy() })),
        ("courses.restore", json!({ "inPath": bundle_out.to_string_lossy(), "session": session })),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let id = format!("call-{}", i);
        request_ok(&mut stdin, &mut reader, &id, method, params);
    }

    let unknown = request(&mut stdin, &mut reader, "99", "tabs.explode", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn malformed_lines_get_bad_json_and_the_loop_continues() {
    use std::io::{BufRead, Write};

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(value["error"]["code"], "bad_json");

    request_ok(&mut stdin, &mut reader, "after", "health", json!({}));
    drop(stdin);
    let _ = child.wait();
}
