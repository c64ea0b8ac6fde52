mod test_support;

use serde_json::json;
use test_support::{
    editor_session, ids_of, request_ok, section_ids, setup_course, spawn_sidecar, tab, view,
};

#[test]
fn restored_course_heals_tab_membership_through_section_numbers() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (workspace, course, ids) = setup_course(&mut stdin, &mut reader, "tabformat-restore", 5);
    let session = editor_session();

    request_ok(
        &mut stdin,
        &mut reader,
        "assign",
        "tabs.assign",
        json!({
            "courseId": course,
            "tabIndex": 2,
            "sections": format!("{},{}", ids[3], ids[4]),
            "sectionNums": "3,4",
            "session": session,
        }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "rename",
        "tabs.rename",
        json!({ "courseId": course, "tabIndex": 2, "title": "Genetics", "session": session }),
    );

    let bundle = workspace.join("bio.zip");
    request_ok(
        &mut stdin,
        &mut reader,
        "backup",
        "courses.backup",
        json!({ "courseId": course, "outPath": bundle.to_string_lossy() }),
    );
    let restored = request_ok(
        &mut stdin,
        &mut reader,
        "restore",
        "courses.restore",
        json!({ "inPath": bundle.to_string_lossy(), "session": session }),
    );
    assert_eq!(restored["status"], "applied");
    let new_course = restored["courseId"].as_i64().expect("courseId");
    let new_ids = section_ids(&mut stdin, &mut reader, new_course);
    assert_eq!(new_ids.len(), ids.len());
    assert!(new_ids.iter().all(|id| !ids.contains(id)));

    let healed = view(&mut stdin, &mut reader, new_course);
    let tab2 = tab(&healed, 2);
    assert_eq!(ids_of(&tab2), vec![new_ids[3], new_ids[4]]);
    assert_eq!(tab2["title"], "Genetics");
    let tab0 = tab(&healed, 0);
    assert_eq!(ids_of(&tab0), vec![new_ids[0], new_ids[1], new_ids[2], new_ids[5]]);

    // A second render finds nothing left to repair.
    let again = view(&mut stdin, &mut reader, new_course);
    assert_eq!(ids_of(&tab(&again, 2)), vec![new_ids[3], new_ids[4]]);

    // The source course is untouched.
    let original = view(&mut stdin, &mut reader, course);
    assert_eq!(ids_of(&tab(&original, 2)), vec![ids[3], ids[4]]);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
