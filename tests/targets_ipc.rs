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
    let exe = env!("CARGO_BIN_EXE_tahfizd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn tahfizd");
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
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
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

fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

fn open_with_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> (PathBuf, String) {
    let workspace = temp_dir(prefix);
    request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let created = request_ok(
        stdin,
        reader,
        "st",
        "students.create",
        json!({ "name": "Umar" }),
    );
    let student_id = created
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();
    (workspace, student_id)
}

#[test]
fn targets_set_deduplicates_and_replaces() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (workspace, student_id) = open_with_student(&mut stdin, &mut reader, "tahfiz-targets");

    let set = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "targets.set",
        json!({ "studentId": student_id, "juz": [2, 1, 1] }),
    );
    assert_eq!(set["juz"], json!([1, 2]));
    assert_eq!(set["totalVerseCount"], 148 + 111);

    let got = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "targets.get",
        json!({ "studentId": student_id }),
    );
    assert_eq!(got["juz"], json!([1, 2]));
    assert_eq!(got["totalVerseCount"], 259);

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "targets.set",
        json!({ "studentId": student_id, "juz": [30] }),
    );
    let got = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "targets.get",
        json!({ "studentId": student_id }),
    );
    assert_eq!(got["juz"], json!([30]));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn targets_set_rejects_whole_list_on_one_bad_juz() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (workspace, student_id) = open_with_student(&mut stdin, &mut reader, "tahfiz-targets-atomic");

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "targets.set",
        json!({ "studentId": student_id, "juz": [5] }),
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "targets.set",
        json!({ "studentId": student_id, "juz": [1, 31] }),
    );
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "out_of_range");
    assert_eq!(resp["error"]["details"]["juz"], 31);

    let got = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "targets.get",
        json!({ "studentId": student_id }),
    );
    assert_eq!(got["juz"], json!([5]));

    assert_eq!(
        request_err_code(
            &mut stdin,
            &mut reader,
            "4",
            "targets.set",
            json!({ "studentId": student_id, "juz": ["one"] }),
        ),
        "bad_params"
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn targets_plan_expands_stored_targets_per_chapter() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (workspace, student_id) = open_with_student(&mut stdin, &mut reader, "tahfiz-targets-plan");

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "targets.set",
        json!({ "studentId": student_id, "juz": [1, 2] }),
    );
    let plan = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "targets.plan",
        json!({ "studentId": student_id }),
    );
    assert_eq!(plan["chapterOrder"], json!(["Al-Fatihah", "Al-Baqarah"]));
    assert_eq!(plan["totalTargetVerseCount"], 259);
    assert_eq!(plan["chapterCount"], 2);
    let baqarah = &plan["chapters"]["Al-Baqarah"];
    assert_eq!(
        baqarah["segments"],
        json!([
            { "juz": 1, "verseStart": 1, "verseEnd": 141, "verseCount": 141 },
            { "juz": 2, "verseStart": 142, "verseEnd": 252, "verseCount": 111 }
        ])
    );
    assert_eq!(baqarah["totalTargetVerseCount"], 252);
    assert_eq!(
        plan["chapters"]["Al-Fatihah"]["segments"],
        json!([{ "juz": 1, "verseStart": 1, "verseEnd": 7, "verseCount": 7 }])
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn targets_plan_with_explicit_juz_needs_no_workspace() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let plan = request_ok(&mut stdin, &mut reader, "1", "targets.plan", json!({ "juz": [3] }));
    assert_eq!(plan["juz"], json!([3]));
    assert_eq!(plan["chapterOrder"], json!(["Al-Baqarah", "Ali 'Imran"]));
    assert_eq!(plan["totalTargetVerseCount"], 126);

    assert_eq!(
        request_err_code(&mut stdin, &mut reader, "2", "targets.plan", json!({ "juz": [0] })),
        "out_of_range"
    );
    assert_eq!(
        request_err_code(
            &mut stdin,
            &mut reader,
            "3",
            "targets.plan",
            json!({ "studentId": "x" })
        ),
        "no_workspace"
    );

    drop(stdin);
    let _ = child.wait();
}
