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

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("tahfiz-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["result"]["verseCount"], 6236);
    assert!(health["result"]["workspacePath"].is_null());

    let no_ws = request(&mut stdin, &mut reader, "2", "students.list", json!({}));
    assert_eq!(no_ws["error"]["code"], "no_workspace");

    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let created = request(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "name": "Smoke Student" }),
    );
    let student_id = created["result"]["studentId"]
        .as_str()
        .expect("studentId")
        .to_string();

    let calls = [
        ("students.list", json!({})),
        ("students.update", json!({ "studentId": student_id, "active": true })),
        (
            "memorization.create",
            json!({ "studentId": student_id, "chapterName": "Al-Fatihah", "verseStart": 1, "verseEnd": 7 }),
        ),
        ("memorization.list", json!({ "studentId": student_id })),
        ("targets.set", json!({ "studentId": student_id, "juz": [1] })),
        ("targets.get", json!({ "studentId": student_id })),
        ("targets.plan", json!({ "studentId": student_id })),
        ("progress.juz", json!({ "studentId": student_id })),
        ("progress.targets", json!({ "studentId": student_id })),
        ("quran.chapters", json!({})),
        ("quran.juz.list", json!({})),
        ("quran.juz.segments", json!({ "juz": 30 })),
        ("quran.chapter.juzzes", json!({ "chapterName": "Yasin" })),
        ("setup.get", json!({})),
        ("setup.update", json!({ "section": "progress", "patch": { "includeReview": true } })),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let id = format!("call-{}", i);
        let resp = request(&mut stdin, &mut reader, &id, method, params);
        assert_eq!(resp["ok"], true, "{} failed: {}", method, resp);
    }

    let unknown = request(&mut stdin, &mut reader, "5", "reports.print", json!({}));
    assert_eq!(unknown["error"]["code"], "not_implemented");

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let bad: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(bad["error"]["code"], "bad_json");

    let setup = request(&mut stdin, &mut reader, "6", "setup.get", json!({}));
    assert_eq!(setup["result"]["progress"]["includeReview"], true);
    assert_eq!(setup["result"]["memorization"]["defaultRecordType"], "new");
    let rejected = request(
        &mut stdin,
        &mut reader,
        "7",
        "setup.update",
        json!({ "section": "memorization", "patch": { "defaultRecordType": "tilawah" } }),
    );
    assert_eq!(rejected["error"]["code"], "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
