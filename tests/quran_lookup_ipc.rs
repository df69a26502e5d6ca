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

#[test]
fn juz_segments_lookup_and_range_errors() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let juz1 = request_ok(&mut stdin, &mut reader, "1", "quran.juz.segments", json!({ "juz": 1 }));
    assert_eq!(juz1["totalVerseCount"], 148);
    assert_eq!(
        juz1["segments"],
        json!([
            { "juz": 1, "chapterNumber": 1, "chapterName": "Al-Fatihah", "verseStart": 1, "verseEnd": 7, "verseCount": 7 },
            { "juz": 1, "chapterNumber": 2, "chapterName": "Al-Baqarah", "verseStart": 1, "verseEnd": 141, "verseCount": 141 }
        ])
    );

    for (id, juz) in [("2", 0), ("3", 31)] {
        let resp = request(&mut stdin, &mut reader, id, "quran.juz.segments", json!({ "juz": juz }));
        assert_eq!(resp["ok"], false);
        assert_eq!(resp["error"]["code"], "out_of_range");
        assert_eq!(resp["error"]["details"]["juz"], juz);
    }
    assert_eq!(
        request_err_code(&mut stdin, &mut reader, "4", "quran.juz.segments", json!({})),
        "bad_params"
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn chapter_juzzes_matches_names_case_insensitively() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let baqarah = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "quran.chapter.juzzes",
        json!({ "chapterName": "al-BAQARAH" }),
    );
    assert_eq!(baqarah["chapter"]["name"], "Al-Baqarah");
    assert_eq!(baqarah["chapter"]["verseCount"], 286);
    assert_eq!(
        baqarah["juzzes"],
        json!([
            { "juz": 1, "verseStart": 1, "verseEnd": 141, "verseCount": 141 },
            { "juz": 2, "verseStart": 142, "verseEnd": 252, "verseCount": 111 },
            { "juz": 3, "verseStart": 253, "verseEnd": 286, "verseCount": 34 }
        ])
    );

    let unknown = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "quran.chapter.juzzes",
        json!({ "chapterName": "Baqarah" }),
    );
    assert!(unknown["chapter"].is_null());
    assert_eq!(unknown["juzzes"], json!([]));

    let by_number = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "quran.chapter.juzzes",
        json!({ "chapterNumber": 4 }),
    );
    assert_eq!(by_number["chapter"]["name"], "An-Nisa'");
    assert_eq!(by_number["chapter"]["verseCount"], 176);
    let juz: Vec<u64> = by_number["juzzes"]
        .as_array()
        .expect("juzzes")
        .iter()
        .map(|s| s["juz"].as_u64().expect("juz"))
        .collect();
    assert_eq!(juz, vec![4, 5, 6]);

    let missing = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "quran.chapter.juzzes",
        json!({ "chapterNumber": 115 }),
    );
    assert!(missing["chapter"].is_null());
    assert_eq!(missing["juzzes"], json!([]));
    assert_eq!(
        request_err_code(
            &mut stdin,
            &mut reader,
            "5",
            "quran.chapter.juzzes",
            json!({ "chapterNumber": "four" }),
        ),
        "bad_params"
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn catalog_lists_cover_whole_mushaf() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let chapters = request_ok(&mut stdin, &mut reader, "1", "quran.chapters", json!({}));
    let chapters = chapters["chapters"].as_array().expect("chapters");
    assert_eq!(chapters.len(), 114);
    assert_eq!(chapters[113]["name"], "An-Nas");
    assert_eq!(chapters[113]["juz"], json!([30]));
    assert_eq!(chapters[3]["juz"], json!([4, 5, 6]));

    let list = request_ok(&mut stdin, &mut reader, "2", "quran.juz.list", json!({}));
    assert_eq!(list["totalVerseCount"], 6236);
    let juz = list["juz"].as_array().expect("juz");
    assert_eq!(juz.len(), 30);
    let summed: u64 = juz
        .iter()
        .map(|j| j["totalVerseCount"].as_u64().expect("count"))
        .sum();
    assert_eq!(summed, 6236);

    drop(stdin);
    let _ = child.wait();
}
