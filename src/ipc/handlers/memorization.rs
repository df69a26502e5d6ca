use crate::ipc::handlers::setup::memorization_defaults;
use crate::ipc::helpers::{
    db_query_failed, get_optional_str, get_required_i64, get_required_str, now_timestamp,
    require_student, with_conn, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::quran::{validate_verse_range, MemorizationRecord, QuranStructureIndex, RecordType};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

const MAX_STATUS_LEN: usize = 32;

#[derive(Debug, Clone)]
struct StoredRecord {
    id: String,
    recorded_on: Option<String>,
    created_at: String,
    record: MemorizationRecord,
}

fn load_stored_records(
    conn: &Connection,
    student_id: &str,
) -> Result<Vec<StoredRecord>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, student_id, chapter_name, verse_start, verse_end, record_type, status,
                    recorded_on, created_at
             FROM memorization_records
             WHERE student_id = ?
             ORDER BY COALESCE(recorded_on, substr(created_at, 1, 10)), created_at",
        )
        .map_err(db_query_failed)?;
    stmt.query_map([student_id], |r| {
        let record_type: String = r.get(5)?;
        Ok(StoredRecord {
            id: r.get(0)?,
            recorded_on: r.get(7)?,
            created_at: r.get(8)?,
            record: MemorizationRecord {
                student_id: r.get(1)?,
                chapter_name: r.get(2)?,
                verse_start: r.get(3)?,
                verse_end: r.get(4)?,
                record_type: RecordType::parse(&record_type).unwrap_or(RecordType::New),
                status: r.get(6)?,
            },
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_query_failed)
}

/// Stored records for one student, optionally without review entries.
pub fn load_records(
    conn: &Connection,
    student_id: &str,
    include_review: bool,
) -> Result<Vec<MemorizationRecord>, HandlerErr> {
    Ok(load_stored_records(conn, student_id)?
        .into_iter()
        .map(|s| s.record)
        .filter(|r| include_review || r.record_type == RecordType::New)
        .collect())
}

fn parse_type_filter(params: &serde_json::Value) -> Result<Option<RecordType>, HandlerErr> {
    match get_optional_str(params, "recordType")? {
        None => Ok(None),
        Some(raw) if raw.eq_ignore_ascii_case("all") => Ok(None),
        Some(raw) => RecordType::parse(&raw)
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params("recordType must be one of: new, review")),
    }
}

fn memorization_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &student_id)?;
    let type_filter = parse_type_filter(params)?;
    // Browsing filter only: substring match, unlike chapter resolution.
    let chapter_query = get_optional_str(params, "chapterQuery")?.map(|q| q.to_lowercase());

    let index = QuranStructureIndex::global();
    let records: Vec<serde_json::Value> = load_stored_records(conn, &student_id)?
        .into_iter()
        .filter(|s| type_filter.map_or(true, |t| s.record.record_type == t))
        .filter(|s| {
            chapter_query
                .as_deref()
                .map_or(true, |q| s.record.chapter_name.to_lowercase().contains(q))
        })
        .map(|s| {
            let canonical = index.chapter(&s.record.chapter_name);
            json!({
                "id": s.id,
                "studentId": s.record.student_id,
                "chapterName": s.record.chapter_name,
                "canonicalChapterName": canonical.map(|c| c.name),
                "chapterNumber": canonical.map(|c| c.number),
                "verseStart": s.record.verse_start,
                "verseEnd": s.record.verse_end,
                "recordType": s.record.record_type.as_str(),
                "status": s.record.status,
                "recordedOn": s.recorded_on,
                "createdAt": s.created_at
            })
        })
        .collect();
    Ok(json!({ "studentId": student_id, "records": records }))
}

fn memorization_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &student_id)?;
    let chapter_name = get_required_str(params, "chapterName")?;
    let verse_start = get_required_i64(params, "verseStart")?;
    let verse_end = get_required_i64(params, "verseEnd")?;
    validate_verse_range(&chapter_name, verse_start, verse_end)?;

    let defaults = memorization_defaults(conn)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    // "all" is a list filter, not a storable type.
    let record_type = match get_optional_str(params, "recordType")? {
        None => defaults.record_type,
        Some(raw) => RecordType::parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params("recordType must be one of: new, review"))?,
    };

    let canonical = QuranStructureIndex::global().chapter(&chapter_name);
    if let Some(chapter) = canonical {
        if defaults.enforce_chapter_bounds && verse_end > i64::from(chapter.verse_count) {
            return Err(HandlerErr::bad_params(format!(
                "{} has only {} verses",
                chapter.name, chapter.verse_count
            ))
            .with_details(json!({
                "chapterName": chapter.name,
                "chapterVerseCount": chapter.verse_count,
                "verseEnd": verse_end
            })));
        }
    } else {
        tracing::debug!(chapter = %chapter_name, "storing record for unrecognized chapter");
    }

    let status = get_optional_str(params, "status")?;
    if status.as_ref().is_some_and(|s| s.chars().count() > MAX_STATUS_LEN) {
        return Err(HandlerErr::bad_params(format!(
            "status length must be <= {}",
            MAX_STATUS_LEN
        )));
    }
    let recorded_on = match get_optional_str(params, "recordedOn")? {
        None => None,
        Some(raw) => {
            let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| HandlerErr::bad_params("recordedOn must be YYYY-MM-DD"))?;
            Some(date.format("%Y-%m-%d").to_string())
        }
    };

    let record_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO memorization_records(
            id, student_id, chapter_name, verse_start, verse_end, record_type, status,
            recorded_on, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &record_id,
            &student_id,
            &chapter_name,
            verse_start,
            verse_end,
            record_type.as_str(),
            &status,
            &recorded_on,
            now_timestamp(),
        ),
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", "memorization_records", e))?;

    Ok(json!({
        "recordId": record_id,
        "recordType": record_type.as_str(),
        "canonicalChapterName": canonical.map(|c| c.name)
    }))
}

fn memorization_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let record_id = get_required_str(params, "recordId")?;
    let exists = conn
        .query_row(
            "SELECT 1 FROM memorization_records WHERE id = ?",
            [&record_id],
            |r| r.get::<_, i64>(0),
        )
        .optional()
        .map_err(db_query_failed)?;
    if exists.is_none() {
        return Err(HandlerErr::new("not_found", "record not found"));
    }
    conn.execute(
        "DELETE FROM memorization_records WHERE id = ?",
        [&record_id],
    )
    .map_err(|e| HandlerErr::db("db_delete_failed", "memorization_records", e))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "memorization.list" => Some(with_conn(state, req, memorization_list)),
        "memorization.create" => Some(with_conn(state, req, memorization_create)),
        "memorization.delete" => Some(with_conn(state, req, memorization_delete)),
        _ => None,
    }
}
