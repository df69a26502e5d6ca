use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_i64, get_required_str, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::quran::QuranStructureIndex;
use serde_json::json;

fn quran_chapters() -> Result<serde_json::Value, HandlerErr> {
    let index = QuranStructureIndex::global();
    let chapters: Vec<serde_json::Value> = index
        .chapters()
        .iter()
        .map(|c| {
            let juz: Vec<u8> = index.spans_for(c).iter().map(|s| s.juz).collect();
            json!({
                "number": c.number,
                "name": c.name,
                "verseCount": c.verse_count,
                "juz": juz
            })
        })
        .collect();
    Ok(json!({ "chapters": chapters }))
}

fn quran_juz_list() -> Result<serde_json::Value, HandlerErr> {
    let index = QuranStructureIndex::global();
    Ok(json!({
        "juz": to_json(&index.juz_list())?,
        "totalVerseCount": index.total_verse_count()
    }))
}

fn quran_juz_segments(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let juz = get_required_i64(params, "juz")?;
    let index = QuranStructureIndex::global();
    let segments = index.segments_for_juz(juz)?;
    Ok(json!({
        "juz": juz,
        "segments": to_json(&segments)?,
        "totalVerseCount": index.total_verse_count_for_juz(juz)?
    }))
}

fn quran_chapter_juzzes(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let index = QuranStructureIndex::global();
    if params.get("chapterNumber").is_some() {
        let number = get_required_i64(params, "chapterNumber")?;
        let chapter = index.chapter_by_number(number);
        return Ok(json!({
            "chapterNumber": number,
            "chapter": to_json(&chapter)?,
            "juzzes": to_json(&chapter.map(|c| index.spans_for(c)).unwrap_or(&[]))?
        }));
    }
    let name = get_required_str(params, "chapterName")?;
    Ok(json!({
        "chapterName": name,
        "chapter": to_json(&index.chapter(&name))?,
        "juzzes": to_json(&index.juzzes_containing_chapter(&name))?
    }))
}

fn respond(req: &Request, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

// Static lookups; no workspace required.
pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "quran.chapters" => Some(respond(req, quran_chapters())),
        "quran.juz.list" => Some(respond(req, quran_juz_list())),
        "quran.juz.segments" => Some(respond(req, quran_juz_segments(&req.params))),
        "quran.chapter.juzzes" => Some(respond(req, quran_chapter_juzzes(&req.params))),
        _ => None,
    }
}
