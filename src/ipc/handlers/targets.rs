use crate::ipc::error::ok;
use crate::ipc::helpers::{
    db_query_failed, get_i64_list, get_required_str, require_student, to_json, with_conn,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::quran::{ChapterPlan, QuranStructureIndex, TargetExpander};
use rusqlite::Connection;
use serde_json::json;

pub fn load_target_juz(conn: &Connection, student_id: &str) -> Result<Vec<i64>, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT juz FROM juz_targets WHERE student_id = ? ORDER BY juz")
        .map_err(db_query_failed)?;
    stmt.query_map([student_id], |r| r.get::<_, i64>(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query_failed)
}

fn plan_json(plan: &ChapterPlan) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "juz": plan.juz(),
        "chapters": to_json(plan)?,
        "chapterOrder": plan.chapter_order(),
        "chapterCount": plan.entries().len(),
        "totalTargetVerseCount": plan.total_target_verse_count()
    }))
}

fn targets_get(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &student_id)?;
    let juz = load_target_juz(conn, &student_id)?;
    let index = QuranStructureIndex::global();
    let mut total: u32 = 0;
    for j in &juz {
        total += index.total_verse_count_for_juz(*j)?;
    }
    Ok(json!({
        "studentId": student_id,
        "juz": juz,
        "totalVerseCount": total
    }))
}

fn targets_set(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &student_id)?;
    let requested = get_i64_list(params, "juz")?;
    // Expansion validates the whole list before anything is written.
    let plan = TargetExpander::new(QuranStructureIndex::global()).expand(&requested)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute("DELETE FROM juz_targets WHERE student_id = ?", [&student_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", "juz_targets", e))?;
    for juz in plan.juz() {
        tx.execute(
            "INSERT INTO juz_targets(student_id, juz) VALUES(?, ?)",
            (&student_id, i64::from(*juz)),
        )
        .map_err(|e| HandlerErr::db("db_insert_failed", "juz_targets", e))?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    tracing::info!(student_id = %student_id, juz = ?plan.juz(), "targets replaced");

    Ok(json!({
        "studentId": student_id,
        "juz": plan.juz(),
        "totalVerseCount": plan.total_target_verse_count()
    }))
}

fn targets_plan(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let juz = if params.get("juz").is_some() {
        get_i64_list(params, "juz")?
    } else {
        let student_id = get_required_str(params, "studentId")?;
        require_student(conn, &student_id)?;
        load_target_juz(conn, &student_id)?
    };
    let plan = TargetExpander::new(QuranStructureIndex::global()).expand(&juz)?;
    plan_json(&plan)
}

fn handle_targets_plan(state: &mut AppState, req: &Request) -> serde_json::Value {
    // An explicit juz list needs no workspace.
    if state.db.is_none() && req.params.get("juz").is_some() {
        let result = get_i64_list(&req.params, "juz").and_then(|juz| {
            let plan = TargetExpander::new(QuranStructureIndex::global()).expand(&juz)?;
            plan_json(&plan)
        });
        return match result {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id),
        };
    }
    with_conn(state, req, targets_plan)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "targets.get" => Some(with_conn(state, req, targets_get)),
        "targets.set" => Some(with_conn(state, req, targets_set)),
        "targets.plan" => Some(handle_targets_plan(state, req)),
        _ => None,
    }
}
