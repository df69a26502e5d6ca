use crate::ipc::handlers::memorization::load_records;
use crate::ipc::handlers::setup::progress_include_review;
use crate::ipc::handlers::targets::load_target_juz;
use crate::ipc::helpers::{
    get_optional_bool, get_required_str, require_student, to_json, with_conn, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::quran::{summarize, target_completion, ProgressReconciler, QuranStructureIndex};
use rusqlite::Connection;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

fn include_review(conn: &Connection, params: &serde_json::Value) -> Result<bool, HandlerErr> {
    match get_optional_bool(params, "includeReview")? {
        Some(v) => Ok(v),
        None => progress_include_review(conn)
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string())),
    }
}

fn progress_juz(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &student_id)?;
    let include_review = include_review(conn, params)?;
    let records = load_records(conn, &student_id, include_review)?;

    let reconciler = ProgressReconciler::new(QuranStructureIndex::global());
    let progress = reconciler.reconcile(&records)?;
    let unmatched = reconciler.unmatched_chapters(&records);
    if !unmatched.is_empty() {
        tracing::debug!(student_id = %student_id, count = unmatched.len(), "records with unmapped chapters");
    }

    Ok(json!({
        "studentId": student_id,
        "includeReview": include_review,
        "recordCount": records.len(),
        "juz": to_json(&progress)?,
        "summary": to_json(&summarize(&progress))?,
        "unmatchedChapters": unmatched
    }))
}

fn progress_targets(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &student_id)?;
    let include_review = include_review(conn, params)?;
    let records = load_records(conn, &student_id, include_review)?;

    let progress = ProgressReconciler::new(QuranStructureIndex::global()).reconcile(&records)?;
    let targets: BTreeSet<u8> = load_target_juz(conn, &student_id)?
        .into_iter()
        .filter_map(|j| u8::try_from(j).ok())
        .collect();
    let per_target: BTreeMap<u8, _> = progress
        .iter()
        .filter(|(juz, _)| targets.contains(*juz))
        .map(|(juz, p)| (*juz, p))
        .collect();

    Ok(json!({
        "studentId": student_id,
        "includeReview": include_review,
        "completion": to_json(&target_completion(&progress, &targets))?,
        "juz": to_json(&per_target)?
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "progress.juz" => Some(with_conn(state, req, progress_juz)),
        "progress.targets" => Some(with_conn(state, req, progress_targets)),
        _ => None,
    }
}
