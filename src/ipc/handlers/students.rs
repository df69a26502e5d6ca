use crate::ipc::helpers::{
    db_query_failed, get_optional_bool, get_optional_str, get_required_str, now_timestamp,
    require_student, with_conn, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn students_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let include_inactive = get_optional_bool(params, "includeInactive")?.unwrap_or(true);

    // Correlated subqueries keep the counts independent of each other.
    let mut stmt = conn
        .prepare(
            "SELECT
               s.id,
               s.name,
               s.class_name,
               s.active,
               (SELECT COUNT(*) FROM memorization_records m WHERE m.student_id = s.id),
               (SELECT COUNT(*) FROM juz_targets t WHERE t.student_id = s.id)
             FROM students s
             ORDER BY s.name, s.created_at",
        )
        .map_err(db_query_failed)?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, Option<String>>(2)?,
                r.get::<_, i64>(3)? != 0,
                r.get::<_, i64>(4)?,
                r.get::<_, i64>(5)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query_failed)?;

    let students: Vec<serde_json::Value> = rows
        .into_iter()
        .filter(|row| include_inactive || row.3)
        .map(|(id, name, class_name, active, record_count, target_count)| {
            json!({
                "id": id,
                "name": name,
                "className": class_name,
                "active": active,
                "recordCount": record_count,
                "targetJuzCount": target_count
            })
        })
        .collect();
    Ok(json!({ "students": students }))
}

fn students_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let class_name = get_optional_str(params, "className")?;
    let student_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, name, class_name, active, created_at) VALUES(?, ?, ?, 1, ?)",
        (&student_id, &name, &class_name, now_timestamp()),
    )
    .map_err(|e| HandlerErr::db("db_insert_failed", "students", e))?;
    tracing::info!(student_id = %student_id, "student created");
    Ok(json!({ "studentId": student_id, "name": name, "className": class_name }))
}

fn students_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &student_id)?;

    // Parse every field before writing so a bad one leaves the row untouched.
    let name = match params.get("name") {
        Some(_) => Some(get_required_str(params, "name")?),
        None => None,
    };
    let class_name = match params.get("className") {
        Some(_) => Some(get_optional_str(params, "className")?),
        None => None,
    };
    let active = get_optional_bool(params, "active")?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    if let Some(name) = &name {
        tx.execute(
            "UPDATE students SET name = ? WHERE id = ?",
            (name, &student_id),
        )
        .map_err(|e| HandlerErr::db("db_update_failed", "students", e))?;
    }
    if let Some(class_name) = &class_name {
        tx.execute(
            "UPDATE students SET class_name = ? WHERE id = ?",
            (class_name, &student_id),
        )
        .map_err(|e| HandlerErr::db("db_update_failed", "students", e))?;
    }
    if let Some(active) = active {
        tx.execute(
            "UPDATE students SET active = ? WHERE id = ?",
            (i64::from(active), &student_id),
        )
        .map_err(|e| HandlerErr::db("db_update_failed", "students", e))?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "ok": true }))
}

fn students_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &student_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    // No ON DELETE CASCADE: children first.
    for table in ["memorization_records", "juz_targets"] {
        tx.execute(
            &format!("DELETE FROM {} WHERE student_id = ?", table),
            [&student_id],
        )
        .map_err(|e| HandlerErr::db("db_delete_failed", table, e))?;
    }
    tx.execute("DELETE FROM students WHERE id = ?", [&student_id])
        .map_err(|e| HandlerErr::db("db_delete_failed", "students", e))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    tracing::info!(student_id = %student_id, "student deleted");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_conn(state, req, students_list)),
        "students.create" => Some(with_conn(state, req, students_create)),
        "students.update" => Some(with_conn(state, req, students_update)),
        "students.delete" => Some(with_conn(state, req, students_delete)),
        _ => None,
    }
}
