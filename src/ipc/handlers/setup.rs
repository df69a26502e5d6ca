use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::quran::RecordType;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Progress,
    Memorization,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "progress" => Some(Self::Progress),
            "memorization" => Some(Self::Memorization),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Progress => "setup.progress",
            Self::Memorization => "setup.memorization",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Progress => json!({
            "includeReview": true
        }),
        SetupSection::Memorization => json!({
            "defaultRecordType": "new",
            "enforceChapterBounds": true
        }),
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Progress => match k.as_str() {
                "includeReview" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown progress field: {}", k)),
            },
            SetupSection::Memorization => match k.as_str() {
                "defaultRecordType" => {
                    let raw = v.as_str().ok_or_else(|| format!("{} must be string", k))?;
                    let Some(t) = RecordType::parse(raw) else {
                        return Err("defaultRecordType must be one of: new, review".into());
                    };
                    obj.insert(k.clone(), Value::String(t.as_str().to_string()));
                }
                "enforceChapterBounds" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown memorization field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Saved values that no longer validate fall back to defaults.
            if let Err(msg) = merge_section_patch(section, &mut current, saved_obj) {
                tracing::warn!(section = section.key(), %msg, "ignoring saved setup values");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

pub fn progress_include_review(conn: &rusqlite::Connection) -> anyhow::Result<bool> {
    let section = load_section(conn, SetupSection::Progress)?;
    Ok(section
        .get("includeReview")
        .and_then(|v| v.as_bool())
        .unwrap_or(true))
}

pub struct MemorizationDefaults {
    pub record_type: RecordType,
    pub enforce_chapter_bounds: bool,
}

pub fn memorization_defaults(conn: &rusqlite::Connection) -> anyhow::Result<MemorizationDefaults> {
    let section = load_section(conn, SetupSection::Memorization)?;
    Ok(MemorizationDefaults {
        record_type: section
            .get("defaultRecordType")
            .and_then(|v| v.as_str())
            .and_then(RecordType::parse)
            .unwrap_or(RecordType::New),
        enforce_chapter_bounds: section
            .get("enforceChapterBounds")
            .and_then(|v| v.as_bool())
            .unwrap_or(true),
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let progress = match load_section(conn, SetupSection::Progress) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let memorization = match load_section(conn, SetupSection::Memorization) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(
        &req.id,
        json!({
            "progress": progress,
            "memorization": memorization
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true, "section": section_raw, "values": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
