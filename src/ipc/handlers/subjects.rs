use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_err, db_write_err, get_optional_bool, get_optional_i64, get_optional_str,
    get_required_i64, get_required_str, not_found, require_admin, require_semester, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

const SUBJECT_KINDS: [&str; 5] = ["theory", "lab", "practical", "elective", "project"];

fn validate_kind(kind: &str) -> Result<(), HandlerErr> {
    if SUBJECT_KINDS.contains(&kind) {
        Ok(())
    } else {
        Err(bad_params(format!(
            "kind must be one of: {}",
            SUBJECT_KINDS.join(", ")
        )))
    }
}

fn subjects_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let code = get_required_str(params, "code")?.trim().to_uppercase();
    let name = get_required_str(params, "name")?.trim().to_string();
    let branch = get_required_str(params, "branch")?.trim().to_uppercase();
    if code.is_empty() || name.is_empty() || branch.is_empty() {
        return Err(bad_params("code, name and branch must not be empty"));
    }
    let semester = require_semester(get_required_i64(params, "semester")?)?;
    let credits = get_required_i64(params, "credits")?;
    if credits <= 0 {
        return Err(bad_params("credits must be positive"));
    }
    let kind = get_optional_str(params, "kind").unwrap_or_else(|| "theory".to_string());
    validate_kind(&kind)?;

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, code, name, branch, semester, credits, kind, active)
         VALUES(?, ?, ?, ?, ?, ?, ?, 1)",
        (&id, &code, &name, &branch, semester, credits, &kind),
    )
    .map_err(|e| {
        if matches!(
            &e,
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation
        ) {
            HandlerErr::new(
                "duplicate",
                format!("subject code {} already exists in {}", code, branch),
            )
        } else {
            db_write_err(e)
        }
    })?;

    Ok(json!({
        "subject": {
            "id": id,
            "code": code,
            "name": name,
            "branch": branch,
            "semester": semester,
            "credits": credits,
            "kind": kind,
            "active": true,
        }
    }))
}

fn subjects_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let branch = get_optional_str(params, "branch").map(|b| b.to_uppercase());
    let semester = get_optional_i64(params, "semester");
    let include_inactive = get_optional_bool(params, "includeInactive").unwrap_or(false);

    let mut sql = String::from(
        "SELECT id, code, name, branch, semester, credits, kind, active FROM subjects WHERE 1=1",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    if let Some(b) = &branch {
        sql.push_str(" AND branch = ?");
        args.push(Box::new(b.clone()));
    }
    if let Some(s) = semester {
        sql.push_str(" AND semester = ?");
        args.push(Box::new(s));
    }
    if !include_inactive {
        sql.push_str(" AND active = 1");
    }
    sql.push_str(" ORDER BY branch, semester, code");

    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "code": r.get::<_, String>(1)?,
                    "name": r.get::<_, String>(2)?,
                    "branch": r.get::<_, String>(3)?,
                    "semester": r.get::<_, i64>(4)?,
                    "credits": r.get::<_, i64>(5)?,
                    "kind": r.get::<_, String>(6)?,
                    "active": r.get::<_, i64>(7)? != 0,
                }))
            },
        )
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;

    Ok(json!({ "count": rows.len(), "subjects": rows }))
}

fn subjects_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let subject_id = get_required_str(params, "subjectId")?;

    let existing = conn
        .query_row(
            "SELECT code, name, branch, semester, credits, kind, active FROM subjects WHERE id = ?",
            [&subject_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)?,
                    r.get::<_, i64>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, i64>(6)? != 0,
                ))
            },
        )
        .optional()
        .map_err(db_err)?;
    let Some((code, name, branch, semester, credits, kind, active)) = existing else {
        return Err(not_found("subject"));
    };

    let code = get_optional_str(params, "code")
        .map(|c| c.trim().to_uppercase())
        .unwrap_or(code);
    let name = get_optional_str(params, "name").unwrap_or(name);
    let branch = get_optional_str(params, "branch")
        .map(|b| b.to_uppercase())
        .unwrap_or(branch);
    let semester = match get_optional_i64(params, "semester") {
        Some(s) => require_semester(s)?,
        None => semester,
    };
    let credits = match get_optional_i64(params, "credits") {
        Some(c) if c <= 0 => return Err(bad_params("credits must be positive")),
        Some(c) => c,
        None => credits,
    };
    let kind = match get_optional_str(params, "kind") {
        Some(k) => {
            validate_kind(&k)?;
            k
        }
        None => kind,
    };
    let active = get_optional_bool(params, "active").unwrap_or(active);

    conn.execute(
        "UPDATE subjects SET code = ?, name = ?, branch = ?, semester = ?, credits = ?, kind = ?, active = ? WHERE id = ?",
        (&code, &name, &branch, semester, credits, &kind, active as i64, &subject_id),
    )
    .map_err(db_write_err)?;

    Ok(json!({
        "subject": {
            "id": subject_id,
            "code": code,
            "name": name,
            "branch": branch,
            "semester": semester,
            "credits": credits,
            "kind": kind,
            "active": active,
        }
    }))
}

fn subjects_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let subject_id = get_required_str(params, "subjectId")?;
    let changed = conn
        .execute("UPDATE subjects SET active = 0 WHERE id = ?", [&subject_id])
        .map_err(db_write_err)?;
    if changed == 0 {
        return Err(not_found("subject"));
    }
    Ok(json!({ "ok": true }))
}

fn dispatch(
    state: &mut AppState,
    req: &Request,
    f: fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.create" => Some(dispatch(state, req, subjects_create)),
        "subjects.list" => Some(dispatch(state, req, subjects_list)),
        "subjects.update" => Some(dispatch(state, req, subjects_update)),
        "subjects.delete" => Some(dispatch(state, req, subjects_delete)),
        _ => None,
    }
}
