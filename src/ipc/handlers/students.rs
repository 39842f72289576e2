use crate::agg;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_err, db_write_err, get_optional_bool, get_optional_i64, get_optional_str,
    get_required_i64, get_required_str, not_found, require_admin, require_admin_or_self,
    require_semester, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn student_json(
    id: &str,
    roll_number: &str,
    name: &str,
    email: Option<&str>,
    branch: &str,
    semester: i64,
    active: bool,
    push_token: Option<&str>,
    notify_enabled: bool,
) -> serde_json::Value {
    json!({
        "id": id,
        "rollNumber": roll_number,
        "name": name,
        "email": email,
        "branch": branch,
        "semester": semester,
        "year": agg::year_label(semester),
        "active": active,
        "pushToken": push_token,
        "notifyEnabled": notify_enabled,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn insert_student(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let roll_number = get_required_str(params, "rollNumber")?.trim().to_uppercase();
    if roll_number.is_empty() {
        return Err(bad_params("rollNumber must not be empty"));
    }
    let name = get_required_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(bad_params("name must not be empty"));
    }
    let branch = get_required_str(params, "branch")?.trim().to_uppercase();
    if branch.is_empty() {
        return Err(bad_params("branch must not be empty"));
    }
    let semester = require_semester(get_required_i64(params, "semester")?)?;
    let email = get_optional_str(params, "email");
    let push_token = get_optional_str(params, "pushToken");
    let notify_enabled = get_optional_bool(params, "notifyEnabled").unwrap_or(true);

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO students(id, roll_number, name, email, branch, semester, active, push_token, notify_enabled, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?)",
        (
            &id,
            &roll_number,
            &name,
            &email,
            &branch,
            semester,
            &push_token,
            notify_enabled as i64,
            &now,
            &now,
        ),
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            HandlerErr::new("duplicate", format!("roll number {} already exists", roll_number))
        } else {
            db_write_err(e)
        }
    })?;

    Ok(student_json(
        &id,
        &roll_number,
        &name,
        email.as_deref(),
        &branch,
        semester,
        true,
        push_token.as_deref(),
        notify_enabled,
    ))
}

fn students_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let student = insert_student(conn, params)?;
    Ok(json!({ "student": student }))
}

fn students_bulk_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let Some(items) = params.get("students").and_then(|v| v.as_array()) else {
        return Err(bad_params("missing students"));
    };
    if items.is_empty() {
        return Err(bad_params("students must not be empty"));
    }

    // Bulk creation is deliberately not transactional: each row succeeds or
    // fails on its own and the caller gets per-item results.
    let mut results = Vec::with_capacity(items.len());
    let mut created = 0usize;
    let mut failed = 0usize;
    for item in items {
        match insert_student(conn, item) {
            Ok(student) => {
                created += 1;
                results.push(json!({ "ok": true, "student": student }));
            }
            Err(e) => {
                failed += 1;
                results.push(json!({
                    "ok": false,
                    "error": { "code": e.code, "message": e.message }
                }));
            }
        }
    }
    Ok(json!({
        "createdCount": created,
        "failedCount": failed,
        "results": results,
    }))
}

fn students_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let branch = get_optional_str(params, "branch").map(|b| b.to_uppercase());
    let semester = get_optional_i64(params, "semester");
    let include_inactive = get_optional_bool(params, "includeInactive").unwrap_or(false);

    let mut sql = String::from(
        "SELECT id, roll_number, name, email, branch, semester, active, push_token, notify_enabled
         FROM students WHERE 1=1",
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
    sql.push_str(" ORDER BY roll_number");

    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())), |r| {
            Ok(student_json(
                &r.get::<_, String>(0)?,
                &r.get::<_, String>(1)?,
                &r.get::<_, String>(2)?,
                r.get::<_, Option<String>>(3)?.as_deref(),
                &r.get::<_, String>(4)?,
                r.get::<_, i64>(5)?,
                r.get::<_, i64>(6)? != 0,
                r.get::<_, Option<String>>(7)?.as_deref(),
                r.get::<_, i64>(8)? != 0,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;

    Ok(json!({ "count": rows.len(), "students": rows }))
}

fn students_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let student_id = get_required_str(params, "studentId")?;

    let existing = conn
        .query_row(
            "SELECT roll_number, name, email, branch, semester, active FROM students WHERE id = ?",
            [&student_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, Option<String>>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, i64>(4)?,
                    r.get::<_, i64>(5)? != 0,
                ))
            },
        )
        .optional()
        .map_err(db_err)?;
    let Some((roll, name, email, branch, semester, active)) = existing else {
        return Err(not_found("student"));
    };

    let roll = get_optional_str(params, "rollNumber")
        .map(|r| r.trim().to_uppercase())
        .unwrap_or(roll);
    let name = get_optional_str(params, "name")
        .map(|n| n.trim().to_string())
        .unwrap_or(name);
    let email = get_optional_str(params, "email").or(email);
    let branch = get_optional_str(params, "branch")
        .map(|b| b.to_uppercase())
        .unwrap_or(branch);
    let semester = match get_optional_i64(params, "semester") {
        Some(s) => require_semester(s)?,
        None => semester,
    };
    let active = get_optional_bool(params, "active").unwrap_or(active);
    let now = chrono::Utc::now().to_rfc3339();

    conn.execute(
        "UPDATE students SET roll_number = ?, name = ?, email = ?, branch = ?, semester = ?, active = ?, updated_at = ? WHERE id = ?",
        (&roll, &name, &email, &branch, semester, active as i64, &now, &student_id),
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            HandlerErr::new("duplicate", format!("roll number {} already exists", roll))
        } else {
            db_write_err(e)
        }
    })?;

    Ok(json!({
        "student": {
            "id": student_id,
            "rollNumber": roll,
            "name": name,
            "email": email,
            "branch": branch,
            "semester": semester,
            "year": agg::year_label(semester),
            "active": active,
        }
    }))
}

fn students_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let student_id = get_required_str(params, "studentId")?;
    // Soft delete only: attendance history keeps referencing the row.
    let changed = conn
        .execute(
            "UPDATE students SET active = 0, updated_at = ? WHERE id = ?",
            (chrono::Utc::now().to_rfc3339(), &student_id),
        )
        .map_err(db_write_err)?;
    if changed == 0 {
        return Err(not_found("student"));
    }
    Ok(json!({ "ok": true }))
}

fn students_promote(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let from_semester = require_semester(get_required_i64(params, "fromSemester")?)?;
    let branch = get_optional_str(params, "branch").map(|b| b.to_uppercase());
    let now = chrono::Utc::now().to_rfc3339();

    let promoted;
    let graduated;
    if from_semester == 8 {
        // Final-semester students leave the active roster.
        promoted = 0;
        graduated = match &branch {
            Some(b) => conn
                .execute(
                    "UPDATE students SET active = 0, updated_at = ? WHERE active = 1 AND semester = 8 AND branch = ?",
                    (&now, b),
                )
                .map_err(db_write_err)?,
            None => conn
                .execute(
                    "UPDATE students SET active = 0, updated_at = ? WHERE active = 1 AND semester = 8",
                    [&now],
                )
                .map_err(db_write_err)?,
        };
    } else {
        graduated = 0;
        promoted = match &branch {
            Some(b) => conn
                .execute(
                    "UPDATE students SET semester = semester + 1, updated_at = ? WHERE active = 1 AND semester = ? AND branch = ?",
                    (&now, from_semester, b),
                )
                .map_err(db_write_err)?,
            None => conn
                .execute(
                    "UPDATE students SET semester = semester + 1, updated_at = ? WHERE active = 1 AND semester = ?",
                    (&now, from_semester),
                )
                .map_err(db_write_err)?,
        };
    }

    Ok(json!({
        "fromSemester": from_semester,
        "promotedCount": promoted,
        "graduatedCount": graduated,
    }))
}

fn students_set_push_token(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_admin_or_self(params, &student_id)?;
    let token = match params.get("token") {
        None => return Err(bad_params("missing token (string or null)")),
        Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(bad_params("token must be string or null")),
    };
    let changed = conn
        .execute(
            "UPDATE students SET push_token = ?, updated_at = ? WHERE id = ?",
            (&token, chrono::Utc::now().to_rfc3339(), &student_id),
        )
        .map_err(db_write_err)?;
    if changed == 0 {
        return Err(not_found("student"));
    }
    Ok(json!({ "ok": true, "hasToken": token.is_some() }))
}

fn students_set_notify_enabled(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    require_admin_or_self(params, &student_id)?;
    let enabled = params
        .get("enabled")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| bad_params("missing enabled"))?;
    let changed = conn
        .execute(
            "UPDATE students SET notify_enabled = ?, updated_at = ? WHERE id = ?",
            (enabled as i64, chrono::Utc::now().to_rfc3339(), &student_id),
        )
        .map_err(db_write_err)?;
    if changed == 0 {
        return Err(not_found("student"));
    }
    Ok(json!({ "ok": true, "notifyEnabled": enabled }))
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
        "students.create" => Some(dispatch(state, req, students_create)),
        "students.bulkCreate" => Some(dispatch(state, req, students_bulk_create)),
        "students.list" => Some(dispatch(state, req, students_list)),
        "students.update" => Some(dispatch(state, req, students_update)),
        "students.delete" => Some(dispatch(state, req, students_delete)),
        "students.promote" => Some(dispatch(state, req, students_promote)),
        "students.setPushToken" => Some(dispatch(state, req, students_set_push_token)),
        "students.setNotifyEnabled" => Some(dispatch(state, req, students_set_notify_enabled)),
        _ => None,
    }
}
