use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_err, db_write_err, find_subject, get_optional_bool, get_optional_str,
    get_required_i64, get_required_str, not_found, require_admin, require_semester, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn assignments_for(
    conn: &Connection,
    teacher_id: &str,
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT a.subject_id, s.code, s.name, a.branch, a.semester
             FROM teacher_assignments a
             JOIN subjects s ON s.id = a.subject_id
             WHERE a.teacher_id = ?
             ORDER BY a.branch, a.semester, s.code",
        )
        .map_err(db_err)?;
    stmt.query_map([teacher_id], |r| {
        Ok(json!({
            "subjectId": r.get::<_, String>(0)?,
            "subjectCode": r.get::<_, String>(1)?,
            "subjectName": r.get::<_, String>(2)?,
            "branch": r.get::<_, String>(3)?,
            "semester": r.get::<_, i64>(4)?,
        }))
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_err)
}

fn teachers_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let name = get_required_str(params, "name")?.trim().to_string();
    let department = get_required_str(params, "department")?.trim().to_uppercase();
    if name.is_empty() || department.is_empty() {
        return Err(bad_params("name and department must not be empty"));
    }
    let email = get_optional_str(params, "email");

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO teachers(id, name, email, department, approved, active) VALUES(?, ?, ?, ?, 0, 1)",
        (&id, &name, &email, &department),
    )
    .map_err(db_write_err)?;

    Ok(json!({
        "teacher": {
            "id": id,
            "name": name,
            "email": email,
            "department": department,
            "approved": false,
            "active": true,
        }
    }))
}

fn teachers_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let department = get_optional_str(params, "department").map(|d| d.to_uppercase());
    let include_inactive = get_optional_bool(params, "includeInactive").unwrap_or(false);

    let mut sql = String::from(
        "SELECT id, name, email, department, approved, active FROM teachers WHERE 1=1",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    if let Some(d) = &department {
        sql.push_str(" AND department = ?");
        args.push(Box::new(d.clone()));
    }
    if !include_inactive {
        sql.push_str(" AND active = 1");
    }
    sql.push_str(" ORDER BY name");

    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let base = stmt
        .query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, Option<String>>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, i64>(4)? != 0,
                    r.get::<_, i64>(5)? != 0,
                ))
            },
        )
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;

    let mut rows = Vec::with_capacity(base.len());
    for (id, name, email, department, approved, active) in base {
        let assignments = assignments_for(conn, &id)?;
        rows.push(json!({
            "id": id,
            "name": name,
            "email": email,
            "department": department,
            "approved": approved,
            "active": active,
            "assignments": assignments,
        }));
    }

    Ok(json!({ "count": rows.len(), "teachers": rows }))
}

fn teachers_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let teacher_id = get_required_str(params, "teacherId")?;

    let existing = conn
        .query_row(
            "SELECT name, email, department, active FROM teachers WHERE id = ?",
            [&teacher_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)? != 0,
                ))
            },
        )
        .optional()
        .map_err(db_err)?;
    let Some((name, email, department, active)) = existing else {
        return Err(not_found("teacher"));
    };

    let name = get_optional_str(params, "name").unwrap_or(name);
    let email = get_optional_str(params, "email").or(email);
    let department = get_optional_str(params, "department")
        .map(|d| d.to_uppercase())
        .unwrap_or(department);
    let active = get_optional_bool(params, "active").unwrap_or(active);

    conn.execute(
        "UPDATE teachers SET name = ?, email = ?, department = ?, active = ? WHERE id = ?",
        (&name, &email, &department, active as i64, &teacher_id),
    )
    .map_err(db_write_err)?;

    Ok(json!({
        "teacher": {
            "id": teacher_id,
            "name": name,
            "email": email,
            "department": department,
            "active": active,
        }
    }))
}

fn teachers_approve(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let teacher_id = get_required_str(params, "teacherId")?;
    let changed = conn
        .execute("UPDATE teachers SET approved = 1 WHERE id = ?", [&teacher_id])
        .map_err(db_write_err)?;
    if changed == 0 {
        return Err(not_found("teacher"));
    }
    Ok(json!({ "ok": true, "approved": true }))
}

fn teachers_assign(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let teacher_id = get_required_str(params, "teacherId")?;
    let subject_id = get_required_str(params, "subjectId")?;
    let branch = get_required_str(params, "branch")?.to_uppercase();
    let semester = require_semester(get_required_i64(params, "semester")?)?;

    let teacher_known = conn
        .query_row("SELECT 1 FROM teachers WHERE id = ?", [&teacher_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()
        .map_err(db_err)?
        .is_some();
    if !teacher_known {
        return Err(not_found("teacher"));
    }
    if find_subject(conn, &subject_id)?.is_none() {
        return Err(not_found("subject"));
    }

    // Idempotent: re-assigning an existing tuple is a no-op.
    conn.execute(
        "INSERT OR IGNORE INTO teacher_assignments(teacher_id, subject_id, branch, semester)
         VALUES(?, ?, ?, ?)",
        (&teacher_id, &subject_id, &branch, semester),
    )
    .map_err(db_write_err)?;

    Ok(json!({
        "ok": true,
        "assignments": assignments_for(conn, &teacher_id)?,
    }))
}

fn teachers_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let teacher_id = get_required_str(params, "teacherId")?;
    let changed = conn
        .execute("UPDATE teachers SET active = 0 WHERE id = ?", [&teacher_id])
        .map_err(db_write_err)?;
    if changed == 0 {
        return Err(not_found("teacher"));
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
        "teachers.create" => Some(dispatch(state, req, teachers_create)),
        "teachers.list" => Some(dispatch(state, req, teachers_list)),
        "teachers.update" => Some(dispatch(state, req, teachers_update)),
        "teachers.approve" => Some(dispatch(state, req, teachers_approve)),
        "teachers.assign" => Some(dispatch(state, req, teachers_assign)),
        "teachers.delete" => Some(dispatch(state, req, teachers_delete)),
        _ => None,
    }
}
