use crate::ipc::error::err;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: &'static str, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn bad_params(message: impl Into<String>) -> HandlerErr {
    HandlerErr::new("bad_params", message)
}

pub fn not_found(what: &str) -> HandlerErr {
    HandlerErr::new("not_found", format!("{} not found", what))
}

pub fn db_err(e: rusqlite::Error) -> HandlerErr {
    HandlerErr::new("db_query_failed", e.to_string())
}

pub fn db_write_err(e: rusqlite::Error) -> HandlerErr {
    HandlerErr::new("db_update_failed", e.to_string())
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| bad_params(format!("missing {}", key)))
}

pub fn get_optional_i64(params: &serde_json::Value, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.as_i64())
}

pub fn get_optional_bool(params: &serde_json::Value, key: &str) -> Option<bool> {
    params.get(key).and_then(|v| v.as_bool())
}

pub fn get_string_array(params: &serde_json::Value, key: &str) -> Result<Vec<String>, HandlerErr> {
    let Some(arr) = params.get(key).and_then(|v| v.as_array()) else {
        return Err(bad_params(format!("missing {}", key)));
    };
    let mut out = Vec::with_capacity(arr.len());
    for v in arr {
        let Some(s) = v.as_str() else {
            return Err(bad_params(format!("{} must be an array of strings", key)));
        };
        out.push(s.to_string());
    }
    Ok(out)
}

/// Semester must be 1..=8 everywhere it appears.
pub fn require_semester(semester: i64) -> Result<i64, HandlerErr> {
    if (1..=8).contains(&semester) {
        Ok(semester)
    } else {
        Err(bad_params("semester must be between 1 and 8"))
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| bad_params("date must be YYYY-MM-DD"))
}

// --- actor (the single tagged principal) -------------------------------

fn actor_of(params: &serde_json::Value) -> Result<(String, Option<String>), HandlerErr> {
    let Some(actor) = params.get("actor") else {
        return Err(bad_params("missing actor"));
    };
    let role = actor
        .get("role")
        .and_then(|v| v.as_str())
        .ok_or_else(|| bad_params("missing actor.role"))?;
    match role {
        "admin" | "teacher" | "student" => {}
        _ => return Err(bad_params("actor.role must be admin, teacher or student")),
    }
    let id = actor
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    Ok((role.to_string(), id))
}

pub fn require_admin(params: &serde_json::Value) -> Result<(), HandlerErr> {
    let (role, _) = actor_of(params)?;
    if role == "admin" {
        Ok(())
    } else {
        Err(HandlerErr::new("not_authorized", "admin role required"))
    }
}

/// Returns the teacher id the caller acts as.
pub fn require_teacher(params: &serde_json::Value) -> Result<String, HandlerErr> {
    let (role, id) = actor_of(params)?;
    if role != "teacher" {
        return Err(HandlerErr::new("not_authorized", "teacher role required"));
    }
    id.ok_or_else(|| bad_params("missing actor.id"))
}

/// Admin, or the student acting on their own row.
pub fn require_admin_or_self(params: &serde_json::Value, student_id: &str) -> Result<(), HandlerErr> {
    let (role, id) = actor_of(params)?;
    match role.as_str() {
        "admin" => Ok(()),
        "student" if id.as_deref() == Some(student_id) => Ok(()),
        _ => Err(HandlerErr::new(
            "not_authorized",
            "admin role or the student themself required",
        )),
    }
}

// --- shared lookups ----------------------------------------------------

pub struct SubjectRow {
    pub id: String,
    pub code: String,
    pub name: String,
    pub branch: String,
    pub semester: i64,
}

pub fn find_subject(conn: &Connection, subject_id: &str) -> Result<Option<SubjectRow>, HandlerErr> {
    conn.query_row(
        "SELECT id, code, name, branch, semester FROM subjects WHERE id = ?",
        [subject_id],
        |r| {
            Ok(SubjectRow {
                id: r.get(0)?,
                code: r.get(1)?,
                name: r.get(2)?,
                branch: r.get(3)?,
                semester: r.get(4)?,
            })
        },
    )
    .optional()
    .map_err(db_err)
}

pub fn teacher_exists(conn: &Connection, teacher_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM teachers WHERE id = ?", [teacher_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(db_err)
}
