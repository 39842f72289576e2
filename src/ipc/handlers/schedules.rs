use crate::agg;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_err, db_write_err, find_subject, get_optional_i64, get_optional_str,
    get_required_i64, get_required_str, get_string_array, not_found, require_admin,
    require_semester, teacher_exists, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

const SCHEDULE_DAYS: [&str; 6] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

fn validate_days(days: &[String]) -> Result<(), HandlerErr> {
    if days.is_empty() {
        return Err(bad_params("days must not be empty"));
    }
    for d in days {
        if !SCHEDULE_DAYS.contains(&d.as_str()) {
            return Err(bad_params(format!("invalid weekday: {}", d)));
        }
    }
    Ok(())
}

fn parse_span(start: &str, end: &str) -> Result<(i64, i64), HandlerErr> {
    let s = agg::minutes_of(start).ok_or_else(|| bad_params("startTime must be HH:MM"))?;
    let e = agg::minutes_of(end).ok_or_else(|| bad_params("endTime must be HH:MM"))?;
    if s >= e {
        return Err(bad_params("startTime must be before endTime"));
    }
    Ok((s, e))
}

/// Every active block of the same teacher that shares a weekday with the
/// proposed set and overlaps it in [start, end).
fn find_collisions(
    conn: &Connection,
    teacher_id: &str,
    days: &[String],
    start_min: i64,
    end_min: i64,
    exclude_schedule_id: Option<&str>,
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT sc.id, sc.days, sc.start_time, sc.end_time, su.name
             FROM schedules sc
             JOIN subjects su ON su.id = sc.subject_id
             WHERE sc.teacher_id = ? AND sc.active = 1
             ORDER BY sc.start_time",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map([teacher_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;

    let mut collisions = Vec::new();
    for (id, existing_days, start, end, subject_name) in rows {
        if exclude_schedule_id == Some(id.as_str()) {
            continue;
        }
        let existing: Vec<&str> = existing_days.split(',').collect();
        if !days.iter().any(|d| existing.contains(&d.as_str())) {
            continue;
        }
        let (Some(s2), Some(e2)) = (agg::minutes_of(&start), agg::minutes_of(&end)) else {
            continue;
        };
        if agg::spans_overlap(start_min, end_min, s2, e2) {
            collisions.push(json!({
                "scheduleId": id,
                "subject": subject_name,
                "days": existing,
                "time": format!("{} - {}", start, end),
            }));
        }
    }
    Ok(collisions)
}

fn schedule_json(
    id: &str,
    teacher_id: &str,
    subject_id: &str,
    branch: &str,
    semester: i64,
    days: &str,
    period_label: &str,
    start_time: &str,
    end_time: &str,
    active: bool,
) -> serde_json::Value {
    json!({
        "id": id,
        "teacherId": teacher_id,
        "subjectId": subject_id,
        "branch": branch,
        "semester": semester,
        "days": days.split(',').collect::<Vec<_>>(),
        "period": period_label,
        "startTime": start_time,
        "endTime": end_time,
        "active": active,
    })
}

fn schedules_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let teacher_id = get_required_str(params, "teacherId")?;
    let subject_id = get_required_str(params, "subjectId")?;
    let branch = get_required_str(params, "branch")?.to_uppercase();
    let semester = require_semester(get_required_i64(params, "semester")?)?;
    let days = get_string_array(params, "days")?;
    validate_days(&days)?;
    let period_label = get_required_str(params, "period")?;
    let start_time = get_required_str(params, "startTime")?;
    let end_time = get_required_str(params, "endTime")?;
    let (start_min, end_min) = parse_span(&start_time, &end_time)?;

    if !teacher_exists(conn, &teacher_id)? {
        return Err(not_found("teacher"));
    }
    if find_subject(conn, &subject_id)?.is_none() {
        return Err(not_found("subject"));
    }

    let collisions = find_collisions(conn, &teacher_id, &days, start_min, end_min, None)?;
    if !collisions.is_empty() {
        return Err(HandlerErr::with_details(
            "schedule_conflict",
            "proposed block overlaps an existing schedule",
            json!({ "collisions": collisions }),
        ));
    }

    // The teacher implicitly picks up the assignment when scheduled.
    conn.execute(
        "INSERT OR IGNORE INTO teacher_assignments(teacher_id, subject_id, branch, semester)
         VALUES(?, ?, ?, ?)",
        (&teacher_id, &subject_id, &branch, semester),
    )
    .map_err(db_write_err)?;

    let id = Uuid::new_v4().to_string();
    let days_joined = days.join(",");
    conn.execute(
        "INSERT INTO schedules(id, teacher_id, subject_id, branch, semester, days, period_label, start_time, end_time, active)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        (
            &id,
            &teacher_id,
            &subject_id,
            &branch,
            semester,
            &days_joined,
            &period_label,
            &start_time,
            &end_time,
        ),
    )
    .map_err(db_write_err)?;

    Ok(json!({
        "schedule": schedule_json(
            &id,
            &teacher_id,
            &subject_id,
            &branch,
            semester,
            &days_joined,
            &period_label,
            &start_time,
            &end_time,
            true,
        )
    }))
}

fn schedules_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_optional_str(params, "teacherId");
    let branch = get_optional_str(params, "branch").map(|b| b.to_uppercase());
    let semester = get_optional_i64(params, "semester");
    let day = get_optional_str(params, "day");

    let mut sql = String::from(
        "SELECT sc.id, sc.teacher_id, sc.subject_id, sc.branch, sc.semester, sc.days,
                sc.period_label, sc.start_time, sc.end_time, sc.active,
                su.code, su.name, t.name
         FROM schedules sc
         JOIN subjects su ON su.id = sc.subject_id
         JOIN teachers t ON t.id = sc.teacher_id
         WHERE sc.active = 1",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    if let Some(t) = &teacher_id {
        sql.push_str(" AND sc.teacher_id = ?");
        args.push(Box::new(t.clone()));
    }
    if let Some(b) = &branch {
        sql.push_str(" AND sc.branch = ?");
        args.push(Box::new(b.clone()));
    }
    if let Some(s) = semester {
        sql.push_str(" AND sc.semester = ?");
        args.push(Box::new(s));
    }
    sql.push_str(" ORDER BY sc.start_time");

    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let mut rows = stmt
        .query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            |r| {
                let mut v = schedule_json(
                    &r.get::<_, String>(0)?,
                    &r.get::<_, String>(1)?,
                    &r.get::<_, String>(2)?,
                    &r.get::<_, String>(3)?,
                    r.get::<_, i64>(4)?,
                    &r.get::<_, String>(5)?,
                    &r.get::<_, String>(6)?,
                    &r.get::<_, String>(7)?,
                    &r.get::<_, String>(8)?,
                    r.get::<_, i64>(9)? != 0,
                );
                v["subjectCode"] = json!(r.get::<_, String>(10)?);
                v["subjectName"] = json!(r.get::<_, String>(11)?);
                v["teacherName"] = json!(r.get::<_, String>(12)?);
                Ok(v)
            },
        )
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;

    if let Some(day) = day {
        rows.retain(|v| {
            v["days"]
                .as_array()
                .map(|ds| ds.iter().any(|d| d.as_str() == Some(day.as_str())))
                .unwrap_or(false)
        });
    }

    Ok(json!({ "count": rows.len(), "schedules": rows }))
}

fn schedules_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let schedule_id = get_required_str(params, "scheduleId")?;

    let existing = conn
        .query_row(
            "SELECT teacher_id, subject_id, branch, semester, days, period_label, start_time, end_time, active
             FROM schedules WHERE id = ?",
            [&schedule_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, String>(6)?,
                    r.get::<_, String>(7)?,
                    r.get::<_, i64>(8)? != 0,
                ))
            },
        )
        .optional()
        .map_err(db_err)?;
    let Some((teacher_id, subject_id, branch, semester, days, period_label, start_time, end_time, active)) =
        existing
    else {
        return Err(not_found("schedule"));
    };

    let teacher_id = match get_optional_str(params, "teacherId") {
        Some(t) => {
            if !teacher_exists(conn, &t)? {
                return Err(not_found("teacher"));
            }
            t
        }
        None => teacher_id,
    };
    let subject_id = match get_optional_str(params, "subjectId") {
        Some(s) => {
            if find_subject(conn, &s)?.is_none() {
                return Err(not_found("subject"));
            }
            s
        }
        None => subject_id,
    };
    let branch = get_optional_str(params, "branch")
        .map(|b| b.to_uppercase())
        .unwrap_or(branch);
    let semester = match get_optional_i64(params, "semester") {
        Some(s) => require_semester(s)?,
        None => semester,
    };
    let days: Vec<String> = match params.get("days") {
        Some(_) => {
            let d = get_string_array(params, "days")?;
            validate_days(&d)?;
            d
        }
        None => days.split(',').map(|s| s.to_string()).collect(),
    };
    let period_label = get_optional_str(params, "period").unwrap_or(period_label);
    let start_time = get_optional_str(params, "startTime").unwrap_or(start_time);
    let end_time = get_optional_str(params, "endTime").unwrap_or(end_time);
    let (start_min, end_min) = parse_span(&start_time, &end_time)?;

    // Editing a block in place must not collide with itself.
    let collisions = find_collisions(
        conn,
        &teacher_id,
        &days,
        start_min,
        end_min,
        Some(schedule_id.as_str()),
    )?;
    if !collisions.is_empty() {
        return Err(HandlerErr::with_details(
            "schedule_conflict",
            "proposed block overlaps an existing schedule",
            json!({ "collisions": collisions }),
        ));
    }

    let days_joined = days.join(",");
    conn.execute(
        "UPDATE schedules SET teacher_id = ?, subject_id = ?, branch = ?, semester = ?, days = ?, period_label = ?, start_time = ?, end_time = ? WHERE id = ?",
        (
            &teacher_id,
            &subject_id,
            &branch,
            semester,
            &days_joined,
            &period_label,
            &start_time,
            &end_time,
            &schedule_id,
        ),
    )
    .map_err(db_write_err)?;

    Ok(json!({
        "schedule": schedule_json(
            &schedule_id,
            &teacher_id,
            &subject_id,
            &branch,
            semester,
            &days_joined,
            &period_label,
            &start_time,
            &end_time,
            active,
        )
    }))
}

fn schedules_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_admin(params)?;
    let schedule_id = get_required_str(params, "scheduleId")?;
    let changed = conn
        .execute("UPDATE schedules SET active = 0 WHERE id = ?", [&schedule_id])
        .map_err(db_write_err)?;
    if changed == 0 {
        return Err(not_found("schedule"));
    }
    Ok(json!({ "ok": true }))
}

fn schedules_check_conflict(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;
    let days = get_string_array(params, "days")?;
    validate_days(&days)?;
    let start_time = get_required_str(params, "startTime")?;
    let end_time = get_required_str(params, "endTime")?;
    let (start_min, end_min) = parse_span(&start_time, &end_time)?;
    let exclude = get_optional_str(params, "excludeScheduleId");

    let collisions = find_collisions(
        conn,
        &teacher_id,
        &days,
        start_min,
        end_min,
        exclude.as_deref(),
    )?;
    Ok(json!({
        "conflict": !collisions.is_empty(),
        "collisions": collisions,
    }))
}

fn schedules_weekly(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_str(params, "teacherId")?;
    if !teacher_exists(conn, &teacher_id)? {
        return Err(not_found("teacher"));
    }

    let listed = schedules_list(conn, &json!({ "teacherId": teacher_id }))?;
    let mut weekly = serde_json::Map::new();
    for day in SCHEDULE_DAYS {
        weekly.insert(day.to_string(), json!([]));
    }
    if let Some(schedules) = listed["schedules"].as_array() {
        for sc in schedules {
            let Some(days) = sc["days"].as_array() else {
                continue;
            };
            for day in days {
                let Some(day) = day.as_str() else { continue };
                if let Some(slot) = weekly.get_mut(day).and_then(|v| v.as_array_mut()) {
                    slot.push(sc.clone());
                }
            }
        }
    }
    Ok(json!({ "teacherId": teacher_id, "weekly": weekly }))
}

fn schedules_today(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    // Explicit clock boundary: callers (and tests) can pin the instant.
    let (date, now_min) = match get_optional_str(params, "asOf") {
        Some(raw) => {
            let (d, t) = match raw.split_once(' ') {
                Some((d, t)) => (
                    crate::ipc::helpers::parse_date(d)?,
                    agg::minutes_of(t)
                        .ok_or_else(|| bad_params("asOf must be YYYY-MM-DD or YYYY-MM-DD HH:MM"))?,
                ),
                None => (crate::ipc::helpers::parse_date(&raw)?, 0),
            };
            (d, t)
        }
        None => {
            use chrono::Timelike;
            let now = chrono::Local::now();
            (now.date_naive(), (now.hour() * 60 + now.minute()) as i64)
        }
    };
    let day = agg::weekday_name(date);

    let listed = schedules_list(conn, &json!({ "day": day }))?;
    let mut rows = Vec::new();
    if let Some(schedules) = listed["schedules"].as_array() {
        for sc in schedules {
            let mut sc = sc.clone();
            let status = match (
                sc["startTime"].as_str().and_then(agg::minutes_of),
                sc["endTime"].as_str().and_then(agg::minutes_of),
            ) {
                (Some(s), Some(e)) if now_min >= s && now_min < e => "active",
                (Some(s), _) if now_min < s => "upcoming",
                _ => "completed",
            };
            sc["status"] = json!(status);
            rows.push(sc);
        }
    }
    Ok(json!({
        "date": date.format("%Y-%m-%d").to_string(),
        "day": day,
        "count": rows.len(),
        "schedules": rows,
    }))
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
        "schedules.create" => Some(dispatch(state, req, schedules_create)),
        "schedules.list" => Some(dispatch(state, req, schedules_list)),
        "schedules.update" => Some(dispatch(state, req, schedules_update)),
        "schedules.delete" => Some(dispatch(state, req, schedules_delete)),
        "schedules.checkConflict" => Some(dispatch(state, req, schedules_check_conflict)),
        "schedules.weekly" => Some(dispatch(state, req, schedules_weekly)),
        "schedules.today" => Some(dispatch(state, req, schedules_today)),
        _ => None,
    }
}
