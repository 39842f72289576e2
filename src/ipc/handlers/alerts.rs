use crate::agg;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_err, get_optional_i64, get_optional_str, parse_date, require_semester,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::notify::{self, DispatchReport, PushNotifier, Recipient};
use rusqlite::Connection;
use serde_json::json;

struct ScanStudent {
    id: String,
    name: String,
    branch: String,
    semester: i64,
    recipient: Recipient,
}

fn students_in_scope(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<Vec<ScanStudent>, HandlerErr> {
    let branch = get_optional_str(params, "branch").map(|b| b.to_uppercase());
    let semester = match get_optional_i64(params, "semester") {
        Some(s) => Some(require_semester(s)?),
        None => None,
    };

    let mut sql = String::from(
        "SELECT id, roll_number, name, branch, semester, push_token, notify_enabled
         FROM students WHERE active = 1",
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
    sql.push_str(" ORDER BY roll_number");

    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    stmt.query_map(
        rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
        |r| {
            Ok(ScanStudent {
                id: r.get(0)?,
                name: r.get(2)?,
                branch: r.get(3)?,
                semester: r.get(4)?,
                recipient: Recipient {
                    roll_number: r.get(1)?,
                    push_token: r.get(5)?,
                    notify_enabled: r.get::<_, i64>(6)? != 0,
                },
            })
        },
    )
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_err)
}

fn subjects_for(
    conn: &Connection,
    branch: &str,
    semester: i64,
) -> Result<Vec<(String, String, String)>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, code, name FROM subjects
             WHERE branch = ? AND semester = ? AND active = 1 ORDER BY code",
        )
        .map_err(db_err)?;
    stmt.query_map((branch, semester), |r| {
        Ok((r.get(0)?, r.get(1)?, r.get(2)?))
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_err)
}

fn counts_for(
    conn: &Connection,
    student_id: &str,
    subject_id: &str,
) -> Result<(i64, i64), HandlerErr> {
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'present' THEN 1 ELSE 0 END), 0)
         FROM attendance_periods WHERE student_id = ? AND subject_id = ?",
        [student_id, subject_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .map_err(db_err)
}

fn alerts_low_attendance(
    conn: &Connection,
    notifier: &dyn PushNotifier,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let threshold = get_optional_i64(params, "threshold").unwrap_or(75);
    if !(1..=99).contains(&threshold) {
        return Err(bad_params("threshold must be between 1 and 99"));
    }
    let min_classes = get_optional_i64(params, "minClasses").unwrap_or(1);
    if min_classes < 1 {
        return Err(bad_params("minClasses must be at least 1"));
    }

    let students = students_in_scope(conn, params)?;
    let mut alerts = Vec::new();
    let mut report = DispatchReport::default();
    for student in &students {
        for (subject_id, code, subject_name) in
            subjects_for(conn, &student.branch, student.semester)?
        {
            let (total, attended) = counts_for(conn, &student.id, &subject_id)?;
            if total < min_classes {
                continue;
            }
            let pct = agg::percentage(attended, total);
            if pct >= threshold {
                continue;
            }
            let needed = agg::classes_needed(threshold, total, attended);
            let delivery = notify::notify_low_attendance(
                notifier,
                &student.recipient,
                &subject_id,
                subject_name.as_str(),
                pct,
                needed,
                threshold,
            );
            report.tally(delivery);
            alerts.push(json!({
                "studentId": student.id,
                "rollNumber": student.recipient.roll_number,
                "name": student.name,
                "subject": { "id": subject_id, "code": code, "name": subject_name },
                "totalClasses": total,
                "attendedClasses": attended,
                "percentage": pct,
                "classesNeeded": needed,
                "delivery": delivery.as_str(),
            }));
        }
    }

    Ok(json!({
        "threshold": threshold,
        "minClasses": min_classes,
        "count": alerts.len(),
        "alerts": alerts,
        "notifications": report,
    }))
}

fn alerts_weekly_summary(
    conn: &Connection,
    notifier: &dyn PushNotifier,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let students = students_in_scope(conn, params)?;
    let mut rows = Vec::new();
    let mut report = DispatchReport::default();
    for student in &students {
        let (total, attended) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'present' THEN 1 ELSE 0 END), 0)
                 FROM attendance_periods WHERE student_id = ?",
                [&student.id],
                |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)),
            )
            .map_err(db_err)?;
        if total == 0 {
            continue;
        }
        let pct = agg::percentage(attended, total);
        let delivery = notify::notify_weekly_summary(notifier, &student.recipient, pct);
        report.tally(delivery);
        rows.push(json!({
            "studentId": student.id,
            "rollNumber": student.recipient.roll_number,
            "percentage": pct,
            "band": agg::band(pct),
            "delivery": delivery.as_str(),
        }));
    }
    Ok(json!({
        "count": rows.len(),
        "students": rows,
        "notifications": report,
    }))
}

fn alerts_daily_reminder(
    conn: &Connection,
    notifier: &dyn PushNotifier,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = match get_optional_str(params, "asOf") {
        Some(raw) => parse_date(&raw)?,
        None => chrono::Local::now().date_naive(),
    };
    let day = agg::weekday_name(date);

    let students = students_in_scope(conn, params)?;
    let mut reminded = Vec::new();
    let mut report = DispatchReport::default();
    for student in &students {
        // Only students with a block on this weekday get the nudge.
        let mut stmt = conn
            .prepare(
                "SELECT days FROM schedules
                 WHERE branch = ? AND semester = ? AND active = 1",
            )
            .map_err(db_err)?;
        let day_lists = stmt
            .query_map((&student.branch, student.semester), |r| {
                r.get::<_, String>(0)
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(db_err)?;
        let has_class = day_lists
            .iter()
            .any(|csv| csv.split(',').any(|d| d == day));
        if !has_class {
            continue;
        }
        let delivery = notify::notify_daily_reminder(notifier, &student.recipient);
        report.tally(delivery);
        reminded.push(json!({
            "studentId": student.id,
            "rollNumber": student.recipient.roll_number,
            "delivery": delivery.as_str(),
        }));
    }

    Ok(json!({
        "date": date.format("%Y-%m-%d").to_string(),
        "day": day,
        "count": reminded.len(),
        "students": reminded,
        "notifications": report,
    }))
}

fn dispatch(
    state: &mut AppState,
    req: &Request,
    f: fn(
        &Connection,
        &dyn PushNotifier,
        &serde_json::Value,
    ) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, state.notifier.as_ref(), &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "alerts.lowAttendance" => Some(dispatch(state, req, alerts_low_attendance)),
        "alerts.weeklySummary" => Some(dispatch(state, req, alerts_weekly_summary)),
        "alerts.dailyReminder" => Some(dispatch(state, req, alerts_daily_reminder)),
        _ => None,
    }
}
