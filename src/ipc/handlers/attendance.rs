use crate::agg::{self, PeriodStatus};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    bad_params, db_err, db_write_err, find_subject, get_optional_str, get_required_str, not_found,
    parse_date, require_teacher, HandlerErr, SubjectRow,
};
use crate::ipc::types::{AppState, Request};
use crate::notify::{self, DispatchReport, PushNotifier, Recipient};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

struct ScheduleRow {
    teacher_id: String,
    subject_id: String,
    branch: String,
    semester: i64,
    start_time: String,
    end_time: String,
}

fn find_schedule(conn: &Connection, schedule_id: &str) -> Result<Option<ScheduleRow>, HandlerErr> {
    conn.query_row(
        "SELECT teacher_id, subject_id, branch, semester, start_time, end_time
         FROM schedules WHERE id = ? AND active = 1",
        [schedule_id],
        |r| {
            Ok(ScheduleRow {
                teacher_id: r.get(0)?,
                subject_id: r.get(1)?,
                branch: r.get(2)?,
                semester: r.get(3)?,
                start_time: r.get(4)?,
                end_time: r.get(5)?,
            })
        },
    )
    .optional()
    .map_err(db_err)
}

/// Marking and editing are reserved for the schedule's own teacher, and only
/// once an admin has approved them.
fn require_owning_teacher(
    conn: &Connection,
    params: &serde_json::Value,
    schedule: &ScheduleRow,
) -> Result<String, HandlerErr> {
    let teacher_id = require_teacher(params)?;
    if teacher_id != schedule.teacher_id {
        return Err(HandlerErr::new(
            "not_authorized",
            "only the schedule's teacher can mark this class",
        ));
    }
    let row = conn
        .query_row(
            "SELECT approved, active FROM teachers WHERE id = ?",
            [&teacher_id],
            |r| Ok((r.get::<_, i64>(0)? != 0, r.get::<_, i64>(1)? != 0)),
        )
        .optional()
        .map_err(db_err)?;
    match row {
        Some((true, true)) => Ok(teacher_id),
        Some(_) => Err(HandlerErr::new(
            "not_authorized",
            "teacher account is not approved",
        )),
        None => Err(not_found("teacher")),
    }
}

struct MarkPeriod {
    number: i64,
    start_time: String,
    end_time: String,
}

fn parse_periods(
    params: &serde_json::Value,
    schedule: &ScheduleRow,
) -> Result<Vec<MarkPeriod>, HandlerErr> {
    let Some(arr) = params.get("periods").and_then(|v| v.as_array()) else {
        return Err(bad_params("missing periods"));
    };
    if arr.is_empty() {
        return Err(bad_params("periods must not be empty"));
    }
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(arr.len());
    for p in arr {
        let number = p
            .get("periodNumber")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| bad_params("each period needs a periodNumber"))?;
        if number <= 0 {
            return Err(bad_params("periodNumber must be positive"));
        }
        if !seen.insert(number) {
            return Err(bad_params(format!("duplicate periodNumber {}", number)));
        }
        let start_time = p
            .get("startTime")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| schedule.start_time.clone());
        let end_time = p
            .get("endTime")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| schedule.end_time.clone());
        if agg::minutes_of(&start_time).is_none() || agg::minutes_of(&end_time).is_none() {
            return Err(bad_params("period times must be HH:MM"));
        }
        out.push(MarkPeriod {
            number,
            start_time,
            end_time,
        });
    }
    Ok(out)
}

struct MarkStudent {
    id: String,
    status: PeriodStatus,
}

fn parse_students(params: &serde_json::Value) -> Result<Vec<MarkStudent>, HandlerErr> {
    let Some(arr) = params.get("students").and_then(|v| v.as_array()) else {
        return Err(bad_params("missing students"));
    };
    if arr.is_empty() {
        return Err(bad_params("students must not be empty"));
    }
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(arr.len());
    for s in arr {
        let id = s
            .get("studentId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| bad_params("each student needs a studentId"))?;
        if !seen.insert(id.to_string()) {
            return Err(bad_params(format!("duplicate studentId {}", id)));
        }
        let status = s
            .get("status")
            .and_then(|v| v.as_str())
            .and_then(PeriodStatus::parse)
            .ok_or_else(|| bad_params("status must be present or absent"))?;
        out.push(MarkStudent {
            id: id.to_string(),
            status,
        });
    }
    Ok(out)
}

fn recipient_of(conn: &Connection, student_id: &str) -> Result<Option<Recipient>, HandlerErr> {
    conn.query_row(
        "SELECT roll_number, push_token, notify_enabled FROM students WHERE id = ?",
        [student_id],
        |r| {
            Ok(Recipient {
                roll_number: r.get(0)?,
                push_token: r.get(1)?,
                notify_enabled: r.get::<_, i64>(2)? != 0,
            })
        },
    )
    .optional()
    .map_err(db_err)
}

fn subject_summary(
    conn: &Connection,
    student_id: &str,
    subject_id: &str,
) -> Result<agg::AttendanceSummary, HandlerErr> {
    let (total, attended) = conn
        .query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'present' THEN 1 ELSE 0 END), 0)
             FROM attendance_periods WHERE student_id = ? AND subject_id = ?",
            [student_id, subject_id],
            |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)),
        )
        .map_err(db_err)?;
    Ok(agg::AttendanceSummary {
        total_classes: total,
        attended_classes: attended,
        percentage: agg::percentage(attended, total),
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn attendance_mark(
    conn: &Connection,
    notifier: &dyn PushNotifier,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let schedule_id = get_required_str(params, "scheduleId")?;
    let Some(schedule) = find_schedule(conn, &schedule_id)? else {
        return Err(not_found("schedule"));
    };
    let teacher_id = require_owning_teacher(conn, params, &schedule)?;
    let date = parse_date(&get_required_str(params, "date")?)?;
    let date_str = date.format("%Y-%m-%d").to_string();
    let day = agg::weekday_name(date);
    let periods = parse_periods(params, &schedule)?;
    let students = parse_students(params)?;
    let Some(subject) = find_subject(conn, &schedule.subject_id)? else {
        return Err(not_found("subject"));
    };

    // Everything validated up front so the transaction only writes.
    let mut recipients = HashMap::new();
    for s in &students {
        let Some(r) = recipient_of(conn, &s.id)? else {
            return Err(HandlerErr::with_details(
                "not_found",
                "student not found",
                json!({ "studentId": s.id }),
            ));
        };
        recipients.insert(s.id.clone(), r);
    }

    let requested: Vec<i64> = periods.iter().map(|p| p.number).collect();
    let tx = conn.unchecked_transaction().map_err(db_write_err)?;
    for s in &students {
        let mut stmt = tx
            .prepare(
                "SELECT period_number FROM attendance_periods
                 WHERE student_id = ? AND subject_id = ? AND date = ?",
            )
            .map_err(db_err)?;
        let existing = stmt
            .query_map((&s.id, &schedule.subject_id, &date_str), |r| {
                r.get::<_, i64>(0)
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(db_err)?;
        let conflicts: Vec<i64> = requested
            .iter()
            .copied()
            .filter(|n| existing.contains(n))
            .collect();
        if !conflicts.is_empty() {
            // Whole batch rejected: the caller resubmits with corrected
            // periods rather than getting a half-marked class.
            return Err(HandlerErr::with_details(
                "already_marked",
                "attendance already marked for one or more requested periods",
                json!({
                    "studentId": s.id,
                    "rollNumber": recipients[&s.id].roll_number,
                    "periods": conflicts,
                }),
            ));
        }
    }

    let marked_at = chrono::Utc::now().to_rfc3339();
    for s in &students {
        let record_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO attendance_records(id, student_id, subject_id, teacher_id, date, day, marked_by, marked_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &record_id,
                &s.id,
                &schedule.subject_id,
                &teacher_id,
                &date_str,
                day,
                &teacher_id,
                &marked_at,
            ),
        )
        .map_err(db_write_err)?;
        for p in &periods {
            tx.execute(
                "INSERT INTO attendance_periods(record_id, student_id, subject_id, date, period_number, start_time, end_time, status)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &record_id,
                    &s.id,
                    &schedule.subject_id,
                    &date_str,
                    p.number,
                    &p.start_time,
                    &p.end_time,
                    s.status.as_str(),
                ),
            )
            .map_err(|e| {
                // The natural key closes the race the pre-check cannot.
                if is_unique_violation(&e) {
                    HandlerErr::with_details(
                        "already_marked",
                        "attendance already marked for one or more requested periods",
                        json!({ "studentId": s.id, "periods": [p.number] }),
                    )
                } else {
                    db_write_err(e)
                }
            })?;
        }
    }
    tx.commit().map_err(db_write_err)?;

    // Dispatch after commit; a failed push never unmarks anyone.
    let mut report = DispatchReport::default();
    let mut present = 0;
    let mut absent = 0;
    for s in &students {
        match s.status {
            PeriodStatus::Present => present += 1,
            PeriodStatus::Absent => absent += 1,
        }
        let summary = subject_summary(conn, &s.id, &schedule.subject_id)?;
        report.tally(notify::notify_marked(
            notifier,
            &recipients[&s.id],
            &subject.id,
            &subject.name,
            s.status,
            summary.percentage,
        ));
    }

    Ok(json!({
        "date": date_str,
        "day": day,
        "subject": { "id": subject.id, "code": subject.code, "name": subject.name },
        "class": format!("{} - Sem {}", schedule.branch, schedule.semester),
        "periods": requested,
        "presentCount": present,
        "absentCount": absent,
        "totalStudents": students.len(),
        "notifications": report,
    }))
}

fn attendance_edit(
    conn: &Connection,
    notifier: &dyn PushNotifier,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let schedule_id = get_required_str(params, "scheduleId")?;
    let Some(schedule) = find_schedule(conn, &schedule_id)? else {
        return Err(not_found("schedule"));
    };
    let teacher_id = require_owning_teacher(conn, params, &schedule)?;
    let date = parse_date(&get_required_str(params, "date")?)?;
    let date_str = date.format("%Y-%m-%d").to_string();
    let periods = parse_periods(params, &schedule)?;
    let students = parse_students(params)?;
    let Some(subject) = find_subject(conn, &schedule.subject_id)? else {
        return Err(not_found("subject"));
    };

    let requested: Vec<i64> = periods.iter().map(|p| p.number).collect();
    let marked_at = chrono::Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction().map_err(db_write_err)?;
    let mut touched = Vec::new();
    for s in &students {
        let mut changed = 0usize;
        for n in &requested {
            changed += tx
                .execute(
                    "UPDATE attendance_periods SET status = ?
                     WHERE student_id = ? AND subject_id = ? AND date = ? AND period_number = ?",
                    (s.status.as_str(), &s.id, &schedule.subject_id, &date_str, n),
                )
                .map_err(db_write_err)?;
        }
        if changed > 0 {
            tx.execute(
                "UPDATE attendance_records SET marked_by = ?, marked_at = ?
                 WHERE student_id = ? AND subject_id = ? AND date = ?",
                (&teacher_id, &marked_at, &s.id, &schedule.subject_id, &date_str),
            )
            .map_err(db_write_err)?;
            touched.push(s);
        }
    }
    if touched.is_empty() {
        return Err(HandlerErr::new(
            "nothing_to_edit",
            "no recorded periods match the requested edit",
        ));
    }
    tx.commit().map_err(db_write_err)?;

    let mut report = DispatchReport::default();
    for s in &touched {
        let Some(recipient) = recipient_of(conn, &s.id)? else {
            continue;
        };
        let summary = subject_summary(conn, &s.id, &schedule.subject_id)?;
        report.tally(notify::notify_marked(
            notifier,
            &recipient,
            &subject.id,
            &subject.name,
            s.status,
            summary.percentage,
        ));
    }

    Ok(json!({
        "date": date_str,
        "subject": { "id": subject.id, "code": subject.code, "name": subject.name },
        "periods": requested,
        "updatedStudents": touched.len(),
        "notifications": report,
    }))
}

fn attendance_student_summary(
    conn: &Connection,
    _notifier: &dyn PushNotifier,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let subject_id = get_required_str(params, "subjectId")?;
    let Some(subject) = find_subject(conn, &subject_id)? else {
        return Err(not_found("subject"));
    };
    let student = conn
        .query_row(
            "SELECT roll_number, name FROM students WHERE id = ?",
            [&student_id],
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
        )
        .optional()
        .map_err(db_err)?;
    let Some((roll_number, name)) = student else {
        return Err(not_found("student"));
    };

    let mut stmt = conn
        .prepare(
            "SELECT date, status FROM attendance_periods
             WHERE student_id = ? AND subject_id = ? ORDER BY date",
        )
        .map_err(db_err)?;
    let entries = stmt
        .query_map([&student_id, &subject_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;

    let mut statuses = Vec::with_capacity(entries.len());
    let mut dated = Vec::with_capacity(entries.len());
    for (date, status) in &entries {
        let Some(status) = PeriodStatus::parse(status) else {
            continue;
        };
        statuses.push(status);
        if let Ok(d) = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            dated.push((d, status));
        }
    }
    let summary = agg::summarize(statuses);
    let monthly = agg::monthly_breakdown(dated);

    Ok(json!({
        "student": { "id": student_id, "rollNumber": roll_number, "name": name },
        "subject": { "id": subject.id, "code": subject.code, "name": subject.name },
        "summary": summary,
        "monthlyBreakdown": monthly,
    }))
}

fn attendance_student_overview(
    conn: &Connection,
    _notifier: &dyn PushNotifier,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let student = conn
        .query_row(
            "SELECT roll_number, name, branch, semester FROM students WHERE id = ?",
            [&student_id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)?,
                ))
            },
        )
        .optional()
        .map_err(db_err)?;
    let Some((roll_number, name, branch, semester)) = student else {
        return Err(not_found("student"));
    };

    let mut stmt = conn
        .prepare(
            "SELECT id, code, name FROM subjects
             WHERE branch = ? AND semester = ? AND active = 1 ORDER BY code",
        )
        .map_err(db_err)?;
    let subjects = stmt
        .query_map((&branch, semester), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;

    let mut rows = Vec::with_capacity(subjects.len());
    let mut grand_total = 0;
    let mut grand_attended = 0;
    for (id, code, subject_name) in subjects {
        let summary = subject_summary(conn, &student_id, &id)?;
        grand_total += summary.total_classes;
        grand_attended += summary.attended_classes;
        rows.push(json!({
            "subject": { "id": id, "code": code, "name": subject_name },
            "totalClasses": summary.total_classes,
            "attendedClasses": summary.attended_classes,
            "percentage": summary.percentage,
            "band": agg::band(summary.percentage),
        }));
    }

    Ok(json!({
        "student": {
            "id": student_id,
            "rollNumber": roll_number,
            "name": name,
            "branch": branch,
            "semester": semester,
            "year": agg::year_label(semester),
        },
        "subjects": rows,
        "overall": {
            "totalClasses": grand_total,
            "attendedClasses": grand_attended,
            "percentage": agg::percentage(grand_attended, grand_total),
        },
    }))
}

fn roster_of(
    conn: &Connection,
    subject: &SubjectRow,
) -> Result<Vec<(String, String, String)>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, roll_number, name FROM students
             WHERE branch = ? AND semester = ? AND active = 1 ORDER BY roll_number",
        )
        .map_err(db_err)?;
    stmt.query_map((&subject.branch, subject.semester), |r| {
        Ok((r.get(0)?, r.get(1)?, r.get(2)?))
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_err)
}

fn attendance_class_summary(
    conn: &Connection,
    _notifier: &dyn PushNotifier,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    let Some(subject) = find_subject(conn, &subject_id)? else {
        return Err(not_found("subject"));
    };

    let roster: Vec<(String, String, String)> = match params.get("studentIds") {
        Some(_) => {
            let ids = crate::ipc::helpers::get_string_array(params, "studentIds")?;
            let mut out = Vec::with_capacity(ids.len());
            for id in ids {
                let row = conn
                    .query_row(
                        "SELECT id, roll_number, name FROM students WHERE id = ?",
                        [&id],
                        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                    )
                    .optional()
                    .map_err(db_err)?;
                let Some(row) = row else {
                    return Err(HandlerErr::with_details(
                        "not_found",
                        "student not found",
                        json!({ "studentId": id }),
                    ));
                };
                out.push(row);
            }
            out
        }
        None => roster_of(conn, &subject)?,
    };

    // One pass over the period rows, joined against the roster in memory, so
    // a large class costs one query rather than one per student.
    let mut stmt = conn
        .prepare(
            "SELECT student_id, COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'present' THEN 1 ELSE 0 END), 0)
             FROM attendance_periods WHERE subject_id = ? GROUP BY student_id",
        )
        .map_err(db_err)?;
    let counts: HashMap<String, (i64, i64)> = stmt
        .query_map([&subject_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                (r.get::<_, i64>(1)?, r.get::<_, i64>(2)?),
            ))
        })
        .and_then(|it| it.collect::<Result<HashMap<_, _>, _>>())
        .map_err(db_err)?;

    let mut rows = Vec::with_capacity(roster.len());
    let mut class_total = 0;
    let mut class_attended = 0;
    for (id, roll_number, name) in &roster {
        let (total, attended) = counts.get(id).copied().unwrap_or((0, 0));
        class_total += total;
        class_attended += attended;
        let pct = agg::percentage(attended, total);
        rows.push(json!({
            "studentId": id,
            "rollNumber": roll_number,
            "name": name,
            "totalClasses": total,
            "attendedClasses": attended,
            "percentage": pct,
            "band": agg::band(pct),
        }));
    }

    Ok(json!({
        "subject": { "id": subject.id, "code": subject.code, "name": subject.name },
        "count": rows.len(),
        "students": rows,
        "classAverage": agg::percentage(class_attended, class_total),
    }))
}

fn attendance_records(
    conn: &Connection,
    _notifier: &dyn PushNotifier,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_optional_str(params, "subjectId");
    let student_id = get_optional_str(params, "studentId");
    let date = match get_optional_str(params, "date") {
        Some(raw) => Some(parse_date(&raw)?.format("%Y-%m-%d").to_string()),
        None => None,
    };

    let mut sql = String::from(
        "SELECT r.id, r.student_id, st.roll_number, r.subject_id, su.code, r.date, r.day,
                r.marked_by, r.marked_at
         FROM attendance_records r
         JOIN students st ON st.id = r.student_id
         JOIN subjects su ON su.id = r.subject_id
         WHERE 1 = 1",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    if let Some(s) = &subject_id {
        sql.push_str(" AND r.subject_id = ?");
        args.push(Box::new(s.clone()));
    }
    if let Some(s) = &student_id {
        sql.push_str(" AND r.student_id = ?");
        args.push(Box::new(s.clone()));
    }
    if let Some(d) = &date {
        sql.push_str(" AND r.date = ?");
        args.push(Box::new(d.clone()));
    }
    sql.push_str(" ORDER BY r.date DESC, st.roll_number");

    let mut stmt = conn.prepare(&sql).map_err(db_err)?;
    let records = stmt
        .query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "studentId": r.get::<_, String>(1)?,
                    "rollNumber": r.get::<_, String>(2)?,
                    "subjectId": r.get::<_, String>(3)?,
                    "subjectCode": r.get::<_, String>(4)?,
                    "date": r.get::<_, String>(5)?,
                    "day": r.get::<_, String>(6)?,
                    "markedBy": r.get::<_, String>(7)?,
                    "markedAt": r.get::<_, String>(8)?,
                }))
            },
        )
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;

    let mut out = Vec::with_capacity(records.len());
    for mut record in records {
        let record_id = record["id"].as_str().unwrap_or_default().to_string();
        let mut stmt = conn
            .prepare(
                "SELECT period_number, start_time, end_time, status
                 FROM attendance_periods WHERE record_id = ? ORDER BY period_number",
            )
            .map_err(db_err)?;
        let periods = stmt
            .query_map([&record_id], |r| {
                Ok(json!({
                    "periodNumber": r.get::<_, i64>(0)?,
                    "startTime": r.get::<_, String>(1)?,
                    "endTime": r.get::<_, String>(2)?,
                    "status": r.get::<_, String>(3)?,
                }))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(db_err)?;
        record["periods"] = json!(periods);
        out.push(record);
    }

    Ok(json!({ "count": out.len(), "records": out }))
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
        "attendance.mark" => Some(dispatch(state, req, attendance_mark)),
        "attendance.edit" => Some(dispatch(state, req, attendance_edit)),
        "attendance.studentSummary" => Some(dispatch(state, req, attendance_student_summary)),
        "attendance.studentOverview" => Some(dispatch(state, req, attendance_student_overview)),
        "attendance.classSummary" => Some(dispatch(state, req, attendance_class_summary)),
        "attendance.records" => Some(dispatch(state, req, attendance_records)),
        _ => None,
    }
}
