use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value["result"].clone()
}

fn admin() -> serde_json::Value {
    json!({ "role": "admin" })
}

fn teacher(id: &str) -> serde_json::Value {
    json!({ "role": "teacher", "id": id })
}

fn seed_subject(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    code: &str,
    name: &str,
) -> String {
    let subject = request_ok(
        stdin,
        reader,
        &format!("seed-{}", code),
        "subjects.create",
        json!({
            "actor": admin(),
            "code": code,
            "name": name,
            "branch": "CSE",
            "semester": 5,
            "credits": 3
        }),
    );
    subject["subject"]["id"].as_str().expect("subject id").to_string()
}

fn seed_schedule(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    teacher_id: &str,
    subject_id: &str,
    start: &str,
    end: &str,
) -> String {
    let schedule = request_ok(
        stdin,
        reader,
        &format!("seed-sched-{}", start),
        "schedules.create",
        json!({
            "actor": admin(),
            "teacherId": teacher_id,
            "subjectId": subject_id,
            "branch": "CSE",
            "semester": 5,
            "days": ["Monday", "Wednesday"],
            "period": "P1",
            "startTime": start,
            "endTime": end
        }),
    );
    schedule["schedule"]["id"].as_str().expect("schedule id").to_string()
}

#[test]
fn breakdown_groups_by_month_most_recent_first() {
    let workspace = temp_dir("attendanced-monthly");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "0",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let subject_id = seed_subject(&mut stdin, &mut reader, "CS509", "Cryptography");
    let teacher_row = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "teachers.create",
        json!({ "actor": admin(), "name": "H. Varma", "department": "CSE" }),
    );
    let teacher_id = teacher_row["teacher"]["id"].as_str().expect("teacher id").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "teachers.approve",
        json!({ "actor": admin(), "teacherId": teacher_id }),
    );
    let schedule_id = seed_schedule(&mut stdin, &mut reader, &teacher_id, &subject_id, "09:00", "09:50");

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({
            "actor": admin(),
            "rollNumber": "21CS001",
            "name": "Asha Rao",
            "branch": "CSE",
            "semester": 5
        }),
    );
    let student_id = student["student"]["id"].as_str().expect("student id").to_string();

    // January: two present, one absent. February: one present.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.mark",
        json!({
            "actor": teacher(&teacher_id),
            "scheduleId": schedule_id,
            "date": "2025-01-06",
            "periods": [{ "periodNumber": 1 }, { "periodNumber": 2 }],
            "students": [{ "studentId": student_id, "status": "present" }]
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.mark",
        json!({
            "actor": teacher(&teacher_id),
            "scheduleId": schedule_id,
            "date": "2025-01-08",
            "periods": [{ "periodNumber": 1 }],
            "students": [{ "studentId": student_id, "status": "absent" }]
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.mark",
        json!({
            "actor": teacher(&teacher_id),
            "scheduleId": schedule_id,
            "date": "2025-02-03",
            "periods": [{ "periodNumber": 1 }],
            "students": [{ "studentId": student_id, "status": "present" }]
        }),
    );

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.studentSummary",
        json!({ "studentId": student_id, "subjectId": subject_id }),
    );
    assert_eq!(summary["summary"]["totalClasses"], 4);
    assert_eq!(summary["summary"]["attendedClasses"], 3);
    assert_eq!(summary["summary"]["percentage"], 75);

    let monthly = summary["monthlyBreakdown"].as_array().expect("monthly");
    assert_eq!(monthly.len(), 2);
    assert_eq!(monthly[0]["month"], "February 2025");
    assert_eq!(monthly[0]["totalClasses"], 1);
    assert_eq!(monthly[0]["percentage"], 100);
    assert_eq!(monthly[1]["month"], "January 2025");
    assert_eq!(monthly[1]["totalClasses"], 3);
    assert_eq!(monthly[1]["attendedClasses"], 2);
    assert_eq!(monthly[1]["percentage"], 67);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn student_overview_folds_every_subject_of_the_cohort() {
    let workspace = temp_dir("attendanced-overview");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "0",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let subject_a = seed_subject(&mut stdin, &mut reader, "CS510", "Compilers");
    let subject_b = seed_subject(&mut stdin, &mut reader, "CS511", "Graphics");
    let teacher_row = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "teachers.create",
        json!({ "actor": admin(), "name": "H. Varma", "department": "CSE" }),
    );
    let teacher_id = teacher_row["teacher"]["id"].as_str().expect("teacher id").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "teachers.approve",
        json!({ "actor": admin(), "teacherId": teacher_id }),
    );
    let schedule_a = seed_schedule(&mut stdin, &mut reader, &teacher_id, &subject_a, "09:00", "09:50");
    let schedule_b = seed_schedule(&mut stdin, &mut reader, &teacher_id, &subject_b, "10:00", "10:50");

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({
            "actor": admin(),
            "rollNumber": "21CS001",
            "name": "Asha Rao",
            "branch": "CSE",
            "semester": 5
        }),
    );
    let student_id = student["student"]["id"].as_str().expect("student id").to_string();

    // 2/2 in the first subject, 0/1 in the second.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.mark",
        json!({
            "actor": teacher(&teacher_id),
            "scheduleId": schedule_a,
            "date": "2025-01-06",
            "periods": [{ "periodNumber": 1 }, { "periodNumber": 2 }],
            "students": [{ "studentId": student_id, "status": "present" }]
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.mark",
        json!({
            "actor": teacher(&teacher_id),
            "scheduleId": schedule_b,
            "date": "2025-01-06",
            "periods": [{ "periodNumber": 3 }],
            "students": [{ "studentId": student_id, "status": "absent" }]
        }),
    );

    let overview = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.studentOverview",
        json!({ "studentId": student_id }),
    );
    assert_eq!(overview["student"]["year"], "3rd Year");
    let subjects = overview["subjects"].as_array().expect("subjects");
    assert_eq!(subjects.len(), 2);
    let compilers = subjects
        .iter()
        .find(|s| s["subject"]["code"] == "CS510")
        .expect("compilers row");
    assert_eq!(compilers["percentage"], 100);
    assert_eq!(compilers["band"], "excellent");
    let graphics = subjects
        .iter()
        .find(|s| s["subject"]["code"] == "CS511")
        .expect("graphics row");
    assert_eq!(graphics["percentage"], 0);
    assert_eq!(graphics["band"], "warning");

    assert_eq!(overview["overall"]["totalClasses"], 3);
    assert_eq!(overview["overall"]["attendedClasses"], 2);
    assert_eq!(overview["overall"]["percentage"], 67);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
