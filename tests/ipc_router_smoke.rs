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
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
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

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("attendanced-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["version"].is_string());

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let subject = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "subjects.create",
        json!({
            "actor": admin(),
            "code": "cs501",
            "name": "Compiler Design",
            "branch": "cse",
            "semester": 5,
            "credits": 4
        }),
    );
    let subject_id = subject["subject"]["id"].as_str().expect("subject id").to_string();
    assert_eq!(subject["subject"]["code"], "CS501");
    assert_eq!(subject["subject"]["branch"], "CSE");

    let teacher = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "teachers.create",
        json!({
            "actor": admin(),
            "name": "R. Iyer",
            "department": "CSE",
            "email": "r.iyer@example.edu"
        }),
    );
    let teacher_id = teacher["teacher"]["id"].as_str().expect("teacher id").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "teachers.approve",
        json!({ "actor": admin(), "teacherId": teacher_id }),
    );

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.create",
        json!({
            "actor": admin(),
            "rollNumber": "21cs001",
            "name": "Asha Rao",
            "branch": "CSE",
            "semester": 5,
            "pushToken": "tok-smoke-1"
        }),
    );
    let student_id = student["student"]["id"].as_str().expect("student id").to_string();
    assert_eq!(student["student"]["rollNumber"], "21CS001");
    assert_eq!(student["student"]["year"], "3rd Year");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.list",
        json!({ "branch": "CSE", "semester": 5 }),
    );
    assert_eq!(listed["count"], 1);

    let schedule = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "schedules.create",
        json!({
            "actor": admin(),
            "teacherId": teacher_id,
            "subjectId": subject_id,
            "branch": "CSE",
            "semester": 5,
            "days": ["Monday", "Wednesday"],
            "period": "P1",
            "startTime": "09:00",
            "endTime": "09:50"
        }),
    );
    let schedule_id = schedule["schedule"]["id"].as_str().expect("schedule id").to_string();

    let check = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "schedules.checkConflict",
        json!({
            "teacherId": teacher_id,
            "days": ["Monday"],
            "startTime": "09:30",
            "endTime": "10:20"
        }),
    );
    assert_eq!(check["conflict"], true);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "schedules.weekly",
        json!({ "teacherId": teacher_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "schedules.today",
        json!({ "asOf": "2025-01-06 09:30" }),
    );

    let marked = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "attendance.mark",
        json!({
            "actor": { "role": "teacher", "id": teacher_id },
            "scheduleId": schedule_id,
            "date": "2025-01-06",
            "periods": [{ "periodNumber": 1 }],
            "students": [{ "studentId": student_id, "status": "present" }]
        }),
    );
    assert_eq!(marked["presentCount"], 1);
    assert_eq!(marked["day"], "Monday");

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "attendance.studentSummary",
        json!({ "studentId": student_id, "subjectId": subject_id }),
    );
    assert_eq!(summary["summary"]["percentage"], 100);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "attendance.classSummary",
        json!({ "subjectId": subject_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "attendance.records",
        json!({ "subjectId": subject_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "alerts.lowAttendance",
        json!({ "branch": "CSE" }),
    );

    let unknown = request(&mut stdin, &mut reader, "17", "nonsense.method", json!({}));
    assert_eq!(unknown["ok"], false);
    assert_eq!(unknown["error"]["code"], "not_implemented");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
