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

/// An unroutable push token fails its own delivery and nothing else: the
/// attendance write sticks and every other student still gets a push.
#[test]
fn a_failed_delivery_never_blocks_the_mark_or_its_peers() {
    let workspace = temp_dir("attendanced-dispatch-isolation");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "0",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let subject = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "subjects.create",
        json!({
            "actor": admin(),
            "code": "CS506",
            "name": "Theory of Computation",
            "branch": "CSE",
            "semester": 5,
            "credits": 4
        }),
    );
    let subject_id = subject["subject"]["id"].as_str().expect("subject id").to_string();
    let teacher_row = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "teachers.create",
        json!({ "actor": admin(), "name": "N. Bhat", "department": "CSE" }),
    );
    let teacher_id = teacher_row["teacher"]["id"].as_str().expect("teacher id").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "teachers.approve",
        json!({ "actor": admin(), "teacherId": teacher_id }),
    );
    let schedule = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schedules.create",
        json!({
            "actor": admin(),
            "teacherId": teacher_id,
            "subjectId": subject_id,
            "branch": "CSE",
            "semester": 5,
            "days": ["Thursday"],
            "period": "P4",
            "startTime": "14:00",
            "endTime": "14:50"
        }),
    );
    let schedule_id = schedule["schedule"]["id"].as_str().expect("schedule id").to_string();

    // Student 3 carries a token with embedded whitespace, which the outbox
    // refuses to route.
    let bulk = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.bulkCreate",
        json!({
            "actor": admin(),
            "students": [
                { "rollNumber": "21CS001", "name": "Asha Rao", "branch": "CSE", "semester": 5, "pushToken": "tok-1" },
                { "rollNumber": "21CS002", "name": "Dev Menon", "branch": "CSE", "semester": 5, "pushToken": "tok-2" },
                { "rollNumber": "21CS003", "name": "Kiran Das", "branch": "CSE", "semester": 5, "pushToken": "bad token" },
                { "rollNumber": "21CS004", "name": "Meera Pillai", "branch": "CSE", "semester": 5, "pushToken": "tok-4" },
                { "rollNumber": "21CS005", "name": "Ravi Kumar", "branch": "CSE", "semester": 5, "pushToken": "tok-5" }
            ]
        }),
    );
    let students: Vec<serde_json::Value> = bulk["results"]
        .as_array()
        .expect("results")
        .iter()
        .map(|r| json!({ "studentId": r["student"]["id"], "status": "present" }))
        .collect();

    let marked = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.mark",
        json!({
            "actor": teacher(&teacher_id),
            "scheduleId": schedule_id,
            "date": "2025-01-09",
            "periods": [{ "periodNumber": 1 }],
            "students": students
        }),
    );
    assert_eq!(marked["presentCount"], 5);
    assert_eq!(marked["notifications"]["sent"], 4);
    assert_eq!(marked["notifications"]["failed"], 1);
    assert_eq!(marked["notifications"]["skipped"], 0);

    // Every student got their period row regardless of delivery outcome.
    let class = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.classSummary",
        json!({ "subjectId": subject_id }),
    );
    for row in class["students"].as_array().expect("students") {
        assert_eq!(row["totalClasses"], 1);
        assert_eq!(row["percentage"], 100);
    }

    // The outbox holds exactly the four routable deliveries.
    let outbox = std::fs::read_to_string(workspace.join("outbox.jsonl")).expect("outbox");
    assert_eq!(outbox.lines().count(), 4);
    for line in outbox.lines() {
        let entry: serde_json::Value = serde_json::from_str(line).expect("outbox entry");
        assert_ne!(entry["target"], "bad token");
        assert_eq!(entry["title"], "Attendance Marked");
    }

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
