use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("attendance.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            roll_number TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email TEXT,
            branch TEXT NOT NULL,
            semester INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            push_token TEXT,
            notify_enabled INTEGER NOT NULL DEFAULT 1,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_cohort ON students(branch, semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            branch TEXT NOT NULL,
            semester INTEGER NOT NULL,
            credits INTEGER NOT NULL,
            kind TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            UNIQUE(branch, code)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_cohort ON subjects(branch, semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT,
            department TEXT NOT NULL,
            approved INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_assignments(
            teacher_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            branch TEXT NOT NULL,
            semester INTEGER NOT NULL,
            PRIMARY KEY(teacher_id, subject_id, branch, semester),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_subject ON teacher_assignments(subject_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedules(
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            branch TEXT NOT NULL,
            semester INTEGER NOT NULL,
            days TEXT NOT NULL,
            period_label TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedules_teacher ON schedules(teacher_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_schedules_cohort ON schedules(branch, semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            date TEXT NOT NULL,
            day TEXT NOT NULL,
            marked_by TEXT NOT NULL,
            marked_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_records_pair ON attendance_records(student_id, subject_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_records_subject_date ON attendance_records(subject_id, date)",
        [],
    )?;

    // Period rows carry the natural key alongside the record reference so the
    // UNIQUE constraint enforces "one mark per student/subject/date/period"
    // at the store level, not only in the pre-insert check.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_periods(
            record_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            date TEXT NOT NULL,
            period_number INTEGER NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            status TEXT NOT NULL,
            PRIMARY KEY(record_id, period_number),
            UNIQUE(student_id, subject_id, date, period_number),
            FOREIGN KEY(record_id) REFERENCES attendance_records(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_periods_pair ON attendance_periods(student_id, subject_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_periods_subject_date ON attendance_periods(subject_id, date)",
        [],
    )?;

    Ok(conn)
}
