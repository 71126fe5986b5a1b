// ==========================================
// 考试排期系统 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 + busy_timeout）
// - 统一建表脚本，测试与运行时共用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建表脚本
///
/// 说明：
/// - 日期统一存储为 YYYY-MM-DD 文本，按自然日匹配
/// - 报名人数不落库，读取时由 student_exam 计数得到
/// - idx_exam_active_slot 是考场重复占用的最终兜底
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS subject (
    subject_id   TEXT PRIMARY KEY,
    subject_code TEXT NOT NULL UNIQUE,
    subject_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS room (
    room_id   TEXT PRIMARY KEY,
    room_code TEXT NOT NULL UNIQUE,
    room_name TEXT NOT NULL,
    capacity  INTEGER NOT NULL CHECK (capacity > 0)
);

CREATE TABLE IF NOT EXISTS timeslot (
    slot_id    TEXT PRIMARY KEY,
    slot_name  TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS class_section (
    class_section_id TEXT PRIMARY KEY,
    class_code       TEXT NOT NULL UNIQUE,
    class_name       TEXT NOT NULL,
    subject_id       TEXT NOT NULL REFERENCES subject(subject_id)
);
CREATE INDEX IF NOT EXISTS idx_class_section_subject ON class_section(subject_id);

CREATE TABLE IF NOT EXISTS student (
    student_id   TEXT PRIMARY KEY,
    student_code TEXT NOT NULL UNIQUE,
    full_name    TEXT NOT NULL,
    email        TEXT
);

CREATE TABLE IF NOT EXISTS class_enrollment (
    enrollment_id    TEXT PRIMARY KEY,
    student_id       TEXT NOT NULL REFERENCES student(student_id),
    class_section_id TEXT NOT NULL REFERENCES class_section(class_section_id),
    status           TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_enrollment_section ON class_enrollment(class_section_id, status);
CREATE INDEX IF NOT EXISTS idx_enrollment_student ON class_enrollment(student_id, status);

CREATE TABLE IF NOT EXISTS exam (
    exam_id          TEXT PRIMARY KEY,
    exam_code        TEXT NOT NULL UNIQUE,
    subject_id       TEXT NOT NULL REFERENCES subject(subject_id),
    class_section_id TEXT REFERENCES class_section(class_section_id),
    room_id          TEXT NOT NULL REFERENCES room(room_id),
    slot_id          TEXT NOT NULL REFERENCES timeslot(slot_id),
    exam_date        TEXT NOT NULL,
    start_time       TEXT NOT NULL,
    end_time         TEXT NOT NULL,
    max_capacity     INTEGER NOT NULL CHECK (max_capacity > 0),
    exam_rules       TEXT,
    notes            TEXT,
    status           TEXT NOT NULL DEFAULT 'SCHEDULED',
    created_by       TEXT,
    updated_by       TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    CHECK (start_time < end_time)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_exam_active_slot
    ON exam(room_id, exam_date, slot_id) WHERE status <> 'CANCELLED';
CREATE INDEX IF NOT EXISTS idx_exam_subject_slot ON exam(subject_id, exam_date, slot_id);
CREATE INDEX IF NOT EXISTS idx_exam_section_slot ON exam(class_section_id, exam_date, slot_id);

CREATE TABLE IF NOT EXISTS student_exam (
    registration_id TEXT PRIMARY KEY,
    exam_id         TEXT NOT NULL REFERENCES exam(exam_id) ON DELETE CASCADE,
    student_id      TEXT NOT NULL REFERENCES student(student_id),
    registration_no TEXT NOT NULL,
    seat_number     TEXT,
    status          TEXT NOT NULL DEFAULT 'REGISTERED',
    registered_at   TEXT NOT NULL,
    UNIQUE (exam_id, student_id)
);
CREATE INDEX IF NOT EXISTS idx_student_exam_student ON student_exam(student_id);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id   TEXT NOT NULL DEFAULT 'global',
    key        TEXT NOT NULL,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS schema_version (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）并登记 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
