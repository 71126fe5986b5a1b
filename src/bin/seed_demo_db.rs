// ==========================================
// 演示数据库重置与种子数据
// ==========================================
// 用法: seed_demo_db [db_path]
// - 已存在的数据库先备份为 <db_path>.bak.<时间戳> 再删除
// - 写入科目/考场/时段/教学班/学生/选课与两场示例考试
// ==========================================

use chrono::{Duration, Local};
use rusqlite::{params, Connection};
use std::error::Error;
use std::fs;
use std::path::Path;

use exam_scheduler::config::{get_default_db_path, KEY_STUDENT_CONFLICT_STRATEGY};
use exam_scheduler::db::{init_schema, open_sqlite_connection};
use exam_scheduler::domain::types::{EnrollmentStatus, ExamStatus, StudentConflictStrategy};

const STUDENTS_PER_SECTION: usize = 25;

fn main() -> Result<(), Box<dyn Error>> {
    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);

    backup_and_reset_db(&db_path)?;

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    seed(&conn)?;
    print_quick_counts(&conn)?;

    Ok(())
}

fn backup_and_reset_db(db_path: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path)?;
    fs::remove_file(path)?;

    eprintln!("Backed up {} -> {}", db_path, backup_path);
    Ok(())
}

fn seed(conn: &Connection) -> Result<(), Box<dyn Error>> {
    let now = Local::now().naive_local();
    let exam_day = Local::now().date_naive() + Duration::days(14);
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)",
        params![
            KEY_STUDENT_CONFLICT_STRATEGY,
            StudentConflictStrategy::default().as_db_str()
        ],
    )?;

    for (id, code, name) in [
        ("SUB-SE", "SE001", "软件工程"),
        ("SUB-MA", "MA101", "高等数学"),
        ("SUB-EN", "EN201", "大学英语"),
    ] {
        tx.execute(
            "INSERT INTO subject (subject_id, subject_code, subject_name) VALUES (?1, ?2, ?3)",
            params![id, code, name],
        )?;
    }

    for (id, code, name, capacity) in [
        ("ROOM-A102", "A102", "A 栋 102", 40),
        ("ROOM-A103", "A103", "A 栋 103", 60),
        ("ROOM-B201", "B201", "B 栋 201", 120),
    ] {
        tx.execute(
            "INSERT INTO room (room_id, room_code, room_name, capacity) VALUES (?1, ?2, ?3, ?4)",
            params![id, code, name, capacity],
        )?;
    }

    for (id, name, start, end) in [
        ("SLOT-1", "上午一", "07:00", "09:30"),
        ("SLOT-2", "上午二", "09:45", "12:15"),
        ("SLOT-3", "下午一", "13:30", "16:00"),
    ] {
        tx.execute(
            "INSERT INTO timeslot (slot_id, slot_name, start_time, end_time) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, start, end],
        )?;
    }

    let sections = [
        ("SEC-SE-1", "SE001-01", "软件工程 1 班", "SUB-SE"),
        ("SEC-SE-2", "SE001-02", "软件工程 2 班", "SUB-SE"),
        ("SEC-MA-1", "MA101-01", "高等数学 1 班", "SUB-MA"),
        ("SEC-EN-1", "EN201-01", "大学英语 1 班", "SUB-EN"),
    ];
    for (id, code, name, subject_id) in sections {
        tx.execute(
            "INSERT INTO class_section (class_section_id, class_code, class_name, subject_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, code, name, subject_id],
        )?;
    }

    // 每个教学班一批学生；每位学生另选修下一个教学班，制造跨科目重叠
    let mut student_no = 0;
    for (index, (section_id, ..)) in sections.iter().enumerate() {
        let (next_section, ..) = sections[(index + 1) % sections.len()];
        for _ in 0..STUDENTS_PER_SECTION {
            student_no += 1;
            let student_id = format!("STU-{:04}", student_no);
            tx.execute(
                "INSERT INTO student (student_id, student_code, full_name, email) VALUES (?1, ?2, ?3, ?4)",
                params![
                    student_id,
                    format!("2024{:04}", student_no),
                    format!("学生{:04}", student_no),
                    format!("student{:04}@example.edu", student_no)
                ],
            )?;

            let status = if student_no % 10 == 0 {
                EnrollmentStatus::Dropped
            } else {
                EnrollmentStatus::Enrolled
            };
            for (n, section) in [*section_id, next_section].iter().enumerate() {
                tx.execute(
                    "INSERT INTO class_enrollment (enrollment_id, student_id, class_section_id, status)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        format!("ENR-{:04}-{}", student_no, n),
                        student_id,
                        section,
                        status.as_db_str()
                    ],
                )?;
            }
        }
    }

    for (id, code, subject_id, section_id, room_id, slot_id, start, end) in [
        ("EXAM-SE-MID", "SE001-MID", "SUB-SE", Some("SEC-SE-1"), "ROOM-A102", "SLOT-1", "07:00", "09:30"),
        ("EXAM-MA-MID", "MA101-MID", "SUB-MA", None, "ROOM-B201", "SLOT-2", "09:45", "12:15"),
    ] {
        tx.execute(
            "INSERT INTO exam (
                exam_id, exam_code, subject_id, class_section_id, room_id, slot_id,
                exam_date, start_time, end_time, max_capacity, exam_rules, notes,
                status, created_by, updated_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 40, '标准考场规则', NULL, ?10, 'seed', 'seed', ?11, ?11)",
            params![
                id,
                code,
                subject_id,
                section_id,
                room_id,
                slot_id,
                exam_day,
                start,
                end,
                ExamStatus::Scheduled.as_db_str(),
                now
            ],
        )?;
    }

    tx.commit()?;
    Ok(())
}

fn print_quick_counts(conn: &Connection) -> Result<(), Box<dyn Error>> {
    for table in [
        "subject",
        "room",
        "timeslot",
        "class_section",
        "student",
        "class_enrollment",
        "exam",
        "student_exam",
    ] {
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        println!("{:<18} {}", table, count);
    }
    Ok(())
}
