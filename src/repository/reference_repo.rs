// ==========================================
// 考试排期系统 - 参考数据仓储（只读）
// ==========================================
// 职责: 科目 / 考场 / 时段 / 教学班 / 学生 的按 ID 查询
// 用途: 校验悬空引用，提供展示字段
// ==========================================

use crate::domain::enrollment::StudentContact;
use crate::domain::reference::{ClassSection, Room, Subject, Timeslot};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct ReferenceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReferenceRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_subject(&self, subject_id: &str) -> RepositoryResult<Option<Subject>> {
        let conn = self.get_conn()?;
        let subject = conn
            .query_row(
                "SELECT subject_id, subject_code, subject_name FROM subject WHERE subject_id = ?1",
                params![subject_id],
                |row| {
                    Ok(Subject {
                        subject_id: row.get(0)?,
                        subject_code: row.get(1)?,
                        subject_name: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(subject)
    }

    pub fn find_room(&self, room_id: &str) -> RepositoryResult<Option<Room>> {
        let conn = self.get_conn()?;
        let room = conn
            .query_row(
                "SELECT room_id, room_code, room_name, capacity FROM room WHERE room_id = ?1",
                params![room_id],
                |row| {
                    Ok(Room {
                        room_id: row.get(0)?,
                        room_code: row.get(1)?,
                        room_name: row.get(2)?,
                        capacity: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(room)
    }

    pub fn find_timeslot(&self, slot_id: &str) -> RepositoryResult<Option<Timeslot>> {
        let conn = self.get_conn()?;
        let slot = conn
            .query_row(
                "SELECT slot_id, slot_name, start_time, end_time FROM timeslot WHERE slot_id = ?1",
                params![slot_id],
                |row| {
                    Ok(Timeslot {
                        slot_id: row.get(0)?,
                        slot_name: row.get(1)?,
                        start_time: row.get(2)?,
                        end_time: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(slot)
    }

    pub fn find_class_section(
        &self,
        class_section_id: &str,
    ) -> RepositoryResult<Option<ClassSection>> {
        let conn = self.get_conn()?;
        let section = conn
            .query_row(
                r#"
                SELECT class_section_id, class_code, class_name, subject_id
                FROM class_section WHERE class_section_id = ?1
                "#,
                params![class_section_id],
                |row| {
                    Ok(ClassSection {
                        class_section_id: row.get(0)?,
                        class_code: row.get(1)?,
                        class_name: row.get(2)?,
                        subject_id: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(section)
    }

    pub fn find_student(&self, student_id: &str) -> RepositoryResult<Option<StudentContact>> {
        let conn = self.get_conn()?;
        let student = conn
            .query_row(
                "SELECT student_id, student_code, full_name, email FROM student WHERE student_id = ?1",
                params![student_id],
                |row| {
                    Ok(StudentContact {
                        student_id: row.get(0)?,
                        student_code: row.get(1)?,
                        full_name: row.get(2)?,
                        email: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(student)
    }
}
