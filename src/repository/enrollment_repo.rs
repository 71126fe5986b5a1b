// ==========================================
// 考试排期系统 - 选课查询仓储（只读）
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 按教学班 / 按科目查询有效选课学生
// 有效选课: ENROLLED / ACTIVE / COMPLETED（DROPPED / CANCELLED 永不计入）
// ==========================================

use crate::domain::enrollment::StudentContact;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const ACTIVE_STATUS_SQL: &str = "UPPER(ce.status) IN ('ENROLLED', 'ACTIVE', 'COMPLETED')";

fn map_contact_row(row: &Row<'_>) -> SqliteResult<StudentContact> {
    Ok(StudentContact {
        student_id: row.get(0)?,
        student_code: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
    })
}

pub struct EnrollmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EnrollmentRepository {
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

    /// 教学班的有效选课学生
    pub fn find_active_students_by_section(
        &self,
        class_section_id: &str,
    ) -> RepositoryResult<Vec<StudentContact>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT DISTINCT st.student_id, st.student_code, st.full_name, st.email
            FROM class_enrollment ce
            JOIN student st ON st.student_id = ce.student_id
            WHERE ce.class_section_id = ?1 AND {}
            ORDER BY st.student_code ASC
            "#,
            ACTIVE_STATUS_SQL
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![class_section_id], map_contact_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 讲授该科目的全部教学班的有效选课学生（并集，按学生去重）
    pub fn find_active_students_by_subject(
        &self,
        subject_id: &str,
    ) -> RepositoryResult<Vec<StudentContact>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT DISTINCT st.student_id, st.student_code, st.full_name, st.email
            FROM class_enrollment ce
            JOIN class_section cs ON cs.class_section_id = ce.class_section_id
            JOIN student st ON st.student_id = ce.student_id
            WHERE cs.subject_id = ?1 AND {}
            ORDER BY st.student_code ASC
            "#,
            ACTIVE_STATUS_SQL
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![subject_id], map_contact_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}
