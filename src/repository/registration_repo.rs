// ==========================================
// 考试排期系统 - 考生报名仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: student_exam 表读写
// 说明: 报名人数由记录数派生，报名写入与名额检查在同一事务内完成
// ==========================================

use crate::domain::registration::{
    generate_registration_no, RegistrationRequest, StudentExamEntry, StudentExamRegistration,
};
use crate::domain::types::RegistrationStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::exam_repo::{map_exam_view_row, EXAM_VIEW_COLUMNS, EXAM_VIEW_JOINS};
use chrono::Local;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn parse_registration_status(idx: usize, raw: String) -> SqliteResult<RegistrationStatus> {
    RegistrationStatus::from_db_str(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("未知报名状态: {}", raw).into(),
        )
    })
}

fn map_registration_row(row: &Row<'_>) -> SqliteResult<StudentExamRegistration> {
    Ok(StudentExamRegistration {
        registration_id: row.get(0)?,
        exam_id: row.get(1)?,
        student_id: row.get(2)?,
        registration_no: row.get(3)?,
        seat_number: row.get(4)?,
        status: parse_registration_status(5, row.get(5)?)?,
        registered_at: row.get(6)?,
    })
}

// ==========================================
// RegistrationRepository - 报名仓储
// ==========================================
pub struct RegistrationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RegistrationRepository {
    /// 创建新的 RegistrationRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 学生报名考试
    ///
    /// # 参数
    /// - `exam_id`: 考试ID
    /// - `request`: 报名请求（准考证号缺省时自动生成）
    ///
    /// # 返回
    /// - Ok(StudentExamRegistration): 新报名记录
    /// - Err(NotFound): 考试或学生不存在
    /// - Err(DuplicateRegistration): 已报名
    /// - Err(CapacityExceeded): 名额已满
    pub fn register(
        &self,
        exam_id: &str,
        request: &RegistrationRequest,
    ) -> RepositoryResult<StudentExamRegistration> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let exam: Option<(String, i32)> = tx
            .query_row(
                "SELECT exam_code, max_capacity FROM exam WHERE exam_id = ?1",
                params![exam_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (exam_code, max_capacity) = exam.ok_or_else(|| RepositoryError::NotFound {
            entity: "Exam".to_string(),
            id: exam_id.to_string(),
        })?;

        let student_exists = tx
            .query_row(
                "SELECT 1 FROM student WHERE student_id = ?1",
                params![request.student_id],
                |_row| Ok(()),
            )
            .optional()?
            .is_some();
        if !student_exists {
            return Err(RepositoryError::NotFound {
                entity: "Student".to_string(),
                id: request.student_id.clone(),
            });
        }

        let already = tx
            .query_row(
                "SELECT 1 FROM student_exam WHERE exam_id = ?1 AND student_id = ?2",
                params![exam_id, request.student_id],
                |_row| Ok(()),
            )
            .optional()?
            .is_some();
        if already {
            return Err(RepositoryError::DuplicateRegistration {
                exam_id: exam_id.to_string(),
                student_id: request.student_id.clone(),
            });
        }

        let registered: i64 = tx.query_row(
            "SELECT COUNT(*) FROM student_exam WHERE exam_id = ?1 AND status <> 'CANCELLED'",
            params![exam_id],
            |row| row.get(0),
        )?;
        if registered >= i64::from(max_capacity) {
            return Err(RepositoryError::CapacityExceeded {
                exam_id: exam_id.to_string(),
                capacity: max_capacity,
            });
        }

        let sequence: i64 = tx.query_row(
            "SELECT COUNT(*) FROM student_exam WHERE exam_id = ?1",
            params![exam_id],
            |row| row.get(0),
        )?;

        let registration = StudentExamRegistration {
            registration_id: Uuid::new_v4().to_string(),
            exam_id: exam_id.to_string(),
            student_id: request.student_id.clone(),
            registration_no: request
                .registration_no
                .clone()
                .filter(|no| !no.trim().is_empty())
                .unwrap_or_else(|| generate_registration_no(&exam_code, sequence + 1)),
            seat_number: request.seat_number.clone(),
            status: RegistrationStatus::Registered,
            registered_at: Local::now().naive_local(),
        };

        tx.execute(
            r#"
            INSERT INTO student_exam (
                registration_id, exam_id, student_id, registration_no,
                seat_number, status, registered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                registration.registration_id,
                registration.exam_id,
                registration.student_id,
                registration.registration_no,
                registration.seat_number,
                registration.status.as_db_str(),
                registration.registered_at,
            ],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::debug!(
            "报名成功: exam_id={}, student_id={}, registration_no={}",
            registration.exam_id,
            registration.student_id,
            registration.registration_no
        );
        Ok(registration)
    }

    /// 查询考试的全部报名记录
    pub fn list_by_exam(&self, exam_id: &str) -> RepositoryResult<Vec<StudentExamRegistration>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT registration_id, exam_id, student_id, registration_no,
                   seat_number, status, registered_at
            FROM student_exam
            WHERE exam_id = ?1
            ORDER BY registered_at ASC, registration_no ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![exam_id], map_registration_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 查询学生的考试安排（含准考证号与座位号）
    pub fn find_for_student(&self, student_id: &str) -> RepositoryResult<Vec<StudentExamEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}, sr.registration_no, sr.seat_number, sr.status
            {}
            JOIN student_exam sr ON sr.exam_id = e.exam_id
            WHERE sr.student_id = ?1
            ORDER BY e.exam_date ASC, e.start_time ASC
            "#,
            EXAM_VIEW_COLUMNS, EXAM_VIEW_JOINS
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![student_id], |row| {
                Ok(StudentExamEntry {
                    exam: map_exam_view_row(row)?,
                    registration_no: row.get(28)?,
                    seat_number: row.get(29)?,
                    registration_status: parse_registration_status(30, row.get(30)?)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}
