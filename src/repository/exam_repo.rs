// ==========================================
// 考试排期系统 - 考试数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: exam 表读写 + 冲突判定所需的三类查询
// 说明: 所有读取均返回 ExamView（含关联展示字段与派生报名人数）
// ==========================================

use crate::domain::exam::{Exam, ExamFilter, ExamView};
use crate::domain::types::ExamStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// ExamView 查询列（列序与 map_exam_view_row 对齐，共 28 列）
pub(crate) const EXAM_VIEW_COLUMNS: &str = r#"
        e.exam_id, e.exam_code, e.subject_id, e.class_section_id, e.room_id, e.slot_id,
        e.exam_date, e.start_time, e.end_time, e.max_capacity, e.exam_rules, e.notes,
        e.status, e.created_by, e.updated_by, e.created_at, e.updated_at,
        s.subject_code, s.subject_name,
        c.class_code, c.class_name,
        r.room_code, r.room_name, r.capacity,
        t.slot_name, t.start_time, t.end_time,
        (SELECT COUNT(*) FROM student_exam se
          WHERE se.exam_id = e.exam_id AND se.status <> 'CANCELLED') AS registered_students
"#;

/// ExamView 关联表
pub(crate) const EXAM_VIEW_JOINS: &str = r#"
    FROM exam e
    LEFT JOIN subject s ON s.subject_id = e.subject_id
    LEFT JOIN class_section c ON c.class_section_id = e.class_section_id
    LEFT JOIN room r ON r.room_id = e.room_id
    LEFT JOIN timeslot t ON t.slot_id = e.slot_id
"#;

/// 拼接 ExamView 查询（tail 为 WHERE / ORDER BY 等后缀）
fn exam_view_sql(tail: &str) -> String {
    format!("SELECT {} {} {}", EXAM_VIEW_COLUMNS, EXAM_VIEW_JOINS, tail)
}

/// 解析 exam.status 列
fn parse_exam_status(idx: usize, raw: String) -> SqliteResult<ExamStatus> {
    ExamStatus::from_db_str(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("未知考试状态: {}", raw).into(),
        )
    })
}

/// 行映射: EXAM_VIEW_COLUMNS → ExamView
pub(crate) fn map_exam_view_row(row: &Row<'_>) -> SqliteResult<ExamView> {
    let exam = Exam {
        exam_id: row.get(0)?,
        exam_code: row.get(1)?,
        subject_id: row.get(2)?,
        class_section_id: row.get(3)?,
        room_id: row.get(4)?,
        slot_id: row.get(5)?,
        exam_date: row.get(6)?,
        start_time: row.get(7)?,
        end_time: row.get(8)?,
        max_capacity: row.get(9)?,
        exam_rules: row.get(10)?,
        notes: row.get(11)?,
        status: parse_exam_status(12, row.get(12)?)?,
        created_by: row.get(13)?,
        updated_by: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    };

    Ok(ExamView {
        exam,
        subject_code: row.get(17)?,
        subject_name: row.get(18)?,
        class_code: row.get(19)?,
        class_name: row.get(20)?,
        room_code: row.get(21)?,
        room_name: row.get(22)?,
        room_capacity: row.get(23)?,
        slot_name: row.get(24)?,
        slot_start_time: row.get(25)?,
        slot_end_time: row.get(26)?,
        registered_students: row.get(27)?,
    })
}

// ==========================================
// ExamRepository - 考试仓储
// ==========================================
/// 考试仓储
/// 职责: 管理 exam 表的 CRUD 与冲突查询
/// 红线: 不含业务逻辑，只负责数据访问
pub struct ExamRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ExamRepository {
    /// 创建新的 ExamRepository 实例
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

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写操作
    // ==========================================

    /// 插入考试
    ///
    /// # 返回
    /// - Err(UniqueConstraintViolation): 考试编号重复，或 (考场, 日期, 时段) 已被非取消考试占用
    pub fn insert(&self, exam: &Exam) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO exam (
                exam_id, exam_code, subject_id, class_section_id, room_id, slot_id,
                exam_date, start_time, end_time, max_capacity, exam_rules, notes,
                status, created_by, updated_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                exam.exam_id,
                exam.exam_code,
                exam.subject_id,
                exam.class_section_id,
                exam.room_id,
                exam.slot_id,
                exam.exam_date,
                exam.start_time,
                exam.end_time,
                exam.max_capacity,
                exam.exam_rules,
                exam.notes,
                exam.status.as_db_str(),
                exam.created_by,
                exam.updated_by,
                exam.created_at,
                exam.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 整行更新（created_* 审计字段不变）
    pub fn update(&self, exam: &Exam) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE exam SET
                exam_code = ?2, subject_id = ?3, class_section_id = ?4, room_id = ?5, slot_id = ?6,
                exam_date = ?7, start_time = ?8, end_time = ?9, max_capacity = ?10,
                exam_rules = ?11, notes = ?12, status = ?13, updated_by = ?14, updated_at = ?15
            WHERE exam_id = ?1
            "#,
            params![
                exam.exam_id,
                exam.exam_code,
                exam.subject_id,
                exam.class_section_id,
                exam.room_id,
                exam.slot_id,
                exam.exam_date,
                exam.start_time,
                exam.end_time,
                exam.max_capacity,
                exam.exam_rules,
                exam.notes,
                exam.status.as_db_str(),
                exam.updated_by,
                exam.updated_at,
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Exam".to_string(),
                id: exam.exam_id.clone(),
            });
        }
        Ok(())
    }

    /// 删除考试及其全部报名记录（同一事务）
    ///
    /// # 返回
    /// - Ok(usize): 一并删除的报名记录数
    /// - Err(NotFound): 考试不存在
    pub fn delete(&self, exam_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let removed_registrations =
            tx.execute("DELETE FROM student_exam WHERE exam_id = ?1", params![exam_id])?;
        let removed = tx.execute("DELETE FROM exam WHERE exam_id = ?1", params![exam_id])?;

        if removed == 0 {
            // tx 在 drop 时回滚
            return Err(RepositoryError::NotFound {
                entity: "Exam".to_string(),
                id: exam_id.to_string(),
            });
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(removed_registrations)
    }

    // ==========================================
    // 单条查询
    // ==========================================

    /// 按主键查询
    pub fn find_by_id(&self, exam_id: &str) -> RepositoryResult<Option<ExamView>> {
        self.query_one("WHERE e.exam_id = ?1", exam_id)
    }

    /// 按考试编号查询
    pub fn find_by_code(&self, exam_code: &str) -> RepositoryResult<Option<ExamView>> {
        self.query_one("WHERE e.exam_code = ?1", exam_code)
    }

    fn query_one(&self, where_clause: &str, key: &str) -> RepositoryResult<Option<ExamView>> {
        let conn = self.get_conn()?;
        let sql = exam_view_sql(where_clause);
        let mut stmt = conn.prepare(&sql)?;

        let result = stmt.query_row(params![key], map_exam_view_row);
        match result {
            Ok(view) => Ok(Some(view)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ==========================================
    // 冲突查询
    // ==========================================

    /// 查询占用 (考场, 日期, 时段) 的非取消考试
    ///
    /// # 参数
    /// - `exclude_exam_id`: 更新时排除被编辑的考试本身
    pub fn find_by_room_date_slot(
        &self,
        room_id: &str,
        exam_date: NaiveDate,
        slot_id: &str,
        exclude_exam_id: Option<&str>,
    ) -> RepositoryResult<Vec<ExamView>> {
        let conn = self.get_conn()?;
        let sql = exam_view_sql(
            r#"
            WHERE e.room_id = ?1 AND e.exam_date = ?2 AND e.slot_id = ?3
              AND e.status <> 'CANCELLED'
              AND (?4 IS NULL OR e.exam_id <> ?4)
            ORDER BY e.created_at ASC"#,
        );
        let mut stmt = conn.prepare(&sql)?;
        let exams = stmt
            .query_map(
                params![room_id, exam_date, slot_id, exclude_exam_id],
                map_exam_view_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(exams)
    }

    /// 查询同科目同日期同时段的非取消考试
    pub fn find_by_subject_date_slot(
        &self,
        subject_id: &str,
        exam_date: NaiveDate,
        slot_id: &str,
    ) -> RepositoryResult<Vec<ExamView>> {
        let conn = self.get_conn()?;
        let sql = exam_view_sql(
            r#"
            WHERE e.subject_id = ?1 AND e.exam_date = ?2 AND e.slot_id = ?3
              AND e.status <> 'CANCELLED'
            ORDER BY e.created_at ASC"#,
        );
        let mut stmt = conn.prepare(&sql)?;
        let exams = stmt
            .query_map(params![subject_id, exam_date, slot_id], map_exam_view_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(exams)
    }

    /// 查询某学生在 (日期, 时段) 需参加的非取消考试
    ///
    /// 两步关联: 有效选课 → 教学班 → 考试
    /// 未绑定教学班的考试按科目匹配（面向该科目全部教学班）
    pub fn find_for_student_at_slot(
        &self,
        student_id: &str,
        exam_date: NaiveDate,
        slot_id: &str,
    ) -> RepositoryResult<Vec<ExamView>> {
        let conn = self.get_conn()?;
        let sql = exam_view_sql(
            r#"
            WHERE e.exam_date = ?2 AND e.slot_id = ?3
              AND e.status <> 'CANCELLED'
              AND (
                e.class_section_id IN (
                    SELECT ce.class_section_id FROM class_enrollment ce
                    WHERE ce.student_id = ?1
                      AND UPPER(ce.status) IN ('ENROLLED', 'ACTIVE', 'COMPLETED')
                )
                OR (
                    e.class_section_id IS NULL AND e.subject_id IN (
                        SELECT cs.subject_id FROM class_enrollment ce
                        JOIN class_section cs ON cs.class_section_id = ce.class_section_id
                        WHERE ce.student_id = ?1
                          AND UPPER(ce.status) IN ('ENROLLED', 'ACTIVE', 'COMPLETED')
                    )
                )
              )
            ORDER BY e.created_at ASC"#,
        );
        let mut stmt = conn.prepare(&sql)?;
        let exams = stmt
            .query_map(params![student_id, exam_date, slot_id], map_exam_view_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(exams)
    }

    // ==========================================
    // 列表查询
    // ==========================================

    /// 按过滤条件分页查询
    pub fn list(&self, filter: &ExamFilter) -> RepositoryResult<Vec<ExamView>> {
        let conn = self.get_conn()?;
        let (where_sql, params_vec) = build_filter_clause(filter);
        let order = if filter.sort_ascending { "ASC" } else { "DESC" };

        let sql = exam_view_sql(&format!(
            "{} ORDER BY e.exam_date {}, e.start_time {}, e.exam_code ASC LIMIT {} OFFSET {}",
            where_sql,
            order,
            order,
            filter.page_size,
            filter.offset()
        ));

        let mut stmt = conn.prepare(&sql)?;
        let exams = stmt
            .query_map(params_from_iter(params_vec.iter()), map_exam_view_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(exams)
    }

    /// 按过滤条件计数（忽略分页）
    pub fn count(&self, filter: &ExamFilter) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let (where_sql, params_vec) = build_filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM exam e {}", where_sql);
        let total: i64 =
            conn.query_row(&sql, params_from_iter(params_vec.iter()), |row| row.get(0))?;
        Ok(total)
    }
}

/// 构建列表过滤 WHERE 子句
fn build_filter_clause(filter: &ExamFilter) -> (String, Vec<String>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params_vec: Vec<String> = Vec::new();

    let mut push = |clause: &str, value: String, params_vec: &mut Vec<String>| {
        params_vec.push(value);
        clauses.push(clause.replace("?", &format!("?{}", params_vec.len())));
    };

    if let Some(status) = filter.status {
        push("e.status = ?", status.as_db_str().to_string(), &mut params_vec);
    }
    if let Some(date) = filter.exam_date {
        push("e.exam_date = ?", date.to_string(), &mut params_vec);
    }
    if let Some(from) = filter.date_from {
        push("e.exam_date >= ?", from.to_string(), &mut params_vec);
    }
    if let Some(to) = filter.date_to {
        push("e.exam_date <= ?", to.to_string(), &mut params_vec);
    }
    if let Some(section) = &filter.class_section_id {
        push("e.class_section_id = ?", section.clone(), &mut params_vec);
    }
    if let Some(subject) = &filter.subject_id {
        push("e.subject_id = ?", subject.clone(), &mut params_vec);
    }
    if let Some(room) = &filter.room_id {
        push("e.room_id = ?", room.clone(), &mut params_vec);
    }
    if let Some(keyword) = filter.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        push(
            "LOWER(e.exam_code) LIKE ?",
            format!("%{}%", keyword.to_lowercase()),
            &mut params_vec,
        );
    }

    if clauses.is_empty() {
        (String::new(), params_vec)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), params_vec)
    }
}
