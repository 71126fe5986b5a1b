// ==========================================
// 考试排期系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 数据库错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 报名约束 =====
    #[error("重复报名: exam_id={exam_id}, student_id={student_id}")]
    DuplicateRegistration { exam_id: String, student_id: String },

    #[error("考试名额已满: exam_id={exam_id}, capacity={capacity}")]
    CapacityExceeded { exam_id: String, capacity: i32 },

    // ===== 数据质量错误 =====
    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl RepositoryError {
    /// 是否为 (考场, 日期, 时段) 唯一索引冲突
    pub fn is_slot_occupied(&self) -> bool {
        matches!(self, RepositoryError::UniqueConstraintViolation(msg)
            if msg.contains("exam.room_id") || msg.contains("idx_exam_active_slot"))
    }

    /// 是否为考试编号唯一约束冲突
    pub fn is_exam_code_taken(&self) -> bool {
        matches!(self, RepositoryError::UniqueConstraintViolation(msg) if msg.contains("exam.exam_code"))
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_classification() {
        let slot = RepositoryError::UniqueConstraintViolation(
            "UNIQUE constraint failed: exam.room_id, exam.exam_date, exam.slot_id".to_string(),
        );
        assert!(slot.is_slot_occupied());
        assert!(!slot.is_exam_code_taken());

        let code = RepositoryError::UniqueConstraintViolation(
            "UNIQUE constraint failed: exam.exam_code".to_string(),
        );
        assert!(code.is_exam_code_taken());
        assert!(!code.is_slot_occupied());
    }
}
