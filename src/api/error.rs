// ==========================================
// 考试排期系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository错误为用户友好的错误消息
// 约束: 校验/冲突错误逐项列出，不合并为单条模糊消息
// ==========================================

use crate::engine::conflict::ConflictCheck;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 校验与冲突错误（写入前检出，阻止写入）
    // ==========================================
    /// 字段校验或冲突检查失败（带逐项原因）
    #[error("考试校验失败: {reason}")]
    ValidationFailed {
        reason: String,
        violations: Vec<ValidationViolation>,
    },

    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 重复报名 / 名额已满
    #[error("操作冲突: {0}")]
    Conflict(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ApiError {
    /// 单条字段错误
    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        let violation = ValidationViolation::field(field, reason);
        ApiError::ValidationFailed {
            reason: violation.reason.clone(),
            violations: vec![violation],
        }
    }

    /// 逐项违规列表（非校验错误返回空）
    pub fn violations(&self) -> &[ValidationViolation] {
        match self {
            ApiError::ValidationFailed { violations, .. } => violations,
            _ => &[],
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::Conflict(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("外键约束违反: {}", msg))
            }

            // 报名约束
            RepositoryError::DuplicateRegistration { exam_id, student_id } => ApiError::Conflict(
                format!("学生 {} 已报名考试 {}", student_id, exam_id),
            ),
            RepositoryError::CapacityExceeded { exam_id, capacity } => ApiError::Conflict(
                format!("考试 {} 名额已满（上限 {}）", exam_id, capacity),
            ),

            RepositoryError::FieldValueError { field, message } => {
                ApiError::invalid_field(&field, message)
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// 校验违规详情
// ==========================================

/// 违规类型: 字段错误
pub const VIOLATION_FIELD: &str = "FIELD";

/// 校验违规详情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationViolation {
    /// 违规类型（FIELD / ROOM_CONFLICT / SUBJECT_CONFLICT / STUDENT_CONFLICT）
    pub violation_type: String,
    /// 字段名（字段错误时）
    pub field: Option<String>,
    /// 违规原因
    pub reason: String,
    /// 额外信息（冲突考试、受影响学生）
    pub details: Option<serde_json::Value>,
}

impl ValidationViolation {
    pub fn field(field: &str, reason: impl Into<String>) -> Self {
        Self {
            violation_type: VIOLATION_FIELD.to_string(),
            field: Some(field.to_string()),
            reason: reason.into(),
            details: None,
        }
    }

    /// 由冲突检查结果生成（无冲突返回 None）
    pub fn from_conflict(check: &ConflictCheck) -> Option<Self> {
        if !check.has_conflict {
            return None;
        }
        Some(Self {
            violation_type: check.kind.as_str().to_string(),
            field: None,
            reason: check
                .message
                .clone()
                .unwrap_or_else(|| check.kind.as_str().to_string()),
            details: Some(serde_json::json!({
                "conflictingExams": check.conflicting_exams,
                "affectedStudents": check.affected_students,
            })),
        })
    }

    pub fn is_conflict(&self) -> bool {
        self.violation_type != VIOLATION_FIELD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_mapping() {
        let dup: ApiError = RepositoryError::DuplicateRegistration {
            exam_id: "E1".to_string(),
            student_id: "S1".to_string(),
        }
        .into();
        assert!(matches!(dup, ApiError::Conflict(_)));

        let missing: ApiError = RepositoryError::NotFound {
            entity: "Exam".to_string(),
            id: "E9".to_string(),
        }
        .into();
        assert!(matches!(missing, ApiError::NotFound(ref msg) if msg.contains("E9")));

        let field: ApiError = RepositoryError::FieldValueError {
            field: "examDate".to_string(),
            message: "格式错误".to_string(),
        }
        .into();
        assert_eq!(field.violations().len(), 1);
        assert_eq!(field.violations()[0].field.as_deref(), Some("examDate"));
    }
}
