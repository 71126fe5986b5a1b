// ==========================================
// 考试排期系统 - 领域类型定义
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// 例外: ExamAction 面向客户端推送，使用小写
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 考试状态 (Exam Status)
// ==========================================
// 生命周期: SCHEDULED → ONGOING → COMPLETED
// 任意阶段可转为 CANCELLED；CANCELLED 不参与冲突判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamStatus {
    Scheduled, // 已排期
    Ongoing,   // 进行中
    Completed, // 已结束
    Cancelled, // 已取消
}

impl ExamStatus {
    /// 数据库存储值
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ExamStatus::Scheduled => "SCHEDULED",
            ExamStatus::Ongoing => "ONGOING",
            ExamStatus::Completed => "COMPLETED",
            ExamStatus::Cancelled => "CANCELLED",
        }
    }

    /// 从数据库值解析（大小写不敏感，兼容 in-progress 旧写法）
    pub fn from_db_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SCHEDULED" => Some(ExamStatus::Scheduled),
            "ONGOING" | "IN_PROGRESS" => Some(ExamStatus::Ongoing),
            "COMPLETED" => Some(ExamStatus::Completed),
            "CANCELLED" => Some(ExamStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExamStatus::Cancelled)
    }
}

impl Default for ExamStatus {
    fn default() -> Self {
        ExamStatus::Scheduled
    }
}

impl fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 考生报名状态 (Registration Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Registered, // 已报名
    Attended,   // 已到考
    Absent,     // 缺考
    Cancelled,  // 已取消
}

impl RegistrationStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "REGISTERED",
            RegistrationStatus::Attended => "ATTENDED",
            RegistrationStatus::Absent => "ABSENT",
            RegistrationStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "REGISTERED" => Some(RegistrationStatus::Registered),
            "ATTENDED" => Some(RegistrationStatus::Attended),
            "ABSENT" => Some(RegistrationStatus::Absent),
            "CANCELLED" => Some(RegistrationStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 选课状态 (Class Enrollment Status)
// ==========================================
// 选课数据归属选课子系统，本系统只读
// 未知状态统一落入 Other，且永远不算"有效选课"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Enrolled,
    Active,
    Completed,
    Dropped,
    Cancelled,
    Other(String),
}

/// 有效选课状态白名单（通知扇出与学生冲突推断只认这三种）
pub const ACTIVE_ENROLLMENT_STATUSES: [&str; 3] = ["ENROLLED", "ACTIVE", "COMPLETED"];

impl EnrollmentStatus {
    pub fn as_db_str(&self) -> &str {
        match self {
            EnrollmentStatus::Enrolled => "ENROLLED",
            EnrollmentStatus::Active => "ACTIVE",
            EnrollmentStatus::Completed => "COMPLETED",
            EnrollmentStatus::Dropped => "DROPPED",
            EnrollmentStatus::Cancelled => "CANCELLED",
            EnrollmentStatus::Other(raw) => raw.as_str(),
        }
    }

    pub fn from_db_str(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "ENROLLED" => EnrollmentStatus::Enrolled,
            "ACTIVE" => EnrollmentStatus::Active,
            "COMPLETED" => EnrollmentStatus::Completed,
            "DROPPED" => EnrollmentStatus::Dropped,
            "CANCELLED" => EnrollmentStatus::Cancelled,
            other => EnrollmentStatus::Other(other.to_string()),
        }
    }

    /// 是否为有效选课
    pub fn is_active(&self) -> bool {
        ACTIVE_ENROLLMENT_STATUSES.contains(&self.as_db_str())
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 考试变更动作 (Exam Action)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamAction {
    Created,
    Updated,
    Deleted,
}

impl ExamAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamAction::Created => "created",
            ExamAction::Updated => "updated",
            ExamAction::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ExamAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 学生冲突判定策略 (Student Conflict Strategy)
// ==========================================
// SubjectSlot: 同科目同日期同时段只允许一场（科目级代理判定）
// PerStudent: 通过选课关系逐个学生判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudentConflictStrategy {
    SubjectSlot,
    PerStudent,
}

impl StudentConflictStrategy {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            StudentConflictStrategy::SubjectSlot => "SUBJECT_SLOT",
            StudentConflictStrategy::PerStudent => "PER_STUDENT",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SUBJECT_SLOT" => Some(StudentConflictStrategy::SubjectSlot),
            "PER_STUDENT" => Some(StudentConflictStrategy::PerStudent),
            _ => None,
        }
    }
}

impl Default for StudentConflictStrategy {
    fn default() -> Self {
        StudentConflictStrategy::SubjectSlot
    }
}

impl fmt::Display for StudentConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}
