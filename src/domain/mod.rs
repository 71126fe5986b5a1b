// ==========================================
// 考试排期系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、请求载荷
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod enrollment;
pub mod exam;
pub mod reference;
pub mod registration;
pub mod types;

// 重导出核心类型
pub use enrollment::StudentContact;
pub use exam::{
    Exam, ExamDraft, ExamFilter, ExamPage, ExamPatch, ExamSummary, ExamView, NewExam, SlotKey,
    DEFAULT_EXAM_RULES,
};
pub use reference::{ClassSection, Room, Subject, Timeslot};
pub use registration::{RegistrationRequest, StudentExamEntry, StudentExamRegistration};
pub use types::{
    EnrollmentStatus, ExamAction, ExamStatus, RegistrationStatus, StudentConflictStrategy,
};
