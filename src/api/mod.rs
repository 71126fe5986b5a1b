// ==========================================
// 考试排期系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 HTTP 路由调用
// ==========================================

pub mod error;
pub mod exam_api;
pub mod validator;

// 重导出核心类型
pub use error::{ApiError, ApiResult, ValidationViolation};
pub use exam_api::{DeleteOutcome, ExamApi, MAX_PAGE_SIZE};
pub use validator::{validate_fields, ExamValidator, ValidatedUpdate};
