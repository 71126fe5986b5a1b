// ==========================================
// 考试排期系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod enrollment_repo;
pub mod error;
pub mod exam_repo;
pub mod reference_repo;
pub mod registration_repo;

// 重导出核心仓储
pub use enrollment_repo::EnrollmentRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use exam_repo::ExamRepository;
pub use reference_repo::ReferenceRepository;
pub use registration_repo::RegistrationRepository;
