// ==========================================
// 考试排期系统 - 核心库
// ==========================================
// 范围: 考试冲突检测、考试校验、受影响学生解析、实时通知
// 技术栈: axum + Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 启动配置与运行期策略
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/表结构）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 实时通道层 - WebSocket 推送
pub mod realtime;

// 应用层 - 状态组装与路由
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    EnrollmentStatus, ExamAction, ExamStatus, RegistrationStatus, StudentConflictStrategy,
};

// 领域实体
pub use domain::{
    Exam, ExamDraft, ExamFilter, ExamPage, ExamPatch, ExamSummary, ExamView, SlotKey,
    StudentContact, StudentExamRegistration,
};

// 引擎
pub use engine::{
    ConflictCheck, ConflictDetector, ConflictKind, EnrollmentResolver, NotificationDispatcher,
    NotificationReport, SlotLockMap, UserPushChannel,
};

// API
pub use api::{ApiError, ApiResult, ExamApi, ExamValidator};

// 应用
pub use app::{build_router, AppState};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "考试排期系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
