// ==========================================
// 考试排期系统 - 应用层
// ==========================================
// 职责: 组装共享状态，暴露 HTTP 与实时通道路由
// ==========================================

pub mod routes;
pub mod state;

// 重导出
pub use routes::{build_router, SYSTEM_OPERATOR};
pub use state::AppState;
