// ==========================================
// 考试排期系统 - 配置层
// ==========================================
// 职责: 启动配置（环境变量）+ 运行期策略（config_kv 表）
// ==========================================

pub mod app_config;
pub mod config_manager;

// 重导出核心配置
pub use app_config::{get_default_db_path, AppConfig, ConfigError};
pub use config_manager::{ConfigManager, KEY_STUDENT_CONFLICT_STRATEGY};
