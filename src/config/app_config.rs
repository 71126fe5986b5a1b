// ==========================================
// 考试排期系统 - 启动配置
// ==========================================
// 来源: 环境变量（未设置时使用默认值）
// - EXAM_SCHEDULER_DB_PATH: 数据库文件路径
// - EXAM_SCHEDULER_BIND_ADDR: HTTP 监听地址
// - EXAM_SCHEDULER_JWT_SECRET: 与登录子系统共用的签名密钥（必填）
// - EXAM_SCHEDULER_DEV_MODE: 设为 1/true 时允许缺省密钥回退到开发密钥
// - EXAM_SCHEDULER_HEARTBEAT_INTERVAL_SECS / _TIMEOUT_SECS: 实时通道心跳
// ==========================================

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_DB_PATH: &str = "EXAM_SCHEDULER_DB_PATH";
pub const ENV_BIND_ADDR: &str = "EXAM_SCHEDULER_BIND_ADDR";
pub const ENV_JWT_SECRET: &str = "EXAM_SCHEDULER_JWT_SECRET";
pub const ENV_DEV_MODE: &str = "EXAM_SCHEDULER_DEV_MODE";
pub const ENV_HEARTBEAT_INTERVAL: &str = "EXAM_SCHEDULER_HEARTBEAT_INTERVAL_SECS";
pub const ENV_HEARTBEAT_TIMEOUT: &str = "EXAM_SCHEDULER_HEARTBEAT_TIMEOUT_SECS";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 25;
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 60;

/// 开发用签名密钥（仅 EXAM_SCHEDULER_DEV_MODE 开启时使用）
const DEV_JWT_SECRET: &str = "exam-scheduler-dev-secret";

/// 启动配置错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("未设置 {key}，拒绝启动（本地开发可设置 {dev_flag}=1 使用开发密钥）")]
    MissingJwtSecret {
        key: &'static str,
        dev_flag: &'static str,
    },
}

/// 启动配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
}

impl AppConfig {
    /// 从环境变量加载
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载（测试可注入）
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let seconds = |key: &str, default: u64| {
            let secs = match non_empty(key) {
                Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
                    tracing::warn!("{} 取值无效: {}，使用默认值 {}", key, raw, default);
                    default
                }),
                None => default,
            };
            Duration::from_secs(secs.max(1))
        };

        let dev_mode = non_empty(ENV_DEV_MODE)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let jwt_secret = match non_empty(ENV_JWT_SECRET) {
            Some(secret) => secret,
            None if dev_mode => {
                tracing::warn!("未设置 {}，开发模式下使用开发密钥", ENV_JWT_SECRET);
                DEV_JWT_SECRET.to_string()
            }
            None => {
                return Err(ConfigError::MissingJwtSecret {
                    key: ENV_JWT_SECRET,
                    dev_flag: ENV_DEV_MODE,
                })
            }
        };

        Ok(Self {
            db_path: non_empty(ENV_DB_PATH).unwrap_or_else(get_default_db_path),
            bind_addr: non_empty(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            jwt_secret,
            heartbeat_interval: seconds(ENV_HEARTBEAT_INTERVAL, DEFAULT_HEARTBEAT_INTERVAL_SECS),
            heartbeat_timeout: seconds(ENV_HEARTBEAT_TIMEOUT, DEFAULT_HEARTBEAT_TIMEOUT_SECS),
        })
    }
}

/// 默认数据库路径（用户数据目录下，不可用时回退当前目录）
pub fn get_default_db_path() -> String {
    let mut path = PathBuf::from("./exam_scheduler.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("exam-scheduler");
        // 确保目录存在
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("exam_scheduler.db");
        }
    }

    path.to_string_lossy().to_string()
}
