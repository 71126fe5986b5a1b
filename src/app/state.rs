// ==========================================
// 考试排期系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 全部 Repository 共享同一数据库连接
//       ChannelHub 在构造时作为推送通道注入通知分发器
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::api::{ExamApi, ExamValidator};
use crate::config::{AppConfig, ConfigManager};
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::events::{OptionalPushChannel, UserPushChannel};
use crate::engine::repositories::{ExamRepositories, ScheduleFactReader};
use crate::engine::{EnrollmentResolver, NotificationDispatcher, SlotLockMap};
use crate::realtime::{ChannelHub, GatewaySettings, RealtimeGateway, TokenVerifier};
use crate::repository::{
    EnrollmentRepository, ExamRepository, ReferenceRepository, RegistrationRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源，作为 axum 路由的共享状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 考试管理API
    pub exam_api: Arc<ExamApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 在线连接中心
    pub hub: Arc<ChannelHub>,

    /// 实时通道网关
    pub gateway: Arc<RealtimeGateway>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - config: 启动配置
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并初始化表结构（幂等）
    /// 2. 初始化所有Repository
    /// 3. 组装引擎、实时通道与API实例
    pub fn new(config: &AppConfig) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", config.db_path);

        let conn = open_sqlite_connection(&config.db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库表结构初始化失败: {}", e))?;

        let settings = GatewaySettings {
            heartbeat_interval: config.heartbeat_interval,
            heartbeat_timeout: config.heartbeat_timeout,
        };

        Self::from_connection(
            &config.db_path,
            Arc::new(Mutex::new(conn)),
            &config.jwt_secret,
            settings,
        )
    }

    /// 从已有连接创建（推送通道为 ChannelHub）
    ///
    /// 调用方负责表结构已初始化
    pub fn from_connection(
        db_path: &str,
        conn: Arc<Mutex<Connection>>,
        jwt_secret: &str,
        settings: GatewaySettings,
    ) -> Result<Self, String> {
        let hub = Arc::new(ChannelHub::new());
        let channel: Arc<dyn UserPushChannel> = hub.clone();
        Self::assemble(
            db_path,
            conn,
            jwt_secret,
            settings,
            hub,
            OptionalPushChannel::with_channel(channel),
        )
    }

    /// 从已有连接创建，并指定推送通道
    ///
    /// 传入 `OptionalPushChannel::none()` 时通知降级为仅记录日志
    pub fn with_push_channel(
        db_path: &str,
        conn: Arc<Mutex<Connection>>,
        jwt_secret: &str,
        settings: GatewaySettings,
        channel: OptionalPushChannel,
    ) -> Result<Self, String> {
        Self::assemble(
            db_path,
            conn,
            jwt_secret,
            settings,
            Arc::new(ChannelHub::new()),
            channel,
        )
    }

    fn assemble(
        db_path: &str,
        conn: Arc<Mutex<Connection>>,
        jwt_secret: &str,
        settings: GatewaySettings,
        hub: Arc<ChannelHub>,
        channel: OptionalPushChannel,
    ) -> Result<Self, String> {
        if jwt_secret.trim().is_empty() {
            return Err("实时通道签名密钥为空，拒绝初始化".to_string());
        }

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let exam_repo = Arc::new(ExamRepository::from_connection(conn.clone()));
        let registration_repo = Arc::new(RegistrationRepository::from_connection(conn.clone()));
        let enrollment_repo = Arc::new(EnrollmentRepository::from_connection(conn.clone()));
        let reference_repo = Arc::new(ReferenceRepository::from_connection(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let facts: Arc<dyn ScheduleFactReader> = Arc::new(ExamRepositories::new(
            exam_repo.clone(),
            enrollment_repo,
            reference_repo.clone(),
        ));

        if !channel.is_configured() {
            tracing::warn!("未配置实时推送通道，考试通知将仅记录日志");
        }

        let validator = Arc::new(ExamValidator::new(facts.clone()));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            EnrollmentResolver::new(facts),
            channel,
        ));

        // ==========================================
        // 初始化API层
        // ==========================================
        let exam_api = Arc::new(ExamApi::new(
            exam_repo,
            registration_repo,
            reference_repo,
            validator,
            dispatcher,
            config_manager.clone(),
            Arc::new(SlotLockMap::new()),
        ));

        let gateway = Arc::new(RealtimeGateway::new(
            hub.clone(),
            TokenVerifier::new(jwt_secret),
            settings,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path: db_path.to_string(),
            exam_api,
            config_manager,
            hub,
            gateway,
        })
    }
}
