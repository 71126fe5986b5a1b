// ==========================================
// API集成测试辅助工具
// ==========================================
// 职责: 提供API层集成测试的通用测试环境
// - 临时数据库 + 基础数据
// - 记录型推送通道（可设置在线/失败学生）
// ==========================================

#![allow(dead_code)]

use rusqlite::Connection;
use serde_json::Value;
use std::collections::HashSet;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use exam_scheduler::api::ExamApi;
use exam_scheduler::app::AppState;
use exam_scheduler::config::ConfigManager;
use exam_scheduler::db::open_sqlite_connection;
use exam_scheduler::engine::events::{OptionalPushChannel, UserPushChannel};
use exam_scheduler::logging;
use exam_scheduler::realtime::GatewaySettings;

use crate::test_helpers::{create_test_db, seed_campus};

pub const TEST_JWT_SECRET: &str = "test-secret";

// ==========================================
// RecordingChannel - 记录型推送通道
// ==========================================

/// 一次推送记录
#[derive(Debug, Clone)]
pub struct PushRecord {
    pub user_id: String,
    pub event: String,
    pub payload: Value,
}

/// 记录型推送通道
///
/// 在线学生返回 1 个连接，失败学生返回错误，其余视为离线
#[derive(Default)]
pub struct RecordingChannel {
    online: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    records: Mutex<Vec<PushRecord>>,
}

impl RecordingChannel {
    pub fn set_online(&self, user_ids: &[&str]) {
        let mut online = self.online.lock().unwrap();
        online.extend(user_ids.iter().map(|id| id.to_string()));
    }

    pub fn set_failing(&self, user_ids: &[&str]) {
        let mut failing = self.failing.lock().unwrap();
        failing.extend(user_ids.iter().map(|id| id.to_string()));
    }

    /// 已成功推送的记录
    pub fn records(&self) -> Vec<PushRecord> {
        self.records.lock().unwrap().clone()
    }

    /// 已推送的学生ID（排序）
    pub fn delivered_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.records().into_iter().map(|r| r.user_id).collect();
        users.sort();
        users
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }
}

impl UserPushChannel for RecordingChannel {
    fn send_to_user(
        &self,
        user_id: &str,
        event: &str,
        payload: &Value,
    ) -> Result<usize, Box<dyn Error + Send + Sync>> {
        if self.failing.lock().unwrap().contains(user_id) {
            return Err(format!("连接 {} 写入失败", user_id).into());
        }
        if !self.online.lock().unwrap().contains(user_id) {
            return Ok(0);
        }
        self.records.lock().unwrap().push(PushRecord {
            user_id: user_id.to_string(),
            event: event.to_string(),
            payload: payload.clone(),
        });
        Ok(1)
    }

    fn broadcast_to_all(
        &self,
        _event: &str,
        _payload: &Value,
    ) -> Result<usize, Box<dyn Error + Send + Sync>> {
        Ok(self.online.lock().unwrap().len())
    }
}

// ==========================================
// API测试环境
// ==========================================

/// API测试环境
///
/// 包含应用状态、推送通道记录和数据库连接
pub struct ApiTestEnv {
    pub db_path: String,
    pub state: Arc<AppState>,
    pub exam_api: Arc<ExamApi>,
    pub config_manager: Arc<ConfigManager>,
    pub channel: Arc<RecordingChannel>,
    pub conn: Arc<Mutex<Connection>>,

    // 临时文件（确保生命周期）
    _temp_file: NamedTempFile,
}

impl ApiTestEnv {
    /// 带记录型推送通道的测试环境
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let channel = Arc::new(RecordingChannel::default());
        let push: Arc<dyn UserPushChannel> = channel.clone();
        Self::build(channel, OptionalPushChannel::with_channel(push))
    }

    /// 未配置实时通道的测试环境（通知降级为仅日志）
    pub fn without_channel() -> Result<Self, Box<dyn Error>> {
        Self::build(Arc::new(RecordingChannel::default()), OptionalPushChannel::none())
    }

    fn build(
        channel: Arc<RecordingChannel>,
        push: OptionalPushChannel,
    ) -> Result<Self, Box<dyn Error>> {
        logging::init_test();
        let (temp_file, db_path) = create_test_db()?;
        let conn = open_sqlite_connection(&db_path)?;
        seed_campus(&conn)?;
        let conn = Arc::new(Mutex::new(conn));

        let state = AppState::with_push_channel(
            &db_path,
            conn.clone(),
            TEST_JWT_SECRET,
            GatewaySettings::default(),
            push,
        )?;
        let state = Arc::new(state);

        Ok(Self {
            db_path,
            exam_api: state.exam_api.clone(),
            config_manager: state.config_manager.clone(),
            state,
            channel,
            conn,
            _temp_file: temp_file,
        })
    }

    /// 直接执行 SQL（测试数据准备）
    pub fn execute(&self, sql: &str) -> rusqlite::Result<usize> {
        self.conn.lock().unwrap().execute(sql, [])
    }

    /// 统计表行数
    pub fn count(&self, table: &str) -> i64 {
        crate::test_helpers::count_rows(&self.conn.lock().unwrap(), table)
    }
}
