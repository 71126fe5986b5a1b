// ==========================================
// 考试排期系统 - 引擎层推送能力
// ==========================================
// 职责: 定义按用户寻址的推送 trait，实现依赖倒置
// 说明: Engine 层定义 trait，realtime 层的 ChannelHub 实现
//       通知分发器在构造时注入可选的推送通道，不再全局查找
// ==========================================

use serde_json::Value;
use std::error::Error;
use std::sync::Arc;

/// 考试通知事件名
pub const EXAM_NOTIFICATION_EVENT: &str = "exam-notification";

// ==========================================
// 推送通道 Trait
// ==========================================

/// 按用户寻址的推送通道
///
/// # 实现说明
/// - `realtime::ChannelHub` 实现此 trait
/// - 推送为内存内投递，不等待客户端确认
pub trait UserPushChannel: Send + Sync {
    /// 向某用户的全部在线连接推送事件
    ///
    /// # 返回
    /// - `Ok(n)`: 实际送达的在线连接数（0 表示该用户当前不在线）
    /// - `Err`: 推送失败
    fn send_to_user(
        &self,
        user_id: &str,
        event: &str,
        payload: &Value,
    ) -> Result<usize, Box<dyn Error + Send + Sync>>;

    /// 向全部在线连接广播
    fn broadcast_to_all(
        &self,
        event: &str,
        payload: &Value,
    ) -> Result<usize, Box<dyn Error + Send + Sync>>;
}

/// 可选的推送通道包装
///
/// 简化 Option<Arc<dyn UserPushChannel>> 的使用
#[derive(Clone)]
pub struct OptionalPushChannel {
    inner: Option<Arc<dyn UserPushChannel>>,
}

impl OptionalPushChannel {
    /// 创建带推送通道的实例
    pub fn with_channel(channel: Arc<dyn UserPushChannel>) -> Self {
        Self {
            inner: Some(channel),
        }
    }

    /// 创建空实例（无实时通道）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 检查是否配置了推送通道
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    /// 获取推送通道
    pub fn channel(&self) -> Option<&Arc<dyn UserPushChannel>> {
        self.inner.as_ref()
    }
}

impl Default for OptionalPushChannel {
    fn default() -> Self {
        Self::none()
    }
}
