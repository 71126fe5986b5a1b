// ==========================================
// 考试排期系统 - 实时连接中心
// ==========================================
// 职责: 按用户分组管理在线连接，实现 UserPushChannel
// 说明: 推送只写入连接的内存队列，不等待客户端确认
//       连接断开后不保留任何待投递消息
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::engine::events::UserPushChannel;

/// 服务端下发帧
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerEvent {
    pub event: String,
    pub data: Value,
}

impl ServerEvent {
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }
}

/// 已登记连接
pub struct ConnectionHandle {
    pub user_id: String,
    pub connection_id: String,
    pub receiver: UnboundedReceiver<ServerEvent>,
}

type Connections = HashMap<String, HashMap<String, UnboundedSender<ServerEvent>>>;

/// 在线连接中心
#[derive(Default)]
pub struct ChannelHub {
    connections: RwLock<Connections>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新连接
    pub fn register(&self, user_id: &str) -> ConnectionHandle {
        let (sender, receiver) = unbounded_channel();
        let connection_id = Uuid::new_v4().to_string();

        let mut connections = self.connections.write().unwrap_or_else(PoisonError::into_inner);
        connections
            .entry(user_id.to_string())
            .or_default()
            .insert(connection_id.clone(), sender);

        tracing::info!(
            "实时连接建立: user_id={}, connection_id={}, user_connections={}",
            user_id,
            connection_id,
            connections.get(user_id).map(|c| c.len()).unwrap_or(0)
        );

        ConnectionHandle {
            user_id: user_id.to_string(),
            connection_id,
            receiver,
        }
    }

    /// 注销连接
    pub fn unregister(&self, user_id: &str, connection_id: &str) {
        let mut connections = self.connections.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(user_connections) = connections.get_mut(user_id) {
            user_connections.remove(connection_id);
            if user_connections.is_empty() {
                connections.remove(user_id);
            }
        }
        tracing::info!("实时连接断开: user_id={}, connection_id={}", user_id, connection_id);
    }

    /// 某用户的在线连接数
    pub fn connection_count(&self, user_id: &str) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    /// 全部在线连接数
    pub fn total_connections(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|c| c.len())
            .sum()
    }

    /// 在线用户数
    pub fn online_users(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn deliver(senders: &HashMap<String, UnboundedSender<ServerEvent>>, event: &ServerEvent) -> (usize, Vec<String>) {
        let mut reached = 0;
        let mut dead = Vec::new();
        for (connection_id, sender) in senders {
            if sender.send(event.clone()).is_ok() {
                reached += 1;
            } else {
                dead.push(connection_id.clone());
            }
        }
        (reached, dead)
    }
}

impl UserPushChannel for ChannelHub {
    fn send_to_user(
        &self,
        user_id: &str,
        event: &str,
        payload: &Value,
    ) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let frame = ServerEvent::new(event, payload.clone());
        let mut connections = self.connections.write().unwrap_or_else(PoisonError::into_inner);

        let Some(user_connections) = connections.get_mut(user_id) else {
            return Ok(0);
        };

        let (reached, dead) = Self::deliver(user_connections, &frame);
        // 清理已关闭的连接
        for connection_id in &dead {
            user_connections.remove(connection_id);
        }
        if user_connections.is_empty() {
            connections.remove(user_id);
        }
        if !dead.is_empty() {
            tracing::debug!("清理失效连接: user_id={}, count={}", user_id, dead.len());
        }

        Ok(reached)
    }

    fn broadcast_to_all(
        &self,
        event: &str,
        payload: &Value,
    ) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let frame = ServerEvent::new(event, payload.clone());
        let mut connections = self.connections.write().unwrap_or_else(PoisonError::into_inner);

        let mut reached = 0;
        for user_connections in connections.values_mut() {
            let (count, dead) = Self::deliver(user_connections, &frame);
            reached += count;
            for connection_id in &dead {
                user_connections.remove(connection_id);
            }
        }
        connections.retain(|_, c| !c.is_empty());

        tracing::debug!("广播完成: event={}, reached={}", event, reached);
        Ok(reached)
    }
}
