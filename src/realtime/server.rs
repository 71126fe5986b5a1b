// ==========================================
// 考试排期系统 - 实时通道网关
// ==========================================
// 职责: 握手鉴权、连接生命周期、心跳保活
// 帧格式: JSON {event, data}
// - 服务端 → 客户端: welcome / exam-notification / pong
// - 客户端 → 服务端: ping
// ==========================================

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::realtime::auth::{ChannelAuthError, ChannelClaims, TokenVerifier};
use crate::realtime::hub::{ChannelHub, ConnectionHandle, ServerEvent};

pub const WELCOME_EVENT: &str = "welcome";
pub const PING_EVENT: &str = "ping";
pub const PONG_EVENT: &str = "pong";

/// 心跳参数
#[derive(Debug, Clone, Copy)]
pub struct GatewaySettings {
    /// 服务端 Ping 帧间隔
    pub heartbeat_interval: Duration,
    /// 无任何入站帧超过该时长即断开
    pub heartbeat_timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(crate::config::app_config::DEFAULT_HEARTBEAT_INTERVAL_SECS),
            heartbeat_timeout: Duration::from_secs(crate::config::app_config::DEFAULT_HEARTBEAT_TIMEOUT_SECS),
        }
    }
}

// ==========================================
// RealtimeGateway
// ==========================================

pub struct RealtimeGateway {
    hub: Arc<ChannelHub>,
    verifier: TokenVerifier,
    settings: GatewaySettings,
}

impl RealtimeGateway {
    pub fn new(hub: Arc<ChannelHub>, verifier: TokenVerifier, settings: GatewaySettings) -> Self {
        Self {
            hub,
            verifier,
            settings,
        }
    }

    pub fn hub(&self) -> &Arc<ChannelHub> {
        &self.hub
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// 握手鉴权
    pub fn authenticate(&self, token: Option<&str>) -> Result<ChannelClaims, ChannelAuthError> {
        let token = token.ok_or(ChannelAuthError::NoToken)?;
        let result = self.verifier.verify(token);
        if let Err(e) = &result {
            tracing::warn!("实时通道握手被拒: code={}, reason={}", e.code(), e);
        }
        result
    }

    /// 服务单个已鉴权连接，直到断开
    pub async fn serve_connection(self: Arc<Self>, socket: WebSocket, claims: ChannelClaims) {
        let ConnectionHandle {
            user_id,
            connection_id,
            mut receiver,
        } = self.hub.register(&claims.user_id);

        let (mut sink, mut stream) = socket.split();

        let welcome = ServerEvent::new(
            WELCOME_EVENT,
            json!({
                "message": "实时通道已连接",
                "userId": user_id,
                "connectionId": connection_id,
            }),
        );

        if send_event(&mut sink, &welcome).await.is_ok() {
            let mut heartbeat = interval(self.settings.heartbeat_interval);
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 首次 tick 立即返回
            heartbeat.tick().await;
            let mut last_seen = Instant::now();

            loop {
                tokio::select! {
                    outbound = receiver.recv() => match outbound {
                        Some(event) => {
                            if send_event(&mut sink, &event).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    inbound = stream.next() => match inbound {
                        Some(Ok(message)) => {
                            last_seen = Instant::now();
                            match message {
                                Message::Text(text) => {
                                    if let Some(reply) = handle_client_frame(text.as_str()) {
                                        if send_event(&mut sink, &reply).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                                Message::Close(_) => break,
                                _ => {}
                            }
                        }
                        Some(Err(e)) => {
                            tracing::debug!("连接读取错误: connection_id={}, error={}", connection_id, e);
                            break;
                        }
                        None => break,
                    },
                    _ = heartbeat.tick() => {
                        if last_seen.elapsed() >= self.settings.heartbeat_timeout {
                            tracing::warn!(
                                "心跳超时断开: user_id={}, connection_id={}, silent_secs={}",
                                user_id,
                                connection_id,
                                last_seen.elapsed().as_secs()
                            );
                            break;
                        }
                        if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        self.hub.unregister(&user_id, &connection_id);
        tracing::debug!(
            "实时通道在线概况: online_users={}, connections={}",
            self.hub.online_users(),
            self.hub.total_connections()
        );
    }
}

async fn send_event(
    sink: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("事件序列化失败: event={}, error={}", event.event, e);
            return Ok(());
        }
    };
    sink.send(Message::Text(text.into())).await
}

/// 处理客户端文本帧
///
/// # 返回
/// - Some(ServerEvent): 需要回复的帧（目前只有 pong）
/// - None: 无需回复或无法解析
pub fn handle_client_frame(text: &str) -> Option<ServerEvent> {
    let frame: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            tracing::debug!("忽略无法解析的客户端帧: {}", text);
            return None;
        }
    };

    match frame.get("event").and_then(Value::as_str) {
        Some(PING_EVENT) => Some(ServerEvent::new(
            PONG_EVENT,
            json!({
                "message": "pong",
                "timestamp": Utc::now().to_rfc3339(),
                "receivedData": frame.get("data").cloned().unwrap_or(Value::Null),
            }),
        )),
        other => {
            tracing::debug!("忽略未知客户端事件: {:?}", other);
            None
        }
    }
}
