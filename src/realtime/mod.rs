// ==========================================
// 考试排期系统 - 实时通道层
// ==========================================
// 职责: 已鉴权的 WebSocket 连接中心，实现引擎层的推送能力
// ==========================================

pub mod auth;
pub mod hub;
pub mod server;

pub use auth::{extract_token, ChannelAuthError, ChannelClaims, TokenVerifier};
pub use hub::{ChannelHub, ConnectionHandle, ServerEvent};
pub use server::{handle_client_frame, GatewaySettings, RealtimeGateway};
