// ==========================================
// 考试排期系统 - 实时通道鉴权
// ==========================================
// 职责: 握手阶段校验 JWT（HS256，与登录子系统共用密钥）
// 规则: 过期与签名无效分开报告，客户端据此决定静默续期或强制登出
// ==========================================

use axum::http::{header, HeaderMap};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// 握手鉴权错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelAuthError {
    #[error("no token provided")]
    NoToken,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,
}

impl ChannelAuthError {
    /// 对外错误码
    pub fn code(&self) -> &'static str {
        match self {
            ChannelAuthError::NoToken => "NO_TOKEN",
            ChannelAuthError::InvalidToken => "INVALID_TOKEN",
            ChannelAuthError::TokenExpired => "TOKEN_EXPIRED",
        }
    }
}

/// 令牌声明
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelClaims {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

// ==========================================
// TokenVerifier
// ==========================================

/// 令牌校验器
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// 校验令牌
    ///
    /// # 返回
    /// - Ok(ChannelClaims): 签名与有效期均通过
    /// - Err(TokenExpired): 签名正确但已过期
    /// - Err(InvalidToken): 其余全部失败情形
    pub fn verify(&self, token: &str) -> Result<ChannelClaims, ChannelAuthError> {
        if token.trim().is_empty() {
            return Err(ChannelAuthError::NoToken);
        }

        decode::<ChannelClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ChannelAuthError::TokenExpired,
                _ => {
                    tracing::debug!("令牌校验失败: {}", e);
                    ChannelAuthError::InvalidToken
                }
            })
    }

    /// 签发令牌（登录子系统之外的工具与测试使用）
    pub fn issue(
        &self,
        user_id: &str,
        role: Option<&str>,
        ttl_secs: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = ChannelClaims {
            user_id: user_id.to_string(),
            email: None,
            role: role.map(str::to_string),
            exp: now + ttl_secs,
            iat: now,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }
}

/// 从握手请求中取令牌：优先 `?token=`，其次 `Authorization: Bearer`
pub fn extract_token(query: &HashMap<String, String>, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = query.get("token").map(|t| t.trim()).filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
