// ==========================================
// 实时通道 集成测试
// ==========================================
// 测试范围:
// 1. 握手鉴权: 无令牌 / 签名无效 / 过期 分别返回 401 与不同错误码
// 2. ChannelHub 作为通知分发器的推送通道
// 3. 客户端 ping → pong
// ==========================================


use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use rusqlite::Connection;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use exam_scheduler::app::{build_router, AppState};
use exam_scheduler::db::open_sqlite_connection;
use exam_scheduler::domain::exam::ExamDraft;
use exam_scheduler::realtime::{handle_client_frame, GatewaySettings, TokenVerifier};
use test_helpers::*;

const SECRET: &str = "realtime-secret";

fn hub_backed_state() -> (NamedTempFile, Arc<AppState>) {
    let (temp_file, db_path) = create_test_db().expect("无法创建测试数据库");
    let conn: Connection = open_sqlite_connection(&db_path).unwrap();
    seed_campus(&conn).unwrap();

    let state = AppState::from_connection(
        &db_path,
        Arc::new(Mutex::new(conn)),
        SECRET,
        GatewaySettings::default(),
    )
    .expect("AppState 初始化失败");
    (temp_file, Arc::new(state))
}

async fn handshake(state: Arc<AppState>, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(token) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let response = build_router(state)
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

// ==========================================
// 握手鉴权
// ==========================================

#[tokio::test]
async fn test_handshake_without_token_rejected() {
    let (_guard, state) = hub_backed_state();

    let (status, body) = handshake(state, "/ws", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NO_TOKEN");
    assert_eq!(body["message"], "no token provided");
}

#[tokio::test]
async fn test_expired_and_invalid_tokens_distinguished() {
    let (_guard, state) = hub_backed_state();
    let verifier = TokenVerifier::new(SECRET);

    let expired = verifier.issue("S1", Some("student"), -30).unwrap();
    let (status, body) = handshake(state.clone(), &format!("/ws?token={}", expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_EXPIRED");
    assert_eq!(body["message"], "token expired");

    let forged = TokenVerifier::new("another-secret").issue("S1", None, 600).unwrap();
    let (status, body) = handshake(state, "/ws", Some(&forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
    assert_eq!(body["message"], "invalid token");
}

#[test]
fn test_empty_signing_secret_refused() {
    let (_temp_file, db_path) = create_test_db().expect("无法创建测试数据库");
    let conn: Connection = open_sqlite_connection(&db_path).unwrap();

    let result = AppState::from_connection(
        &db_path,
        Arc::new(Mutex::new(conn)),
        "  ",
        GatewaySettings::default(),
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn test_valid_token_passes_auth_before_upgrade() {
    let (_guard, state) = hub_backed_state();
    let token = TokenVerifier::new(SECRET).issue("S1", None, 600).unwrap();

    // 普通 GET 不是协议升级请求，鉴权通过后由升级提取器拒绝
    let (status, _) = handshake(state, &format!("/ws?token={}", token), None).await;
    assert_ne!(status, StatusCode::UNAUTHORIZED);
    assert!(status.is_client_error());
}

// ==========================================
// ChannelHub 推送
// ==========================================

#[tokio::test]
async fn test_hub_receives_exam_notification() {
    let (_guard, state) = hub_backed_state();
    let mut s1 = state.hub.register("S1");
    let mut s1_tablet = state.hub.register("S1");
    let mut s3 = state.hub.register("S3");

    let draft = ExamDraft {
        exam_code: Some("SE-LIVE".to_string()),
        subject_id: Some(SUBJECT_SE.to_string()),
        class_section_id: Some(SECTION_SE_1.to_string()),
        room_id: Some(ROOM_A102.to_string()),
        slot_id: Some(SLOT_MORNING.to_string()),
        exam_date: Some("2025-06-10".to_string()),
        start_time: Some("07:00".to_string()),
        end_time: Some("09:30".to_string()),
        max_capacity: Some(30),
        ..Default::default()
    };
    let api = state.exam_api.clone();
    tokio::task::spawn_blocking(move || api.create_exam(&draft, "admin"))
        .await
        .unwrap()
        .expect("创建考试失败");

    let event = tokio::time::timeout(std::time::Duration::from_secs(2), s1.receiver.recv())
        .await
        .expect("等待推送超时")
        .expect("连接已关闭");
    assert_eq!(event.event, "exam-notification");
    assert_eq!(event.data["examSummary"]["examCode"], "SE-LIVE");

    let second = tokio::time::timeout(std::time::Duration::from_secs(2), s1_tablet.receiver.recv())
        .await
        .expect("等待推送超时");
    assert!(second.is_some(), "同一用户的每个连接都应收到");

    // S3 不在 SE 1 班
    assert!(s3.receiver.try_recv().is_err());
}

#[tokio::test]
async fn test_disconnected_user_receives_nothing_later() {
    let (_guard, state) = hub_backed_state();
    let connection = state.hub.register("S2");
    state.hub.unregister("S2", &connection.connection_id);
    assert_eq!(state.hub.connection_count("S2"), 0);

    use exam_scheduler::engine::UserPushChannel;
    let reached = state
        .hub
        .send_to_user("S2", "exam-notification", &serde_json::json!({}))
        .unwrap();
    assert_eq!(reached, 0);
}

// ==========================================
// 客户端帧
// ==========================================

#[test]
fn test_ping_frame_answered() {
    let reply = handle_client_frame(r#"{"event":"ping","data":"hello"}"#).expect("应回复 pong");
    assert_eq!(reply.event, "pong");
    assert_eq!(reply.data["receivedData"], "hello");
}
