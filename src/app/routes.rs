// ==========================================
// 考试排期系统 - HTTP 路由
// ==========================================
// 职责: 把 HTTP 请求转交 ExamApi，统一响应信封与状态码
// 信封: {success, data | message, errors?}
// 状态码: 校验/冲突 400，未找到 404，重复报名/名额已满 409，存储 500
// ==========================================

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::{ApiError, ApiResult, ValidationViolation};
use crate::app::state::AppState;
use crate::domain::exam::{ExamDraft, ExamFilter, ExamPatch};
use crate::domain::registration::RegistrationRequest;
use crate::domain::types::ExamStatus;
use crate::realtime::{extract_token, ChannelAuthError};

/// 未携带有效令牌时的操作人
pub const SYSTEM_OPERATOR: &str = "system";

/// 构建路由
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/exams", post(create_exam).get(list_exams))
        .route(
            "/api/exams/{id}",
            get(get_exam).patch(update_exam).delete(delete_exam),
        )
        .route(
            "/api/exams/{id}/registrations",
            post(register_student).get(list_registrations),
        )
        .route("/api/students/{id}/exams", get(list_student_exams))
        .route("/ws", get(open_channel))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ==========================================
// 响应信封
// ==========================================

#[derive(Debug, Serialize)]
struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<ValidationViolation>>,
}

fn respond<T: Serialize>(status: StatusCode, data: T, message: Option<&str>) -> Response {
    let body = Envelope {
        success: true,
        data: Some(data),
        message: message.map(str::to_string),
        errors: None,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::ValidationFailed { .. } | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::DatabaseError(_)
            | ApiError::DatabaseConnectionError(_)
            | ApiError::DatabaseTransactionError(_)
            | ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
        }

        let violations = self.violations().to_vec();
        let body: Envelope<()> = Envelope {
            success: false,
            data: None,
            message: Some(self.to_string()),
            errors: (!violations.is_empty()).then_some(violations),
        };
        (status, Json(body)).into_response()
    }
}

/// 在阻塞线程池中执行同步 API
async fn run_blocking<T, F>(job: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ApiError::InternalError(format!("任务执行失败: {}", e)))?
}

/// 审计操作人: 有效令牌的 userId，否则 system
fn operator_of(state: &AppState, headers: &HeaderMap) -> String {
    extract_token(&HashMap::new(), headers)
        .and_then(|token| state.gateway.verifier().verify(&token).ok())
        .map(|claims| claims.user_id)
        .unwrap_or_else(|| SYSTEM_OPERATOR.to_string())
}

fn body_error(rejection: JsonRejection) -> ApiError {
    ApiError::InvalidInput(format!("请求体无法解析: {}", rejection.body_text()))
}

// ==========================================
// 考试
// ==========================================

async fn create_exam(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ExamDraft>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(draft) = payload.map_err(body_error)?;
    let operator = operator_of(&state, &headers);
    let api = state.exam_api.clone();

    let view = run_blocking(move || api.create_exam(&draft, &operator)).await?;
    Ok(respond(StatusCode::CREATED, view, Some("考试创建成功")))
}

/// 列表查询参数（原样接收，转换时校验）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExamListQuery {
    status: Option<String>,
    exam_date: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    class_section_id: Option<String>,
    subject_id: Option<String>,
    room_id: Option<String>,
    #[serde(alias = "search")]
    keyword: Option<String>,
    page: Option<String>,
    #[serde(alias = "limit")]
    page_size: Option<String>,
    sort: Option<String>,
}

impl ExamListQuery {
    fn into_filter(self) -> ApiResult<ExamFilter> {
        fn date(field: &str, raw: Option<String>) -> ApiResult<Option<NaiveDate>> {
            match raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                Some(v) => NaiveDate::parse_from_str(v, "%Y-%m-%d")
                    .map(Some)
                    .map_err(|_| ApiError::invalid_field(field, format!("日期格式无效: {}", v))),
                None => Ok(None),
            }
        }
        fn number(field: &str, raw: Option<String>, default: u32) -> ApiResult<u32> {
            match raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                Some(v) => v
                    .parse::<u32>()
                    .map_err(|_| ApiError::invalid_field(field, format!("取值无效: {}", v))),
                None => Ok(default),
            }
        }
        fn text(raw: Option<String>) -> Option<String> {
            raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }

        let defaults = ExamFilter::default();
        let status = match text(self.status) {
            Some(v) => Some(
                ExamStatus::from_db_str(&v)
                    .ok_or_else(|| ApiError::invalid_field("status", format!("未知考试状态: {}", v)))?,
            ),
            None => None,
        };
        let sort_ascending = match text(self.sort).map(|v| v.to_ascii_lowercase()) {
            Some(v) if v == "asc" => true,
            Some(v) if v == "desc" => false,
            Some(v) => return Err(ApiError::invalid_field("sort", format!("排序方向无效: {}", v))),
            None => defaults.sort_ascending,
        };

        Ok(ExamFilter {
            status,
            exam_date: date("examDate", self.exam_date)?,
            date_from: date("dateFrom", self.date_from)?,
            date_to: date("dateTo", self.date_to)?,
            class_section_id: text(self.class_section_id),
            subject_id: text(self.subject_id),
            room_id: text(self.room_id),
            keyword: text(self.keyword),
            page: number("page", self.page, defaults.page)?,
            page_size: number("pageSize", self.page_size, defaults.page_size)?,
            sort_ascending,
        })
    }
}

async fn list_exams(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ExamListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) =
        query.map_err(|e| ApiError::InvalidInput(format!("查询参数无效: {}", e.body_text())))?;
    let filter = query.into_filter()?;
    let api = state.exam_api.clone();

    let page = run_blocking(move || api.list_exams(&filter)).await?;
    Ok(respond(StatusCode::OK, page, None))
}

async fn get_exam(
    State(state): State<Arc<AppState>>,
    Path(exam_id): Path<String>,
) -> Result<Response, ApiError> {
    let api = state.exam_api.clone();
    let view = run_blocking(move || api.get_exam(&exam_id)).await?;
    Ok(respond(StatusCode::OK, view, None))
}

async fn update_exam(
    State(state): State<Arc<AppState>>,
    Path(exam_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<ExamPatch>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(patch) = payload.map_err(body_error)?;
    let operator = operator_of(&state, &headers);
    let api = state.exam_api.clone();

    let view = run_blocking(move || api.update_exam(&exam_id, &patch, &operator)).await?;
    Ok(respond(StatusCode::OK, view, Some("考试更新成功")))
}

async fn delete_exam(
    State(state): State<Arc<AppState>>,
    Path(exam_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let operator = operator_of(&state, &headers);
    let api = state.exam_api.clone();

    let outcome = run_blocking(move || api.delete_exam(&exam_id, &operator)).await?;
    Ok(respond(StatusCode::OK, outcome, Some("考试已删除")))
}

// ==========================================
// 报名与学生安排
// ==========================================

async fn register_student(
    State(state): State<Arc<AppState>>,
    Path(exam_id): Path<String>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(body_error)?;
    let api = state.exam_api.clone();

    let registration = run_blocking(move || api.register_student(&exam_id, &request)).await?;
    Ok(respond(StatusCode::CREATED, registration, Some("报名成功")))
}

async fn list_registrations(
    State(state): State<Arc<AppState>>,
    Path(exam_id): Path<String>,
) -> Result<Response, ApiError> {
    let api = state.exam_api.clone();
    let registrations = run_blocking(move || api.list_registrations(&exam_id)).await?;
    Ok(respond(StatusCode::OK, registrations, None))
}

async fn list_student_exams(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> Result<Response, ApiError> {
    let api = state.exam_api.clone();
    let entries = run_blocking(move || api.list_student_exams(&student_id)).await?;
    Ok(respond(StatusCode::OK, entries, None))
}

// ==========================================
// 实时通道握手
// ==========================================

fn channel_auth_rejection(err: &ChannelAuthError) -> Response {
    let body = json!({
        "success": false,
        "code": err.code(),
        "message": err.to_string(),
    });
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// 鉴权先于协议升级，令牌问题一律 401
async fn open_channel(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let token = extract_token(&query, &headers);
    let claims = match state.gateway.authenticate(token.as_deref()) {
        Ok(claims) => claims,
        Err(e) => return channel_auth_rejection(&e),
    };

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let gateway = state.gateway.clone();
    upgrade.on_upgrade(move |socket| gateway.serve_connection(socket, claims))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_conversion() {
        let query = ExamListQuery {
            status: Some("scheduled".to_string()),
            date_from: Some("2025-05-01".to_string()),
            keyword: Some("  se ".to_string()),
            page: Some("2".to_string()),
            sort: Some("ASC".to_string()),
            ..Default::default()
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.status, Some(ExamStatus::Scheduled));
        assert_eq!(filter.date_from, NaiveDate::from_ymd_opt(2025, 5, 1));
        assert_eq!(filter.keyword.as_deref(), Some("se"));
        assert_eq!(filter.page, 2);
        assert_eq!(filter.page_size, 10);
        assert!(filter.sort_ascending);
    }

    #[test]
    fn test_list_query_rejects_bad_values() {
        let bad_date = ExamListQuery {
            exam_date: Some("20-05-2025".to_string()),
            ..Default::default()
        };
        let err = bad_date.into_filter().unwrap_err();
        assert_eq!(err.violations()[0].field.as_deref(), Some("examDate"));

        let bad_sort = ExamListQuery {
            sort: Some("sideways".to_string()),
            ..Default::default()
        };
        assert!(bad_sort.into_filter().is_err());
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ApiError::invalid_field("examCode", "x"), StatusCode::BAD_REQUEST),
            (ApiError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (ApiError::Conflict("x".to_string()), StatusCode::CONFLICT),
            (ApiError::DatabaseError("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
