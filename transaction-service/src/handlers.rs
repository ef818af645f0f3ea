//! Handler模块

use std::any::Any;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use common::errors::{AppError, MSG_MISSING_ACCOUNT_NUMBER, MSG_NO_TRANSACTIONS};
use common::middleware::RequestId;
use common::models::TransactionRecord;
use common::response::{ApiResponse, ErrorBody};

use crate::connection::ConnectionScope;
use crate::service::TransactionService;
use crate::state::AppState;

const ACCOUNT_NUMBER_PARAM: &str = "AccountNumber";

/// `GET /transactions` 查询参数
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionQuery {
    /// 账户号码（必填，非空）
    #[serde(rename = "AccountNumber")]
    #[validate(required, length(min = 1))]
    pub account_number: Option<String>,
}

impl TransactionQuery {
    /// 从原始查询参数构造，重复的 AccountNumber 取第一个值
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let account_number = pairs
            .into_iter()
            .find(|(key, _)| key == ACCOUNT_NUMBER_PARAM)
            .map(|(_, value)| value);
        Self { account_number }
    }

    /// Extracts a present, non-empty account number.
    fn into_account_number(self) -> Result<String, AppError> {
        self.validate()
            .map_err(|_| AppError::Validation(MSG_MISSING_ACCOUNT_NUMBER.to_string()))?;
        self.account_number
            .ok_or_else(|| AppError::Validation(MSG_MISSING_ACCOUNT_NUMBER.to_string()))
    }
}

/// 查询账户交易明细
#[utoipa::path(
    get,
    path = "/transactions",
    tag = "transactions",
    params(TransactionQuery),
    responses(
        (status = 200, description = "交易记录，键顺序与存储过程列顺序一致", body = Vec<std::collections::HashMap<String, serde_json::Value>>),
        (status = 400, description = "缺少 AccountNumber 参数", body = ErrorBody),
        (status = 404, description = "没有交易记录", body = ErrorBody),
        (status = 500, description = "数据库或内部错误", body = ErrorBody)
    )
)]
pub async fn get_transactions(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Vec<TransactionRecord>>, AppError> {
    let account_number = match query {
        Ok(Query(pairs)) => TransactionQuery::from_pairs(pairs).into_account_number()?,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unparseable query string");
            return Err(AppError::Validation(MSG_MISSING_ACCOUNT_NUMBER.to_string()));
        }
    };

    let request_id = request_id.map(|Extension(id)| id);
    let mut scope = ConnectionScope::new(state.connector.as_ref(), request_id);
    let result = TransactionService::execute_transaction_query(&mut scope, &account_number).await;
    scope.release().await;

    let records = result?;
    if records.is_empty() {
        return Err(AppError::NotFound(MSG_NO_TRANSACTIONS.to_string()));
    }

    Ok(Json(records))
}

/// 服务信息
#[utoipa::path(
    get,
    path = "/",
    tag = "service",
    responses(
        (status = 200, description = "服务信息", body = ApiResponse<ServiceInfo>)
    )
)]
pub async fn index(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
) -> Json<ApiResponse<ServiceInfo>> {
    let info = ServiceInfo {
        name: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec!["GET /transactions?AccountNumber={account}".to_string()],
    };

    let response = ApiResponse::ok_with_service(info, state.config.service_name.clone());
    match request_id {
        Some(Extension(id)) => Json(response.with_request_id(id.as_str())),
        None => Json(response),
    }
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        database_configured: state.config.database.is_complete(),
    })
}

/// Turns a handler panic into the generic 500 response.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(format!("handler panicked: {}", detail)).into_response()
}

/// 服务信息
#[derive(Serialize, ToSchema)]
pub struct ServiceInfo {
    /// 服务名称
    pub name: String,
    /// 服务版本
    pub version: String,
    /// 可用端点
    pub endpoints: Vec<String>,
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// 服务状态
    pub status: String,
    /// 服务名称
    pub service: String,
    /// 服务版本
    pub version: String,
    /// 当前时间戳
    pub timestamp: DateTime<Utc>,
    /// 数据库配置是否完整
    pub database_configured: bool,
}
