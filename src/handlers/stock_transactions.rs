use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, patch},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{
    created_response, message_response, success_response, ApiPath, ApiQuery, ListResponse,
    ValidatedJson,
};
use crate::{
    auth::AuthUser,
    entities::stock_transaction::{TransactionPriority, TransactionStatus, TransactionType},
    errors::ServiceError,
    services::{
        stock_transactions::{CreateTransactionInput, TransactionFilters, UpdateStatusInput},
        PageRequest,
    },
    AppState,
};

/// Query parameters accepted by `GET /stock-transactions`
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct TransactionListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub department: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub priority: Option<TransactionPriority>,
    /// Inclusive, `YYYY-MM-DD`
    pub date_from: Option<NaiveDate>,
    /// Inclusive, `YYYY-MM-DD`
    pub date_to: Option<NaiveDate>,
    /// Only transactions with a line for this part
    pub part_id: Option<Uuid>,
    /// Matches transaction number, description or reference
    pub search: Option<String>,
}

/// Routes mounted under `/api/v1/stock-transactions`
pub fn stock_transactions_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_transactions).post(create_transaction))
        .route("/stats", get(get_transaction_stats))
        .route("/:id", get(get_transaction).delete(delete_transaction))
        .route("/:id/status", patch(update_transaction_status))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock-transactions",
    params(TransactionListQuery),
    responses(
        (status = 200, description = "Ledger entries visible to the caller"),
        (status = 400, description = "Invalid query", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock-transactions"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<TransactionListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = PageRequest::new(
        query.page.unwrap_or(1),
        state.config.clamp_page_size(query.limit),
    )?;
    let filters = TransactionFilters {
        department: query.department,
        transaction_type: query.transaction_type,
        status: query.status,
        priority: query.priority,
        date_from: query.date_from,
        date_to: query.date_to,
        part_id: query.part_id,
        search: query.search,
    };

    let result = state
        .services
        .stock_transactions
        .list_transactions(filters, page, &user)
        .await?;
    Ok(success_response(ListResponse::from(result)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock-transactions/stats",
    responses(
        (status = 200, description = "Ledger figures", body = crate::services::stock_transactions::TransactionStats),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock-transactions"
)]
pub async fn get_transaction_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let stats = state.services.stock_transactions.get_stats(&user).await?;
    Ok(success_response(stats))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock-transactions/{id}",
    params(("id" = Uuid, Path, description = "Stock transaction ID")),
    responses(
        (status = 200, description = "Transaction with its items", body = crate::services::stock_transactions::TransactionView),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock-transactions"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let transaction = state
        .services
        .stock_transactions
        .get_transaction(id, &user)
        .await?;
    Ok(success_response(transaction))
}

#[utoipa::path(
    post,
    path = "/api/v1/stock-transactions",
    request_body = CreateTransactionInput,
    responses(
        (status = 201, description = "Draft recorded", body = crate::services::stock_transactions::TransactionView),
        (status = 400, description = "Invalid request or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown part", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock-transactions"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<CreateTransactionInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let transaction = state
        .services
        .stock_transactions
        .create_transaction(payload, &user)
        .await?;
    Ok(created_response(transaction))
}

#[utoipa::path(
    patch,
    path = "/api/v1/stock-transactions/{id}/status",
    params(("id" = Uuid, Path, description = "Stock transaction ID")),
    request_body = UpdateStatusInput,
    responses(
        (status = 200, description = "Status changed", body = crate::services::stock_transactions::TransactionView),
        (status = 400, description = "Illegal transition", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admins and department managers only", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent modification", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock-transactions"
)]
pub async fn update_transaction_status(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateStatusInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let transaction = state
        .services
        .stock_transactions
        .update_status(id, payload, &user)
        .await?;
    Ok(success_response(transaction))
}

#[utoipa::path(
    delete,
    path = "/api/v1/stock-transactions/{id}",
    params(("id" = Uuid, Path, description = "Stock transaction ID")),
    responses(
        (status = 200, description = "Draft deleted"),
        (status = 400, description = "Not a draft", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "stock-transactions"
)]
pub async fn delete_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .stock_transactions
        .delete_transaction(id, &user)
        .await?;
    Ok(message_response("Stock transaction deleted"))
}
