use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{
    created_response, success_response, ApiPath, ApiQuery, ListResponse, ValidatedJson,
};
use crate::{
    auth::AuthUser,
    entities::part::PartStatus,
    errors::ServiceError,
    services::{
        parts::{CreatePartInput, PartFilters, PartSortField, StockFilter, UpdatePartInput},
        PageRequest, SortOrder,
    },
    AppState,
};

/// Query parameters accepted by `GET /parts`
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct PartListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Matches part number, name, SKU or description
    pub search: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub stock_filter: Option<StockFilter>,
    pub supplier: Option<String>,
    pub status: Option<PartStatus>,
    pub sort_by: Option<PartSortField>,
    pub sort_order: Option<SortOrder>,
}

impl PartListQuery {
    fn into_parts(self, state: &AppState) -> Result<(PartFilters, PageRequest), ServiceError> {
        let page = PageRequest::new(
            self.page.unwrap_or(1),
            state.config.clamp_page_size(self.limit),
        )?;
        let filters = PartFilters {
            search: self.search,
            department: self.department,
            category: self.category,
            stock_filter: self.stock_filter,
            supplier: self.supplier,
            status: self.status,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
        };
        Ok((filters, page))
    }
}

/// Routes mounted under `/api/v1/parts`
pub fn parts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_parts).post(create_part))
        .route("/stats", get(get_part_stats))
        .route("/sync-from-assets", post(sync_from_assets))
        .route("/:id", get(get_part).put(update_part))
}

#[utoipa::path(
    get,
    path = "/api/v1/parts",
    params(PartListQuery),
    responses(
        (status = 200, description = "Parts visible to the caller"),
        (status = 400, description = "Invalid query", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "parts"
)]
pub async fn list_parts(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<PartListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (filters, page) = query.into_parts(&state)?;
    let result = state.services.parts.list_parts(filters, page, &user).await?;
    Ok(success_response(ListResponse::from(result)))
}

#[utoipa::path(
    get,
    path = "/api/v1/parts/stats",
    responses(
        (status = 200, description = "Aggregate stock figures", body = crate::services::parts::PartStats),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "parts"
)]
pub async fn get_part_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let stats = state.services.parts.get_stats(&user).await?;
    Ok(success_response(stats))
}

#[utoipa::path(
    get,
    path = "/api/v1/parts/{id}",
    params(("id" = Uuid, Path, description = "Part ID")),
    responses(
        (status = 200, description = "Part with stock status and linked assets", body = crate::services::parts::PartView),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "parts"
)]
pub async fn get_part(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let part = state.services.parts.get_part(id, &user).await?;
    Ok(success_response(part))
}

#[utoipa::path(
    post,
    path = "/api/v1/parts",
    request_body = CreatePartInput,
    responses(
        (status = 201, description = "Part created", body = crate::services::parts::PartView),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Part number or SKU already exists", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "parts"
)]
pub async fn create_part(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(payload): ValidatedJson<CreatePartInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let part = state.services.parts.create_part(payload, &user).await?;
    info!(part_id = %part.id, part_number = %part.part_number, "part created via API");
    Ok(created_response(part))
}

#[utoipa::path(
    put,
    path = "/api/v1/parts/{id}",
    params(("id" = Uuid, Path, description = "Part ID")),
    request_body = UpdatePartInput,
    responses(
        (status = 200, description = "Part updated", body = crate::services::parts::PartView),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Version mismatch", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "parts"
)]
pub async fn update_part(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdatePartInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let part = state.services.parts.update_part(id, payload, &user).await?;
    Ok(success_response(part))
}

#[utoipa::path(
    post,
    path = "/api/v1/parts/sync-from-assets",
    responses(
        (status = 200, description = "Sync finished", body = crate::services::bom_sync::SyncReport),
        (status = 403, description = "Admins and managers only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "parts"
)]
pub async fn sync_from_assets(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.services.parts.sync_from_asset_boms(&user).await?;
    Ok(success_response(report))
}
