use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CMMS Parts API",
        version = "1.0.0",
        description = r#"
# CMMS Parts Inventory API

Parts catalog, stock movement ledger and asset bill-of-materials reconciliation
for the maintenance management system.

## Authentication

Every endpoint under `/api/v1` requires a bearer JWT carrying `sub`, `name`,
`department` and `role` claims:

```
Authorization: Bearer <your-jwt-token>
```

## Responses

Successful calls return `{ "success": true, "data": ..., "meta": { "requestId", "timestamp" } }`.
Failures return `{ "success": false, "message": ..., "meta": ... }`.

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, capped by
configuration) and report `currentPage`, `totalPages`, `totalCount`,
`hasNext` and `hasPrevious`.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "parts", description = "Parts catalog endpoints"),
        (name = "stock-transactions", description = "Stock movement ledger endpoints")
    ),
    paths(
        // Parts
        crate::handlers::parts::list_parts,
        crate::handlers::parts::get_part_stats,
        crate::handlers::parts::get_part,
        crate::handlers::parts::create_part,
        crate::handlers::parts::update_part,
        crate::handlers::parts::sync_from_assets,

        // Stock transactions
        crate::handlers::stock_transactions::list_transactions,
        crate::handlers::stock_transactions::get_transaction_stats,
        crate::handlers::stock_transactions::get_transaction,
        crate::handlers::stock_transactions::create_transaction,
        crate::handlers::stock_transactions::update_transaction_status,
        crate::handlers::stock_transactions::delete_transaction,
    ),
    components(
        schemas(
            // Common types
            crate::ResponseMeta,
            crate::handlers::common::PaginationMeta,
            crate::services::SortOrder,
            crate::auth::Role,

            // Part types
            crate::services::parts::PartView,
            crate::services::parts::LinkedAsset,
            crate::services::parts::PartStats,
            crate::services::parts::CreatePartInput,
            crate::services::parts::UpdatePartInput,
            crate::services::parts::StockFilter,
            crate::services::parts::PartSortField,
            crate::services::bom_sync::SyncReport,
            crate::entities::part::PartStatus,
            crate::entities::part::StockStatus,
            crate::entities::part_asset_link::Criticality,

            // Ledger types
            crate::services::stock_transactions::TransactionView,
            crate::services::stock_transactions::TransactionItemView,
            crate::services::stock_transactions::TransactionStats,
            crate::services::stock_transactions::CreateTransactionInput,
            crate::services::stock_transactions::TransactionItemInput,
            crate::services::stock_transactions::UpdateStatusInput,
            crate::entities::stock_transaction::TransactionType,
            crate::entities::stock_transaction::TransactionStatus,
            crate::entities::stock_transaction::TransactionPriority,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}
