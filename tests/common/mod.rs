#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use std::str::FromStr;
use cmms_api::{
    auth::{AuthUser, Role},
    config::AppConfig,
    db::{self, DbConfig},
    entities::asset,
    events::{self, EventSender},
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const MAINTENANCE: &str = "Maintenance";
pub const PRODUCTION: &str = "Production";

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

/// Decoded response: status plus the JSON envelope.
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    /// The `data` member of a success envelope.
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        let pool = db::establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let router = cmms_api::build_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Bearer token for a caller with the given role and department.
    pub fn token_for(&self, role: Role, department: &str) -> String {
        let user = AuthUser::new(
            format!("{}-{}", role, department.to_lowercase()),
            format!("Test {}", role),
            department,
            role,
        );
        self.state
            .auth
            .issue_token(&user)
            .expect("issue test token")
    }

    pub fn admin_token(&self) -> String {
        self.token_for(Role::Admin, MAINTENANCE)
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse { status, body }
    }

    /// Creates a part through the API as an admin and returns its JSON view.
    pub async fn seed_part(
        &self,
        part_number: &str,
        quantity: &str,
        min_stock_level: &str,
        unit_price: &str,
        department: &str,
    ) -> Value {
        let response = self
            .request(
                Method::POST,
                "/api/v1/parts",
                Some(json!({
                    "partNumber": part_number,
                    "name": format!("Part {}", part_number),
                    "category": "mechanical",
                    "quantity": quantity,
                    "minStockLevel": min_stock_level,
                    "unitPrice": unit_price,
                    "department": department,
                })),
                Some(&self.admin_token()),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.data().clone()
    }

    /// Inserts an asset row directly; assets are owned by another subsystem.
    pub async fn seed_asset(&self, name: &str, department: &str, bom: Option<Value>) -> Uuid {
        self.insert_asset(name, department, bom, false).await
    }

    /// Inserts an asset that has been soft-deleted by the asset subsystem.
    pub async fn seed_deleted_asset(&self, name: &str, department: &str, bom: Value) -> Uuid {
        self.insert_asset(name, department, Some(bom), true).await
    }

    async fn insert_asset(
        &self,
        name: &str,
        department: &str,
        bom: Option<Value>,
        is_deleted: bool,
    ) -> Uuid {
        let now = Utc::now();
        let model = asset::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            department: Set(department.to_string()),
            parts_bom: Set(bom),
            is_deleted: Set(is_deleted),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed asset");
        model.id
    }

    /// Creates a stock transaction with one line per `(part_id, part_number, quantity)`.
    pub async fn create_transaction(
        &self,
        kind: &str,
        lines: &[(&str, &str, &str)],
        token: &str,
    ) -> TestResponse {
        let items: Vec<Value> = lines
            .iter()
            .map(|(part_id, part_number, quantity)| {
                json!({
                    "partId": part_id,
                    "partNumber": part_number,
                    "partName": format!("Part {}", part_number),
                    "quantity": quantity,
                })
            })
            .collect();

        self.request(
            Method::POST,
            "/api/v1/stock-transactions",
            Some(json!({
                "transactionType": kind,
                "transactionDate": Utc::now().to_rfc3339(),
                "description": format!("{} for test", kind),
                "items": items,
            })),
            Some(token),
        )
        .await
    }

    pub async fn set_status(&self, id: &str, status: &str, token: &str) -> TestResponse {
        self.request(
            Method::PATCH,
            &format!("/api/v1/stock-transactions/{}/status", id),
            Some(json!({ "status": status })),
            Some(token),
        )
        .await
    }

    /// Walks a draft through pending and approved into completed.
    pub async fn complete(&self, id: &str, token: &str) -> TestResponse {
        for status in ["pending", "approved"] {
            let response = self.set_status(id, status, token).await;
            assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        }
        self.set_status(id, "completed", token).await
    }

    pub async fn get_part(&self, id: &str) -> Value {
        let response = self
            .request(
                Method::GET,
                &format!("/api/v1/parts/{}", id),
                None,
                Some(&self.admin_token()),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        response.data().clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Decimals travel as JSON strings; compare them numerically.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected a decimal, got {}", other),
    }
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id").to_string()
}
