mod common;

use axum::http::{Method, StatusCode};
use chrono::{Datelike, Utc};
use cmms_api::auth::Role;
use cmms_api::entities::part;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::json;
use uuid::Uuid;

use common::{decimal, id_of, TestApp, MAINTENANCE, PRODUCTION};

#[tokio::test]
async fn issue_completion_depletes_stock_and_blocks_overdraw() {
    let app = TestApp::new().await;
    let technician = app.token_for(Role::Technician, MAINTENANCE);
    let manager = app.token_for(Role::Manager, MAINTENANCE);

    let part = app.seed_part("P-100", "10", "5", "2", MAINTENANCE).await;
    let part_id = id_of(&part);

    let created = app
        .create_transaction("issue", &[(&part_id, "P-100", "4")], &technician)
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    assert_eq!(created.data()["status"], "draft");
    assert_eq!(decimal(&created.data()["totalAmount"]), dec!(8));
    let transaction_id = id_of(created.data());

    // Drafts do not move stock.
    assert_eq!(decimal(&app.get_part(&part_id).await["quantity"]), dec!(10));

    let completed = app.complete(&transaction_id, &manager).await;
    assert_eq!(completed.status, StatusCode::OK, "{}", completed.body);
    assert_eq!(completed.data()["status"], "completed");
    assert_eq!(completed.data()["completedBy"], "manager-maintenance");
    assert!(completed.data()["approvedAt"].is_string());

    let after = app.get_part(&part_id).await;
    assert_eq!(decimal(&after["quantity"]), dec!(6));
    assert_eq!(decimal(&after["totalValue"]), dec!(12));
    assert_eq!(decimal(&after["totalConsumed"]), dec!(4));
    assert_eq!(after["stockStatus"], "in_stock");
    assert!(after["lastUsedDate"].is_string());

    let overdraw = app
        .create_transaction("issue", &[(&part_id, "P-100", "10")], &technician)
        .await;
    assert_eq!(overdraw.status, StatusCode::BAD_REQUEST);
    assert_eq!(overdraw.body["success"], false);
    assert!(overdraw.body["message"]
        .as_str()
        .unwrap()
        .contains("Insufficient stock"));

    // Nothing was recorded for the rejected movement.
    let list = app
        .request(
            Method::GET,
            "/api/v1/stock-transactions",
            None,
            Some(&manager),
        )
        .await;
    assert_eq!(list.data()["pagination"]["totalCount"], 1);
}

#[tokio::test]
async fn overdraw_check_sums_lines_for_the_same_part() {
    let app = TestApp::new().await;
    let token = app.admin_token();
    let part_id = id_of(&app.seed_part("P-110", "5", "0", "1", MAINTENANCE).await);

    let response = app
        .create_transaction(
            "transfer_out",
            &[(&part_id, "P-110", "3"), (&part_id, "P-110", "3")],
            &token,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST, "{}", response.body);
}

#[tokio::test]
async fn receipt_adds_and_adjustment_sets() {
    let app = TestApp::new().await;
    let token = app.admin_token();
    let part_id = id_of(&app.seed_part("P-120", "3", "1", "5", MAINTENANCE).await);

    let receipt = app
        .create_transaction("receipt", &[(&part_id, "P-120", "7")], &token)
        .await;
    assert_eq!(receipt.status, StatusCode::CREATED, "{}", receipt.body);
    let completed = app.complete(&id_of(receipt.data()), &token).await;
    assert_eq!(completed.status, StatusCode::OK, "{}", completed.body);

    let after_receipt = app.get_part(&part_id).await;
    assert_eq!(decimal(&after_receipt["quantity"]), dec!(10));
    assert_eq!(decimal(&after_receipt["totalValue"]), dec!(50));
    assert_eq!(decimal(&after_receipt["totalConsumed"]), dec!(0));

    let adjustment = app
        .create_transaction("adjustment", &[(&part_id, "P-120", "4")], &token)
        .await;
    assert_eq!(adjustment.status, StatusCode::CREATED, "{}", adjustment.body);
    let completed = app.complete(&id_of(adjustment.data()), &token).await;
    assert_eq!(completed.status, StatusCode::OK, "{}", completed.body);

    let after_adjustment = app.get_part(&part_id).await;
    assert_eq!(decimal(&after_adjustment["quantity"]), dec!(4));
    assert_eq!(decimal(&after_adjustment["totalValue"]), dec!(20));
    assert_eq!(after_adjustment["stockStatus"], "in_stock");
}

#[tokio::test]
async fn scrap_never_drives_stock_negative() {
    let app = TestApp::new().await;
    let token = app.admin_token();
    let part_id = id_of(&app.seed_part("P-130", "2", "1", "3", MAINTENANCE).await);

    let scrap = app
        .create_transaction("scrap", &[(&part_id, "P-130", "5")], &token)
        .await;
    assert_eq!(scrap.status, StatusCode::CREATED, "{}", scrap.body);
    let completed = app.complete(&id_of(scrap.data()), &token).await;
    assert_eq!(completed.status, StatusCode::OK, "{}", completed.body);

    let after = app.get_part(&part_id).await;
    assert_eq!(decimal(&after["quantity"]), dec!(0));
    assert_eq!(decimal(&after["totalValue"]), dec!(0));
    assert_eq!(after["stockStatus"], "out_of_stock");
}

#[tokio::test]
async fn only_drafts_can_be_deleted() {
    let app = TestApp::new().await;
    let technician = app.token_for(Role::Technician, MAINTENANCE);
    let manager = app.token_for(Role::Manager, MAINTENANCE);
    let part_id = id_of(&app.seed_part("P-140", "10", "1", "1", MAINTENANCE).await);

    let draft = app
        .create_transaction("receipt", &[(&part_id, "P-140", "1")], &technician)
        .await;
    let draft_id = id_of(draft.data());

    let deleted = app
        .request(
            Method::DELETE,
            &format!("/api/v1/stock-transactions/{}", draft_id),
            None,
            Some(&technician),
        )
        .await;
    assert_eq!(deleted.status, StatusCode::OK, "{}", deleted.body);

    let gone = app
        .request(
            Method::GET,
            &format!("/api/v1/stock-transactions/{}", draft_id),
            None,
            Some(&technician),
        )
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let pending = app
        .create_transaction("receipt", &[(&part_id, "P-140", "1")], &technician)
        .await;
    let pending_id = id_of(pending.data());
    let moved = app.set_status(&pending_id, "pending", &manager).await;
    assert_eq!(moved.status, StatusCode::OK, "{}", moved.body);

    let refused = app
        .request(
            Method::DELETE,
            &format!("/api/v1/stock-transactions/{}", pending_id),
            None,
            Some(&manager),
        )
        .await;
    assert_eq!(refused.status, StatusCode::BAD_REQUEST);
    assert!(refused.body["message"]
        .as_str()
        .unwrap()
        .contains("Only draft transactions can be deleted"));
}

#[tokio::test]
async fn illegal_transitions_are_rejected() {
    let app = TestApp::new().await;
    let token = app.admin_token();
    let part_id = id_of(&app.seed_part("P-150", "10", "1", "1", MAINTENANCE).await);

    let created = app
        .create_transaction("issue", &[(&part_id, "P-150", "1")], &token)
        .await;
    let id = id_of(created.data());

    let skip = app.set_status(&id, "completed", &token).await;
    assert_eq!(skip.status, StatusCode::BAD_REQUEST);

    let cancelled = app.set_status(&id, "cancelled", &token).await;
    assert_eq!(cancelled.status, StatusCode::OK, "{}", cancelled.body);
    assert!(cancelled.data()["cancelledAt"].is_string());

    let revived = app.set_status(&id, "pending", &token).await;
    assert_eq!(revived.status, StatusCode::BAD_REQUEST);

    assert_eq!(decimal(&app.get_part(&part_id).await["quantity"]), dec!(10));
}

#[tokio::test]
async fn technicians_cannot_change_status() {
    let app = TestApp::new().await;
    let technician = app.token_for(Role::Technician, MAINTENANCE);
    let other_manager = app.token_for(Role::Manager, PRODUCTION);
    let part_id = id_of(&app.seed_part("P-160", "10", "1", "1", MAINTENANCE).await);

    let created = app
        .create_transaction("issue", &[(&part_id, "P-160", "1")], &technician)
        .await;
    let id = id_of(created.data());

    let by_technician = app.set_status(&id, "pending", &technician).await;
    assert_eq!(by_technician.status, StatusCode::FORBIDDEN);

    let by_other_department = app.set_status(&id, "pending", &other_manager).await;
    assert_eq!(by_other_department.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn transaction_numbers_are_sequential_within_the_month() {
    let app = TestApp::new().await;
    let token = app.admin_token();
    let part_id = id_of(&app.seed_part("P-170", "10", "1", "1", MAINTENANCE).await);

    let now = Utc::now();
    let prefix = format!("ST{:02}{:02}", now.year() % 100, now.month());

    let mut numbers = Vec::new();
    for _ in 0..3 {
        let created = app
            .create_transaction("receipt", &[(&part_id, "P-170", "1")], &token)
            .await;
        assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
        numbers.push(created.data()["transactionNumber"].as_str().unwrap().to_string());
    }

    assert_eq!(
        numbers,
        vec![
            format!("{}0001", prefix),
            format!("{}0002", prefix),
            format!("{}0003", prefix),
        ]
    );
}

#[tokio::test]
async fn failed_completion_leaves_every_part_unchanged() {
    let app = TestApp::new().await;
    let token = app.admin_token();
    let first = id_of(&app.seed_part("P-180", "10", "1", "1", MAINTENANCE).await);
    let second = id_of(&app.seed_part("P-181", "10", "1", "1", MAINTENANCE).await);

    let created = app
        .create_transaction(
            "issue",
            &[(&first, "P-180", "2"), (&second, "P-181", "2")],
            &token,
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    let id = id_of(created.data());
    for status in ["pending", "approved"] {
        assert_eq!(app.set_status(&id, status, &token).await.status, StatusCode::OK);
    }

    // The second part disappears underneath the approved transaction.
    let second_id = Uuid::parse_str(&second).unwrap();
    part::Entity::delete_by_id(second_id)
        .exec(&*app.state.db)
        .await
        .unwrap();

    let failed = app.set_status(&id, "completed", &token).await;
    assert_eq!(failed.status, StatusCode::NOT_FOUND, "{}", failed.body);

    let untouched = app.get_part(&first).await;
    assert_eq!(decimal(&untouched["quantity"]), dec!(10));
    assert_eq!(untouched["version"], 1);

    let still_approved = app
        .request(
            Method::GET,
            &format!("/api/v1/stock-transactions/{}", id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(still_approved.data()["status"], "approved");
}

#[tokio::test]
async fn unknown_parts_are_rejected_at_creation() {
    let app = TestApp::new().await;
    let token = app.admin_token();
    let missing = Uuid::new_v4().to_string();

    let response = app
        .create_transaction("receipt", &[(&missing, "P-404", "1")], &token)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_item_lists_fail_validation() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/stock-transactions",
            Some(json!({
                "transactionType": "receipt",
                "transactionDate": Utc::now().to_rfc3339(),
                "description": "nothing",
                "items": [],
            })),
            Some(&app.admin_token()),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn listings_are_scoped_and_filterable() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    let maintenance = app.token_for(Role::Technician, MAINTENANCE);
    let production = app.token_for(Role::Technician, PRODUCTION);

    let maintenance_part = id_of(&app.seed_part("P-190", "10", "1", "1", MAINTENANCE).await);
    let production_part = id_of(&app.seed_part("P-191", "10", "1", "1", PRODUCTION).await);

    let ours = app
        .create_transaction("receipt", &[(&maintenance_part, "P-190", "1")], &maintenance)
        .await;
    assert_eq!(ours.status, StatusCode::CREATED, "{}", ours.body);
    let theirs = app
        .create_transaction("issue", &[(&production_part, "P-191", "1")], &production)
        .await;
    assert_eq!(theirs.status, StatusCode::CREATED, "{}", theirs.body);

    let scoped = app
        .request(Method::GET, "/api/v1/stock-transactions", None, Some(&maintenance))
        .await;
    assert_eq!(scoped.data()["pagination"]["totalCount"], 1);
    assert_eq!(scoped.data()["items"][0]["department"], MAINTENANCE);

    let foreign = app
        .request(
            Method::GET,
            &format!("/api/v1/stock-transactions/{}", id_of(theirs.data())),
            None,
            Some(&maintenance),
        )
        .await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    let by_part = app
        .request(
            Method::GET,
            &format!("/api/v1/stock-transactions?partId={}", production_part),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(by_part.data()["pagination"]["totalCount"], 1);
    assert_eq!(by_part.data()["items"][0]["transactionType"], "issue");

    let stats = app
        .request(Method::GET, "/api/v1/stock-transactions/stats", None, Some(&admin))
        .await;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.data()["total"], 2);
    assert_eq!(stats.data()["byStatus"]["draft"], 2);
    assert_eq!(stats.data()["byType"]["receipt"], 1);
    assert_eq!(stats.data()["thisMonth"], 2);
}
