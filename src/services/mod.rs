// Catalog and ledger
pub mod parts;
pub mod stock_transactions;

// Asset BOM reconciliation
pub mod bom_sync;

// Building blocks shared by the services above
pub mod sequence;
pub mod stock_movement;

use rust_decimal::Decimal;
use sea_orm::DatabaseTransaction;
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::ValidationError;

use crate::errors::ServiceError;

/// One-based page request. The limit is clamped by the caller; the page is
/// rejected when its row offset would not fit a signed 64-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Result<Self, ServiceError> {
        let page = page.max(1);
        let limit = limit.max(1);
        match page.checked_mul(limit) {
            Some(end) if end <= i64::MAX as u64 => Ok(Self { page, limit }),
            _ => Err(ServiceError::ValidationError(format!(
                "page {} is out of range",
                page
            ))),
        }
    }

    /// Zero-based index for sea-orm paginators
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

/// A page of results plus the total across all pages.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl From<SortOrder> for sea_orm::Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => sea_orm::Order::Asc,
            SortOrder::Desc => sea_orm::Order::Desc,
        }
    }
}

/// Commits on success; otherwise rolls back and hands back the original error.
pub(crate) async fn commit_or_rollback<T>(
    txn: DatabaseTransaction,
    result: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match result {
        Ok(value) => {
            txn.commit().await.map_err(ServiceError::db_error)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Opens a transaction on the pool.
pub(crate) async fn begin(db: &crate::db::DbPool) -> Result<DatabaseTransaction, ServiceError> {
    db.begin().await.map_err(ServiceError::db_error)
}

pub(crate) fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

pub(crate) fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        let mut err = ValidationError::new("positive");
        err.message = Some("must be greater than zero".into());
        return Err(err);
    }
    Ok(())
}

pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}
