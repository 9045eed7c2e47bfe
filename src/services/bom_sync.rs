use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{begin, commit_or_rollback};
use crate::{
    db::DbPool,
    entities::{
        asset::{self, BomEntry},
        part::{self, PartStatus},
        part_asset_link::{self, Criticality},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

const IMPORTED_CATEGORY: &str = "general";
const IMPORTED_UNIT: &str = "pcs";

/// Outcome of one BOM reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Non-deleted assets that carried at least one BOM line
    pub assets_processed: u64,
    pub parts_created: u64,
    /// Existing parts that gained a link to an asset
    pub parts_linked: u64,
    /// Lines without a part number or name
    pub lines_skipped: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineOutcome {
    Created(Uuid),
    Linked(Uuid),
    AlreadyLinked,
}

/// One-way reconciliation from asset BOMs into the parts catalog.
///
/// Links are only ever added. A part's quantity is never touched here.
#[derive(Clone)]
pub struct BomSyncService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl BomSyncService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Walks every live asset and upserts parts for its BOM lines.
    ///
    /// A failing line is logged and counted; the batch carries on.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<SyncReport, ServiceError> {
        let db = &*self.db_pool;
        let assets = asset::Entity::find()
            .filter(asset::Column::IsDeleted.eq(false))
            .order_by_asc(asset::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut report = SyncReport::default();

        for asset in assets {
            let lines = asset.bom_lines();
            if lines.is_empty() {
                continue;
            }
            report.assets_processed += 1;

            for (index, raw) in lines.into_iter().enumerate() {
                let entry: BomEntry = match serde_json::from_value(raw) {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(asset_id = %asset.id, line = index, error = %e, "unreadable BOM line");
                        report.failures += 1;
                        continue;
                    }
                };
                if !entry.is_syncable() {
                    report.lines_skipped += 1;
                    continue;
                }

                match self.sync_line(&asset, &entry).await {
                    Ok(LineOutcome::Created(part_id)) => {
                        report.parts_created += 1;
                        self.event_sender
                            .send_or_log(Event::PartCreated {
                                part_id,
                                part_number: entry.part_number.clone().unwrap_or_default(),
                            })
                            .await;
                    }
                    Ok(LineOutcome::Linked(part_id)) => {
                        report.parts_linked += 1;
                        self.event_sender
                            .send_or_log(Event::PartLinkedToAsset {
                                part_id,
                                asset_id: asset.id,
                            })
                            .await;
                    }
                    Ok(LineOutcome::AlreadyLinked) => {}
                    Err(e) => {
                        warn!(
                            asset_id = %asset.id,
                            line = index,
                            part_number = ?entry.part_number,
                            error = %e,
                            "BOM line failed to sync"
                        );
                        report.failures += 1;
                    }
                }
            }
        }

        counter!("cmms.bom_sync.parts_created", report.parts_created);
        counter!("cmms.bom_sync.parts_linked", report.parts_linked);
        counter!("cmms.bom_sync.failures", report.failures);
        info!(
            assets_processed = report.assets_processed,
            parts_created = report.parts_created,
            parts_linked = report.parts_linked,
            lines_skipped = report.lines_skipped,
            failures = report.failures,
            "asset BOM sync finished"
        );

        self.event_sender
            .send_or_log(Event::PartsSyncCompleted {
                assets_processed: report.assets_processed,
                parts_created: report.parts_created,
                parts_linked: report.parts_linked,
                failures: report.failures,
            })
            .await;

        Ok(report)
    }

    async fn sync_line(
        &self,
        asset: &asset::Model,
        entry: &BomEntry,
    ) -> Result<LineOutcome, ServiceError> {
        let txn = begin(&self.db_pool).await?;
        let result = Self::apply_line(&txn, asset, entry).await;
        commit_or_rollback(txn, result).await
    }

    async fn apply_line<C>(
        conn: &C,
        asset: &asset::Model,
        entry: &BomEntry,
    ) -> Result<LineOutcome, ServiceError>
    where
        C: ConnectionTrait,
    {
        let part_number = entry.part_number.as_deref().unwrap_or_default().trim();
        let part_name = entry.part_name.as_deref().unwrap_or_default().trim();

        let existing = part::Entity::find()
            .filter(part::Column::PartNumber.eq(part_number))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;

        match existing {
            Some(part) => {
                let linked = part_asset_link::Entity::find()
                    .filter(part_asset_link::Column::PartId.eq(part.id))
                    .filter(part_asset_link::Column::AssetId.eq(asset.id))
                    .one(conn)
                    .await
                    .map_err(ServiceError::db_error)?;
                if linked.is_some() {
                    return Ok(LineOutcome::AlreadyLinked);
                }
                Self::insert_link(conn, part.id, asset, entry).await?;
                Ok(LineOutcome::Linked(part.id))
            }
            None => {
                let part = part::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    part_number: Set(part_number.to_string()),
                    sku: Set(format!("SKU-{}", part_number)),
                    name: Set(part_name.to_string()),
                    description: Set(None),
                    category: Set(IMPORTED_CATEGORY.to_string()),
                    material_code: Set(Some(format!("MAT-{}", part_number))),
                    supplier: Set(entry.supplier.clone()),
                    unit_of_measure: Set(IMPORTED_UNIT.to_string()),
                    location: Set(None),
                    quantity: Set(Decimal::ZERO),
                    min_stock_level: Set(Decimal::ZERO),
                    max_stock_level: Set(None),
                    unit_price: Set(entry.unit_cost.unwrap_or(Decimal::ZERO)),
                    total_value: Set(Decimal::ZERO),
                    department: Set(asset.department.clone()),
                    total_consumed: Set(Decimal::ZERO),
                    last_used_date: Set(None),
                    status: Set(PartStatus::Active),
                    version: Set(1),
                    ..Default::default()
                }
                .insert(conn)
                .await
                .map_err(ServiceError::db_error)?;

                Self::insert_link(conn, part.id, asset, entry).await?;
                Ok(LineOutcome::Created(part.id))
            }
        }
    }

    async fn insert_link<C>(
        conn: &C,
        part_id: Uuid,
        asset: &asset::Model,
        entry: &BomEntry,
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        part_asset_link::ActiveModel {
            id: Set(Uuid::new_v4()),
            part_id: Set(part_id),
            asset_id: Set(asset.id),
            asset_name: Set(asset.name.clone()),
            asset_department: Set(asset.department.clone()),
            quantity_in_asset: Set(entry.quantity.unwrap_or(Decimal::ONE)),
            criticality: Set(Criticality::Medium),
            last_used: Set(entry.last_replaced),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;
        Ok(())
    }
}
