use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::bom_sync::{BomSyncService, SyncReport};
use super::{validate_non_negative, validate_not_blank, Page, PageRequest, SortOrder};
use crate::{
    auth::{policy, AuthUser},
    db::DbPool,
    entities::{
        part::{self, PartStatus, StockStatus},
        part_asset_link::{self, Criticality},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Asset that consumes a part, as reported in `linkedAssets`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAsset {
    pub asset_id: Uuid,
    pub asset_name: String,
    pub asset_department: String,
    pub quantity_in_asset: Decimal,
    pub criticality: Criticality,
    pub last_used: Option<DateTime<Utc>>,
}

impl From<part_asset_link::Model> for LinkedAsset {
    fn from(link: part_asset_link::Model) -> Self {
        Self {
            asset_id: link.asset_id,
            asset_name: link.asset_name,
            asset_department: link.asset_department,
            quantity_in_asset: link.quantity_in_asset,
            criticality: link.criticality,
            last_used: link.last_used,
        }
    }
}

/// Part as returned by the API, with its derived stock status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartView {
    pub id: Uuid,
    pub part_number: String,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub material_code: Option<String>,
    pub supplier: Option<String>,
    pub unit_of_measure: String,
    pub location: Option<String>,
    pub quantity: Decimal,
    pub min_stock_level: Decimal,
    pub max_stock_level: Option<Decimal>,
    pub unit_price: Decimal,
    pub total_value: Decimal,
    pub department: String,
    pub linked_assets: Vec<LinkedAsset>,
    pub total_consumed: Decimal,
    pub last_used_date: Option<DateTime<Utc>>,
    pub status: PartStatus,
    pub stock_status: StockStatus,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PartView {
    pub fn new(model: part::Model, links: Vec<part_asset_link::Model>) -> Self {
        let stock_status = model.stock_status();
        Self {
            id: model.id,
            part_number: model.part_number,
            sku: model.sku,
            name: model.name,
            description: model.description,
            category: model.category,
            material_code: model.material_code,
            supplier: model.supplier,
            unit_of_measure: model.unit_of_measure,
            location: model.location,
            quantity: model.quantity,
            min_stock_level: model.min_stock_level,
            max_stock_level: model.max_stock_level,
            unit_price: model.unit_price,
            total_value: model.total_value,
            department: model.department,
            linked_assets: links.into_iter().map(LinkedAsset::from).collect(),
            total_consumed: model.total_consumed,
            last_used_date: model.last_used_date,
            status: model.status,
            stock_status,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StockFilter {
    /// At or below minimum but not empty
    Low,
    /// Nothing on hand
    Out,
    /// Above minimum
    Normal,
}

/// Whitelisted sort keys for part listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum PartSortField {
    PartNumber,
    Name,
    Quantity,
    UnitPrice,
    TotalValue,
    CreatedAt,
    UpdatedAt,
}

impl PartSortField {
    fn column(self) -> part::Column {
        match self {
            PartSortField::PartNumber => part::Column::PartNumber,
            PartSortField::Name => part::Column::Name,
            PartSortField::Quantity => part::Column::Quantity,
            PartSortField::UnitPrice => part::Column::UnitPrice,
            PartSortField::TotalValue => part::Column::TotalValue,
            PartSortField::CreatedAt => part::Column::CreatedAt,
            PartSortField::UpdatedAt => part::Column::UpdatedAt,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PartFilters {
    pub search: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub stock_filter: Option<StockFilter>,
    pub supplier: Option<String>,
    pub status: Option<PartStatus>,
    pub sort_by: Option<PartSortField>,
    pub sort_order: Option<SortOrder>,
}

impl PartFilters {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(part::Column::PartNumber.contains(search))
                    .add(part::Column::Name.contains(search))
                    .add(part::Column::Sku.contains(search))
                    .add(part::Column::Description.contains(search)),
            );
        }
        if let Some(department) = &self.department {
            condition = condition.add(part::Column::Department.eq(department.as_str()));
        }
        if let Some(category) = &self.category {
            condition = condition.add(part::Column::Category.eq(category.as_str()));
        }
        if let Some(supplier) = &self.supplier {
            condition = condition.add(part::Column::Supplier.eq(supplier.as_str()));
        }
        if let Some(status) = self.status {
            condition = condition.add(part::Column::Status.eq(status));
        }

        let quantity = || Expr::col((part::Entity, part::Column::Quantity));
        let minimum = || Expr::col((part::Entity, part::Column::MinStockLevel));
        match self.stock_filter {
            Some(StockFilter::Out) => {
                condition = condition.add(part::Column::Quantity.lte(Decimal::ZERO));
            }
            Some(StockFilter::Low) => {
                condition = condition
                    .add(part::Column::Quantity.gt(Decimal::ZERO))
                    .add(quantity().lte(minimum()));
            }
            Some(StockFilter::Normal) => {
                condition = condition
                    .add(part::Column::Quantity.gt(Decimal::ZERO))
                    .add(quantity().gt(minimum()));
            }
            None => {}
        }

        condition
    }
}

/// Aggregate stock figures over the caller's visible parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartStats {
    pub total_parts: u64,
    pub low_stock: u64,
    pub out_of_stock: u64,
    /// At or below minimum and used by a high or critical asset
    pub critical: u64,
    pub active: u64,
    pub total_value: Decimal,
    pub total_consumed: Decimal,
}

impl PartStats {
    pub fn summarize(parts: &[part::Model], critical_part_ids: &HashSet<Uuid>) -> Self {
        parts.iter().fold(PartStats::default(), |mut stats, part| {
            stats.total_parts += 1;
            match part.stock_status() {
                StockStatus::OutOfStock => stats.out_of_stock += 1,
                StockStatus::LowStock => stats.low_stock += 1,
                StockStatus::InStock => {}
            }
            if part.is_below_minimum() && critical_part_ids.contains(&part.id) {
                stats.critical += 1;
            }
            if part.status == PartStatus::Active {
                stats.active += 1;
            }
            stats.total_value += part.total_value;
            stats.total_consumed += part.total_consumed;
            stats
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartInput {
    #[validate(length(min = 1, max = 64), custom = "validate_not_blank")]
    pub part_number: String,
    /// Defaults to `SKU-<partNumber>`
    #[validate(length(min = 1, max = 96))]
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    pub material_code: Option<String>,
    pub supplier: Option<String>,
    #[validate(length(min = 1, max = 16))]
    pub unit_of_measure: Option<String>,
    pub location: Option<String>,
    #[validate(custom = "validate_non_negative")]
    pub quantity: Option<Decimal>,
    #[validate(custom = "validate_non_negative")]
    pub min_stock_level: Option<Decimal>,
    #[validate(custom = "validate_non_negative")]
    pub max_stock_level: Option<Decimal>,
    #[validate(custom = "validate_non_negative")]
    pub unit_price: Option<Decimal>,
    /// Defaults to the caller's department
    pub department: Option<String>,
    pub status: Option<PartStatus>,
}

/// Descriptive edits. Quantity is owned by the stock ledger and cannot be set here.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePartInput {
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub category: Option<String>,
    pub material_code: Option<String>,
    pub supplier: Option<String>,
    #[validate(length(min = 1, max = 16))]
    pub unit_of_measure: Option<String>,
    pub location: Option<String>,
    #[validate(custom = "validate_non_negative")]
    pub min_stock_level: Option<Decimal>,
    #[validate(custom = "validate_non_negative")]
    pub max_stock_level: Option<Decimal>,
    #[validate(custom = "validate_non_negative")]
    pub unit_price: Option<Decimal>,
    pub status: Option<PartStatus>,
    /// Expected current version; the update is rejected if the part moved on.
    pub version: Option<i32>,
}

fn check_stock_levels(min: Decimal, max: Option<Decimal>) -> Result<(), ServiceError> {
    match max {
        Some(max) if max < min => Err(ServiceError::ValidationError(format!(
            "maxStockLevel ({}) must not be below minStockLevel ({})",
            max, min
        ))),
        _ => Ok(()),
    }
}

/// Service for the parts catalog
#[derive(Clone)]
pub struct PartService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    bom_sync: Arc<BomSyncService>,
}

impl PartService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        bom_sync: Arc<BomSyncService>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            bom_sync,
        }
    }

    /// Lists the parts visible to `caller`, filtered, sorted and paginated.
    #[instrument(skip(self, caller), fields(user = %caller.id))]
    pub async fn list_parts(
        &self,
        filters: PartFilters,
        page: PageRequest,
        caller: &AuthUser,
    ) -> Result<Page<PartView>, ServiceError> {
        let db = &*self.db_pool;

        let sort_column = filters
            .sort_by
            .unwrap_or(PartSortField::CreatedAt)
            .column();
        let sort_order = filters.sort_order.unwrap_or_default();

        let paginator = part::Entity::find()
            .filter(policy::part_scope_condition(caller))
            .filter(filters.condition())
            .order_by(sort_column, sort_order.into())
            .order_by_asc(part::Column::PartNumber)
            .paginate(db, page.limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let models = paginator
            .fetch_page(page.index())
            .await
            .map_err(ServiceError::db_error)?;

        let mut links = self.links_for(&models).await?;
        let items = models
            .into_iter()
            .map(|model| {
                let part_links = links.remove(&model.id).unwrap_or_default();
                PartView::new(model, part_links)
            })
            .collect();

        Ok(Page {
            items,
            page: page.page,
            limit: page.limit,
            total,
        })
    }

    /// Fetches one part, enforcing department visibility.
    #[instrument(skip(self, caller), fields(user = %caller.id))]
    pub async fn get_part(&self, id: Uuid, caller: &AuthUser) -> Result<PartView, ServiceError> {
        let db = &*self.db_pool;
        let model = part::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", id)))?;

        let links = part_asset_link::Entity::find()
            .filter(part_asset_link::Column::PartId.eq(id))
            .order_by_asc(part_asset_link::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        policy::ensure(policy::can_view_part(caller, &model, &links), "view this part")?;

        Ok(PartView::new(model, links))
    }

    /// Aggregates stock figures over every part the caller can see.
    #[instrument(skip(self, caller), fields(user = %caller.id))]
    pub async fn get_stats(&self, caller: &AuthUser) -> Result<PartStats, ServiceError> {
        let db = &*self.db_pool;

        let parts = part::Entity::find()
            .filter(policy::part_scope_condition(caller))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let critical_part_ids: HashSet<Uuid> = part_asset_link::Entity::find()
            .filter(
                part_asset_link::Column::Criticality
                    .is_in([Criticality::High, Criticality::Critical]),
            )
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|link| link.part_id)
            .collect();

        Ok(PartStats::summarize(&parts, &critical_part_ids))
    }

    /// Adds a part to the catalog.
    #[instrument(skip(self, input, caller), fields(user = %caller.id, part_number = %input.part_number))]
    pub async fn create_part(
        &self,
        input: CreatePartInput,
        caller: &AuthUser,
    ) -> Result<PartView, ServiceError> {
        input.validate()?;

        let department = input
            .department
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| caller.department.clone());
        policy::ensure(
            policy::can_create_part_in(caller, &department),
            "create parts in this department",
        )?;

        let min_stock_level = input.min_stock_level.unwrap_or(Decimal::ZERO);
        check_stock_levels(min_stock_level, input.max_stock_level)?;

        let part_number = input.part_number.trim().to_string();
        let sku = input
            .sku
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("SKU-{}", part_number));

        let db = &*self.db_pool;
        let duplicate = part::Entity::find()
            .filter(
                Condition::any()
                    .add(part::Column::PartNumber.eq(part_number.as_str()))
                    .add(part::Column::Sku.eq(sku.as_str())),
            )
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if let Some(existing) = duplicate {
            let field = if existing.part_number == part_number {
                format!("part number {}", part_number)
            } else {
                format!("SKU {}", sku)
            };
            return Err(ServiceError::Conflict(format!(
                "A part with {} already exists",
                field
            )));
        }

        let active = part::ActiveModel {
            id: Set(Uuid::new_v4()),
            part_number: Set(part_number.clone()),
            sku: Set(sku),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            category: Set(input.category),
            material_code: Set(input.material_code),
            supplier: Set(input.supplier),
            unit_of_measure: Set(input.unit_of_measure.unwrap_or_else(|| "pcs".to_string())),
            location: Set(input.location),
            quantity: Set(input.quantity.unwrap_or(Decimal::ZERO)),
            min_stock_level: Set(min_stock_level),
            max_stock_level: Set(input.max_stock_level),
            unit_price: Set(input.unit_price.unwrap_or(Decimal::ZERO)),
            total_value: Set(Decimal::ZERO),
            department: Set(department),
            total_consumed: Set(Decimal::ZERO),
            last_used_date: Set(None),
            status: Set(input.status.unwrap_or(PartStatus::Active)),
            version: Set(1),
            ..Default::default()
        };

        let model = active.insert(db).await.map_err(ServiceError::db_error)?;

        info!(part_id = %model.id, "part created");
        self.event_sender
            .send_or_log(Event::PartCreated {
                part_id: model.id,
                part_number,
            })
            .await;

        Ok(PartView::new(model, Vec::new()))
    }

    /// Edits descriptive fields, thresholds and price under a version guard.
    #[instrument(skip(self, input, caller), fields(user = %caller.id))]
    pub async fn update_part(
        &self,
        id: Uuid,
        input: UpdatePartInput,
        caller: &AuthUser,
    ) -> Result<PartView, ServiceError> {
        input.validate()?;

        let db = &*self.db_pool;
        let current = part::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", id)))?;

        policy::ensure(policy::can_update_part(caller, &current), "update this part")?;

        if let Some(expected) = input.version {
            if expected != current.version {
                return Err(ServiceError::ConcurrentModification(id));
            }
        }

        let min_stock_level = input.min_stock_level.unwrap_or(current.min_stock_level);
        let max_stock_level = match input.max_stock_level {
            Some(max) => Some(max),
            None => current.max_stock_level,
        };
        check_stock_levels(min_stock_level, max_stock_level)?;

        let unit_price = input.unit_price.unwrap_or(current.unit_price);
        let mut active: part::ActiveModel = current.clone().into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(category) = input.category {
            active.category = Set(category);
        }
        if let Some(material_code) = input.material_code {
            active.material_code = Set(Some(material_code));
        }
        if let Some(supplier) = input.supplier {
            active.supplier = Set(Some(supplier));
        }
        if let Some(unit_of_measure) = input.unit_of_measure {
            active.unit_of_measure = Set(unit_of_measure);
        }
        if let Some(location) = input.location {
            active.location = Set(Some(location));
        }
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        active.min_stock_level = Set(min_stock_level);
        active.max_stock_level = Set(max_stock_level);
        active.unit_price = Set(unit_price);
        active.total_value = Set(current.quantity * unit_price);
        active.version = Set(current.version + 1);
        active.updated_at = Set(Utc::now());

        let result = part::Entity::update_many()
            .set(active)
            .filter(part::Column::Id.eq(id))
            .filter(part::Column::Version.eq(current.version))
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(id));
        }

        info!(part_id = %id, version = current.version + 1, "part updated");
        self.event_sender.send_or_log(Event::PartUpdated(id)).await;

        self.get_part(id, caller).await
    }

    /// Reconciles the catalog against every asset's bill of materials.
    #[instrument(skip(self, caller), fields(user = %caller.id))]
    pub async fn sync_from_asset_boms(&self, caller: &AuthUser) -> Result<SyncReport, ServiceError> {
        policy::ensure(
            policy::can_sync_from_assets(caller),
            "synchronize parts from asset BOMs",
        )?;
        self.bom_sync.run().await
    }

    async fn links_for(
        &self,
        parts: &[part::Model],
    ) -> Result<HashMap<Uuid, Vec<part_asset_link::Model>>, ServiceError> {
        if parts.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<Uuid> = parts.iter().map(|p| p.id).collect();
        let links = part_asset_link::Entity::find()
            .filter(part_asset_link::Column::PartId.is_in(ids))
            .order_by_asc(part_asset_link::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        let mut grouped: HashMap<Uuid, Vec<part_asset_link::Model>> = HashMap::new();
        for link in links {
            grouped.entry(link.part_id).or_default().push(link);
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn part(quantity: Decimal, min: Decimal, status: PartStatus) -> part::Model {
        let now = Utc::now();
        part::Model {
            id: Uuid::new_v4(),
            part_number: format!("P-{}", Uuid::new_v4()),
            sku: "SKU".into(),
            name: "Filter".into(),
            description: None,
            category: "filters".into(),
            material_code: None,
            supplier: None,
            unit_of_measure: "pcs".into(),
            location: None,
            quantity,
            min_stock_level: min,
            max_stock_level: None,
            unit_price: dec!(2),
            total_value: quantity * dec!(2),
            department: "Maintenance".into(),
            total_consumed: dec!(1),
            last_used_date: None,
            status,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stats_fold_counts_each_bucket() {
        let empty = part(dec!(0), dec!(2), PartStatus::Active);
        let low = part(dec!(2), dec!(5), PartStatus::Active);
        let fine = part(dec!(10), dec!(5), PartStatus::Inactive);
        let critical: HashSet<Uuid> = [low.id, fine.id].into_iter().collect();

        let stats = PartStats::summarize(&[empty, low, fine], &critical);
        assert_eq!(stats.total_parts, 3);
        assert_eq!(stats.out_of_stock, 1);
        assert_eq!(stats.low_stock, 1);
        assert_eq!(stats.critical, 1);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.total_value, dec!(24));
        assert_eq!(stats.total_consumed, dec!(3));
    }

    #[test]
    fn max_below_min_is_rejected() {
        assert!(check_stock_levels(dec!(5), Some(dec!(4))).is_err());
        assert!(check_stock_levels(dec!(5), Some(dec!(5))).is_ok());
        assert!(check_stock_levels(dec!(5), None).is_ok());
    }

    #[test]
    fn sort_field_parses_camel_case() {
        let field: PartSortField = serde_json::from_str("\"unitPrice\"").unwrap();
        assert_eq!(field, PartSortField::UnitPrice);
        assert!(serde_json::from_str::<PartSortField>("\"sku\"").is_err());
    }
}
