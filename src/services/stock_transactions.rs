use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, Iterable,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::stock_movement::apply_movement;
use super::{
    begin, commit_or_rollback, sequence, validate_non_negative, validate_not_blank,
    validate_positive, Page, PageRequest,
};
use crate::{
    auth::{policy, AuthUser},
    db::DbPool,
    entities::{
        part,
        stock_transaction::{self, TransactionPriority, TransactionStatus, TransactionType},
        stock_transaction_item,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItemInput {
    pub part_id: Uuid,
    #[validate(length(min = 1, max = 64), custom = "validate_not_blank")]
    pub part_number: String,
    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub part_name: String,
    #[validate(custom = "validate_positive")]
    pub quantity: Decimal,
    /// Defaults to the part's current unit price
    #[validate(custom = "validate_non_negative")]
    pub unit_cost: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionInput {
    pub transaction_type: TransactionType,
    pub transaction_date: DateTime<Utc>,
    #[validate(length(min = 1, max = 2000), custom = "validate_not_blank")]
    pub description: String,
    #[validate(length(max = 128))]
    pub reference_number: Option<String>,
    pub priority: Option<TransactionPriority>,
    /// Defaults to the caller's department
    pub department: Option<String>,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "at least one item is required"))]
    #[validate]
    pub items: Vec<TransactionItemInput>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusInput {
    pub status: TransactionStatus,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItemView {
    pub id: Uuid,
    pub part_id: Uuid,
    pub part_number: String,
    pub part_name: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub notes: Option<String>,
}

impl From<stock_transaction_item::Model> for TransactionItemView {
    fn from(item: stock_transaction_item::Model) -> Self {
        Self {
            id: item.id,
            part_id: item.part_id,
            part_number: item.part_number,
            part_name: item.part_name,
            quantity: item.quantity,
            unit_cost: item.unit_cost,
            total_cost: item.total_cost,
            notes: item.notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: Uuid,
    pub transaction_number: String,
    pub transaction_type: TransactionType,
    pub transaction_date: DateTime<Utc>,
    pub description: String,
    pub reference_number: Option<String>,
    pub priority: TransactionPriority,
    pub department: String,
    pub items: Vec<TransactionItemView>,
    pub status: TransactionStatus,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_by_name: String,
    pub approved_by: Option<String>,
    pub approved_by_name: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub completed_by_name: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionView {
    pub fn new(
        model: stock_transaction::Model,
        items: Vec<stock_transaction_item::Model>,
    ) -> Self {
        Self {
            id: model.id,
            transaction_number: model.transaction_number,
            transaction_type: model.transaction_type,
            transaction_date: model.transaction_date,
            description: model.description,
            reference_number: model.reference_number,
            priority: model.priority,
            department: model.department,
            items: items.into_iter().map(TransactionItemView::from).collect(),
            status: model.status,
            total_amount: model.total_amount,
            notes: model.notes,
            created_by: model.created_by,
            created_by_name: model.created_by_name,
            approved_by: model.approved_by,
            approved_by_name: model.approved_by_name,
            approved_at: model.approved_at,
            completed_by: model.completed_by,
            completed_by_name: model.completed_by_name,
            completed_at: model.completed_at,
            cancelled_at: model.cancelled_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilters {
    pub department: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub priority: Option<TransactionPriority>,
    /// Inclusive
    pub date_from: Option<NaiveDate>,
    /// Inclusive
    pub date_to: Option<NaiveDate>,
    pub part_id: Option<Uuid>,
    pub search: Option<String>,
}

impl TransactionFilters {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();

        if let Some(department) = &self.department {
            condition = condition.add(stock_transaction::Column::Department.eq(department.as_str()));
        }
        if let Some(kind) = self.transaction_type {
            condition = condition.add(stock_transaction::Column::TransactionType.eq(kind));
        }
        if let Some(status) = self.status {
            condition = condition.add(stock_transaction::Column::Status.eq(status));
        }
        if let Some(priority) = self.priority {
            condition = condition.add(stock_transaction::Column::Priority.eq(priority));
        }
        if let Some(from) = self.date_from {
            condition =
                condition.add(stock_transaction::Column::TransactionDate.gte(start_of_day(from)));
        }
        if let Some(to) = self.date_to.and_then(|d| d.succ_opt()) {
            condition =
                condition.add(stock_transaction::Column::TransactionDate.lt(start_of_day(to)));
        }
        if let Some(part_id) = self.part_id {
            condition = condition.add(
                stock_transaction::Column::Id.in_subquery(
                    Query::select()
                        .column(stock_transaction_item::Column::TransactionId)
                        .from(stock_transaction_item::Entity)
                        .and_where(stock_transaction_item::Column::PartId.eq(part_id))
                        .to_owned(),
                ),
            );
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(stock_transaction::Column::TransactionNumber.contains(search))
                    .add(stock_transaction::Column::Description.contains(search))
                    .add(stock_transaction::Column::ReferenceNumber.contains(search)),
            );
        }

        condition
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap_or(now.date_naive());
    start_of_day(first)
}

/// Ledger figures over the caller's visible transactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_type: BTreeMap<String, u64>,
    /// Sum of `totalAmount` over completed transactions
    pub completed_amount: Decimal,
    /// Created since the first of the current month (UTC)
    pub this_month: u64,
}

impl TransactionStats {
    pub fn summarize(transactions: &[stock_transaction::Model], now: DateTime<Utc>) -> Self {
        let mut stats = TransactionStats {
            by_status: TransactionStatus::iter().map(|s| (s.to_string(), 0)).collect(),
            by_type: TransactionType::iter().map(|t| (t.to_string(), 0)).collect(),
            ..Default::default()
        };
        let month_start = start_of_month(now);

        for transaction in transactions {
            stats.total += 1;
            *stats
                .by_status
                .entry(transaction.status.to_string())
                .or_default() += 1;
            *stats
                .by_type
                .entry(transaction.transaction_type.to_string())
                .or_default() += 1;
            if transaction.status == TransactionStatus::Completed {
                stats.completed_amount += transaction.total_amount;
            }
            if transaction.created_at >= month_start {
                stats.this_month += 1;
            }
        }
        stats
    }
}

/// A quantity change made while completing a transaction.
#[derive(Debug, Clone, PartialEq)]
struct QuantityChange {
    part_id: Uuid,
    old_quantity: Decimal,
    new_quantity: Decimal,
}

/// Service for the stock movement ledger
#[derive(Clone)]
pub struct StockTransactionService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl StockTransactionService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Records a new draft movement. No part quantity changes until completion.
    #[instrument(skip(self, input, caller), fields(user = %caller.id, kind = %input.transaction_type))]
    pub async fn create_transaction(
        &self,
        input: CreateTransactionInput,
        caller: &AuthUser,
    ) -> Result<TransactionView, ServiceError> {
        input.validate()?;

        let department = input
            .department
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| caller.department.clone());
        policy::ensure(
            policy::can_view_department(caller, &department),
            "record stock movements for this department",
        )?;

        let txn = begin(&self.db_pool).await?;
        let result = Self::insert_draft(&txn, input, department, caller).await;
        let (model, items) = commit_or_rollback(txn, result).await?;

        info!(
            transaction_id = %model.id,
            transaction_number = %model.transaction_number,
            "stock transaction created"
        );
        counter!("cmms.stock_transactions.created", 1, "type" => model.transaction_type.to_string());
        self.event_sender
            .send_or_log(Event::StockTransactionCreated {
                transaction_id: model.id,
                transaction_number: model.transaction_number.clone(),
            })
            .await;

        Ok(TransactionView::new(model, items))
    }

    async fn insert_draft<C>(
        conn: &C,
        input: CreateTransactionInput,
        department: String,
        caller: &AuthUser,
    ) -> Result<(stock_transaction::Model, Vec<stock_transaction_item::Model>), ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut parts: HashMap<Uuid, part::Model> = HashMap::new();
        let mut requested: HashMap<Uuid, Decimal> = HashMap::new();
        for item in &input.items {
            if !parts.contains_key(&item.part_id) {
                let part = part::Entity::find_by_id(item.part_id)
                    .one(conn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Part {} ({}) not found",
                            item.part_number, item.part_id
                        ))
                    })?;
                parts.insert(item.part_id, part);
            }
            *requested.entry(item.part_id).or_default() += item.quantity;
        }

        if input.transaction_type.requires_stock_check() {
            for item in &input.items {
                let (Some(part), Some(wanted)) =
                    (parts.get(&item.part_id), requested.get(&item.part_id))
                else {
                    continue;
                };
                if part.quantity < *wanted {
                    return Err(ServiceError::InsufficientStock(format!(
                        "Part {}: available {}, requested {}",
                        part.part_number, part.quantity, wanted
                    )));
                }
            }
        }

        let id = Uuid::new_v4();
        let transaction_number = sequence::next_transaction_number(conn, Utc::now()).await?;

        let mut total_amount = Decimal::ZERO;
        let mut item_models = Vec::with_capacity(input.items.len());
        for (index, item) in input.items.into_iter().enumerate() {
            let unit_cost = item
                .unit_cost
                .or_else(|| parts.get(&item.part_id).map(|p| p.unit_price))
                .unwrap_or(Decimal::ZERO);
            let total_cost = item.quantity * unit_cost;
            total_amount += total_cost;
            item_models.push(stock_transaction_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                transaction_id: Set(id),
                line_no: Set(index as i32 + 1),
                part_id: Set(item.part_id),
                part_number: Set(item.part_number.trim().to_string()),
                part_name: Set(item.part_name.trim().to_string()),
                quantity: Set(item.quantity),
                unit_cost: Set(unit_cost),
                total_cost: Set(total_cost),
                notes: Set(item.notes),
            });
        }

        let header = stock_transaction::ActiveModel {
            id: Set(id),
            transaction_number: Set(transaction_number),
            transaction_type: Set(input.transaction_type),
            transaction_date: Set(input.transaction_date),
            description: Set(input.description.trim().to_string()),
            reference_number: Set(input.reference_number),
            priority: Set(input.priority.unwrap_or_default()),
            department: Set(department),
            status: Set(TransactionStatus::Draft),
            total_amount: Set(total_amount),
            notes: Set(input.notes),
            created_by: Set(caller.id.clone()),
            created_by_name: Set(caller.name.clone()),
            approved_by: Set(None),
            approved_by_name: Set(None),
            approved_at: Set(None),
            completed_by: Set(None),
            completed_by_name: Set(None),
            completed_at: Set(None),
            cancelled_at: Set(None),
            version: Set(1),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;

        let mut items = Vec::with_capacity(item_models.len());
        for item in item_models {
            items.push(item.insert(conn).await.map_err(ServiceError::db_error)?);
        }

        Ok((header, items))
    }

    /// Moves a transaction along its lifecycle.
    ///
    /// Completing applies every item to its part inside one database
    /// transaction; any failure leaves all parts untouched.
    #[instrument(skip(self, input, caller), fields(user = %caller.id, to = %input.status))]
    pub async fn update_status(
        &self,
        id: Uuid,
        input: UpdateStatusInput,
        caller: &AuthUser,
    ) -> Result<TransactionView, ServiceError> {
        input.validate()?;

        let current = self.find(id).await?;
        policy::ensure(
            policy::can_change_status(caller, &current),
            "change the status of this transaction",
        )?;

        let from = current.status;
        let to = input.status;
        if !from.can_transition_to(to) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot move transaction {} from {} to {}",
                current.transaction_number, from, to
            )));
        }

        let txn = begin(&self.db_pool).await?;
        let result = Self::transition(&txn, current, input, caller).await;
        let (model, items, changes) = commit_or_rollback(txn, result).await?;

        info!(transaction_id = %id, %from, %to, "stock transaction status changed");
        counter!("cmms.stock_transactions.transitions", 1, "to" => to.to_string());
        self.event_sender
            .send_or_log(Event::StockTransactionStatusChanged {
                transaction_id: id,
                old_status: from,
                new_status: to,
            })
            .await;
        for change in changes {
            self.event_sender
                .send_or_log(Event::PartQuantityChanged {
                    part_id: change.part_id,
                    old_quantity: change.old_quantity,
                    new_quantity: change.new_quantity,
                    transaction_id: id,
                })
                .await;
        }

        Ok(TransactionView::new(model, items))
    }

    async fn transition<C>(
        conn: &C,
        current: stock_transaction::Model,
        input: UpdateStatusInput,
        caller: &AuthUser,
    ) -> Result<
        (
            stock_transaction::Model,
            Vec<stock_transaction_item::Model>,
            Vec<QuantityChange>,
        ),
        ServiceError,
    >
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        let items = Self::items_of(conn, current.id).await?;

        let changes = if input.status == TransactionStatus::Completed {
            Self::apply_items(conn, current.transaction_type, &items, now).await?
        } else {
            Vec::new()
        };

        let mut active: stock_transaction::ActiveModel = current.clone().into();
        active.status = Set(input.status);
        active.version = Set(current.version + 1);
        active.updated_at = Set(now);
        if let Some(note) = input.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            active.notes = Set(Some(append_note(
                current.notes.as_deref(),
                input.status,
                note,
            )));
        }
        match input.status {
            TransactionStatus::Approved => {
                active.approved_by = Set(Some(caller.id.clone()));
                active.approved_by_name = Set(Some(caller.name.clone()));
                active.approved_at = Set(Some(now));
            }
            TransactionStatus::Completed => {
                active.completed_by = Set(Some(caller.id.clone()));
                active.completed_by_name = Set(Some(caller.name.clone()));
                active.completed_at = Set(Some(now));
            }
            TransactionStatus::Cancelled => {
                active.cancelled_at = Set(Some(now));
            }
            TransactionStatus::Draft | TransactionStatus::Pending => {}
        }

        // Guarded on the status we validated against so a racing change cannot double-apply.
        let result = stock_transaction::Entity::update_many()
            .set(active)
            .filter(stock_transaction::Column::Id.eq(current.id))
            .filter(stock_transaction::Column::Status.eq(current.status))
            .filter(stock_transaction::Column::Version.eq(current.version))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(current.id));
        }

        let model = stock_transaction::Entity::find_by_id(current.id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Stock transaction {} not found", current.id))
            })?;

        Ok((model, items, changes))
    }

    /// Applies each item to its part, one version-guarded write per part.
    async fn apply_items<C>(
        conn: &C,
        kind: TransactionType,
        items: &[stock_transaction_item::Model],
        now: DateTime<Utc>,
    ) -> Result<Vec<QuantityChange>, ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut order: Vec<Uuid> = Vec::new();
        let mut by_part: HashMap<Uuid, Vec<Decimal>> = HashMap::new();
        for item in items {
            by_part
                .entry(item.part_id)
                .or_insert_with(|| {
                    order.push(item.part_id);
                    Vec::new()
                })
                .push(item.quantity);
        }

        let mut changes = Vec::with_capacity(order.len());
        for part_id in order {
            let part = part::Entity::find_by_id(part_id)
                .one(conn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))?;

            let mut quantity = part.quantity;
            let mut consumed = part.total_consumed;
            let mut used = false;
            for item_quantity in by_part.get(&part_id).into_iter().flatten() {
                let outcome = apply_movement(kind, quantity, *item_quantity);
                quantity = outcome.new_quantity;
                consumed += outcome.consumed;
                used |= outcome.marks_usage();
            }

            Self::write_part(conn, &part, quantity, consumed, used, now).await?;

            changes.push(QuantityChange {
                part_id: part.id,
                old_quantity: part.quantity,
                new_quantity: quantity,
            });
        }

        Ok(changes)
    }

    /// Writes the new stock figures only if `part` is still the latest version.
    async fn write_part<C>(
        conn: &C,
        part: &part::Model,
        quantity: Decimal,
        consumed: Decimal,
        used: bool,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut update = part::Entity::update_many()
            .col_expr(part::Column::Quantity, Expr::value(quantity))
            .col_expr(part::Column::TotalValue, Expr::value(quantity * part.unit_price))
            .col_expr(part::Column::TotalConsumed, Expr::value(consumed))
            .col_expr(part::Column::Version, Expr::value(part.version + 1))
            .col_expr(part::Column::UpdatedAt, Expr::value(now));
        if used {
            update = update.col_expr(part::Column::LastUsedDate, Expr::value(Some(now)));
        }

        let result = update
            .filter(part::Column::Id.eq(part.id))
            .filter(part::Column::Version.eq(part.version))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(part.id));
        }
        Ok(())
    }

    /// Removes a draft. Anything past draft is part of the audit trail.
    #[instrument(skip(self, caller), fields(user = %caller.id))]
    pub async fn delete_transaction(&self, id: Uuid, caller: &AuthUser) -> Result<(), ServiceError> {
        let current = self.find(id).await?;
        policy::ensure(
            policy::can_delete_transaction(caller, &current),
            "delete this transaction",
        )?;
        if current.status != TransactionStatus::Draft {
            return Err(ServiceError::InvalidStatus(format!(
                "Only draft transactions can be deleted; {} is {}",
                current.transaction_number, current.status
            )));
        }

        let txn = begin(&self.db_pool).await?;
        let result = Self::delete_draft(&txn, id).await;
        commit_or_rollback(txn, result).await?;

        info!(transaction_id = %id, "stock transaction deleted");
        self.event_sender
            .send_or_log(Event::StockTransactionDeleted(id))
            .await;
        Ok(())
    }

    async fn delete_draft<C>(conn: &C, id: Uuid) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        stock_transaction_item::Entity::delete_many()
            .filter(stock_transaction_item::Column::TransactionId.eq(id))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;

        let result = stock_transaction::Entity::delete_many()
            .filter(stock_transaction::Column::Id.eq(id))
            .filter(stock_transaction::Column::Status.eq(TransactionStatus::Draft))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(id));
        }
        Ok(())
    }

    #[instrument(skip(self, caller), fields(user = %caller.id))]
    pub async fn get_transaction(
        &self,
        id: Uuid,
        caller: &AuthUser,
    ) -> Result<TransactionView, ServiceError> {
        let model = self.find(id).await?;
        policy::ensure(
            policy::can_view_department(caller, &model.department),
            "view this transaction",
        )?;
        let items = Self::items_of(&*self.db_pool, id).await?;
        Ok(TransactionView::new(model, items))
    }

    #[instrument(skip(self, caller), fields(user = %caller.id))]
    pub async fn list_transactions(
        &self,
        filters: TransactionFilters,
        page: PageRequest,
        caller: &AuthUser,
    ) -> Result<Page<TransactionView>, ServiceError> {
        let db = &*self.db_pool;
        let paginator = stock_transaction::Entity::find()
            .filter(policy::transaction_scope_condition(caller))
            .filter(filters.condition())
            .order_by_desc(stock_transaction::Column::TransactionDate)
            .order_by_desc(stock_transaction::Column::CreatedAt)
            .paginate(db, page.limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let models = paginator
            .fetch_page(page.index())
            .await
            .map_err(ServiceError::db_error)?;

        let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let mut items_by_transaction: HashMap<Uuid, Vec<stock_transaction_item::Model>> =
            HashMap::new();
        if !ids.is_empty() {
            let items = stock_transaction_item::Entity::find()
                .filter(stock_transaction_item::Column::TransactionId.is_in(ids))
                .order_by_asc(stock_transaction_item::Column::LineNo)
                .all(db)
                .await
                .map_err(ServiceError::db_error)?;
            for item in items {
                items_by_transaction
                    .entry(item.transaction_id)
                    .or_default()
                    .push(item);
            }
        }

        let items = models
            .into_iter()
            .map(|model| {
                let lines = items_by_transaction.remove(&model.id).unwrap_or_default();
                TransactionView::new(model, lines)
            })
            .collect();

        Ok(Page {
            items,
            page: page.page,
            limit: page.limit,
            total,
        })
    }

    #[instrument(skip(self, caller), fields(user = %caller.id))]
    pub async fn get_stats(&self, caller: &AuthUser) -> Result<TransactionStats, ServiceError> {
        let transactions = stock_transaction::Entity::find()
            .filter(policy::transaction_scope_condition(caller))
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(TransactionStats::summarize(&transactions, Utc::now()))
    }

    async fn find(&self, id: Uuid) -> Result<stock_transaction::Model, ServiceError> {
        stock_transaction::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Stock transaction {} not found", id)))
    }

    async fn items_of<C>(
        conn: &C,
        transaction_id: Uuid,
    ) -> Result<Vec<stock_transaction_item::Model>, ServiceError>
    where
        C: ConnectionTrait,
    {
        stock_transaction_item::Entity::find()
            .filter(stock_transaction_item::Column::TransactionId.eq(transaction_id))
            .order_by_asc(stock_transaction_item::Column::LineNo)
            .all(conn)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Transition notes are appended under a status tag.
fn append_note(existing: Option<&str>, status: TransactionStatus, note: &str) -> String {
    let entry = format!("[{}] {}", status, note.trim());
    match existing.map(str::trim).filter(|n| !n.is_empty()) {
        Some(previous) => format!("{}\n{}", previous, entry),
        None => entry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn transaction(
        status: TransactionStatus,
        kind: TransactionType,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> stock_transaction::Model {
        stock_transaction::Model {
            id: Uuid::new_v4(),
            transaction_number: "ST24050001".into(),
            transaction_type: kind,
            transaction_date: created_at,
            description: "movement".into(),
            reference_number: None,
            priority: TransactionPriority::Normal,
            department: "Maintenance".into(),
            status,
            total_amount: amount,
            notes: None,
            created_by: "u".into(),
            created_by_name: "U".into(),
            approved_by: None,
            approved_by_name: None,
            approved_at: None,
            completed_by: None,
            completed_by_name: None,
            completed_at: None,
            cancelled_at: None,
            version: 1,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn stats_count_by_status_type_and_month() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        let last_month = Utc.with_ymd_and_hms(2024, 4, 30, 23, 59, 0).unwrap();
        let rows = vec![
            transaction(TransactionStatus::Completed, TransactionType::Issue, dec!(8), now),
            transaction(TransactionStatus::Completed, TransactionType::Receipt, dec!(2), last_month),
            transaction(TransactionStatus::Draft, TransactionType::Issue, dec!(100), now),
        ];

        let stats = TransactionStats::summarize(&rows, now);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_status["completed"], 2);
        assert_eq!(stats.by_status["draft"], 1);
        assert_eq!(stats.by_status["cancelled"], 0);
        assert_eq!(stats.by_type["issue"], 2);
        assert_eq!(stats.by_type["scrap"], 0);
        assert_eq!(stats.completed_amount, dec!(10));
        assert_eq!(stats.this_month, 2);
    }

    #[test]
    fn item_validation_rejects_non_positive_quantities() {
        let item = TransactionItemInput {
            part_id: Uuid::new_v4(),
            part_number: "P-1".into(),
            part_name: "Seal".into(),
            quantity: dec!(0),
            unit_cost: None,
            notes: None,
        };
        assert!(item.validate().is_err());
    }

    #[test]
    fn empty_item_list_fails_validation() {
        let input = CreateTransactionInput {
            transaction_type: TransactionType::Receipt,
            transaction_date: Utc::now(),
            description: "restock".into(),
            reference_number: None,
            priority: None,
            department: None,
            notes: None,
            items: Vec::new(),
        };
        assert!(input.validate().is_err());
    }

    async fn seeded_part(db: &crate::db::DbPool, part_number: &str) -> part::Model {
        part::ActiveModel {
            id: Set(Uuid::new_v4()),
            part_number: Set(part_number.into()),
            sku: Set(format!("SKU-{}", part_number)),
            name: Set(format!("Part {}", part_number)),
            category: Set("mechanical".into()),
            unit_of_measure: Set("each".into()),
            quantity: Set(dec!(10)),
            min_stock_level: Set(dec!(1)),
            unit_price: Set(dec!(2)),
            department: Set("Maintenance".into()),
            total_consumed: Set(dec!(0)),
            status: Set(part::PartStatus::Active),
            version: Set(1),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn stale_part_write_conflicts_and_rolls_back() {
        let db = crate::db::establish_connection_with_config(&crate::db::DbConfig::in_memory_sqlite())
            .await
            .unwrap();
        crate::db::run_migrations(&db).await.unwrap();
        let first = seeded_part(&db, "P-700").await;
        let second = seeded_part(&db, "P-701").await;
        let now = Utc::now();

        let txn = begin(&db).await.unwrap();
        let result = async {
            StockTransactionService::write_part(&txn, &first, dec!(8), dec!(2), true, now).await?;
            // Someone else writes the second part after it was read.
            part::Entity::update_many()
                .col_expr(part::Column::Version, Expr::value(second.version + 1))
                .filter(part::Column::Id.eq(second.id))
                .exec(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            StockTransactionService::write_part(&txn, &second, dec!(8), dec!(2), true, now).await
        }
        .await;
        assert!(matches!(&result, Err(ServiceError::ConcurrentModification(id)) if *id == second.id));
        assert!(commit_or_rollback(txn, result).await.is_err());

        for original in [&first, &second] {
            let stored = part::Entity::find_by_id(original.id)
                .one(&db)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(stored.quantity, dec!(10));
            assert_eq!(stored.version, 1);
        }
    }

    #[test]
    fn transition_notes_are_appended() {
        assert_eq!(
            append_note(None, TransactionStatus::Approved, " ok to pick "),
            "[approved] ok to pick"
        );
        assert_eq!(
            append_note(Some("for PM-12"), TransactionStatus::Cancelled, "duplicate"),
            "for PM-12\n[cancelled] duplicate"
        );
    }

    #[test]
    fn date_to_is_inclusive() {
        let filters = TransactionFilters {
            date_to: NaiveDate::from_ymd_opt(2024, 5, 31),
            ..Default::default()
        };
        // Upper bound is the start of the following day.
        assert_eq!(
            start_of_day(filters.date_to.and_then(|d| d.succ_opt()).unwrap()),
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
        );
    }
}
