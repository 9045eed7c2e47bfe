use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_transaction_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub line_no: i32,
    pub part_id: Uuid,
    pub part_number: String,
    pub part_name: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_transaction::Entity",
        from = "Column::TransactionId",
        to = "super::stock_transaction::Column::Id",
        on_delete = "Cascade"
    )]
    Transaction,
}

impl Related<super::stock_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let (
            ActiveValue::Set(quantity) | ActiveValue::Unchanged(quantity),
            ActiveValue::Set(unit_cost) | ActiveValue::Unchanged(unit_cost),
        ) = (&active_model.quantity, &active_model.unit_cost)
        {
            let total = *quantity * *unit_cost;
            active_model.total_cost = Set(total);
        }
        Ok(active_model)
    }
}
