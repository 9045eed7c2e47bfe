use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Catalog lifecycle of a part. Parts are never hard-deleted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PartStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
    #[sea_orm(string_value = "discontinued")]
    Discontinued,
}

/// Derived stock classification reported alongside every part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
}

impl StockStatus {
    pub fn classify(quantity: Decimal, min_stock_level: Decimal) -> Self {
        if quantity <= Decimal::ZERO {
            StockStatus::OutOfStock
        } else if quantity <= min_stock_level {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "parts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub part_number: String,
    #[sea_orm(unique)]
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
    /// Always `quantity * unit_price`; maintained by `before_save`.
    pub total_value: Decimal,
    pub department: String,
    pub total_consumed: Decimal,
    pub last_used_date: Option<DateTime<Utc>>,
    pub status: PartStatus,
    /// Optimistic concurrency token, bumped on every write.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::part_asset_link::Entity")]
    AssetLinks,
}

impl Related<super::part_asset_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AssetLinks.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert && matches!(active_model.created_at, ActiveValue::NotSet) {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);

        if let (
            ActiveValue::Set(quantity) | ActiveValue::Unchanged(quantity),
            ActiveValue::Set(unit_price) | ActiveValue::Unchanged(unit_price),
        ) = (&active_model.quantity, &active_model.unit_price)
        {
            let total = *quantity * *unit_price;
            active_model.total_value = Set(total);
        }

        Ok(active_model)
    }
}

impl Model {
    pub fn stock_status(&self) -> StockStatus {
        StockStatus::classify(self.quantity, self.min_stock_level)
    }

    /// At or below the reorder threshold, including out of stock.
    pub fn is_below_minimum(&self) -> bool {
        self.quantity <= self.min_stock_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(0), dec!(5), StockStatus::OutOfStock)]
    #[case(dec!(-1), dec!(5), StockStatus::OutOfStock)]
    #[case(dec!(5), dec!(5), StockStatus::LowStock)]
    #[case(dec!(3), dec!(5), StockStatus::LowStock)]
    #[case(dec!(6), dec!(5), StockStatus::InStock)]
    #[case(dec!(1), dec!(0), StockStatus::InStock)]
    fn classifies_stock(
        #[case] quantity: Decimal,
        #[case] min: Decimal,
        #[case] expected: StockStatus,
    ) {
        assert_eq!(StockStatus::classify(quantity, min), expected);
    }

    #[test]
    fn stock_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&StockStatus::OutOfStock).unwrap(),
            "\"out_of_stock\""
        );
        assert_eq!(StockStatus::LowStock.to_string(), "low_stock");
    }
}
