use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Asset register owned by the asset subsystem; read here for BOM sync only.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub department: String,
    /// JSON array of BOM lines in the asset subsystem's camelCase shape.
    pub parts_bom: Option<Json>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// One line of an asset's bill of materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomEntry {
    pub part_number: Option<String>,
    pub part_name: Option<String>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
    #[serde(default)]
    pub supplier: Option<String>,
    /// RFC 3339 timestamp or plain date; anything else reads as unknown.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_replaced: Option<DateTime<Utc>>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(serde_json::Value::String(text)) = raw else {
        return Ok(None);
    };
    let text = text.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    Ok(NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc()))
}

impl BomEntry {
    /// Lines lacking a part number or name are ignored by the sync.
    pub fn is_syncable(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.trim().is_empty());
        present(&self.part_number) && present(&self.part_name)
    }
}

impl Model {
    /// Raw BOM lines; each is decoded separately so one bad line does not hide the rest.
    pub fn bom_lines(&self) -> Vec<Json> {
        match &self.parts_bom {
            Some(Json::Array(lines)) => lines.clone(),
            _ => Vec::new(),
        }
    }
}
