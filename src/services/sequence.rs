//! Monthly ledger numbering backed by the `sequence_counters` table.

use chrono::{DateTime, Datelike, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ConnectionTrait, EntityTrait, Set};

use crate::entities::sequence_counter;
use crate::errors::ServiceError;

pub const TRANSACTION_PREFIX: &str = "ST";

/// Counter key for the month containing `at`, e.g. `ST2405`.
pub fn counter_key(at: DateTime<Utc>) -> String {
    format!(
        "{}{:02}{:02}",
        TRANSACTION_PREFIX,
        at.year().rem_euclid(100),
        at.month()
    )
}

pub fn format_transaction_number(key: &str, value: i64) -> String {
    format!("{}{:04}", key, value)
}

/// Allocates the next transaction number for the month of `at`.
///
/// The increment is a single upsert, so it must run on the same connection
/// or transaction that inserts the ledger row: the counter row stays locked
/// until that transaction ends and concurrent creators serialize on it.
pub async fn next_transaction_number<C>(conn: &C, at: DateTime<Utc>) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let key = counter_key(at);
    let now = Utc::now();

    let seed = sequence_counter::ActiveModel {
        key: Set(key.clone()),
        value: Set(1),
        updated_at: Set(now),
    };

    sequence_counter::Entity::insert(seed)
        .on_conflict(
            OnConflict::column(sequence_counter::Column::Key)
                .value(
                    sequence_counter::Column::Value,
                    Expr::col((sequence_counter::Entity, sequence_counter::Column::Value)).add(1),
                )
                .value(sequence_counter::Column::UpdatedAt, Expr::value(now))
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let counter = sequence_counter::Entity::find_by_id(key.clone())
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::InternalError(format!("sequence counter {} vanished after upsert", key))
        })?;

    Ok(format_transaction_number(&key, counter.value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_uses_two_digit_year_and_month() {
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 8, 0, 0).unwrap();
        assert_eq!(counter_key(at), "ST2405");
        let at = Utc.with_ymd_and_hms(2031, 12, 1, 0, 0, 0).unwrap();
        assert_eq!(counter_key(at), "ST3112");
    }

    #[test]
    fn numbers_are_zero_padded() {
        assert_eq!(format_transaction_number("ST2405", 7), "ST24050007");
        assert_eq!(format_transaction_number("ST2405", 12345), "ST240512345");
    }
}
