//! Property-based tests for stock arithmetic and classification.
//!
//! These tests use proptest to verify invariants across a wide range of inputs,
//! helping to catch edge cases that unit tests might miss.

use cmms_api::entities::part::StockStatus;
use cmms_api::entities::stock_transaction::{TransactionStatus, TransactionType};
use cmms_api::services::sequence::{counter_key, format_transaction_number};
use cmms_api::services::stock_movement::apply_movement;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

// Strategies for generating test data
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000, 0u32..3).prop_map(|(units, scale)| Decimal::new(units, scale))
}

fn positive_quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000, 0u32..3).prop_map(|(units, scale)| Decimal::new(units, scale))
}

fn movement_strategy() -> impl Strategy<Value = TransactionType> {
    prop_oneof![
        Just(TransactionType::Receipt),
        Just(TransactionType::Issue),
        Just(TransactionType::TransferIn),
        Just(TransactionType::TransferOut),
        Just(TransactionType::Adjustment),
        Just(TransactionType::Scrap),
    ]
}

fn status_strategy() -> impl Strategy<Value = TransactionStatus> {
    prop_oneof![
        Just(TransactionStatus::Draft),
        Just(TransactionStatus::Pending),
        Just(TransactionStatus::Approved),
        Just(TransactionStatus::Completed),
        Just(TransactionStatus::Cancelled),
    ]
}

// Property: completing any movement never leaves negative stock
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn quantity_never_goes_negative(
        kind in movement_strategy(),
        current in quantity_strategy(),
        quantity in positive_quantity_strategy(),
    ) {
        let outcome = apply_movement(kind, current, quantity);
        prop_assert!(outcome.new_quantity >= Decimal::ZERO);
    }

    #[test]
    fn receipts_add_exactly(current in quantity_strategy(), quantity in positive_quantity_strategy()) {
        for kind in [TransactionType::Receipt, TransactionType::TransferIn] {
            let outcome = apply_movement(kind, current, quantity);
            prop_assert_eq!(outcome.new_quantity, current + quantity);
            prop_assert_eq!(outcome.consumed, Decimal::ZERO);
        }
    }

    #[test]
    fn adjustments_set_absolutely(current in quantity_strategy(), quantity in positive_quantity_strategy()) {
        let outcome = apply_movement(TransactionType::Adjustment, current, quantity);
        prop_assert_eq!(outcome.new_quantity, quantity);
        prop_assert!(!outcome.marks_usage());
    }

    #[test]
    fn outbound_movements_consume_the_requested_amount(
        current in quantity_strategy(),
        quantity in positive_quantity_strategy(),
    ) {
        for kind in [TransactionType::Issue, TransactionType::TransferOut, TransactionType::Scrap] {
            let outcome = apply_movement(kind, current, quantity);
            prop_assert_eq!(outcome.consumed, quantity);
            prop_assert!(outcome.marks_usage());
            prop_assert!(outcome.new_quantity <= current);
            if quantity <= current {
                prop_assert_eq!(outcome.new_quantity, current - quantity);
            }
        }
    }
}

// Property: stock classification is a total order over quantity
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn stock_status_matches_thresholds(quantity in quantity_strategy(), minimum in quantity_strategy()) {
        let status = StockStatus::classify(quantity, minimum);
        if quantity <= Decimal::ZERO {
            prop_assert_eq!(status, StockStatus::OutOfStock);
        } else if quantity <= minimum {
            prop_assert_eq!(status, StockStatus::LowStock);
        } else {
            prop_assert_eq!(status, StockStatus::InStock);
        }
    }

    #[test]
    fn terminal_statuses_have_no_exits(from in status_strategy(), to in status_strategy()) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
        }
        prop_assert!(!from.can_transition_to(from));
    }

    #[test]
    fn transaction_numbers_sort_in_allocation_order(
        year in 2000i32..2099,
        month in 1u32..=12,
        a in 1i64..9999,
        b in 1i64..9999,
    ) {
        let at = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap();
        let key = counter_key(at);
        let (first, second) = (format_transaction_number(&key, a), format_transaction_number(&key, b));
        prop_assert!(first.starts_with("ST"));
        prop_assert_eq!(first.len(), 10);
        prop_assert_eq!(a.cmp(&b), first.cmp(&second));
    }
}
