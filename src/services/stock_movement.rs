//! Quantity arithmetic applied to a part when a ledger entry completes.

use rust_decimal::Decimal;

use crate::entities::stock_transaction::TransactionType;

/// Result of applying one movement to a part's on-hand quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementOutcome {
    pub new_quantity: Decimal,
    /// Amount to add to the part's lifetime consumption.
    pub consumed: Decimal,
}

impl MovementOutcome {
    /// Outbound movements count as usage and refresh `last_used_date`.
    pub fn marks_usage(&self) -> bool {
        self.consumed > Decimal::ZERO
    }
}

/// Applies a movement of `quantity` to `current`.
///
/// Receipts and inbound transfers add. Issues, outbound transfers and scrap
/// subtract, floored at zero, and record the full requested amount as
/// consumed. Adjustments set the quantity outright.
pub fn apply_movement(
    kind: TransactionType,
    current: Decimal,
    quantity: Decimal,
) -> MovementOutcome {
    match kind {
        TransactionType::Receipt | TransactionType::TransferIn => MovementOutcome {
            new_quantity: current + quantity,
            consumed: Decimal::ZERO,
        },
        TransactionType::Issue | TransactionType::TransferOut | TransactionType::Scrap => {
            MovementOutcome {
                new_quantity: (current - quantity).max(Decimal::ZERO),
                consumed: quantity,
            }
        }
        TransactionType::Adjustment => MovementOutcome {
            new_quantity: quantity.max(Decimal::ZERO),
            consumed: Decimal::ZERO,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(TransactionType::Receipt, dec!(10), dec!(4), dec!(14), dec!(0))]
    #[case(TransactionType::TransferIn, dec!(0), dec!(2.5), dec!(2.5), dec!(0))]
    #[case(TransactionType::Issue, dec!(10), dec!(4), dec!(6), dec!(4))]
    #[case(TransactionType::TransferOut, dec!(3), dec!(5), dec!(0), dec!(5))]
    #[case(TransactionType::Scrap, dec!(1), dec!(1), dec!(0), dec!(1))]
    #[case(TransactionType::Adjustment, dec!(10), dec!(7), dec!(7), dec!(0))]
    #[case(TransactionType::Adjustment, dec!(2), dec!(9), dec!(9), dec!(0))]
    fn applies_movement(
        #[case] kind: TransactionType,
        #[case] current: Decimal,
        #[case] quantity: Decimal,
        #[case] expected_quantity: Decimal,
        #[case] expected_consumed: Decimal,
    ) {
        let outcome = apply_movement(kind, current, quantity);
        assert_eq!(outcome.new_quantity, expected_quantity);
        assert_eq!(outcome.consumed, expected_consumed);
    }

    #[test]
    fn only_outbound_movements_mark_usage() {
        assert!(apply_movement(TransactionType::Issue, dec!(5), dec!(1)).marks_usage());
        assert!(!apply_movement(TransactionType::Receipt, dec!(5), dec!(1)).marks_usage());
        assert!(!apply_movement(TransactionType::Adjustment, dec!(5), dec!(1)).marks_usage());
    }
}
