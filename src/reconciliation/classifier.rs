use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::models::ReconciliationStatus;

/// Largest absolute difference (in currency units, exclusive) between the
/// received and expected net amounts that still counts as a match.
pub const DIVERGENCE_TOLERANCE: Decimal = dec!(0.02);

/// Classify a deposit against the expected net amount.
/// Only ever returns `Confirmed` or `Divergent`.
pub fn classify(expected_net: Decimal, received_net: Decimal) -> ReconciliationStatus {
    if (received_net - expected_net).abs() < DIVERGENCE_TOLERANCE {
        ReconciliationStatus::Confirmed
    } else {
        ReconciliationStatus::Divergent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_amounts_confirm() {
        for expected in [dec!(0), dec!(0.01), dec!(94.50), dec!(99.91), dec!(12345.67)] {
            assert_eq!(classify(expected, expected), ReconciliationStatus::Confirmed);
        }
    }

    #[test]
    fn test_tolerance_boundary_is_exclusive() {
        assert_eq!(
            classify(dec!(100.00), dec!(100.02)),
            ReconciliationStatus::Divergent
        );
        assert_eq!(
            classify(dec!(100.00), dec!(99.98)),
            ReconciliationStatus::Divergent
        );
        assert_eq!(
            classify(dec!(100.00), dec!(100.019)),
            ReconciliationStatus::Confirmed
        );
        assert_eq!(
            classify(dec!(100.00), dec!(99.981)),
            ReconciliationStatus::Confirmed
        );
    }

    #[test]
    fn test_tolerance_constant() {
        assert_eq!(DIVERGENCE_TOLERANCE, dec!(0.02));
        assert_eq!(
            classify(dec!(50), dec!(50) + DIVERGENCE_TOLERANCE),
            ReconciliationStatus::Divergent
        );
    }
}
