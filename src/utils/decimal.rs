//! Decimal arithmetic utilities for price and P&L calculations.

use rust_decimal::Decimal;

/// Percentage change from `from` to `to` as a ratio (0.04 = +4%).
pub fn pct_change(from: Decimal, to: Decimal) -> Decimal {
    if from == Decimal::ZERO {
        return Decimal::ZERO;
    }
    (to - from) / from
}

/// Apply a percentage move to a base price (`apply_pct(100, 0.05)` = 105).
pub fn apply_pct(base: Decimal, pct: Decimal) -> Decimal {
    base * (Decimal::ONE + pct)
}

/// Safe division that returns zero if the divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pct_change() {
        assert_eq!(pct_change(dec!(100), dec!(104)), dec!(0.04));
        assert_eq!(pct_change(dec!(100), dec!(97)), dec!(-0.03));
        assert_eq!(pct_change(Decimal::ZERO, dec!(50)), Decimal::ZERO);
    }

    #[test]
    fn test_apply_pct() {
        assert_eq!(apply_pct(dec!(104), dec!(0.05)), dec!(109.20));
        assert_eq!(apply_pct(dec!(104), dec!(0.07)), dec!(111.28));
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(dec!(10), dec!(4)), dec!(2.5));
        assert_eq!(safe_div(dec!(10), Decimal::ZERO), Decimal::ZERO);
    }
}
