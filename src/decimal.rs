//! Decimal arithmetic used for every crypto and fiat quantity.
//!
//! All amounts flow through [`rust_decimal::Decimal`] (28-29 significant
//! digits). Arithmetic inside the engine is never rounded; rounding happens
//! only when a report formats a value for output.

use crate::error::{LineId, Result, TaxlotError};
use rust_decimal::{Decimal, RoundingStrategy};

pub const ZERO: Decimal = Decimal::ZERO;
pub const ONE: Decimal = Decimal::ONE;
pub const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Round to `dp` decimal places with banker's rounding (round-half-even).
pub fn round_dp_bankers(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven)
}

/// Format an amount for display, trimming trailing zeros after rounding.
pub fn format_amount(value: Decimal, dp: u32) -> String {
    let s = round_dp_bankers(value, dp).to_string();
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// Parse a decimal cell, pointing at the source line on failure.
pub fn parse_decimal(s: &str, line: LineId) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .map_err(|_| TaxlotError::MalformedInput {
            line,
            message: format!("'{s}' is not a number"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn bankers_rounding_half_even() {
        assert_eq!(round_dp_bankers(dec!(2.5), 0), dec!(2));
        assert_eq!(round_dp_bankers(dec!(3.5), 0), dec!(4));
        assert_eq!(round_dp_bankers(dec!(0.125), 2), dec!(0.12));
        assert_eq!(round_dp_bankers(dec!(0.135), 2), dec!(0.14));
    }

    #[test]
    fn format_trims_trailing_zeros() {
        assert_eq!(format_amount(dec!(1.50000000), 8), "1.5");
        assert_eq!(format_amount(dec!(100), 2), "100");
        assert_eq!(format_amount(dec!(0.123456789), 8), "0.12345679");
    }

    #[test]
    fn parse_rejects_garbage_with_line() {
        let err = parse_decimal("1.2.3", 42).unwrap_err();
        assert_eq!(err.line(), Some(42));
        assert_eq!(parse_decimal(" 0.5 ", 1).unwrap(), dec!(0.5));
    }

    #[test]
    fn constants() {
        assert_eq!(ZERO + ONE, dec!(1));
        assert_eq!(ONE * HUNDRED, dec!(100));
    }
}
