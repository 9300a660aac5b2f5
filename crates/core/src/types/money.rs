//! Money formatting.
//!
//! Every amount in CopyHub is a [`Decimal`] in the marketplace's single
//! currency. Arithmetic never goes through floating point.

use rust_decimal::{Decimal, RoundingStrategy};

/// Currency symbol prefixed to every displayed amount.
pub const CURRENCY_SYMBOL: &str = "$";

/// Format an amount with two decimal places, e.g. `$75.00`.
///
/// Rounds half away from zero, matching how totals are shown at checkout.
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{CURRENCY_SYMBOL}{rounded:.2}")
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_format_money_pads_to_cents() {
        assert_eq!(format_money(Decimal::from(75)), "$75.00");
        assert_eq!(format_money(Decimal::from_str("0.5").unwrap()), "$0.50");
    }

    #[test]
    fn test_format_money_rounds_half_up() {
        assert_eq!(format_money(Decimal::from_str("0.125").unwrap()), "$0.13");
    }
}
