use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Money is represented as an exact decimal in the trip's currency.
/// Even splits (e.g. 100 / 3) keep their full precision until display.
pub type Amount = Decimal;

/// Tolerance below which a balance is considered settled (one cent).
pub const EPSILON: Amount = Decimal::from_parts(1, 0, 0, false, 2);

/// Returns true if the amount is within [`EPSILON`] of zero.
pub fn is_settled(amount: Amount) -> bool {
    amount.abs() < EPSILON
}

/// Format an amount as a human-readable currency string with two decimals.
/// Example: 50 -> "50.00", -12.345 -> "-12.35", 33.3333 -> "33.33"
pub fn format_amount(amount: Amount) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    // Avoid printing "-0.00" for dust balances
    if rounded.is_zero() {
        return "0.00".to_string();
    }
    format!("{:.2}", rounded)
}

/// Parse a decimal string into an amount.
/// Example: "50.00" -> 50, "12.5" -> 12.5, "100" -> 100
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseAmountError::InvalidFormat);
    }
    Decimal::from_str(input).map_err(|_| ParseAmountError::InvalidFormat)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid money format"),
        }
    }
}

impl std::error::Error for ParseAmountError {}
