//! Decimal unit conversion.

use alloy_primitives::U256;
use alloy_primitives::utils::{ParseUnits, format_units, parse_units};
use serde::Serializer;

use crate::error::Error;

/// Formats `amount` scaled by `decimals`, without trailing zeros.
///
/// Returns `None` if `decimals` is out of range.
pub(crate) fn format_amount(amount: U256, decimals: u8) -> Option<String> {
    let formatted = format_units(amount, decimals).ok()?;
    if !formatted.contains('.') {
        return Some(formatted);
    }
    Some(
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_owned(),
    )
}

/// Parses a non-negative human-readable amount into base units.
///
/// # Errors
///
/// [`Error::InvalidInput`] for negative, malformed or over-precise amounts.
pub(crate) fn parse_amount(amount: &str, decimals: u8) -> Result<U256, Error> {
    let parsed = parse_units(amount.trim(), decimals)
        .map_err(|e| Error::invalid_input(format!("invalid amount '{amount}': {e}")))?;
    match parsed {
        ParseUnits::U256(value) => Ok(value),
        ParseUnits::I256(_) => Err(Error::invalid_input(format!(
            "amount must not be negative: '{amount}'"
        ))),
    }
}

/// Serializes a [`U256`] as a base-10 string.
pub(crate) fn decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
