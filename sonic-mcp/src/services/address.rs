//! Address and hash parsing.

use alloy_primitives::{Address, B256};

use crate::error::Error;

/// Accepts exactly `0x` followed by 40 hex digits, in any letter case.
///
/// Mixed-case input is not checksum-validated. Name-service names are not
/// resolved.
///
/// # Errors
///
/// [`Error::UnsupportedAddressFormat`] for anything else.
pub fn resolve_address(input: &str) -> Result<Address, Error> {
    let digits = input
        .strip_prefix("0x")
        .filter(|digits| digits.len() == 40)
        .ok_or_else(|| Error::UnsupportedAddressFormat(input.to_owned()))?;
    let bytes =
        hex::decode(digits).map_err(|_| Error::UnsupportedAddressFormat(input.to_owned()))?;
    Ok(Address::from_slice(&bytes))
}

/// Parses a `0x`-prefixed 32-byte hash.
///
/// # Errors
///
/// [`Error::InvalidInput`] when the input is not 64 hex digits.
pub fn parse_hash(input: &str) -> Result<B256, Error> {
    let digits = input
        .strip_prefix("0x")
        .filter(|digits| digits.len() == 64)
        .ok_or_else(|| Error::invalid_input(format!("expected a 0x-prefixed 32-byte hash, got '{input}'")))?;
    let bytes = hex::decode(digits)
        .map_err(|e| Error::invalid_input(format!("invalid hash '{input}': {e}")))?;
    Ok(B256::from_slice(&bytes))
}
