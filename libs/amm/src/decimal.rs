//! `U256` to `Decimal` conversion for diagnostic prices

use std::str::FromStr;

use crate::Decimal;
use anyhow::{Context, Result};
use ethers_core::types::U256;

/// Lossless conversion for amounts that fit `Decimal`'s 96-bit mantissa
pub fn to_decimal(value: U256) -> Result<Decimal> {
    Decimal::from_str(&value.to_string())
        .with_context(|| format!("{} does not fit in a Decimal", value))
}
