//! Locale-tolerant decimal text parsing.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::ExtractionError;

/// Parse monetary or quantity text as an exact decimal.
///
/// Empty or missing text is zero. A comma decimal separator is accepted
/// because real-world documents mix both conventions.
pub fn parse_decimal(text: &str) -> Result<Decimal, ExtractionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(&trimmed.replace(',', "."))
        .map_err(|_| ExtractionError::Number(trimmed.to_string()))
}
