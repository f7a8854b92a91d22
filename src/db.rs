use rust_decimal::Decimal;
use sqlx::types::BigDecimal;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

// NUMERIC columns come back as BigDecimal; the domain works in Decimal.

pub fn from_big_decimal(value: &BigDecimal) -> AppResult<Decimal> {
    Ok(Decimal::from_str(&value.to_string())?)
}

pub fn from_big_decimal_opt(value: Option<&BigDecimal>) -> AppResult<Option<Decimal>> {
    value.map(from_big_decimal).transpose()
}

pub fn to_big_decimal(value: Decimal) -> AppResult<BigDecimal> {
    BigDecimal::from_str(&value.to_string())
        .map_err(|e| AppError::Internal(format!("Decimal conversion error: {:?}", e)))
}
