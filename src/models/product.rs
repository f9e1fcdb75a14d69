use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum ProductCategory {
    Clothing,
    Shoes,
    Accessories,
}

impl FromStr for ProductCategory {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Clothing" => Ok(ProductCategory::Clothing),
            "Shoes" => Ok(ProductCategory::Shoes),
            "Accessories" => Ok(ProductCategory::Accessories),
            other => Err(AppError::validation(format!("unknown category '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub category: ProductCategory,
    pub image_url: Option<String>,
    pub created_at: String,
}

/// Parse a euro amount such as `85`, `85.5` or `85.00` into cents.
pub fn parse_price_cents(raw: &str) -> Result<i64, AppError> {
    let invalid = || AppError::validation(format!("invalid price '{raw}'"));
    let raw = raw.trim();
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));

    if whole.is_empty() || fraction.len() > 2 {
        return Err(invalid());
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let cents: i64 = format!("{fraction:0<2}").parse().map_err(|_| invalid())?;
    let price = whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(cents))
        .ok_or_else(invalid)?;

    if price <= 0 {
        return Err(AppError::validation("price must be positive"));
    }
    Ok(price)
}
