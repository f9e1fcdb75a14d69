//! Merch shop: the product list and a quantity cart kept in the session.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::assets::AssetHost;
use crate::cart::{CartLine, CartSlot};
use crate::error::AppError;
use crate::gallery::Upload;
use crate::models::{timestamp_now, Product, ProductCategory};

pub struct NewProduct {
    pub name: String,
    pub price_cents: i64,
    pub category: ProductCategory,
    pub image: Option<Upload>,
}

#[derive(Clone)]
pub struct ProductStore {
    db: SqlitePool,
    assets: Arc<dyn AssetHost>,
}

impl ProductStore {
    pub fn new(db: SqlitePool, assets: Arc<dyn AssetHost>) -> Self {
        Self { db, assets }
    }

    pub async fn list(&self) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as("SELECT * FROM products ORDER BY created_at, rowid")
            .fetch_all(&self.db)
            .await?;
        Ok(products)
    }

    pub async fn get(&self, product_id: &str) -> Result<Product, AppError> {
        let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_optional(&self.db)
            .await?;
        product.ok_or(AppError::NotFound)
    }

    pub async fn add_product(&self, new: NewProduct) -> Result<Product, AppError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("product name is required"));
        }
        if new.price_cents <= 0 {
            return Err(AppError::validation("price must be positive"));
        }

        let image_url = match new.image {
            Some(image) => Some(
                self.assets
                    .upload(image.bytes, &image.file_name)
                    .await
                    .inspect_err(|e| tracing::error!(error = %e, "product image upload failed"))?,
            ),
            None => None,
        };

        let product = Product {
            id: Uuid::now_v7().to_string(),
            name: name.to_string(),
            price_cents: new.price_cents,
            category: new.category,
            image_url,
            created_at: timestamp_now(),
        };

        sqlx::query(
            "INSERT INTO products (id, name, price_cents, category, image_url, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.category)
        .bind(&product.image_url)
        .bind(&product.created_at)
        .execute(&self.db)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to add product"))?;

        tracing::info!(product_id = %product.id, "product added");
        Ok(product)
    }
}

/// One product in the merch cart. The unit price is copied when the product
/// is first added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCartLine {
    pub product_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub image_url: Option<String>,
    pub quantity: i64,
}

impl CartLine for StoreCartLine {
    const SESSION_KEY: &'static str = "store_cart";
}

impl StoreCartLine {
    pub fn subtotal_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }
}

pub struct StoreCart<S> {
    slot: S,
    lines: Vec<StoreCartLine>,
}

impl<S: CartSlot<StoreCartLine>> StoreCart<S> {
    pub async fn load(slot: S) -> Result<Self, AppError> {
        let lines = slot.load().await?.unwrap_or_default();
        Ok(Self { slot, lines })
    }

    pub fn lines(&self) -> &[StoreCartLine] {
        &self.lines
    }

    pub fn total_cents(&self) -> i64 {
        self.lines.iter().map(StoreCartLine::subtotal_cents).sum()
    }

    /// Number of units across all lines.
    pub fn count(&self) -> i64 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Write the lines through, restoring `previous` if the slot refuses.
    async fn save(&mut self, previous: Vec<StoreCartLine>) -> Result<(), AppError> {
        if let Err(e) = self.slot.store(&self.lines).await {
            self.lines = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Add one unit. A product already in the cart gets its quantity bumped.
    pub async fn add(&mut self, product: &Product) -> Result<&StoreCartLine, AppError> {
        let previous = self.lines.clone();
        let index = match self.lines.iter().position(|l| l.product_id == product.id) {
            Some(index) => {
                self.lines[index].quantity += 1;
                index
            }
            None => {
                self.lines.push(StoreCartLine {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    unit_price_cents: product.price_cents,
                    image_url: product.image_url.clone(),
                    quantity: 1,
                });
                self.lines.len() - 1
            }
        };
        self.save(previous).await?;
        Ok(&self.lines[index])
    }

    /// Change a line's quantity by `delta`, never going below one. Returns
    /// whether the product was in the cart.
    pub async fn update_quantity(&mut self, product_id: &str, delta: i64) -> Result<bool, AppError> {
        let Some(index) = self.lines.iter().position(|l| l.product_id == product_id) else {
            return Ok(false);
        };
        let previous = self.lines.clone();
        let line = &mut self.lines[index];
        line.quantity = line.quantity.saturating_add(delta).max(1);
        self.save(previous).await?;
        Ok(true)
    }

    pub async fn remove(&mut self, product_id: &str) -> Result<bool, AppError> {
        let Some(index) = self.lines.iter().position(|l| l.product_id == product_id) else {
            return Ok(false);
        };
        let previous = self.lines.clone();
        self.lines.remove(index);
        self.save(previous).await?;
        Ok(true)
    }

    pub async fn clear(&mut self) -> Result<(), AppError> {
        let previous = std::mem::take(&mut self.lines);
        self.save(previous).await
    }
}
