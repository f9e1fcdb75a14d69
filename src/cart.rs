//! Pre-checkout booking cart and the durable slot that mirrors it.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::BookingCartItem;

/// A line type that can be held in a cart slot. Each line type gets its own
/// session key, so the booking cart and the merch cart never collide.
pub trait CartLine: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const SESSION_KEY: &'static str;
}

impl CartLine for BookingCartItem {
    const SESSION_KEY: &'static str = "booking_cart";
}

/// Single-value durable storage for a cart. Every write replaces the
/// whole value.
#[async_trait]
pub trait CartSlot<T: CartLine>: Send + Sync {
    async fn load(&self) -> Result<Option<Vec<T>>, AppError>;
    async fn store(&self, items: &[T]) -> Result<(), AppError>;
}

#[async_trait]
impl<T: CartLine> CartSlot<T> for Session {
    async fn load(&self) -> Result<Option<Vec<T>>, AppError> {
        Ok(self.get(T::SESSION_KEY).await?)
    }

    async fn store(&self, items: &[T]) -> Result<(), AppError> {
        Ok(self.insert(T::SESSION_KEY, items).await?)
    }
}

pub struct BookingCart<S> {
    slot: S,
    items: Vec<BookingCartItem>,
}

impl<S: CartSlot<BookingCartItem>> BookingCart<S> {
    /// Restore whatever the slot holds; an empty slot is an empty cart.
    pub async fn load(slot: S) -> Result<Self, AppError> {
        let items = slot.load().await?.unwrap_or_default();
        Ok(Self { slot, items })
    }

    pub fn items(&self) -> &[BookingCartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> i64 {
        self.items.iter().map(|item| item.total_price).sum()
    }

    /// Append an item under a fresh time-ordered cart id.
    pub async fn add(&mut self, mut item: BookingCartItem) -> Result<&BookingCartItem, AppError> {
        item.cart_id = Uuid::now_v7().to_string();
        self.items.push(item);
        if let Err(e) = self.slot.store(&self.items).await {
            self.items.pop();
            return Err(e);
        }
        Ok(&self.items[self.items.len() - 1])
    }

    /// Returns whether an item with that cart id was present.
    pub async fn remove(&mut self, cart_id: &str) -> Result<bool, AppError> {
        let Some(index) = self.items.iter().position(|item| item.cart_id == cart_id) else {
            return Ok(false);
        };
        let removed = self.items.remove(index);
        if let Err(e) = self.slot.store(&self.items).await {
            self.items.insert(index, removed);
            return Err(e);
        }
        Ok(true)
    }

    pub async fn clear(&mut self) -> Result<(), AppError> {
        self.slot.store(&[]).await?;
        self.items.clear();
        Ok(())
    }
}
